mod common;

use common::{Auth, TestApp, ACME, ALICE, PASSWORD, ROOT};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn platform_login_sets_http_only_cookie() {
    let app = TestApp::new().await;
    let res = app
        .post("/auth/login", Auth::None, json!({ "email": "root@platform.test", "password": PASSWORD }))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let data = res.data();
    assert_eq!(data["access_type"], "normal");
    assert_eq!(data["user"]["id"], ROOT);
    assert!(data["tenant_id"].is_null());

    let header = res.session_cookie_header().expect("Authentication cookie");
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("Path=/"));
    assert_eq!(res.session_cookie().as_deref(), data["token"].as_str());
}

#[tokio::test]
async fn tenant_login_scopes_the_session() {
    let app = TestApp::new().await;
    let token = app.login(Some("acme"), "Alice@Acme.test").await;

    let res = app.get("/auth/whoami", Auth::Cookie(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["user_id"], ALICE);
    assert_eq!(res.data()["tenant_id"], ACME);
    assert!(res.data()["original_user"].is_null());
}

#[tokio::test]
async fn bad_credentials_do_not_say_which_part_was_wrong() {
    let app = TestApp::new().await;
    let attempts = [
        json!({ "email": "root@platform.test", "password": "wrong" }),
        json!({ "email": "nobody@platform.test", "password": PASSWORD }),
        json!({ "tenant": "nope", "email": "alice@acme.test", "password": PASSWORD }),
        // tenant users cannot log in without their tenant
        json!({ "email": "alice@acme.test", "password": PASSWORD }),
    ];

    for body in attempts {
        let res = app.post("/auth/login", Auth::None, body.clone()).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", body);
        assert_eq!(res.body["error"], "Invalid credentials");
        assert!(res.session_cookie().is_none());
    }
}

#[tokio::test]
async fn disabled_accounts_and_tenants_are_forbidden() {
    let app = TestApp::new().await;
    let attempts = [
        json!({ "tenant": "acme", "email": "carol@acme.test", "password": PASSWORD }),
        json!({ "tenant": "initech", "email": "peter@initech.test", "password": PASSWORD }),
        json!({ "email": "retired@platform.test", "password": PASSWORD }),
    ];

    for body in attempts {
        let res = app.post("/auth/login", Auth::None, body.clone()).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{}", body);
    }
}

#[tokio::test]
async fn malformed_login_is_bad_request() {
    let app = TestApp::new().await;
    let res = app.post("/auth/login", Auth::None, json!({ "email": "", "password": "" })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/auth/login", Auth::None, json!({ "password": PASSWORD })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), Some("BAD_REQUEST"));
}

#[tokio::test]
async fn logout_revokes_the_session_and_clears_the_cookie() {
    let app = TestApp::new().await;
    let token = app.login_root().await;

    let res = app.post_empty("/auth/logout", Auth::Bearer(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["revoked"], true);
    assert_eq!(res.session_cookie().as_deref(), Some(""));

    let res = app.get("/auth/whoami", Auth::Bearer(&token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn purge_task_sweeps_expired_sessions() {
    use chrono::{Duration, Utc};
    use tenant_admin_api::store::{SessionRecord, Store};
    use tenant_admin_api::types::AccessType;
    use uuid::Uuid;

    let app = TestApp::new().await;
    let live = app.login_root().await;

    let now = Utc::now();
    let stale = SessionRecord {
        id: Uuid::new_v4(),
        user_id: ROOT.parse().unwrap(),
        access_type: AccessType::Normal,
        tenant_id: None,
        original_user_id: None,
        issued_at: now - Duration::hours(2),
        expires_at: now - Duration::hours(1),
        revoked_at: None,
    };
    let stale_id = stale.id;
    app.store.insert_session(stale).await.unwrap();

    let sweeper = tenant_admin_api::app::spawn_session_purge(app.store.clone(), 60).expect("sweeper");
    // The first tick fires immediately
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    sweeper.abort();

    assert!(app.store.find_session(stale_id).await.unwrap().is_none());
    let res = app.get("/auth/whoami", Auth::Cookie(&live)).await;
    assert_eq!(res.status, StatusCode::OK);

    assert!(tenant_admin_api::app::spawn_session_purge(app.store.clone(), 0).is_none());
}
