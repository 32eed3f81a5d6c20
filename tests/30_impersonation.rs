mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn impersonation_issues_a_token_that_remembers_the_operator() {
    let app = TestApp::new().await;
    let root = app.login_root().await;

    let res = app
        .post("/tenants/impersonate", Auth::Cookie(&root), json!({ "tenant_id": ACME, "user_id": ALICE }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let data = res.data();
    assert_eq!(data["access_type"], "impersonation");
    assert_eq!(data["user"]["id"], ALICE);
    assert_eq!(data["original_user_id"], ROOT);
    assert_eq!(data["tenant"]["slug"], "acme");
    assert_eq!(data["redirect_to"], "/");

    let token = res.session_cookie().expect("cookie replaced");
    assert_eq!(Some(token.as_str()), data["token"].as_str());

    let me = app.get("/auth/whoami", Auth::Cookie(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.data()["user_id"], ALICE);
    assert_eq!(me.data()["access_type"], "impersonation");
    assert_eq!(me.data()["target_tenant"], ACME);
    assert_eq!(me.data()["original_user"]["user_id"], ROOT);
    assert_eq!(me.data()["original_user"]["email"], "root@platform.test");

    // acts with the impersonated user's tenant permissions, not the operator's
    let perms = me.data()["permissions"].as_array().unwrap();
    assert!(perms.contains(&json!("users.write")));
    assert!(!perms.contains(&json!("tenants.impersonate")));
}

#[tokio::test]
async fn operator_needs_a_grant_that_allows_impersonation() {
    let app = TestApp::new().await;
    let ops = app.login_ops().await;

    // read-only grant on globex
    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&ops), json!({ "tenant_id": GLOBEX, "user_id": GINA }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // no grant on initech at all
    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&ops), json!({ "tenant_id": INITECH, "user_id": PETER }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&ops), json!({ "tenant_id": ACME, "user_id": BOB }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
}

#[tokio::test]
async fn impersonation_targets_must_be_live_members_of_the_tenant() {
    let app = TestApp::new().await;
    let root = app.login_root().await;

    // gina belongs to globex, not acme
    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&root), json!({ "tenant_id": ACME, "user_id": GINA }))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&root), json!({ "tenant_id": ACME, "user_id": CAROL }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // inactive tenant
    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&root), json!({ "tenant_id": INITECH, "user_id": PETER }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&root), json!({ "tenant_id": ACME }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenant_users_and_elevated_sessions_cannot_impersonate() {
    let app = TestApp::new().await;
    let alice = app.login(Some("acme"), "alice@acme.test").await;
    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&alice), json!({ "tenant_id": ACME, "user_id": BOB }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let root = app.login_root().await;
    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&root), json!({ "tenant_id": ACME, "user_id": ALICE }))
        .await;
    let elevated = res.data()["token"].as_str().unwrap().to_string();
    let res = app
        .post("/tenants/impersonate", Auth::Bearer(&elevated), json!({ "tenant_id": ACME, "user_id": BOB }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ending_restores_the_operator_and_is_idempotent() {
    let app = TestApp::new().await;
    let root = app.login_root().await;
    let res = app
        .post("/tenants/impersonate", Auth::Cookie(&root), json!({ "tenant_id": ACME, "user_id": ALICE }))
        .await;
    let elevated = res.session_cookie().unwrap();

    // the elevated token replaced the operator's normal session
    let res = app.get("/auth/whoami", Auth::Cookie(&root)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.post_empty("/tenant-access/impersonate/end", Auth::Cookie(&elevated)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["ended"], true);
    assert_eq!(res.data()["redirect_to"], format!("/admin/tenants/{}", ACME));
    assert_eq!(res.data()["session"]["user"]["id"], ROOT);
    assert_eq!(res.data()["session"]["access_type"], "normal");

    let restored = res.session_cookie().expect("restored session cookie");
    assert!(!restored.is_empty());
    let me = app.get("/auth/whoami", Auth::Cookie(&restored)).await;
    assert_eq!(me.data()["user_id"], ROOT);
    assert_eq!(me.data()["access_type"], "normal");

    // the elevated token is dead
    let res = app.get("/auth/whoami", Auth::Cookie(&elevated)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // second end: still 200, now signed out
    let res = app.post_empty("/tenant-access/impersonate/end", Auth::Cookie(&elevated)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["ended"], false);
    assert_eq!(res.data()["redirect_to"], "/login");
    assert_eq!(res.session_cookie().as_deref(), Some(""));
}

#[tokio::test]
async fn ending_without_an_elevated_session_never_fails() {
    let app = TestApp::new().await;

    let res = app.post_empty("/tenant-access/impersonate/end", Auth::None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["ended"], false);
    assert_eq!(res.data()["redirect_to"], "/login");

    let res = app.post_empty("/tenant-access/impersonate/end", Auth::Cookie("garbage")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["redirect_to"], "/login");

    // a normal session is left alone
    let root = app.login_root().await;
    let res = app.post_empty("/tenant-access/impersonate/end", Auth::Cookie(&root)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["ended"], false);
    assert_eq!(res.data()["redirect_to"], "/");
    assert!(res.session_cookie().is_none());
    assert_eq!(app.get("/auth/whoami", Auth::Cookie(&root)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn access_options_follow_the_grants() {
    let app = TestApp::new().await;

    let ops = app.login_ops().await;
    let res = app.get("/tenants/access-options", Auth::Bearer(&ops)).await;
    assert_eq!(res.status, StatusCode::OK);
    let options = res.data().as_array().unwrap();
    assert_eq!(options.len(), 2);
    let acme = options.iter().find(|o| o["tenant_id"] == ACME).unwrap();
    assert_eq!(acme["can_impersonate"], true);
    assert_eq!(acme["can_secure_login"], false);
    let globex = options.iter().find(|o| o["tenant_id"] == GLOBEX).unwrap();
    assert_eq!(globex["access_level"], "read");
    assert_eq!(globex["can_impersonate"], false);

    // inactive tenants are never offered
    let root = app.login_root().await;
    let res = app.get("/tenants/access-options", Auth::Bearer(&root)).await;
    let options = res.data().as_array().unwrap();
    assert!(options.iter().all(|o| o["tenant_id"] != INITECH));
    assert!(options.iter().all(|o| o["can_secure_login"] == true));

    let alice = app.login(Some("acme"), "alice@acme.test").await;
    let res = app.get("/tenants/access-options", Auth::Bearer(&alice)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_users_can_be_listed_with_a_grant() {
    let app = TestApp::new().await;
    let ops = app.login_ops().await;

    let res = app.get(&format!("/tenants/{}/users", ACME), Auth::Bearer(&ops)).await;
    assert_eq!(res.status, StatusCode::OK);
    let users = res.data().as_array().unwrap();
    assert_eq!(users.len(), 3);
    assert!(users.iter().all(|u| u["tenant_id"] == ACME));

    let res = app.get(&format!("/tenants/{}/users", INITECH), Auth::Bearer(&ops)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}
