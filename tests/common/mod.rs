#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use tenant_admin_api::app::{app, AppState};
use tenant_admin_api::config::AppConfig;
use tenant_admin_api::store::fixture::Fixture;
use tenant_admin_api::store::{MemoryStore, SharedStore};

pub const PASSWORD: &str = "demo-pass";

pub const ACME: &str = "11111111-1111-4111-8111-111111111111";
pub const GLOBEX: &str = "22222222-2222-4222-8222-222222222222";
pub const INITECH: &str = "33333333-3333-4333-8333-333333333333";

pub const ROOT: &str = "aaaaaaaa-0000-4000-8000-000000000001";
pub const OPS: &str = "aaaaaaaa-0000-4000-8000-000000000002";
pub const ALICE: &str = "bbbbbbbb-0000-4000-8000-000000000001";
pub const BOB: &str = "bbbbbbbb-0000-4000-8000-000000000002";
pub const CAROL: &str = "bbbbbbbb-0000-4000-8000-000000000003";
pub const GINA: &str = "cccccccc-0000-4000-8000-000000000001";
pub const PETER: &str = "dddddddd-0000-4000-8000-000000000001";

pub fn fixture_path() -> String {
    format!("{}/fixtures/demo.yaml", env!("CARGO_MANIFEST_DIR"))
}

// ---------------------------------------------------------------------------
// In-process router over a memory store seeded from the demo fixture
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub store: SharedStore,
    /// Same store, for toggling fixture records mid-test
    pub memory: Arc<MemoryStore>,
    pub config: AppConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn code(&self) -> Option<&str> {
        self.body["code"].as_str()
    }

    /// Value of the `Authentication` cookie set by this response, if any.
    /// A removal cookie yields `Some("")`.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookie.iter().find_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (name.trim() == "Authentication").then(|| value.trim().to_string())
        })
    }

    pub fn session_cookie_header(&self) -> Option<&str> {
        self.set_cookie.iter().map(String::as_str).find(|raw| raw.starts_with("Authentication="))
    }
}

/// How a request carries its session
pub enum Auth<'a> {
    None,
    Bearer(&'a str),
    Cookie(&'a str),
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::development()).await
    }

    pub async fn with_config(mut config: AppConfig) -> Self {
        config.store.fixture_path = None;
        config.security.jwt_secret = "integration-test-secret".to_string();

        let memory = Arc::new(MemoryStore::new());
        Fixture::load(fixture_path())
            .expect("demo fixture parses")
            .apply(&memory)
            .await
            .expect("demo fixture applies");
        let store: SharedStore = memory.clone();

        let state = AppState::new(config.clone(), store.clone());
        Self { router: app(state), store, memory, config }
    }

    pub async fn send(&self, method: Method, path: &str, auth: Auth<'_>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        builder = match auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            Auth::Cookie(token) => builder.header(header::COOKIE, format!("Authentication={}", token)),
        };
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(String::from))
            .collect();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, set_cookie, body }
    }

    pub async fn get(&self, path: &str, auth: Auth<'_>) -> TestResponse {
        self.send(Method::GET, path, auth, None).await
    }

    pub async fn post(&self, path: &str, auth: Auth<'_>, body: Value) -> TestResponse {
        self.send(Method::POST, path, auth, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str, auth: Auth<'_>) -> TestResponse {
        self.send(Method::POST, path, auth, None).await
    }

    /// Log in and return the session token
    pub async fn login(&self, tenant: Option<&str>, email: &str) -> String {
        let res = self
            .post(
                "/auth/login",
                Auth::None,
                serde_json::json!({ "tenant": tenant, "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login failed for {}: {}", email, res.body);
        res.data()["token"].as_str().expect("token in login response").to_string()
    }

    pub async fn login_root(&self) -> String {
        self.login(None, "root@platform.test").await
    }

    pub async fn login_ops(&self) -> String {
        self.login(None, "ops@platform.test").await
    }
}

// ---------------------------------------------------------------------------
// Spawned server binary, for end-to-end checks over a real socket
// ---------------------------------------------------------------------------

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tenant-admin-api"));
        cmd.env("APP_ENV", "development")
            .env("TENANT_ADMIN_PORT", port.to_string())
            .env("HOST", "127.0.0.1")
            .env("STORE_BACKEND", "memory")
            .env("STORE_FIXTURE", fixture_path())
            .env("JWT_SECRET", "spawned-server-secret")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(20)).await?;
    Ok(server)
}
