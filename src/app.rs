use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::auth::TokenService;
use crate::config::{AppConfig, StoreBackend, StoreConfig};
use crate::handlers::{elevated, protected, public};
use crate::middleware::{require_permissions, session_auth, RequirePermissions};
use crate::rbac;
use crate::services::{CredentialVerifier, ElevationGate, MfaService, SessionIssuer};
use crate::store::fixture::Fixture;
use crate::store::{MemoryStore, PgStore, SharedStore};

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: SharedStore) -> Self {
        let tokens = Arc::new(TokenService::new(&config.security));
        Self {
            config: Arc::new(config),
            store,
            tokens,
        }
    }

    pub fn cookie_secure(&self) -> bool {
        self.config.security.cookie_secure
    }

    pub fn sessions(&self) -> SessionIssuer {
        SessionIssuer::new(self.store.clone(), self.tokens.clone())
    }

    pub fn mfa(&self) -> MfaService {
        MfaService::new(self.store.clone(), self.config.mfa.clone())
    }

    pub fn credentials(&self) -> CredentialVerifier {
        CredentialVerifier::new(self.store.clone(), self.sessions(), self.mfa())
    }

    pub fn gate(&self) -> ElevationGate {
        ElevationGate::new(self.store.clone(), self.sessions(), self.config.security.clone())
    }
}

/// Open the configured store. The memory backend is seeded from the fixture
/// file when one is configured; Postgres gets its schema applied.
pub async fn build_store(config: &StoreConfig) -> anyhow::Result<SharedStore> {
    match config.backend {
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            if let Some(path) = &config.fixture_path {
                let summary = Fixture::load(path)?.apply(&store).await?;
                info!(
                    "Loaded fixture {}: {} tenants, {} roles, {} users, {} grants",
                    path, summary.tenants, summary.roles, summary.users, summary.grants
                );
            } else {
                warn!("Memory store started without a fixture; nobody can log in");
            }
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(config).await?;
            store.migrate().await?;
            info!("Connected to Postgres store");
            Ok(Arc::new(store))
        }
    }
}

/// Periodically delete expired session records. Returns `None` when the
/// interval is zero.
pub fn spawn_session_purge(store: SharedStore, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        warn!("Session purge disabled; expired sessions will accumulate");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_sessions(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired sessions"),
                Err(e) => warn!("Session purge failed: {}", e),
            }
        }
    }))
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Session teardown works with or without a live session
        .merge(elevated_routes())
        // Everything else needs a session
        .merge(protected_routes(state.clone()))
        .layer(TraceLayer::new_for_http());

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config));
    }

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(public::auth::login_post))
}

fn elevated_routes() -> Router<AppState> {
    Router::new()
        .route("/tenant-access/impersonate/end", post(elevated::end_post))
        .route("/tenant-access/secure-login/end", post(elevated::end_post))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{auth, tenants};

    Router::new()
        .route("/auth/logout", post(auth::logout_post))
        .route("/auth/whoami", get(auth::whoami_get))
        .route("/auth/permissions", get(auth::permissions_get))
        .route("/auth/permissions/check", post(auth::permissions_check_post))
        .route("/auth/mfa", get(auth::mfa_status_get))
        .route("/auth/mfa/setup", post(auth::mfa_setup_post))
        .route("/auth/mfa/verify", post(auth::mfa_verify_post))
        .route("/auth/mfa/disable", post(auth::mfa_disable_post))
        .route("/auth/mfa/backup-codes", post(auth::mfa_backup_codes_post))
        .merge(guarded(
            Router::new().route("/tenants/access-options", get(tenants::access_options_get)),
            RequirePermissions::all(&[rbac::TENANTS_READ]),
        ))
        .merge(guarded(
            Router::new().route("/tenants/impersonate", post(tenants::impersonate_post)),
            RequirePermissions::all(&[rbac::TENANTS_IMPERSONATE]),
        ))
        .merge(guarded(
            Router::new().route("/tenants/secure-login", post(tenants::secure_login_post)),
            RequirePermissions::all(&[rbac::TENANTS_SECURE_LOGIN]),
        ))
        .merge(guarded(
            Router::new().route("/tenants/:tenant_id/users", get(tenants::users_get)),
            RequirePermissions::all(&[rbac::TENANTS_USERS_READ]),
        ))
        .route_layer(from_fn_with_state(state, session_auth))
}

fn guarded(routes: Router<AppState>, requirement: RequirePermissions) -> Router<AppState> {
    routes.route_layer(from_fn_with_state(requirement, require_permissions))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    // cookies need credentials, which rules out wildcard origins
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Tenant Admin API",
            "version": version,
            "description": "Multi-tenant administration backend: authentication, RBAC, MFA and tenant session elevation",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "/auth/login (public - token acquisition)",
                "auth": "/auth/{whoami,logout,permissions,permissions/check} (session)",
                "mfa": "/auth/mfa[/setup,/verify,/disable,/backup-codes] (session)",
                "tenants": "/tenants/{access-options,impersonate,secure-login,:tenant_id/users} (session + permissions)",
                "tenant_access": "/tenant-access/{impersonate,secure-login}/end (session optional)",
            }
        }
    }))
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
