// handlers/protected/tenants/impersonate.rs - POST /tenants/impersonate

use axum::extract::{rejection::JsonRejection, Extension, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::handlers::views::SessionView;
use crate::middleware::{set_session_cookie, ApiResponse};

#[derive(Debug, Deserialize)]
pub struct ImpersonateRequest {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

/// Start acting as a tenant user. Requires a tenant access grant with
/// `can_impersonate`; the new token replaces the session cookie and keeps the
/// caller as its original principal.
pub async fn impersonate_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
    payload: Result<Json<ImpersonateRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<SessionView>), ApiError> {
    let Json(request) = payload?;

    let elevation = state
        .gate()
        .begin_impersonation(&ctx, request.tenant_id, request.user_id)
        .await?;

    let jar = set_session_cookie(jar, &elevation.issued.token, state.cookie_secure());
    let view = SessionView::new(&elevation.issued, &elevation.subject)
        .with_tenant(&elevation.tenant)
        .with_redirect(elevation.redirect_to);

    Ok((jar, ApiResponse::created(view)))
}
