// handlers/protected/auth/session.rs - whoami / logout

use axum::extract::{Extension, State};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::context::WhoAmI;
use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::middleware::{clear_session_cookie, ApiResponse, ApiResult};

/// GET /auth/whoami - Current principal, session type and resolved permissions
pub async fn whoami_get(Extension(ctx): Extension<AuthContext>) -> ApiResult<WhoAmI> {
    Ok(ApiResponse::success(ctx.summary()))
}

#[derive(Debug, Serialize)]
pub struct LogoutView {
    pub session_id: Uuid,
    pub revoked: bool,
}

/// POST /auth/logout - Revoke the current session and clear the cookie
pub async fn logout_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<LogoutView>), ApiError> {
    let outcome = state.sessions().revoke(&ctx.claims).await?;
    info!(target: "audit", user_id = %ctx.user.id, session_id = %ctx.session_id(), "logout");

    let jar = clear_session_cookie(jar, state.cookie_secure());
    Ok((
        jar,
        ApiResponse::success(LogoutView {
            session_id: ctx.session_id(),
            revoked: outcome == crate::store::RevokeOutcome::Revoked,
        }),
    ))
}
