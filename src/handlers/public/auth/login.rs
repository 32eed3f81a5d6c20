// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;

use crate::app::AppState;
use crate::error::ApiError;
use crate::handlers::views::SessionView;
use crate::middleware::{set_session_cookie, ApiResponse};
use crate::services::LoginRequest;

/// POST /auth/login - Authenticate and receive a session token
///
/// Expected Input:
/// ```json
/// {
///   "tenant": "acme",              // Optional: tenant slug, omit for platform users
///   "email": "alice@acme.test",
///   "password": "...",
///   "code": "123456"               // Optional: TOTP or backup code once MFA is on
/// }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "session_id": "uuid",
///     "access_type": "normal",
///     "expires_at": 1760000000,
///     "tenant_id": "uuid",
///     "user": { "id": "uuid", "email": "alice@acme.test", ... }
///   }
/// }
/// ```
///
/// Bad credentials answer 401 `UNAUTHORIZED` without saying which part was
/// wrong; a missing second factor answers 401 `MFA_REQUIRED`.
pub async fn login_post(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<SessionView>), ApiError> {
    let Json(request) = payload?;

    let outcome = state.credentials().login(&request).await?;
    let jar = set_session_cookie(jar, &outcome.issued.token, state.cookie_secure());

    Ok((jar, ApiResponse::success(SessionView::new(&outcome.issued, &outcome.user))))
}
