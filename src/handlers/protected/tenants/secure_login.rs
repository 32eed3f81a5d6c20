// handlers/protected/tenants/secure_login.rs - POST /tenants/secure-login

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
pub struct SecureLoginRequest {
    pub tenant_id: Uuid,
}

/// Super-admin access to a tenant without taking over any user's identity
pub async fn secure_login_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
    payload: Result<Json<SecureLoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<SessionView>), ApiError> {
    let Json(request) = payload?;

    let elevation = state.gate().begin_secure_login(&ctx, request.tenant_id).await?;

    let jar = set_session_cookie(jar, &elevation.issued.token, state.cookie_secure());
    let view = SessionView::new(&elevation.issued, &elevation.subject)
        .with_tenant(&elevation.tenant)
        .with_redirect(elevation.redirect_to);

    Ok((jar, ApiResponse::created(view)))
}
