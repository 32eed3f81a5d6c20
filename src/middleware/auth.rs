use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use super::cookies::session_token;
use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::rbac::resolve_permissions;

/// Session middleware: validates the token and its session record, loads the
/// acting user and resolves permissions, then injects an [`AuthContext`]
pub async fn session_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers(), &jar)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let context = authenticate(&state, &token).await?;
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthContext, ApiError> {
    let claims = state.tokens.decode(token)?;

    let active = state
        .store
        .find_session(claims.jti)
        .await?
        .is_some_and(|s| s.is_active_at(Utc::now()));
    if !active {
        return Err(ApiError::unauthorized("Session has ended"));
    }

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("Account is no longer active"))?;

    let original_user = match claims.session.original() {
        Some(original) => Some(
            state
                .store
                .find_user(original.user_id)
                .await?
                .filter(|u| u.is_active)
                .ok_or_else(|| ApiError::unauthorized("Original account is no longer active"))?,
        ),
        None => None,
    };

    if let Some(tenant_id) = claims.tenant {
        let tenant_active = state
            .store
            .find_tenant(tenant_id)
            .await?
            .is_some_and(|t| t.is_active);
        if !tenant_active {
            return Err(ApiError::unauthorized("Tenant is no longer active"));
        }
    }

    // recomputed on every request
    let permissions = resolve_permissions(state.store.as_ref(), &claims.session, &user).await?;

    Ok(AuthContext {
        claims,
        user,
        original_user,
        permissions,
    })
}
