use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::rbac::{check, MatchMode};

/// Permission requirement attached to a route with `route_layer`
#[derive(Debug, Clone)]
pub struct RequirePermissions {
    pub required: Vec<&'static str>,
    pub mode: MatchMode,
}

impl RequirePermissions {
    pub fn all(required: &[&'static str]) -> Self {
        Self { required: required.to_vec(), mode: MatchMode::All }
    }

    pub fn any(required: &[&'static str]) -> Self {
        Self { required: required.to_vec(), mode: MatchMode::Any }
    }
}

/// Runs after `session_auth`; rejects the request unless the resolved
/// permission set satisfies the route's requirement
pub async fn require_permissions(
    State(requirement): State<RequirePermissions>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !check(&context.permissions, &requirement.required, requirement.mode) {
        let missing = context.permissions.missing(&requirement.required);
        warn!(
            target: "audit",
            user_id = %context.user.id,
            path = %request.uri().path(),
            missing = ?missing,
            "permission denied"
        );
        let message = match requirement.mode {
            MatchMode::All => format!("Missing required permissions: {}", missing.join(", ")),
            MatchMode::Any => format!("Requires one of: {}", requirement.required.join(", ")),
        };
        return Err(ApiError::forbidden(message));
    }

    Ok(next.run(request).await)
}
