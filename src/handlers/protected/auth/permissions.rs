// handlers/protected/auth/permissions.rs - Permission set inspection

use axum::extract::{rejection::JsonRejection, Extension};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::rbac::{check, MatchMode, PermissionSet};

#[derive(Debug, Serialize)]
pub struct PermissionsView {
    pub access_type: &'static str,
    pub permissions: PermissionSet,
}

/// GET /auth/permissions
pub async fn permissions_get(Extension(ctx): Extension<AuthContext>) -> ApiResult<PermissionsView> {
    Ok(ApiResponse::success(PermissionsView {
        access_type: ctx.session().access_type().as_str(),
        permissions: ctx.permissions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub required: Vec<String>,
    #[serde(default)]
    pub mode: MatchMode,
}

#[derive(Debug, Serialize)]
pub struct CheckView {
    pub allowed: bool,
    pub mode: MatchMode,
    pub missing: Vec<String>,
}

/// POST /auth/permissions/check - Evaluate `{ "required": [...], "mode": "all" | "any" }`
/// against the caller's current permissions
pub async fn permissions_check_post(
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> ApiResult<CheckView> {
    let Json(request) = payload?;
    let allowed = check(&ctx.permissions, &request.required, request.mode);
    let missing = ctx
        .permissions
        .missing(&request.required)
        .into_iter()
        .map(String::from)
        .collect();

    Ok(ApiResponse::success(CheckView {
        allowed,
        mode: request.mode,
        missing,
    }))
}
