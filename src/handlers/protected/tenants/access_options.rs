// handlers/protected/tenants/access_options.rs - GET /tenants/access-options

use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::elevation::AccessOption;

/// Tenants the caller can enter, with the ways they can enter them
///
/// ```json
/// { "success": true, "data": [
///   { "tenant_id": "uuid", "slug": "acme", "name": "Acme Corp",
///     "access_level": "write", "can_impersonate": true, "can_secure_login": false }
/// ] }
/// ```
pub async fn access_options_get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Vec<AccessOption>> {
    Ok(ApiResponse::success(state.gate().access_options(&ctx).await?))
}
