// handlers/protected/tenants/users.rs - GET /tenants/:tenant_id/users

use axum::extract::{Extension, Path, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::handlers::views::UserSummary;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn users_get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Vec<UserSummary>> {
    let users = state.gate().list_tenant_users(&ctx, tenant_id).await?;
    Ok(ApiResponse::success(users.iter().map(UserSummary::from).collect()))
}
