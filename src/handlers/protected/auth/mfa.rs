// handlers/protected/auth/mfa.rs - TOTP enrollment for the signed-in account

use axum::extract::{rejection::JsonRejection, Extension, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::mfa::{MfaEnrollment, MfaStatus};

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MfaChanged {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct BackupCodes {
    pub backup_codes: Vec<String>,
}

/// GET /auth/mfa
pub async fn mfa_status_get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<MfaStatus> {
    Ok(ApiResponse::success(state.mfa().status(&ctx).await?))
}

/// POST /auth/mfa/setup - Returns the secret, an `otpauth://` URI for the QR
/// code and one-time backup codes. MFA stays off until `/auth/mfa/verify`.
pub async fn mfa_setup_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<MfaEnrollment> {
    Ok(ApiResponse::created(state.mfa().setup(&ctx).await?))
}

/// POST /auth/mfa/verify
pub async fn mfa_verify_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<CodeRequest>, JsonRejection>,
) -> ApiResult<MfaChanged> {
    let Json(request) = payload?;
    state.mfa().verify(&ctx, &request.code).await?;
    Ok(ApiResponse::success(MfaChanged { enabled: true }))
}

/// POST /auth/mfa/disable
pub async fn mfa_disable_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> ApiResult<MfaChanged> {
    let Json(request) = payload?;
    state.mfa().disable(&ctx, &request.password).await?;
    Ok(ApiResponse::success(MfaChanged { enabled: false }))
}

/// POST /auth/mfa/backup-codes
pub async fn mfa_backup_codes_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<CodeRequest>, JsonRejection>,
) -> ApiResult<BackupCodes> {
    let Json(request) = payload?;
    let backup_codes = state.mfa().regenerate_backup_codes(&ctx, &request.code).await?;
    Ok(ApiResponse::success(BackupCodes { backup_codes }))
}
