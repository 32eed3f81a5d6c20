use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::error::{ServiceError, ServiceResult};
use super::verify_password_blocking;
use crate::auth::mfa;
use crate::auth::AuthContext;
use crate::config::MfaConfig;
use crate::store::{MfaRecord, SharedStore, UserRecord};

#[derive(Debug, Serialize)]
pub struct MfaEnrollment {
    pub secret: String,
    pub otpauth_uri: String,
    /// Shown once; only hashes are stored
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MfaStatus {
    pub enabled: bool,
    pub backup_codes_remaining: usize,
}

/// TOTP enrollment and second-factor checks
#[derive(Clone)]
pub struct MfaService {
    store: SharedStore,
    config: MfaConfig,
}

impl MfaService {
    pub fn new(store: SharedStore, config: MfaConfig) -> Self {
        Self { store, config }
    }

    /// Accepts either a TOTP code (each time step at most once) or an unused backup code
    pub async fn verify_second_factor(&self, record: &MfaRecord, code: &str) -> ServiceResult<bool> {
        if mfa::is_totp_shaped(code) {
            let now = Utc::now().timestamp();
            return match mfa::verify_code(&record.secret, code, now, self.config.step_window)? {
                Some(step) => Ok(self.store.advance_totp_step(record.user_id, step).await?),
                None => Ok(false),
            };
        }

        let hash = mfa::hash_backup_code(code);
        let consumed = self.store.consume_backup_code(record.user_id, &hash).await?;
        if consumed {
            info!(target: "audit", user_id = %record.user_id, "backup code consumed");
        }
        Ok(consumed)
    }

    pub async fn status(&self, ctx: &AuthContext) -> ServiceResult<MfaStatus> {
        let record = self.store.find_mfa(ctx.user.id).await?;
        Ok(MfaStatus {
            enabled: record.as_ref().is_some_and(|r| r.enabled),
            backup_codes_remaining: record
                .filter(|r| r.enabled)
                .map(|r| r.backup_code_hashes.len())
                .unwrap_or(0),
        })
    }

    /// Starts (or restarts) a pending enrollment
    pub async fn setup(&self, ctx: &AuthContext) -> ServiceResult<MfaEnrollment> {
        let user = own_account(ctx)?;
        if let Some(existing) = self.store.find_mfa(user.id).await? {
            if existing.enabled {
                return Err(ServiceError::conflict("MFA is already enabled"));
            }
        }

        let secret = mfa::generate_secret();
        let otpauth_uri = mfa::otpauth_uri(&self.config.issuer, &user.email, &secret)?;
        let backup_codes = mfa::generate_backup_codes(self.config.backup_code_count);

        self.store
            .save_mfa(MfaRecord {
                user_id: user.id,
                secret: secret.clone(),
                enabled: false,
                backup_code_hashes: backup_codes.iter().map(|c| mfa::hash_backup_code(c)).collect(),
                last_used_step: None,
                created_at: Utc::now(),
            })
            .await?;

        info!(target: "audit", user_id = %user.id, "mfa enrollment started");
        Ok(MfaEnrollment { secret, otpauth_uri, backup_codes })
    }

    /// Confirms a pending enrollment with a code from the authenticator
    pub async fn verify(&self, ctx: &AuthContext, code: &str) -> ServiceResult<()> {
        let user = own_account(ctx)?;
        let mut record = match self.store.find_mfa(user.id).await? {
            Some(record) if !record.enabled => record,
            _ => return Err(ServiceError::bad_request("No pending MFA enrollment")),
        };

        let step = self.accept_totp(&record, code).await?;
        record.enabled = true;
        record.last_used_step = Some(step);
        self.store.save_mfa(record).await?;

        info!(target: "audit", user_id = %user.id, "mfa enabled");
        Ok(())
    }

    pub async fn disable(&self, ctx: &AuthContext, password: &str) -> ServiceResult<()> {
        let user = own_account(ctx)?;
        if !verify_password_blocking(password, &user.password_hash).await? {
            return Err(ServiceError::unauthorized("Invalid password"));
        }
        if self.store.find_mfa(user.id).await?.is_none() {
            return Err(ServiceError::bad_request("MFA is not enabled"));
        }

        self.store.delete_mfa(user.id).await?;
        info!(target: "audit", user_id = %user.id, "mfa disabled");
        Ok(())
    }

    /// Replaces every backup code; requires a current TOTP code
    pub async fn regenerate_backup_codes(&self, ctx: &AuthContext, code: &str) -> ServiceResult<Vec<String>> {
        let user = own_account(ctx)?;
        let mut record = match self.store.find_mfa(user.id).await? {
            Some(record) if record.enabled => record,
            _ => return Err(ServiceError::bad_request("MFA is not enabled")),
        };

        let step = self.accept_totp(&record, code).await?;
        let codes = mfa::generate_backup_codes(self.config.backup_code_count);
        record.backup_code_hashes = codes.iter().map(|c| mfa::hash_backup_code(c)).collect();
        record.last_used_step = Some(step);
        self.store.save_mfa(record).await?;

        info!(target: "audit", user_id = %user.id, "backup codes regenerated");
        Ok(codes)
    }

    async fn accept_totp(&self, record: &MfaRecord, code: &str) -> ServiceResult<i64> {
        let now = Utc::now().timestamp();
        let step = mfa::verify_code(&record.secret, code, now, self.config.step_window)?
            .ok_or_else(|| ServiceError::bad_request("Invalid verification code"))?;
        if !self.store.advance_totp_step(record.user_id, step).await? {
            return Err(ServiceError::bad_request("Verification code already used"));
        }
        Ok(step)
    }
}

/// MFA settings belong to the real account holder, never to an elevated session
fn own_account(ctx: &AuthContext) -> ServiceResult<&UserRecord> {
    if ctx.is_elevated() {
        return Err(ServiceError::forbidden("MFA settings cannot be changed during an elevated session"));
    }
    Ok(&ctx.user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionAccess, SessionClaims};
    use crate::rbac::PermissionSet;
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;
    use uuid::Uuid;

    fn config() -> MfaConfig {
        MfaConfig { issuer: "Tenant Admin".into(), backup_code_count: 4, step_window: 1 }
    }

    fn context(session: SessionAccess) -> AuthContext {
        let user_id = Uuid::new_v4();
        AuthContext {
            claims: SessionClaims {
                sub: user_id,
                email: "ops@platform.test".into(),
                tenant: None,
                jti: Uuid::new_v4(),
                iat: 0,
                exp: i64::MAX,
                iss: "test".into(),
                session,
            },
            user: UserRecord {
                id: user_id,
                tenant_id: None,
                email: "ops@platform.test".into(),
                name: "Ops".into(),
                password_hash: String::new(),
                platform_role: None,
                roles: vec![],
                is_active: true,
                created_at: Utc::now(),
            },
            original_user: None,
            permissions: PermissionSet::new(),
        }
    }

    #[tokio::test]
    async fn enrollment_then_totp_is_single_use() {
        let store = Arc::new(MemoryStore::new());
        let service = MfaService::new(store.clone(), config());
        let ctx = context(SessionAccess::Normal);

        let enrollment = service.setup(&ctx).await.unwrap();
        assert_eq!(enrollment.backup_codes.len(), 4);

        let code = mfa::code_at(&enrollment.secret, Utc::now().timestamp()).unwrap();
        service.verify(&ctx, &code).await.unwrap();

        let record = store.find_mfa(ctx.user.id).await.unwrap().unwrap();
        assert!(record.enabled);
        // the same code cannot pass the second-factor check afterwards
        assert!(!service.verify_second_factor(&record, &code).await.unwrap());

        let err = service.setup(&ctx).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn backup_codes_work_once() {
        let store = Arc::new(MemoryStore::new());
        let service = MfaService::new(store.clone(), config());
        let ctx = context(SessionAccess::Normal);

        let enrollment = service.setup(&ctx).await.unwrap();
        let record = store.find_mfa(ctx.user.id).await.unwrap().unwrap();
        let backup = enrollment.backup_codes[0].to_uppercase();

        assert!(service.verify_second_factor(&record, &backup).await.unwrap());
        assert!(!service.verify_second_factor(&record, &backup).await.unwrap());
    }

    #[tokio::test]
    async fn elevated_sessions_cannot_touch_mfa() {
        let service = MfaService::new(Arc::new(MemoryStore::new()), config());
        let ctx = context(SessionAccess::SecureLogin {
            target_tenant: Uuid::new_v4(),
            original: crate::auth::OriginalPrincipal { user_id: Uuid::new_v4(), email: "root@platform.test".into() },
        });

        assert!(matches!(service.setup(&ctx).await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(service.verify(&ctx, "123456").await, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn verify_without_pending_enrollment_is_bad_request() {
        let service = MfaService::new(Arc::new(MemoryStore::new()), config());
        let ctx = context(SessionAccess::Normal);
        assert!(matches!(service.verify(&ctx, "123456").await, Err(ServiceError::BadRequest(_))));
    }
}
