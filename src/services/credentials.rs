use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::{verify_password_blocking, MfaService, SessionIssuer};
use crate::auth::{password, IssuedToken, SessionAccess};
use crate::store::{SharedStore, UserRecord};

static UNKNOWN_ACCOUNT_HASH: Lazy<Option<String>> =
    Lazy::new(|| password::hash_password("no-such-account").ok());

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    /// Tenant slug; omitted for platform users
    #[serde(default)]
    pub tenant: Option<String>,
    pub email: String,
    pub password: String,
    /// TOTP or backup code, required once MFA is enabled
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub issued: IssuedToken,
    pub user: UserRecord,
}

/// Checks primary credentials and the second factor, then opens a normal session
#[derive(Clone)]
pub struct CredentialVerifier {
    store: SharedStore,
    sessions: SessionIssuer,
    mfa: MfaService,
}

impl CredentialVerifier {
    pub fn new(store: SharedStore, sessions: SessionIssuer, mfa: MfaService) -> Self {
        Self { store, sessions, mfa }
    }

    pub async fn login(&self, request: &LoginRequest) -> ServiceResult<LoginOutcome> {
        let email = request.email.trim();
        if email.is_empty() || request.password.is_empty() {
            return Err(ServiceError::bad_request("Email and password are required"));
        }

        let tenant = match request.tenant.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => match self.store.find_tenant_by_slug(slug).await? {
                Some(tenant) => Some(tenant),
                None => return self.reject_unknown(&request.password).await,
            },
            None => None,
        };
        let tenant_id: Option<Uuid> = tenant.as_ref().map(|t| t.id);

        let Some(user) = self.store.find_user_by_email(tenant_id, email).await? else {
            return self.reject_unknown(&request.password).await;
        };

        if !verify_password_blocking(&request.password, &user.password_hash).await? {
            warn!(target: "audit", user_id = %user.id, "login rejected: bad password");
            return Err(ServiceError::invalid_credentials());
        }

        if !user.is_active {
            return Err(ServiceError::forbidden("Account is disabled"));
        }
        if tenant.as_ref().is_some_and(|t| !t.is_active) {
            return Err(ServiceError::forbidden("Tenant is disabled"));
        }

        if let Some(record) = self.store.find_mfa(user.id).await?.filter(|r| r.enabled) {
            let code = request
                .code
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or(ServiceError::MfaRequired)?;
            if !self.mfa.verify_second_factor(&record, code).await? {
                warn!(target: "audit", user_id = %user.id, "login rejected: bad second factor");
                return Err(ServiceError::unauthorized("Invalid verification code"));
            }
        }

        let issued = self.sessions.open(&user, user.tenant_id, SessionAccess::Normal).await?;
        info!(target: "audit", user_id = %user.id, session_id = %issued.claims.jti, "login");

        Ok(LoginOutcome { issued, user })
    }

    /// Unknown tenants and emails still pay for one argon2 verification so
    /// response time does not reveal which accounts exist.
    async fn reject_unknown(&self, candidate: &str) -> ServiceResult<LoginOutcome> {
        if let Some(phc) = UNKNOWN_ACCOUNT_HASH.as_deref() {
            verify_password_blocking(candidate, phc).await?;
        }
        Err(ServiceError::invalid_credentials())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{mfa, TokenService};
    use crate::config::MfaConfig;
    use crate::store::{MemoryStore, MfaRecord, Store, TenantRecord};
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::time::{Duration as StdDuration, Instant};

    static HASH: Lazy<String> = Lazy::new(|| password::hash_password("s3cret-pass").unwrap());

    struct Harness {
        store: Arc<MemoryStore>,
        verifier: CredentialVerifier,
        tenant_id: Uuid,
        user_id: Uuid,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let tenant_id = Uuid::new_v4();
        store
            .insert_tenant(TenantRecord {
                id: tenant_id,
                slug: "acme".into(),
                name: "Acme".into(),
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let user_id = Uuid::new_v4();
        store
            .insert_user(UserRecord {
                id: user_id,
                tenant_id: Some(tenant_id),
                email: "alice@acme.test".into(),
                name: "Alice".into(),
                password_hash: HASH.clone(),
                platform_role: None,
                roles: vec![],
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let tokens = Arc::new(TokenService::with_ttls("secret", "test", Duration::hours(1), Duration::minutes(10)));
        let sessions = SessionIssuer::new(store.clone(), tokens);
        let mfa = MfaService::new(
            store.clone(),
            MfaConfig { issuer: "test".into(), backup_code_count: 2, step_window: 1 },
        );
        let verifier = CredentialVerifier::new(store.clone(), sessions, mfa);
        Harness { store, verifier, tenant_id, user_id }
    }

    fn request(password: &str, code: Option<&str>) -> LoginRequest {
        LoginRequest {
            tenant: Some("acme".into()),
            email: "ALICE@acme.test".into(),
            password: password.into(),
            code: code.map(String::from),
        }
    }

    #[tokio::test]
    async fn valid_credentials_open_a_recorded_session() {
        let h = harness().await;
        let outcome = h.verifier.login(&request("s3cret-pass", None)).await.unwrap();
        assert_eq!(outcome.user.id, h.user_id);
        assert_eq!(outcome.issued.claims.tenant, Some(h.tenant_id));

        let record = h.store.find_session(outcome.issued.claims.jti).await.unwrap().unwrap();
        assert!(record.is_active_at(Utc::now()));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_tenant_look_the_same() {
        let h = harness().await;
        let bad_password = h.verifier.login(&request("nope", None)).await.unwrap_err();
        let mut other_tenant = request("s3cret-pass", None);
        other_tenant.tenant = Some("globex".into());
        let bad_tenant = h.verifier.login(&other_tenant).await.unwrap_err();

        assert_eq!(bad_password.to_string(), "Invalid credentials");
        assert_eq!(bad_tenant.to_string(), "Invalid credentials");
    }

    async fn time_rejection(verifier: &CredentialVerifier, request: &LoginRequest) -> StdDuration {
        let mut total = StdDuration::ZERO;
        for _ in 0..3 {
            let started = Instant::now();
            let err = verifier.login(request).await.unwrap_err();
            total += started.elapsed();
            assert_eq!(err.to_string(), "Invalid credentials");
        }
        total / 3
    }

    #[tokio::test]
    async fn unknown_accounts_still_run_the_password_hasher() {
        let h = harness().await;
        // Warm the shared hashes so neither side pays for lazy init
        let _ = h.verifier.login(&request("nope", None)).await;
        let mut warm = request("nope", None);
        warm.email = "warmup@acme.test".into();
        let _ = h.verifier.login(&warm).await;

        let known = time_rejection(&h.verifier, &request("nope", None)).await;

        let mut unknown_email = request("nope", None);
        unknown_email.email = "nobody@acme.test".into();
        let missing_user = time_rejection(&h.verifier, &unknown_email).await;

        let mut unknown_tenant = request("nope", None);
        unknown_tenant.tenant = Some("globex".into());
        let missing_tenant = time_rejection(&h.verifier, &unknown_tenant).await;

        assert!(missing_user * 4 >= known, "unknown email {:?} vs known {:?}", missing_user, known);
        assert!(missing_tenant * 4 >= known, "unknown tenant {:?} vs known {:?}", missing_tenant, known);
    }

    #[tokio::test]
    async fn disabled_user_is_forbidden() {
        let h = harness().await;
        h.store.set_user_active(h.user_id, false).await.unwrap();
        let err = h.verifier.login(&request("s3cret-pass", None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn enabled_mfa_demands_a_code() {
        let h = harness().await;
        let secret = mfa::generate_secret();
        h.store
            .save_mfa(MfaRecord {
                user_id: h.user_id,
                secret: secret.clone(),
                enabled: true,
                backup_code_hashes: vec![],
                last_used_step: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let err = h.verifier.login(&request("s3cret-pass", None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::MfaRequired));

        let code = mfa::code_at(&secret, Utc::now().timestamp()).unwrap();
        h.verifier.login(&request("s3cret-pass", Some(&code))).await.unwrap();

        let replay = h.verifier.login(&request("s3cret-pass", Some(&code))).await.unwrap_err();
        assert!(matches!(replay, ServiceError::Unauthorized(_)));
    }
}
