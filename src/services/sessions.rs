use std::sync::Arc;
use uuid::Uuid;

use super::error::ServiceResult;
use crate::auth::{IssuedToken, SessionAccess, SessionClaims, TokenError, TokenService};
use crate::store::{RevokeOutcome, SessionRecord, SharedStore, UserRecord};

/// Mints tokens and keeps the session table in step with them
#[derive(Clone)]
pub struct SessionIssuer {
    store: SharedStore,
    tokens: Arc<TokenService>,
}

impl SessionIssuer {
    pub fn new(store: SharedStore, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    pub async fn open(
        &self,
        subject: &UserRecord,
        tenant: Option<Uuid>,
        access: SessionAccess,
    ) -> ServiceResult<IssuedToken> {
        let access_type = access.access_type();
        let original_user_id = access.original().map(|o| o.user_id);
        let issued = self.tokens.issue(subject.id, &subject.email, tenant, access)?;

        self.store
            .insert_session(SessionRecord {
                id: issued.claims.jti,
                user_id: subject.id,
                access_type,
                tenant_id: tenant,
                original_user_id,
                issued_at: issued.claims.issued_at(),
                expires_at: issued.claims.expires_at(),
                revoked_at: None,
            })
            .await?;

        Ok(issued)
    }

    pub fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.tokens.decode(token)
    }

    pub async fn revoke(&self, claims: &SessionClaims) -> ServiceResult<RevokeOutcome> {
        Ok(self.store.revoke_session(claims.jti, chrono::Utc::now()).await?)
    }
}
