use serde::Serialize;
use uuid::Uuid;

use super::{SessionAccess, SessionClaims};
use crate::rbac::PermissionSet;
use crate::store::UserRecord;

/// Authenticated request context, inserted into request extensions by the
/// session middleware
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: SessionClaims,
    /// Acting principal (the impersonated user during impersonation)
    pub user: UserRecord,
    /// Principal who started an elevated session
    pub original_user: Option<UserRecord>,
    /// Resolved for this request only
    pub permissions: PermissionSet,
}

impl AuthContext {
    pub fn session(&self) -> &SessionAccess {
        &self.claims.session
    }

    pub fn is_elevated(&self) -> bool {
        self.claims.session.is_elevated()
    }

    pub fn session_id(&self) -> Uuid {
        self.claims.jti
    }

    pub fn summary(&self) -> WhoAmI {
        WhoAmI {
            user_id: self.user.id,
            email: self.user.email.clone(),
            name: self.user.name.clone(),
            tenant_id: self.claims.tenant,
            platform_role: self.user.platform_role.map(|r| r.as_str()),
            access_type: self.claims.session.access_type().as_str(),
            target_tenant: self.claims.session.target_tenant(),
            original_user: self.claims.session.original().map(|o| OriginalSummary {
                user_id: o.user_id,
                email: o.email.clone(),
            }),
            session_id: self.claims.jti,
            expires_at: self.claims.exp,
            permissions: self.permissions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OriginalSummary {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhoAmI {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub tenant_id: Option<Uuid>,
    pub platform_role: Option<&'static str>,
    pub access_type: &'static str,
    pub target_tenant: Option<Uuid>,
    pub original_user: Option<OriginalSummary>,
    pub session_id: Uuid,
    pub expires_at: i64,
    pub permissions: PermissionSet,
}
