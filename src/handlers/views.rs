// handlers/views.rs - JSON shapes shared by several handlers

use serde::Serialize;
use uuid::Uuid;

use crate::auth::IssuedToken;
use crate::store::{TenantRecord, UserRecord};

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub tenant_id: Option<Uuid>,
    pub platform_role: Option<&'static str>,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            tenant_id: user.tenant_id,
            platform_role: user.platform_role.map(|r| r.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TenantSummary {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

impl From<&TenantRecord> for TenantSummary {
    fn from(tenant: &TenantRecord) -> Self {
        Self {
            id: tenant.id,
            slug: tenant.slug.clone(),
            name: tenant.name.clone(),
        }
    }
}

/// A freshly minted session as returned to clients. The same token is also
/// set as the `Authentication` cookie.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub token: String,
    pub session_id: Uuid,
    pub access_type: &'static str,
    pub expires_at: i64,
    pub tenant_id: Option<Uuid>,
    pub user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl SessionView {
    pub fn new(issued: &IssuedToken, user: &UserRecord) -> Self {
        Self {
            token: issued.token.clone(),
            session_id: issued.claims.jti,
            access_type: issued.claims.session.access_type().as_str(),
            expires_at: issued.claims.exp,
            tenant_id: issued.claims.tenant,
            user: UserSummary::from(user),
            original_user_id: issued.claims.session.original().map(|o| o.user_id),
            tenant: None,
            redirect_to: None,
        }
    }

    pub fn with_tenant(mut self, tenant: &TenantRecord) -> Self {
        self.tenant = Some(TenantSummary::from(tenant));
        self
    }

    pub fn with_redirect(mut self, redirect_to: impl Into<String>) -> Self {
        self.redirect_to = Some(redirect_to.into());
        self
    }
}
