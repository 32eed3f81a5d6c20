use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::SessionIssuer;
use crate::auth::{AuthContext, IssuedToken, OriginalPrincipal, SessionAccess};
use crate::config::SecurityConfig;
use crate::store::{RevokeOutcome, SharedStore, TenantRecord, UserRecord};
use crate::types::AccessLevel;

#[derive(Debug)]
pub struct Elevation {
    pub issued: IssuedToken,
    pub tenant: TenantRecord,
    /// Acting user of the new session
    pub subject: UserRecord,
    pub redirect_to: String,
}

/// Result of ending a session; every path is a success
#[derive(Debug)]
pub struct EndOutcome {
    /// An elevated session was revoked by this call
    pub ended: bool,
    /// Fresh normal session for the original principal
    pub restored: Option<RestoredSession>,
    /// Drop the session cookie (ignored when `restored` is set)
    pub clear_cookie: bool,
    pub redirect_to: String,
}

#[derive(Debug)]
pub struct RestoredSession {
    pub issued: IssuedToken,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessOption {
    pub tenant_id: Uuid,
    pub slug: String,
    pub name: String,
    pub access_level: AccessLevel,
    pub can_impersonate: bool,
    pub can_secure_login: bool,
}

/// Decides who may step into a tenant and mints or revokes the elevated session
#[derive(Clone)]
pub struct ElevationGate {
    store: SharedStore,
    sessions: SessionIssuer,
    security: SecurityConfig,
}

impl ElevationGate {
    pub fn new(store: SharedStore, sessions: SessionIssuer, security: SecurityConfig) -> Self {
        Self { store, sessions, security }
    }

    pub async fn begin_impersonation(
        &self,
        actor: &AuthContext,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<Elevation> {
        let platform_user = require_platform_session(actor)?;

        let grant = self.store.find_grant(platform_user.id, tenant_id).await?;
        if !grant.as_ref().is_some_and(|g| g.can_impersonate) {
            warn!(target: "audit", actor = %platform_user.id, %tenant_id, "impersonation denied: no grant");
            return Err(ServiceError::forbidden("Not permitted to impersonate users in this tenant"));
        }

        let tenant = self.active_tenant(tenant_id).await?;

        let target = self
            .store
            .find_user(user_id)
            .await?
            .filter(|u| u.tenant_id == Some(tenant.id))
            .ok_or_else(|| ServiceError::not_found("User not found in tenant"))?;
        if !target.is_active {
            return Err(ServiceError::forbidden("Target user is disabled"));
        }

        let access = SessionAccess::Impersonation {
            target_tenant: tenant.id,
            original: original_of(platform_user),
        };
        let issued = self.sessions.open(&target, Some(tenant.id), access).await?;
        self.retire_actor_session(actor).await?;

        info!(
            target: "audit",
            actor = %platform_user.id,
            tenant_id = %tenant.id,
            user_id = %target.id,
            session_id = %issued.claims.jti,
            "impersonation started"
        );

        Ok(Elevation {
            issued,
            tenant,
            subject: target,
            redirect_to: self.security.home_redirect.clone(),
        })
    }

    pub async fn begin_secure_login(&self, actor: &AuthContext, tenant_id: Uuid) -> ServiceResult<Elevation> {
        let platform_user = require_platform_session(actor)?;
        if !platform_user.is_super_admin() {
            warn!(target: "audit", actor = %platform_user.id, %tenant_id, "secure login denied: not super admin");
            return Err(ServiceError::forbidden("Secure login requires super admin privileges"));
        }

        let tenant = self.active_tenant(tenant_id).await?;

        let access = SessionAccess::SecureLogin {
            target_tenant: tenant.id,
            original: original_of(platform_user),
        };
        let issued = self.sessions.open(platform_user, Some(tenant.id), access).await?;
        self.retire_actor_session(actor).await?;

        info!(
            target: "audit",
            actor = %platform_user.id,
            tenant_id = %tenant.id,
            session_id = %issued.claims.jti,
            "secure login started"
        );

        Ok(Elevation {
            issued,
            tenant,
            subject: platform_user.clone(),
            redirect_to: self.security.home_redirect.clone(),
        })
    }

    /// Ends whatever session `token` names. Missing, unreadable, expired and
    /// already-ended tokens all count as signed out.
    pub async fn end_elevated_session(&self, token: Option<&str>) -> ServiceResult<EndOutcome> {
        let Some(token) = token else {
            return Ok(self.signed_out());
        };
        let claims = match self.sessions.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("end session with unusable token: {}", e);
                return Ok(self.signed_out());
            }
        };

        let (target_tenant, original) = match &claims.session {
            SessionAccess::Normal => {
                let active = self
                    .store
                    .find_session(claims.jti)
                    .await?
                    .is_some_and(|s| s.is_active_at(chrono::Utc::now()));
                if !active {
                    return Ok(self.signed_out());
                }
                return Ok(EndOutcome {
                    ended: false,
                    restored: None,
                    clear_cookie: false,
                    redirect_to: self.security.home_redirect.clone(),
                });
            }
            SessionAccess::Impersonation { target_tenant, original }
            | SessionAccess::SecureLogin { target_tenant, original } => (*target_tenant, original),
        };

        match self.sessions.revoke(&claims).await? {
            RevokeOutcome::Revoked => {}
            RevokeOutcome::AlreadyRevoked | RevokeOutcome::Unknown => return Ok(self.signed_out()),
        }

        info!(
            target: "audit",
            session_id = %claims.jti,
            original = %original.user_id,
            tenant_id = %target_tenant,
            access_type = claims.session.access_type().as_str(),
            "elevated session ended"
        );

        let restored = match self.store.find_user(original.user_id).await?.filter(|u| u.is_active) {
            Some(user) => {
                let issued = self.sessions.open(&user, user.tenant_id, SessionAccess::Normal).await?;
                Some(RestoredSession { issued, user })
            }
            None => None,
        };

        Ok(EndOutcome {
            ended: true,
            clear_cookie: restored.is_none(),
            restored,
            redirect_to: format!(
                "{}/{}",
                self.security.elevation_redirect_base.trim_end_matches('/'),
                target_tenant
            ),
        })
    }

    /// Tenants the actor may elevate into
    pub async fn access_options(&self, actor: &AuthContext) -> ServiceResult<Vec<AccessOption>> {
        let platform_user = require_platform_session(actor)?;
        let grants = self.store.list_grants(platform_user.id).await?;
        let super_admin = platform_user.is_super_admin();

        let mut options = Vec::new();
        for tenant in self.store.list_tenants().await? {
            if !tenant.is_active {
                continue;
            }
            let grant = grants.iter().find(|g| g.tenant_id == tenant.id);
            let access_level = match (grant, super_admin) {
                (Some(g), _) => g.access_level,
                (None, true) => AccessLevel::Admin,
                (None, false) => continue,
            };
            options.push(AccessOption {
                tenant_id: tenant.id,
                slug: tenant.slug,
                name: tenant.name,
                access_level,
                can_impersonate: grant.is_some_and(|g| g.can_impersonate),
                can_secure_login: super_admin,
            });
        }
        Ok(options)
    }

    /// Users of a tenant the actor holds a grant on, for picking an impersonation target
    pub async fn list_tenant_users(&self, actor: &AuthContext, tenant_id: Uuid) -> ServiceResult<Vec<UserRecord>> {
        let platform_user = require_platform_session(actor)?;
        if !platform_user.is_super_admin() && self.store.find_grant(platform_user.id, tenant_id).await?.is_none() {
            return Err(ServiceError::forbidden("No access to this tenant"));
        }
        let tenant = self
            .store
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tenant not found"))?;
        Ok(self.store.list_tenant_users(tenant.id).await?)
    }

    /// The elevated token replaces the caller's normal one; ending the
    /// elevation mints a fresh normal session instead of reviving this one.
    async fn retire_actor_session(&self, actor: &AuthContext) -> ServiceResult<()> {
        let outcome = self.sessions.revoke(&actor.claims).await?;
        debug!(session_id = %actor.claims.jti, ?outcome, "normal session retired for elevation");
        Ok(())
    }

    async fn active_tenant(&self, tenant_id: Uuid) -> ServiceResult<TenantRecord> {
        let tenant = self
            .store
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tenant not found"))?;
        if !tenant.is_active {
            return Err(ServiceError::forbidden("Tenant is inactive"));
        }
        Ok(tenant)
    }

    fn signed_out(&self) -> EndOutcome {
        EndOutcome {
            ended: false,
            restored: None,
            clear_cookie: true,
            redirect_to: self.security.login_redirect.clone(),
        }
    }
}

/// Elevation starts only from a normal session of a platform-level user
fn require_platform_session(actor: &AuthContext) -> ServiceResult<&UserRecord> {
    if actor.is_elevated() {
        return Err(ServiceError::forbidden("Already in an elevated session"));
    }
    if !actor.user.is_platform_user() {
        return Err(ServiceError::forbidden("Platform access required"));
    }
    Ok(&actor.user)
}

fn original_of(user: &UserRecord) -> OriginalPrincipal {
    OriginalPrincipal {
        user_id: user.id,
        email: user.email.clone(),
    }
}
