use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    MfaRecord, RevokeOutcome, RoleRecord, SessionRecord, Store, StoreError, TenantAccessGrant,
    TenantRecord, UserRecord,
};

#[derive(Default)]
struct Tables {
    tenants: HashMap<Uuid, TenantRecord>,
    users: HashMap<Uuid, UserRecord>,
    roles: HashMap<(Uuid, String), RoleRecord>,
    grants: HashMap<(Uuid, Uuid), TenantAccessGrant>,
    mfa: HashMap<Uuid, MfaRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
}

/// In-process store for development and tests
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_tenant(&self, tenant: TenantRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.tenants.values().any(|t| t.slug == tenant.slug && t.id != tenant.id) {
            return Err(StoreError::Conflict(format!("tenant slug '{}' already exists", tenant.slug)));
        }
        tables.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    pub async fn insert_user(&self, user: UserRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(tenant_id) = user.tenant_id {
            if !tables.tenants.contains_key(&tenant_id) {
                return Err(StoreError::NotFound(format!("tenant {}", tenant_id)));
            }
        }
        let duplicate = tables.users.values().any(|u| {
            u.id != user.id
                && u.tenant_id == user.tenant_id
                && u.email.eq_ignore_ascii_case(&user.email)
        });
        if duplicate {
            return Err(StoreError::Conflict(format!("user '{}' already exists", user.email)));
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    pub async fn insert_role(&self, role: RoleRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tenants.contains_key(&role.tenant_id) {
            return Err(StoreError::NotFound(format!("tenant {}", role.tenant_id)));
        }
        tables.roles.insert((role.tenant_id, role.name.clone()), role);
        Ok(())
    }

    pub async fn insert_grant(&self, grant: TenantAccessGrant) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&grant.principal_id) {
            return Err(StoreError::NotFound(format!("principal {}", grant.principal_id)));
        }
        if !tables.tenants.contains_key(&grant.tenant_id) {
            return Err(StoreError::NotFound(format!("tenant {}", grant.tenant_id)));
        }
        tables.grants.insert((grant.principal_id, grant.tenant_id), grant);
        Ok(())
    }

    pub async fn set_user_active(&self, user_id: Uuid, is_active: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        user.is_active = is_active;
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantRecord>, StoreError> {
        Ok(self.tables.read().await.tenants.get(&id).cloned())
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut tenants: Vec<_> = tables.tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(tenants)
    }

    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<RoleRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut roles: Vec<_> = tables
            .roles
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(
        &self,
        tenant_id: Option<Uuid>,
        email: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_tenant_users(&self, tenant_id: Uuid) -> Result<Vec<UserRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut users: Vec<_> = tables
            .users
            .values()
            .filter(|u| u.tenant_id == Some(tenant_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn find_grant(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<TenantAccessGrant>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.grants.get(&(principal_id, tenant_id)).cloned())
    }

    async fn list_grants(&self, principal_id: Uuid) -> Result<Vec<TenantAccessGrant>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .grants
            .values()
            .filter(|g| g.principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn find_mfa(&self, user_id: Uuid) -> Result<Option<MfaRecord>, StoreError> {
        Ok(self.tables.read().await.mfa.get(&user_id).cloned())
    }

    async fn save_mfa(&self, record: MfaRecord) -> Result<(), StoreError> {
        self.tables.write().await.mfa.insert(record.user_id, record);
        Ok(())
    }

    async fn delete_mfa(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.tables.write().await.mfa.remove(&user_id);
        Ok(())
    }

    async fn consume_backup_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.mfa.get_mut(&user_id) else {
            return Ok(false);
        };
        match record.backup_code_hashes.iter().position(|h| h == code_hash) {
            Some(index) => {
                record.backup_code_hashes.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn advance_totp_step(&self, user_id: Uuid, step: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.mfa.get_mut(&user_id) else {
            return Ok(false);
        };
        if record.last_used_step.is_some_and(|last| last >= step) {
            return Ok(false);
        }
        record.last_used_step = Some(step);
        Ok(true)
    }

    async fn insert_session(&self, record: SessionRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!("session {}", record.id)));
        }
        tables.sessions.insert(record.id, record);
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<RevokeOutcome, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&id) {
            None => Ok(RevokeOutcome::Unknown),
            Some(session) if session.revoked_at.is_some() => Ok(RevokeOutcome::AlreadyRevoked),
            Some(session) => {
                session.revoked_at = Some(at);
                Ok(RevokeOutcome::Revoked)
            }
        }
    }

    async fn purge_sessions(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let count = tables.sessions.len();
        tables.sessions.retain(|_, session| session.expires_at >= before);
        Ok((count - tables.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessLevel, AccessType};
    use chrono::Duration;

    fn tenant(slug: &str) -> TenantRecord {
        TenantRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn session(user_id: Uuid) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            access_type: AccessType::Normal,
            tenant_id: None,
            original_user_id: None,
            issued_at: now,
            expires_at: now + Duration::hours(1),
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_tenant_slugs() {
        let store = MemoryStore::new();
        store.insert_tenant(tenant("acme")).await.unwrap();
        let err = store.insert_tenant(tenant("acme")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn revoking_twice_reports_already_revoked() {
        let store = MemoryStore::new();
        let record = session(Uuid::new_v4());
        let id = record.id;
        store.insert_session(record).await.unwrap();

        assert_eq!(store.revoke_session(id, Utc::now()).await.unwrap(), RevokeOutcome::Revoked);
        assert_eq!(store.revoke_session(id, Utc::now()).await.unwrap(), RevokeOutcome::AlreadyRevoked);
        assert_eq!(store.revoke_session(Uuid::new_v4(), Utc::now()).await.unwrap(), RevokeOutcome::Unknown);
        assert!(!store.find_session(id).await.unwrap().unwrap().is_active_at(Utc::now()));
    }

    #[tokio::test]
    async fn purge_drops_only_expired_sessions() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let mut expired = session(user_id);
        expired.expires_at = now - Duration::minutes(5);
        let mut expired_and_revoked = session(user_id);
        expired_and_revoked.expires_at = now - Duration::minutes(1);
        expired_and_revoked.revoked_at = Some(now - Duration::minutes(2));
        let mut revoked_but_unexpired = session(user_id);
        revoked_but_unexpired.revoked_at = Some(now);
        let live = session(user_id);

        let ids = [expired.id, expired_and_revoked.id, revoked_but_unexpired.id, live.id];
        for record in [expired, expired_and_revoked, revoked_but_unexpired, live] {
            store.insert_session(record).await.unwrap();
        }

        assert_eq!(store.purge_sessions(now).await.unwrap(), 2);
        assert!(store.find_session(ids[0]).await.unwrap().is_none());
        assert!(store.find_session(ids[1]).await.unwrap().is_none());
        // Revoked records stay until they expire so a replayed token still reads as revoked
        assert!(store.find_session(ids[2]).await.unwrap().is_some());
        assert!(store.find_session(ids[3]).await.unwrap().unwrap().is_active_at(now));

        assert_eq!(store.purge_sessions(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn grants_need_an_existing_tenant() {
        let store = MemoryStore::new();
        let home = tenant("acme");
        let home_id = home.id;
        store.insert_tenant(home).await.unwrap();
        let principal = UserRecord {
            id: Uuid::new_v4(),
            tenant_id: None,
            email: "ops@platform.test".to_string(),
            name: "Ops".to_string(),
            password_hash: String::new(),
            platform_role: None,
            roles: vec![],
            is_active: true,
            created_at: Utc::now(),
        };
        let principal_id = principal.id;
        store.insert_user(principal).await.unwrap();

        let grant = |tenant_id| TenantAccessGrant {
            principal_id,
            tenant_id,
            access_level: AccessLevel::Read,
            can_impersonate: false,
            granted_at: Utc::now(),
        };

        let missing = Uuid::new_v4();
        let err = store.insert_grant(grant(missing)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref what) if what.contains(&missing.to_string())));
        assert!(store.find_grant(principal_id, missing).await.unwrap().is_none());

        store.insert_grant(grant(home_id)).await.unwrap();
        assert!(store.find_grant(principal_id, home_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn totp_steps_only_move_forward() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .save_mfa(MfaRecord {
                user_id,
                secret: "JBSWY3DPEHPK3PXP".to_string(),
                enabled: true,
                backup_code_hashes: vec!["abc".to_string()],
                last_used_step: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(store.advance_totp_step(user_id, 100).await.unwrap());
        assert!(!store.advance_totp_step(user_id, 100).await.unwrap());
        assert!(!store.advance_totp_step(user_id, 99).await.unwrap());
        assert!(store.advance_totp_step(user_id, 101).await.unwrap());

        assert!(store.consume_backup_code(user_id, "abc").await.unwrap());
        assert!(!store.consume_backup_code(user_id, "abc").await.unwrap());
    }
}
