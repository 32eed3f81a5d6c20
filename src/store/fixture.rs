use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

use super::{MemoryStore, RoleRecord, StoreError, TenantAccessGrant, TenantRecord, UserRecord};
use crate::auth::password;
use crate::types::{AccessLevel, PlatformRole};

/// Seed data for the memory store.
///
/// ```yaml
/// tenants:
///   - slug: acme
///     name: Acme Corp
///     roles:
///       - name: admin
///         permissions: [users.read, users.write]
/// users:
///   - email: root@platform.test
///     password: change-me
///     platform_role: super_admin
///   - email: alice@acme.test
///     tenant: acme
///     password: change-me
///     roles: [admin]
/// grants:
///   - principal: root@platform.test
///     tenant: acme
///     access_level: admin
///     can_impersonate: true
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub tenants: Vec<TenantFixture>,
    #[serde(default)]
    pub users: Vec<UserFixture>,
    #[serde(default)]
    pub grants: Vec<GrantFixture>,
}

#[derive(Debug, Deserialize)]
pub struct TenantFixture {
    pub id: Option<Uuid>,
    pub slug: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub roles: Vec<RoleFixture>,
}

#[derive(Debug, Deserialize)]
pub struct RoleFixture {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserFixture {
    pub id: Option<Uuid>,
    /// Tenant slug; omitted for platform users
    pub tenant: Option<String>,
    pub email: String,
    pub name: Option<String>,
    pub password: Option<String>,
    pub password_hash: Option<String>,
    pub platform_role: Option<PlatformRole>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct GrantFixture {
    /// Email of a platform user
    pub principal: String,
    /// Tenant slug
    pub tenant: String,
    pub access_level: AccessLevel,
    #[serde(default)]
    pub can_impersonate: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FixtureSummary {
    pub tenants: usize,
    pub roles: usize,
    pub users: usize,
    pub grants: usize,
}

fn default_true() -> bool {
    true
}

impl Fixture {
    pub fn from_yaml_str(raw: &str) -> Result<Self, StoreError> {
        serde_yaml::from_str(raw).map_err(|e| StoreError::Fixture(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&raw)
    }

    /// Insert every record into the store, resolving slugs and emails to ids
    pub async fn apply(self, store: &MemoryStore) -> Result<FixtureSummary, StoreError> {
        let now = Utc::now();
        let mut summary = FixtureSummary::default();
        let mut tenant_ids: HashMap<String, Uuid> = HashMap::new();
        let mut platform_users: HashMap<String, Uuid> = HashMap::new();

        for tenant in self.tenants {
            let id = tenant.id.unwrap_or_else(Uuid::new_v4);
            store
                .insert_tenant(TenantRecord {
                    id,
                    slug: tenant.slug.clone(),
                    name: tenant.name,
                    is_active: tenant.active,
                    created_at: now,
                })
                .await?;
            summary.tenants += 1;

            for role in tenant.roles {
                store
                    .insert_role(RoleRecord {
                        tenant_id: id,
                        name: role.name,
                        permissions: role.permissions,
                    })
                    .await?;
                summary.roles += 1;
            }
            tenant_ids.insert(tenant.slug, id);
        }

        for user in self.users {
            let tenant_id = match &user.tenant {
                Some(slug) => Some(
                    *tenant_ids
                        .get(slug)
                        .ok_or_else(|| StoreError::Fixture(format!("user {} references unknown tenant '{}'", user.email, slug)))?,
                ),
                None => None,
            };

            if tenant_id.is_some() && user.platform_role.is_some() {
                return Err(StoreError::Fixture(format!(
                    "user {} cannot have a platform role and a tenant",
                    user.email
                )));
            }

            let password_hash = match (user.password_hash, user.password) {
                (Some(hash), _) => hash,
                (None, Some(plain)) => password::hash_password(&plain)
                    .map_err(|e| StoreError::Fixture(format!("user {}: {}", user.email, e)))?,
                (None, None) => {
                    return Err(StoreError::Fixture(format!("user {} has no password", user.email)))
                }
            };

            let id = user.id.unwrap_or_else(Uuid::new_v4);
            store
                .insert_user(UserRecord {
                    id,
                    tenant_id,
                    name: user.name.unwrap_or_else(|| user.email.clone()),
                    email: user.email.clone(),
                    password_hash,
                    platform_role: user.platform_role,
                    roles: user.roles,
                    is_active: user.active,
                    created_at: now,
                })
                .await?;
            summary.users += 1;

            if tenant_id.is_none() {
                platform_users.insert(user.email.to_lowercase(), id);
            }
        }

        for grant in self.grants {
            let principal_id = *platform_users
                .get(&grant.principal.to_lowercase())
                .ok_or_else(|| StoreError::Fixture(format!("grant references unknown platform user '{}'", grant.principal)))?;
            let tenant_id = *tenant_ids
                .get(&grant.tenant)
                .ok_or_else(|| StoreError::Fixture(format!("grant references unknown tenant '{}'", grant.tenant)))?;

            store
                .insert_grant(TenantAccessGrant {
                    principal_id,
                    tenant_id,
                    access_level: grant.access_level,
                    can_impersonate: grant.can_impersonate,
                    granted_at: now,
                })
                .await?;
            summary.grants += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    const FIXTURE: &str = r#"
tenants:
  - slug: acme
    name: Acme Corp
    roles:
      - name: admin
        permissions: [users.read, users.write]
users:
  - email: Root@Platform.test
    password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
    platform_role: super_admin
  - email: alice@acme.test
    tenant: acme
    password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
    roles: [admin]
grants:
  - principal: root@platform.test
    tenant: acme
    access_level: write
    can_impersonate: true
"#;

    #[tokio::test]
    async fn applies_fixture_and_resolves_references() {
        let store = MemoryStore::new();
        let summary = Fixture::from_yaml_str(FIXTURE).unwrap().apply(&store).await.unwrap();
        assert_eq!(
            summary,
            FixtureSummary { tenants: 1, roles: 1, users: 2, grants: 1 }
        );

        let acme = store.find_tenant_by_slug("acme").await.unwrap().unwrap();
        let root = store.find_user_by_email(None, "root@platform.test").await.unwrap().unwrap();
        assert!(root.is_super_admin());

        let grant = store.find_grant(root.id, acme.id).await.unwrap().unwrap();
        assert_eq!(grant.access_level, AccessLevel::Write);
        assert!(grant.can_impersonate);

        let alice = store.find_user_by_email(Some(acme.id), "ALICE@acme.test").await.unwrap().unwrap();
        assert_eq!(alice.roles, vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn rejects_grant_for_unknown_tenant() {
        let raw = r#"
users:
  - email: ops@platform.test
    password_hash: x
    platform_role: operator
grants:
  - principal: ops@platform.test
    tenant: nowhere
    access_level: read
"#;
        let store = MemoryStore::new();
        let err = Fixture::from_yaml_str(raw).unwrap().apply(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::Fixture(msg) if msg.contains("nowhere")));
    }
}
