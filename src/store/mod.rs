//! Persistence for principals, tenants, grants, MFA enrollments and sessions.
//!
//! Two backends implement [`Store`]: [`PgStore`] (sqlx / Postgres) for deployed
//! environments and [`MemoryStore`] for development and tests, seeded from a
//! YAML fixture.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{AccessLevel, AccessType, PlatformRole};

pub mod fixture;
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    /// Home tenant; `None` for platform-level users
    pub tenant_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub platform_role: Option<PlatformRole>,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn is_platform_user(&self) -> bool {
        self.tenant_id.is_none()
    }

    pub fn is_super_admin(&self) -> bool {
        self.is_platform_user() && self.platform_role == Some(PlatformRole::SuperAdmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub tenant_id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
}

/// Authorizes a platform principal to access (and possibly impersonate within) a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAccessGrant {
    pub principal_id: Uuid,
    pub tenant_id: Uuid,
    pub access_level: AccessLevel,
    pub can_impersonate: bool,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MfaRecord {
    pub user_id: Uuid,
    /// Base32 TOTP secret
    pub secret: String,
    pub enabled: bool,
    /// SHA-256 hex digests of unused backup codes
    pub backup_code_hashes: Vec<String>,
    pub last_used_step: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_type: AccessType,
    pub tenant_id: Option<Uuid>,
    pub original_user_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
    Unknown,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // Tenants
    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantRecord>, StoreError>;
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, StoreError>;
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, StoreError>;
    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<RoleRecord>, StoreError>;

    // Users
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;
    /// Email lookup is case-insensitive and scoped to a tenant (`None` = platform users)
    async fn find_user_by_email(
        &self,
        tenant_id: Option<Uuid>,
        email: &str,
    ) -> Result<Option<UserRecord>, StoreError>;
    async fn list_tenant_users(&self, tenant_id: Uuid) -> Result<Vec<UserRecord>, StoreError>;

    // Grants
    async fn find_grant(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<TenantAccessGrant>, StoreError>;
    async fn list_grants(&self, principal_id: Uuid) -> Result<Vec<TenantAccessGrant>, StoreError>;

    // MFA
    async fn find_mfa(&self, user_id: Uuid) -> Result<Option<MfaRecord>, StoreError>;
    async fn save_mfa(&self, record: MfaRecord) -> Result<(), StoreError>;
    async fn delete_mfa(&self, user_id: Uuid) -> Result<(), StoreError>;
    /// Removes a backup code hash; true only for the caller that removed it
    async fn consume_backup_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool, StoreError>;
    /// Records a TOTP step as used; false if this or a later step was already accepted
    async fn advance_totp_step(&self, user_id: Uuid, step: i64) -> Result<bool, StoreError>;

    // Sessions
    async fn insert_session(&self, record: SessionRecord) -> Result<(), StoreError>;
    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;
    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<RevokeOutcome, StoreError>;
    /// Deletes session records that expired before `before`, revoked or not; returns how many went
    async fn purge_sessions(&self, before: DateTime<Utc>) -> Result<u64, StoreError>;
}

pub type SharedStore = Arc<dyn Store>;
