use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{
    MfaRecord, RevokeOutcome, RoleRecord, SessionRecord, Store, StoreError, TenantAccessGrant,
    TenantRecord, UserRecord,
};
use crate::config::StoreConfig;
use crate::types::PlatformRole;

/// Schema statements, applied in order; each is idempotent
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id          UUID PRIMARY KEY,
        slug        TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL,
        is_active   BOOLEAN NOT NULL DEFAULT true,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id             UUID PRIMARY KEY,
        tenant_id      UUID NULL REFERENCES tenants(id),
        email          TEXT NOT NULL,
        name           TEXT NOT NULL,
        password_hash  TEXT NOT NULL,
        platform_role  TEXT NULL,
        roles          TEXT[] NOT NULL DEFAULT '{}',
        is_active      BOOLEAN NOT NULL DEFAULT true,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS users_tenant_email_idx
        ON users (COALESCE(tenant_id, '00000000-0000-0000-0000-000000000000'::uuid), lower(email))
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        tenant_id    UUID NOT NULL REFERENCES tenants(id),
        name         TEXT NOT NULL,
        permissions  TEXT[] NOT NULL DEFAULT '{}',
        PRIMARY KEY (tenant_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_access_grants (
        principal_id     UUID NOT NULL REFERENCES users(id),
        tenant_id        UUID NOT NULL REFERENCES tenants(id),
        access_level     TEXT NOT NULL,
        can_impersonate  BOOLEAN NOT NULL DEFAULT false,
        granted_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (principal_id, tenant_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mfa_enrollments (
        user_id             UUID PRIMARY KEY REFERENCES users(id),
        secret              TEXT NOT NULL,
        enabled             BOOLEAN NOT NULL DEFAULT false,
        backup_code_hashes  TEXT[] NOT NULL DEFAULT '{}',
        last_used_step      BIGINT NULL,
        created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id                UUID PRIMARY KEY,
        user_id           UUID NOT NULL,
        access_type       TEXT NOT NULL,
        tenant_id         UUID NULL,
        original_user_id  UUID NULL,
        issued_at         TIMESTAMPTZ NOT NULL,
        expires_at        TIMESTAMPTZ NOT NULL,
        revoked_at        TIMESTAMPTZ NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS sessions_expires_at_idx ON sessions (expires_at)
    "#,
];

const TENANT_COLUMNS: &str = "id, slug, name, is_active, created_at";
const USER_COLUMNS: &str =
    "id, tenant_id, email, name, password_hash, platform_role, roles, is_active, created_at";
const GRANT_COLUMNS: &str = "principal_id, tenant_id, access_level, can_impersonate, granted_at";
const SESSION_COLUMNS: &str =
    "id, user_id, access_type, tenant_id, original_user_id, issued_at, expires_at, revoked_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::NotFound("DATABASE_URL".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected to postgres store ({} max connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they are missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Store schema is up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_column<T: std::str::FromStr>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| StoreError::Corrupt(format!("{}: {}", column, e)))
}

fn tenant_from_row(row: &PgRow) -> Result<TenantRecord, StoreError> {
    Ok(TenantRecord {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, StoreError> {
    let platform_role: Option<String> = row.try_get("platform_role")?;
    let platform_role = platform_role
        .map(|raw| raw.parse::<PlatformRole>())
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("platform_role: {}", e)))?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        platform_role,
        roles: row.try_get("roles")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn grant_from_row(row: &PgRow) -> Result<TenantAccessGrant, StoreError> {
    Ok(TenantAccessGrant {
        principal_id: row.try_get("principal_id")?,
        tenant_id: row.try_get("tenant_id")?,
        access_level: parse_column(row, "access_level")?,
        can_impersonate: row.try_get("can_impersonate")?,
        granted_at: row.try_get("granted_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<SessionRecord, StoreError> {
    Ok(SessionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        access_type: parse_column(row, "access_type")?,
        tenant_id: row.try_get("tenant_id")?,
        original_user_id: row.try_get("original_user_id")?,
        issued_at: row.try_get("issued_at")?,
        expires_at: row.try_get("expires_at")?,
        revoked_at: row.try_get("revoked_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantRecord>, StoreError> {
        let query = format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS);
        sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(tenant_from_row)
            .transpose()
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, StoreError> {
        let query = format!("SELECT {} FROM tenants WHERE slug = $1", TENANT_COLUMNS);
        sqlx::query(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(tenant_from_row)
            .transpose()
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, StoreError> {
        let query = format!("SELECT {} FROM tenants ORDER BY slug", TENANT_COLUMNS);
        sqlx::query(&query)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(tenant_from_row)
            .collect()
    }

    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<RoleRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT tenant_id, name, permissions FROM roles WHERE tenant_id = $1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<RoleRecord, StoreError> {
                Ok(RoleRecord {
                    tenant_id: row.try_get("tenant_id")?,
                    name: row.try_get("name")?,
                    permissions: row.try_get("permissions")?,
                })
            })
            .collect()
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_user_by_email(
        &self,
        tenant_id: Option<Uuid>,
        email: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM users WHERE tenant_id IS NOT DISTINCT FROM $1 AND lower(email) = lower($2)",
            USER_COLUMNS
        );
        sqlx::query(&query)
            .bind(tenant_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn list_tenant_users(&self, tenant_id: Uuid) -> Result<Vec<UserRecord>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE tenant_id = $1 ORDER BY email", USER_COLUMNS);
        sqlx::query(&query)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn find_grant(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<TenantAccessGrant>, StoreError> {
        let query = format!(
            "SELECT {} FROM tenant_access_grants WHERE principal_id = $1 AND tenant_id = $2",
            GRANT_COLUMNS
        );
        sqlx::query(&query)
            .bind(principal_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(grant_from_row)
            .transpose()
    }

    async fn list_grants(&self, principal_id: Uuid) -> Result<Vec<TenantAccessGrant>, StoreError> {
        let query = format!(
            "SELECT {} FROM tenant_access_grants WHERE principal_id = $1",
            GRANT_COLUMNS
        );
        sqlx::query(&query)
            .bind(principal_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(grant_from_row)
            .collect()
    }

    async fn find_mfa(&self, user_id: Uuid) -> Result<Option<MfaRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, secret, enabled, backup_code_hashes, last_used_step, created_at
            FROM mfa_enrollments
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<MfaRecord, StoreError> {
            Ok(MfaRecord {
                user_id: row.try_get("user_id")?,
                secret: row.try_get("secret")?,
                enabled: row.try_get("enabled")?,
                backup_code_hashes: row.try_get("backup_code_hashes")?,
                last_used_step: row.try_get("last_used_step")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn save_mfa(&self, record: MfaRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO mfa_enrollments (user_id, secret, enabled, backup_code_hashes, last_used_step, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                secret = EXCLUDED.secret,
                enabled = EXCLUDED.enabled,
                backup_code_hashes = EXCLUDED.backup_code_hashes,
                last_used_step = EXCLUDED.last_used_step,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(record.user_id)
        .bind(&record.secret)
        .bind(record.enabled)
        .bind(&record.backup_code_hashes)
        .bind(record.last_used_step)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_mfa(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM mfa_enrollments WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume_backup_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mfa_enrollments
            SET backup_code_hashes = array_remove(backup_code_hashes, $2)
            WHERE user_id = $1 AND $2 = ANY(backup_code_hashes)
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn advance_totp_step(&self, user_id: Uuid, step: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mfa_enrollments
            SET last_used_step = $2
            WHERE user_id = $1 AND (last_used_step IS NULL OR last_used_step < $2)
            "#,
        )
        .bind(user_id)
        .bind(step)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_session(&self, record: SessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, access_type, tenant_id, original_user_id, issued_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.access_type.as_str())
        .bind(record.tenant_id)
        .bind(record.original_user_id)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let query = format!("SELECT {} FROM sessions WHERE id = $1", SESSION_COLUMNS);
        sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(session_from_row)
            .transpose()
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<RevokeOutcome, StoreError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(RevokeOutcome::Revoked);
        }

        let exists: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM sessions WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists.0 {
            RevokeOutcome::AlreadyRevoked
        } else {
            RevokeOutcome::Unknown
        })
    }

    async fn purge_sessions(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
