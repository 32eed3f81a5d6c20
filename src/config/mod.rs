use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub mfa: MfaConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// YAML fixture loaded into the memory backend at startup
    pub fixture_path: Option<String>,
    /// Seconds between sweeps that delete expired session records; 0 disables the sweep
    pub session_purge_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_hours: u64,
    pub elevated_expiry_minutes: u64,
    pub cookie_secure: bool,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Where the browser goes after an elevated session ends; the tenant id is appended
    pub elevation_redirect_base: String,
    pub login_redirect: String,
    pub home_redirect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaConfig {
    pub issuer: String,
    pub backup_code_count: usize,
    /// Accepted clock drift in 30 second steps on either side
    pub step_window: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingJwtSecret,

    #[error("SECURITY_COOKIE_SECURE cannot be disabled in production")]
    InsecureCookie,

    #[error("DATABASE_URL is required for the postgres store backend")]
    MissingDatabaseUrl,

    #[error("Invalid DATABASE_URL: {0}")]
    InvalidDatabaseUrl(String),
}

const DEVELOPMENT_JWT_SECRET: &str = "development-only-jwt-secret";

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("TENANT_ADMIN_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            match v.as_str() {
                "memory" => self.store.backend = StoreBackend::Memory,
                "postgres" | "pg" => self.store.backend = StoreBackend::Postgres,
                other => tracing::warn!("Ignoring unknown STORE_BACKEND '{}'", other),
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout = v.parse().unwrap_or(self.store.connection_timeout);
        }
        if let Ok(v) = env::var("STORE_FIXTURE") {
            self.store.fixture_path = Some(v);
        }
        if let Ok(v) = env::var("STORE_SESSION_PURGE_INTERVAL") {
            self.store.session_purge_interval_secs = v.parse().unwrap_or(self.store.session_purge_interval_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_ISSUER") {
            self.security.jwt_issuer = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ELEVATED_EXPIRY_MINUTES") {
            self.security.elevated_expiry_minutes = v.parse().unwrap_or(self.security.elevated_expiry_minutes);
        }
        if let Ok(v) = env::var("SECURITY_COOKIE_SECURE") {
            self.security.cookie_secure = v.parse().unwrap_or(self.security.cookie_secure);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ELEVATION_REDIRECT_BASE") {
            self.security.elevation_redirect_base = v;
        }
        if let Ok(v) = env::var("SECURITY_LOGIN_REDIRECT") {
            self.security.login_redirect = v;
        }
        if let Ok(v) = env::var("SECURITY_HOME_REDIRECT") {
            self.security.home_redirect = v;
        }

        // MFA overrides
        if let Ok(v) = env::var("MFA_ISSUER") {
            self.mfa.issuer = v;
        }
        if let Ok(v) = env::var("MFA_BACKUP_CODE_COUNT") {
            self.mfa.backup_code_count = v.parse().unwrap_or(self.mfa.backup_code_count);
        }
        if let Ok(v) = env::var("MFA_STEP_WINDOW") {
            self.mfa.step_window = v.parse().unwrap_or(self.mfa.step_window);
        }

        self
    }

    /// Reject configurations that would start an insecure or unusable server
    pub fn validate(&self) -> Result<(), ConfigError> {
        let default_secret = self.security.jwt_secret.is_empty()
            || self.security.jwt_secret == DEVELOPMENT_JWT_SECRET;
        if default_secret && self.environment != Environment::Development {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.is_production() && !self.security.cookie_secure {
            return Err(ConfigError::InsecureCookie);
        }

        if self.store.backend == StoreBackend::Postgres {
            let raw = self
                .store
                .database_url
                .as_deref()
                .ok_or(ConfigError::MissingDatabaseUrl)?;
            url::Url::parse(raw).map_err(|e| ConfigError::InvalidDatabaseUrl(e.to_string()))?;
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 10,
                connection_timeout: 30,
                fixture_path: Some("fixtures/demo.yaml".to_string()),
                session_purge_interval_secs: 300,
            },
            security: SecurityConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_issuer: "tenant-admin-api".to_string(),
                jwt_expiry_hours: 24,
                elevated_expiry_minutes: 60,
                cookie_secure: false,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3001".to_string(), "http://localhost:5173".to_string()],
                elevation_redirect_base: "/admin/tenants".to_string(),
                login_redirect: "/login".to_string(),
                home_redirect: "/".to_string(),
            },
            mfa: MfaConfig {
                issuer: "Tenant Admin (dev)".to_string(),
                backup_code_count: 10,
                step_window: 1,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 20,
                connection_timeout: 10,
                fixture_path: None,
                session_purge_interval_secs: 900,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "tenant-admin-api".to_string(),
                jwt_expiry_hours: 12,
                elevated_expiry_minutes: 30,
                cookie_secure: true,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                elevation_redirect_base: "/admin/tenants".to_string(),
                login_redirect: "/login".to_string(),
                home_redirect: "/".to_string(),
            },
            mfa: MfaConfig {
                issuer: "Tenant Admin (staging)".to_string(),
                backup_code_count: 10,
                step_window: 1,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 50,
                connection_timeout: 5,
                fixture_path: None,
                session_purge_interval_secs: 900,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "tenant-admin-api".to_string(),
                jwt_expiry_hours: 4,
                elevated_expiry_minutes: 15,
                cookie_secure: true,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                elevation_redirect_base: "/admin/tenants".to_string(),
                login_redirect: "/login".to_string(),
                home_redirect: "/".to_string(),
            },
            mfa: MfaConfig {
                issuer: "Tenant Admin".to_string(),
                backup_code_count: 10,
                step_window: 1,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
