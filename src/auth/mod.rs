//! Session tokens, password hashing and TOTP primitives.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::types::AccessType;

pub mod context;
pub mod mfa;
pub mod password;

pub use context::AuthContext;

/// The non-elevated principal behind an elevated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalPrincipal {
    pub user_id: Uuid,
    pub email: String,
}

/// What kind of session a token grants. Elevated variants cannot exist
/// without the principal who started them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionAccess {
    Normal,
    Impersonation {
        target_tenant: Uuid,
        original: OriginalPrincipal,
    },
    SecureLogin {
        target_tenant: Uuid,
        original: OriginalPrincipal,
    },
}

impl SessionAccess {
    pub fn access_type(&self) -> AccessType {
        match self {
            SessionAccess::Normal => AccessType::Normal,
            SessionAccess::Impersonation { .. } => AccessType::Impersonation,
            SessionAccess::SecureLogin { .. } => AccessType::SecureLogin,
        }
    }

    pub fn is_elevated(&self) -> bool {
        !matches!(self, SessionAccess::Normal)
    }

    pub fn original(&self) -> Option<&OriginalPrincipal> {
        match self {
            SessionAccess::Normal => None,
            SessionAccess::Impersonation { original, .. }
            | SessionAccess::SecureLogin { original, .. } => Some(original),
        }
    }

    pub fn target_tenant(&self) -> Option<Uuid> {
        match self {
            SessionAccess::Normal => None,
            SessionAccess::Impersonation { target_tenant, .. }
            | SessionAccess::SecureLogin { target_tenant, .. } => Some(*target_tenant),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Acting principal
    pub sub: Uuid,
    pub email: String,
    /// Home tenant for normal sessions, target tenant for elevated ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Uuid>,
    /// Session id, matches the stored session record
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub session: SessionAccess,
}

impl SessionClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or_else(Utc::now)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token generation failed: {0}")]
    Encoding(String),
}

/// Issues and validates HS256 session tokens
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    normal_ttl: Duration,
    elevated_ttl: Duration,
}

impl TokenService {
    pub fn new(security: &SecurityConfig) -> Self {
        Self::with_ttls(
            &security.jwt_secret,
            &security.jwt_issuer,
            Duration::hours(security.jwt_expiry_hours as i64),
            Duration::minutes(security.elevated_expiry_minutes as i64),
        )
    }

    pub fn with_ttls(secret: &str, issuer: &str, normal_ttl: Duration, elevated_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            normal_ttl,
            elevated_ttl,
        }
    }

    pub fn ttl_for(&self, session: &SessionAccess) -> Duration {
        if session.is_elevated() {
            self.elevated_ttl
        } else {
            self.normal_ttl
        }
    }

    pub fn issue(
        &self,
        subject: Uuid,
        email: &str,
        tenant: Option<Uuid>,
        session: SessionAccess,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject,
            email: email.to_string(),
            tenant,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.ttl_for(&session)).timestamp(),
            iss: self.issuer.clone(),
            session,
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
