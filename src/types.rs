/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of session a token represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Normal,
    Impersonation,
    SecureLogin,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Normal => "normal",
            AccessType::Impersonation => "impersonation",
            AccessType::SecureLogin => "secure_login",
        }
    }

    pub fn is_elevated(&self) -> bool {
        !matches!(self, AccessType::Normal)
    }
}

/// Level of access a tenant access grant confers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        }
    }
}

/// Role held by platform-level (tenant-less) users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformRole {
    SuperAdmin,
    Operator,
}

impl PlatformRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformRole::SuperAdmin => "super_admin",
            PlatformRole::Operator => "operator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for AccessType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(AccessType::Normal),
            "impersonation" => Ok(AccessType::Impersonation),
            "secure_login" => Ok(AccessType::SecureLogin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            "admin" => Ok(AccessLevel::Admin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for PlatformRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(PlatformRole::SuperAdmin),
            "operator" => Ok(PlatformRole::Operator),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}
