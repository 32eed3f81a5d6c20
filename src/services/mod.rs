//! Business operations behind the HTTP handlers.
//!
//! Each service is a cheap bundle of `Arc` handles built from the app state
//! per request; none of them hold request-spanning state of their own.

pub mod credentials;
pub mod elevation;
pub mod error;
pub mod mfa;
pub mod sessions;

pub use credentials::{CredentialVerifier, LoginRequest};
pub use elevation::{ElevationGate, EndOutcome};
pub use error::{ServiceError, ServiceResult};
pub use mfa::MfaService;
pub use sessions::SessionIssuer;

use crate::auth::password;

/// Argon2 verification is CPU bound; keep it off the async workers
pub(crate) async fn verify_password_blocking(candidate: &str, phc: &str) -> ServiceResult<bool> {
    let candidate = candidate.to_string();
    let phc = phc.to_string();
    tokio::task::spawn_blocking(move || password::verify_password(&candidate, &phc))
        .await
        .map_err(|e| ServiceError::Internal(format!("password verification task failed: {}", e)))
}
