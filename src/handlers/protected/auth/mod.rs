// handlers/protected/auth/mod.rs - Own-account endpoints

pub mod mfa;
pub mod permissions;
pub mod session;

pub use mfa::{mfa_backup_codes_post, mfa_disable_post, mfa_setup_post, mfa_status_get, mfa_verify_post};
pub use permissions::{permissions_check_post, permissions_get};
pub use session::{logout_post, whoami_get};
