pub mod auth;
pub mod mfa;
pub mod server;
pub mod tenant;
pub mod util;
