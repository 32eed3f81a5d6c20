pub mod auth;
pub mod cookies;
pub mod permissions;
pub mod response;

pub use auth::{authenticate, session_auth};
pub use cookies::{clear_session_cookie, set_session_cookie, SESSION_COOKIE};
pub use permissions::{require_permissions, RequirePermissions};
pub use response::{ApiResponse, ApiResult};
