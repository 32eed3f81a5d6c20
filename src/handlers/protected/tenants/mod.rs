// handlers/protected/tenants/mod.rs - Platform administration of tenants
//
// Every route here carries a RequirePermissions layer; the elevation gate then
// applies the per-tenant grant checks on top.

pub mod access_options; // GET  /tenants/access-options    (tenants.read)
pub mod impersonate;    // POST /tenants/impersonate       (tenants.impersonate)
pub mod secure_login;   // POST /tenants/secure-login      (tenants.secure_login)
pub mod users;          // GET  /tenants/:tenant_id/users  (tenants.users.read)

pub use access_options::access_options_get;
pub use impersonate::impersonate_post;
pub use secure_login::secure_login_post;
pub use users::users_get;
