// handlers/protected/mod.rs - Protected handlers (session required)
//
// Security Level: Valid, unrevoked session token (Bearer header or
// `Authentication` cookie)
// Route Prefix: /auth/* (own account), /tenants/* (platform administration)
// Middleware: session_auth, plus require_permissions per tenant route

pub mod auth;    // whoami, logout, permissions, MFA enrollment
pub mod tenants; // access options, impersonation, secure login
