// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Route Prefix: /auth/login
// Middleware: None (credentials are checked by the handler itself)

pub mod auth;
