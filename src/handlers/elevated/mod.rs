// handlers/elevated/mod.rs - Elevated session teardown
//
// Security Level: Session optional. The handler reads whatever token the
// client presents (Bearer header first, then the `Authentication` cookie) and
// always reports success: a missing, expired or already-revoked session is
// simply treated as signed out.
// Route Prefix: /tenant-access/*

pub mod end; // POST /tenant-access/{impersonate,secure-login}/end

pub use end::end_post;
