// handlers/public/auth/mod.rs - Token acquisition

pub mod login; // POST /auth/login - verify credentials (and second factor), open a session

pub use login::login_post;
