// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no session) → Protected (session + route permissions) → Elevated
// (ending impersonation / secure-login sessions, session optional)
//
pub mod public;    // Tier 1: No authentication required (/auth/login)
pub mod protected; // Tier 2: Session required (/auth/*, /tenants/*)
pub mod elevated;  // Tier 3: Elevated session teardown (/tenant-access/*)

pub mod views;

/*
ROUTE PERMISSIONS:

Protected routes declare what they need with an explicit `RequirePermissions`
value attached through `route_layer`, for example:

```rust
Router::new()
    .route("/tenants/impersonate", post(tenants::impersonate_post))
    .route_layer(from_fn_with_state(
        RequirePermissions::all(&[rbac::TENANTS_IMPERSONATE]),
        require_permissions,
    ))
```

`session_auth` wraps the whole protected tier, so by the time the permission
layer runs the request already carries an `AuthContext` with a permission set
resolved for this request.

The elevated tier sits outside `session_auth`: ending a session must
succeed even when the token is missing, expired or already revoked.
*/
