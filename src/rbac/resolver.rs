use uuid::Uuid;

use super::{platform_role_permissions, PermissionSet};
use crate::auth::SessionAccess;
use crate::store::{Store, StoreError, UserRecord};

/// Compute the granted permissions for the acting user of a session.
///
/// Called on every authenticated request; nothing here is cached.
pub async fn resolve_permissions(
    store: &dyn Store,
    session: &SessionAccess,
    subject: &UserRecord,
) -> Result<PermissionSet, StoreError> {
    match session {
        SessionAccess::Normal => match (subject.tenant_id, subject.platform_role) {
            (None, Some(role)) => Ok(platform_role_permissions(role).iter().copied().collect()),
            (None, None) => Ok(PermissionSet::new()),
            (Some(tenant_id), _) => tenant_user_permissions(store, tenant_id, &subject.roles).await,
        },
        // the subject is the impersonated user
        SessionAccess::Impersonation { target_tenant, .. } => {
            tenant_user_permissions(store, *target_tenant, &subject.roles).await
        }
        SessionAccess::SecureLogin { target_tenant, .. } => {
            let roles = store.list_roles(*target_tenant).await?;
            Ok(roles.into_iter().flat_map(|r| r.permissions).collect())
        }
    }
}

async fn tenant_user_permissions(
    store: &dyn Store,
    tenant_id: Uuid,
    role_names: &[String],
) -> Result<PermissionSet, StoreError> {
    let roles = store.list_roles(tenant_id).await?;
    Ok(roles
        .into_iter()
        .filter(|r| role_names.contains(&r.name))
        .flat_map(|r| r.permissions)
        .collect())
}
