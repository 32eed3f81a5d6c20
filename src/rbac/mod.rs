//! Permission sets and the ALL/ANY checker.
//!
//! Permissions are plain strings compared exactly; there are no wildcards and
//! no hierarchy between `tenants` and `tenants.read`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::PlatformRole;

pub mod resolver;

pub use resolver::resolve_permissions;

pub const TENANTS_READ: &str = "tenants.read";
pub const TENANTS_USERS_READ: &str = "tenants.users.read";
pub const TENANTS_IMPERSONATE: &str = "tenants.impersonate";
pub const TENANTS_SECURE_LOGIN: &str = "tenants.secure_login";
pub const PLATFORM_ADMIN: &str = "platform.admin";

/// Fixed permissions of platform-level roles
pub fn platform_role_permissions(role: PlatformRole) -> &'static [&'static str] {
    match role {
        PlatformRole::SuperAdmin => &[
            TENANTS_READ,
            TENANTS_USERS_READ,
            TENANTS_IMPERSONATE,
            TENANTS_SECURE_LOGIN,
            PLATFORM_ADMIN,
        ],
        PlatformRole::Operator => &[TENANTS_READ, TENANTS_USERS_READ, TENANTS_IMPERSONATE],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every required permission must be granted
    #[default]
    All,
    /// At least one required permission must be granted
    Any,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, permission: impl Into<String>) {
        self.0.insert(permission.into());
    }

    pub fn extend<I, S>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(permissions.into_iter().map(Into::into));
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Required permissions not present in this set
    pub fn missing<'a, S: AsRef<str>>(&self, required: &'a [S]) -> Vec<&'a str> {
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !self.contains(p))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PermissionSet::new();
        set.extend(iter);
        set
    }
}

/// `All` with an empty requirement is satisfied; `Any` with an empty
/// requirement is not.
pub fn check<S: AsRef<str>>(granted: &PermissionSet, required: &[S], mode: MatchMode) -> bool {
    match mode {
        MatchMode::All => required.iter().all(|p| granted.contains(p.as_ref())),
        MatchMode::Any => required.iter().any(|p| granted.contains(p.as_ref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> PermissionSet {
        items.iter().copied().collect()
    }

    #[test]
    fn all_mode_requires_superset() {
        assert!(check(&set(&["a", "b", "c"]), &["a", "b"], MatchMode::All));
        assert!(!check(&set(&["a"]), &["a", "b"], MatchMode::All));
    }

    #[test]
    fn any_mode_requires_intersection() {
        assert!(check(&set(&["a"]), &["a", "b"], MatchMode::Any));
        assert!(!check(&set(&["c"]), &["a", "b"], MatchMode::Any));
    }

    #[test]
    fn empty_requirements() {
        let none: [&str; 0] = [];
        assert!(check(&set(&[]), &none, MatchMode::All));
        assert!(!check(&set(&["a"]), &none, MatchMode::Any));
    }

    #[test]
    fn matching_is_exact() {
        assert!(!check(&set(&["tenants"]), &["tenants.read"], MatchMode::All));
        assert!(!check(&set(&["Tenants.Read"]), &["tenants.read"], MatchMode::Any));
    }

    #[test]
    fn missing_lists_absent_permissions_in_order() {
        let granted = set(&["b"]);
        assert_eq!(granted.missing(&["a", "b", "c"]), vec!["a", "c"]);
    }

    #[test]
    fn operators_cannot_secure_login() {
        let operator: PermissionSet = platform_role_permissions(PlatformRole::Operator).iter().copied().collect();
        assert!(operator.contains(TENANTS_IMPERSONATE));
        assert!(!operator.contains(TENANTS_SECURE_LOGIN));

        let admin: PermissionSet = platform_role_permissions(PlatformRole::SuperAdmin).iter().copied().collect();
        assert!(check(&admin, &[TENANTS_SECURE_LOGIN, PLATFORM_ADMIN], MatchMode::All));
    }

    #[test]
    fn serializes_as_sorted_list() {
        let json = serde_json::to_string(&set(&["b", "a"])).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
    }
}
