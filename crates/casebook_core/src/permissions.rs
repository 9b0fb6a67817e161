//! crates/casebook_core/src/permissions.rs
//!
//! Named staff permissions. Routes that need more than a login list the
//! permissions they require and check them against the user's set.

use std::collections::BTreeSet;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewClient,
    ViewService,
    ViewReferral,
    ViewCaseNote,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::ViewClient,
        Permission::ViewService,
        Permission::ViewReferral,
        Permission::ViewCaseNote,
    ];

    pub fn codename(self) -> &'static str {
        match self {
            Permission::ViewClient => "view_client",
            Permission::ViewService => "view_service",
            Permission::ViewReferral => "view_referral",
            Permission::ViewCaseNote => "view_casenote",
        }
    }

    pub fn from_codename(codename: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.codename() == codename)
    }
}

/// Required for the missed-class attendance report.
pub const ATTENDANCE_REPORT: &[Permission] = &[Permission::ViewClient, Permission::ViewService];

/// Required for advanced client and referral search.
pub const ADVANCED_SEARCH: &[Permission] = &[Permission::ViewClient, Permission::ViewReferral];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Unknown codenames are ignored.
    pub fn from_codenames<I, S>(codenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            codenames
                .into_iter()
                .filter_map(|c| Permission::from_codename(c.as_ref()))
                .collect(),
        )
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn missing(&self, required: &[Permission]) -> Vec<Permission> {
        required.iter().copied().filter(|p| !self.has(*p)).collect()
    }

    pub fn codenames(&self) -> Vec<String> {
        self.0.iter().map(|p| p.codename().to_string()).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codenames_round_trip_and_unknowns_are_dropped() {
        let set = PermissionSet::from_codenames(["view_client", "delete_everything", "view_service"]);
        assert_eq!(set.codenames(), vec!["view_client", "view_service"]);
    }

    #[test]
    fn missing_lists_only_absent_permissions() {
        let set: PermissionSet = [Permission::ViewClient].into_iter().collect();
        assert_eq!(set.missing(ATTENDANCE_REPORT), vec![Permission::ViewService]);
        assert!(set.missing(&[Permission::ViewClient]).is_empty());
    }
}
