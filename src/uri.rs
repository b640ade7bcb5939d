//! Resource identifier parsing
//!
//! Extracts names from ARM resource ids such as
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.NetApp/netAppAccounts/{account}/...`
//! and classifies which NetApp resource an id points at.
//!
//! None of these functions fail. Empty or malformed input yields an empty string,
//! `false` or [`ResourceKind::Unknown`]; callers validate what they need.

use std::fmt;

/// ARM provider namespace of Azure NetApp Files
pub const NETAPP_PROVIDER: &str = "Microsoft.NetApp";

/// Kind of NetApp resource an id points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Account,
    CapacityPool,
    Volume,
    Snapshot,
    SnapshotPolicy,
    Unknown,
}

/// Classification table, most specific first. The first marker found wins,
/// so a snapshot id (which also contains `/volumes/`) is a snapshot.
const KIND_MARKERS: &[(&str, ResourceKind)] = &[
    ("/snapshots/", ResourceKind::Snapshot),
    ("/volumes/", ResourceKind::Volume),
    ("/capacityPools/", ResourceKind::CapacityPool),
    ("/snapshotPolicies/", ResourceKind::SnapshotPolicy),
];

const ACCOUNT_MARKER: &str = "/netAppAccounts/";

/// Account children that are not tracked here; their ids never classify as accounts
const ACCOUNT_EXCLUDED_MARKERS: &[&str] = &["/snapshotPolicies/", "/backupPolicies/"];

impl ResourceKind {
    /// Classify a resource id. Marker matching is case-sensitive.
    pub fn classify(resource_id: &str) -> Self {
        if !is_netapp_resource(resource_id) {
            return Self::Unknown;
        }

        if let Some((_, kind)) = KIND_MARKERS
            .iter()
            .find(|(marker, _)| resource_id.contains(marker))
        {
            return *kind;
        }

        // snapshotPolicies is already covered by the table above
        let excluded = ACCOUNT_EXCLUDED_MARKERS
            .iter()
            .any(|marker| resource_id.contains(marker));

        if resource_id.contains(ACCOUNT_MARKER) && !excluded {
            Self::Account
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::CapacityPool => "capacity pool",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
            Self::SnapshotPolicy => "snapshot policy",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn with_leading_slash(value: &str) -> String {
    if value.starts_with('/') {
        value.to_string()
    } else {
        format!("/{}", value)
    }
}

/// Second `/`-separated token of `suffix`, i.e. the value right after a marker
fn value_after_marker(suffix: &str) -> String {
    suffix.split('/').nth(1).unwrap_or_default().to_string()
}

/// Get the value that follows `marker` in a resource id.
///
/// `resource_value("/subscriptions/s/resourceGroups/rg", "resourceGroups")` is `"rg"`.
/// Matching is ASCII case-insensitive and the leading `/` of either argument is
/// optional. When the resource group itself is named after the marker
/// (`/resourceGroups/volumes/...`), the value after the *last* occurrence of the
/// marker is returned instead of the first.
pub fn resource_value(resource_id: &str, marker: &str) -> String {
    if resource_id.trim().is_empty() || marker.trim().is_empty() {
        return String::new();
    }

    let resource_id = with_leading_slash(resource_id);
    let marker = with_leading_slash(marker);

    // ASCII lowering keeps byte offsets valid for slicing the input
    let id_lower = resource_id.to_ascii_lowercase();
    let marker_lower = marker.to_ascii_lowercase();

    let rg_named_like_marker = format!("/resourcegroups{}", marker_lower);
    if id_lower.contains(&rg_named_like_marker) {
        if let Some(index) = id_lower.rfind(&marker_lower) {
            return value_after_marker(&resource_id[index + marker.len()..]);
        }
    }

    match id_lower.find(&marker_lower) {
        Some(index) => value_after_marker(&resource_id[index + marker.len()..]),
        None => String::new(),
    }
}

/// Get the trailing name of a resource id (everything after the final `/`)
pub fn resource_name(resource_id: &str) -> String {
    if resource_id.trim().is_empty() {
        return String::new();
    }

    resource_id
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn subscription(resource_id: &str) -> String {
    resource_value(resource_id, "/subscriptions")
}

pub fn resource_group(resource_id: &str) -> String {
    resource_value(resource_id, "/resourceGroups")
}

pub fn account(resource_id: &str) -> String {
    resource_value(resource_id, "/netAppAccounts")
}

pub fn capacity_pool(resource_id: &str) -> String {
    resource_value(resource_id, "/capacityPools")
}

pub fn volume(resource_id: &str) -> String {
    resource_value(resource_id, "/volumes")
}

pub fn snapshot(resource_id: &str) -> String {
    resource_value(resource_id, "/snapshots")
}

pub fn snapshot_policy(resource_id: &str) -> String {
    resource_value(resource_id, "/snapshotPolicies")
}

/// Check whether the id belongs to the NetApp provider (case-sensitive)
pub fn is_netapp_resource(resource_id: &str) -> bool {
    !resource_id.trim().is_empty() && resource_id.contains(NETAPP_PROVIDER)
}

pub fn is_snapshot(resource_id: &str) -> bool {
    ResourceKind::classify(resource_id) == ResourceKind::Snapshot
}

pub fn is_volume(resource_id: &str) -> bool {
    ResourceKind::classify(resource_id) == ResourceKind::Volume
}

pub fn is_capacity_pool(resource_id: &str) -> bool {
    ResourceKind::classify(resource_id) == ResourceKind::CapacityPool
}

pub fn is_snapshot_policy(resource_id: &str) -> bool {
    ResourceKind::classify(resource_id) == ResourceKind::SnapshotPolicy
}

pub fn is_account(resource_id: &str) -> bool {
    ResourceKind::classify(resource_id) == ResourceKind::Account
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_ID: &str = "/subscriptions/0000-1111/resourceGroups/anf-rg/providers/Microsoft.NetApp/netAppAccounts/anf-acct";

    fn pool_id() -> String {
        format!("{}/capacityPools/pool01", ACCOUNT_ID)
    }

    fn volume_id() -> String {
        format!("{}/volumes/vol01", pool_id())
    }

    fn snapshot_id() -> String {
        format!("{}/snapshots/snap01", volume_id())
    }

    #[test]
    fn test_extracts_every_level() {
        let id = snapshot_id();
        assert_eq!(subscription(&id), "0000-1111");
        assert_eq!(resource_group(&id), "anf-rg");
        assert_eq!(account(&id), "anf-acct");
        assert_eq!(capacity_pool(&id), "pool01");
        assert_eq!(volume(&id), "vol01");
        assert_eq!(snapshot(&id), "snap01");
        assert_eq!(resource_name(&id), "snap01");
    }

    #[test]
    fn test_marker_matching_is_case_insensitive() {
        let id = "/SUBSCRIPTIONS/abc/resourcegroups/MyGroup/providers/Microsoft.NetApp/NETAPPACCOUNTS/Acct";
        assert_eq!(subscription(id), "abc");
        assert_eq!(resource_group(id), "MyGroup");
        assert_eq!(account(id), "Acct");
    }

    #[test]
    fn test_leading_slash_is_optional() {
        let id = "subscriptions/abc/resourceGroups/rg";
        assert_eq!(resource_value(id, "resourceGroups"), "rg");
        assert_eq!(resource_value(id, "/resourceGroups"), "rg");
    }

    #[test]
    fn test_missing_marker_or_value() {
        assert_eq!(volume(ACCOUNT_ID), "");
        assert_eq!(resource_value("/subscriptions", "/subscriptions"), "");
        assert_eq!(resource_value(ACCOUNT_ID, ""), "");
        assert_eq!(resource_value(ACCOUNT_ID, "   "), "");
    }

    #[test]
    fn test_resource_group_named_like_marker() {
        let id = "/subscriptions/s/resourceGroups/volumes/providers/Microsoft.NetApp/netAppAccounts/a/capacityPools/p/volumes/v1";
        assert_eq!(volume(id), "v1");
        assert_eq!(resource_group(id), "volumes");
        assert_eq!(account(id), "a");
        assert_eq!(capacity_pool(id), "p");
    }

    #[test]
    fn test_snapshot_policy_name() {
        let id = format!("{}/snapshotPolicies/daily", ACCOUNT_ID);
        assert_eq!(snapshot_policy(&id), "daily");
        assert_eq!(snapshot(&id), "");
    }

    #[test]
    fn test_resource_name_without_slash() {
        assert_eq!(resource_name("plain"), "plain");
        assert_eq!(resource_name("/a/b/"), "");
    }

    #[test]
    fn test_empty_inputs() {
        for input in ["", " ", "\t\n"] {
            assert_eq!(resource_value(input, "/volumes"), "");
            assert_eq!(resource_name(input), "");
            assert_eq!(subscription(input), "");
            assert_eq!(resource_group(input), "");
            assert!(!is_netapp_resource(input));
            assert_eq!(ResourceKind::classify(input), ResourceKind::Unknown);
        }
    }

    #[test]
    fn test_classify_by_specificity() {
        assert_eq!(ResourceKind::classify(ACCOUNT_ID), ResourceKind::Account);
        assert_eq!(ResourceKind::classify(&pool_id()), ResourceKind::CapacityPool);
        assert_eq!(ResourceKind::classify(&volume_id()), ResourceKind::Volume);
        assert_eq!(ResourceKind::classify(&snapshot_id()), ResourceKind::Snapshot);
        assert!(is_snapshot_policy(&format!(
            "{}/snapshotPolicies/daily",
            ACCOUNT_ID
        )));
    }

    #[test]
    fn test_child_marker_needs_following_segment() {
        assert!(is_capacity_pool(&format!("{}/volumes", pool_id())));
        assert!(is_volume(&format!("{}/snapshots", volume_id())));
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.NetApp/netAppAccounts";
        assert_eq!(ResourceKind::classify(id), ResourceKind::Unknown);
    }

    #[test]
    fn test_predicates_are_exclusive() {
        for id in [ACCOUNT_ID.to_string(), pool_id(), volume_id(), snapshot_id()] {
            let matches = [
                is_snapshot(&id),
                is_volume(&id),
                is_capacity_pool(&id),
                is_snapshot_policy(&id),
                is_account(&id),
            ];
            assert_eq!(matches.iter().filter(|m| **m).count(), 1, "{}", id);
        }
    }

    #[test]
    fn test_backup_policies_are_not_accounts() {
        let id = format!("{}/backupPolicies/weekly", ACCOUNT_ID);
        assert_eq!(ResourceKind::classify(&id), ResourceKind::Unknown);
        assert!(!is_account(&id));
    }

    #[test]
    fn test_non_netapp_resources_are_unknown() {
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/volumes/x";
        assert_eq!(ResourceKind::classify(id), ResourceKind::Unknown);
        // provider match is case-sensitive
        let id = "/subscriptions/s/resourceGroups/rg/providers/microsoft.netapp/netAppAccounts/a/volumes/v";
        assert!(!is_volume(id));
    }
}
