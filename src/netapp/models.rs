//! NetApp resource models
//!
//! Serde mirrors of the `Microsoft.NetApp` resource bodies. Only the fields
//! this tool reads or writes are modelled; unknown fields are ignored.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub type Tags = HashMap<String, String>;

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;
const BYTES_PER_TIB: u64 = 1024 * BYTES_PER_GIB;

pub fn tib_to_bytes(size: u32) -> u64 {
    u64::from(size) * BYTES_PER_TIB
}

pub fn bytes_to_tib(size: u64) -> u32 {
    (size / BYTES_PER_TIB) as u32
}

pub fn gib_to_bytes(size: u32) -> u64 {
    u64::from(size) * BYTES_PER_GIB
}

// =============================================================================
// Enumerations
// =============================================================================

/// Performance tier of a capacity pool or volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceLevel {
    Premium,
    Standard,
    Ultra,
}

impl ServiceLevel {
    pub const ALL: [ServiceLevel; 3] = [Self::Premium, Self::Standard, Self::Ultra];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "Premium",
            Self::Standard => "Standard",
            Self::Ultra => "Ultra",
        }
    }

    fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for ServiceLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ultra" => Ok(Self::Ultra),
            "premium" => Ok(Self::Premium),
            "standard" => Ok(Self::Standard),
            _ => Err(ValidationError::InvalidServiceLevel {
                value: s.to_string(),
                valid: Self::valid_values(),
            }),
        }
    }
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File protocol served by a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolType {
    #[serde(rename = "NFSv3")]
    Nfsv3,
    #[serde(rename = "NFSv4.1")]
    Nfsv41,
    #[serde(rename = "CIFS")]
    Cifs,
}

impl ProtocolType {
    pub const ALL: [ProtocolType; 3] = [Self::Nfsv3, Self::Nfsv41, Self::Cifs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nfsv3 => "NFSv3",
            Self::Nfsv41 => "NFSv4.1",
            Self::Cifs => "CIFS",
        }
    }

    pub(crate) fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for ProtocolType {
    type Err = ValidationError;

    /// Protocol names are matched exactly, as Azure spells them
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidProtocolType {
                value: s.to_string(),
                valid: Self::valid_values(),
            })
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tracked resources
// =============================================================================

/// Envelope shared by every Resource Manager tracked resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackedResource<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default)]
    pub properties: P,
}

impl<P> TrackedResource<P> {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

pub type Account = TrackedResource<AccountProperties>;
pub type CapacityPool = TrackedResource<PoolProperties>;
pub type Volume = TrackedResource<VolumeProperties>;
pub type VolumePatch = TrackedResource<VolumePatchProperties>;
pub type Snapshot = TrackedResource<SnapshotProperties>;
pub type SnapshotPolicy = TrackedResource<SnapshotPolicyProperties>;
pub type SnapshotPolicyPatch = TrackedResource<SnapshotPolicyProperties>;

/// Any resource read through the generic resources API
pub type GenericResource = TrackedResource<serde_json::Value>;

// =============================================================================
// Accounts
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_directories: Option<Vec<ActiveDirectory>>,
}

/// Active Directory connection used by SMB volumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDirectory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_directory_id: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub domain: String,
    /// Comma-separated DNS server addresses
    pub dns: String,
    pub smb_server_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

// =============================================================================
// Capacity pools
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_level: Option<ServiceLevel>,
    /// Provisioned size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

// =============================================================================
// Volumes
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProperties {
    #[serde(default)]
    pub creation_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_level: Option<ServiceLevel>,
    /// Quota in bytes
    #[serde(default)]
    pub usage_threshold: u64,
    #[serde(default)]
    pub subnet_id: String,
    /// Protocol names as Azure spells them, primary first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocol_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_policy: Option<ExportPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_protection: Option<DataProtection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_targets: Option<Vec<MountTarget>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumePatchProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_level: Option<ServiceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_policy: Option<ExportPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_protection: Option<DataProtection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPolicy {
    #[serde(default)]
    pub rules: Vec<ExportPolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPolicyRule {
    pub rule_index: i32,
    pub allowed_clients: String,
    pub cifs: bool,
    pub nfsv3: bool,
    pub nfsv41: bool,
    pub unix_read_only: bool,
    pub unix_read_write: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountTarget {
    #[serde(default)]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smb_server_fqdn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProtection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication: Option<Replication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<VolumeSnapshotPolicy>,
}

/// Cross-region replication settings of a data protection volume
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_id: Option<String>,
    /// `src` or `dst`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,
    /// `_10minutely`, `hourly` or `daily`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_schedule: Option<String>,
    pub remote_volume_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_volume_region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotPolicy {
    pub snapshot_policy_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationStatus {
    #[serde(default)]
    pub healthy: Option<bool>,
    #[serde(default)]
    pub relationship_status: Option<String>,
    #[serde(default)]
    pub mirror_state: Option<String>,
    #[serde(default)]
    pub total_progress: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub remote_volume_resource_id: String,
}

// =============================================================================
// Snapshots and snapshot policies
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPolicyProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_schedule: Option<HourlySchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_schedule: Option<DailySchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_schedule: Option<WeeklySchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_schedule: Option<MonthlySchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlySchedule {
    pub snapshots_to_keep: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySchedule {
    pub snapshots_to_keep: u32,
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub snapshots_to_keep: u32,
    /// Comma-separated day names, e.g. `Monday,Friday`
    pub day: String,
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedule {
    pub snapshots_to_keep: u32,
    /// Comma-separated days of month, e.g. `1,15`
    pub days_of_month: String,
    pub hour: u32,
    pub minute: u32,
}
