//! NetApp resource gateway
//!
//! One method per provisioning intent. Each mutation is validated locally,
//! submitted, then awaited until its long-running operation finishes. Failures
//! name the phase that failed, see [`NetAppError::Submission`] and
//! [`NetAppError::Completion`].

use super::clients::{decode, ClientFactory};
use super::models::{
    Account, AccountProperties, ActiveDirectory, AuthorizeRequest, CapacityPool, DataProtection,
    ExportPolicy, ExportPolicyRule, GenericResource, PoolProperties, ProtocolType, ServiceLevel,
    Snapshot, SnapshotPolicy, SnapshotPolicyPatch, Tags, Volume, VolumePatch,
    VolumePatchProperties, VolumeProperties,
};
use super::wait::{self, PollRequest};
use crate::abort::AbortSignal;
use crate::azure::lro::PendingOperation;
use crate::error::{NetAppError, Result, ValidationError};
use crate::uri;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Everything needed to create a volume
#[derive(Debug, Clone, Default)]
pub struct VolumeRequest {
    pub location: String,
    pub resource_group: String,
    pub account: String,
    pub pool: String,
    pub name: String,
    pub service_level: String,
    pub subnet_id: String,
    /// Restore the new volume from this snapshot
    pub snapshot_id: Option<String>,
    /// Primary protocol first; at most two
    pub protocol_types: Vec<String>,
    /// Quota in bytes
    pub usage_threshold: u64,
    pub unix_read_only: bool,
    pub unix_read_write: bool,
    pub tags: Option<Tags>,
    pub data_protection: Option<DataProtection>,
}

/// Check a volume's protocol list and return its primary protocol.
/// Only the first entry is parsed; a second entry is passed through as given.
pub fn validate_protocol_types(protocol_types: &[String]) -> Result<ProtocolType, ValidationError> {
    let Some(primary) = protocol_types.first() else {
        return Err(ValidationError::NoProtocolTypes);
    };
    if protocol_types.len() > 2 {
        return Err(ValidationError::TooManyProtocolTypes);
    }
    if protocol_types.len() > 1 && protocol_types.iter().any(|p| p == ProtocolType::Nfsv41.as_str()) {
        return Err(ValidationError::UnsupportedDualProtocol);
    }

    primary.parse()
}

/// Open export rule for NFS volumes; SMB volumes get none
pub fn default_export_policy(
    primary: ProtocolType,
    unix_read_only: bool,
    unix_read_write: bool,
) -> Option<ExportPolicy> {
    if primary == ProtocolType::Cifs {
        return None;
    }

    Some(ExportPolicy {
        rules: vec![ExportPolicyRule {
            rule_index: 1,
            allowed_clients: "0.0.0.0/0".to_string(),
            cifs: primary == ProtocolType::Cifs,
            nfsv3: primary == ProtocolType::Nfsv3,
            nfsv41: primary == ProtocolType::Nfsv41,
            unix_read_only,
            unix_read_write,
        }],
    })
}

#[derive(Clone)]
pub struct NetAppGateway {
    factory: ClientFactory,
    abort: AbortSignal,
}

impl NetAppGateway {
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            abort: AbortSignal::never(),
        }
    }

    /// Cancel operation polling and resource waits when `abort` fires
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn factory(&self) -> &ClientFactory {
        &self.factory
    }

    /// Poll a pending operation and decode the final resource
    async fn complete<T: DeserializeOwned>(&self, pending: PendingOperation, action: &'static str) -> Result<T> {
        let body = pending
            .poll_until_done(self.factory.arm(), &self.abort)
            .await
            .map_err(NetAppError::completion(action))?;
        decode(body).map_err(NetAppError::completion(action))
    }

    async fn finish(&self, pending: PendingOperation, action: &'static str) -> Result<()> {
        pending
            .poll_until_done(self.factory.arm(), &self.abort)
            .await
            .map(drop)
            .map_err(NetAppError::completion(action))
    }

    // =========================================================================
    // Creates and updates
    // =========================================================================

    pub async fn create_account(
        &self,
        location: &str,
        resource_group: &str,
        account: &str,
        active_directories: Option<Vec<ActiveDirectory>>,
        tags: Option<Tags>,
    ) -> Result<Account> {
        let body = Account {
            location: Some(location.to_string()),
            tags,
            properties: AccountProperties {
                active_directories,
                ..Default::default()
            },
            ..Default::default()
        };

        tracing::debug!("Creating account {}/{}", resource_group, account);
        let pending = self
            .factory
            .accounts()
            .begin_create_or_update(resource_group, account, &body)
            .await
            .map_err(NetAppError::submission("create account"))?;

        self.complete(pending, "account create or update").await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_capacity_pool(
        &self,
        location: &str,
        resource_group: &str,
        account: &str,
        pool: &str,
        service_level: &str,
        size: u64,
        tags: Option<Tags>,
    ) -> Result<CapacityPool> {
        let service_level: ServiceLevel = service_level.parse()?;

        let body = CapacityPool {
            location: Some(location.to_string()),
            tags,
            properties: PoolProperties {
                service_level: Some(service_level),
                size: Some(size),
                ..Default::default()
            },
            ..Default::default()
        };

        tracing::debug!("Creating capacity pool {}/{}/{}", resource_group, account, pool);
        let pending = self
            .factory
            .pools()
            .begin_create_or_update(resource_group, account, pool, &body)
            .await
            .map_err(NetAppError::submission("create pool"))?;

        self.complete(pending, "pool create or update").await
    }

    pub async fn create_volume(&self, request: &VolumeRequest) -> Result<Volume> {
        let primary = validate_protocol_types(&request.protocol_types)?;
        let service_level: ServiceLevel = request.service_level.parse()?;

        let body = Volume {
            location: Some(request.location.clone()),
            tags: request.tags.clone(),
            properties: VolumeProperties {
                creation_token: request.name.clone(),
                service_level: Some(service_level),
                usage_threshold: request.usage_threshold,
                subnet_id: request.subnet_id.clone(),
                protocol_types: request.protocol_types.clone(),
                export_policy: default_export_policy(
                    primary,
                    request.unix_read_only,
                    request.unix_read_write,
                ),
                snapshot_id: request.snapshot_id.clone().filter(|id| !id.is_empty()),
                data_protection: request.data_protection.clone(),
                ..Default::default()
            },
            ..Default::default()
        };

        tracing::debug!(
            "Creating volume {}/{}/{}/{}",
            request.resource_group,
            request.account,
            request.pool,
            request.name
        );
        let pending = self
            .factory
            .volumes()
            .begin_create_or_update(
                &request.resource_group,
                &request.account,
                &request.pool,
                &request.name,
                &body,
            )
            .await
            .map_err(NetAppError::submission("create volume"))?;

        self.complete(pending, "volume create or update").await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_volume(
        &self,
        location: &str,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        patch: VolumePatchProperties,
        tags: Option<Tags>,
    ) -> Result<Volume> {
        let body = VolumePatch {
            location: Some(location.to_string()),
            tags,
            properties: patch,
            ..Default::default()
        };

        tracing::debug!("Updating volume {}/{}/{}/{}", resource_group, account, pool, volume);
        let pending = self
            .factory
            .volumes()
            .begin_update(resource_group, account, pool, volume, &body)
            .await
            .map_err(NetAppError::submission("update volume"))?;

        self.complete(pending, "volume update").await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_snapshot(
        &self,
        location: &str,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        snapshot: &str,
        tags: Option<Tags>,
    ) -> Result<Snapshot> {
        let body = Snapshot {
            location: Some(location.to_string()),
            tags,
            ..Default::default()
        };

        let pending = self
            .factory
            .snapshots()
            .begin_create(resource_group, account, pool, volume, snapshot, &body)
            .await
            .map_err(NetAppError::submission("create snapshot"))?;

        self.complete(pending, "snapshot create or update").await
    }

    pub async fn create_snapshot_policy(
        &self,
        resource_group: &str,
        account: &str,
        policy: &str,
        body: &SnapshotPolicy,
    ) -> Result<SnapshotPolicy> {
        self.factory
            .snapshot_policies()
            .create(resource_group, account, policy, body)
            .await
            .map_err(NetAppError::submission("create snapshot policy"))
    }

    pub async fn update_snapshot_policy(
        &self,
        resource_group: &str,
        account: &str,
        policy: &str,
        patch: &SnapshotPolicyPatch,
    ) -> Result<SnapshotPolicy> {
        let pending = self
            .factory
            .snapshot_policies()
            .begin_update(resource_group, account, policy, patch)
            .await
            .map_err(NetAppError::submission("update snapshot policy"))?;

        self.complete(pending, "snapshot policy update").await
    }

    // =========================================================================
    // Replication
    // =========================================================================

    /// Authorize the source volume to replicate to `remote_volume_resource_id`
    pub async fn authorize_replication(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        remote_volume_resource_id: &str,
    ) -> Result<()> {
        let request = AuthorizeRequest {
            remote_volume_resource_id: remote_volume_resource_id.to_string(),
        };

        let pending = self
            .factory
            .volumes()
            .begin_authorize_replication(resource_group, account, pool, volume, &request)
            .await
            .map_err(NetAppError::submission("authorize volume replication"))?;

        self.finish(pending, "authorize volume replication").await
    }

    pub async fn delete_volume_replication(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
    ) -> Result<()> {
        let pending = self
            .factory
            .volumes()
            .begin_delete_replication(resource_group, account, pool, volume)
            .await
            .map_err(NetAppError::submission("delete volume replication"))?;

        self.finish(pending, "delete volume replication").await
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    pub async fn delete_snapshot(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        snapshot: &str,
    ) -> Result<()> {
        let pending = self
            .factory
            .snapshots()
            .begin_delete(resource_group, account, pool, volume, snapshot)
            .await
            .map_err(NetAppError::submission("delete snapshot"))?;

        self.finish(pending, "snapshot delete").await
    }

    pub async fn delete_volume(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<()> {
        let pending = self
            .factory
            .volumes()
            .begin_delete(resource_group, account, pool, volume)
            .await
            .map_err(NetAppError::submission("delete volume"))?;

        self.finish(pending, "volume delete").await
    }

    pub async fn delete_capacity_pool(&self, resource_group: &str, account: &str, pool: &str) -> Result<()> {
        let pending = self
            .factory
            .pools()
            .begin_delete(resource_group, account, pool)
            .await
            .map_err(NetAppError::submission("delete capacity pool"))?;

        self.finish(pending, "capacity pool delete").await
    }

    pub async fn delete_snapshot_policy(&self, resource_group: &str, account: &str, policy: &str) -> Result<()> {
        let pending = self
            .factory
            .snapshot_policies()
            .begin_delete(resource_group, account, policy)
            .await
            .map_err(NetAppError::submission("delete snapshot policy"))?;

        self.finish(pending, "snapshot policy delete").await
    }

    pub async fn delete_account(&self, resource_group: &str, account: &str) -> Result<()> {
        let pending = self
            .factory
            .accounts()
            .begin_delete(resource_group, account)
            .await
            .map_err(NetAppError::submission("delete account"))?;

        self.finish(pending, "account delete").await
    }

    // =========================================================================
    // Reads and waits
    // =========================================================================

    /// Read any resource by id through the generic resources API.
    /// Subnets are addressed under their virtual network.
    pub async fn get_resource_by_id(&self, resource_id: &str, api_version: &str) -> Result<GenericResource> {
        let resource_group = uri::resource_group(resource_id);
        let provider = uri::resource_value(resource_id, "providers");
        let name = uri::resource_name(resource_id);
        let mut resource_type = uri::resource_value(resource_id, &provider);
        let mut parent = String::new();

        if resource_id.contains("/subnets/") {
            parent = format!("{}/{}", resource_type, uri::resource_value(resource_id, &resource_type));
            resource_type = "subnets".to_string();
        }

        let resource = self
            .factory
            .resources()
            .get(&resource_group, &provider, &parent, &resource_type, &name, api_version)
            .await?;
        Ok(resource)
    }

    /// Wait until a just-created resource can be read
    pub async fn wait_for_resource(
        &self,
        resource_id: &str,
        interval: Duration,
        retries: u32,
        check_replication: bool,
    ) -> Result<()> {
        let request = PollRequest::presence(resource_id, interval, retries)
            .with_replication_check(check_replication);
        wait::wait_for(&self.factory, &request, &self.abort).await
    }

    /// Wait until a just-deleted resource can no longer be read
    pub async fn wait_for_no_resource(
        &self,
        resource_id: &str,
        interval: Duration,
        retries: u32,
        check_replication: bool,
    ) -> Result<()> {
        let request = PollRequest::absence(resource_id, interval, retries)
            .with_replication_check(check_replication);
        wait::wait_for(&self.factory, &request, &self.abort).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::auth::AzureCredentials;
    use crate::azure::client::ArmClient;

    fn protocols(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// Gateway pointed at a port nothing listens on; only local checks can pass
    fn offline_gateway() -> NetAppGateway {
        let arm = ArmClient::new(AzureCredentials::from_static_token("t"), "sub", "http://127.0.0.1:9").unwrap();
        NetAppGateway::new(ClientFactory::new(arm))
    }

    #[test]
    fn test_validate_single_protocols() {
        for (input, expected) in [
            ("NFSv3", ProtocolType::Nfsv3),
            ("NFSv4.1", ProtocolType::Nfsv41),
            ("CIFS", ProtocolType::Cifs),
        ] {
            assert_eq!(validate_protocol_types(&protocols(&[input])), Ok(expected));
        }
    }

    #[test]
    fn test_validate_dual_protocol() {
        assert_eq!(
            validate_protocol_types(&protocols(&["CIFS", "NFSv3"])),
            Ok(ProtocolType::Cifs)
        );
        assert_eq!(
            validate_protocol_types(&protocols(&["NFSv3", "CIFS"])),
            Ok(ProtocolType::Nfsv3)
        );
        for pair in [["NFSv4.1", "CIFS"], ["NFSv3", "NFSv4.1"]] {
            assert_eq!(
                validate_protocol_types(&protocols(&pair)),
                Err(ValidationError::UnsupportedDualProtocol)
            );
        }
    }

    #[test]
    fn test_validate_too_many_protocols() {
        assert_eq!(
            validate_protocol_types(&protocols(&["NFSv3", "CIFS", "NFSv3"])),
            Err(ValidationError::TooManyProtocolTypes)
        );
    }

    #[test]
    fn test_validate_rejects_empty_and_unknown() {
        assert_eq!(validate_protocol_types(&[]), Err(ValidationError::NoProtocolTypes));

        let err = validate_protocol_types(&protocols(&["SMB"])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidProtocolType { ref value, .. } if value == "SMB"));
        assert!(err.to_string().contains("NFSv3 NFSv4.1 CIFS"));

        assert!(validate_protocol_types(&protocols(&["nfs", "CIFS"])).is_err());
    }

    #[test]
    fn test_validate_checks_only_primary_name() {
        assert_eq!(
            validate_protocol_types(&protocols(&["NFSv3", "SMB"])),
            Ok(ProtocolType::Nfsv3)
        );
    }

    #[test]
    fn test_export_policy_follows_primary_protocol() {
        let policy = default_export_policy(ProtocolType::Nfsv41, false, true).unwrap();
        assert_eq!(
            policy.rules,
            vec![ExportPolicyRule {
                rule_index: 1,
                allowed_clients: "0.0.0.0/0".to_string(),
                cifs: false,
                nfsv3: false,
                nfsv41: true,
                unix_read_only: false,
                unix_read_write: true,
            }]
        );

        let policy = default_export_policy(ProtocolType::Nfsv3, true, false).unwrap();
        assert!(policy.rules[0].nfsv3);
        assert!(policy.rules[0].unix_read_only);

        assert!(default_export_policy(ProtocolType::Cifs, false, true).is_none());
    }

    #[tokio::test]
    async fn test_create_volume_validates_before_submitting() {
        let gateway = offline_gateway();
        let request = VolumeRequest {
            protocol_types: protocols(&["NFSv3", "CIFS", "NFSv4.1"]),
            service_level: "Premium".to_string(),
            ..Default::default()
        };

        let err = gateway.create_volume(&request).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "maximum of two protocol types are supported");

        let request = VolumeRequest {
            protocol_types: protocols(&["NFSv3"]),
            service_level: "gold".to_string(),
            ..Default::default()
        };
        let err = gateway.create_volume(&request).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_create_pool_validates_service_level() {
        let err = offline_gateway()
            .create_capacity_pool("eastus", "rg", "acct", "pool", "gold", 0, None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Premium Standard Ultra"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_submission_error() {
        let err = offline_gateway().delete_account("rg", "acct").await.unwrap_err();
        assert!(matches!(err, NetAppError::Submission { action: "delete account", .. }));
    }
}
