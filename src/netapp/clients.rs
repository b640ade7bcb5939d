//! Per-kind NetApp clients
//!
//! Thin typed wrappers over [`ArmClient`], one per resource kind, handed out by
//! a [`ClientFactory`] that holds the credential and subscription. Mutations
//! return a [`PendingOperation`]; waiting for it is left to the caller.

use super::models::{
    Account, AuthorizeRequest, CapacityPool, GenericResource, ReplicationStatus, Snapshot,
    SnapshotPolicy, SnapshotPolicyPatch, Volume, VolumePatch,
};
use crate::azure::client::ArmClient;
use crate::azure::lro::PendingOperation;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

fn to_body<T: Serialize>(resource: &T) -> Result<Value> {
    serde_json::to_value(resource).context("Failed to encode request body")
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).context("Failed to decode resource")
}

async fn get_netapp<T: DeserializeOwned>(arm: &ArmClient, path: &str) -> Result<T> {
    let url = arm.netapp_url(path)?;
    decode(arm.get(&url).await?)
}

/// Succeeds when the GET does, whatever the body holds
async fn exists_netapp(arm: &ArmClient, path: &str) -> Result<()> {
    let url = arm.netapp_url(path)?;
    arm.get(&url).await.map(drop)
}

/// Produces per-kind clients sharing one credential and subscription
#[derive(Clone)]
pub struct ClientFactory {
    arm: ArmClient,
}

impl ClientFactory {
    pub fn new(arm: ArmClient) -> Self {
        Self { arm }
    }

    pub fn arm(&self) -> &ArmClient {
        &self.arm
    }

    pub fn accounts(&self) -> AccountsClient<'_> {
        AccountsClient { arm: &self.arm }
    }

    pub fn pools(&self) -> PoolsClient<'_> {
        PoolsClient { arm: &self.arm }
    }

    pub fn volumes(&self) -> VolumesClient<'_> {
        VolumesClient { arm: &self.arm }
    }

    pub fn snapshots(&self) -> SnapshotsClient<'_> {
        SnapshotsClient { arm: &self.arm }
    }

    pub fn snapshot_policies(&self) -> SnapshotPoliciesClient<'_> {
        SnapshotPoliciesClient { arm: &self.arm }
    }

    pub fn resources(&self) -> ResourcesClient<'_> {
        ResourcesClient { arm: &self.arm }
    }
}

// =============================================================================
// Accounts
// =============================================================================

pub struct AccountsClient<'a> {
    arm: &'a ArmClient,
}

impl AccountsClient<'_> {
    pub async fn get(&self, resource_group: &str, account: &str) -> Result<Account> {
        get_netapp(self.arm, &self.arm.account_path(resource_group, account)).await
    }

    pub async fn exists(&self, resource_group: &str, account: &str) -> Result<()> {
        exists_netapp(self.arm, &self.arm.account_path(resource_group, account)).await
    }

    pub async fn begin_create_or_update(
        &self,
        resource_group: &str,
        account: &str,
        body: &Account,
    ) -> Result<PendingOperation> {
        let url = self.arm.netapp_url(&self.arm.account_path(resource_group, account))?;
        self.arm.begin_put(&url, &to_body(body)?).await
    }

    pub async fn begin_delete(&self, resource_group: &str, account: &str) -> Result<PendingOperation> {
        let url = self.arm.netapp_url(&self.arm.account_path(resource_group, account))?;
        self.arm.begin_delete(&url).await
    }
}

// =============================================================================
// Capacity pools
// =============================================================================

pub struct PoolsClient<'a> {
    arm: &'a ArmClient,
}

impl PoolsClient<'_> {
    pub async fn get(&self, resource_group: &str, account: &str, pool: &str) -> Result<CapacityPool> {
        get_netapp(self.arm, &self.arm.pool_path(resource_group, account, pool)).await
    }

    pub async fn exists(&self, resource_group: &str, account: &str, pool: &str) -> Result<()> {
        exists_netapp(self.arm, &self.arm.pool_path(resource_group, account, pool)).await
    }

    pub async fn begin_create_or_update(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        body: &CapacityPool,
    ) -> Result<PendingOperation> {
        let url = self.arm.netapp_url(&self.arm.pool_path(resource_group, account, pool))?;
        self.arm.begin_put(&url, &to_body(body)?).await
    }

    pub async fn begin_delete(&self, resource_group: &str, account: &str, pool: &str) -> Result<PendingOperation> {
        let url = self.arm.netapp_url(&self.arm.pool_path(resource_group, account, pool))?;
        self.arm.begin_delete(&url).await
    }
}

// =============================================================================
// Volumes
// =============================================================================

pub struct VolumesClient<'a> {
    arm: &'a ArmClient,
}

impl VolumesClient<'_> {
    fn url(&self, resource_group: &str, account: &str, pool: &str, volume: &str, action: Option<&str>) -> Result<String> {
        let mut path = self.arm.volume_path(resource_group, account, pool, volume);
        if let Some(action) = action {
            path = format!("{}/{}", path, action);
        }
        self.arm.netapp_url(&path)
    }

    pub async fn get(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<Volume> {
        get_netapp(self.arm, &self.arm.volume_path(resource_group, account, pool, volume)).await
    }

    pub async fn exists(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<()> {
        exists_netapp(self.arm, &self.arm.volume_path(resource_group, account, pool, volume)).await
    }

    pub async fn begin_create_or_update(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        body: &Volume,
    ) -> Result<PendingOperation> {
        let url = self.url(resource_group, account, pool, volume, None)?;
        self.arm.begin_put(&url, &to_body(body)?).await
    }

    pub async fn begin_update(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        body: &VolumePatch,
    ) -> Result<PendingOperation> {
        let url = self.url(resource_group, account, pool, volume, None)?;
        self.arm.begin_patch(&url, &to_body(body)?).await
    }

    pub async fn begin_delete(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<PendingOperation> {
        let url = self.url(resource_group, account, pool, volume, None)?;
        self.arm.begin_delete(&url).await
    }

    pub async fn replication_status(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
    ) -> Result<ReplicationStatus> {
        let url = self.url(resource_group, account, pool, volume, Some("replicationStatus"))?;
        decode(self.arm.get(&url).await?)
    }

    /// Succeeds while the replication status endpoint answers
    pub async fn replication_reachable(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
    ) -> Result<()> {
        let url = self.url(resource_group, account, pool, volume, Some("replicationStatus"))?;
        self.arm.get(&url).await.map(drop)
    }

    pub async fn begin_authorize_replication(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        request: &AuthorizeRequest,
    ) -> Result<PendingOperation> {
        let url = self.url(resource_group, account, pool, volume, Some("authorizeReplication"))?;
        self.arm.begin_post(&url, Some(&to_body(request)?)).await
    }

    pub async fn begin_delete_replication(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
    ) -> Result<PendingOperation> {
        let url = self.url(resource_group, account, pool, volume, Some("deleteReplication"))?;
        self.arm.begin_post(&url, None).await
    }
}

// =============================================================================
// Snapshots
// =============================================================================

pub struct SnapshotsClient<'a> {
    arm: &'a ArmClient,
}

impl SnapshotsClient<'_> {
    pub async fn get(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        snapshot: &str,
    ) -> Result<Snapshot> {
        get_netapp(
            self.arm,
            &self.arm.snapshot_path(resource_group, account, pool, volume, snapshot),
        )
        .await
    }

    pub async fn exists(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        snapshot: &str,
    ) -> Result<()> {
        exists_netapp(
            self.arm,
            &self.arm.snapshot_path(resource_group, account, pool, volume, snapshot),
        )
        .await
    }

    pub async fn begin_create(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        snapshot: &str,
        body: &Snapshot,
    ) -> Result<PendingOperation> {
        let path = self.arm.snapshot_path(resource_group, account, pool, volume, snapshot);
        let url = self.arm.netapp_url(&path)?;
        self.arm.begin_put(&url, &to_body(body)?).await
    }

    pub async fn begin_delete(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        snapshot: &str,
    ) -> Result<PendingOperation> {
        let path = self.arm.snapshot_path(resource_group, account, pool, volume, snapshot);
        let url = self.arm.netapp_url(&path)?;
        self.arm.begin_delete(&url).await
    }
}

// =============================================================================
// Snapshot policies
// =============================================================================

pub struct SnapshotPoliciesClient<'a> {
    arm: &'a ArmClient,
}

impl SnapshotPoliciesClient<'_> {
    pub async fn get(&self, resource_group: &str, account: &str, policy: &str) -> Result<SnapshotPolicy> {
        get_netapp(
            self.arm,
            &self.arm.snapshot_policy_path(resource_group, account, policy),
        )
        .await
    }

    pub async fn exists(&self, resource_group: &str, account: &str, policy: &str) -> Result<()> {
        exists_netapp(
            self.arm,
            &self.arm.snapshot_policy_path(resource_group, account, policy),
        )
        .await
    }

    /// Snapshot policy creation is synchronous
    pub async fn create(
        &self,
        resource_group: &str,
        account: &str,
        policy: &str,
        body: &SnapshotPolicy,
    ) -> Result<SnapshotPolicy> {
        let url = self
            .arm
            .netapp_url(&self.arm.snapshot_policy_path(resource_group, account, policy))?;
        let response = self.arm.put(&url, &to_body(body)?).await?;
        decode(response.body)
    }

    pub async fn begin_update(
        &self,
        resource_group: &str,
        account: &str,
        policy: &str,
        body: &SnapshotPolicyPatch,
    ) -> Result<PendingOperation> {
        let url = self
            .arm
            .netapp_url(&self.arm.snapshot_policy_path(resource_group, account, policy))?;
        self.arm.begin_patch(&url, &to_body(body)?).await
    }

    pub async fn begin_delete(&self, resource_group: &str, account: &str, policy: &str) -> Result<PendingOperation> {
        let url = self
            .arm
            .netapp_url(&self.arm.snapshot_policy_path(resource_group, account, policy))?;
        self.arm.begin_delete(&url).await
    }
}

// =============================================================================
// Generic resources
// =============================================================================

pub struct ResourcesClient<'a> {
    arm: &'a ArmClient,
}

impl ResourcesClient<'_> {
    pub async fn get(
        &self,
        resource_group: &str,
        provider: &str,
        parent: &str,
        resource_type: &str,
        name: &str,
        api_version: &str,
    ) -> Result<GenericResource> {
        let path = self
            .arm
            .generic_resource_path(resource_group, provider, parent, resource_type, name);
        let url = self.arm.arm_url(&path, api_version)?;
        decode(self.arm.get(&url).await?)
    }
}
