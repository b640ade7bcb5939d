//! Azure Resource Manager client
//!
//! Combines authentication and HTTP functionality, and builds the
//! Resource Manager URLs for NetApp resources.

use super::auth::AzureCredentials;
use super::http::{ArmHttpClient, ArmResponse};
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// API version of the `Microsoft.NetApp` resource provider
pub const NETAPP_API_VERSION: &str = "2022-05-01";

/// Default wait between long-running operation polls when the service
/// sends no `Retry-After`
pub const DEFAULT_LRO_INTERVAL: Duration = Duration::from_secs(5);

/// Main Resource Manager client
#[derive(Clone)]
pub struct ArmClient {
    pub credentials: AzureCredentials,
    pub http: ArmHttpClient,
    pub subscription_id: String,
    pub endpoint: String,
    pub lro_interval: Duration,
}

impl ArmClient {
    pub fn new(credentials: AzureCredentials, subscription_id: &str, endpoint: &str) -> Result<Self> {
        let http = ArmHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            subscription_id: subscription_id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            lro_interval: DEFAULT_LRO_INTERVAL,
        })
    }

    pub fn with_lro_interval(mut self, interval: Duration) -> Self {
        self.lro_interval = interval;
        self
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request and return the JSON body
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        Ok(self.http.get(url, &token).await?.body)
    }

    /// Make a GET request and keep status and headers
    pub async fn get_response(&self, url: &str) -> Result<ArmResponse> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    pub async fn put(&self, url: &str, body: &Value) -> Result<ArmResponse> {
        let token = self.get_token().await?;
        self.http.put(url, &token, body).await
    }

    pub async fn patch(&self, url: &str, body: &Value) -> Result<ArmResponse> {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<ArmResponse> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<ArmResponse> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    // =========================================================================
    // Resource Manager URL helpers
    // =========================================================================

    /// Build a Resource Manager URL for a path and api-version
    pub fn arm_url(&self, path: &str, api_version: &str) -> Result<String> {
        let mut url = Url::parse(&format!("{}{}", self.endpoint, path))
            .with_context(|| format!("Invalid resource path: {}", path))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url.to_string())
    }

    /// Build resource group path
    pub fn resource_group_path(&self, resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, resource_group
        )
    }

    // =========================================================================
    // NetApp paths
    // =========================================================================

    pub fn account_path(&self, resource_group: &str, account: &str) -> String {
        format!(
            "{}/providers/Microsoft.NetApp/netAppAccounts/{}",
            self.resource_group_path(resource_group),
            account
        )
    }

    pub fn pool_path(&self, resource_group: &str, account: &str, pool: &str) -> String {
        format!("{}/capacityPools/{}", self.account_path(resource_group, account), pool)
    }

    pub fn volume_path(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> String {
        format!("{}/volumes/{}", self.pool_path(resource_group, account, pool), volume)
    }

    pub fn snapshot_path(
        &self,
        resource_group: &str,
        account: &str,
        pool: &str,
        volume: &str,
        snapshot: &str,
    ) -> String {
        format!(
            "{}/snapshots/{}",
            self.volume_path(resource_group, account, pool, volume),
            snapshot
        )
    }

    pub fn snapshot_policy_path(&self, resource_group: &str, account: &str, policy: &str) -> String {
        format!(
            "{}/snapshotPolicies/{}",
            self.account_path(resource_group, account),
            policy
        )
    }

    /// Build NetApp provider URL for a resource path
    pub fn netapp_url(&self, path: &str) -> Result<String> {
        self.arm_url(path, NETAPP_API_VERSION)
    }

    // =========================================================================
    // Generic resources
    // =========================================================================

    /// Build generic resource path; `parent` may be empty
    pub fn generic_resource_path(
        &self,
        resource_group: &str,
        provider: &str,
        parent: &str,
        resource_type: &str,
        name: &str,
    ) -> String {
        let parent = if parent.is_empty() {
            String::new()
        } else {
            format!("/{}", parent.trim_matches('/'))
        };

        format!(
            "{}/providers/{}{}/{}/{}",
            self.resource_group_path(resource_group),
            provider,
            parent,
            resource_type,
            name
        )
    }
}
