//! Azure Resource Manager interaction module
//!
//! This module provides the REST plumbing the NetApp gateway is built on.
//!
//! # Module Structure
//!
//! - [`auth`] - Service principal authentication with token caching
//! - [`client`] - Resource Manager client and URL builders
//! - [`http`] - HTTP utilities and Resource Manager error parsing
//! - [`lro`] - Long-running operation polling
//!
//! # Example
//!
//! ```ignore
//! use anf_provision::azure::{auth::AzureCredentials, client::ArmClient};
//!
//! async fn example(creds: AzureCredentials) -> anyhow::Result<()> {
//!     let client = ArmClient::new(creds, "my-subscription", "https://management.azure.com")?;
//!     let url = client.netapp_url(&client.account_path("my-rg", "my-account"))?;
//!     let account = client.get(&url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod lro;
