//! Azure NetApp Files resources
//!
//! # Module Structure
//!
//! - [`models`] - Resource bodies, service levels and protocol types
//! - [`clients`] - Per-kind clients and the factory that hands them out
//! - [`gateway`] - Validated create/update/delete intents
//! - [`wait`] - Polling until a resource appears or disappears
//!
//! # Example
//!
//! ```ignore
//! use anf_provision::netapp::{clients::ClientFactory, gateway::NetAppGateway};
//! use std::time::Duration;
//!
//! async fn example(factory: ClientFactory) -> anf_provision::error::Result<()> {
//!     let gateway = NetAppGateway::new(factory);
//!     let account = gateway.create_account("eastus", "my-rg", "my-account", None, None).await?;
//!     gateway.wait_for_resource(account.id(), Duration::from_secs(10), 60, false).await?;
//!     Ok(())
//! }
//! ```

pub mod clients;
pub mod gateway;
pub mod models;
pub mod wait;
