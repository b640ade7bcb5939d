//! Provisioning and teardown of Azure NetApp Files resources through the
//! Azure Resource Manager REST API.

pub mod abort;
pub mod azure;
pub mod config;
pub mod demo;
pub mod error;
pub mod netapp;
pub mod uri;
