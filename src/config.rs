//! Configuration Management
//!
//! Loads the service principal file that supplies the Azure credential and
//! subscription. The layout is the one written by
//! `az ad sp create-for-rbac --sdk-auth`.

use crate::error::ValidationError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable pointing at the auth file
pub const AUTH_LOCATION_ENV: &str = "AZURE_AUTH_LOCATION";

fn default_authority() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_resource_manager() -> String {
    crate::azure::client::DEFAULT_ENDPOINT.to_string()
}

/// Service principal and subscription
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default = "default_authority")]
    pub active_directory_endpoint_url: String,
    #[serde(default = "default_resource_manager")]
    pub resource_manager_endpoint_url: String,
}

impl fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("active_directory_endpoint_url", &self.active_directory_endpoint_url)
            .field("resource_manager_endpoint_url", &self.resource_manager_endpoint_url)
            .finish()
    }
}

impl ServicePrincipal {
    /// Get the auth file path (CLI > AZURE_AUTH_LOCATION > ~/.azure/azureauth.json)
    pub fn resolve_path(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_path {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(AUTH_LOCATION_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::home_dir().map(|p| p.join(".azure").join("azureauth.json"))
    }

    /// Load and validate the auth file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read auth file {}", path.display()))?;
        let principal: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse auth file {}", path.display()))?;

        principal.validate()?;
        Ok(principal)
    }

    /// The subscription is always required; the secret fields only when no
    /// pre-acquired token is available
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subscription_id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "subscriptionId",
            });
        }

        let has_token = std::env::var(crate::azure::auth::ACCESS_TOKEN_ENV)
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        if has_token {
            return Ok(());
        }

        let required = [
            ("tenantId", &self.tenant_id),
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ValidationError::MissingField { field: *field }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sdk_auth_layout() {
        let json = r#"{
            "clientId": "c",
            "clientSecret": "s",
            "subscriptionId": "sub",
            "tenantId": "t",
            "activeDirectoryEndpointUrl": "https://login.microsoftonline.com",
            "resourceManagerEndpointUrl": "https://management.azure.com/",
            "galleryEndpointUrl": "https://gallery.azure.com/"
        }"#;
        let principal: ServicePrincipal = serde_json::from_str(json).unwrap();
        assert_eq!(principal.subscription_id, "sub");
        assert_eq!(principal.resource_manager_endpoint_url, "https://management.azure.com/");
        assert!(principal.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let principal = ServicePrincipal {
            client_id: "client".to_string(),
            client_secret: "hunter2".to_string(),
            subscription_id: "sub".to_string(),
            ..Default::default()
        };
        let printed = format!("{:?}", principal);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("[REDACTED]"));
        assert!(printed.contains("client"));
    }

    #[test]
    fn test_defaults_for_endpoints() {
        let principal: ServicePrincipal = serde_json::from_str(r#"{"subscriptionId": "sub"}"#).unwrap();
        assert_eq!(principal.active_directory_endpoint_url, "https://login.microsoftonline.com");
        assert_eq!(principal.resource_manager_endpoint_url, "https://management.azure.com");
    }

    #[test]
    fn test_missing_subscription() {
        let principal = ServicePrincipal::default();
        assert_eq!(
            principal.validate(),
            Err(ValidationError::MissingField {
                field: "subscriptionId"
            })
        );
    }

    #[test]
    fn test_cli_path_wins() {
        let path = ServicePrincipal::resolve_path(Some(Path::new("/tmp/auth.json")));
        assert_eq!(path, Some(PathBuf::from("/tmp/auth.json")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServicePrincipal::load(Path::new("/nonexistent/azureauth.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read auth file"));
    }
}
