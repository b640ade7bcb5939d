//! Azure Authentication
//!
//! Acquires Azure Resource Manager access tokens for a service principal
//! through `azure_identity`, or uses a pre-acquired token from
//! `AZURE_ACCESS_TOKEN`. Either way tokens are cached until shortly before
//! they expire.

use crate::config::ServicePrincipal;
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{Secret, TokenCredential};
use azure_identity::ClientSecretCredential;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Environment variable holding a pre-acquired bearer token
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Lifetime assumed for a pre-acquired token
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// An access token and how long it stays valid
#[derive(Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_in: Duration,
}

/// Source of bearer tokens for a scope
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, scope: &str) -> Result<AccessToken>;
}

/// Authority the identity SDK targets when no cloud is configured
const PUBLIC_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Service principal secret exchanged for tokens by `azure_identity`
pub struct ServicePrincipalCredential {
    inner: Arc<dyn TokenCredential>,
}

impl ServicePrincipalCredential {
    pub fn new(principal: &ServicePrincipal) -> Result<Self> {
        let authority = principal.active_directory_endpoint_url.trim_end_matches('/');
        if !authority.eq_ignore_ascii_case(PUBLIC_AUTHORITY) {
            tracing::warn!(
                "Authority {} is not supported, tokens are requested from {}",
                authority,
                PUBLIC_AUTHORITY
            );
        }

        let inner: Arc<dyn TokenCredential> = ClientSecretCredential::new(
            &principal.tenant_id,
            principal.client_id.clone(),
            Secret::new(principal.client_secret.clone()),
            None,
        )
        .context("Failed to create ClientSecretCredential")?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipalCredential {
    async fn token(&self, scope: &str) -> Result<AccessToken> {
        tracing::debug!("Requesting token for {}", scope);
        let token = self
            .inner
            .get_token(&[scope], None)
            .await
            .context("Token request failed")?;

        Ok(AccessToken {
            secret: token.token.secret().to_string(),
            expires_in: remaining_lifetime(
                token.expires_on.unix_timestamp(),
                chrono::Utc::now().timestamp(),
            ),
        })
    }
}

/// Seconds left until `expires_on`, zero once it has passed
fn remaining_lifetime(expires_on: i64, now: i64) -> Duration {
    Duration::from_secs(u64::try_from(expires_on - now).unwrap_or(0))
}

/// A fixed token, e.g. from `az account get-access-token`
pub struct StaticToken(String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self, _scope: &str) -> Result<AccessToken> {
        Ok(AccessToken {
            secret: self.0.clone(),
            expires_in: DEFAULT_TOKEN_TTL,
        })
    }
}

/// Azure credentials holder with token caching
#[derive(Clone)]
pub struct AzureCredentials {
    provider: Arc<dyn TokenProvider>,
    scope: String,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl AzureCredentials {
    /// Build credentials for the given Resource Manager endpoint.
    /// `AZURE_ACCESS_TOKEN` takes precedence over the service principal secret.
    pub fn new(principal: &ServicePrincipal) -> Result<Self> {
        let scope = management_scope(&principal.resource_manager_endpoint_url);

        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                tracing::info!("Using access token from {}", ACCESS_TOKEN_ENV);
                return Ok(Self::with_provider(Arc::new(StaticToken(token)), scope));
            }
        }

        let provider = ServicePrincipalCredential::new(principal)
            .context("Failed to initialize Azure authentication")?;
        Ok(Self::with_provider(Arc::new(provider), scope))
    }

    pub fn with_provider(provider: Arc<dyn TokenProvider>, scope: String) -> Self {
        Self {
            provider,
            scope,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn from_static_token(token: &str) -> Self {
        Self::with_provider(
            Arc::new(StaticToken(token.to_string())),
            management_scope(super::client::DEFAULT_ENDPOINT),
        )
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self
            .provider
            .token(&self.scope)
            .await
            .context("Failed to get access token")?;

        let ttl = token.expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER);
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.secret.clone(),
                expires_at: Instant::now() + ttl,
            });
        }

        tracing::debug!("New token cached, expires in ~{} minutes", ttl.as_secs() / 60);

        Ok(token.secret)
    }
}

/// `.default` scope of a Resource Manager endpoint
pub fn management_scope(endpoint: &str) -> String {
    format!("{}/.default", endpoint.trim_end_matches('/'))
}
