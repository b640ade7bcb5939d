//! HTTP utilities for Azure Resource Manager REST calls

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const USER_AGENT: &str = concat!("anf-provision/", env!("CARGO_PKG_VERSION"));

/// Header carrying the status monitor URL of a long-running operation
pub const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Error returned by Resource Manager for a non-success status
#[derive(Debug, Error)]
#[error("API request failed: {status} {code}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ApiError {
    fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => Self {
                status,
                code: String::new(),
                message: String::new(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Successful Resource Manager response
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    /// `Azure-AsyncOperation` status monitor URL
    pub async_operation: Option<String>,
    /// `Location` header, used by 202 responses
    pub location: Option<String>,
    pub retry_after: Option<Duration>,
    /// Parsed JSON body, `Null` when empty
    pub body: Value,
}

impl ArmResponse {
    fn from_parts(status: u16, headers: &HeaderMap, body: Value) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            status,
            async_operation: header(ASYNC_OPERATION_HEADER),
            location: header(LOCATION.as_str()),
            retry_after: header(RETRY_AFTER.as_str())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            body,
        }
    }

    /// Whether the service is still working on the request
    pub fn is_accepted(&self) -> bool {
        self.status == 202
    }
}

/// HTTP client wrapper for Resource Manager calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send a request with an optional JSON body.
    /// Non-success statuses become an [`ApiError`].
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("{} {} [{}]", method, url, request_id);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(CLIENT_REQUEST_ID_HEADER, &request_id);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            return Err(ApiError::from_response(status.as_u16(), &text).into());
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).context("Failed to parse response JSON")?
        };

        Ok(ArmResponse::from_parts(status.as_u16(), &headers, body))
    }

    pub async fn get(&self, url: &str, token: &str) -> Result<ArmResponse> {
        self.send(Method::GET, url, token, None).await
    }

    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<ArmResponse> {
        self.send(Method::PUT, url, token, Some(body)).await
    }

    pub async fn patch(&self, url: &str, token: &str, body: &Value) -> Result<ArmResponse> {
        self.send(Method::PATCH, url, token, Some(body)).await
    }

    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<ArmResponse> {
        self.send(Method::POST, url, token, body).await
    }

    pub async fn delete(&self, url: &str, token: &str) -> Result<ArmResponse> {
        self.send(Method::DELETE, url, token, None).await
    }
}

/// Find the Resource Manager error in an error chain
pub fn api_error(error: &anyhow::Error) -> Option<&ApiError> {
    error.chain().find_map(|e| e.downcast_ref::<ApiError>())
}

/// Format an Azure API error for display
pub fn format_arm_error(error: &anyhow::Error) -> String {
    if let Some(api) = api_error(error) {
        let hint = match api.status {
            401 => "Authentication failed. Check the service principal in your auth file.",
            403 => "Permission denied. Check the role assignments of the service principal.",
            404 => "Resource not found.",
            409 => "Resource conflict. The resource may already exist or be in use.",
            429 => "Rate limit exceeded. Please try again later.",
            400 => "Invalid request. Check your parameters.",
            500..=599 => "Azure service temporarily unavailable. Please try again.",
            _ => "Request failed.",
        };
        if api.code.is_empty() {
            return hint.to_string();
        }
        return format!("{} ({})", hint, api.code);
    }

    // Truncate long error messages
    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| !c.is_control())
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_api_error_from_envelope() {
        let err = ApiError::from_response(
            404,
            r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#,
        );
        assert!(err.is_not_found());
        assert_eq!(err.code, "ResourceNotFound");
        assert_eq!(err.to_string(), "API request failed: 404 ResourceNotFound: gone");
    }

    #[test]
    fn test_api_error_without_envelope() {
        let err = ApiError::from_response(502, "<html>bad gateway</html>");
        assert_eq!(err.status, 502);
        assert!(err.code.is_empty());
    }

    #[test]
    fn test_format_arm_error_by_status() {
        let err: anyhow::Error = ApiError {
            status: 403,
            code: "AuthorizationFailed".to_string(),
            message: "no".to_string(),
        }
        .into();
        let err = err.context("cannot create account");
        assert_eq!(
            format_arm_error(&err),
            "Permission denied. Check the role assignments of the service principal. (AuthorizationFailed)"
        );
    }

    #[test]
    fn test_format_arm_error_fallback() {
        let err = anyhow::anyhow!("maximum of two protocol types are supported");
        assert_eq!(format_arm_error(&err), "maximum of two protocol types are supported");
    }
}
