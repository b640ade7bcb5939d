//! Long-running operations
//!
//! Resource Manager answers a mutation either with the final state or with a
//! pointer to follow until the work is done: an `Azure-AsyncOperation` status
//! monitor, a `Location` URL that keeps answering 202, or a non-terminal
//! `provisioningState` on the resource itself.

use super::client::ArmClient;
use super::http::ArmResponse;
use crate::abort::AbortSignal;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Polling stopped because the caller aborted
#[derive(Debug, Error)]
#[error("operation polling was aborted")]
pub struct OperationAborted;

/// Kind of request that started the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Put,
    Patch,
    Post,
    Delete,
}

/// Status reported by an operation monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
    Canceled,
}

impl OperationStatus {
    /// Parse an operation or provisioning status, case-insensitive.
    /// Anything that is not terminal counts as in progress.
    pub fn parse(status: &str, error_message: Option<&str>) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed(error_message.unwrap_or("no error details").to_string()),
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Monitor {
    AsyncOperation(String),
    Location(String),
    ProvisioningState,
    Done,
}

/// An accepted mutation that may still be running
#[derive(Debug, Clone)]
pub struct PendingOperation {
    verb: Verb,
    resource_url: String,
    monitor: Monitor,
    final_location: Option<String>,
    retry_after: Option<Duration>,
    initial: Value,
}

fn provisioning_state(body: &Value) -> Option<&str> {
    body.get("properties")
        .and_then(|p| p.get("provisioningState"))
        .and_then(|v| v.as_str())
}

fn error_message(body: &Value) -> Option<&str> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
}

impl PendingOperation {
    pub fn from_response(verb: Verb, resource_url: &str, response: ArmResponse) -> Self {
        let monitor = if let Some(url) = response.async_operation.clone() {
            Monitor::AsyncOperation(url)
        } else if response.is_accepted() && response.location.is_some() {
            Monitor::Location(response.location.clone().unwrap_or_default())
        } else if matches!(verb, Verb::Put | Verb::Patch)
            && provisioning_state(&response.body)
                .map(|s| !OperationStatus::parse(s, None).is_terminal())
                .unwrap_or(false)
        {
            Monitor::ProvisioningState
        } else {
            Monitor::Done
        };

        Self {
            verb,
            resource_url: resource_url.to_string(),
            monitor,
            final_location: response.location,
            retry_after: response.retry_after,
            initial: response.body,
        }
    }

    /// Whether the initial response already carried the final state
    pub fn is_done(&self) -> bool {
        self.monitor == Monitor::Done
    }

    fn delay(&self, client: &ArmClient) -> Duration {
        self.retry_after.unwrap_or(client.lro_interval)
    }

    async fn pause(&self, client: &ArmClient, abort: &AbortSignal) -> Result<()> {
        match abort.race(tokio::time::sleep(self.delay(client))).await {
            Some(()) => Ok(()),
            None => {
                tracing::warn!("Stopped polling {}", self.resource_url);
                Err(OperationAborted.into())
            }
        }
    }

    /// Poll until the operation reaches a terminal state and return the final body.
    /// Deletes return `Null`. Fails with [`OperationAborted`] once `abort` fires.
    pub async fn poll_until_done(mut self, client: &ArmClient, abort: &AbortSignal) -> Result<Value> {
        match self.monitor.clone() {
            Monitor::Done => Ok(self.initial),
            Monitor::AsyncOperation(url) => {
                loop {
                    self.pause(client, abort).await?;
                    let response = client.get_response(&url).await?;
                    let status = response
                        .body
                        .get("status")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    let status = OperationStatus::parse(status, error_message(&response.body));
                    tracing::debug!("Operation {} status: {:?}", url, status);

                    match status {
                        OperationStatus::Succeeded => break,
                        OperationStatus::Failed(message) => {
                            return Err(anyhow!("operation finished with status Failed: {}", message))
                        }
                        OperationStatus::Canceled => {
                            return Err(anyhow!("operation was canceled"))
                        }
                        OperationStatus::InProgress => {
                            self.retry_after = response.retry_after;
                        }
                    }
                }
                self.final_result(client).await
            }
            Monitor::Location(url) => {
                loop {
                    self.pause(client, abort).await?;
                    let response = client.get_response(&url).await?;
                    if !response.is_accepted() {
                        tracing::debug!("Operation {} completed with {}", url, response.status);
                        if self.verb == Verb::Post {
                            return Ok(response.body);
                        }
                        break;
                    }
                    self.retry_after = response.retry_after;
                }
                self.final_result(client).await
            }
            Monitor::ProvisioningState => loop {
                self.pause(client, abort).await?;
                let body = client.get(&self.resource_url).await?;
                let state = provisioning_state(&body).unwrap_or_default();
                tracing::debug!("Resource {} provisioning state: {}", self.resource_url, state);

                match OperationStatus::parse(state, None) {
                    OperationStatus::Succeeded => return Ok(body),
                    OperationStatus::Failed(_) => {
                        return Err(anyhow!("resource provisioning finished with state Failed"))
                    }
                    OperationStatus::Canceled => {
                        return Err(anyhow!("resource provisioning was canceled"))
                    }
                    OperationStatus::InProgress => {}
                }
            },
        }
    }

    async fn final_result(&self, client: &ArmClient) -> Result<Value> {
        match self.verb {
            Verb::Put | Verb::Patch => client.get(&self.resource_url).await,
            Verb::Post => match &self.final_location {
                Some(location) => client.get(location).await,
                None => Ok(Value::Null),
            },
            Verb::Delete => Ok(Value::Null),
        }
    }
}

impl ArmClient {
    pub async fn begin_put(&self, url: &str, body: &Value) -> Result<PendingOperation> {
        let response = self.put(url, body).await?;
        Ok(PendingOperation::from_response(Verb::Put, url, response))
    }

    pub async fn begin_patch(&self, url: &str, body: &Value) -> Result<PendingOperation> {
        let response = self.patch(url, body).await?;
        Ok(PendingOperation::from_response(Verb::Patch, url, response))
    }

    pub async fn begin_post(&self, url: &str, body: Option<&Value>) -> Result<PendingOperation> {
        let response = self.post(url, body).await?;
        Ok(PendingOperation::from_response(Verb::Post, url, response))
    }

    pub async fn begin_delete(&self, url: &str) -> Result<PendingOperation> {
        let response = self.delete(url).await?;
        Ok(PendingOperation::from_response(Verb::Delete, url, response))
    }
}
