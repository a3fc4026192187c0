//! # Webhook Transport
//!
//! Wire protocol between the dispatchers and webhook servers.
//!
//! A call POSTs the [`Request`] as JSON and expects a JSON body of the form
//! `{allowed?, patch?, patchType?, reason?}`. Every outcome is one of:
//!
//! - a decisive answer, returned as [`WebhookOutcome`]
//! - a transport failure, returned as [`TransportError`] and later resolved
//!   against the webhook's failure policy
//!
//! Calls are never retried.

use crate::context::DispatchContext;
use crate::error::TransportError;
use crate::patch::{Patch, PatchType};
use crate::registry::{Webhook, WebhookKind};
use crate::request::Request;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Longest prefix of a non-success response body kept in errors
pub const MAX_ERROR_BODY_BYTES: usize = 512;

// ============================================================================
// Outcome
// ============================================================================

/// Decisive answer from one webhook
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOutcome {
    pub allowed: bool,
    pub patch: Option<Patch>,
    pub reason: Option<String>,
}

impl WebhookOutcome {
    /// Outcome admitting the request unchanged
    pub fn allow() -> Self {
        Self {
            allowed: true,
            patch: None,
            reason: None,
        }
    }

    /// Outcome rejecting the request
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            patch: None,
            reason: Some(reason.into()),
        }
    }

    /// Attach a patch
    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self
    }
}

/// Response body as sent by webhook servers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WireResponse {
    /// Interpret the response for a webhook of the given kind
    ///
    /// Validating webhooks must state `allowed`; mutating webhooks that omit
    /// it are taken to allow. Patches are only decoded for mutating webhooks.
    pub fn into_outcome(self, kind: WebhookKind) -> Result<WebhookOutcome, TransportError> {
        let allowed = match (self.allowed, kind) {
            (Some(allowed), _) => allowed,
            (None, WebhookKind::Mutating) => true,
            (None, WebhookKind::Validating) => {
                return Err(TransportError::MalformedResponse {
                    message: "validating response is missing 'allowed'".to_string(),
                })
            }
        };

        let patch = match (self.patch, kind) {
            (Some(value), WebhookKind::Mutating) if allowed => Some(
                Patch::from_wire(value, self.patch_type).map_err(|e| {
                    TransportError::InvalidPatch {
                        message: e.to_string(),
                    }
                })?,
            ),
            _ => None,
        };

        Ok(WebhookOutcome {
            allowed,
            patch,
            reason: self.reason,
        })
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Seam between the dispatchers and the network
///
/// Implementations should honour [`DispatchContext::call_budget`], but the
/// dispatchers enforce the budget themselves as well.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Perform one call, without retries
    async fn call(
        &self,
        ctx: &DispatchContext,
        webhook: &Webhook,
        request: &Request,
    ) -> Result<WebhookOutcome, TransportError>;
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Settings for the shared HTTP client
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// User agent sent with every call
    pub user_agent: String,

    /// Upper bound on establishing a connection
    pub connect_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("admission-core/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl HttpTransportConfig {
    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// JSON-over-HTTP transport backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a transport with the given settings
    ///
    /// # Errors
    /// - `TransportError::Request` - HTTP client could not be constructed
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::Request {
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Transport settings
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn map_send_error(error: reqwest::Error, budget: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout { after: budget }
        } else if error.is_connect() {
            TransportError::Connect {
                message: error.to_string(),
            }
        } else {
            TransportError::Request {
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn call(
        &self,
        ctx: &DispatchContext,
        webhook: &Webhook,
        request: &Request,
    ) -> Result<WebhookOutcome, TransportError> {
        let budget = ctx
            .call_budget(webhook.timeout())
            .ok_or(TransportError::DeadlineExceeded)?;

        let mut builder = self
            .http_client
            .post(webhook.client().url().clone())
            .timeout(budget)
            .json(request);
        for (name, value) in webhook.client().headers() {
            builder = builder.header(name, value);
        }

        debug!(
            webhook = %webhook.name(),
            url = %webhook.client().url(),
            budget_ms = budget.as_millis() as u64,
            "Calling admission webhook"
        );

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, budget))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(e, budget))?;
        let wire: WireResponse =
            serde_json::from_slice(&body).map_err(|e| TransportError::MalformedResponse {
                message: e.to_string(),
            })?;

        wire.into_outcome(webhook.kind())
    }
}

/// Cut `body` to at most [`MAX_ERROR_BODY_BYTES`] on a character boundary
fn truncate_body(mut body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_BYTES {
        return body;
    }

    let mut end = MAX_ERROR_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body.push_str("...");
    body
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
