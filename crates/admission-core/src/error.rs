//! Error types for admission operations.
//!
//! The taxonomy is closed: configuration problems surface at startup, while a
//! dispatch can only fail because a webhook could not be called properly
//! ([`WebhookCallError`]) or because a webhook said no ([`DeniedError`]).
//! Callers pick client-visible status codes by matching on [`ErrorKind`].

use crate::registry::{Webhook, WebhookKind};
use crate::request::{Operation, Request};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Identities
// ============================================================================

/// Which webhook an error came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookIdentity {
    pub name: String,
    pub url: String,
    pub kind: WebhookKind,
}

impl WebhookIdentity {
    /// Capture the identity of a configured webhook
    pub fn of(webhook: &Webhook) -> Self {
        Self {
            name: webhook.name().to_string(),
            url: webhook.client().url().to_string(),
            kind: webhook.kind(),
        }
    }
}

impl fmt::Display for WebhookIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} webhook \"{}\" ({})", self.kind, self.name, self.url)
    }
}

/// Which request an error refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub operation: Operation,
    pub resource: String,
    pub name: String,
    pub version: String,
}

impl RequestIdentity {
    /// Capture the identity of a request
    pub fn of(request: &Request) -> Self {
        Self {
            operation: request.operation,
            resource: request.effective_path(),
            name: request.name.clone(),
            version: request.version.clone(),
        }
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} ({})",
            self.operation, self.resource, self.name, self.version
        )
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors raised while loading or validating admission configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Configuration source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Configuration validation failed: {}", .errors.join("; "))]
    ValidationError { errors: Vec<String> },

    /// HTTP client settings were rejected when building the transport
    #[error("HTTP client could not be built: {0}")]
    HttpClient(#[source] TransportError),
}

impl ConfigError {
    /// Individual validation problems, empty for load failures
    pub fn validation_errors(&self) -> &[String] {
        match self {
            Self::ValidationError { errors } => errors,
            _ => &[],
        }
    }
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Reasons a webhook call produced no usable decision
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Endpoint could not be reached
    #[error("connection failed: {message}")]
    Connect { message: String },

    /// Call exceeded its budget
    #[error("timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// Ambient deadline had already passed before the call started
    #[error("dispatch deadline exceeded before the call was made")]
    DeadlineExceeded,

    /// Dispatch was cancelled while the call was outstanding
    #[error("dispatch cancelled")]
    Cancelled,

    /// Webhook server answered with a non-success status
    #[error("webhook responded with HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Response body was not a valid admission response
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// Returned patch could not be applied to the object
    #[error("patch could not be applied: {message}")]
    InvalidPatch { message: String },

    /// Request could not be built or sent
    #[error("request failed: {message}")]
    Request { message: String },

    /// Task running the call terminated abnormally
    #[error("webhook task failed: {message}")]
    TaskFailed { message: String },
}

impl TransportError {
    /// Check if the failure was caused by the time budget running out
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::DeadlineExceeded)
    }
}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// A webhook call failed and its failure policy turned that into an abort
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed calling {webhook} for {request}: {source}")]
pub struct WebhookCallError {
    pub webhook: WebhookIdentity,
    pub request: RequestIdentity,
    #[source]
    pub source: TransportError,
}

/// A webhook explicitly rejected the request
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{webhook} denied {request}: {}", .reason.as_deref().unwrap_or("no reason given"))]
pub struct DeniedError {
    pub webhook: WebhookIdentity,
    pub request: RequestIdentity,
    pub reason: Option<String>,
}

/// Discriminant of [`AdmissionError`] for callers mapping errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Transport,
    Denied,
}

/// Top-level error type for admission operations
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] WebhookCallError),

    #[error(transparent)]
    Denied(#[from] DeniedError),
}

impl AdmissionError {
    /// Get error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Denied(_) => ErrorKind::Denied,
        }
    }

    /// Webhook responsible for the failure, if any
    pub fn webhook(&self) -> Option<&WebhookIdentity> {
        match self {
            Self::Config(_) => None,
            Self::Transport(e) => Some(&e.webhook),
            Self::Denied(e) => Some(&e.webhook),
        }
    }

    /// Request the failure refers to, if any
    pub fn request(&self) -> Option<&RequestIdentity> {
        match self {
            Self::Config(_) => None,
            Self::Transport(e) => Some(&e.request),
            Self::Denied(e) => Some(&e.request),
        }
    }

    /// Check if the request was rejected on its merits rather than by a malfunction
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Denied(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
