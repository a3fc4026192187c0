//! # Admission Core
//!
//! Dynamic admission control for mutating API operations.
//!
//! Before a create or update is persisted, the caller hands the proposed change
//! to this crate as a [`Request`]. The request is first run through every
//! matching mutating webhook, in declaration order, each one seeing the object
//! as patched by its predecessors. The final request is then checked by every
//! matching validating webhook concurrently; any explicit denial aborts the
//! operation.
//!
//! ## Architecture
//!
//! - [`rules`] decides whether a webhook applies to a request
//! - [`registry`] is built once from [`AdmissionConfig`] and answers which
//!   webhooks match, in order
//! - [`transport`] speaks the JSON wire protocol to webhook servers
//! - [`mutating`] and [`validating`] implement the two dispatch disciplines
//! - [`controller`] bundles the above into the handle callers keep around
//!
//! ## Usage
//!
//! ```no_run
//! use admission_core::{AdmissionConfig, AdmissionController, DispatchContext, Operation, Request};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AdmissionConfig::load_from_file(Path::new("admission.yaml"))?;
//! let controller = AdmissionController::from_config(&config)?;
//!
//! let request = Request::new(Operation::Update, "clusters", "v2")
//!     .with_name("cluster-1")
//!     .with_object(serde_json::json!({ "description": "primary" }));
//!
//! let admitted = controller.admit(&DispatchContext::background(), request).await?;
//! println!("{}", serde_json::to_string_pretty(&admitted)?);
//! # Ok(())
//! # }
//! ```

/// Admission configuration loading and declarations
pub mod config;

/// Deadline and cancellation propagation for dispatch
pub mod context;

/// Controller facade bundling registry and transport
pub mod controller;

/// Error taxonomy for configuration, transport and denial failures
pub mod error;

/// Sequential mutating webhook chain
pub mod mutating;

/// Patch representation and application
pub mod patch;

/// Registry of configured webhooks
pub mod registry;

/// Request model shared by all components
pub mod request;

/// Rule matching
pub mod rules;

/// Wire protocol and HTTP transport
pub mod transport;

/// Concurrent validating webhook fan-out
pub mod validating;

mod dispatch;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use config::{AdmissionConfig, ClientConfigDeclaration, RuleDeclaration, WebhookDeclaration};
pub use context::{CancellationHandle, CancellationSignal, DispatchContext};
pub use controller::AdmissionController;
pub use error::{
    AdmissionError, ConfigError, DeniedError, ErrorKind, RequestIdentity, TransportError,
    WebhookCallError, WebhookIdentity,
};
pub use mutating::MutatingDispatcher;
pub use patch::{Patch, PatchError, PatchType};
pub use registry::{ClientConfig, FailurePolicy, Webhook, WebhookKind, WebhookRegistry};
pub use request::{Operation, Request};
pub use rules::{Matcher, Rule};
pub use transport::{HttpTransport, HttpTransportConfig, WebhookOutcome, WebhookTransport};
pub use validating::ValidatingDispatcher;

/// Standard result type for admission operations
pub type AdmissionResult<T> = Result<T, AdmissionError>;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
