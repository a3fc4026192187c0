//! # Admission Controller
//!
//! Long-lived handle bundling the registry and transport.
//!
//! The controller is built once at startup and shared (it is cheap to clone)
//! by every request handler that needs to admit changes.

use crate::config::AdmissionConfig;
use crate::context::DispatchContext;
use crate::error::{AdmissionError, ConfigError};
use crate::mutating::MutatingDispatcher;
use crate::registry::WebhookRegistry;
use crate::request::Request;
use crate::transport::{HttpTransport, HttpTransportConfig, WebhookTransport};
use crate::validating::ValidatingDispatcher;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Entry point for admitting requests
#[derive(Clone)]
pub struct AdmissionController {
    registry: Arc<WebhookRegistry>,
    mutating: MutatingDispatcher,
    validating: ValidatingDispatcher,
}

impl AdmissionController {
    /// Build the registry and an HTTP transport from configuration
    ///
    /// # Errors
    /// - `AdmissionError::Config` - configuration is invalid or the HTTP
    ///   client could not be created
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, AdmissionError> {
        Self::from_config_with(config, HttpTransportConfig::default())
    }

    /// Same as [`from_config`](Self::from_config) with explicit HTTP settings
    pub fn from_config_with(
        config: &AdmissionConfig,
        transport_config: HttpTransportConfig,
    ) -> Result<Self, AdmissionError> {
        let registry = WebhookRegistry::from_config(config)?;
        let transport = HttpTransport::new(transport_config).map_err(ConfigError::HttpClient)?;

        Ok(Self::new(Arc::new(registry), Arc::new(transport)))
    }

    /// Create a controller from parts
    pub fn new(registry: Arc<WebhookRegistry>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            mutating: MutatingDispatcher::new(Arc::clone(&registry), Arc::clone(&transport)),
            validating: ValidatingDispatcher::new(Arc::clone(&registry), transport),
            registry,
        }
    }

    /// Registry the controller dispatches to
    pub fn registry(&self) -> &WebhookRegistry {
        &self.registry
    }

    /// Run only the mutating chain
    pub async fn mutate(
        &self,
        ctx: &DispatchContext,
        request: Request,
    ) -> Result<Request, AdmissionError> {
        self.mutating.mutate(ctx, request).await
    }

    /// Run only the validating fan-out
    pub async fn validate(
        &self,
        ctx: &DispatchContext,
        request: &Request,
    ) -> Result<(), AdmissionError> {
        self.validating.validate(ctx, request).await
    }

    /// Mutate, then validate the mutated request
    ///
    /// Returns the request as it should be persisted.
    #[instrument(skip(self, ctx, request), fields(
        admission_id = %Uuid::new_v4(),
        operation = %request.operation,
        resource = %request.effective_path(),
        name = %request.name,
    ))]
    pub async fn admit(
        &self,
        ctx: &DispatchContext,
        request: Request,
    ) -> Result<Request, AdmissionError> {
        let mutated = self.mutating.mutate(ctx, request).await?;
        self.validating.validate(ctx, &mutated).await?;

        info!("Request admitted");
        Ok(mutated)
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
