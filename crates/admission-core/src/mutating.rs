//! # Mutating Dispatch
//!
//! Runs a request through every matching mutating webhook, strictly one after
//! another in declaration order. Each webhook sees the object as rewritten by
//! the webhooks before it.
//!
//! A call that fails is resolved against the webhook's failure policy; a patch
//! that cannot be applied counts as such a failure. An explicit
//! `allowed: false` ends the chain with a denial whatever the policy.

use crate::context::DispatchContext;
use crate::dispatch;
use crate::error::{AdmissionError, TransportError};
use crate::registry::WebhookRegistry;
use crate::request::Request;
use crate::transport::WebhookTransport;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Sequential mutating webhook chain
#[derive(Clone)]
pub struct MutatingDispatcher {
    registry: Arc<WebhookRegistry>,
    transport: Arc<dyn WebhookTransport>,
}

impl MutatingDispatcher {
    /// Create a dispatcher over the registry's mutating webhooks
    pub fn new(registry: Arc<WebhookRegistry>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Run the mutating chain and return the possibly rewritten request
    ///
    /// # Errors
    /// - `AdmissionError::Denied` - a webhook explicitly rejected the request
    /// - `AdmissionError::Transport` - a `Fail` webhook could not be called or
    ///   returned an unusable patch
    #[instrument(skip(self, ctx, request), fields(
        operation = %request.operation,
        resource = %request.effective_path(),
        name = %request.name,
    ))]
    pub async fn mutate(
        &self,
        ctx: &DispatchContext,
        mut request: Request,
    ) -> Result<Request, AdmissionError> {
        let webhooks = self.registry.matching_mutating(&request);
        if webhooks.is_empty() {
            debug!("No mutating webhooks match request");
            return Ok(request);
        }

        for webhook in webhooks {
            let outcome =
                match dispatch::invoke(self.transport.as_ref(), ctx, &webhook, &request).await {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        dispatch::resolve_failure(&webhook, &request, error)?;
                        continue;
                    }
                };

            if !outcome.allowed {
                return Err(dispatch::denial(&webhook, &request, outcome.reason).into());
            }

            let Some(patch) = outcome.patch else {
                debug!(webhook = %webhook.name(), "Mutating webhook returned no patch");
                continue;
            };

            match patch.apply(&request.object) {
                Ok(patched) => {
                    debug!(
                        webhook = %webhook.name(),
                        patch_type = %patch.patch_type(),
                        "Applied mutating webhook patch"
                    );
                    request.object = patched;
                }
                Err(e) => {
                    let error = TransportError::InvalidPatch {
                        message: e.to_string(),
                    };
                    dispatch::resolve_failure(&webhook, &request, error)?;
                }
            }
        }

        Ok(request)
    }
}

#[cfg(test)]
#[path = "mutating_tests.rs"]
mod tests;
