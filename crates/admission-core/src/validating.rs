//! # Validating Dispatch
//!
//! Fans a request out to every matching validating webhook at once and joins
//! all of them before deciding.
//!
//! Any explicit denial rejects the request. A failed call rejects it only
//! under `Fail`; under `Ignore` it counts as an allow. When more than one
//! webhook blocks, the earliest-declared one is reported so the result does
//! not depend on which call finished first.

use crate::context::DispatchContext;
use crate::dispatch;
use crate::error::{AdmissionError, TransportError};
use crate::registry::WebhookRegistry;
use crate::request::Request;
use crate::transport::{WebhookOutcome, WebhookTransport};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn, Instrument};

/// Concurrent validating webhook fan-out
#[derive(Clone)]
pub struct ValidatingDispatcher {
    registry: Arc<WebhookRegistry>,
    transport: Arc<dyn WebhookTransport>,
}

impl ValidatingDispatcher {
    /// Create a dispatcher over the registry's validating webhooks
    pub fn new(registry: Arc<WebhookRegistry>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Check the request against every matching validating webhook
    ///
    /// Dropping the returned future aborts calls still in flight.
    ///
    /// # Errors
    /// - `AdmissionError::Denied` - a webhook explicitly rejected the request
    /// - `AdmissionError::Transport` - a `Fail` webhook could not be called
    #[instrument(skip(self, ctx, request), fields(
        operation = %request.operation,
        resource = %request.effective_path(),
        name = %request.name,
    ))]
    pub async fn validate(
        &self,
        ctx: &DispatchContext,
        request: &Request,
    ) -> Result<(), AdmissionError> {
        let webhooks = self.registry.matching_validating(request);
        if webhooks.is_empty() {
            debug!("No validating webhooks match request");
            return Ok(());
        }

        let shared = Arc::new(request.clone());
        let mut tasks = JoinSet::new();
        for (index, webhook) in webhooks.iter().enumerate() {
            let transport = Arc::clone(&self.transport);
            let ctx = ctx.clone();
            let webhook = Arc::clone(webhook);
            let request = Arc::clone(&shared);

            tasks.spawn(
                async move {
                    let result =
                        dispatch::invoke(transport.as_ref(), &ctx, &webhook, &request).await;
                    (index, result)
                }
                .in_current_span(),
            );
        }

        let mut results: Vec<Option<Result<WebhookOutcome, TransportError>>> =
            (0..webhooks.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "Validating webhook task terminated abnormally"),
            }
        }

        let mut blocking: Option<AdmissionError> = None;
        for (webhook, result) in webhooks.iter().zip(results) {
            let result = result.unwrap_or_else(|| {
                Err(TransportError::TaskFailed {
                    message: "task panicked or was cancelled".to_string(),
                })
            });

            let verdict: Result<(), AdmissionError> = match result {
                Ok(outcome) if outcome.allowed => {
                    debug!(webhook = %webhook.name(), "Validating webhook allowed request");
                    Ok(())
                }
                Ok(outcome) => Err(dispatch::denial(webhook, request, outcome.reason).into()),
                Err(error) => dispatch::resolve_failure(webhook, request, error).map_err(Into::into),
            };

            if let Err(error) = verdict {
                match blocking {
                    None => blocking = Some(error),
                    Some(_) => debug!(
                        webhook = %webhook.name(),
                        error = %error,
                        "Request also blocked by later validating webhook"
                    ),
                }
            }
        }

        match blocking {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "validating_tests.rs"]
mod tests;
