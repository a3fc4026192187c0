//! Budgeted invocation shared by both dispatchers.

use crate::context::DispatchContext;
use crate::error::{DeniedError, RequestIdentity, TransportError, WebhookCallError, WebhookIdentity};
use crate::registry::{FailurePolicy, Webhook};
use crate::request::Request;
use crate::transport::{WebhookOutcome, WebhookTransport};
use tracing::{info, warn};

/// Call one webhook, bounded by its budget and the context's cancellation
///
/// Transport implementations are not trusted to honour the budget: the call
/// is abandoned here once it runs out or the context is cancelled.
pub(crate) async fn invoke(
    transport: &dyn WebhookTransport,
    ctx: &DispatchContext,
    webhook: &Webhook,
    request: &Request,
) -> Result<WebhookOutcome, TransportError> {
    if ctx.is_cancelled() {
        return Err(TransportError::Cancelled);
    }

    let budget = ctx
        .call_budget(webhook.timeout())
        .ok_or(TransportError::DeadlineExceeded)?;

    tokio::select! {
        result = tokio::time::timeout(budget, transport.call(ctx, webhook, request)) => {
            result.unwrap_or(Err(TransportError::Timeout { after: budget }))
        }
        _ = ctx.cancelled() => Err(TransportError::Cancelled),
    }
}

/// Resolve a failed call against the webhook's failure policy
///
/// `Ignore` logs and lets dispatch continue as if the webhook were absent.
pub(crate) fn resolve_failure(
    webhook: &Webhook,
    request: &Request,
    error: TransportError,
) -> Result<(), WebhookCallError> {
    match webhook.failure_policy() {
        FailurePolicy::Ignore => {
            warn!(
                webhook = %webhook.name(),
                url = %webhook.client().url(),
                kind = %webhook.kind(),
                error = %error,
                "Ignoring failed admission webhook call"
            );
            Ok(())
        }
        FailurePolicy::Fail => {
            warn!(
                webhook = %webhook.name(),
                url = %webhook.client().url(),
                kind = %webhook.kind(),
                error = %error,
                "Admission webhook call failed"
            );
            Err(WebhookCallError {
                webhook: WebhookIdentity::of(webhook),
                request: RequestIdentity::of(request),
                source: error,
            })
        }
    }
}

/// Build the error for an explicit rejection
pub(crate) fn denial(webhook: &Webhook, request: &Request, reason: Option<String>) -> DeniedError {
    info!(
        webhook = %webhook.name(),
        kind = %webhook.kind(),
        reason = reason.as_deref().unwrap_or(""),
        "Admission webhook denied request"
    );

    DeniedError {
        webhook: WebhookIdentity::of(webhook),
        request: RequestIdentity::of(request),
        reason,
    }
}
