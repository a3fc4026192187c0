//! Shared fixtures for unit tests.

use crate::context::DispatchContext;
use crate::error::TransportError;
use crate::registry::{ClientConfig, FailurePolicy, Webhook, WebhookKind};
use crate::request::{Operation, Request};
use crate::rules::{Matcher, Rule};
use crate::transport::{WebhookOutcome, WebhookTransport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Rule selecting every operation and version of the given resources
pub fn rule_for(resources: &[&str]) -> Rule {
    Rule::new(
        Matcher::of(resources.iter().map(|r| r.to_string())),
        Matcher::Any,
        Matcher::Any,
    )
}

/// Webhook on `clusters` with a five second timeout
pub fn webhook(name: &str, kind: WebhookKind, policy: FailurePolicy) -> Webhook {
    webhook_at(name, kind, policy, &format!("http://127.0.0.1:1/{}", name))
}

/// Webhook on `clusters` pointing at `url`
pub fn webhook_at(name: &str, kind: WebhookKind, policy: FailurePolicy, url: &str) -> Webhook {
    Webhook::new(
        name,
        kind,
        policy,
        Duration::from_secs(5),
        vec![rule_for(&["clusters"])],
        ClientConfig::new(Url::parse(url).expect("test URL should parse")),
    )
}

/// Update request on `clusters`
pub fn cluster_request(object: serde_json::Value) -> Request {
    Request::new(Operation::Update, "clusters", "v2")
        .with_name("cluster-1")
        .with_object(object)
}

type Handler = Arc<dyn Fn(&Request) -> Result<WebhookOutcome, TransportError> + Send + Sync>;

struct Script {
    handler: Handler,
    delay: Option<Duration>,
}

/// In-memory transport answering per webhook name and recording what it saw
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, Request)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls to `name` with `handler`
    pub fn on<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> Result<WebhookOutcome, TransportError> + Send + Sync + 'static,
    {
        self.scripts.insert(
            name.to_string(),
            Script {
                handler: Arc::new(handler),
                delay: None,
            },
        );
        self
    }

    /// Answer calls to `name` with `handler` after sleeping for `delay`
    pub fn on_delayed<F>(mut self, name: &str, delay: Duration, handler: F) -> Self
    where
        F: Fn(&Request) -> Result<WebhookOutcome, TransportError> + Send + Sync + 'static,
    {
        self.scripts.insert(
            name.to_string(),
            Script {
                handler: Arc::new(handler),
                delay: Some(delay),
            },
        );
        self
    }

    /// Webhook names in the order they were called
    pub fn called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Requests observed by `name`
    pub fn requests_seen_by(&self, name: &str) -> Vec<Request> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| called == name)
            .map(|(_, request)| request.clone())
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn call(
        &self,
        _ctx: &DispatchContext,
        webhook: &Webhook,
        request: &Request,
    ) -> Result<WebhookOutcome, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((webhook.name().to_string(), request.clone()));

        let script = self
            .scripts
            .get(webhook.name())
            .unwrap_or_else(|| panic!("no script for webhook {}", webhook.name()));

        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }

        (script.handler)(request)
    }
}
