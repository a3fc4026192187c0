//! Common test utilities for admission integration tests
//!
//! This module provides:
//! - A dummy webhook server speaking the admission wire protocol over HTTP
//! - Helpers for building configurations that point at it

use admission_core::transport::WireResponse;
use admission_core::{AdmissionConfig, PatchType, Request};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

/// How long the `/slow` endpoint waits before answering
#[allow(dead_code)]
pub const SLOW_RESPONSE_DELAY: Duration = Duration::from_secs(3);

// ============================================================================
// Dummy Webhook Server
// ============================================================================

type CallLog = Arc<Mutex<Vec<(String, Request)>>>;

/// In-process webhook server
///
/// Endpoints:
/// - `/validate` denies cluster names containing `invalid` and descriptions
///   with surrounding whitespace
/// - `/mutate` trims the description with a JSON Patch
/// - `/stamp` records the description it observed with a merge patch
/// - `/deny` always denies
/// - `/slow` allows after [`SLOW_RESPONSE_DELAY`]
/// - `/error` answers HTTP 500
pub struct DummyWebhookServer {
    address: SocketAddr,
    calls: CallLog,
    shutdown: Option<oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl DummyWebhookServer {
    pub async fn start() -> Self {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/validate", post(validate))
            .route("/mutate", post(mutate))
            .route("/stamp", post(stamp))
            .route("/deny", post(deny))
            .route("/slow", post(slow))
            .route("/error", post(error))
            .with_state(calls.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind dummy webhook server");
        let address = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Dummy webhook server failed");
        });

        Self {
            address,
            calls,
            shutdown: Some(shutdown),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    pub fn validating_url(&self) -> String {
        self.url("/validate")
    }

    pub fn mutating_url(&self) -> String {
        self.url("/mutate")
    }

    /// Endpoint paths in the order they were called
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Requests received on `path`
    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| called == path)
            .map(|(_, request)| request.clone())
            .collect()
    }
}

impl Drop for DummyWebhookServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn record(calls: &CallLog, path: &str, request: &Request) {
    calls
        .lock()
        .unwrap()
        .push((path.to_string(), request.clone()));
}

fn description(request: &Request) -> Option<&str> {
    request.object.get("description").and_then(Value::as_str)
}

fn allowed() -> WireResponse {
    WireResponse {
        allowed: Some(true),
        ..WireResponse::default()
    }
}

fn denied(reason: &str) -> WireResponse {
    WireResponse {
        allowed: Some(false),
        reason: Some(reason.to_string()),
        ..WireResponse::default()
    }
}

async fn validate(State(calls): State<CallLog>, Json(request): Json<Request>) -> Json<WireResponse> {
    record(&calls, "/validate", &request);

    let name = request
        .object
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&request.name);
    if name.contains("invalid") {
        return Json(denied(&format!("cluster name '{}' is not allowed", name)));
    }

    if let Some(description) = description(&request) {
        if description != description.trim() {
            return Json(denied("description must not have surrounding whitespace"));
        }
    }

    Json(allowed())
}

async fn mutate(State(calls): State<CallLog>, Json(request): Json<Request>) -> Json<WireResponse> {
    record(&calls, "/mutate", &request);

    match description(&request) {
        Some(description) if description != description.trim() => Json(WireResponse {
            allowed: Some(true),
            patch: Some(json!([
                { "op": "replace", "path": "/description", "value": description.trim() }
            ])),
            patch_type: Some(PatchType::JsonPatch),
            reason: None,
        }),
        _ => Json(WireResponse::default()),
    }
}

async fn stamp(State(calls): State<CallLog>, Json(request): Json<Request>) -> Json<WireResponse> {
    record(&calls, "/stamp", &request);

    Json(WireResponse {
        patch: Some(json!({ "observedDescription": description(&request) })),
        ..WireResponse::default()
    })
}

async fn deny(State(calls): State<CallLog>, Json(request): Json<Request>) -> Json<WireResponse> {
    record(&calls, "/deny", &request);
    Json(denied("denied by policy"))
}

async fn slow(State(calls): State<CallLog>, Json(request): Json<Request>) -> Json<WireResponse> {
    record(&calls, "/slow", &request);
    sleep(SLOW_RESPONSE_DELAY).await;
    Json(allowed())
}

async fn error(State(calls): State<CallLog>, Json(request): Json<Request>) -> StatusCode {
    record(&calls, "/error", &request);
    StatusCode::INTERNAL_SERVER_ERROR
}

// ============================================================================
// Configuration Helpers
// ============================================================================

/// One webhook entry for [`config`]
#[allow(dead_code)]
pub struct Hook<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub policy: &'a str,
    pub timeout: &'a str,
    pub resources: &'a str,
    pub operations: &'a str,
    pub url: String,
}

/// Build a configuration from webhook entries, in order
#[allow(dead_code)]
pub fn config(hooks: &[Hook<'_>]) -> AdmissionConfig {
    let webhooks: Vec<Value> = hooks
        .iter()
        .map(|hook| {
            json!({
                "name": hook.name,
                "kind": hook.kind,
                "failurePolicy": hook.policy,
                "timeout": hook.timeout,
                "rules": [{
                    "resources": [hook.resources],
                    "operations": [hook.operations],
                    "versions": ["v2"]
                }],
                "clientConfig": { "url": hook.url }
            })
        })
        .collect();

    AdmissionConfig::from_json_str(&json!({ "webhooks": webhooks }).to_string())
        .expect("test configuration should parse")
}

/// URL of a port nothing listens on
#[allow(dead_code)]
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe port");
    let address = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/validate", address)
}

/// Update request on `clusters`
#[allow(dead_code)]
pub fn update_request(object: Value) -> Request {
    Request::new(admission_core::Operation::Update, "clusters", "v2")
        .with_name("1")
        .with_object(object)
}
