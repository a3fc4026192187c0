//! # Webhook Registry
//!
//! Typed, validated view of [`AdmissionConfig`].
//!
//! The registry is built once at startup and is read-only afterwards. It keeps
//! two lists, mutating and validating, each in declaration order, and answers
//! which webhooks of a given kind apply to a request.

use crate::config::{AdmissionConfig, WebhookDeclaration};
use crate::error::ConfigError;
use crate::request::Request;
use crate::rules::Rule;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

// ============================================================================
// Webhook Attributes
// ============================================================================

/// Dispatch discipline of a webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    Mutating,
    Validating,
}

impl WebhookKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mutating => "mutating",
            Self::Validating => "validating",
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mutating" => Ok(Self::Mutating),
            "validating" => Ok(Self::Validating),
            _ => Err(format!(
                "unknown kind '{}': expected mutating or validating",
                s
            )),
        }
    }
}

/// How a webhook's own malfunction affects the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Malfunction blocks the request
    Fail,

    /// Malfunction is logged and the webhook is treated as absent
    Ignore,
}

impl FailurePolicy {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "Fail",
            Self::Ignore => "Ignore",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "ignore" => Ok(Self::Ignore),
            _ => Err(format!(
                "unknown failure policy '{}': expected Fail or Ignore",
                s
            )),
        }
    }
}

/// Resolved webhook endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    url: Url,
    headers: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Create endpoint configuration
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
        }
    }

    /// Add a static header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Endpoint URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Static headers sent with every call
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

// ============================================================================
// Webhook
// ============================================================================

/// A validated webhook registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Webhook {
    name: String,
    kind: WebhookKind,
    failure_policy: FailurePolicy,
    timeout: Duration,
    rules: Vec<Rule>,
    client: ClientConfig,
}

impl Webhook {
    /// Create a webhook directly, bypassing configuration parsing
    pub fn new(
        name: impl Into<String>,
        kind: WebhookKind,
        failure_policy: FailurePolicy,
        timeout: Duration,
        rules: Vec<Rule>,
        client: ClientConfig,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            failure_policy,
            timeout,
            rules,
            client,
        }
    }

    /// Validate a declaration, collecting every problem
    ///
    /// `index` is the declaration's position and is used for the generated
    /// name and in error messages.
    pub fn from_declaration(
        index: usize,
        declaration: &WebhookDeclaration,
    ) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let kind = WebhookKind::from_str(declaration.kind.trim());
        let name = match declaration.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            Some(_) => {
                errors.push("name must not be blank".to_string());
                String::new()
            }
            None => format!(
                "{}-webhook-{}",
                kind.as_ref().map(|k| k.as_str()).unwrap_or("unknown"),
                index
            ),
        };
        let label = if name.is_empty() {
            format!("webhook #{}", index)
        } else {
            format!("webhook #{} ({})", index, name)
        };

        let kind = kind.map_err(|e| errors.push(format!("{}: {}", label, e))).ok();

        let failure_policy = FailurePolicy::from_str(declaration.failure_policy.trim())
            .map_err(|e| errors.push(format!("{}: {}", label, e)))
            .ok();

        if declaration.timeout.is_zero() {
            errors.push(format!("{}: timeout must be greater than zero", label));
        }

        let client = match declaration.client_config.url.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(format!("{}: clientConfig.url is required", label));
                None
            }
            Some(raw) => match Url::parse(raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    let client = declaration
                        .client_config
                        .headers
                        .iter()
                        .fold(ClientConfig::new(url), |c, (k, v)| c.with_header(k, v));
                    Some(client)
                }
                Ok(url) => {
                    errors.push(format!(
                        "{}: unsupported URL scheme '{}' in clientConfig.url",
                        label,
                        url.scheme()
                    ));
                    None
                }
                Err(e) => {
                    errors.push(format!("{}: invalid clientConfig.url '{}': {}", label, raw, e));
                    None
                }
            },
        };

        let mut rules = Vec::with_capacity(declaration.rules.len());
        for (rule_index, rule) in declaration.rules.iter().enumerate() {
            match Rule::from_declaration(rule) {
                Ok(rule) => rules.push(rule),
                Err(rule_errors) => errors.extend(
                    rule_errors
                        .into_iter()
                        .map(|e| format!("{}: rule #{}: {}", label, rule_index, e)),
                ),
            }
        }

        match (kind, failure_policy, client) {
            (Some(kind), Some(failure_policy), Some(client)) if errors.is_empty() => Ok(Self {
                name,
                kind,
                failure_policy,
                timeout: declaration.timeout,
                rules,
                client,
            }),
            _ => Err(errors),
        }
    }

    /// Unique name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch discipline
    pub fn kind(&self) -> WebhookKind {
        self.kind
    }

    /// Failure policy
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Match rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Endpoint configuration
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    /// Check if any rule selects the request
    pub fn matches(&self, request: &Request) -> bool {
        self.rules.iter().any(|rule| rule.matches(request))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable registry of mutating and validating webhooks
#[derive(Debug, Clone, Default)]
pub struct WebhookRegistry {
    mutating: Vec<Arc<Webhook>>,
    validating: Vec<Arc<Webhook>>,
}

impl WebhookRegistry {
    /// Build the registry from configuration
    ///
    /// # Errors
    /// - `ConfigError::ValidationError` - listing every malformed declaration
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        let mut webhooks = Vec::with_capacity(config.webhooks.len());

        for (index, declaration) in config.webhooks.iter().enumerate() {
            match Webhook::from_declaration(index, declaration) {
                Ok(webhook) => webhooks.push(webhook),
                Err(e) => errors.extend(e),
            }
        }

        errors.extend(registration_errors(&webhooks));

        if !errors.is_empty() {
            return Err(ConfigError::ValidationError { errors });
        }

        let registry = Self::assemble(webhooks);

        info!(
            mutating = registry.mutating.len(),
            validating = registry.validating.len(),
            "Admission webhook registry built"
        );

        Ok(registry)
    }

    /// Build the registry from webhooks constructed in code, keeping their order
    ///
    /// # Errors
    /// - `ConfigError::ValidationError` - a zero timeout or a duplicate name
    pub fn from_webhooks(webhooks: impl IntoIterator<Item = Webhook>) -> Result<Self, ConfigError> {
        let webhooks: Vec<Webhook> = webhooks.into_iter().collect();

        let errors = registration_errors(&webhooks);
        if !errors.is_empty() {
            return Err(ConfigError::ValidationError { errors });
        }

        Ok(Self::assemble(webhooks))
    }

    fn assemble(webhooks: Vec<Webhook>) -> Self {
        let mut registry = Self::default();

        for webhook in webhooks {
            if webhook.rules().is_empty() {
                warn!(webhook = %webhook.name(), "Webhook has no rules and will never be called");
            } else if webhook.rules().iter().all(Rule::is_unmatchable) {
                warn!(
                    webhook = %webhook.name(),
                    "Every rule of webhook has an empty set and can never match"
                );
            }

            match webhook.kind() {
                WebhookKind::Mutating => registry.mutating.push(Arc::new(webhook)),
                WebhookKind::Validating => registry.validating.push(Arc::new(webhook)),
            }
        }

        registry
    }

    /// Mutating webhooks that apply to the request, in declaration order
    pub fn matching_mutating(&self, request: &Request) -> Vec<Arc<Webhook>> {
        Self::matching(&self.mutating, request)
    }

    /// Validating webhooks that apply to the request, in declaration order
    pub fn matching_validating(&self, request: &Request) -> Vec<Arc<Webhook>> {
        Self::matching(&self.validating, request)
    }

    fn matching(webhooks: &[Arc<Webhook>], request: &Request) -> Vec<Arc<Webhook>> {
        webhooks
            .iter()
            .filter(|webhook| webhook.matches(request))
            .cloned()
            .collect()
    }

    /// All mutating webhooks
    pub fn mutating(&self) -> &[Arc<Webhook>] {
        &self.mutating
    }

    /// All validating webhooks
    pub fn validating(&self) -> &[Arc<Webhook>] {
        &self.validating
    }

    /// Look up a webhook by name
    pub fn get(&self, name: &str) -> Option<&Arc<Webhook>> {
        self.mutating
            .iter()
            .chain(self.validating.iter())
            .find(|webhook| webhook.name() == name)
    }

    /// Total number of webhooks
    pub fn len(&self) -> usize {
        self.mutating.len() + self.validating.len()
    }

    /// Check if no webhooks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Problems that span webhooks or that `Webhook::new` cannot rule out
fn registration_errors(webhooks: &[Webhook]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen_names = HashSet::new();

    for webhook in webhooks {
        if webhook.timeout().is_zero() {
            errors.push(format!(
                "webhook {}: timeout must be greater than zero",
                webhook.name()
            ));
        }
        if !seen_names.insert(webhook.name()) {
            errors.push(format!("duplicate webhook name: {}", webhook.name()));
        }
    }

    errors
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
