//! # Request Model
//!
//! The unit of admission: one create/update/delete about to be persisted.
//!
//! A [`Request`] serializes directly to the wire body sent to webhook servers,
//! so field names here are part of the external contract.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Operation
// ============================================================================

/// Kind of mutation being admitted
///
/// Serialized lowercase; accepted in any case on input, matching configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl Operation {
    /// Get wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Connect => "connect",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "connect" => Ok(Self::Connect),
            _ => Err(format!(
                "unknown operation '{}': expected create, update, delete or connect",
                s
            )),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Proposed change presented to admission webhooks
///
/// `object` and `old_object` are opaque to the dispatcher: they are forwarded
/// verbatim and only ever modified by applying webhook patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Operation about to be performed
    pub operation: Operation,

    /// Top-level resource kind (e.g. `applications`)
    pub resource: String,

    /// Resource identifier
    #[serde(default)]
    pub name: String,

    /// Nested resource kind, empty when the request targets `resource` itself
    #[serde(default)]
    pub sub_resource: String,

    /// API version of the request (e.g. `v2`)
    pub version: String,

    /// Proposed new state
    #[serde(default)]
    pub object: Value,

    /// Previously persisted state, absent on create
    #[serde(default)]
    pub old_object: Option<Value>,

    /// Free-form side channel (authorization scope hints and the like)
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl Request {
    /// Create a request with no object, name or sub-resource
    pub fn new(operation: Operation, resource: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            operation,
            resource: resource.into(),
            name: String::new(),
            sub_resource: String::new(),
            version: version.into(),
            object: Value::Null,
            old_object: None,
            options: BTreeMap::new(),
        }
    }

    /// Set the resource identifier
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the nested resource kind
    pub fn with_sub_resource(mut self, sub_resource: impl Into<String>) -> Self {
        self.sub_resource = sub_resource.into();
        self
    }

    /// Set the proposed object
    pub fn with_object(mut self, object: Value) -> Self {
        self.object = object;
        self
    }

    /// Set the previously persisted object
    pub fn with_old_object(mut self, old_object: Value) -> Self {
        self.old_object = Some(old_object);
        self
    }

    /// Add an option entry
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Resource path used for rule matching: `resource[/sub_resource]`
    pub fn effective_path(&self) -> String {
        if self.sub_resource.is_empty() {
            self.resource.clone()
        } else {
            format!("{}/{}", self.resource, self.sub_resource)
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
