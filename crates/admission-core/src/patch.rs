//! # Patches
//!
//! Object rewrites returned by mutating webhooks.
//!
//! Three encodings are accepted: RFC 6902 JSON Patch, RFC 7396 JSON Merge
//! Patch, and full replacement of the object. Application never touches the
//! input value, so a patch that fails halfway leaves the caller's object as it
//! was.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Encoding of a webhook patch as named on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JsonPatch,
    MergePatch,
    Replace,
}

impl PatchType {
    /// Get wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonPatch => "JSONPatch",
            Self::MergePatch => "MergePatch",
            Self::Replace => "Replace",
        }
    }
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchType {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JSONPatch" => Ok(Self::JsonPatch),
            "MergePatch" => Ok(Self::MergePatch),
            "Replace" => Ok(Self::Replace),
            other => Err(PatchError::UnknownType {
                patch_type: other.to_string(),
            }),
        }
    }
}

/// Errors raised while decoding or applying a patch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("unknown patch type '{patch_type}': expected JSONPatch, MergePatch or Replace")]
    UnknownType { patch_type: String },

    #[error("invalid JSON patch document: {message}")]
    InvalidDocument { message: String },

    #[error("failed to apply {patch_type} patch: {message}")]
    ApplyFailed {
        patch_type: PatchType,
        message: String,
    },
}

/// A decoded webhook patch
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// RFC 6902 operation list
    Json(json_patch::Patch),

    /// RFC 7396 merge document
    Merge(Value),

    /// Complete new object
    Replace(Value),
}

impl Patch {
    /// Decode a patch as received from a webhook
    ///
    /// Without an explicit type an array is read as a JSON Patch and any
    /// other value as a merge patch.
    pub fn from_wire(value: Value, patch_type: Option<PatchType>) -> Result<Self, PatchError> {
        let patch_type = patch_type.unwrap_or(if value.is_array() {
            PatchType::JsonPatch
        } else {
            PatchType::MergePatch
        });

        match patch_type {
            PatchType::JsonPatch => serde_json::from_value(value)
                .map(Self::Json)
                .map_err(|e| PatchError::InvalidDocument {
                    message: e.to_string(),
                }),
            PatchType::MergePatch => Ok(Self::Merge(value)),
            PatchType::Replace => Ok(Self::Replace(value)),
        }
    }

    /// Encoding of this patch
    pub fn patch_type(&self) -> PatchType {
        match self {
            Self::Json(_) => PatchType::JsonPatch,
            Self::Merge(_) => PatchType::MergePatch,
            Self::Replace(_) => PatchType::Replace,
        }
    }

    /// Apply the patch to a copy of `target`
    pub fn apply(&self, target: &Value) -> Result<Value, PatchError> {
        match self {
            Self::Json(patch) => {
                let mut patched = target.clone();
                json_patch::patch(&mut patched, &patch.0).map_err(|e| PatchError::ApplyFailed {
                    patch_type: PatchType::JsonPatch,
                    message: e.to_string(),
                })?;
                Ok(patched)
            }
            Self::Merge(document) => {
                let mut patched = target.clone();
                json_patch::merge(&mut patched, document);
                Ok(patched)
            }
            Self::Replace(object) => Ok(object.clone()),
        }
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
