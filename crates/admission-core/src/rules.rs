//! # Rule Matching
//!
//! Decides whether a webhook applies to a request.
//!
//! A [`Rule`] matches when the request's effective resource path, operation and
//! version are each members of the corresponding set. Membership is exact: no
//! prefixes and no globbing. The only wildcard is a set containing the literal
//! token [`WILDCARD`], which matches every value for that dimension. An empty
//! set matches nothing.

use crate::config::RuleDeclaration;
use crate::request::{Operation, Request};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Token that turns a rule dimension into match-anything
pub const WILDCARD: &str = "*";

// ============================================================================
// Matcher
// ============================================================================

/// One dimension of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher<T: Ord> {
    /// Matches every value
    Any,

    /// Matches exactly the listed values
    Set(BTreeSet<T>),
}

impl<T: Ord> Matcher<T> {
    /// Build a matcher from explicit values
    pub fn of(values: impl IntoIterator<Item = T>) -> Self {
        Self::Set(values.into_iter().collect())
    }

    /// Check membership
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Self::Any => true,
            Self::Set(values) => values.contains(value),
        }
    }

    /// Check if this matcher can never match
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Set(values) if values.is_empty())
    }
}

impl<T: Ord> Default for Matcher<T> {
    fn default() -> Self {
        Self::Set(BTreeSet::new())
    }
}

/// Parse declared values, honouring the wildcard token
///
/// Every non-wildcard entry is parsed even when the wildcard is present, so a
/// typo next to `*` is still reported.
fn parse_matcher<T, F>(values: &[String], mut parse: F) -> Result<Matcher<T>, Vec<String>>
where
    T: Ord,
    F: FnMut(&str) -> Result<T, String>,
{
    let mut any = false;
    let mut parsed = BTreeSet::new();
    let mut errors = Vec::new();
    for value in values.iter().map(|v| v.trim()) {
        if value == WILDCARD {
            any = true;
            continue;
        }
        match parse(value) {
            Ok(v) => {
                parsed.insert(v);
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        Err(errors)
    } else if any {
        Ok(Matcher::Any)
    } else {
        Ok(Matcher::Set(parsed))
    }
}

// ============================================================================
// Rule
// ============================================================================

/// Match predicate attached to a webhook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub resources: Matcher<String>,
    pub operations: Matcher<Operation>,
    pub versions: Matcher<String>,
}

impl Rule {
    /// Create a rule from its three dimensions
    pub fn new(
        resources: Matcher<String>,
        operations: Matcher<Operation>,
        versions: Matcher<String>,
    ) -> Self {
        Self {
            resources,
            operations,
            versions,
        }
    }

    /// Convert a configuration declaration, reporting every invalid value
    pub fn from_declaration(declaration: &RuleDeclaration) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let resources = parse_matcher(&declaration.resources, |v| {
            if v.is_empty() {
                Err("resource must not be empty".to_string())
            } else {
                Ok(v.to_string())
            }
        })
        .unwrap_or_else(|e| {
            errors.extend(e);
            Matcher::default()
        });

        let operations = parse_matcher(&declaration.operations, Operation::from_str)
            .unwrap_or_else(|e| {
                errors.extend(e);
                Matcher::default()
            });

        let versions = parse_matcher(&declaration.versions, |v| {
            if v.is_empty() {
                Err("version must not be empty".to_string())
            } else {
                Ok(v.to_string())
            }
        })
        .unwrap_or_else(|e| {
            errors.extend(e);
            Matcher::default()
        });

        if errors.is_empty() {
            Ok(Self::new(resources, operations, versions))
        } else {
            Err(errors)
        }
    }

    /// Check if this rule selects the request
    pub fn matches(&self, request: &Request) -> bool {
        self.operations.contains(&request.operation)
            && self.versions.contains(request.version.as_str())
            && self.resources.contains(request.effective_path().as_str())
    }

    /// Check if any dimension is empty, making the rule unmatchable
    pub fn is_unmatchable(&self) -> bool {
        self.resources.is_empty() || self.operations.is_empty() || self.versions.is_empty()
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
