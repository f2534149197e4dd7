//! Operation matchers: the "which operations" half of a classification.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::contract::{ContractId, OperationDescriptor};

/// Predicate over an operation descriptor.
pub type MatchFn = Arc<dyn Fn(&OperationDescriptor) -> bool + Send + Sync>;

/// Decides whether a classification applies to an operation.
///
/// Matchers see only the static descriptor, never the proxy state, so their
/// answer can be memoized per descriptor.
#[derive(Clone)]
pub enum MethodMatcher {
    /// Arbitrary predicate.
    Predicate(MatchFn),
    /// Matches operations whose name or rendered key (`greet(string)`) is
    /// listed.
    AllowList(HashSet<String>),
    /// Matches every operation except the listed ones.
    DenyList(HashSet<String>),
    /// Matches everything; the usual fallback.
    Any,
}

impl MethodMatcher {
    /// Matcher from a closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&OperationDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Allow list of operation names or rendered keys.
    pub fn allow<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(names.into_iter().map(Into::into).collect())
    }

    /// Deny list of operation names or rendered keys.
    pub fn deny<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::DenyList(names.into_iter().map(Into::into).collect())
    }

    /// Matches operations declared by the given contract.
    pub fn declared_by(contract: ContractId) -> Self {
        Self::predicate(move |op| op.declaring_contract() == &contract)
    }

    /// Matches a single operation by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::allow([name.into()])
    }

    /// Evaluate the matcher.
    pub fn matches(&self, op: &OperationDescriptor) -> bool {
        match self {
            Self::Predicate(f) => f(op),
            Self::AllowList(names) => listed(names, op),
            Self::DenyList(names) => !listed(names, op),
            Self::Any => true,
        }
    }
}

fn listed(names: &HashSet<String>, op: &OperationDescriptor) -> bool {
    names.contains(op.name()) || names.contains(&op.key().to_string())
}

impl fmt::Debug for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::AllowList(names) => f.debug_tuple("AllowList").field(names).finish(),
            Self::DenyList(names) => f.debug_tuple("DenyList").field(names).finish(),
            Self::Any => f.write_str("Any"),
        }
    }
}
