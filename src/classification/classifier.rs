//! Ordered classification lists and first-match-wins resolution.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;

use super::invocation::{HandlerContext, Invocation};
use super::matcher::MethodMatcher;
use super::predicate::{CurriedClassification, PredicateClassification};
use crate::contract::{DefaultMethodFn, OperationDescriptor};
use crate::dispatch::Proxy;
use crate::error::HandlerError;

/// One rule mapping operations to the handler servicing them.
#[derive(Clone, Debug)]
pub enum Classification {
    /// Matcher + handler (+ optional per-operation context).
    Predicate(Arc<PredicateClassification>),
    /// Matcher + handler bound to fixed context.
    Curried(Arc<CurriedClassification>),
}

impl Classification {
    /// Human-readable description.
    pub fn description(&self) -> &str {
        match self {
            Self::Predicate(p) => p.description(),
            Self::Curried(c) => c.description(),
        }
    }

    /// Operation matcher.
    pub fn matcher(&self) -> &MethodMatcher {
        match self {
            Self::Predicate(p) => p.matcher(),
            Self::Curried(c) => c.matcher(),
        }
    }

    /// Whether this classification services `op`.
    pub fn matches(&self, op: &OperationDescriptor) -> bool {
        self.matcher().matches(op)
    }

    /// Cache-affecting identity, if marked.
    pub fn cache_identity(&self) -> Option<&str> {
        match self {
            Self::Predicate(p) => p.cache_identity(),
            Self::Curried(c) => c.cache_identity(),
        }
    }

    fn resolve(&self, op: &OperationDescriptor, index: usize) -> ResolvedClassification {
        let context = match self {
            Self::Predicate(p) => p.method_context(op),
            Self::Curried(c) => Some(c.context().clone()),
        };
        ResolvedClassification {
            classification: self.clone(),
            index,
            context,
        }
    }
}

impl From<PredicateClassification> for Classification {
    fn from(value: PredicateClassification) -> Self {
        Self::Predicate(Arc::new(value))
    }
}

impl From<CurriedClassification> for Classification {
    fn from(value: CurriedClassification) -> Self {
        Self::Curried(Arc::new(value))
    }
}

/// A classification curried with the context computed for one operation.
/// This is what the classification cache retains.
#[derive(Clone)]
pub struct ResolvedClassification {
    classification: Classification,
    index: usize,
    context: Option<HandlerContext>,
}

impl ResolvedClassification {
    /// The matched classification.
    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Position of the matched classification in its list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn handle(
        &self,
        proxy: &Proxy,
        op: &OperationDescriptor,
        args: &[Value],
        super_method: Option<&DefaultMethodFn>,
    ) -> Result<Value, HandlerError> {
        let handler = match &self.classification {
            Classification::Predicate(p) => p.handler(),
            Classification::Curried(c) => c.handler(),
        };
        handler(&Invocation::new(
            proxy,
            op,
            args,
            self.context.as_ref(),
            super_method,
        ))
    }
}

impl fmt::Debug for ResolvedClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedClassification")
            .field("description", &self.classification.description())
            .field("index", &self.index)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

/// Outcome of classifying one operation.
#[derive(Clone, Debug)]
pub enum Resolution {
    /// A classification matched.
    Classified(ResolvedClassification),
    /// Nothing matched.
    Unresolved,
}

impl Resolution {
    /// Whether a classification matched.
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified(_))
    }

    /// Index of the matched classification, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Classified(resolved) => Some(resolved.index()),
            Self::Unresolved => None,
        }
    }
}

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Ordered, shared, read-only classification list.
///
/// Each list gets a process-unique id when built; the classification cache
/// keys on it so lists never share resolutions. Clones share the id, so
/// handlers built from clones of one list share their resolutions too.
#[derive(Clone)]
pub struct ClassificationSet {
    id: u64,
    items: Arc<[Classification]>,
}

impl ClassificationSet {
    /// Freeze an ordered list of classifications.
    pub fn new(items: impl IntoIterator<Item = Classification>) -> Self {
        Self {
            id: NEXT_SET_ID.fetch_add(1, Ordering::Relaxed),
            items: items.into_iter().collect(),
        }
    }

    /// Process-unique id of this list.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handle that stays upgradable while any clone of this list is alive.
    pub(crate) fn downgrade(&self) -> Weak<[Classification]> {
        Arc::downgrade(&self.items)
    }

    /// Classifications in evaluation order.
    pub fn items(&self) -> &[Classification] {
        &self.items
    }

    /// Number of classifications.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether some classification matches every operation.
    pub fn has_catch_all(&self) -> bool {
        self.items
            .iter()
            .any(|c| matches!(c.matcher(), MethodMatcher::Any))
    }

    /// A new list with `leading` evaluated before the existing entries.
    pub fn with_leading(&self, leading: impl IntoIterator<Item = Classification>) -> Self {
        Self::new(leading.into_iter().chain(self.items.iter().cloned()))
    }

    /// Identities of cache-affecting classifications, in order.
    pub fn cache_identities(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|c| c.cache_identity().map(str::to_string))
            .collect()
    }

    /// First-match-wins classification of `op`. Pure; the result depends
    /// only on this list and the descriptor.
    pub fn classify(&self, op: &OperationDescriptor) -> Resolution {
        self.items
            .iter()
            .enumerate()
            .find(|(_, classification)| classification.matches(op))
            .map(|(index, classification)| Resolution::Classified(classification.resolve(op, index)))
            .unwrap_or(Resolution::Unresolved)
    }
}

impl fmt::Debug for ClassificationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationSet")
            .field("id", &self.id)
            .field(
                "items",
                &self.items.iter().map(|c| c.description()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
