//! Predicate and curried classifications.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::invocation::{HandlerContext, Invocation, InvocationHandlerFn};
use super::matcher::MethodMatcher;
use crate::contract::OperationDescriptor;
use crate::error::HandlerError;

/// Computes a per-operation context once, at resolution time.
pub type ContextFactoryFn = Arc<dyn Fn(&OperationDescriptor) -> HandlerContext + Send + Sync>;

/// Matcher + handler. Optionally computes a per-operation context that the
/// classification cache stores alongside the resolved handler.
#[derive(Clone)]
pub struct PredicateClassification {
    description: String,
    matcher: MethodMatcher,
    context_factory: Option<ContextFactoryFn>,
    handler: InvocationHandlerFn,
    cache_identity: Option<String>,
}

impl PredicateClassification {
    /// Classification handling operations accepted by `matcher`.
    pub fn new<F>(description: impl Into<String>, matcher: MethodMatcher, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            matcher,
            context_factory: None,
            handler: Arc::new(handler),
            cache_identity: None,
        }
    }

    /// Compute a context per matched operation; handlers read it through
    /// [`Invocation::context`].
    pub fn with_method_context<C, F>(mut self, factory: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&OperationDescriptor) -> C + Send + Sync + 'static,
    {
        self.context_factory = Some(Arc::new(move |op: &OperationDescriptor| {
            Arc::new(factory(op)) as HandlerContext
        }));
        self
    }

    /// Mark this classification as cache-affecting: specifications compiled
    /// for recipes containing it are keyed by `identity` as well.
    pub fn cache_affecting(mut self, identity: impl Into<String>) -> Self {
        self.cache_identity = Some(identity.into());
        self
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Operation matcher.
    pub fn matcher(&self) -> &MethodMatcher {
        &self.matcher
    }

    /// Cache-affecting identity, if marked.
    pub fn cache_identity(&self) -> Option<&str> {
        self.cache_identity.as_deref()
    }

    pub(crate) fn handler(&self) -> &InvocationHandlerFn {
        &self.handler
    }

    pub(crate) fn method_context(&self, op: &OperationDescriptor) -> Option<HandlerContext> {
        self.context_factory.as_ref().map(|factory| factory(op))
    }
}

impl fmt::Debug for PredicateClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateClassification")
            .field("description", &self.description)
            .field("matcher", &self.matcher)
            .field("cache_identity", &self.cache_identity)
            .finish_non_exhaustive()
    }
}

/// Handler bound to fixed context supplied by the classification itself.
#[derive(Clone)]
pub struct CurriedClassification {
    description: String,
    matcher: MethodMatcher,
    context: HandlerContext,
    handler: InvocationHandlerFn,
    cache_identity: Option<String>,
}

impl CurriedClassification {
    /// Bind `handler` to `context` for operations accepted by `matcher`.
    pub fn new<C, F>(
        description: impl Into<String>,
        matcher: MethodMatcher,
        context: C,
        handler: F,
    ) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            matcher,
            context: Arc::new(context),
            handler: Arc::new(handler),
            cache_identity: None,
        }
    }

    /// See [`PredicateClassification::cache_affecting`].
    pub fn cache_affecting(mut self, identity: impl Into<String>) -> Self {
        self.cache_identity = Some(identity.into());
        self
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Operation matcher.
    pub fn matcher(&self) -> &MethodMatcher {
        &self.matcher
    }

    /// Cache-affecting identity, if marked.
    pub fn cache_identity(&self) -> Option<&str> {
        self.cache_identity.as_deref()
    }

    pub(crate) fn handler(&self) -> &InvocationHandlerFn {
        &self.handler
    }

    pub(crate) fn context(&self) -> &HandlerContext {
        &self.context
    }
}

impl fmt::Debug for CurriedClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurriedClassification")
            .field("description", &self.description)
            .field("matcher", &self.matcher)
            .field("cache_identity", &self.cache_identity)
            .finish_non_exhaustive()
    }
}
