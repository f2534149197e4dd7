//! Per-instance invocation router.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::backend::Slot;
use super::proxy::Proxy;
use crate::cache::{ClassificationCache, ProxyShape};
use crate::classification::{ClassificationSet, Resolution};
use crate::contract::OperationDescriptor;
use crate::error::{ProxyError, ProxyResult};

/// State bound to one proxy instance.
pub type ProxyState = Arc<dyn Any + Send + Sync>;

/// Routes every intercepted call of one instance to its classification.
///
/// A dispatcher is created right before its instance and is owned by it;
/// the state it holds is never shared with another instance.
pub struct Dispatcher {
    state: ProxyState,
    classifications: ClassificationSet,
    cache: Arc<ClassificationCache>,
}

impl Dispatcher {
    /// Create a dispatcher resolving through `cache`.
    pub fn new(
        state: ProxyState,
        classifications: ClassificationSet,
        cache: Arc<ClassificationCache>,
    ) -> Self {
        Self {
            state,
            classifications,
            cache,
        }
    }

    /// The bound state.
    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// The classification list, in evaluation order.
    pub fn classifications(&self) -> &ClassificationSet {
        &self.classifications
    }

    /// Which classification services `operation` on instances of `shape`.
    pub fn resolve(&self, shape: &Arc<ProxyShape>, operation: &Arc<OperationDescriptor>) -> Resolution {
        self.cache.resolve(shape, &self.classifications, operation)
    }

    /// Service one call.
    ///
    /// Classified operations go to their handler. Unclassified operations
    /// fall back to the base default, if there is one; otherwise the call
    /// fails with [`ProxyError::UnclassifiedOperation`].
    pub(crate) fn dispatch(&self, proxy: &Proxy, slot: &Slot, args: &[Value]) -> ProxyResult<Value> {
        let op = slot.operation();
        match self.resolve(proxy.spec().shape(), op) {
            Resolution::Classified(resolved) => resolved
                .handle(proxy, op, args, slot.default_method())
                .map_err(|e| ProxyError::handler(op.signature(), e)),
            Resolution::Unresolved => match slot.default_method() {
                Some(default) => {
                    default(proxy, args).map_err(|e| ProxyError::handler(op.signature(), e))
                }
                None => Err(ProxyError::UnclassifiedOperation {
                    proxy: proxy.spec_name().to_string(),
                    operation: op.signature(),
                }),
            },
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("classifications", &self.classifications)
            .finish_non_exhaustive()
    }
}

/// A ready-made (state, classifications) pair, instantiated directly
/// without a recipe.
#[derive(Clone)]
pub struct DispatchHandler {
    state: ProxyState,
    classifications: ClassificationSet,
}

impl DispatchHandler {
    /// Bind `state` to `classifications`.
    pub fn new<S: Any + Send + Sync>(state: S, classifications: ClassificationSet) -> Self {
        Self::from_shared(Arc::new(state), classifications)
    }

    /// Bind already type-erased state.
    pub fn from_shared(state: ProxyState, classifications: ClassificationSet) -> Self {
        Self {
            state,
            classifications,
        }
    }

    /// The state.
    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// The classification list.
    pub fn classifications(&self) -> &ClassificationSet {
        &self.classifications
    }

    pub(crate) fn into_dispatcher(self, cache: Arc<ClassificationCache>) -> Dispatcher {
        Dispatcher::new(self.state, self.classifications, cache)
    }
}

impl fmt::Debug for DispatchHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandler")
            .field("classifications", &self.classifications)
            .finish_non_exhaustive()
    }
}
