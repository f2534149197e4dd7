//! Live proxy instances.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;

use super::backend::{Slot, VTable};
use super::dispatcher::{Dispatcher, ProxyState};
use super::spec::{ConstructorArgs, DispatchSpec};
use crate::contract::system::{is_system_contract, WRITE_REPLACE};
use crate::contract::{ContractId, OperationKey};
use crate::error::{ProxyError, ProxyResult};
use crate::recipe::ProxyToken;

/// A materialized instance satisfying every contract of its specification.
///
/// Intercepted operations are called with [`invoke`](Self::invoke); each call
/// goes through the instance's own [`Dispatcher`]. The dispatcher is bound as
/// the last construction step, so calls made from a post-construction
/// callback fail with [`ProxyError::NotYetBound`].
pub struct Proxy {
    spec: Arc<DispatchSpec>,
    vtable: Arc<VTable>,
    base_fields: Value,
    constructor_args: ConstructorArgs,
    state: ProxyState,
    dispatcher: OnceCell<Arc<Dispatcher>>,
}

impl Proxy {
    pub(crate) fn new(
        spec: Arc<DispatchSpec>,
        vtable: Arc<VTable>,
        base_fields: Value,
        constructor_args: ConstructorArgs,
        state: ProxyState,
    ) -> Self {
        Self {
            spec,
            vtable,
            base_fields,
            constructor_args,
            state,
            dispatcher: OnceCell::new(),
        }
    }

    pub(crate) fn bind(&self, dispatcher: Arc<Dispatcher>) {
        if self.dispatcher.set(dispatcher).is_err() {
            log::warn!("{} is already bound; keeping the first dispatcher", self.spec.name());
        }
    }

    /// Invoke the operation `name` whose parameters accept `args`.
    pub fn invoke(&self, name: &str, args: &[Value]) -> ProxyResult<Value> {
        let slot = self
            .vtable
            .lookup(name, args)
            .ok_or_else(|| ProxyError::UnknownOperation {
                proxy: self.spec.name().to_string(),
                operation: name.to_string(),
                arity: args.len(),
            })?;
        self.invoke_slot(slot, args)
    }

    /// Invoke the operation with exactly this key.
    pub fn invoke_operation(&self, key: &OperationKey, args: &[Value]) -> ProxyResult<Value> {
        let slot = self
            .vtable
            .slot(key)
            .ok_or_else(|| ProxyError::UnknownOperation {
                proxy: self.spec.name().to_string(),
                operation: key.to_string(),
                arity: args.len(),
            })?;
        self.invoke_slot(slot, args)
    }

    fn invoke_slot(&self, slot: &Slot, args: &[Value]) -> ProxyResult<Value> {
        let dispatcher = self
            .dispatcher
            .get()
            .ok_or_else(|| ProxyError::NotYetBound {
                operation: slot.operation().signature(),
            })?;
        dispatcher.dispatch(self, slot, args)
    }

    /// Bound state downcast to `S`. This is the state accessor operation:
    /// it never goes through classification.
    pub fn proxy_state<S: Any>(&self) -> Option<&S> {
        self.state.downcast_ref::<S>()
    }

    /// Bound state, type-erased.
    pub fn proxy_state_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.state
    }

    /// Shared handle to the bound state.
    pub fn shared_state(&self) -> ProxyState {
        self.state.clone()
    }

    /// Fields produced by the base constructor (`null` without a base).
    pub fn base_fields(&self) -> &Value {
        &self.base_fields
    }

    /// Arguments the instance was constructed with.
    pub fn constructor_args(&self) -> &ConstructorArgs {
        &self.constructor_args
    }

    /// The compiled specification.
    pub fn spec(&self) -> &Arc<DispatchSpec> {
        &self.spec
    }

    /// Generated type name.
    pub fn spec_name(&self) -> &str {
        self.spec.name()
    }

    /// User-visible contracts, system contracts excluded.
    pub fn contracts(&self) -> Vec<ContractId> {
        self.spec
            .contracts()
            .iter()
            .map(|c| c.id().clone())
            .filter(|id| !is_system_contract(id))
            .collect()
    }

    /// Whether the instance implements `id`, system contracts included.
    pub fn implements(&self, id: &ContractId) -> bool {
        self.spec.implements(id)
    }

    /// Whether construction has completed.
    pub fn is_bound(&self) -> bool {
        self.dispatcher.get().is_some()
    }

    /// Replace this instance by a transferable token. Only instances built
    /// through a serializable recipe variant support this.
    pub fn externalize(&self) -> ProxyResult<ProxyToken> {
        let token = self.invoke(WRITE_REPLACE, &[])?;
        Ok(serde_json::from_value(token)?)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("spec", &self.spec.name())
            .field("contracts", &self.contracts())
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}
