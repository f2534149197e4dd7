//! Capability implementation backends.
//!
//! A backend turns a compiled [`DispatchSpec`] into something that can
//! produce live [`Proxy`] instances. The only guarantee callers rely on is
//! that every intercepted operation invoked on a produced instance is routed
//! through that instance's bound [`Dispatcher`] before anything else happens.
//!
//! [`VTableBackend`] is the built-in backend: it resolves every intercepted
//! operation to a [`Slot`] once per specification and hands out instances
//! that look calls up by name and arity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::dispatcher::Dispatcher;
use super::proxy::Proxy;
use super::spec::{ConstructorArgs, DispatchSpec};
use crate::contract::value_type::render_types;
use crate::contract::{DefaultMethodFn, OperationDescriptor, OperationKey, ValueType};
use crate::error::{ProxyError, ProxyResult};
use crate::recipe::OnInstantiationCallback;

/// Produces a [`Materializer`] for a compiled specification.
pub trait ImplementationBackend: Send + Sync {
    /// Backend name, for diagnostics.
    fn name(&self) -> &str;

    /// Prepare `spec` for instantiation. Failures surface as
    /// [`ProxyError::MaterializationFailure`] and are never cached.
    fn materialize(&self, spec: Arc<DispatchSpec>) -> ProxyResult<Arc<dyn Materializer>>;
}

/// Backend-side handle of one compiled specification.
pub trait Materializer: Send + Sync {
    /// The specification this materializer was built from.
    fn spec(&self) -> &Arc<DispatchSpec>;

    /// Constructor accepting `argument_types` after the fixed
    /// (dispatcher, callback, state) prefix.
    fn constructor(&self, argument_types: &[ValueType]) -> ProxyResult<Arc<dyn ProxyConstructor>>;
}

/// Constructor of live instances for one argument shape.
pub trait ProxyConstructor: Send + Sync {
    /// User argument types accepted.
    fn signature(&self) -> &[ValueType];

    /// Build an instance: base construction, then the callback, then the
    /// dispatcher is bound. No intercepted operation can run before the
    /// whole sequence completes.
    fn construct(
        &self,
        dispatcher: Arc<Dispatcher>,
        callback: Arc<dyn OnInstantiationCallback>,
        args: ConstructorArgs,
    ) -> ProxyResult<Proxy>;
}

impl fmt::Debug for dyn ProxyConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyConstructor({})", render_types(self.signature()))
    }
}

/// One interceptable operation of a materialized specification.
#[derive(Clone)]
pub struct Slot {
    operation: Arc<OperationDescriptor>,
    default: Option<DefaultMethodFn>,
}

impl Slot {
    /// The operation routed through this slot.
    pub fn operation(&self) -> &Arc<OperationDescriptor> {
        &self.operation
    }

    /// Base-behavior default implementation, if any.
    pub fn default_method(&self) -> Option<&DefaultMethodFn> {
        self.default.as_ref()
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("operation", &self.operation.signature())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Operation table shared by every instance of one specification.
pub struct VTable {
    slots: Vec<Slot>,
    by_key: HashMap<OperationKey, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl VTable {
    /// Build the table for `spec`.
    ///
    /// Operations declared by several contracts with the same key share one
    /// slot; a disagreement on the return type is a contract conflict.
    pub fn build(spec: &DispatchSpec) -> ProxyResult<Self> {
        let defaults = spec.base().and_then(|base| base.base());
        let mut slots: Vec<Slot> = Vec::new();
        let mut by_key = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for op in spec.intercepted() {
            let key = op.key();
            if let Some(&existing) = by_key.get(&key) {
                let first: &Slot = &slots[existing];
                if first.operation.return_type() != op.return_type() {
                    return Err(ProxyError::materialization(
                        spec.name(),
                        format!(
                            "conflicting declarations of `{}`: {} by `{}` and {} by `{}`",
                            key,
                            first.operation.return_type(),
                            first.operation.declaring_contract(),
                            op.return_type(),
                            op.declaring_contract()
                        ),
                    ));
                }
                continue;
            }
            let index = slots.len();
            slots.push(Slot {
                operation: op.clone(),
                default: defaults.and_then(|d| d.default_method(&key)).cloned(),
            });
            by_name.entry(op.name().to_string()).or_default().push(index);
            by_key.insert(key, index);
        }

        Ok(Self {
            slots,
            by_key,
            by_name,
        })
    }

    /// Every slot, in contract order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot for an exact operation key.
    pub fn slot(&self, key: &OperationKey) -> Option<&Slot> {
        self.by_key.get(key).map(|&index| &self.slots[index])
    }

    /// Overload resolution: the first slot named `name` whose parameters
    /// accept `args`.
    pub fn lookup(&self, name: &str, args: &[Value]) -> Option<&Slot> {
        self.by_name
            .get(name)?
            .iter()
            .map(|&index| &self.slots[index])
            .find(|slot| slot.operation.accepts(args))
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|slot| slot.operation.signature()))
            .finish()
    }
}

/// Built-in backend routing calls through a per-specification [`VTable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct VTableBackend;

impl VTableBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl ImplementationBackend for VTableBackend {
    fn name(&self) -> &str {
        "vtable"
    }

    fn materialize(&self, spec: Arc<DispatchSpec>) -> ProxyResult<Arc<dyn Materializer>> {
        let vtable = Arc::new(VTable::build(&spec)?);
        log::debug!("Materialized {} with {} slot(s)", spec.name(), vtable.len());
        Ok(Arc::new(VTableMaterializer { spec, vtable }))
    }
}

struct VTableMaterializer {
    spec: Arc<DispatchSpec>,
    vtable: Arc<VTable>,
}

impl Materializer for VTableMaterializer {
    fn spec(&self) -> &Arc<DispatchSpec> {
        &self.spec
    }

    fn constructor(&self, argument_types: &[ValueType]) -> ProxyResult<Arc<dyn ProxyConstructor>> {
        if argument_types != self.spec.constructor_shape() {
            return Err(ProxyError::ConstructionContractViolation {
                owner: self.spec.name().to_string(),
                signature: render_types(argument_types),
            });
        }
        log::debug!(
            "Introspected constructor {}({})",
            self.spec.name(),
            render_types(argument_types)
        );
        Ok(Arc::new(VTableConstructor {
            spec: self.spec.clone(),
            vtable: self.vtable.clone(),
        }))
    }
}

struct VTableConstructor {
    spec: Arc<DispatchSpec>,
    vtable: Arc<VTable>,
}

impl ProxyConstructor for VTableConstructor {
    fn signature(&self) -> &[ValueType] {
        self.spec.constructor_shape()
    }

    fn construct(
        &self,
        dispatcher: Arc<Dispatcher>,
        callback: Arc<dyn OnInstantiationCallback>,
        args: ConstructorArgs,
    ) -> ProxyResult<Proxy> {
        let base = self.spec.base_constructor();
        let fields = base.construct(&args.values).map_err(|e| {
            ProxyError::handler(
                format!("{}({})", base.owner(), render_types(base.signature())),
                e,
            )
        })?;

        let state = dispatcher.state().clone();
        let proxy = Proxy::new(self.spec.clone(), self.vtable.clone(), fields, args, state);
        callback
            .proxy_created(&proxy, proxy.proxy_state_any())
            .map_err(|e| ProxyError::handler(format!("{}::proxy_created", self.spec.name()), e))?;
        proxy.bind(dispatcher);
        Ok(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{CapabilitySet, Contract};
    use crate::dispatch::spec::introspect_base_constructor;
    use serde_json::json;

    fn compile(set: &CapabilitySet) -> Arc<DispatchSpec> {
        let ctor = introspect_base_constructor(set.base(), &[]).unwrap();
        Arc::new(DispatchSpec::compile("test", set, ctor, vec![]))
    }

    fn greeter() -> Arc<Contract> {
        Contract::interface("Greeter")
            .operation(
                OperationDescriptor::new("greet")
                    .param(ValueType::String)
                    .returns(ValueType::String),
            )
            .operation(
                OperationDescriptor::new("greet")
                    .params([ValueType::String, ValueType::Integer])
                    .returns(ValueType::String),
            )
            .build()
    }

    #[test]
    fn test_vtable_overload_lookup() {
        let spec = compile(&CapabilitySet::of(greeter()).unwrap());
        let table = VTable::build(&spec).unwrap();
        assert_eq!(table.len(), 2);
        let one = table.lookup("greet", &[json!("Ada")]).unwrap();
        assert_eq!(one.operation().arity(), 1);
        let two = table.lookup("greet", &[json!("Ada"), json!(2)]).unwrap();
        assert_eq!(two.operation().arity(), 2);
        assert!(table.lookup("greet", &[json!(1)]).is_none());
        assert!(table.lookup("get_proxy_state", &[]).is_none());
    }

    #[test]
    fn test_shared_operation_collapses_to_one_slot() {
        let welcomer = Contract::interface("Welcomer")
            .operation(
                OperationDescriptor::new("greet")
                    .param(ValueType::String)
                    .returns(ValueType::String),
            )
            .build();
        let spec = compile(&CapabilitySet::new([greeter(), welcomer]).unwrap());
        let table = VTable::build(&spec).unwrap();
        assert_eq!(table.len(), 2);
        let key = OperationDescriptor::new("greet").param(ValueType::String).key();
        assert_eq!(
            table.slot(&key).unwrap().operation().declaring_contract().as_str(),
            "Greeter"
        );
    }

    #[test]
    fn test_conflicting_return_types_fail_materialization() {
        let other = Contract::interface("Counter")
            .operation(
                OperationDescriptor::new("greet")
                    .param(ValueType::String)
                    .returns(ValueType::Integer),
            )
            .build();
        let spec = compile(&CapabilitySet::new([greeter(), other]).unwrap());
        let err = VTableBackend::new().materialize(spec).err().unwrap();
        assert!(matches!(err, ProxyError::MaterializationFailure { .. }));
    }

    #[test]
    fn test_slots_pick_up_base_defaults() {
        let base = Contract::base_behavior("Polite")
            .default_method(
                OperationDescriptor::new("farewell").returns(ValueType::String),
                |_, _| Ok(json!("Goodbye")),
            )
            .build();
        let spec = compile(&CapabilitySet::new([base, greeter()]).unwrap());
        let table = VTable::build(&spec).unwrap();
        assert!(table.lookup("farewell", &[]).unwrap().default_method().is_some());
        assert!(table.lookup("greet", &[json!("x")]).unwrap().default_method().is_none());
    }

    #[test]
    fn test_materializer_rejects_unrecorded_shape() {
        let spec = compile(&CapabilitySet::of(greeter()).unwrap());
        let materializer = VTableBackend::new().materialize(spec).unwrap();
        assert!(materializer.constructor(&[]).is_ok());
        let err = materializer.constructor(&[ValueType::String]).err().unwrap();
        assert!(matches!(err, ProxyError::ConstructionContractViolation { .. }));
    }
}
