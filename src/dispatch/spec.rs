//! Dispatch specification compilation.
//!
//! A [`DispatchSpec`] describes how to materialize instances for one
//! capability shape: which base behavior is extended, the final contract
//! list (with the hidden state accessor appended), every intercepted
//! operation, and the single constructor shape it was compiled for.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::Materializer;
use crate::cache::ProxyShape;
use crate::contract::system::{self, GET_PROXY_STATE};
use crate::contract::value_type::render_types;
use crate::contract::{
    BaseConstructor, CapabilitySet, Contract, ContractId, OperationDescriptor, ValueType,
};
use crate::error::{ProxyError, ProxyResult};

/// Contract id of the implicit base used when no base behavior is given.
pub const DEFAULT_BASE_ID: &str = "proxycian.Object";

/// Operation names that are lifecycle hooks rather than interceptable
/// operations.
const LIFECYCLE_OPERATIONS: &[&str] = &["drop", "finalize"];

static SPEC_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Constructor arguments forwarded to the base behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructorArgs {
    /// Declared argument types; selects the base constructor.
    pub types: Vec<ValueType>,
    /// Argument values.
    pub values: Vec<Value>,
}

impl ConstructorArgs {
    /// Arguments with explicit types.
    pub fn new(types: Vec<ValueType>, values: Vec<Value>) -> Self {
        Self { types, values }
    }

    /// No arguments: the zero-argument constructor is used.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether no arguments are forwarded.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.values.is_empty()
    }

    /// Check that every value is admitted by its declared type.
    pub fn check(&self) -> Result<(), String> {
        if self.types.len() != self.values.len() {
            return Err(format!(
                "{} constructor argument type(s) declared but {} value(s) supplied",
                self.types.len(),
                self.values.len()
            ));
        }
        match self
            .types
            .iter()
            .zip(&self.values)
            .position(|(ty, value)| !ty.accepts(value))
        {
            Some(index) => Err(format!(
                "constructor argument #{} ({}) is not a valid `{}`",
                index, self.values[index], self.types[index]
            )),
            None => Ok(()),
        }
    }
}

/// Compiled, cacheable description of one proxy shape.
pub struct DispatchSpec {
    id: u64,
    name: String,
    shape: Arc<ProxyShape>,
    capabilities: CapabilitySet,
    contracts: Vec<Arc<Contract>>,
    intercepted: Vec<Arc<OperationDescriptor>>,
    state_accessor: Arc<OperationDescriptor>,
    base_constructor: BaseConstructor,
    cache_identities: Vec<String>,
}

impl DispatchSpec {
    /// Compile a specification.
    ///
    /// `base_constructor` is the already-resolved constructor of the base
    /// type matching the requested argument shape; see
    /// [`introspect_base_constructor`].
    pub fn compile(
        name_prefix: &str,
        capabilities: &CapabilitySet,
        base_constructor: BaseConstructor,
        cache_identities: Vec<String>,
    ) -> Self {
        let id = SPEC_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!(
            "{}.{}_{}",
            name_prefix,
            capabilities.primary().id().simple_name(),
            id
        );

        let accessor = system::state_accessor();
        let state_accessor = accessor
            .operations()
            .iter()
            .find(|op| op.name() == GET_PROXY_STATE)
            .cloned()
            .unwrap_or_else(|| {
                Arc::new(OperationDescriptor::new(GET_PROXY_STATE).returns(ValueType::Any))
            });

        let mut contracts: Vec<Arc<Contract>> = capabilities.contracts().to_vec();
        if !capabilities.contains(accessor.id()) {
            contracts.push(accessor.clone());
        }

        let intercepted: Vec<Arc<OperationDescriptor>> = contracts
            .iter()
            .filter(|contract| contract.id() != accessor.id())
            .flat_map(|contract| contract.all_operations())
            .filter(|op| !(op.arity() == 0 && LIFECYCLE_OPERATIONS.contains(&op.name())))
            .collect();

        let shape = Arc::new(ProxyShape {
            contracts: contracts.iter().map(|c| c.id().clone()).collect(),
            constructor_types: base_constructor.signature().to_vec(),
        });

        log::debug!(
            "Compiled {} for {:?}: {} intercepted operation(s), constructor ({})",
            name,
            capabilities,
            intercepted.len(),
            render_types(base_constructor.signature())
        );

        Self {
            id,
            name,
            shape,
            capabilities: capabilities.clone(),
            contracts,
            intercepted,
            state_accessor,
            base_constructor,
            cache_identities,
        }
    }

    /// Process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Generated name (`<prefix>.<Primary>_<n>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structural identity shared by every compilation of the same shape.
    pub fn shape(&self) -> &Arc<ProxyShape> {
        &self.shape
    }

    /// Capability set the specification was compiled for.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Final contract list, state accessor included.
    pub fn contracts(&self) -> &[Arc<Contract>] {
        &self.contracts
    }

    /// Base behavior being extended, if any.
    pub fn base(&self) -> Option<&Arc<Contract>> {
        self.capabilities.base()
    }

    /// Every operation recorded for interception, in contract order.
    pub fn intercepted(&self) -> &[Arc<OperationDescriptor>] {
        &self.intercepted
    }

    /// Descriptor of the hidden state accessor operation.
    pub fn state_accessor(&self) -> &Arc<OperationDescriptor> {
        &self.state_accessor
    }

    /// Base constructor chained by the specification constructor.
    pub fn base_constructor(&self) -> &BaseConstructor {
        &self.base_constructor
    }

    /// User argument types of the recorded constructor shape.
    pub fn constructor_shape(&self) -> &[ValueType] {
        self.base_constructor.signature()
    }

    /// Cache-affecting identities folded into this specification's key.
    pub fn cache_identities(&self) -> &[String] {
        &self.cache_identities
    }

    /// Whether the specification implements `id` (system contracts included).
    pub fn implements(&self, id: &ContractId) -> bool {
        self.contracts.iter().any(|c| c.id() == id)
    }
}

impl fmt::Debug for DispatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("intercepted", &self.intercepted.len())
            .field("constructor", &render_types(self.constructor_shape()))
            .finish()
    }
}

/// A specification together with the backend materializer built for it.
/// This is the value the specification cache retains.
#[derive(Clone)]
pub struct CompiledSpec {
    spec: Arc<DispatchSpec>,
    materializer: Arc<dyn Materializer>,
}

impl CompiledSpec {
    /// Pair a specification with its materializer.
    pub fn new(spec: Arc<DispatchSpec>, materializer: Arc<dyn Materializer>) -> Self {
        Self { spec, materializer }
    }

    /// The specification.
    pub fn spec(&self) -> &Arc<DispatchSpec> {
        &self.spec
    }

    /// The backend materializer.
    pub fn materializer(&self) -> &Arc<dyn Materializer> {
        &self.materializer
    }
}

impl fmt::Debug for CompiledSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledSpec").field(&self.spec.name()).finish()
    }
}

/// Locate the base constructor accepting `argument_types`.
///
/// Without a base behavior only the implicit zero-argument constructor of
/// the default base exists. A base behavior that declares no constructors
/// likewise has only an implicit zero-argument one.
pub fn introspect_base_constructor(
    base: Option<&Arc<Contract>>,
    argument_types: &[ValueType],
) -> ProxyResult<BaseConstructor> {
    let owner = base
        .map(|contract| contract.id().clone())
        .unwrap_or_else(|| ContractId::new(DEFAULT_BASE_ID));
    let declared = base
        .and_then(|contract| contract.base())
        .map(|behavior| behavior.constructors())
        .unwrap_or_default();

    if declared.is_empty() && argument_types.is_empty() {
        log::debug!("Using implicit constructor of `{}`", owner);
        return Ok(BaseConstructor::implicit(owner));
    }
    declared
        .iter()
        .find(|constructor| constructor.signature() == argument_types)
        .cloned()
        .ok_or_else(|| ProxyError::ConstructionContractViolation {
            owner: owner.to_string(),
            signature: render_types(argument_types),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::system::STATE_ACCESSOR_ID;
    use serde_json::json;

    fn greeter() -> Arc<Contract> {
        Contract::interface("app.Greeter")
            .operation(
                OperationDescriptor::new("greet")
                    .param(ValueType::String)
                    .returns(ValueType::String),
            )
            .operation(OperationDescriptor::new("drop"))
            .build()
    }

    #[test]
    fn test_compile_appends_state_accessor() {
        let set = CapabilitySet::of(greeter()).unwrap();
        let ctor = introspect_base_constructor(None, &[]).unwrap();
        let spec = DispatchSpec::compile("gen", &set, ctor, vec![]);
        assert!(spec.name().starts_with("gen.Greeter_"));
        assert!(spec.implements(&ContractId::new(STATE_ACCESSOR_ID)));
        assert_eq!(spec.contracts().len(), 2);
        assert!(spec.base().is_none());
    }

    #[test]
    fn test_compile_skips_lifecycle_operations() {
        let set = CapabilitySet::of(greeter()).unwrap();
        let ctor = introspect_base_constructor(None, &[]).unwrap();
        let spec = DispatchSpec::compile("gen", &set, ctor, vec![]);
        let names: Vec<_> = spec.intercepted().iter().map(|op| op.name()).collect();
        assert_eq!(names, vec!["greet"]);
    }

    #[test]
    fn test_compiled_specs_get_distinct_ids() {
        let set = CapabilitySet::of(greeter()).unwrap();
        let a = DispatchSpec::compile("gen", &set, introspect_base_constructor(None, &[]).unwrap(), vec![]);
        let b = DispatchSpec::compile("gen", &set, introspect_base_constructor(None, &[]).unwrap(), vec![]);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.intercepted(), b.intercepted());
        assert_eq!(a.shape(), b.shape());
        assert_eq!(a.shape().contracts.len(), 2);
    }

    #[test]
    fn test_default_base_rejects_arguments() {
        let err = introspect_base_constructor(None, &[ValueType::Integer]).unwrap_err();
        match err {
            ProxyError::ConstructionContractViolation { owner, signature } => {
                assert_eq!(owner, DEFAULT_BASE_ID);
                assert_eq!(signature, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_base_constructor_lookup_by_signature() {
        let base = Contract::base_behavior("Counter")
            .constructor([], |_| Ok(json!({"start": 0})))
            .constructor([ValueType::Integer], |args| Ok(json!({"start": args[0]})))
            .build();
        let ctor = introspect_base_constructor(Some(&base), &[ValueType::Integer]).unwrap();
        assert_eq!(ctor.construct(&[json!(5)]).unwrap(), json!({"start": 5}));
        assert!(introspect_base_constructor(Some(&base), &[ValueType::String]).is_err());
    }

    #[test]
    fn test_constructor_args_check() {
        assert!(ConstructorArgs::none().check().is_ok());
        assert!(ConstructorArgs::new(vec![ValueType::Integer], vec![json!(1)])
            .check()
            .is_ok());
        assert!(ConstructorArgs::new(vec![ValueType::Integer], vec![])
            .check()
            .is_err());
        assert!(ConstructorArgs::new(vec![ValueType::Integer], vec![json!("x")])
            .check()
            .is_err());
    }
}
