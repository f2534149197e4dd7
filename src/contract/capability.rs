//! Capability contracts and base behaviors.
//!
//! A [`Contract`] is an abstract operation set a proxy must satisfy. A
//! contract built with [`Contract::base_behavior`] additionally carries
//! constructors and default implementations; such a contract may only appear
//! first in a [`CapabilitySet`](super::CapabilitySet) and is "extended" by
//! the generated proxy.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::descriptor::{ContractId, OperationDescriptor, OperationKey};
use super::value_type::{render_types, ValueType};
use crate::dispatch::Proxy;
use crate::error::{HandlerError, ProxyResult};

/// Base constructor body: receives the forwarded user arguments and returns
/// the base fields of the new instance.
pub type BaseConstructorFn = Arc<dyn Fn(&[Value]) -> Result<Value, HandlerError> + Send + Sync>;

/// Default implementation of a base-behavior operation.
pub type DefaultMethodFn =
    Arc<dyn Fn(&Proxy, &[Value]) -> Result<Value, HandlerError> + Send + Sync>;

/// One constructor exposed by a base behavior.
#[derive(Clone)]
pub struct BaseConstructor {
    owner: ContractId,
    signature: Vec<ValueType>,
    init: BaseConstructorFn,
}

impl BaseConstructor {
    /// Owning contract.
    pub fn owner(&self) -> &ContractId {
        &self.owner
    }

    /// Argument types this constructor accepts.
    pub fn signature(&self) -> &[ValueType] {
        &self.signature
    }

    /// Run the constructor body.
    pub fn construct(&self, args: &[Value]) -> Result<Value, HandlerError> {
        (self.init)(args)
    }

    /// Zero-argument constructor producing no base fields.
    pub(crate) fn implicit(owner: ContractId) -> Self {
        Self {
            owner,
            signature: Vec::new(),
            init: Arc::new(|_: &[Value]| -> Result<Value, HandlerError> { Ok(Value::Null) }),
        }
    }
}

impl fmt::Debug for BaseConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BaseConstructor({}({}))", self.owner, render_types(&self.signature))
    }
}

/// Constructors and default implementations of a base-behavior type.
#[derive(Clone, Default)]
pub struct BaseBehavior {
    constructors: Vec<BaseConstructor>,
    defaults: HashMap<OperationKey, DefaultMethodFn>,
}

impl BaseBehavior {
    /// Declared constructors. Empty means an implicit zero-argument one.
    pub fn constructors(&self) -> &[BaseConstructor] {
        &self.constructors
    }

    /// Default implementation for the operation, if any.
    pub fn default_method(&self, key: &OperationKey) -> Option<&DefaultMethodFn> {
        self.defaults.get(key)
    }

    /// Whether the operation has a default implementation.
    pub fn has_default(&self, key: &OperationKey) -> bool {
        self.defaults.contains_key(key)
    }
}

/// A capability contract.
pub struct Contract {
    id: ContractId,
    operations: Vec<Arc<OperationDescriptor>>,
    extends: Vec<Arc<Contract>>,
    base: Option<BaseBehavior>,
    system: bool,
}

impl Contract {
    /// Start building a pure interface contract.
    pub fn interface(id: impl Into<ContractId>) -> ContractBuilder {
        ContractBuilder::new(id.into(), None)
    }

    /// Start building a base-behavior contract.
    pub fn base_behavior(id: impl Into<ContractId>) -> ContractBuilder {
        ContractBuilder::new(id.into(), Some(BaseBehavior::default()))
    }

    /// Parse an interface contract from YAML.
    ///
    /// ```yaml
    /// id: Greeter
    /// operations:
    ///   - name: greet
    ///     parameters: [string]
    ///     returns: string
    /// ```
    pub fn from_yaml(yaml: &str) -> ProxyResult<Arc<Self>> {
        let def: ContractDef = serde_yaml::from_str(yaml)?;
        Ok(def.build())
    }

    /// Contract identifier.
    pub fn id(&self) -> &ContractId {
        &self.id
    }

    /// Operations declared directly on this contract.
    pub fn operations(&self) -> &[Arc<OperationDescriptor>] {
        &self.operations
    }

    /// Contracts this one extends.
    pub fn extends(&self) -> &[Arc<Contract>] {
        &self.extends
    }

    /// Base behavior, when this is a base-behavior type.
    pub fn base(&self) -> Option<&BaseBehavior> {
        self.base.as_ref()
    }

    /// Whether this is a base-behavior type rather than a pure contract.
    pub fn is_base_behavior(&self) -> bool {
        self.base.is_some()
    }

    /// Whether this contract is added by the engine rather than a caller.
    pub fn is_system(&self) -> bool {
        self.system
    }

    pub(crate) fn mark_system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Every operation reachable from this contract, own declarations
    /// first, then inherited ones. The first declaration of a key wins.
    pub fn all_operations(&self) -> Vec<Arc<OperationDescriptor>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_operations(&mut seen, &mut out);
        out
    }

    fn collect_operations(
        &self,
        seen: &mut HashSet<OperationKey>,
        out: &mut Vec<Arc<OperationDescriptor>>,
    ) {
        for op in &self.operations {
            if seen.insert(op.key()) {
                out.push(op.clone());
            }
        }
        for parent in &self.extends {
            parent.collect_operations(seen, out);
        }
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("id", &self.id)
            .field("operations", &self.operations.len())
            .field("base_behavior", &self.is_base_behavior())
            .field("system", &self.system)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Contract`].
pub struct ContractBuilder {
    id: ContractId,
    operations: Vec<Arc<OperationDescriptor>>,
    extends: Vec<Arc<Contract>>,
    base: Option<BaseBehavior>,
}

impl ContractBuilder {
    fn new(id: ContractId, base: Option<BaseBehavior>) -> Self {
        Self {
            id,
            operations: Vec::new(),
            extends: Vec::new(),
            base,
        }
    }

    /// Declare an abstract operation.
    pub fn operation(mut self, op: OperationDescriptor) -> Self {
        self.operations
            .push(Arc::new(op.declared_by(self.id.clone())));
        self
    }

    /// Inherit every operation of `parent`.
    pub fn extends(mut self, parent: Arc<Contract>) -> Self {
        self.extends.push(parent);
        self
    }

    /// Declare an operation with a default implementation.
    ///
    /// Only meaningful on base-behavior contracts; on pure interfaces the
    /// implementation is ignored with a warning and the operation stays
    /// abstract.
    pub fn default_method<F>(mut self, op: OperationDescriptor, body: F) -> Self
    where
        F: Fn(&Proxy, &[Value]) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let op = op.declared_by(self.id.clone());
        match self.base.as_mut() {
            Some(base) => {
                base.defaults.insert(op.key(), Arc::new(body));
            }
            None => log::warn!(
                "Interface `{}` cannot carry a default for {}; keeping it abstract",
                self.id,
                op.signature()
            ),
        }
        self.operations.push(Arc::new(op));
        self
    }

    /// Declare a constructor on a base-behavior contract.
    pub fn constructor<F>(mut self, signature: impl IntoIterator<Item = ValueType>, init: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let constructor = BaseConstructor {
            owner: self.id.clone(),
            signature: signature.into_iter().collect(),
            init: Arc::new(init),
        };
        match self.base.as_mut() {
            Some(base) => base.constructors.push(constructor),
            None => log::warn!("Interface `{}` cannot declare constructors; ignored", self.id),
        }
        self
    }

    /// Finish the contract.
    pub fn build(self) -> Arc<Contract> {
        Arc::new(self.build_owned())
    }

    pub(crate) fn build_owned(self) -> Contract {
        Contract {
            id: self.id,
            operations: self.operations,
            extends: self.extends,
            base: self.base,
            system: false,
        }
    }
}

/// YAML/serde form of an interface contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDef {
    /// Contract identifier.
    pub id: String,
    /// Declared operations.
    #[serde(default)]
    pub operations: Vec<OperationDef>,
}

/// YAML/serde form of one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDef {
    /// Operation name.
    pub name: String,
    /// Parameter types.
    #[serde(default)]
    pub parameters: Vec<ValueType>,
    /// Return type.
    #[serde(default = "default_return")]
    pub returns: ValueType,
}

fn default_return() -> ValueType {
    ValueType::Unit
}

impl ContractDef {
    /// Build the described interface contract.
    pub fn build(self) -> Arc<Contract> {
        self.operations
            .into_iter()
            .fold(Contract::interface(self.id.as_str()), |builder, op| {
                builder.operation(
                    OperationDescriptor::new(op.name)
                        .params(op.parameters)
                        .returns(op.returns),
                )
            })
            .build()
    }
}
