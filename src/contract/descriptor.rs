//! Operation descriptors: the static description of one interceptable
//! operation (name, parameter types, return type, declaring contract).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value_type::{render_types, ValueType};

/// Identifier of a capability contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    /// Create a new contract identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment (`a.b.Greeter` -> `Greeter`).
    pub fn simple_name(&self) -> &str {
        self.0.rsplit(['.', ':']).next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Overload-resolving key of an operation: name plus parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    /// Operation name.
    pub name: String,
    /// Parameter types in declaration order.
    pub parameters: Vec<ValueType>,
}

impl OperationKey {
    /// Create a new key.
    pub fn new(name: impl Into<String>, parameters: Vec<ValueType>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, render_types(&self.parameters))
    }
}

/// Static description of an interceptable operation.
///
/// Descriptors are fixed once their contract is built, which is what makes
/// classification results cacheable per descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationDescriptor {
    name: String,
    parameters: Vec<ValueType>,
    return_type: ValueType,
    declaring_contract: ContractId,
}

impl OperationDescriptor {
    /// Start describing an operation with no parameters returning `unit`.
    ///
    /// The declaring contract is filled in when the descriptor is added to a
    /// contract.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: ValueType::Unit,
            declaring_contract: ContractId::new(""),
        }
    }

    /// Append a parameter type.
    pub fn param(mut self, value_type: ValueType) -> Self {
        self.parameters.push(value_type);
        self
    }

    /// Replace the parameter list.
    pub fn params(mut self, parameters: impl IntoIterator<Item = ValueType>) -> Self {
        self.parameters = parameters.into_iter().collect();
        self
    }

    /// Set the return type.
    pub fn returns(mut self, return_type: ValueType) -> Self {
        self.return_type = return_type;
        self
    }

    pub(crate) fn declared_by(mut self, contract: ContractId) -> Self {
        self.declaring_contract = contract;
        self
    }

    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter types.
    pub fn parameters(&self) -> &[ValueType] {
        &self.parameters
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Return type.
    pub fn return_type(&self) -> &ValueType {
        &self.return_type
    }

    /// Contract that declares this operation.
    pub fn declaring_contract(&self) -> &ContractId {
        &self.declaring_contract
    }

    /// Overload-resolving key.
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.name.clone(), self.parameters.clone())
    }

    /// Render as `name(a, b) -> r`.
    pub fn signature(&self) -> String {
        format!(
            "{}({}) -> {}",
            self.name,
            render_types(&self.parameters),
            self.return_type
        )
    }

    /// Whether every argument is admitted by the matching parameter type.
    pub fn accepts(&self, args: &[serde_json::Value]) -> bool {
        args.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .zip(args)
                .all(|(ty, value)| ty.accepts(value))
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_contract, self.signature())
    }
}
