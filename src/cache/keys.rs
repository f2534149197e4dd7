//! Cache keys.

use std::sync::Arc;

use crate::contract::{CapabilitySet, ContractId, OperationDescriptor, ValueType};

/// Structural identity of a compiled proxy shape. Unlike a specification
/// id it is the same before and after the specification cache is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyShape {
    /// Final contract identifiers, system contracts included.
    pub contracts: Vec<ContractId>,
    /// Constructor argument types the shape was compiled for.
    pub constructor_types: Vec<ValueType>,
}

/// Key of the classification cache: which proxy shape, which
/// classification list, which operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassMethodCacheKey {
    /// Shape of the proxy being dispatched.
    pub shape: Arc<ProxyShape>,
    /// Id of the dispatcher's classification list.
    pub classifications_id: u64,
    /// The intercepted operation.
    pub operation: Arc<OperationDescriptor>,
}

/// Key of the dispatch specification cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecificationKey {
    /// Ordered contract identifiers of the capability set.
    pub contracts: Vec<ContractId>,
    /// Requested constructor argument types (empty for the default shape).
    pub constructor_types: Vec<ValueType>,
    /// Identities of cache-affecting classifications.
    pub cache_identities: Vec<String>,
}

impl SpecificationKey {
    /// Build the key for a capability set and constructor shape.
    pub fn new(
        capabilities: &CapabilitySet,
        constructor_types: &[ValueType],
        cache_identities: Vec<String>,
    ) -> Self {
        Self {
            contracts: capabilities.ids(),
            constructor_types: constructor_types.to_vec(),
            cache_identities,
        }
    }
}

/// Who a cached constructor belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstructorOwner {
    /// A base-behavior type (or the implicit default base).
    Base(ContractId),
    /// A compiled dispatch specification, by id.
    Specification(u64),
}

/// Key of the constructor cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorCacheKey {
    /// Owning type.
    pub owner: ConstructorOwner,
    /// Argument types.
    pub argument_types: Vec<ValueType>,
}

impl ConstructorCacheKey {
    /// Key for a base-behavior constructor.
    pub fn base(owner: ContractId, argument_types: &[ValueType]) -> Self {
        Self {
            owner: ConstructorOwner::Base(owner),
            argument_types: argument_types.to_vec(),
        }
    }

    /// Key for a specification constructor.
    pub fn specification(spec_id: u64, argument_types: &[ValueType]) -> Self {
        Self {
            owner: ConstructorOwner::Specification(spec_id),
            argument_types: argument_types.to_vec(),
        }
    }
}
