//! # Capability contracts
//!
//! Data model for "what a proxy must implement": value types, operation
//! descriptors, contracts (pure interfaces or base behaviors with
//! constructors and default implementations) and validated capability sets.
//!
//! Contracts are plain data. They can be built in code with
//! [`Contract::interface`] / [`Contract::base_behavior`] or declared in YAML
//! with [`Contract::from_yaml`].

pub mod capability;
pub mod capability_set;
pub mod descriptor;
pub mod system;
pub mod value_type;

pub use capability::{
    BaseBehavior, BaseConstructor, BaseConstructorFn, Contract, ContractBuilder, ContractDef,
    DefaultMethodFn, OperationDef,
};
pub use capability_set::CapabilitySet;
pub use descriptor::{ContractId, OperationDescriptor, OperationKey};
pub use value_type::{TypeName, ValueType};
