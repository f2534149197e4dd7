//! Contracts the engine adds to proxies on its own.

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::capability::Contract;
use super::descriptor::{ContractId, OperationDescriptor};
use super::value_type::ValueType;

/// Identifier of the state accessor contract.
pub const STATE_ACCESSOR_ID: &str = "proxycian.ProxyStateAccessor";
/// Identifier of the transferable-state marker contract.
pub const SERIALIZABLE_PROXY_ID: &str = "proxycian.SerializableProxy";
/// Operation of the state accessor contract.
pub const GET_PROXY_STATE: &str = "get_proxy_state";
/// Externalize operation of the transferable-state marker.
pub const WRITE_REPLACE: &str = "write_replace";

/// Operation names reserved for system contracts.
pub const SYSTEM_OPERATIONS: &[&str] = &[GET_PROXY_STATE, WRITE_REPLACE];

static STATE_ACCESSOR: Lazy<Arc<Contract>> = Lazy::new(|| {
    Arc::new(
        Contract::interface(STATE_ACCESSOR_ID)
            .operation(OperationDescriptor::new(GET_PROXY_STATE).returns(ValueType::Any))
            .build_owned()
            .mark_system(),
    )
});

static SERIALIZABLE_PROXY: Lazy<Arc<Contract>> = Lazy::new(|| {
    Arc::new(
        Contract::interface(SERIALIZABLE_PROXY_ID)
            .operation(OperationDescriptor::new(WRITE_REPLACE).returns(ValueType::Object))
            .build_owned()
            .mark_system(),
    )
});

/// Hidden contract appended to every compiled specification. Its single
/// operation returns the bound proxy state and bypasses classification.
pub fn state_accessor() -> Arc<Contract> {
    STATE_ACCESSOR.clone()
}

/// Marker contract of proxies whose state can be externalized.
pub fn serializable_proxy() -> Arc<Contract> {
    SERIALIZABLE_PROXY.clone()
}

/// Whether `id` names one of the system contracts.
pub fn is_system_contract(id: &ContractId) -> bool {
    matches!(id.as_str(), STATE_ACCESSOR_ID | SERIALIZABLE_PROXY_ID)
}

/// Whether `name` is reserved for a system contract operation.
pub fn is_system_operation(name: &str) -> bool {
    SYSTEM_OPERATIONS.contains(&name)
}
