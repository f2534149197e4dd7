//! Ordered, deduplicated capability sets.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::capability::Contract;
use super::descriptor::ContractId;
use super::system::is_system_operation;
use crate::error::{ProxyError, ProxyResult};

/// Ordered, deduplicated list of contracts a proxy must satisfy.
///
/// If a base behavior is present it is the first element. Equality and
/// hashing are structural over the ordered identifier list, which is what
/// the specification cache keys on.
#[derive(Clone)]
pub struct CapabilitySet {
    contracts: Vec<Arc<Contract>>,
}

impl CapabilitySet {
    /// Validate and normalize a capability set.
    ///
    /// Repeated identifiers are dropped (first occurrence kept). Fails when
    /// the set is empty, when a base behavior is not in first position, when
    /// a later contract redeclares one of the base behavior's own
    /// operations, or when a user contract declares an operation reserved
    /// for system contracts.
    pub fn new(contracts: impl IntoIterator<Item = Arc<Contract>>) -> ProxyResult<Self> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for contract in contracts {
            if seen.insert(contract.id().clone()) {
                normalized.push(contract);
            } else {
                log::warn!(
                    "Dropping duplicate contract `{}` from capability set",
                    contract.id()
                );
            }
        }

        if normalized.is_empty() {
            return Err(ProxyError::InvalidCapabilitySet(
                "at least one contract is required".to_string(),
            ));
        }
        if let Some(misplaced) = normalized.iter().skip(1).find(|c| c.is_base_behavior()) {
            return Err(ProxyError::InvalidCapabilitySet(format!(
                "base behavior `{}` must be the first element",
                misplaced.id()
            )));
        }
        if normalized[0].is_base_behavior() {
            let base_keys: HashSet<_> = normalized[0]
                .operations()
                .iter()
                .map(|op| op.key())
                .collect();
            for contract in normalized.iter().skip(1) {
                if let Some(op) = contract
                    .all_operations()
                    .into_iter()
                    .find(|op| base_keys.contains(&op.key()))
                {
                    return Err(ProxyError::InvalidCapabilitySet(format!(
                        "`{}` redeclares `{}` already declared by base behavior `{}`",
                        contract.id(),
                        op.key(),
                        normalized[0].id()
                    )));
                }
            }
        }

        for contract in normalized.iter().filter(|c| !c.is_system()) {
            if let Some(op) = contract
                .all_operations()
                .into_iter()
                .find(|op| is_system_operation(op.name()))
            {
                return Err(ProxyError::InvalidCapabilitySet(format!(
                    "`{}` declares `{}`, which is reserved for system contracts",
                    contract.id(),
                    op.name()
                )));
            }
        }

        Ok(Self {
            contracts: normalized,
        })
    }

    /// Convenience for a set of a single contract.
    pub fn of(contract: Arc<Contract>) -> ProxyResult<Self> {
        Self::new([contract])
    }

    /// Contracts in order.
    pub fn contracts(&self) -> &[Arc<Contract>] {
        &self.contracts
    }

    /// Ordered identifier list (the structural identity).
    pub fn ids(&self) -> Vec<ContractId> {
        self.contracts.iter().map(|c| c.id().clone()).collect()
    }

    /// The base behavior, if the set starts with one.
    pub fn base(&self) -> Option<&Arc<Contract>> {
        self.contracts.first().filter(|c| c.is_base_behavior())
    }

    /// Pure contracts, i.e. everything after an optional base behavior.
    pub fn interfaces(&self) -> &[Arc<Contract>] {
        match self.base() {
            Some(_) => &self.contracts[1..],
            None => &self.contracts,
        }
    }

    /// First contract, used to name generated specifications.
    pub fn primary(&self) -> &Arc<Contract> {
        &self.contracts[0]
    }

    /// Whether a contract with this id is part of the set.
    pub fn contains(&self, id: &ContractId) -> bool {
        self.contracts.iter().any(|c| c.id() == id)
    }

    /// A new set with `contract` appended (no-op if already present).
    pub fn with(&self, contract: Arc<Contract>) -> ProxyResult<Self> {
        Self::new(self.contracts.iter().cloned().chain([contract]))
    }

    /// A new set without the listed contracts.
    pub fn without(&self, excluded: &[ContractId]) -> ProxyResult<Self> {
        Self::new(
            self.contracts
                .iter()
                .filter(|c| !excluded.contains(c.id()))
                .cloned(),
        )
    }

    /// Number of contracts.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Always false for a validated set; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl PartialEq for CapabilitySet {
    fn eq(&self, other: &Self) -> bool {
        self.contracts.len() == other.contracts.len()
            && self
                .contracts
                .iter()
                .zip(&other.contracts)
                .all(|(a, b)| a.id() == b.id())
    }
}

impl Eq for CapabilitySet {}

impl Hash for CapabilitySet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for contract in &self.contracts {
            contract.id().hash(state);
        }
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{OperationDescriptor, ValueType};

    fn iface(id: &str, op: &str) -> Arc<Contract> {
        Contract::interface(id)
            .operation(OperationDescriptor::new(op).returns(ValueType::String))
            .build()
    }

    #[test]
    fn test_deduplicates_preserving_order() {
        let a = iface("A", "a");
        let b = iface("B", "b");
        let set = CapabilitySet::new([a.clone(), b.clone(), a.clone()]).unwrap();
        assert_eq!(set.ids(), vec![ContractId::new("A"), ContractId::new("B")]);
    }

    #[test]
    fn test_structural_equality() {
        let first = CapabilitySet::new([iface("A", "a"), iface("B", "b")]).unwrap();
        let second = CapabilitySet::new([iface("A", "x"), iface("B", "y")]).unwrap();
        let reversed = CapabilitySet::new([iface("B", "b"), iface("A", "a")]).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, reversed);
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(
            CapabilitySet::new(Vec::new()),
            Err(ProxyError::InvalidCapabilitySet(_))
        ));
    }

    #[test]
    fn test_base_behavior_must_be_first() {
        let base = Contract::base_behavior("Base").build();
        let ok = CapabilitySet::new([base.clone(), iface("A", "a")]).unwrap();
        assert_eq!(ok.base().unwrap().id().as_str(), "Base");
        assert_eq!(ok.interfaces().len(), 1);

        let err = CapabilitySet::new([iface("A", "a"), base]).unwrap_err();
        assert!(err.to_string().contains("must be the first element"));
    }

    #[test]
    fn test_interfaces_may_not_redeclare_base_operations() {
        let base = Contract::base_behavior("Base")
            .operation(OperationDescriptor::new("a").returns(ValueType::String))
            .build();
        let err = CapabilitySet::new([base, iface("A", "a")]).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidCapabilitySet(_)));
    }

    #[test]
    fn test_user_contracts_may_not_declare_system_operations() {
        let err = CapabilitySet::of(iface("Snapshot", "write_replace")).unwrap_err();
        assert!(err.to_string().contains("reserved for system contracts"));

        let set = CapabilitySet::of(iface("A", "a")).unwrap();
        assert!(set.with(crate::contract::system::serializable_proxy()).is_ok());
    }

    #[test]
    fn test_with_and_without() {
        let set = CapabilitySet::of(iface("A", "a")).unwrap();
        let extended = set.with(iface("B", "b")).unwrap();
        assert!(extended.contains(&ContractId::new("B")));
        let reduced = extended.without(&[ContractId::new("B")]).unwrap();
        assert_eq!(reduced, set);
    }
}
