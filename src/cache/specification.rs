//! Dispatch specification and constructor caches.

use std::sync::Arc;

use super::compute::{CacheStats, ComputeCache};
use super::keys::{ConstructorCacheKey, SpecificationKey};
use crate::contract::{BaseConstructor, ContractId, ValueType};
use crate::dispatch::{CompiledSpec, ProxyConstructor};
use crate::error::ProxyResult;

/// Compiled specifications keyed by capability shape.
#[derive(Debug)]
pub struct SpecificationCache {
    entries: ComputeCache<SpecificationKey, CompiledSpec>,
}

impl SpecificationCache {
    /// Create an empty cache.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: ComputeCache::with_capacity("specification", capacity),
        }
    }

    /// Cached specification, or the result of `compile` (retained only on
    /// success).
    pub fn get_or_compile<F>(&self, key: SpecificationKey, compile: F) -> ProxyResult<CompiledSpec>
    where
        F: FnOnce(&SpecificationKey) -> ProxyResult<CompiledSpec>,
    {
        self.entries.get_or_try_compute(key, compile)
    }

    /// Drop every compiled specification.
    pub fn clear(&self) -> usize {
        self.entries.clear()
    }

    /// Number of compiled specifications.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is compiled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

/// Constructors of base types and of compiled specifications.
#[derive(Debug)]
pub struct ConstructorCache {
    base: ComputeCache<ConstructorCacheKey, BaseConstructor>,
    proxies: ComputeCache<ConstructorCacheKey, Arc<dyn ProxyConstructor>>,
}

impl ConstructorCache {
    /// Create an empty cache.
    pub fn new(capacity: usize) -> Self {
        Self {
            base: ComputeCache::with_capacity("base constructor", capacity),
            proxies: ComputeCache::with_capacity("proxy constructor", capacity),
        }
    }

    /// Base-type constructor accepting `argument_types`.
    pub fn get_or_introspect_base<F>(
        &self,
        owner: ContractId,
        argument_types: &[ValueType],
        introspect: F,
    ) -> ProxyResult<BaseConstructor>
    where
        F: FnOnce() -> ProxyResult<BaseConstructor>,
    {
        self.base
            .get_or_try_compute(ConstructorCacheKey::base(owner, argument_types), |_| introspect())
    }

    /// Specification constructor accepting `argument_types` after the fixed
    /// (dispatcher, callback, state) prefix.
    pub fn get_or_introspect_proxy<F>(
        &self,
        spec_id: u64,
        argument_types: &[ValueType],
        introspect: F,
    ) -> ProxyResult<Arc<dyn ProxyConstructor>>
    where
        F: FnOnce() -> ProxyResult<Arc<dyn ProxyConstructor>>,
    {
        self.proxies.get_or_try_compute(
            ConstructorCacheKey::specification(spec_id, argument_types),
            |_| introspect(),
        )
    }

    /// Drop every cached constructor.
    pub fn clear(&self) -> usize {
        self.base.clear() + self.proxies.clear()
    }

    /// Combined counters of both tables.
    pub fn stats(&self) -> CacheStats {
        let base = self.base.stats();
        let proxies = self.proxies.stats();
        CacheStats {
            hits: base.hits + proxies.hits,
            misses: base.misses + proxies.misses,
            entries: base.entries + proxies.entries,
        }
    }
}
