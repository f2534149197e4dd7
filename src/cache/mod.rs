//! # Caches
//!
//! Process-scoped memo tables owned by a [`ProxyEngine`](crate::engine::ProxyEngine):
//!
//! - [`ClassificationCache`]: (proxy shape, classification list,
//!   operation) to resolved classification. Entries of dropped lists are
//!   swept as the cache grows.
//! - [`SpecificationCache`]: capability shape to compiled specification and
//!   its materializer.
//! - [`ConstructorCache`]: base-type and specification constructors.
//!
//! All three share [`ComputeCache`] semantics: lock-free reads, compute
//! outside any lock, first insert wins, failures are never retained, and
//! `clear()` only affects future lookups.

pub mod classification;
pub mod compute;
pub mod keys;
pub mod specification;

pub use classification::ClassificationCache;
pub use compute::{CacheStats, ComputeCache};
pub use keys::{
    ClassMethodCacheKey, ConstructorCacheKey, ConstructorOwner, ProxyShape, SpecificationKey,
};
pub use specification::{ConstructorCache, SpecificationCache};
