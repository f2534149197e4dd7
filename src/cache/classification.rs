//! Classification cache: memoized first-match resolution per operation.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::compute::{CacheStats, ComputeCache};
use super::keys::{ClassMethodCacheKey, ProxyShape};
use crate::classification::{Classification, ClassificationSet, Resolution};
use crate::contract::OperationDescriptor;

/// Entries retained before the first sweep of dropped lists.
const MIN_SWEEP_THRESHOLD: usize = 64;

#[derive(Clone)]
struct CachedResolution {
    resolution: Resolution,
    list: Weak<[Classification]>,
}

/// Memoizes which classification services an operation, so only the first
/// call of each operation runs the matchers.
///
/// Entries are keyed on the classification list's id. Once every clone of a
/// list is dropped its id can never be looked up again, so its entries are
/// swept whenever the cache has doubled since the last sweep.
pub struct ClassificationCache {
    entries: ComputeCache<ClassMethodCacheKey, CachedResolution>,
    min_sweep: usize,
    next_sweep: AtomicUsize,
    log_resolutions: bool,
}

impl ClassificationCache {
    /// Create an empty cache.
    pub fn new(capacity: usize, log_resolutions: bool) -> Self {
        let min_sweep = capacity.max(MIN_SWEEP_THRESHOLD);
        Self {
            entries: ComputeCache::with_capacity("classification", capacity),
            min_sweep,
            next_sweep: AtomicUsize::new(min_sweep),
            log_resolutions,
        }
    }

    /// Resolve `operation` under `classifications` for proxies of `shape`.
    /// Unresolved outcomes are cached too.
    pub fn resolve(
        &self,
        shape: &Arc<ProxyShape>,
        classifications: &ClassificationSet,
        operation: &Arc<OperationDescriptor>,
    ) -> Resolution {
        let key = ClassMethodCacheKey {
            shape: shape.clone(),
            classifications_id: classifications.id(),
            operation: operation.clone(),
        };
        self.entries
            .get_or_compute(key, |key| {
                self.sweep_if_grown();
                let resolution = classifications.classify(&key.operation);
                if self.log_resolutions {
                    match &resolution {
                        Resolution::Classified(resolved) => log::trace!(
                            "{} -> classification #{} `{}`",
                            key.operation,
                            resolved.index(),
                            resolved.classification().description()
                        ),
                        Resolution::Unresolved => log::trace!("{} -> unresolved", key.operation),
                    }
                }
                CachedResolution {
                    resolution,
                    list: classifications.downgrade(),
                }
            })
            .resolution
    }

    fn sweep_if_grown(&self) {
        if self.entries.len() < self.next_sweep.load(Ordering::Relaxed) {
            return;
        }
        let removed = self
            .entries
            .retain(|_, cached| cached.list.strong_count() > 0);
        let live = self.entries.len();
        self.next_sweep
            .store(self.min_sweep.max(live * 2), Ordering::Relaxed);
        log::debug!(
            "Swept {} classification(s) of dropped lists, {} retained",
            removed,
            live
        );
    }

    /// Drop every memoized resolution.
    pub fn clear(&self) -> usize {
        let removed = self.entries.clear();
        self.next_sweep.store(self.min_sweep, Ordering::Relaxed);
        removed
    }

    /// Number of memoized resolutions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

impl fmt::Debug for ClassificationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationCache")
            .field("entries", &self.entries.len())
            .field("next_sweep", &self.next_sweep.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{MethodMatcher, PredicateClassification};
    use crate::contract::{ContractId, ValueType};
    use serde_json::Value;

    fn counting_set(counter: Arc<AtomicUsize>) -> ClassificationSet {
        ClassificationSet::new([PredicateClassification::new(
            "counted",
            MethodMatcher::predicate(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
            |_| Ok(Value::Null),
        )
        .into()])
    }

    fn shape() -> Arc<ProxyShape> {
        Arc::new(ProxyShape {
            contracts: vec![ContractId::new("Greeter")],
            constructor_types: vec![],
        })
    }

    #[test]
    fn test_matchers_run_once_per_operation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let set = counting_set(counter.clone());
        let cache = ClassificationCache::new(8, true);
        let op = Arc::new(OperationDescriptor::new("greet").param(ValueType::String));
        for _ in 0..5 {
            assert!(cache.resolve(&shape(), &set, &op).is_classified());
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 4);
    }

    #[test]
    fn test_distinct_lists_do_not_share_entries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = counting_set(counter.clone());
        let second = counting_set(counter.clone());
        let cache = ClassificationCache::new(8, false);
        let op = Arc::new(OperationDescriptor::new("greet"));
        cache.resolve(&shape(), &first, &op);
        cache.resolve(&shape(), &second, &op);
        cache.resolve(&shape(), &first.clone(), &op);
        assert_eq!(cache.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_forces_reclassification() {
        let counter = Arc::new(AtomicUsize::new(0));
        let set = counting_set(counter.clone());
        let cache = ClassificationCache::new(8, false);
        let op = Arc::new(OperationDescriptor::new("greet"));
        cache.resolve(&shape(), &set, &op);
        assert_eq!(cache.clear(), 1);
        cache.resolve(&shape(), &set, &op);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_lists_are_swept() {
        let live_counter = Arc::new(AtomicUsize::new(0));
        let live = counting_set(live_counter.clone());
        let cache = ClassificationCache::new(8, false);
        let op = Arc::new(OperationDescriptor::new("greet"));
        cache.resolve(&shape(), &live, &op);

        for _ in 0..10 * MIN_SWEEP_THRESHOLD {
            let transient = counting_set(Arc::new(AtomicUsize::new(0)));
            assert!(cache.resolve(&shape(), &transient, &op).is_classified());
        }
        assert!(cache.len() <= MIN_SWEEP_THRESHOLD + 1);

        cache.resolve(&shape(), &live, &op);
        assert_eq!(live_counter.load(Ordering::SeqCst), 1);
    }
}
