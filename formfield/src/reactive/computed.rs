use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::tracking::{self, Dependency, Tracked};

struct Slot<T> {
    cached: Option<T>,
    deps: Vec<Dependency>,
}

struct Inner<T> {
    compute: Box<dyn Fn() -> T + Send + Sync>,
    slot: Mutex<Slot<T>>,
    revision: AtomicU64,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Inner<T> {
    fn is_fresh(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.cached.is_some() && !slot.deps.iter().any(Dependency::is_stale)
    }

    /// Recompute if any dependency moved. The lock is not held while the
    /// compute function runs.
    fn refresh(&self) {
        if self.is_fresh() {
            return;
        }
        let (value, deps) = tracking::collect(|| (self.compute)());
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if slot.cached.as_ref() != Some(&value) {
            self.revision.fetch_add(1, Ordering::SeqCst);
            slot.cached = Some(value);
        }
        slot.deps = deps;
    }

    fn cached(&self) -> Option<T> {
        self.slot
            .lock()
            .map(|slot| slot.cached.clone())
            .unwrap_or_else(|p| p.into_inner().cached.clone())
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Tracked for Inner<T> {
    fn version(&self) -> u64 {
        self.refresh();
        self.revision.load(Ordering::SeqCst)
    }
}

/// Memoized value derived from other cells.
///
/// The compute function runs lazily on the first read and again only after a
/// cell it read last time has changed. Reads of a `Computed` inside another
/// `Computed` are tracked like reads of an [`Observable`](super::Observable).
pub struct Computed<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Computed<T> {
    /// Create a computed cell. Nothing runs until the first read.
    pub fn new(compute: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                compute: Box::new(compute),
                slot: Mutex::new(Slot {
                    cached: None,
                    deps: Vec::new(),
                }),
                revision: AtomicU64::new(0),
            }),
        }
    }

    /// Current value, recomputed first if stale.
    pub fn get(&self) -> T {
        let revision = Tracked::version(&*self.inner);
        let source: Weak<dyn Tracked> = Arc::downgrade(&self.inner) as Weak<dyn Tracked>;
        tracking::record(source, revision);
        match self.inner.cached() {
            Some(value) => value,
            None => (self.inner.compute)(),
        }
    }

    /// Number of times the computed value actually changed.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    /// Whether the cached value is still current.
    pub fn is_fresh(&self) -> bool {
        self.inner.is_fresh()
    }
}

impl<T: std::fmt::Debug + Clone> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.lock().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("Computed")
            .field("cached", &slot.cached)
            .field("deps", &slot.deps.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;

    #[test]
    fn test_memoizes_until_dependency_changes() {
        let runs = Arc::new(AtomicU64::new(0));
        let source = Observable::new(2);
        let doubled = {
            let source = source.clone();
            let runs = Arc::clone(&runs);
            Computed::new(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                source.get() * 2
            })
        };

        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        source.set(5);
        assert!(!doubled.is_fresh());
        assert_eq!(doubled.get(), 10);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_chained_computed_skips_unchanged_results() {
        let source = Observable::new(3);
        let parity = {
            let source = source.clone();
            Computed::new(move || source.get() % 2)
        };
        let runs = Arc::new(AtomicU64::new(0));
        let label = {
            let parity = parity.clone();
            let runs = Arc::clone(&runs);
            Computed::new(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                if parity.get() == 0 { "even" } else { "odd" }
            })
        };

        assert_eq!(label.get(), "odd");
        source.set(5);
        assert_eq!(label.get(), "odd");
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        source.set(6);
        assert_eq!(label.get(), "even");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_untracked_reads_are_not_dependencies() {
        let tracked = Observable::new(1);
        let hidden = Observable::new(10);
        let sum = {
            let tracked = tracked.clone();
            let hidden = hidden.clone();
            Computed::new(move || tracked.get() + crate::reactive::untracked(|| hidden.get()))
        };

        assert_eq!(sum.get(), 11);
        hidden.set(20);
        assert_eq!(sum.get(), 11);
        tracked.set(2);
        assert_eq!(sum.get(), 22);
    }
}
