use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use super::tracking::{self, Tracked};

/// A proposed or applied change to an [`Observable`].
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    /// Value before the write.
    pub old: T,
    /// Value after the write.
    pub new: T,
}

impl<T> Change<T> {
    /// Convert both sides of the change.
    pub fn map<U>(self, f: impl Fn(T) -> U) -> Change<U> {
        Change {
            old: f(self.old),
            new: f(self.new),
        }
    }
}

type Observer<T> = Arc<dyn Fn(&Change<T>) + Send + Sync>;
type Interceptor<T> = Arc<dyn Fn(Change<T>) -> Option<Change<T>> + Send + Sync>;

struct Inner<T> {
    value: RwLock<T>,
    version: AtomicU64,
    next_id: AtomicU64,
    observers: RwLock<Vec<(u64, Observer<T>)>>,
    interceptors: RwLock<Vec<(u64, Interceptor<T>)>>,
}

/// Reactive cell with interior mutability.
///
/// `Observable<T>` uses `Arc<RwLock<T>>` internally, making it cheap to clone.
/// Clones share the same value, version and subscriber lists.
///
/// # Example
///
/// ```
/// use formfield::reactive::Observable;
///
/// let count = Observable::new(0);
/// let _sub = count.observe(|change| println!("{} -> {}", change.old, change.new));
/// count.set(1);
/// assert_eq!(count.get(), 1);
/// assert_eq!(count.version(), 1);
/// ```
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.inner.value.read().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("Observable")
            .field("value", &*value)
            .field("version", &self.inner.version.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + Send + Sync + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Observable<T> {
    /// Create a new cell with the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                observers: RwLock::new(Vec::new()),
                interceptors: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Get a clone of the current value, recording the read for any
    /// computation in progress.
    pub fn get(&self) -> T {
        let source: Weak<dyn Tracked> = Arc::downgrade(&self.inner) as Weak<dyn Tracked>;
        tracking::record(source, self.version());
        self.get_untracked()
    }

    /// Get a clone of the current value without recording the read.
    pub fn get_untracked(&self) -> T {
        self.inner
            .value
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Inspect the current value by reference (tracked).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let source: Weak<dyn Tracked> = Arc::downgrade(&self.inner) as Weak<dyn Tracked>;
        tracking::record(source, self.version());
        let guard = self.inner.value.read().unwrap_or_else(|p| p.into_inner());
        f(&guard)
    }

    /// Number of committed changes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Propose a new value.
    ///
    /// Interceptors may rewrite or veto the change. Returns `true` when a
    /// change was committed.
    pub fn set(&self, value: T) -> bool {
        let old = self.get_untracked();
        let mut change = Change { old, new: value };

        let interceptors: Vec<Interceptor<T>> = self
            .inner
            .interceptors
            .read()
            .map(|list| list.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default();
        for interceptor in interceptors {
            match interceptor(change) {
                Some(next) => change = next,
                None => return false,
            }
        }

        if change.new == change.old {
            return false;
        }

        if let Ok(mut guard) = self.inner.value.write() {
            *guard = change.new.clone();
        }
        self.inner.version.fetch_add(1, Ordering::SeqCst);

        let observers: Vec<Observer<T>> = self
            .inner
            .observers
            .read()
            .map(|list| list.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default();
        for observer in observers {
            observer(&change);
        }
        true
    }

    /// Update the value using a closure on a copy of the current value.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get_untracked();
        f(&mut next);
        self.set(next)
    }

    /// Register a post-commit observer.
    pub fn observe(&self, f: impl Fn(&Change<T>) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut list) = self.inner.observers.write() {
            list.push((id, Arc::new(f)));
        }
        Subscription::new(Arc::downgrade(&self.inner) as Weak<dyn Detach>, id)
    }

    /// Register a pre-commit interceptor.
    ///
    /// The returned change is what gets applied; `None` vetoes the write.
    pub fn intercept(
        &self,
        f: impl Fn(Change<T>) -> Option<Change<T>> + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut list) = self.inner.interceptors.write() {
            list.push((id, Arc::new(f)));
        }
        Subscription::new(Arc::downgrade(&self.inner) as Weak<dyn Detach>, id)
    }

    /// Number of attached observers and interceptors.
    pub fn subscriber_count(&self) -> usize {
        let observers = self.inner.observers.read().map(|l| l.len()).unwrap_or(0);
        let interceptors = self.inner.interceptors.read().map(|l| l.len()).unwrap_or(0);
        observers + interceptors
    }
}

impl<T: Send + Sync> Tracked for Inner<T> {
    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: Send + Sync> Detach for Inner<T> {
    fn detach(&self, id: u64) {
        if let Ok(mut list) = self.observers.write() {
            list.retain(|(sid, _)| *sid != id);
        }
        if let Ok(mut list) = self.interceptors.write() {
            list.retain(|(sid, _)| *sid != id);
        }
    }
}

/// RAII guard for an observer or interceptor.
///
/// Dropping the guard detaches the callback. A guard whose cell is already
/// gone is inert.
#[must_use = "dropping a Subscription detaches the callback"]
pub struct Subscription {
    source: Weak<dyn Detach>,
    id: u64,
}

impl Subscription {
    fn new(source: Weak<dyn Detach>, id: u64) -> Self {
        Self { source, id }
    }

    /// Detach now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the observed cell is still alive.
    pub fn is_active(&self) -> bool {
        self.source.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
