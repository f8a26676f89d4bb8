//! Dependency tracking for computed cells.

use std::cell::RefCell;
use std::sync::Weak;

/// A source that can report its current version.
pub(crate) trait Tracked: Send + Sync {
    /// Current version. Computed sources refresh themselves first.
    fn version(&self) -> u64;
}

/// A source read during an evaluation, with the version seen at that time.
pub(crate) struct Dependency {
    source: Weak<dyn Tracked>,
    seen: u64,
}

impl Dependency {
    /// A dropped source counts as changed.
    pub(crate) fn is_stale(&self) -> bool {
        self.source
            .upgrade()
            .is_none_or(|source| source.version() != self.seen)
    }
}

thread_local! {
    /// `None` frames suppress recording (see [`untracked`]).
    static FRAMES: RefCell<Vec<Option<Vec<Dependency>>>> = const { RefCell::new(Vec::new()) };
}

/// Record a read against the innermost tracking frame, if any.
pub(crate) fn record(source: Weak<dyn Tracked>, seen: u64) {
    FRAMES.with(|frames| {
        if let Some(Some(deps)) = frames.borrow_mut().last_mut() {
            deps.push(Dependency { source, seen });
        }
    });
}

/// Run `f` in a fresh frame and return what it read.
pub(crate) fn collect<R>(f: impl FnOnce() -> R) -> (R, Vec<Dependency>) {
    FRAMES.with(|frames| frames.borrow_mut().push(Some(Vec::new())));
    let result = f();
    let deps = FRAMES
        .with(|frames| frames.borrow_mut().pop())
        .flatten()
        .unwrap_or_default();
    (result, deps)
}

/// Run `f` without recording any reads into the enclosing computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    FRAMES.with(|frames| frames.borrow_mut().push(None));
    let result = f();
    FRAMES.with(|frames| frames.borrow_mut().pop());
    result
}
