//! Reactive cells for field state.
//!
//! This module provides the change-tracking primitives the field engine is
//! built on:
//!
//! - [`Observable`]: A shared, version-tracked value with interceptors
//!   (pre-commit) and observers (post-commit).
//! - [`Subscription`]: RAII guard that detaches an observer or interceptor on drop.
//! - [`Computed`]: A memoized value derived from whatever cells it read during
//!   its last evaluation.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Arc<RwLock<..>>` so handles are cheap to clone and can
//! be captured by `Send + Sync` callbacks. Reads performed while a `Computed`
//! evaluates are recorded in a thread-local frame together with the version
//! observed; a `Computed` is stale as soon as any recorded source reports a
//! different version.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per write that changes the value.
//! 2. Interceptors run in registration order before the write; observers run in
//!    registration order after it, with no lock held.
//! 3. Writing a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. `Computed::get()` never returns a stale value.

pub mod computed;
pub mod observable;
mod tracking;

pub use computed::Computed;
pub use observable::{Change, Observable, Subscription};
pub use tracking::untracked;
