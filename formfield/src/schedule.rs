//! Deferred work for a form: microtasks and debounced calls.
//!
//! Nothing here spawns threads or tasks. Microtasks run when the outermost
//! [`Scheduler::action`] returns. Debounced calls run when the owner drives the
//! clock with [`Scheduler::run_due`], [`Scheduler::settle`] or the async
//! [`Scheduler::drain`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::trace;
use tokio::time::{Instant, sleep_until};

use crate::options::DebounceOptions;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

struct Timer {
    deadline: Instant,
    started: Instant,
    pending: bool,
    trailing: bool,
    task: Option<Task>,
}

#[derive(Default)]
struct Queues {
    microtasks: VecDeque<Task>,
    timers: BTreeMap<String, Timer>,
}

/// Microtask queue plus keyed debounce timers.
#[derive(Default)]
pub struct Scheduler {
    queues: Mutex<Queues>,
    depth: AtomicUsize,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("depth", &self.depth.load(Ordering::SeqCst))
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}

/// Decrements the action depth even if the action panics.
struct ActionGuard<'a>(&'a AtomicUsize);

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Scheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as an action. Microtasks queued inside run once the outermost
    /// action returns.
    pub fn action<R>(&self, f: impl FnOnce() -> R) -> R {
        let result = {
            self.depth.fetch_add(1, Ordering::SeqCst);
            let _guard = ActionGuard(&self.depth);
            f()
        };
        if self.depth.load(Ordering::SeqCst) == 0 {
            self.flush();
        }
        result
    }

    /// Whether an action is in progress on this thread of control.
    pub fn in_action(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Queue a microtask.
    pub fn defer(&self, task: impl FnOnce() + Send + 'static) {
        if let Ok(mut queues) = self.queues.lock() {
            queues.microtasks.push_back(Box::new(task));
        }
    }

    /// Run queued microtasks, including ones queued while flushing.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self
                .queues
                .lock()
                .ok()
                .and_then(|mut queues| queues.microtasks.pop_front());
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Debounce `task` under `key`.
    ///
    /// A call made while a timer is pending replaces the pending task and
    /// pushes the deadline back by `wait` (capped by `max_wait`). With
    /// `leading`, the first call of a burst runs as a microtask.
    pub fn debounce(
        &self,
        key: &str,
        wait: Duration,
        options: &DebounceOptions,
        task: impl FnOnce() + Send + 'static,
    ) {
        let now = Instant::now();
        let Ok(mut queues) = self.queues.lock() else {
            return;
        };

        match queues.timers.get_mut(key) {
            Some(timer) => {
                let mut deadline = now + wait;
                if let Some(max_wait) = options.max_wait {
                    deadline = deadline.min(timer.started + Duration::from_millis(max_wait));
                }
                timer.deadline = deadline;
                timer.pending = true;
                timer.task = Some(Box::new(task));
                trace!("debounce '{key}' superseded");
            }
            None => {
                let mut timer = Timer {
                    deadline: now + wait,
                    started: now,
                    pending: false,
                    trailing: options.trailing,
                    task: None,
                };
                if options.leading {
                    queues.microtasks.push_back(Box::new(task));
                } else {
                    timer.pending = true;
                    timer.task = Some(Box::new(task));
                }
                queues.timers.insert(key.to_string(), timer);
                trace!("debounce '{key}' scheduled");
            }
        }
    }

    /// Drop the timer for `key` without running it.
    pub fn cancel(&self, key: &str) -> bool {
        self.queues
            .lock()
            .map(|mut queues| queues.timers.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Number of timers not yet fired.
    pub fn pending_timers(&self) -> usize {
        self.queues.lock().map(|q| q.timers.len()).unwrap_or(0)
    }

    /// Earliest timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queues
            .lock()
            .ok()
            .and_then(|queues| queues.timers.values().map(|t| t.deadline).min())
    }

    /// Fire every timer whose deadline is at or before `now`.
    ///
    /// Returns the number of calls made.
    pub fn run_due(&self, now: Instant) -> usize {
        self.fire(|timer| timer.deadline <= now)
    }

    /// Flush microtasks and fire every timer regardless of its deadline, until
    /// nothing is left.
    pub fn settle(&self) -> usize {
        let mut ran = self.flush();
        // Validation never reschedules itself, so this converges quickly.
        for _ in 0..64 {
            let fired = self.fire(|_| true);
            let flushed = self.flush();
            ran += fired + flushed;
            if fired == 0 && flushed == 0 && self.pending_timers() == 0 {
                break;
            }
        }
        ran
    }

    /// Sleep until each deadline in turn and fire what is due, until no timer
    /// remains.
    pub async fn drain(&self) -> usize {
        let mut ran = self.flush();
        while let Some(deadline) = self.next_deadline() {
            sleep_until(deadline).await;
            ran += self.run_due(Instant::now());
            ran += self.flush();
        }
        ran
    }

    /// Drop everything without running it.
    pub fn clear(&self) {
        if let Ok(mut queues) = self.queues.lock() {
            queues.microtasks.clear();
            queues.timers.clear();
        }
    }

    fn fire(&self, due: impl Fn(&Timer) -> bool) -> usize {
        let expired: Vec<Timer> = match self.queues.lock() {
            Ok(mut queues) => {
                let keys: Vec<String> = queues
                    .timers
                    .iter()
                    .filter(|(_, timer)| due(timer))
                    .map(|(key, _)| key.clone())
                    .collect();
                keys.iter()
                    .filter_map(|key| queues.timers.remove(key))
                    .collect()
            }
            Err(_) => return 0,
        };

        let mut ran = 0;
        for timer in expired {
            if let (true, true, Some(task)) = (timer.trailing, timer.pending, timer.task) {
                self.action(task);
                ran += 1;
            }
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    fn counter() -> (Arc<AtomicU32>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let hits = Arc::new(AtomicU32::new(0));
        let make = {
            let hits = Arc::clone(&hits);
            move || {
                let hits = Arc::clone(&hits);
                Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (hits, make)
    }

    #[test]
    fn test_microtasks_run_after_outermost_action() {
        let scheduler = Scheduler::new();
        let (hits, make) = counter();
        scheduler.action(|| {
            scheduler.action(|| scheduler.defer(make()));
            assert_eq!(hits.load(Ordering::SeqCst), 0);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_call() {
        let scheduler = Scheduler::new();
        let (hits, make) = counter();
        let options = DebounceOptions::default();
        for _ in 0..5 {
            scheduler.debounce("field", Duration::from_millis(100), &options, make());
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        assert_eq!(scheduler.run_due(Instant::now()), 0);
        assert_eq!(scheduler.drain().await, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_edge_runs_immediately() {
        let scheduler = Scheduler::new();
        let (hits, make) = counter();
        let options = DebounceOptions {
            leading: true,
            trailing: false,
            max_wait: None,
        };
        scheduler.action(|| {
            scheduler.debounce("field", Duration::from_millis(50), &options, make());
            scheduler.debounce("field", Duration::from_millis(50), &options, make());
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        scheduler.drain().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_caps_the_delay() {
        let scheduler = Scheduler::new();
        let (hits, make) = counter();
        let options = DebounceOptions {
            max_wait: Some(150),
            ..Default::default()
        };
        for _ in 0..4 {
            scheduler.debounce("field", Duration::from_millis(100), &options, make());
            tokio::time::advance(Duration::from_millis(60)).await;
        }
        // 240ms elapsed; the cap at 150ms has passed
        assert_eq!(scheduler.run_due(Instant::now()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
