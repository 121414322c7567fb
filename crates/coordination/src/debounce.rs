//! Trailing-edge debounce.
//!
//! Every [`Debounced::invoke`] restarts the quiet period; only the last call of
//! an unbroken burst reaches the wrapped function, with that call's argument.
//! A missing or zero quiet period runs the function synchronously.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::trace;

use crate::timer::{Timer, TimerHandle, TokioTimer};

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

pub struct Debounced<A> {
    inner: Arc<DebounceInner<A>>,
}

struct DebounceInner<A> {
    func: Callback<A>,
    wait: Option<Duration>,
    timer: Arc<dyn Timer>,
    pending: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    generation: u64,
    handle: Option<TimerHandle>,
}

/// Wraps `func` so that bursts of calls closer together than `wait` collapse into one.
pub fn debounce<A, F>(func: F, wait: Option<Duration>) -> Debounced<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Debounced::with_timer(func, wait, Arc::new(TokioTimer))
}

impl<A: Send + 'static> Debounced<A> {
    pub fn with_timer<F>(func: F, wait: Option<Duration>, timer: Arc<dyn Timer>) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(DebounceInner {
                func: Arc::new(func),
                wait: wait.filter(|wait| !wait.is_zero()),
                timer,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    pub fn invoke(&self, args: A) {
        let Some(wait) = self.inner.wait else {
            self.cancel();
            (self.inner.func)(args);
            return;
        };

        let mut pending = self.inner.pending.lock();
        pending.generation += 1;
        let generation = pending.generation;
        if let Some(previous) = pending.handle.take() {
            trace!(generation, "debounce: quiet period restarted");
            previous.cancel();
        }

        let weak = Arc::downgrade(&self.inner);
        pending.handle = Some(self.inner.timer.after(
            wait,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.fire(generation, args);
                }
            }),
        ));
    }

    /// Discards the pending call, if any.
    pub fn cancel(&self) {
        let mut pending = self.inner.pending.lock();
        pending.generation += 1;
        if let Some(handle) = pending.handle.take() {
            trace!("debounce: pending call cancelled");
            handle.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.lock().handle.is_some()
    }

    pub fn wait(&self) -> Option<Duration> {
        self.inner.wait
    }
}

impl<A> DebounceInner<A> {
    fn fire(&self, generation: u64, args: A) {
        {
            let mut pending = self.pending.lock();
            // A newer invoke or a cancel raced the timer.
            if pending.generation != generation {
                return;
            }
            pending.handle = None;
        }
        (self.func)(args);
    }
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
