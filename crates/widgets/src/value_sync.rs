//! Mirrors a source field's value into target fields.
//!
//! Each target sees every event first and may veto it. A veto of a start or
//! check event disables the sync until the next check.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use coordination::{Debounced, SequenceGuard, Timer, TimerHandle};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEventKind {
    Start,
    Check,
    Apply,
    Clear,
    Ping,
}

impl fmt::Display for SyncEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Check => "check",
            Self::Apply => "apply",
            Self::Clear => "clear",
            Self::Ping => "ping",
        };
        f.write_str(name)
    }
}

pub trait SyncTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Returning false vetoes `kind` for this target.
    fn on_event(&self, _kind: SyncEventKind, _source_value: &str) -> bool {
        true
    }

    fn set_value(&self, value: &str);

    /// Change notification after a value was written; skipped in quiet mode.
    fn notify_change(&self) {}
}

#[derive(Debug, Clone)]
pub struct ValueSyncConfig {
    pub debounce: Option<Duration>,
    /// Delay between accepting an apply or clear and writing the targets.
    pub delay: Option<Duration>,
    pub quiet: bool,
}

impl Default for ValueSyncConfig {
    fn default() -> Self {
        Self {
            debounce: Some(DEFAULT_DEBOUNCE),
            delay: None,
            quiet: false,
        }
    }
}

pub struct ValueSync {
    config: ValueSyncConfig,
    source: RwLock<String>,
    targets: Vec<Arc<dyn SyncTarget>>,
    disabled: AtomicBool,
    guard: Arc<SequenceGuard>,
    timer: Arc<dyn Timer>,
    debounced: Mutex<Option<Debounced<Option<String>>>>,
    delayed: Mutex<Option<TimerHandle>>,
}

impl ValueSync {
    pub fn new(
        config: ValueSyncConfig,
        source_value: impl Into<String>,
        targets: Vec<Arc<dyn SyncTarget>>,
        timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            source: RwLock::new(source_value.into()),
            targets,
            disabled: AtomicBool::new(false),
            guard: Arc::new(SequenceGuard::new()),
            timer,
            debounced: Mutex::new(None),
            delayed: Mutex::new(None),
        })
    }

    /// Dispatches the start event and installs the debounced apply.
    pub fn connect(self: &Arc<Self>) {
        self.process(SyncEventKind::Start, true);
        let weak = Arc::downgrade(self);
        let debounced = Debounced::with_timer(
            move |value: Option<String>| {
                if let Some(sync) = weak.upgrade() {
                    sync.apply_now(value);
                }
            },
            self.config.debounce,
            Arc::clone(&self.timer),
        );
        if let Some(previous) = self.debounced.lock().replace(debounced) {
            previous.cancel();
        }
    }

    /// Cancels the pending debounced apply and any armed delayed write.
    pub fn disconnect(&self) {
        if let Some(debounced) = self.debounced.lock().take() {
            debounced.cancel();
        }
        if let Some(pending) = self.delayed.lock().take() {
            pending.cancel();
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn source_value(&self) -> String {
        self.source.read().clone()
    }

    pub fn set_source_value(&self, value: impl Into<String>) {
        *self.source.write() = value.into();
    }

    /// Re-evaluates whether any target vetoes syncing.
    pub fn check(&self) {
        self.process(SyncEventKind::Check, true);
    }

    /// Debounced apply of `value`, or of the source value when `None` or empty.
    /// Applies immediately before [`ValueSync::connect`].
    pub fn apply(&self, value: Option<String>) {
        let debounced = self.debounced.lock().clone();
        match debounced {
            Some(debounced) => debounced.invoke(value),
            None => self.apply_now(value),
        }
    }

    pub fn apply_now(&self, value: Option<String>) {
        let value = value
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.source_value());
        let targets = self.process(SyncEventKind::Apply, false);
        self.write(targets, value, SyncEventKind::Apply);
    }

    pub fn clear(&self) {
        let targets = self.process(SyncEventKind::Clear, false);
        self.write(targets, String::new(), SyncEventKind::Clear);
    }

    /// Notifies targets without changing anything. Returns how many accepted.
    pub fn ping(&self) -> usize {
        self.process(SyncEventKind::Ping, false).len()
    }

    fn process(&self, kind: SyncEventKind, reset_disabled: bool) -> Vec<Arc<dyn SyncTarget>> {
        if (!reset_disabled && self.is_disabled()) || self.targets.is_empty() {
            return Vec::new();
        }
        let source = self.source_value();
        let accepted: Vec<_> = self
            .targets
            .iter()
            .filter(|target| {
                let accepted = target.on_event(kind, &source);
                if !accepted {
                    debug!(field = target.name(), %kind, "sync: event vetoed");
                }
                accepted
            })
            .cloned()
            .collect();
        if reset_disabled {
            self.disabled
                .store(accepted.len() < self.targets.len(), Ordering::Release);
        }
        accepted
    }

    fn write(&self, targets: Vec<Arc<dyn SyncTarget>>, value: String, kind: SyncEventKind) {
        if targets.is_empty() {
            return;
        }
        let ticket = self.guard.next();
        let quiet = self.config.quiet;
        let Some(delay) = self.config.delay.filter(|delay| !delay.is_zero()) else {
            write_targets(&targets, &value, quiet);
            return;
        };

        let guard = Arc::clone(&self.guard);
        let pending = self.timer.after(
            delay,
            Box::new(move || {
                if !guard.is_latest(ticket) {
                    debug!(%ticket, %kind, "sync: delayed write superseded");
                    return;
                }
                write_targets(&targets, &value, quiet);
            }),
        );
        if let Some(previous) = self.delayed.lock().replace(pending) {
            previous.cancel();
        }
    }
}

fn write_targets(targets: &[Arc<dyn SyncTarget>], value: &str, quiet: bool) {
    for target in targets {
        target.set_value(value);
        if !quiet {
            target.notify_change();
        }
    }
}

#[cfg(test)]
#[path = "tests/value_sync_tests.rs"]
mod tests;
