//! At-most-one in-flight operation per subject.
//!
//! Triggers that arrive while the gate is held are dropped, not queued. Every
//! call site must have a re-evaluation source (a periodic recheck or the next
//! user trigger) that retries once the gate clears.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct BusyGate {
    busy: Arc<AtomicBool>,
    subject: &'static str,
}

impl BusyGate {
    pub fn new(subject: &'static str) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            subject,
        }
    }

    /// Marks the subject busy, or returns `None` if an operation is already running.
    pub fn try_begin(&self) -> Option<GatePass> {
        match self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(GatePass {
                busy: Arc::clone(&self.busy),
                subject: self.subject,
            }),
            Err(_) => {
                debug!(subject = self.subject, "gate: busy; trigger dropped");
                None
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the gate is held. The gate clears when the pass is dropped.
#[must_use = "dropping the pass immediately releases the gate"]
#[derive(Debug)]
pub struct GatePass {
    busy: Arc<AtomicBool>,
    subject: &'static str,
}

impl GatePass {
    pub fn end(self) {}
}

impl Drop for GatePass {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!(subject = self.subject, "gate: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_refused_until_end() {
        let gate = BusyGate::new("test");
        let pass = gate.try_begin().expect("gate starts open");
        assert!(gate.is_busy());
        assert!(gate.try_begin().is_none());

        pass.end();
        assert!(!gate.is_busy());
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn pass_releases_on_error_paths() {
        fn guarded(gate: &BusyGate) -> Result<(), &'static str> {
            let _pass = gate.try_begin().ok_or("busy")?;
            Err("backend failed")
        }

        let gate = BusyGate::new("test");
        assert_eq!(guarded(&gate), Err("backend failed"));
        assert!(!gate.is_busy());
    }

    #[test]
    fn pass_releases_on_panic() {
        let gate = BusyGate::new("test");
        let inner = gate.clone();
        let result = std::panic::catch_unwind(move || {
            let _pass = inner.try_begin().expect("open");
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn independent_gates_do_not_interfere() {
        let preview = BusyGate::new("preview");
        let search = BusyGate::new("search");
        let _held = preview.try_begin().expect("open");
        assert!(search.try_begin().is_some());
    }

    #[tokio::test]
    async fn pass_can_move_into_a_task() {
        let gate = BusyGate::new("test");
        let pass = gate.try_begin().expect("open");
        tokio::spawn(async move {
            let _pass = pass;
        })
        .await
        .expect("task");
        assert!(!gate.is_busy());
    }
}
