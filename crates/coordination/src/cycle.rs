use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

/// Phase of one logical update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Scheduled,
    InFlight,
    Swapping,
    Invalidated,
}

impl CyclePhase {
    pub fn can_advance_to(self, next: CyclePhase) -> bool {
        use CyclePhase::*;
        matches!(
            (self, next),
            (Idle, Scheduled)
                | (Idle, InFlight)
                | (Scheduled, Scheduled)
                | (Scheduled, Idle)
                | (Scheduled, InFlight)
                | (InFlight, Swapping)
                | (InFlight, Idle)
                | (InFlight, Invalidated)
                | (Swapping, Idle)
                | (Swapping, Invalidated)
                | (Invalidated, Idle)
        )
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
            Self::InFlight => "in_flight",
            Self::Swapping => "swapping",
            Self::Invalidated => "invalidated",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct UpdateCycle {
    subject: &'static str,
    phase: Mutex<CyclePhase>,
}

impl UpdateCycle {
    pub fn new(subject: &'static str) -> Self {
        Self {
            subject,
            phase: Mutex::new(CyclePhase::Idle),
        }
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.lock()
    }

    /// Moves to `next` if the transition is legal. Illegal transitions leave the phase unchanged.
    pub fn advance(&self, next: CyclePhase) -> bool {
        let mut phase = self.phase.lock();
        let current = *phase;
        if !current.can_advance_to(next) {
            debug!(subject = self.subject, from = %current, to = %next, "cycle: transition ignored");
            return false;
        }
        *phase = next;
        true
    }

    /// Returns to `Idle` from any phase once a cycle has terminated.
    pub fn settle(&self) {
        *self.phase.lock() = CyclePhase::Idle;
    }
}
