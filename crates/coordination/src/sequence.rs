//! Ticketed staleness guard: results are applied in ticket order no matter
//! which response arrives first.

use parking_lot::Mutex;
use shared::domain::Ticket;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardState {
    pub highest_issued: Ticket,
    pub highest_accepted: Ticket,
}

#[derive(Debug, Default)]
pub struct SequenceGuard {
    state: Mutex<GuardState>,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the ticket for an attempt that is about to start.
    pub fn next(&self) -> Ticket {
        let mut state = self.state.lock();
        state.highest_issued = Ticket(state.highest_issued.0 + 1);
        state.highest_issued
    }

    /// Returns true when the result for `ticket` may be applied.
    ///
    /// Tickets this guard never issued are rejected.
    pub fn accept(&self, ticket: Ticket) -> bool {
        let mut state = self.state.lock();
        if ticket > state.highest_issued {
            debug!(%ticket, issued = %state.highest_issued, "sequence: rejecting foreign ticket");
            return false;
        }
        if ticket <= state.highest_accepted {
            debug!(%ticket, accepted = %state.highest_accepted, "sequence: discarding stale result");
            return false;
        }
        state.highest_accepted = ticket;
        true
    }

    /// True while no newer attempt has been started after `ticket`.
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.state.lock().highest_issued == ticket
    }

    pub fn state(&self) -> GuardState {
        *self.state.lock()
    }
}
