//! Primitives that keep overlapping asynchronous widget updates from racing.
//!
//! Each widget constructs its own instances; nothing here is global.

pub mod cycle;
pub mod debounce;
pub mod gate;
pub mod request;
pub mod sequence;
pub mod supersede;
pub mod swap;
pub mod timer;

pub use cycle::{CyclePhase, UpdateCycle};
pub use debounce::{debounce, Debounced};
pub use gate::{BusyGate, GatePass};
pub use request::{HttpRequestClient, RequestClient};
pub use sequence::{GuardState, SequenceGuard};
pub use supersede::{AttemptOutcome, AttemptToken, SupersessionCanceller};
pub use swap::{FlickerFreeSwap, ResourceHost, SwapError, SwapOutcome};
pub use timer::{Timer, TimerHandle, TimerTask, TokioTimer};
