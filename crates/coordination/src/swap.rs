//! Flicker-free replacement of a visible resource.
//!
//! The incoming instance is created, configured and inserted while invisible.
//! Only once it signals readiness are the outgoing instance's attributes (minus
//! the identity attribute) and viewport copied over, the outgoing instance
//! removed and the incoming one revealed. Swaps are ticketed: a swap whose
//! readiness arrives after a newer swap has started discards its instance.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::domain::{Ticket, Viewport};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sequence::SequenceGuard;

/// Capability over one kind of replaceable resource (an embedded frame, a
/// rendered panel, ...).
#[async_trait]
pub trait ResourceHost: Send + Sync {
    type Resource: Send + Sync;
    type Config: Clone + fmt::Debug + Send + Sync;

    /// Creates a detached, invisible instance.
    fn create(&self) -> Self::Resource;
    /// Applies the identity-defining configuration.
    fn configure(&self, resource: &Self::Resource, config: &Self::Config);
    /// Inserts `incoming` next to `anchor`, keeping it invisible and out of flow.
    fn insert_invisible(&self, anchor: &Self::Resource, incoming: &Self::Resource);
    /// Resolves when `resource` has finished loading.
    async fn ready(&self, resource: &Self::Resource);
    /// Name of the attribute carrying the identity-defining configuration.
    fn identity_attribute(&self) -> &str;
    fn attributes(&self, resource: &Self::Resource) -> Vec<(String, String)>;
    fn set_attribute(&self, resource: &Self::Resource, name: &str, value: &str);
    fn viewport(&self, resource: &Self::Resource) -> Viewport;
    fn restore_viewport(&self, resource: &Self::Resource, viewport: Viewport);
    fn remove(&self, resource: &Self::Resource);
    fn reveal(&self, resource: &Self::Resource);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Swapped { ticket: Ticket },
    Superseded { ticket: Ticket },
}

impl SwapOutcome {
    pub fn is_swapped(&self) -> bool {
        matches!(self, Self::Swapped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("incoming resource not ready after {waited:?}; keeping the current one")]
    ReadinessTimeout { ticket: Ticket, waited: Duration },
}

pub struct FlickerFreeSwap<H: ResourceHost> {
    host: Arc<H>,
    current: Mutex<H::Resource>,
    guard: SequenceGuard,
    ready_timeout: Option<Duration>,
}

impl<H: ResourceHost> FlickerFreeSwap<H> {
    /// `ready_timeout` of `None` waits for readiness indefinitely.
    pub fn new(host: Arc<H>, current: H::Resource, ready_timeout: Option<Duration>) -> Self {
        Self {
            host,
            current: Mutex::new(current),
            guard: SequenceGuard::new(),
            ready_timeout,
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Runs `f` against the currently visible resource.
    pub fn with_current<R>(&self, f: impl FnOnce(&H::Resource) -> R) -> R {
        f(&self.current.lock())
    }

    pub async fn swap(&self, target: H::Config) -> Result<SwapOutcome, SwapError> {
        self.swap_with(target, |_| {}).await
    }

    /// Like [`swap`](Self::swap), calling `on_ready` with the revealed resource.
    ///
    /// `on_ready` runs while the visible slot is locked and must not call back
    /// into this swap.
    pub async fn swap_with<F>(&self, target: H::Config, on_ready: F) -> Result<SwapOutcome, SwapError>
    where
        F: FnOnce(&H::Resource) + Send,
    {
        let ticket = self.guard.next();
        let incoming = self.host.create();
        self.host.configure(&incoming, &target);
        {
            let current = self.current.lock();
            self.host.insert_invisible(&current, &incoming);
        }
        debug!(%ticket, ?target, "swap: incoming resource inserted");
        let pending = PendingResource {
            host: &*self.host,
            resource: &incoming,
            armed: true,
        };

        if let Some(waited) = self.ready_timeout {
            let in_time = tokio::time::timeout(waited, self.host.ready(&incoming))
                .await
                .is_ok();
            if !in_time {
                warn!(%ticket, ?waited, "swap: readiness timed out; discarding incoming resource");
                return Err(SwapError::ReadinessTimeout { ticket, waited });
            }
        } else {
            self.host.ready(&incoming).await;
        }

        if !self.guard.is_latest(ticket) || !self.guard.accept(ticket) {
            debug!(%ticket, "swap: superseded before readiness; discarding incoming resource");
            return Ok(SwapOutcome::Superseded { ticket });
        }
        pending.keep();

        let mut current = self.current.lock();
        let identity = self.host.identity_attribute().to_string();
        for (name, value) in self.host.attributes(&current) {
            if name != identity {
                self.host.set_attribute(&incoming, &name, &value);
            }
        }
        self.host
            .restore_viewport(&incoming, self.host.viewport(&current));

        let outgoing = std::mem::replace(&mut *current, incoming);
        self.host.remove(&outgoing);
        self.host.reveal(&current);
        debug!(%ticket, "swap: incoming resource revealed");

        on_ready(&current);
        Ok(SwapOutcome::Swapped { ticket })
    }
}

/// Removes a hidden incoming resource on every exit that does not reveal it,
/// including the swap future being dropped mid-wait.
struct PendingResource<'a, H: ResourceHost> {
    host: &'a H,
    resource: &'a H::Resource,
    armed: bool,
}

impl<H: ResourceHost> PendingResource<'_, H> {
    fn keep(mut self) {
        self.armed = false;
    }
}

impl<H: ResourceHost> Drop for PendingResource<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            self.host.remove(self.resource);
        }
    }
}

#[cfg(test)]
#[path = "tests/swap_tests.rs"]
mod tests;
