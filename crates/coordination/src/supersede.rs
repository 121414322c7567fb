//! Supersession: starting an attempt of kind K cancels the previous attempt of
//! the same kind before the new one begins.
//!
//! Cancellation is cooperative. A superseded attempt may keep running, but its
//! completion is reported as [`AttemptOutcome::Superseded`] and never as an
//! error.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use shared::{
    domain::AttemptId,
    error::RequestError,
    protocol::{RequestOptions, Response},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::request::RequestClient;

/// One attempt's right to keep running.
#[derive(Debug, Clone)]
pub struct AttemptToken {
    id: AttemptId,
    cancel: CancellationToken,
}

impl AttemptToken {
    fn new(id: AttemptId) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the attempt has been superseded or cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T> {
    Completed(T),
    Superseded,
}

impl<T> AttemptOutcome<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Superseded => None,
        }
    }
}

pub struct SupersessionCanceller<K> {
    next_id: AtomicU64,
    current: Mutex<HashMap<K, AttemptToken>>,
}

impl<K> Default for SupersessionCanceller<K> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            current: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> fmt::Debug for SupersessionCanceller<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupersessionCanceller")
            .field("in_flight", &self.current.lock().len())
            .finish()
    }
}

impl<K> SupersessionCanceller<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the current attempt of `kind`, if any, and installs a fresh token.
    pub fn begin(&self, kind: K) -> AttemptToken {
        let id = AttemptId(self.next_id.fetch_add(1, Ordering::AcqRel) + 1);
        let token = AttemptToken::new(id);
        let mut current = self.current.lock();
        if let Some(previous) = current.remove(&kind) {
            debug!(?kind, superseded = %previous.id, by = %id, "supersede: cancelling previous attempt");
            previous.cancel();
        }
        current.insert(kind, token.clone());
        token
    }

    /// Clears `kind` if `token` is still its current attempt.
    pub fn finish(&self, kind: &K, token: &AttemptToken) {
        let mut current = self.current.lock();
        if current.get(kind).is_some_and(|active| active.id == token.id) {
            current.remove(kind);
        }
    }

    pub fn cancel(&self, kind: &K) {
        if let Some(token) = self.current.lock().remove(kind) {
            debug!(?kind, attempt = %token.id, "supersede: attempt cancelled");
            token.cancel();
        }
    }

    pub fn cancel_all(&self) {
        for (kind, token) in self.current.lock().drain() {
            debug!(?kind, attempt = %token.id, "supersede: attempt cancelled");
            token.cancel();
        }
    }

    pub fn is_in_flight(&self, kind: &K) -> bool {
        self.current.lock().contains_key(kind)
    }

    /// Runs `attempt` under a fresh token for `kind`.
    ///
    /// The attempt future is dropped as soon as it is superseded. A result that
    /// settles after cancellation is discarded, whether it succeeded or failed.
    pub async fn run<T, E, F, Fut>(&self, kind: K, attempt: F) -> Result<AttemptOutcome<T>, E>
    where
        F: FnOnce(AttemptToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let token = self.begin(kind.clone());
        let settled = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = attempt(token.clone()) => Some(result),
        };
        self.finish(&kind, &token);

        match settled {
            Some(result) if !token.is_cancelled() => result.map(AttemptOutcome::Completed),
            _ => {
                debug!(?kind, attempt = %token.id, "supersede: result discarded");
                Ok(AttemptOutcome::Superseded)
            }
        }
    }

    /// Issues a request as the current attempt of `kind`. Non-ok responses are errors.
    pub async fn request(
        &self,
        kind: K,
        client: &dyn RequestClient,
        url: &str,
        options: RequestOptions,
    ) -> Result<AttemptOutcome<Response>, RequestError> {
        self.run(kind, |_token| async move {
            client.request(url, options).await?.error_for_status(url)
        })
        .await
    }
}

#[cfg(test)]
#[path = "tests/supersede_tests.rs"]
mod tests;
