//! Listing search: debounced query edits replace the results region.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use coordination::{
    AttemptOutcome, Debounced, RequestClient, SequenceGuard, SupersessionCanceller, Timer,
};
use parking_lot::RwLock;
use shared::{
    domain::OperationKind,
    error::RequestError,
    protocol::{RequestOptions, REQUESTED_WITH_HEADER, REQUESTED_WITH_XHR},
};
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use url::Url;

pub const DEFAULT_WAIT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Endpoint returning the rendered results fragment.
    pub src: Url,
    pub query_param: String,
    /// Params dropped whenever the query changes, e.g. pagination.
    pub clear_params: Vec<String>,
    pub wait: Option<Duration>,
}

impl SearchConfig {
    pub fn new(src: Url) -> Self {
        Self {
            src,
            query_param: "q".to_string(),
            clear_params: vec!["p".to_string()],
            wait: Some(DEFAULT_WAIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Begin { request_url: String },
    Success { request_url: String, results: String },
    Failed { request_url: String, message: String },
}

pub struct SearchUpdater {
    config: SearchConfig,
    client: Arc<dyn RequestClient>,
    location: RwLock<Url>,
    results: RwLock<String>,
    loading: AtomicBool,
    guard: SequenceGuard,
    canceller: SupersessionCanceller<OperationKind>,
    debounced: Debounced<String>,
    events: broadcast::Sender<SearchEvent>,
}

impl SearchUpdater {
    /// `location` is the page address whose query mirrors the current search.
    pub fn new(
        config: SearchConfig,
        client: Arc<dyn RequestClient>,
        location: Url,
        timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let wait = config.wait;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let debounced = Debounced::with_timer(
                move |query: String| {
                    if let Some(search) = weak.upgrade() {
                        tokio::spawn(async move {
                            let _ = search.location_search(&query).await;
                        });
                    }
                },
                wait,
                timer,
            );
            Self {
                config,
                client,
                location: RwLock::new(location),
                results: RwLock::new(String::new()),
                loading: AtomicBool::new(false),
                guard: SequenceGuard::new(),
                canceller: SupersessionCanceller::new(),
                debounced,
                events,
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }

    pub fn location(&self) -> Url {
        self.location.read().clone()
    }

    pub fn results(&self) -> String {
        self.results.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Input handler. Bursts collapse into one search for the last value.
    pub fn update(&self, query: impl Into<String>) {
        self.debounced.invoke(query.into());
    }

    /// Runs a search for `query` unless it matches the current one after trimming.
    ///
    /// Returns true when the results and location were replaced.
    pub async fn location_search(&self, query: &str) -> Result<bool, RequestError> {
        let Some(location) = self.next_location(query) else {
            debug!(query, "search: query unchanged");
            return Ok(false);
        };
        let mut request_url = self.config.src.clone();
        request_url.set_query(location.query());

        let applied = self.request(request_url.as_str()).await?;
        if applied.is_some() {
            *self.location.write() = location;
        }
        Ok(applied.is_some())
    }

    /// Fetches `request_url` and installs the body as the results.
    ///
    /// `Ok(None)` means a newer request superseded this one.
    pub async fn request(&self, request_url: &str) -> Result<Option<String>, RequestError> {
        let ticket = self.guard.next();
        self.loading.store(true, Ordering::Release);
        let _ = self.events.send(SearchEvent::Begin {
            request_url: request_url.to_string(),
        });

        let options = RequestOptions::get().header(REQUESTED_WITH_HEADER, REQUESTED_WITH_XHR);
        let outcome = self
            .canceller
            .request(OperationKind::Search, self.client.as_ref(), request_url, options)
            .await;

        let result = match outcome {
            Ok(AttemptOutcome::Completed(response)) if self.guard.accept(ticket) => {
                info!(request_url, "search: results replaced");
                *self.results.write() = response.body.clone();
                let _ = self.events.send(SearchEvent::Success {
                    request_url: request_url.to_string(),
                    results: response.body.clone(),
                });
                Ok(Some(response.body))
            }
            Ok(_) => Ok(None),
            Err(err) => {
                error!(request_url, error = %err, "search: error fetching results");
                let _ = self.events.send(SearchEvent::Failed {
                    request_url: request_url.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        };

        if self.guard.is_latest(ticket) {
            self.loading.store(false, Ordering::Release);
        }
        result
    }

    pub fn disconnect(&self) {
        self.debounced.cancel();
        self.canceller.cancel_all();
        self.loading.store(false, Ordering::Release);
    }

    fn next_location(&self, query: &str) -> Option<Url> {
        let param = self.config.query_param.as_str();
        let mut location = self.location.read().clone();
        let current = location
            .query_pairs()
            .find(|(key, _)| key == param)
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        if current.trim() == query.trim() {
            return None;
        }

        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut placed = false;
        for (key, value) in location.query_pairs() {
            if self.config.clear_params.iter().any(|clear| *clear == key) {
                continue;
            }
            if key == param {
                if !placed && !query.is_empty() {
                    pairs.push((key.into_owned(), query.to_string()));
                }
                placed = true;
                continue;
            }
            pairs.push((key.into_owned(), value.into_owned()));
        }
        if !placed && !query.is_empty() {
            pairs.push((param.to_string(), query.to_string()));
        }

        if pairs.is_empty() {
            location.set_query(None);
        } else {
            location.query_pairs_mut().clear().extend_pairs(pairs);
        }
        Some(location)
    }
}

impl Drop for SearchUpdater {
    fn drop(&mut self) {
        self.debounced.cancel();
        self.canceller.cancel_all();
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
