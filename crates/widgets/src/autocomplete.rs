//! Tag field autocomplete.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use coordination::{AttemptOutcome, Debounced, RequestClient, SupersessionCanceller, Timer};
use parking_lot::RwLock;
use serde_json::Value;
use shared::{
    domain::OperationKind,
    error::RequestError,
    protocol::{RequestOptions, JSON_ACCEPT},
};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct AutocompleteConfig {
    pub url: Url,
    /// Quiet period before a term is looked up. `None` looks up every keystroke.
    pub delay: Option<Duration>,
}

impl AutocompleteConfig {
    pub fn new(url: Url) -> Self {
        Self { url, delay: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutocompleteEvent {
    Loading(bool),
    Suggestions { term: String, whitelist: Vec<String> },
    Failed { term: String, message: String },
}

pub struct TagAutocomplete {
    config: AutocompleteConfig,
    client: Arc<dyn RequestClient>,
    canceller: SupersessionCanceller<OperationKind>,
    debounced: Debounced<String>,
    whitelist: RwLock<Vec<String>>,
    events: broadcast::Sender<AutocompleteEvent>,
}

impl TagAutocomplete {
    pub fn new(
        config: AutocompleteConfig,
        client: Arc<dyn RequestClient>,
        timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let delay = config.delay;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let debounced = Debounced::with_timer(
                move |term: String| {
                    if let Some(tags) = weak.upgrade() {
                        tokio::spawn(async move {
                            tags.lookup(term).await;
                        });
                    }
                },
                delay,
                timer,
            );
            Self {
                config,
                client,
                canceller: SupersessionCanceller::new(),
                debounced,
                whitelist: RwLock::new(Vec::new()),
                events,
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutocompleteEvent> {
        self.events.subscribe()
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.whitelist.read().clone()
    }

    /// Input handler for the tag field.
    pub fn input(&self, term: impl Into<String>) {
        self.debounced.cancel();
        let _ = self.events.send(AutocompleteEvent::Loading(true));
        self.debounced.invoke(term.into());
    }

    /// Fetches suggestions for `term`, cancelling any lookup still in flight.
    ///
    /// `Ok(None)` means a newer lookup superseded this one.
    pub async fn autocomplete(&self, term: &str) -> Result<Option<Vec<String>>, RequestError> {
        let mut url = self.config.url.clone();
        url.query_pairs_mut().append_pair("term", term);
        let options = RequestOptions::get().header("accept", JSON_ACCEPT);

        let outcome = self
            .canceller
            .request(
                OperationKind::Autocomplete,
                self.client.as_ref(),
                url.as_str(),
                options,
            )
            .await?;

        let AttemptOutcome::Completed(response) = outcome else {
            debug!(term, "autocomplete: lookup superseded");
            return Ok(None);
        };
        let body: Value = serde_json::from_str(&response.body).map_err(|err| {
            RequestError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }
        })?;
        Ok(Some(suggestions(body)))
    }

    pub fn disconnect(&self) {
        self.debounced.cancel();
        self.canceller.cancel(&OperationKind::Autocomplete);
    }

    async fn lookup(&self, term: String) {
        let whitelist = match self.autocomplete(&term).await {
            Ok(Some(whitelist)) => whitelist,
            Ok(None) => return,
            Err(err) => {
                warn!(term, error = %err, "autocomplete: network or API error during autocomplete request");
                let _ = self.events.send(AutocompleteEvent::Failed {
                    term: term.clone(),
                    message: err.to_string(),
                });
                Vec::new()
            }
        };
        *self.whitelist.write() = whitelist.clone();
        let _ = self.events.send(AutocompleteEvent::Suggestions { term, whitelist });
        let _ = self.events.send(AutocompleteEvent::Loading(false));
    }
}

impl Drop for TagAutocomplete {
    fn drop(&mut self) {
        self.debounced.cancel();
        self.canceller.cancel_all();
    }
}

/// Accepts a JSON array of strings or `{"value": ...}` objects; anything else yields no suggestions.
fn suggestions(body: Value) -> Vec<String> {
    let Value::Array(items) = body else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(value) => Some(value),
            Value::Object(mut object) => match object.remove("value") {
                Some(Value::String(value)) => Some(value),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Quotes multi-word tags so the server keeps them whole.
pub fn clean_tag(value: &str) -> String {
    if !value.is_empty() && !value.starts_with('"') && value.contains(' ') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Value written back to the underlying text input.
pub fn input_value<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|tag| tag.as_ref().trim())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "tests/autocomplete_tests.rs"]
mod tests;
