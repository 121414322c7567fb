use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use url::Url;
use widgets::{AutocompleteConfig, PreviewConfig, SearchConfig, ValueSyncConfig};

pub const DEFAULT_CONFIG_FILE: &str = "widgets.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub location: String,
    pub search_path: String,
    pub search_wait_ms: u64,
    pub preview_path: String,
    pub preview_mode: Option<String>,
    pub preview_interval_ms: u64,
    pub preview_spinner_ms: u64,
    pub preview_ready_timeout_ms: u64,
    pub csrf_header: String,
    pub csrf_token: Option<String>,
    pub tag_autocomplete_path: String,
    pub tag_delay_ms: u64,
    pub sync_debounce_ms: u64,
    pub sync_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            location: "/admin/pages/".into(),
            search_path: "/admin/pages/search/".into(),
            search_wait_ms: 200,
            preview_path: "/admin/pages/1/edit/preview/".into(),
            preview_mode: None,
            preview_interval_ms: 500,
            preview_spinner_ms: 2000,
            preview_ready_timeout_ms: 10_000,
            csrf_header: "x-csrftoken".into(),
            csrf_token: None,
            tag_autocomplete_path: "/admin/tag-autocomplete/".into(),
            tag_delay_ms: 0,
            sync_debounce_ms: 100,
            sync_delay_ms: 0,
            request_timeout_secs: 30,
        }
    }
}

/// Defaults, then the config file if present, then `APP__*` environment overrides.
/// Loads `path`, or `widgets.toml` when none is given. Only the implicit file may be absent.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings(path, true)?,
        None => read_settings(Path::new(DEFAULT_CONFIG_FILE), false)?,
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_settings(path: &Path, required: bool) -> anyhow::Result<Settings> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display())),
        Err(_) if !required => Ok(Settings::default()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to read config file '{}'", path.display())),
    }
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = lookup("APP__LOCATION") {
        settings.location = v;
    }
    if let Some(v) = lookup("APP__SEARCH_PATH") {
        settings.search_path = v;
    }
    if let Some(v) = lookup("APP__PREVIEW_PATH") {
        settings.preview_path = v;
    }
    if let Some(v) = lookup("APP__PREVIEW_MODE") {
        settings.preview_mode = Some(v);
    }
    if let Some(v) = lookup("APP__CSRF_TOKEN") {
        settings.csrf_token = Some(v);
    }
    if let Some(v) = lookup("APP__TAG_AUTOCOMPLETE_PATH") {
        settings.tag_autocomplete_path = v;
    }

    let millis = [
        ("APP__SEARCH_WAIT_MS", &mut settings.search_wait_ms),
        ("APP__PREVIEW_INTERVAL_MS", &mut settings.preview_interval_ms),
        ("APP__PREVIEW_SPINNER_MS", &mut settings.preview_spinner_ms),
        (
            "APP__PREVIEW_READY_TIMEOUT_MS",
            &mut settings.preview_ready_timeout_ms,
        ),
        ("APP__TAG_DELAY_MS", &mut settings.tag_delay_ms),
        ("APP__SYNC_DEBOUNCE_MS", &mut settings.sync_debounce_ms),
        ("APP__SYNC_DELAY_MS", &mut settings.sync_delay_ms),
        ("APP__REQUEST_TIMEOUT_SECS", &mut settings.request_timeout_secs),
    ];
    for (key, slot) in millis {
        if let Some(parsed) = lookup(key).and_then(|v| v.parse::<u64>().ok()) {
            *slot = parsed;
        }
    }
}

/// Zero disables the wait.
fn optional_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Settings {
    pub fn resolve(&self, path: &str) -> anyhow::Result<Url> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base url '{}'", self.base_url))?;
        base.join(path)
            .with_context(|| format!("invalid path '{path}' for base url '{}'", self.base_url))
    }

    pub fn location_url(&self) -> anyhow::Result<Url> {
        self.resolve(&self.location)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn search_config(&self) -> anyhow::Result<SearchConfig> {
        let mut config = SearchConfig::new(self.resolve(&self.search_path)?);
        config.wait = optional_millis(self.search_wait_ms);
        Ok(config)
    }

    pub fn preview_config(&self) -> anyhow::Result<PreviewConfig> {
        let mut config = PreviewConfig::new(self.resolve(&self.preview_path)?);
        config.mode = self.preview_mode.clone();
        config.interval = Duration::from_millis(self.preview_interval_ms.max(1));
        config.spinner_delay = Duration::from_millis(self.preview_spinner_ms);
        config.ready_timeout = optional_millis(self.preview_ready_timeout_ms);
        config.csrf = self
            .csrf_token
            .clone()
            .map(|token| (self.csrf_header.clone(), token));
        Ok(config)
    }

    pub fn autocomplete_config(&self) -> anyhow::Result<AutocompleteConfig> {
        let mut config = AutocompleteConfig::new(self.resolve(&self.tag_autocomplete_path)?);
        config.delay = optional_millis(self.tag_delay_ms);
        Ok(config)
    }

    pub fn value_sync_config(&self) -> ValueSyncConfig {
        ValueSyncConfig {
            debounce: optional_millis(self.sync_debounce_ms),
            delay: optional_millis(self.sync_delay_ms),
            quiet: false,
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
