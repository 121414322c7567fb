//! Typed commands routed from an input surface to the widgets.

use std::sync::Arc;

use coordination::ResourceHost;
use tokio::sync::mpsc::{error::TrySendError, Receiver, Sender};
use tracing::{debug, info};
use url::Url;

use crate::{
    autocomplete::TagAutocomplete, preview::PreviewSync, search::SearchUpdater,
    value_sync::ValueSync,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetCommand {
    PreviewShow,
    PreviewHide,
    PreviewRefresh,
    PreviewMode { mode: String },
    /// Edit form changed; the preview checks for differences.
    FormChanged,
    SearchInput { query: String },
    TagInput { term: String },
    SyncSource { value: String },
    SyncApply { value: Option<String> },
    SyncClear,
    SyncCheck,
    Disconnect,
}

impl WidgetCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreviewShow => "preview_show",
            Self::PreviewHide => "preview_hide",
            Self::PreviewRefresh => "preview_refresh",
            Self::PreviewMode { .. } => "preview_mode",
            Self::FormChanged => "form_changed",
            Self::SearchInput { .. } => "search_input",
            Self::TagInput { .. } => "tag_input",
            Self::SyncSource { .. } => "sync_source",
            Self::SyncApply { .. } => "sync_apply",
            Self::SyncClear => "sync_clear",
            Self::SyncCheck => "sync_check",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Queues `cmd` without blocking the caller; failures are written to `status`.
pub fn dispatch_widget_command(
    cmd_tx: &Sender<WidgetCommand>,
    cmd: WidgetCommand,
    status: &mut String,
) {
    let cmd_name = cmd.name();
    match cmd_tx.try_send(cmd) {
        Ok(()) => debug!(command = cmd_name, "queued widget command"),
        Err(TrySendError::Full(_)) => {
            *status = "Widget command queue is full; please retry".to_string();
        }
        Err(TrySendError::Closed(_)) => {
            *status = "Widget command processor stopped; restart the session".to_string();
        }
    }
}

/// Owns the widgets of one editing session and applies commands to them in order.
pub struct WidgetHub<H: ResourceHost<Config = Url>> {
    pub preview: Option<Arc<PreviewSync<H>>>,
    pub search: Option<Arc<SearchUpdater>>,
    pub tags: Option<Arc<TagAutocomplete>>,
    pub sync: Option<Arc<ValueSync>>,
}

impl<H> Default for WidgetHub<H>
where
    H: ResourceHost<Config = Url>,
{
    fn default() -> Self {
        Self {
            preview: None,
            search: None,
            tags: None,
            sync: None,
        }
    }
}

impl<H> WidgetHub<H>
where
    H: ResourceHost<Config = Url> + 'static,
{
    pub fn handle(&self, cmd: WidgetCommand) {
        match cmd {
            WidgetCommand::PreviewShow => {
                if let Some(preview) = &self.preview {
                    preview.show();
                }
            }
            WidgetCommand::PreviewHide => {
                if let Some(preview) = &self.preview {
                    preview.hide();
                }
            }
            WidgetCommand::PreviewRefresh => {
                if let Some(preview) = self.preview.clone() {
                    tokio::spawn(async move {
                        preview.refresh().await;
                    });
                }
            }
            WidgetCommand::PreviewMode { mode } => {
                if let Some(preview) = self.preview.clone() {
                    tokio::spawn(async move {
                        preview.set_mode(mode).await;
                    });
                }
            }
            WidgetCommand::FormChanged => {
                if let Some(preview) = &self.preview {
                    preview.check_and_update();
                }
            }
            WidgetCommand::SearchInput { query } => {
                if let Some(search) = &self.search {
                    search.update(query);
                }
            }
            WidgetCommand::TagInput { term } => {
                if let Some(tags) = &self.tags {
                    tags.input(term);
                }
            }
            WidgetCommand::SyncSource { value } => {
                if let Some(sync) = &self.sync {
                    sync.set_source_value(value);
                }
            }
            WidgetCommand::SyncApply { value } => {
                if let Some(sync) = &self.sync {
                    sync.apply(value);
                }
            }
            WidgetCommand::SyncClear => {
                if let Some(sync) = &self.sync {
                    sync.clear();
                }
            }
            WidgetCommand::SyncCheck => {
                if let Some(sync) = &self.sync {
                    sync.check();
                }
            }
            WidgetCommand::Disconnect => self.disconnect(),
        }
    }

    pub fn disconnect(&self) {
        if let Some(preview) = &self.preview {
            preview.hide();
        }
        if let Some(search) = &self.search {
            search.disconnect();
        }
        if let Some(tags) = &self.tags {
            tags.disconnect();
        }
        if let Some(sync) = &self.sync {
            sync.disconnect();
        }
    }

    /// Processes commands until a disconnect arrives or every sender is gone.
    pub async fn run(self, mut cmd_rx: Receiver<WidgetCommand>) {
        while let Some(cmd) = cmd_rx.recv().await {
            debug!(command = cmd.name(), "widget command received");
            let stop = cmd == WidgetCommand::Disconnect;
            self.handle(cmd);
            if stop {
                break;
            }
        }
        self.disconnect();
        info!("widgets: command loop stopped");
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
