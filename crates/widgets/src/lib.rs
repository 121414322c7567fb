//! Admin widgets composed from the coordination primitives.

pub mod autocomplete;
pub mod commands;
pub mod error;
pub mod form;
pub mod preview;
pub mod search;
pub mod value_sync;

pub use autocomplete::{clean_tag, AutocompleteConfig, AutocompleteEvent, TagAutocomplete};
pub use commands::{dispatch_widget_command, WidgetCommand, WidgetHub};
pub use error::WidgetError;
pub use form::{FormSource, FormState};
pub use preview::{PreviewConfig, PreviewEvent, PreviewSync};
pub use search::{SearchConfig, SearchEvent, SearchUpdater};
pub use value_sync::{SyncEventKind, SyncTarget, ValueSync, ValueSyncConfig};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
