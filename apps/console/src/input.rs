use widgets::WidgetCommand;

/// One line of preview input: a panel directive or the new value of the edited field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewLine {
    Command(WidgetCommand),
    Edit(String),
}

pub fn preview_line(line: &str) -> PreviewLine {
    match line.trim() {
        ":refresh" => PreviewLine::Command(WidgetCommand::PreviewRefresh),
        ":show" => PreviewLine::Command(WidgetCommand::PreviewShow),
        ":hide" => PreviewLine::Command(WidgetCommand::PreviewHide),
        directive => match directive.strip_prefix(":mode ") {
            Some(mode) => PreviewLine::Command(WidgetCommand::PreviewMode {
                mode: mode.trim().to_string(),
            }),
            None => PreviewLine::Edit(line.to_string()),
        },
    }
}

pub fn sync_line(line: &str) -> Vec<WidgetCommand> {
    match line.trim() {
        ":clear" => vec![WidgetCommand::SyncClear],
        ":check" => vec![WidgetCommand::SyncCheck],
        _ => vec![
            WidgetCommand::SyncSource {
                value: line.to_string(),
            },
            WidgetCommand::SyncApply { value: None },
        ],
    }
}
