mod config;
mod frame;
mod input;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coordination::{HttpRequestClient, RequestClient, Timer, TokioTimer};
use parking_lot::Mutex;
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use widgets::{
    dispatch_widget_command, AutocompleteEvent, FormSource, FormState, PreviewEvent, PreviewSync,
    SearchEvent, SearchUpdater, SyncTarget, TagAutocomplete, ValueSync, WidgetCommand, WidgetHub,
};

use crate::{
    config::{load_settings, Settings},
    frame::HeadlessFrameHost,
    input::{preview_line, sync_line, PreviewLine},
};

#[derive(Parser, Debug)]
#[command(about = "Drive CMS admin widgets from standard input, one event per line")]
struct Args {
    /// Config file; defaults to ./widgets.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Time to keep running after input ends so pending updates can land.
    #[arg(long, default_value_t = 1500)]
    linger_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Each line is the new search query.
    Search,
    /// Each line is the new value of the edited form field.
    Preview {
        #[arg(long, default_value = "title")]
        field: String,
    },
    /// Each line is a tag term to autocomplete.
    Tags,
    /// Each line is the source value mirrored into the target fields.
    Sync {
        #[arg(long = "target", default_value = "slug")]
        targets: Vec<String>,
    },
}

struct ConsoleField {
    name: String,
    value: Mutex<String>,
}

impl SyncTarget for ConsoleField {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_value(&self, value: &str) {
        *self.value.lock() = value.to_string();
        println!("{} = {value}", self.name);
    }

    fn notify_change(&self) {
        debug!(field = %self.name, "sync: change dispatched");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    let http = reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .build()
        .context("failed to build http client")?;
    let client: Arc<dyn RequestClient> = Arc::new(HttpRequestClient::new(http));
    let timer: Arc<dyn Timer> = Arc::new(TokioTimer);

    let mut hub = WidgetHub::<HeadlessFrameHost>::default();
    let mut form = None;
    let printer = match &args.command {
        Command::Search => {
            let search = SearchUpdater::new(
                settings.search_config()?,
                Arc::clone(&client),
                settings.location_url()?,
                Arc::clone(&timer),
            );
            let printer = print_search(search.subscribe());
            hub.search = Some(search);
            Some(printer)
        }
        Command::Preview { field } => {
            let fields = Arc::new(FormState::new([(field.clone(), String::new())]));
            let preview = mount_preview(&settings, &client, &timer, &fields)?;
            let printer = print_preview(preview.subscribe());
            preview.show();
            hub.preview = Some(preview);
            form = Some((field.clone(), fields));
            Some(printer)
        }
        Command::Tags => {
            let tags = TagAutocomplete::new(
                settings.autocomplete_config()?,
                Arc::clone(&client),
                Arc::clone(&timer),
            );
            let printer = print_tags(tags.subscribe());
            hub.tags = Some(tags);
            Some(printer)
        }
        Command::Sync { targets } => {
            let targets = targets
                .iter()
                .map(|name| {
                    Arc::new(ConsoleField {
                        name: name.clone(),
                        value: Mutex::new(String::new()),
                    }) as Arc<dyn SyncTarget>
                })
                .collect();
            let sync = ValueSync::new(settings.value_sync_config(), "", targets, Arc::clone(&timer));
            sync.connect();
            // Targets print their own writes.
            hub.sync = Some(sync);
            None
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let runner = tokio::spawn(hub.run(cmd_rx));
    info!(command = ?args.command, "console: reading input");

    let mut status = String::new();
    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let commands = match &args.command {
            Command::Search => vec![WidgetCommand::SearchInput { query: line }],
            Command::Tags => vec![WidgetCommand::TagInput { term: line }],
            Command::Sync { .. } => sync_line(&line),
            Command::Preview { .. } => match preview_line(&line) {
                PreviewLine::Command(cmd) => vec![cmd],
                PreviewLine::Edit(value) => {
                    if let Some((field, fields)) = &form {
                        fields.set(field, value);
                    }
                    vec![WidgetCommand::FormChanged]
                }
            },
        };
        for cmd in commands {
            dispatch_widget_command(&cmd_tx, cmd, &mut status);
        }
        if !status.is_empty() {
            warn!(%status, "console: input dropped");
            status.clear();
        }
    }

    tokio::time::sleep(Duration::from_millis(args.linger_ms)).await;
    dispatch_widget_command(&cmd_tx, WidgetCommand::Disconnect, &mut status);
    runner.await.context("widget command loop failed")?;
    if let Some(printer) = printer {
        printer.abort();
    }
    Ok(())
}

fn mount_preview(
    settings: &Settings,
    client: &Arc<dyn RequestClient>,
    timer: &Arc<dyn Timer>,
    form: &Arc<FormState>,
) -> Result<Arc<PreviewSync<HeadlessFrameHost>>> {
    let config = settings.preview_config()?;
    let host = Arc::new(HeadlessFrameHost::new(Arc::clone(client)));
    let mut initial = config.preview_url.clone();
    initial.query_pairs_mut().append_pair("in_preview_panel", "true");
    let frame = host.mount(&initial);
    Ok(PreviewSync::new(
        config,
        Arc::clone(client),
        Arc::clone(form) as Arc<dyn FormSource>,
        host,
        frame,
        Arc::clone(timer),
    ))
}

fn print_events<E, F>(mut events: broadcast::Receiver<E>, mut print: F) -> JoinHandle<()>
where
    E: Clone + Send + 'static,
    F: FnMut(E) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "console: event output lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_search(events: broadcast::Receiver<SearchEvent>) -> JoinHandle<()> {
    print_events(events, |event| match event {
        SearchEvent::Begin { request_url } => println!("searching {request_url}"),
        SearchEvent::Success { results, .. } => println!("{results}"),
        SearchEvent::Failed { request_url, message } => {
            println!("search failed for {request_url}: {message}")
        }
    })
}

fn print_preview(events: broadcast::Receiver<PreviewEvent>) -> JoinHandle<()> {
    print_events(events, |event| match event {
        PreviewEvent::Refreshed { is_valid } => println!("preview refreshed (valid: {is_valid})"),
        PreviewEvent::StatusChanged {
            has_errors,
            unavailable,
        } => println!("preview status: errors={has_errors} unavailable={unavailable}"),
        PreviewEvent::SpinnerShown => println!("preview: still loading..."),
        PreviewEvent::Failed { message } => println!("{message}"),
        other => debug!(event = ?other, "preview event"),
    })
}

fn print_tags(events: broadcast::Receiver<AutocompleteEvent>) -> JoinHandle<()> {
    print_events(events, |event| match event {
        AutocompleteEvent::Suggestions { term, whitelist } => {
            println!("{term}: {}", whitelist.join(", "))
        }
        AutocompleteEvent::Failed { term, message } => println!("{term}: failed ({message})"),
        AutocompleteEvent::Loading(_) => {}
    })
}
