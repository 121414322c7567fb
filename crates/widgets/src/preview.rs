//! Live preview panel: posts the edit form, then swaps in a freshly loaded frame.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use coordination::{
    BusyGate, CyclePhase, Debounced, FlickerFreeSwap, RequestClient, ResourceHost, SwapOutcome,
    Timer, TimerHandle, UpdateCycle,
};
use parking_lot::Mutex;
use shared::protocol::{PreviewState, RequestOptions, FORM_CONTENT_TYPE};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{error::WidgetError, form::FormSource};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_SPINNER_DELAY: Duration = Duration::from_secs(2);
/// Shortest recheck period; a zero interval is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub preview_url: Url,
    pub mode: Option<String>,
    pub auto_update: bool,
    /// Period of the change check while the panel is shown.
    pub interval: Duration,
    /// Quiet period before a detected change is sent. Defaults to `interval`.
    pub debounce: Option<Duration>,
    pub spinner_delay: Duration,
    pub ready_timeout: Option<Duration>,
    /// Header name and token sent with the clear request.
    pub csrf: Option<(String, String)>,
}

impl PreviewConfig {
    pub fn new(preview_url: Url) -> Self {
        Self {
            preview_url,
            mode: None,
            auto_update: true,
            interval: DEFAULT_INTERVAL,
            debounce: None,
            spinner_delay: DEFAULT_SPINNER_DELAY,
            ready_timeout: None,
            csrf: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    SpinnerShown,
    SpinnerHidden,
    StatusChanged { has_errors: bool, unavailable: bool },
    Cleared,
    Refreshed { is_valid: bool },
    /// The new frame is visible; content checks may run against it.
    ChecksRequested,
    Failed { message: String },
}

#[derive(Default)]
struct PanelState {
    last_payload: String,
    cleared: bool,
    mode: Option<String>,
    /// Set when a manual refresh was dropped by the gate.
    refresh_owed: bool,
    has_errors: bool,
    unavailable: bool,
    spinner: Option<TimerHandle>,
    recheck: Option<JoinHandle<()>>,
}

pub struct PreviewSync<H: ResourceHost<Config = Url>> {
    config: PreviewConfig,
    client: Arc<dyn RequestClient>,
    form: Arc<dyn FormSource>,
    frame: FlickerFreeSwap<H>,
    gate: BusyGate,
    cycle: UpdateCycle,
    debounced: Debounced<()>,
    timer: Arc<dyn Timer>,
    spinner_visible: Arc<AtomicBool>,
    state: Mutex<PanelState>,
    events: broadcast::Sender<PreviewEvent>,
}

impl<H> PreviewSync<H>
where
    H: ResourceHost<Config = Url> + 'static,
{
    pub fn new(
        mut config: PreviewConfig,
        client: Arc<dyn RequestClient>,
        form: Arc<dyn FormSource>,
        host: Arc<H>,
        frame: H::Resource,
        timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        config.interval = config.interval.max(MIN_INTERVAL);
        let (events, _) = broadcast::channel(64);
        let wait = config.debounce.or(Some(config.interval));
        // Empty baseline: the first check always counts as a change.
        let state = PanelState {
            mode: config.mode.clone(),
            ..PanelState::default()
        };
        let frame = FlickerFreeSwap::new(host, frame, config.ready_timeout);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let debounced = Debounced::with_timer(
                move |()| {
                    if let Some(preview) = weak.upgrade() {
                        tokio::spawn(async move {
                            if let Err(err) = preview.set_preview_data().await {
                                preview.report_failure(&err);
                            }
                        });
                    }
                },
                wait,
                Arc::clone(&timer),
            );
            Self {
                config,
                client,
                form,
                frame,
                gate: BusyGate::new("preview"),
                cycle: UpdateCycle::new("preview"),
                debounced,
                timer,
                spinner_visible: Arc::new(AtomicBool::new(false)),
                state: Mutex::new(state),
                events,
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewEvent> {
        self.events.subscribe()
    }

    pub fn frame(&self) -> &FlickerFreeSwap<H> {
        &self.frame
    }

    pub fn phase(&self) -> CyclePhase {
        self.cycle.phase()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn spinner_visible(&self) -> bool {
        self.spinner_visible.load(Ordering::Acquire)
    }

    pub fn has_errors(&self) -> bool {
        self.state.lock().has_errors
    }

    pub fn is_unavailable(&self) -> bool {
        self.state.lock().unavailable
    }

    pub fn mode(&self) -> Option<String> {
        self.state.lock().mode.clone()
    }

    /// Address loaded into the preview frame.
    pub fn frame_url(&self) -> Url {
        let mut url = self.config.preview_url.clone();
        let mode = self.mode();
        set_query_param(&mut url, "mode", mode.as_deref());
        set_query_param(&mut url, "in_preview_panel", Some("true"));
        url
    }

    /// Address for opening the preview outside the panel.
    pub fn new_tab_url(&self) -> Url {
        let mut url = self.config.preview_url.clone();
        let mode = self.mode();
        set_query_param(&mut url, "mode", mode.as_deref());
        set_query_param(&mut url, "in_preview_panel", None);
        url
    }

    /// Periodic and input-driven change check.
    ///
    /// While an update is in flight the check returns without looking at the
    /// form; the next tick re-evaluates, so the skipped edit is not lost.
    pub fn check_and_update(&self) {
        if self.gate.is_busy() {
            debug!("preview: update in flight; change check deferred");
            return;
        }
        if !self.take_changes() {
            return;
        }
        self.cycle.advance(CyclePhase::Scheduled);
        self.debounced.invoke(());
    }

    /// Sends the form and refreshes the frame. `Ok(None)` means an update was
    /// already in flight and this trigger was dropped.
    pub async fn set_preview_data(&self) -> Result<Option<bool>, WidgetError> {
        let Some(pass) = self.gate.try_begin() else {
            return Ok(None);
        };
        self.cycle.advance(CyclePhase::InFlight);
        self.arm_spinner();

        let result = self.exchange().await;

        self.finish_update();
        pass.end();
        result.map(Some)
    }

    /// Manual refresh. A refresh dropped by the gate is owed to the next change check.
    pub async fn refresh(&self) -> Option<bool> {
        match self.set_preview_data().await {
            Ok(Some(is_valid)) => Some(is_valid),
            Ok(None) => {
                self.state.lock().refresh_owed = true;
                None
            }
            Err(err) => {
                self.report_failure(&err);
                None
            }
        }
    }

    pub async fn set_mode(&self, mode: impl Into<String>) -> Option<bool> {
        let mode = mode.into();
        info!(%mode, "preview: mode changed");
        self.state.lock().mode = Some(mode);
        self.refresh().await
    }

    /// Starts the periodic change check, or sends once when auto update is off.
    pub fn show(self: &Arc<Self>) {
        if !self.config.auto_update {
            let preview = Arc::clone(self);
            tokio::spawn(async move {
                preview.refresh().await;
            });
            return;
        }

        self.check_and_update();
        let weak = Arc::downgrade(self);
        let period = self.config.interval;
        let task = tokio::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(preview) = weak.upgrade() else {
                    break;
                };
                preview.check_and_update();
            }
        });
        if let Some(previous) = self.state.lock().recheck.replace(task) {
            previous.abort();
        }
    }

    pub fn hide(&self) {
        if let Some(task) = self.state.lock().recheck.take() {
            task.abort();
        }
        self.debounced.cancel();
    }

    pub fn is_shown(&self) -> bool {
        self.state.lock().recheck.is_some()
    }

    async fn exchange(&self) -> Result<bool, WidgetError> {
        let url = self.config.preview_url.as_str();
        let options = RequestOptions::post(self.form.payload())
            .header("content-type", FORM_CONTENT_TYPE);
        let response = self
            .client
            .request(url, options)
            .await?
            .error_for_status(url)?;
        let status: PreviewState = response.json(url)?;
        self.apply_status(status);

        if status.is_valid {
            self.reload().await?;
        } else if self.take_first_clear() {
            if let Err(err) = self.clear_preview_data().await {
                warn!(error = %err, "preview: clearing stored preview data failed");
            }
            self.reload().await?;
        }
        let _ = self.events.send(PreviewEvent::Refreshed {
            is_valid: status.is_valid,
        });
        Ok(status.is_valid)
    }

    /// Drops the server-side preview data so the frame shows the saved object.
    pub async fn clear_preview_data(&self) -> Result<(), WidgetError> {
        let url = self.config.preview_url.as_str();
        let mut options = RequestOptions::delete();
        if let Some((name, token)) = &self.config.csrf {
            options = options.header(name.as_str(), token.as_str());
        }
        self.client
            .request(url, options)
            .await?
            .error_for_status(url)?;
        let _ = self.events.send(PreviewEvent::Cleared);
        Ok(())
    }

    async fn reload(&self) -> Result<(), WidgetError> {
        self.cycle.advance(CyclePhase::Swapping);
        let events = self.events.clone();
        let outcome = self
            .frame
            .swap_with(self.frame_url(), move |_| {
                let _ = events.send(PreviewEvent::ChecksRequested);
            })
            .await?;
        if let SwapOutcome::Superseded { ticket } = outcome {
            debug!(%ticket, "preview: frame superseded before it loaded");
            self.cycle.advance(CyclePhase::Invalidated);
        }
        Ok(())
    }

    fn take_changes(&self) -> bool {
        let payload = self.form.payload();
        let mut state = self.state.lock();
        let owed = std::mem::take(&mut state.refresh_owed);
        if state.last_payload == payload {
            return owed;
        }
        state.last_payload = payload;
        true
    }

    /// True only the first time the server reports invalid data since the last valid response.
    fn take_first_clear(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.cleared, true)
    }

    fn apply_status(&self, status: PreviewState) {
        let mut state = self.state.lock();
        state.has_errors = !status.is_valid;
        state.unavailable = !status.is_available;
        if status.is_valid {
            state.cleared = false;
        }
        let _ = self.events.send(PreviewEvent::StatusChanged {
            has_errors: state.has_errors,
            unavailable: state.unavailable,
        });
    }

    fn arm_spinner(&self) {
        let visible = Arc::clone(&self.spinner_visible);
        let events = self.events.clone();
        let handle = self.timer.after(
            self.config.spinner_delay,
            Box::new(move || {
                visible.store(true, Ordering::Release);
                let _ = events.send(PreviewEvent::SpinnerShown);
            }),
        );
        if let Some(previous) = self.state.lock().spinner.replace(handle) {
            previous.cancel();
        }
    }

    fn finish_update(&self) {
        if let Some(spinner) = self.state.lock().spinner.take() {
            spinner.cancel();
        }
        if self.spinner_visible.swap(false, Ordering::AcqRel) {
            let _ = self.events.send(PreviewEvent::SpinnerHidden);
        }
        self.cycle.settle();
    }

    fn report_failure(&self, err: &WidgetError) {
        error!(error = %err, "preview: error while sending preview data");
        let _ = self.events.send(PreviewEvent::Failed {
            message: format!("Error while sending preview data: {err}"),
        });
    }
}

impl<H: ResourceHost<Config = Url>> Drop for PreviewSync<H> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(task) = state.recheck.take() {
            task.abort();
        }
        if let Some(spinner) = state.spinner.take() {
            spinner.cancel();
        }
    }
}

fn set_query_param(url: &mut Url, name: &str, value: Option<&str>) {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if let Some(value) = value {
        pairs.push((name.to_string(), value.to_string()));
    }
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

#[cfg(test)]
#[path = "tests/preview_tests.rs"]
mod tests;
