//! Preview frame without a renderer: a frame is ready once its document has been fetched.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use coordination::{RequestClient, ResourceHost};
use parking_lot::Mutex;
use shared::{domain::Viewport, protocol::RequestOptions};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug)]
pub struct HeadlessFrame {
    pub id: u64,
    attributes: Mutex<BTreeMap<String, String>>,
    viewport: Mutex<Viewport>,
    visible: AtomicBool,
    document: Mutex<Option<String>>,
}

impl HeadlessFrame {
    pub fn src(&self) -> Option<String> {
        self.attributes.lock().get("src").cloned()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Fetched document, if the load succeeded.
    pub fn document(&self) -> Option<String> {
        self.document.lock().clone()
    }
}

pub struct HeadlessFrameHost {
    client: Arc<dyn RequestClient>,
    next_id: AtomicU64,
}

impl HeadlessFrameHost {
    pub fn new(client: Arc<dyn RequestClient>) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(0),
        }
    }

    /// Frame already on screen when the panel opens.
    pub fn mount(&self, src: &Url) -> Arc<HeadlessFrame> {
        let frame = self.create();
        self.configure(&frame, src);
        frame.visible.store(true, Ordering::Release);
        frame
    }
}

#[async_trait]
impl ResourceHost for HeadlessFrameHost {
    type Resource = Arc<HeadlessFrame>;
    type Config = Url;

    fn create(&self) -> Arc<HeadlessFrame> {
        Arc::new(HeadlessFrame {
            id: self.next_id.fetch_add(1, Ordering::AcqRel),
            attributes: Mutex::new(BTreeMap::new()),
            viewport: Mutex::new(Viewport::default()),
            visible: AtomicBool::new(false),
            document: Mutex::new(None),
        })
    }

    fn configure(&self, resource: &Arc<HeadlessFrame>, config: &Url) {
        self.set_attribute(resource, "src", config.as_str());
    }

    fn insert_invisible(&self, anchor: &Arc<HeadlessFrame>, incoming: &Arc<HeadlessFrame>) {
        debug!(anchor = anchor.id, incoming = incoming.id, "frame: inserted hidden");
    }

    // A frame fires its load event even for error pages, so failures still resolve readiness.
    async fn ready(&self, resource: &Arc<HeadlessFrame>) {
        let Some(src) = resource.src() else {
            return;
        };
        match self.client.request(&src, RequestOptions::get()).await {
            Ok(response) => {
                if !response.ok {
                    warn!(frame = resource.id, status = response.status, "frame: document loaded with error status");
                }
                *resource.document.lock() = Some(response.body);
            }
            Err(err) => warn!(frame = resource.id, error = %err, "frame: document failed to load"),
        }
    }

    fn identity_attribute(&self) -> &str {
        "src"
    }

    fn attributes(&self, resource: &Arc<HeadlessFrame>) -> Vec<(String, String)> {
        resource
            .attributes
            .lock()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn set_attribute(&self, resource: &Arc<HeadlessFrame>, name: &str, value: &str) {
        resource
            .attributes
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    fn viewport(&self, resource: &Arc<HeadlessFrame>) -> Viewport {
        *resource.viewport.lock()
    }

    fn restore_viewport(&self, resource: &Arc<HeadlessFrame>, viewport: Viewport) {
        *resource.viewport.lock() = viewport;
    }

    fn remove(&self, resource: &Arc<HeadlessFrame>) {
        resource.visible.store(false, Ordering::Release);
        debug!(frame = resource.id, "frame: removed");
    }

    fn reveal(&self, resource: &Arc<HeadlessFrame>) {
        resource.visible.store(true, Ordering::Release);
        debug!(frame = resource.id, "frame: revealed");
    }
}

#[cfg(test)]
#[path = "tests/frame_tests.rs"]
mod tests;
