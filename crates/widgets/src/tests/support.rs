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
use shared::{
    domain::Viewport,
    error::RequestError,
    protocol::{Method, RequestOptions, Response},
};
use tokio::sync::{oneshot, watch};
use url::Url;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type Reply = Result<Response, RequestError>;

/// Records every request. Held requests stay pending until answered by index.
#[derive(Default)]
pub struct ScriptedClient {
    hold: AtomicBool,
    replies: Mutex<BTreeMap<Method, Response>>,
    requests: Mutex<Vec<Recorded>>,
    pending: Mutex<Vec<Option<oneshot::Sender<Reply>>>>,
}

impl ScriptedClient {
    pub fn holding() -> Arc<Self> {
        let client = Self::default();
        client.hold.store(true, Ordering::SeqCst);
        Arc::new(client)
    }

    pub fn replying() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_with(&self, method: Method, response: Response) {
        self.replies.lock().insert(method, response);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    pub fn respond(&self, index: usize, reply: Reply) {
        let sender = self
            .pending
            .lock()
            .get_mut(index)
            .and_then(Option::take)
            .expect("request is pending");
        let _ = sender.send(reply);
    }

    fn default_reply(&self, method: Method) -> Response {
        self.replies
            .lock()
            .get(&method)
            .cloned()
            .unwrap_or_else(|| Response::new(200, ""))
    }
}

#[async_trait]
impl RequestClient for ScriptedClient {
    async fn request(&self, url: &str, options: RequestOptions) -> Result<Response, RequestError> {
        let method = options.method;
        self.requests.lock().push(Recorded {
            url: url.to_string(),
            method,
            headers: options.headers,
            body: options.body,
        });
        if !self.hold.load(Ordering::SeqCst) {
            return Ok(self.default_reply(method));
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().push(Some(tx));
        rx.await.unwrap_or_else(|_| {
            Err(RequestError::Transport {
                url: url.to_string(),
                message: "script dropped".to_string(),
            })
        })
    }
}

pub struct Frame {
    pub id: u64,
    pub attributes: Mutex<BTreeMap<String, String>>,
    pub viewport: Mutex<Viewport>,
    pub visible: AtomicBool,
    loaded: watch::Sender<bool>,
}

impl Frame {
    pub fn src(&self) -> Option<String> {
        self.attributes.lock().get("src").cloned()
    }
}

/// Frames load immediately unless the host is told to hold them.
#[derive(Default)]
pub struct FrameHost {
    next_id: AtomicU64,
    hold_loading: AtomicBool,
    frames: Mutex<Vec<Arc<Frame>>>,
}

impl FrameHost {
    pub fn mount(&self, src: &str) -> Arc<Frame> {
        let frame = self.create();
        self.set_attribute(&frame, "src", src);
        self.set_attribute(&frame, "class", "preview-iframe");
        frame.loaded.send_replace(true);
        frame.visible.store(true, Ordering::SeqCst);
        frame
    }

    pub fn hold_loading(&self) {
        self.hold_loading.store(true, Ordering::SeqCst);
    }

    pub fn finish_loading(&self, id: u64) {
        if let Some(frame) = self.frames.lock().iter().find(|frame| frame.id == id) {
            frame.loaded.send_replace(true);
        }
    }

    pub fn created(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn visible(&self) -> Vec<u64> {
        self.frames
            .lock()
            .iter()
            .filter(|frame| frame.visible.load(Ordering::SeqCst))
            .map(|frame| frame.id)
            .collect()
    }
}

#[async_trait]
impl ResourceHost for FrameHost {
    type Resource = Arc<Frame>;
    type Config = Url;

    fn create(&self) -> Arc<Frame> {
        let (loaded, _) = watch::channel(false);
        let frame = Arc::new(Frame {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            attributes: Mutex::new(BTreeMap::new()),
            viewport: Mutex::new(Viewport::default()),
            visible: AtomicBool::new(false),
            loaded,
        });
        self.frames.lock().push(Arc::clone(&frame));
        frame
    }

    fn configure(&self, resource: &Arc<Frame>, config: &Url) {
        self.set_attribute(resource, "src", config.as_str());
        if !self.hold_loading.load(Ordering::SeqCst) {
            resource.loaded.send_replace(true);
        }
    }

    fn insert_invisible(&self, _anchor: &Arc<Frame>, _incoming: &Arc<Frame>) {}

    async fn ready(&self, resource: &Arc<Frame>) {
        let mut loaded = resource.loaded.subscribe();
        let _ = loaded.wait_for(|loaded| *loaded).await;
    }

    fn identity_attribute(&self) -> &str {
        "src"
    }

    fn attributes(&self, resource: &Arc<Frame>) -> Vec<(String, String)> {
        resource
            .attributes
            .lock()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn set_attribute(&self, resource: &Arc<Frame>, name: &str, value: &str) {
        resource
            .attributes
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    fn viewport(&self, resource: &Arc<Frame>) -> Viewport {
        *resource.viewport.lock()
    }

    fn restore_viewport(&self, resource: &Arc<Frame>, viewport: Viewport) {
        *resource.viewport.lock() = viewport;
    }

    fn remove(&self, resource: &Arc<Frame>) {
        resource.visible.store(false, Ordering::SeqCst);
    }

    fn reveal(&self, resource: &Arc<Frame>) {
        resource.visible.store(true, Ordering::SeqCst);
    }
}

pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
