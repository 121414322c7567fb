use super::*;

use coordination::FlickerFreeSwap;
use shared::{error::RequestError, protocol::Response};

struct Documents;

#[async_trait]
impl RequestClient for Documents {
    async fn request(&self, url: &str, _options: RequestOptions) -> Result<Response, RequestError> {
        if url.contains("broken") {
            return Err(RequestError::Transport {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(Response::new(200, format!("<html>{url}</html>")))
    }
}

fn url(raw: &str) -> Url {
    Url::parse(raw).expect("url")
}

#[tokio::test]
async fn swap_fetches_document_and_carries_attributes() {
    let host = Arc::new(HeadlessFrameHost::new(Arc::new(Documents)));
    let initial = host.mount(&url("http://cms.test/preview/?rev=1"));
    host.set_attribute(&initial, "title", "Preview");
    host.restore_viewport(&initial, Viewport::new(0.0, 120.0));
    let swap = FlickerFreeSwap::new(Arc::clone(&host), Arc::clone(&initial), None);

    let outcome = swap
        .swap(url("http://cms.test/preview/?rev=2"))
        .await
        .expect("swap");

    assert!(outcome.is_swapped());
    assert!(!initial.is_visible());
    swap.with_current(|frame| {
        assert!(frame.is_visible());
        assert_eq!(frame.src().as_deref(), Some("http://cms.test/preview/?rev=2"));
        assert_eq!(
            frame.document().as_deref(),
            Some("<html>http://cms.test/preview/?rev=2</html>")
        );
        assert_eq!(host.viewport(frame), Viewport::new(0.0, 120.0));
        assert!(host
            .attributes(frame)
            .contains(&("title".to_string(), "Preview".to_string())));
    });
}

#[tokio::test]
async fn failed_load_still_resolves_readiness() {
    let host = Arc::new(HeadlessFrameHost::new(Arc::new(Documents)));
    let initial = host.mount(&url("http://cms.test/preview/"));
    let swap = FlickerFreeSwap::new(Arc::clone(&host), initial, None);

    let outcome = swap
        .swap(url("http://cms.test/preview/broken"))
        .await
        .expect("swap");

    assert!(outcome.is_swapped());
    swap.with_current(|frame| assert_eq!(frame.document(), None));
}
