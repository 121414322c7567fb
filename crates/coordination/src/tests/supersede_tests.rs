use super::*;

use std::sync::Arc;

use async_trait::async_trait;
use shared::{domain::OperationKind, error::ErrorCode};
use tokio::sync::oneshot;

#[test]
fn begin_cancels_previous_token_of_same_kind() {
    let canceller = SupersessionCanceller::new();
    let first = canceller.begin(OperationKind::Search);
    assert!(!first.is_cancelled());

    let second = canceller.begin(OperationKind::Search);
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert!(second.id() > first.id());
}

#[test]
fn kinds_do_not_supersede_each_other() {
    let canceller = SupersessionCanceller::new();
    let search = canceller.begin(OperationKind::Search);
    let tags = canceller.begin(OperationKind::Autocomplete);

    assert!(!search.is_cancelled());
    assert!(!tags.is_cancelled());
}

#[test]
fn finish_only_clears_its_own_attempt() {
    let canceller = SupersessionCanceller::new();
    let first = canceller.begin(OperationKind::Search);
    let second = canceller.begin(OperationKind::Search);

    canceller.finish(&OperationKind::Search, &first);
    assert!(canceller.is_in_flight(&OperationKind::Search));

    canceller.finish(&OperationKind::Search, &second);
    assert!(!canceller.is_in_flight(&OperationKind::Search));
}

#[test]
fn cancel_all_flips_every_token() {
    let canceller = SupersessionCanceller::new();
    let search = canceller.begin(OperationKind::Search);
    let tags = canceller.begin(OperationKind::Autocomplete);

    canceller.cancel_all();
    assert!(search.is_cancelled());
    assert!(tags.is_cancelled());
    assert!(!canceller.is_in_flight(&OperationKind::Search));
}

#[tokio::test]
async fn superseded_run_reports_superseded_and_applies_nothing() {
    let canceller = Arc::new(SupersessionCanceller::new());
    let applied = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let (release_first, first_gate) = oneshot::channel::<()>();

    let first = {
        let canceller = Arc::clone(&canceller);
        let applied = Arc::clone(&applied);
        tokio::spawn(async move {
            let outcome = canceller
                .run(OperationKind::Search, |_token| async move {
                    let _ = first_gate.await;
                    Ok::<_, RequestError>("first")
                })
                .await
                .expect("superseded is not an error");
            if let AttemptOutcome::Completed(value) = &outcome {
                applied.lock().push(*value);
            }
            outcome
        })
    };
    tokio::task::yield_now().await;
    assert!(canceller.is_in_flight(&OperationKind::Search));

    let second = canceller
        .run(OperationKind::Search, |_token| async {
            Ok::<_, RequestError>("second")
        })
        .await
        .expect("second");
    applied.lock().push(second.clone().completed().expect("completed"));

    let _ = release_first.send(());
    let first = first.await.expect("task");

    assert!(first.is_superseded());
    assert_eq!(*applied.lock(), vec!["second"]);
}

#[tokio::test]
async fn superseded_failure_is_not_surfaced() {
    let canceller = Arc::new(SupersessionCanceller::new());
    let (started_tx, started_rx) = oneshot::channel::<()>();

    let first = {
        let canceller = Arc::clone(&canceller);
        tokio::spawn(async move {
            canceller
                .run(OperationKind::Autocomplete, |token| async move {
                    let _ = started_tx.send(());
                    token.cancelled().await;
                    Err::<(), _>(RequestError::Transport {
                        url: "/tags".into(),
                        message: "aborted".into(),
                    })
                })
                .await
        })
    };
    started_rx.await.expect("first started");

    let _second = canceller.begin(OperationKind::Autocomplete);
    let first = first.await.expect("task");
    assert_eq!(first, Ok(AttemptOutcome::Superseded));
}

#[tokio::test]
async fn current_attempt_failure_propagates() {
    let canceller = SupersessionCanceller::new();
    let err = canceller
        .run(OperationKind::Search, |_token| async {
            Err::<(), _>(RequestError::Status {
                url: "/search".into(),
                status: 500,
            })
        })
        .await
        .expect_err("genuine failure");

    assert_eq!(err.code(), ErrorCode::HttpStatus);
    assert!(!canceller.is_in_flight(&OperationKind::Search));
}

struct FixedClient {
    status: u16,
    body: &'static str,
}

#[async_trait]
impl RequestClient for FixedClient {
    async fn request(&self, _url: &str, _options: RequestOptions) -> Result<Response, RequestError> {
        Ok(Response::new(self.status, self.body))
    }
}

#[tokio::test]
async fn request_maps_non_ok_status_to_error() {
    let canceller = SupersessionCanceller::new();
    let client = FixedClient {
        status: 404,
        body: "",
    };

    let err = canceller
        .request(
            OperationKind::Search,
            &client,
            "/admin/search/?q=x",
            RequestOptions::get(),
        )
        .await
        .expect_err("404");

    assert_eq!(
        err,
        RequestError::Status {
            url: "/admin/search/?q=x".into(),
            status: 404,
        }
    );
}

#[tokio::test]
async fn request_returns_body_of_current_attempt() {
    let canceller = SupersessionCanceller::new();
    let client = FixedClient {
        status: 200,
        body: "<li>result</li>",
    };

    let outcome = canceller
        .request(OperationKind::Search, &client, "/s", RequestOptions::get())
        .await
        .expect("ok");

    assert_eq!(
        outcome.completed().map(|response| response.body),
        Some("<li>result</li>".to_string())
    );
}
