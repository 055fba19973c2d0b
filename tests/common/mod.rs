#![allow(dead_code)]

use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_stream::stream;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use chat_backend_streams::models::ChatEvent;
use futures_util::{Stream, StreamExt};
use tokio::time::{sleep, timeout};

pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("test server should run");
    });
    format!("http://{addr}")
}

/// An SSE response whose body arrives as the given pieces, `gap` apart.
pub fn sse(pieces: Vec<&'static str>, gap: Duration) -> Response {
    let body = stream! {
        for (index, piece) in pieces.into_iter().enumerate() {
            if index > 0 {
                sleep(gap).await;
            }
            yield Ok::<_, Infallible>(piece.to_owned());
        }
    };
    event_stream(body)
}

pub fn event_stream<S>(body: S) -> Response
where
    S: Stream<Item = Result<String, Infallible>> + Send + 'static,
{
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

/// Sets its flag when the server lets go of the response body.
pub struct ReleaseFlag(pub Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// An SSE body that never ends on its own.
pub fn endless_sse(released: Arc<AtomicBool>) -> Response {
    let body = stream! {
        let _release = ReleaseFlag(released);
        loop {
            yield Ok::<_, Infallible>(
                "data: {\"choices\":[{\"delta\":{\"content\":\"tick\"}}]}\n\n".to_owned(),
            );
            sleep(Duration::from_millis(10)).await;
        }
    };
    event_stream(body)
}

pub async fn wait_for(flag: &AtomicBool) -> bool {
    timeout(Duration::from_secs(3), async {
        while !flag.load(Ordering::SeqCst) {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

pub async fn collect_events<S>(events: S) -> Vec<ChatEvent>
where
    S: Stream<Item = ChatEvent>,
{
    timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
        .await
        .expect("event stream should finish")
}

pub fn chunk(text: &str) -> ChatEvent {
    ChatEvent::Chunk(text.to_owned())
}
