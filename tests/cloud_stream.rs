mod common;

use std::{
    sync::{atomic::AtomicBool, Arc, Mutex},
    time::Duration,
};

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chat_backend_streams::{
    backend::{
        blocking::NonStreamingAdapter,
        cloud::{CloudBackend, CloudCompletion},
        image::ImageGenerationBackend,
        sse::Framing,
        ChatBackend,
    },
    exchange::{spawn_exchange, ExchangeStatus},
    metrics::ExchangeMetrics,
    models::{BackendModel, ChatEvent, ImageDialect, ProviderConfig, WireMessage},
};
use common::{chunk, collect_events, endless_sse, serve, sse, wait_for};
use serde_json::{json, Value};

const CHAT_PATH: &str = "/v1/chat/completions";

fn provider(base: &str, credential: &str) -> ProviderConfig {
    ProviderConfig::new("TestCloud", format!("{base}{CHAT_PATH}"), credential)
}

fn streaming(base: &str) -> CloudBackend {
    CloudBackend::new(reqwest::Client::new(), provider(base, "sk-test"), Framing::default())
}

fn conversation() -> Vec<WireMessage> {
    vec![WireMessage::system("You are a helpful assistant."), WireMessage::user("hi")]
}

fn model() -> BackendModel {
    BackendModel::from_code("test-model")
}

#[tokio::test]
async fn streams_chunks_until_sentinel() {
    let seen = Arc::new(Mutex::new(None::<(String, Value)>));
    let recorder = Arc::clone(&seen);
    let app = Router::new().route(
        CHAT_PATH,
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let recorder = Arc::clone(&recorder);
            async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                *recorder.lock().expect("recorder lock") = Some((auth, body));
                sse(
                    vec![
                        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                        "data: [DONE]\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
                    ],
                    Duration::ZERO,
                )
            }
        }),
    );
    let base = serve(app).await;

    let events = collect_events(streaming(&base).stream(conversation(), model())).await;
    assert_eq!(events, vec![chunk("Hel"), chunk("lo"), ChatEvent::Done]);

    let (auth, body) = seen
        .lock()
        .expect("recorder lock")
        .clone()
        .expect("request should reach the server");
    assert_eq!(auth, "Bearer sk-test");
    assert_eq!(body["stream"], true);
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hi");
}

#[tokio::test]
async fn frames_split_across_reads_are_reassembled() {
    let app = Router::new().route(
        CHAT_PATH,
        post(|| async {
            sse(
                vec![
                    "data: {\"choices\":[{\"del",
                    "ta\":{\"content\":\"wor\"}}]}\r\n\r\nda",
                    "ta: {\"choices\":[{\"delta\":{\"content\":\"ld\"}}]}\n",
                    "\ndata: [DO",
                    "NE]\n",
                ],
                Duration::from_millis(15),
            )
        }),
    );
    let base = serve(app).await;

    let events = collect_events(streaming(&base).stream(conversation(), model())).await;
    assert_eq!(events, vec![chunk("wor"), chunk("ld"), ChatEvent::Done]);
}

#[tokio::test]
async fn http_failure_is_a_single_error() {
    let app = Router::new().route(
        CHAT_PATH,
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
    );
    let base = serve(app).await;

    let events = collect_events(streaming(&base).stream(conversation(), model())).await;
    assert_eq!(
        events,
        vec![ChatEvent::Error("HTTP 401: Unauthorized - invalid api key".to_owned())]
    );
}

#[tokio::test]
async fn close_without_sentinel_still_completes() {
    let app = Router::new().route(
        CHAT_PATH,
        post(|| async {
            sse(
                vec![
                    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
                    "data: not json at all\n\n",
                    "data: {\"choices\":[{\"text\":\"B\"}]}",
                ],
                Duration::ZERO,
            )
        }),
    );
    let base = serve(app).await;

    let events = collect_events(streaming(&base).stream(conversation(), model())).await;
    assert_eq!(
        events,
        vec![chunk("A"), chunk("not json at all"), chunk("B"), ChatEvent::Done]
    );
}

#[tokio::test]
async fn empty_success_body_is_an_error() {
    let app = Router::new().route(CHAT_PATH, post(|| async { StatusCode::OK.into_response() }));
    let base = serve(app).await;

    let events = collect_events(streaming(&base).stream(conversation(), model())).await;
    assert_eq!(events, vec![ChatEvent::Error("response body is empty".to_owned())]);
}

#[tokio::test]
async fn read_failure_mid_stream_is_a_network_error() {
    let app = Router::new().route(
        CHAT_PATH,
        post(|| async {
            let body = async_stream::stream! {
                yield Ok::<_, std::io::Error>(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n".to_owned(),
                );
                tokio::time::sleep(Duration::from_millis(20)).await;
                yield Err(std::io::Error::other("upstream reset"));
            };
            (
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(body),
            )
        }),
    );
    let base = serve(app).await;

    let events = collect_events(streaming(&base).stream(conversation(), model())).await;
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert_eq!(events[0], chunk("A"));
    assert!(
        matches!(&events[1], ChatEvent::Error(message) if message.starts_with("network error")),
        "events: {events:?}"
    );
}

#[tokio::test]
async fn missing_credential_never_reaches_the_network() {
    let backend = CloudBackend::new(
        reqwest::Client::new(),
        provider("http://127.0.0.1:9", "  "),
        Framing::default(),
    );
    assert!(!backend.is_available());

    let events = collect_events(backend.stream(conversation(), model())).await;
    assert_eq!(
        events,
        vec![ChatEvent::Error("missing API credential for provider TestCloud".to_owned())]
    );
}

#[tokio::test]
async fn unreachable_provider_is_a_network_error() {
    let backend = CloudBackend::new(
        reqwest::Client::new(),
        provider("http://127.0.0.1:9", "sk-test"),
        Framing::default(),
    );

    let events = collect_events(backend.stream(conversation(), model())).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ChatEvent::Error(message) if message.starts_with("network error")));
}

#[tokio::test]
async fn cancelling_an_exchange_releases_the_connection() {
    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);
    let app = Router::new().route(
        CHAT_PATH,
        post(move || {
            let flag = Arc::clone(&flag);
            async move { endless_sse(flag) }
        }),
    );
    let base = serve(app).await;

    let metrics = Arc::new(ExchangeMetrics::new());
    let mut exchange = spawn_exchange(
        Arc::new(streaming(&base)),
        conversation(),
        model(),
        Arc::clone(&metrics),
    );
    assert_eq!(exchange.next_event().await, Some(chunk("tick")));
    assert_eq!(exchange.next_event().await, Some(chunk("tick")));

    exchange.cancel();
    assert_eq!(exchange.next_event().await, None);
    assert!(wait_for(&released).await, "server should see the client go away");

    assert_eq!(exchange.join().await, ExchangeStatus::Cancelled);
    assert_eq!(metrics.exchanges("TestCloud", "cancelled"), 1);
    assert_eq!(metrics.inflight(), 0);
}

#[tokio::test]
async fn non_streaming_completion_is_one_chunk() {
    let app = Router::new().route(
        CHAT_PATH,
        post(|Json(body): Json<Value>| async move {
            assert!(body.get("stream").is_none());
            Json(json!({"choices": [{"message": {"role": "assistant", "content": "whole reply"}}]}))
        }),
    );
    let base = serve(app).await;
    let backend = NonStreamingAdapter::new(CloudCompletion::new(
        reqwest::Client::new(),
        provider(&base, "sk-test"),
        Duration::from_secs(5),
    ));

    let events = collect_events(backend.stream(conversation(), model())).await;
    assert_eq!(events, vec![chunk("whole reply"), ChatEvent::Done]);
}

#[tokio::test]
async fn non_streaming_failure_has_no_chunks() {
    let app = Router::new().route(
        CHAT_PATH,
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "") }),
    );
    let base = serve(app).await;
    let backend = NonStreamingAdapter::new(CloudCompletion::new(
        reqwest::Client::new(),
        provider(&base, "sk-test"),
        Duration::from_secs(5),
    ));

    let events = collect_events(backend.stream(conversation(), model())).await;
    assert_eq!(events, vec![ChatEvent::Error("HTTP 500: Internal Server Error".to_owned())]);
}

#[tokio::test]
async fn image_generation_returns_urls() {
    let app = Router::new().route(
        "/v1/images/generations",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["prompt"], "a red fox");
            assert_eq!(body["image_size"], "1024x1024");
            Json(json!({"images": [{"url": "https://img.test/1.png"}, {"url": "https://img.test/2.png"}]}))
        }),
    );
    let base = serve(app).await;
    let provider = ProviderConfig::new(
        "SiliconFlow Images",
        format!("{base}/v1/images/generations"),
        "sk-test",
    );
    let backend = NonStreamingAdapter::new(ImageGenerationBackend::new(
        reqwest::Client::new(),
        provider,
        ImageDialect::SiliconFlow,
        Duration::from_secs(5),
    ));

    let events = collect_events(backend.stream(
        vec![WireMessage::system("sys"), WireMessage::user("a red fox")],
        BackendModel::from_code("Kwai-Kolors/Kolors"),
    ))
    .await;
    assert_eq!(
        events,
        vec![chunk("https://img.test/1.png\nhttps://img.test/2.png"), ChatEvent::Done]
    );
}
