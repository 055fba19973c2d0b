use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    backend::{
        blocking::CompletionBackend,
        sse::{Framing, LineEvent, SseDecoder},
        ChatBackend, EventStream,
    },
    errors::ChatError,
    models::{BackendModel, ChatEvent, ProviderConfig, WireMessage},
};

pub const TEMPERATURE: f64 = 0.7;

#[derive(Clone)]
pub struct CloudBackend {
    client: reqwest::Client,
    provider: ProviderConfig,
    framing: Framing,
}

impl CloudBackend {
    /// `client` must not carry a total request timeout: a generation may keep
    /// the response open for as long as it runs.
    pub fn new(client: reqwest::Client, provider: ProviderConfig, framing: Framing) -> Self {
        Self {
            client,
            provider,
            framing,
        }
    }
}

impl ChatBackend for CloudBackend {
    fn name(&self) -> &str {
        &self.provider.name
    }

    fn is_available(&self) -> bool {
        self.provider.has_credential()
    }

    fn stream(&self, messages: Vec<WireMessage>, model: BackendModel) -> EventStream {
        let client = self.client.clone();
        let provider = self.provider.clone();
        let framing = self.framing;

        let stream = async_stream::stream! {
            if !provider.has_credential() {
                yield ChatEvent::from(ChatError::MissingCredential(provider.name.clone()));
                return;
            }

            let payload = chat_payload(&model, &messages, true);
            let response = match client
                .post(&provider.endpoint)
                .bearer_auth(provider.credential.trim())
                .json(&payload)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    warn!(provider = %provider.name, error = %error, "stream request failed");
                    yield ChatEvent::from(ChatError::from(error));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(provider = %provider.name, status = status.as_u16(), "provider rejected stream request");
                yield ChatEvent::from(ChatError::http_status(status, &body));
                return;
            }
            if response.content_length() == Some(0) {
                yield ChatEvent::from(ChatError::EmptyBody);
                return;
            }

            debug!(provider = %provider.name, model = %model.api_code, "stream opened");

            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new(framing);
            let mut received = 0usize;

            while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        warn!(provider = %provider.name, error = %error, "stream read failed");
                        yield ChatEvent::from(ChatError::from(error));
                        return;
                    }
                };
                received += bytes.len();

                let lines = match decoder.push(&bytes) {
                    Ok(lines) => lines,
                    Err(error) => {
                        warn!(provider = %provider.name, error = %error, "stream framing broken");
                        yield ChatEvent::from(error);
                        return;
                    }
                };
                for line in lines {
                    match line {
                        LineEvent::Skip => {}
                        LineEvent::Chunk(text) => yield ChatEvent::Chunk(text),
                        LineEvent::Done => {
                            debug!(provider = %provider.name, received, "stream sentinel received");
                            yield ChatEvent::Done;
                            return;
                        }
                    }
                }
            }

            if received == 0 {
                yield ChatEvent::from(ChatError::EmptyBody);
                return;
            }

            match decoder.finish() {
                Some(LineEvent::Chunk(text)) => yield ChatEvent::Chunk(text),
                Some(LineEvent::Done) | Some(LineEvent::Skip) | None => {}
            }

            debug!(provider = %provider.name, received, "stream closed by remote");
            yield ChatEvent::Done;
        };

        stream.boxed()
    }
}

#[derive(Clone)]
pub struct CloudCompletion {
    client: reqwest::Client,
    provider: ProviderConfig,
    timeout: Duration,
}

impl CloudCompletion {
    pub fn new(
        client: reqwest::Client,
        provider: ProviderConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            provider,
            timeout,
        }
    }
}

#[async_trait]
impl CompletionBackend for CloudCompletion {
    fn name(&self) -> &str {
        &self.provider.name
    }

    fn is_available(&self) -> bool {
        self.provider.has_credential()
    }

    async fn complete(
        &self,
        messages: &[WireMessage],
        model: &BackendModel,
    ) -> Result<String, ChatError> {
        if !self.provider.has_credential() {
            return Err(ChatError::MissingCredential(self.provider.name.clone()));
        }

        let response = self
            .client
            .post(&self.provider.endpoint)
            .bearer_auth(self.provider.credential.trim())
            .timeout(self.timeout)
            .json(&chat_payload(model, messages, false))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::http_status(status, &body));
        }
        if body.trim().is_empty() {
            return Err(ChatError::EmptyBody);
        }

        Ok(completion_text(&body).unwrap_or_else(|error| {
            warn!(provider = %self.provider.name, error = %error, "completion body not understood, forwarding raw text");
            body
        }))
    }
}

fn completion_text(body: &str) -> Result<String, ChatError> {
    let value = serde_json::from_str::<Value>(body)
        .map_err(|error| ChatError::Parse(error.to_string()))?;
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| ChatError::Parse("missing choices[0].message.content".to_owned()))
}

pub fn chat_payload(model: &BackendModel, messages: &[WireMessage], stream: bool) -> Value {
    let mut payload = json!({
        "model": model.api_code,
        "messages": messages,
        "temperature": TEMPERATURE,
    });
    if stream {
        payload["stream"] = Value::Bool(true);
    }
    payload
}
