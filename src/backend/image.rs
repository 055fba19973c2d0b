use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    backend::blocking::CompletionBackend,
    errors::ChatError,
    models::{BackendModel, ImageDialect, ProviderConfig, WireMessage},
};

const IMAGE_SIZE: &str = "1024x1024";

#[derive(Clone)]
pub struct ImageGenerationBackend {
    client: reqwest::Client,
    provider: ProviderConfig,
    dialect: ImageDialect,
    timeout: Duration,
}

impl ImageGenerationBackend {
    pub fn new(
        client: reqwest::Client,
        provider: ProviderConfig,
        dialect: ImageDialect,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            provider,
            dialect,
            timeout,
        }
    }
}

#[async_trait]
impl CompletionBackend for ImageGenerationBackend {
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

        let prompt = messages
            .last()
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let payload = image_payload(self.dialect, model, prompt);

        let response = self
            .client
            .post(&self.provider.endpoint)
            .bearer_auth(self.provider.credential.trim())
            .timeout(self.timeout)
            .json(&payload)
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

        debug!(provider = %self.provider.name, dialect = ?self.dialect, "image generation finished");
        Ok(render_result(&body))
    }
}

pub fn image_payload(dialect: ImageDialect, model: &BackendModel, prompt: &str) -> Value {
    match dialect {
        ImageDialect::SiliconFlow => json!({
            "model": model.api_code,
            "prompt": prompt,
            "negative_prompt": "",
            "image_size": IMAGE_SIZE,
            "batch_size": 1,
            "seed": 4_999_999_999_u64,
            "num_inference_steps": 20,
            "guidance_scale": 7.5,
            "cfg": 10.05,
        }),
        ImageDialect::Standard => json!({
            "model": model.api_code,
            "prompt": prompt,
            "n": 1,
            "size": IMAGE_SIZE,
        }),
    }
}

pub fn extract_image_urls(value: &Value) -> Vec<String> {
    ["images", "data"]
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_array))
        .flatten()
        .filter_map(|item| item.get("url").and_then(Value::as_str))
        .map(ToOwned::to_owned)
        .collect()
}

fn render_result(body: &str) -> String {
    let trimmed = body.trim();
    if !trimmed.starts_with('{') {
        return trimmed.to_owned();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => {
            let urls = extract_image_urls(&value);
            if urls.is_empty() {
                format!("image generation result: {trimmed}")
            } else {
                urls.join("\n")
            }
        }
        Err(error) => {
            let error = ChatError::Parse(error.to_string());
            warn!(error = %error, "image generation result could not be parsed");
            format!("image generation finished but the result could not be parsed ({error}): {trimmed}")
        }
    }
}
