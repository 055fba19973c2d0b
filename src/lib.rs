pub mod backend;
pub mod catalog;
pub mod config;
pub mod context;
pub mod errors;
pub mod exchange;
pub mod metrics;
pub mod models;
pub mod selector;
pub mod service;
pub mod think;

use config::ChatConfig;
use errors::ChatError;
use service::ChatService;
use tracing::info;

pub fn build_service(config: ChatConfig) -> Result<ChatService, ChatError> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|error| ChatError::Config(format!("http client: {error}")))?;

    info!(
        preference = config.preference.as_str(),
        provider = %config.provider.name,
        model = %config.model.api_code,
        local_model = %config.local_model.api_code,
        streaming = config.provider.streaming,
        "chat service configured"
    );
    Ok(ChatService::from_config(config, client))
}
