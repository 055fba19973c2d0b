use std::{env, time::Duration};

use crate::{
    backend::sse::{Framing, UnprefixedLines},
    catalog,
    errors::ChatError,
    models::{BackendModel, ProviderConfig},
};

pub const DEFAULT_PROVIDER: &str = "OpenAI";
pub const DEFAULT_LOCAL_MODEL: &str = "qwen3-0.6b-mnn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendPreference {
    Cloud,
    Local,
}

impl BackendPreference {
    pub fn alternate(self) -> Self {
        match self {
            BackendPreference::Cloud => BackendPreference::Local,
            BackendPreference::Local => BackendPreference::Cloud,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendPreference::Cloud => "cloud",
            BackendPreference::Local => "local",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub preference: BackendPreference,
    pub provider: ProviderConfig,
    pub model: BackendModel,
    pub local_model: BackendModel,
    pub framing: Framing,
    pub connect_timeout: Duration,
    pub completion_timeout: Duration,
    pub local_chunk_delay: Duration,
}

impl ChatConfig {
    pub fn new(provider: ProviderConfig, model: BackendModel) -> Self {
        let local_model = catalog::local_model(DEFAULT_LOCAL_MODEL)
            .unwrap_or_else(|| BackendModel::from_code(DEFAULT_LOCAL_MODEL));
        Self {
            preference: BackendPreference::Cloud,
            provider,
            model,
            local_model,
            framing: Framing::default(),
            connect_timeout: Duration::from_secs(30),
            completion_timeout: Duration::from_secs(60),
            local_chunk_delay: Duration::from_millis(30),
        }
    }

    pub fn from_env() -> Result<Self, ChatError> {
        let provider_name =
            env::var("CHAT_PROVIDER").unwrap_or_else(|_| DEFAULT_PROVIDER.to_owned());
        let credential = env::var("CHAT_API_KEY").unwrap_or_default();
        let custom_endpoint = env::var("CHAT_API_URL").ok();
        let mut provider =
            catalog::resolve_provider(&provider_name, custom_endpoint.as_deref(), &credential);
        provider.streaming = read_bool("CHAT_STREAMING", true)?;

        let model = match env::var("CHAT_MODEL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
        {
            Some(code) => provider
                .models
                .iter()
                .find(|model| model.api_code == code)
                .cloned()
                .unwrap_or_else(|| BackendModel::from_code(code)),
            None => provider.models.first().cloned().ok_or_else(|| {
                ChatError::Config(format!(
                    "CHAT_MODEL is required for custom provider {}",
                    provider.name
                ))
            })?,
        };

        let local_code =
            env::var("CHAT_LOCAL_MODEL").unwrap_or_else(|_| DEFAULT_LOCAL_MODEL.to_owned());
        let local_model = catalog::local_model(&local_code)
            .unwrap_or_else(|| BackendModel::from_code(local_code));

        let preference = if read_bool("CHAT_PREFER_CLOUD", true)? {
            BackendPreference::Cloud
        } else {
            BackendPreference::Local
        };

        let unprefixed = match env::var("CHAT_UNPREFIXED_LINES") {
            Err(_) => UnprefixedLines::Passthrough,
            Ok(value) => value.parse::<UnprefixedLines>().map_err(ChatError::Config)?,
        };

        Ok(Self {
            preference,
            provider,
            model,
            local_model,
            framing: Framing { unprefixed },
            connect_timeout: Duration::from_secs(read_u64("CHAT_CONNECT_TIMEOUT_SECS", 30)),
            completion_timeout: Duration::from_secs(read_u64("CHAT_COMPLETION_TIMEOUT_SECS", 60)),
            local_chunk_delay: Duration::from_millis(read_u64("CHAT_LOCAL_CHUNK_DELAY_MS", 30)),
        })
    }

    pub fn with_preference(mut self, preference: BackendPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_local_model(mut self, model: BackendModel) -> Self {
        self.local_model = model;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_local_chunk_delay(mut self, delay: Duration) -> Self {
        self.local_chunk_delay = delay;
        self
    }
}

fn read_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_bool(name: &str, default: bool) -> Result<bool, ChatError> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };
    parse_bool(&value).ok_or_else(|| ChatError::Config(format!("{name} must be a boolean, got {value:?}")))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
