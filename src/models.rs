use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: MessageRole,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendModel {
    pub display_name: String,
    pub api_code: String,
    pub local_path: Option<String>,
}

impl BackendModel {
    pub fn new(display_name: impl Into<String>, api_code: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            api_code: api_code.into(),
            local_path: None,
        }
    }

    pub fn from_code(api_code: impl Into<String>) -> Self {
        let api_code = api_code.into();
        Self {
            display_name: api_code.clone(),
            api_code,
            local_path: None,
        }
    }

    pub fn with_local_path(mut self, path: impl Into<String>) -> Self {
        self.local_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDialect {
    SiliconFlow,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Chat,
    ImageGeneration(ImageDialect),
}

impl ProviderKind {
    pub fn detect(name: &str, endpoint: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let image = endpoint.contains("images/generations") || name.contains("image");
        if !image {
            return ProviderKind::Chat;
        }
        if name.contains("siliconflow") || endpoint.contains("siliconflow") {
            ProviderKind::ImageGeneration(ImageDialect::SiliconFlow)
        } else {
            ProviderKind::ImageGeneration(ImageDialect::Standard)
        }
    }
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub credential: String,
    pub models: Vec<BackendModel>,
    pub kind: ProviderKind,
    pub streaming: bool,
}

impl ProviderConfig {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let endpoint = endpoint.into();
        let kind = ProviderKind::detect(&name, &endpoint);
        Self {
            name,
            endpoint,
            credential: credential.into(),
            models: Vec::new(),
            kind,
            streaming: true,
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("credential", &redact_credential(&self.credential))
            .field("models", &self.models)
            .field("kind", &self.kind)
            .field("streaming", &self.streaming)
            .finish()
    }
}

fn redact_credential(credential: &str) -> String {
    if credential.is_empty() {
        return String::new();
    }
    let prefix = credential.chars().take(4).collect::<String>();
    format!("{prefix}***")
}

/// A well-formed sequence is any number of `Chunk`s followed by exactly one
/// terminal event (`Error` or `Done`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Chunk(String),
    Error(String),
    Done,
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        match self {
            ChatEvent::Chunk(_) => false,
            ChatEvent::Error(_) | ChatEvent::Done => true,
        }
    }
}
