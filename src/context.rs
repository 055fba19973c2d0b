use crate::models::WireMessage;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorTurn {
    pub text: String,
    pub is_user: bool,
}

impl PriorTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub system_prompt: Option<String>,
    pub turns: Vec<PriorTurn>,
}

impl ConversationContext {
    pub fn new(system_prompt: Option<String>, turns: Vec<PriorTurn>) -> Self {
        Self {
            system_prompt,
            turns,
        }
    }
}

pub fn build_messages(context: &ConversationContext) -> Vec<WireMessage> {
    let system_prompt = context
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let mut messages = Vec::with_capacity(context.turns.len() + 1);
    messages.push(WireMessage::system(system_prompt));
    messages.extend(context.turns.iter().map(|turn| {
        if turn.is_user {
            WireMessage::user(turn.text.clone())
        } else {
            WireMessage::assistant(turn.text.clone())
        }
    }));
    messages
}

pub fn latest_user_prompt(messages: &[WireMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|message| message.role == crate::models::MessageRole::User)
        .map(|message| message.content.as_str())
        .filter(|content| !content.trim().is_empty())
}
