use std::{collections::HashMap, sync::Arc, time::Duration};

use futures_util::StreamExt;
use tokio::time::sleep;
use tracing::debug;

use crate::{
    backend::{ChatBackend, EventStream},
    models::{BackendModel, ChatEvent, WireMessage},
};

pub const LOCAL_CHUNK_CHARS: usize = 32;

const CANNED_REPLIES: &[(&str, &str)] = &[
    (
        "qwen3-0.6b-mnn",
        "I am running offline on this device, so my answers come from a small \
local model. Connect a cloud provider for longer or more detailed replies.",
    ),
    (
        "mobilellm-125m-mnn",
        "Offline mode is active. This compact model can help with short \
questions while no network backend is configured.",
    ),
];

#[derive(Debug, Clone)]
pub struct LocalSimulatedBackend {
    replies: Arc<HashMap<String, String>>,
    chunk_chars: usize,
    chunk_delay: Duration,
}

impl Default for LocalSimulatedBackend {
    fn default() -> Self {
        let replies = CANNED_REPLIES
            .iter()
            .map(|(model, text)| ((*model).to_owned(), (*text).to_owned()))
            .collect();
        Self::new(replies, Duration::from_millis(30))
    }
}

impl LocalSimulatedBackend {
    pub fn new(replies: HashMap<String, String>, chunk_delay: Duration) -> Self {
        Self {
            replies: Arc::new(replies),
            chunk_chars: LOCAL_CHUNK_CHARS,
            chunk_delay,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_chunk_chars(mut self, chars: usize) -> Self {
        self.chunk_chars = chars.max(1);
        self
    }

    pub fn reply_for(&self, model: &BackendModel) -> &str {
        self.replies
            .get(&model.api_code)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl ChatBackend for LocalSimulatedBackend {
    fn name(&self) -> &str {
        "local-simulated"
    }

    fn is_available(&self) -> bool {
        !self.replies.is_empty()
    }

    fn stream(&self, _messages: Vec<WireMessage>, model: BackendModel) -> EventStream {
        let chunks = split_chunks(self.reply_for(&model), self.chunk_chars);
        let delay = self.chunk_delay;
        debug!(model = %model.api_code, chunks = chunks.len(), "local reply prepared");

        let stream = async_stream::stream! {
            for (index, chunk) in chunks.into_iter().enumerate() {
                if index > 0 {
                    sleep(delay).await;
                }
                yield ChatEvent::Chunk(chunk);
            }
            yield ChatEvent::Done;
        };
        stream.boxed()
    }
}

pub fn split_chunks(text: &str, chunk_chars: usize) -> Vec<String> {
    let chars = text.chars().collect::<Vec<_>>();
    chars
        .chunks(chunk_chars.max(1))
        .map(|slice| slice.iter().collect())
        .collect()
}
