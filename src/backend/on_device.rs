use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::{
    backend::{ChatBackend, EventStream},
    context::latest_user_prompt,
    errors::ChatError,
    models::{BackendModel, ChatEvent, WireMessage},
};

#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn is_loaded(&self) -> bool;

    /// Generates a reply for `prompt`, sending text as it is produced. A closed
    /// `progress` channel means the caller stopped listening.
    async fn generate(
        &self,
        model: &BackendModel,
        prompt: String,
        progress: mpsc::Sender<String>,
    ) -> Result<(), String>;
}

#[derive(Clone)]
pub struct OnDeviceBackend {
    runtime: Arc<dyn InferenceRuntime>,
}

impl OnDeviceBackend {
    pub fn new(runtime: Arc<dyn InferenceRuntime>) -> Self {
        Self { runtime }
    }
}

struct AbortOnDrop(JoinHandle<Result<(), String>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl ChatBackend for OnDeviceBackend {
    fn name(&self) -> &str {
        self.runtime.name()
    }

    fn is_available(&self) -> bool {
        self.runtime.is_loaded()
    }

    fn stream(&self, messages: Vec<WireMessage>, model: BackendModel) -> EventStream {
        let runtime = Arc::clone(&self.runtime);
        let prompt = latest_user_prompt(&messages).map(ToOwned::to_owned);

        let stream = async_stream::stream! {
            let Some(prompt) = prompt else {
                yield ChatEvent::from(ChatError::Runtime("no user message to answer".to_owned()));
                return;
            };

            let (tx, rx) = mpsc::channel(1);
            let mut generation = {
                let runtime = Arc::clone(&runtime);
                let model = model.clone();
                AbortOnDrop(tokio::spawn(async move { runtime.generate(&model, prompt, tx).await }))
            };

            let mut pieces = ReceiverStream::new(rx);
            while let Some(piece) = pieces.next().await {
                if !piece.is_empty() {
                    yield ChatEvent::Chunk(piece);
                }
            }

            match (&mut generation.0).await {
                Ok(Ok(())) => {
                    debug!(runtime = runtime.name(), model = %model.api_code, "on-device generation finished");
                    yield ChatEvent::Done;
                }
                Ok(Err(message)) => yield ChatEvent::from(ChatError::Runtime(message)),
                Err(error) => yield ChatEvent::from(ChatError::Runtime(error.to_string())),
            }
        };
        stream.boxed()
    }
}
