use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use crate::{
    backend::{ChatBackend, EventStream},
    errors::ChatError,
    models::{BackendModel, ChatEvent, WireMessage},
};

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    async fn complete(
        &self,
        messages: &[WireMessage],
        model: &BackendModel,
    ) -> Result<String, ChatError>;
}

pub struct NonStreamingAdapter<B> {
    inner: Arc<B>,
}

impl<B> NonStreamingAdapter<B>
where
    B: CompletionBackend + 'static,
{
    pub fn new(inner: B) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<B> ChatBackend for NonStreamingAdapter<B>
where
    B: CompletionBackend + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn stream(&self, messages: Vec<WireMessage>, model: BackendModel) -> EventStream {
        let inner = Arc::clone(&self.inner);
        let stream = async_stream::stream! {
            match inner.complete(&messages, &model).await {
                Ok(text) => {
                    debug!(backend = inner.name(), chars = text.chars().count(), "completion received");
                    if !text.is_empty() {
                        yield ChatEvent::Chunk(text);
                    }
                    yield ChatEvent::Done;
                }
                Err(error) => yield ChatEvent::from(error),
            }
        };
        stream.boxed()
    }
}
