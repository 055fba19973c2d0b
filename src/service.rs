use std::sync::Arc;

use tracing::info;

use crate::{
    config::{BackendPreference, ChatConfig},
    context::{build_messages, ConversationContext},
    exchange::{ConversationExchanges, ExchangeHandle},
    metrics::ExchangeMetrics,
    selector::{BackendFactory, BackendSelector, ConfiguredBackends},
};

#[derive(Clone)]
pub struct ChatService {
    pub selector: BackendSelector,
    pub exchanges: ConversationExchanges,
    pub metrics: Arc<ExchangeMetrics>,
    pub preference: BackendPreference,
}

impl ChatService {
    pub fn new(factory: Arc<dyn BackendFactory>, preference: BackendPreference) -> Self {
        let metrics = Arc::new(ExchangeMetrics::new());
        Self {
            selector: BackendSelector::new(factory),
            exchanges: ConversationExchanges::new(Arc::clone(&metrics)),
            metrics,
            preference,
        }
    }

    pub fn from_config(config: ChatConfig, client: reqwest::Client) -> Self {
        let preference = config.preference;
        Self::new(Arc::new(ConfiguredBackends::new(config, client)), preference)
    }

    pub async fn send(
        &self,
        conversation_id: &str,
        context: &ConversationContext,
    ) -> ExchangeHandle {
        let messages = build_messages(context);
        let selection = self.selector.select(self.preference);
        if selection.fell_back {
            self.metrics
                .observe_fallback(self.preference.as_str(), selection.slot.as_str());
        }

        info!(
            conversation_id,
            backend = selection.backend.name(),
            model = %selection.model.api_code,
            messages = messages.len(),
            "sending chat request"
        );
        self.exchanges
            .start(conversation_id, selection.backend, messages, selection.model)
            .await
    }

    pub async fn cancel(&self, conversation_id: &str) -> bool {
        self.exchanges.cancel(conversation_id).await
    }
}
