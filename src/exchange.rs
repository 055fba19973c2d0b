use std::{collections::HashMap, sync::Arc};

use futures_util::{Stream, StreamExt};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    backend::{ChatBackend, EventStream},
    errors::ChatError,
    metrics::ExchangeMetrics,
    models::{BackendModel, ChatEvent, WireMessage},
};

const EVENT_SLOTS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatus {
    Completed,
    Failed,
    Cancelled,
}

impl ExchangeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeStatus::Completed => "done",
            ExchangeStatus::Failed => "error",
            ExchangeStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed { text: String },
    Failed { message: String, partial: String },
    Cancelled { partial: String },
}

impl ExchangeOutcome {
    pub fn text(&self) -> &str {
        match self {
            ExchangeOutcome::Completed { text } => text,
            ExchangeOutcome::Failed { partial, .. } | ExchangeOutcome::Cancelled { partial } => {
                partial
            }
        }
    }

    pub fn into_result(self) -> Result<String, ChatError> {
        match self {
            ExchangeOutcome::Completed { text } => Ok(text),
            ExchangeOutcome::Failed { message, .. } => Err(ChatError::Exchange(message)),
            ExchangeOutcome::Cancelled { .. } => Err(ChatError::Cancelled),
        }
    }
}

/// The caller's side of a running exchange. Dropping it cancels the exchange.
pub struct ExchangeHandle {
    id: Uuid,
    backend: String,
    events: mpsc::Receiver<ChatEvent>,
    cancel: CancellationToken,
    finished: CancellationToken,
    task: Option<JoinHandle<ExchangeStatus>>,
    metrics: Arc<ExchangeMetrics>,
    outcome: Option<ExchangeStatus>,
}

pub fn spawn_exchange(
    backend: Arc<dyn ChatBackend>,
    messages: Vec<WireMessage>,
    model: BackendModel,
    metrics: Arc<ExchangeMetrics>,
) -> ExchangeHandle {
    let id = Uuid::new_v4();
    let name = backend.name().to_owned();
    let (tx, rx) = mpsc::channel(EVENT_SLOTS);
    let cancel = CancellationToken::new();
    let finished = CancellationToken::new();

    debug!(exchange_id = %id, backend = %name, model = %model.api_code, "exchange starting");
    let events = backend.stream(messages, model);
    let task = tokio::spawn(produce(
        id,
        name.clone(),
        events,
        tx,
        cancel.clone(),
        finished.clone(),
        Arc::clone(&metrics),
    ));

    ExchangeHandle {
        id,
        backend: name,
        events: rx,
        cancel,
        finished,
        task: Some(task),
        metrics,
        outcome: None,
    }
}

async fn produce(
    id: Uuid,
    backend: String,
    mut events: EventStream,
    tx: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
    finished: CancellationToken,
    metrics: Arc<ExchangeMetrics>,
) -> ExchangeStatus {
    let _finished = finished.drop_guard();
    let _inflight = metrics.inflight_guard();

    let status = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ExchangeStatus::Cancelled,
            next = events.next() => next,
        };

        let event = match next {
            Some(ChatEvent::Chunk(text)) if text.is_empty() => continue,
            Some(event) => event,
            None => ChatEvent::Done,
        };
        let terminal = match &event {
            ChatEvent::Chunk(_) => None,
            ChatEvent::Error(_) => Some(ExchangeStatus::Failed),
            ChatEvent::Done => Some(ExchangeStatus::Completed),
        };

        let delivered = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = tx.send(event) => sent.is_ok(),
        };
        if !delivered {
            break ExchangeStatus::Cancelled;
        }
        if let Some(status) = terminal {
            break status;
        }
    };

    drop(events);
    info!(exchange_id = %id, backend = %backend, outcome = status.as_str(), "exchange finished");
    status
}

impl ExchangeHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        let event = if self.cancel.is_cancelled() {
            None
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                event = self.events.recv() => event,
            }
        };

        match &event {
            Some(ChatEvent::Chunk(_)) => self.metrics.observe_chunk(&self.backend),
            Some(ChatEvent::Error(_)) => self.record(ExchangeStatus::Failed),
            Some(ChatEvent::Done) => self.record(ExchangeStatus::Completed),
            None if self.cancel.is_cancelled() => self.record(ExchangeStatus::Cancelled),
            None => self.record(ExchangeStatus::Failed),
        }
        event
    }

    // Outcomes count what the caller received, once per exchange.
    fn record(&mut self, status: ExchangeStatus) {
        if self.outcome.is_none() {
            self.outcome = Some(status);
            self.metrics.observe_outcome(&self.backend, status.as_str());
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn join(mut self) -> ExchangeStatus {
        while self.next_event().await.is_some() {}
        self.events.close();
        match self.task.take() {
            Some(task) => task.await.unwrap_or(ExchangeStatus::Failed),
            None => ExchangeStatus::Cancelled,
        }
    }

    pub async fn collect(mut self) -> ExchangeOutcome {
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            match event {
                ChatEvent::Chunk(chunk) => text.push_str(&chunk),
                ChatEvent::Error(message) => {
                    return ExchangeOutcome::Failed {
                        message,
                        partial: text,
                    }
                }
                ChatEvent::Done => return ExchangeOutcome::Completed { text },
            }
        }
        ExchangeOutcome::Cancelled { partial: text }
    }

    pub fn into_stream(self) -> impl Stream<Item = ChatEvent> + Send + 'static {
        let mut handle = self;
        async_stream::stream! {
            while let Some(event) = handle.next_event().await {
                yield event;
            }
        }
    }
}

impl Drop for ExchangeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.record(ExchangeStatus::Cancelled);
    }
}

struct InflightExchange {
    id: Uuid,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct ConversationExchanges {
    inflight: Arc<Mutex<HashMap<String, InflightExchange>>>,
    metrics: Arc<ExchangeMetrics>,
}

impl ConversationExchanges {
    pub fn new(metrics: Arc<ExchangeMetrics>) -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            metrics,
        }
    }

    pub async fn start(
        &self,
        conversation_id: &str,
        backend: Arc<dyn ChatBackend>,
        messages: Vec<WireMessage>,
        model: BackendModel,
    ) -> ExchangeHandle {
        let mut inflight = self.inflight.lock().await;
        if let Some(previous) = inflight.remove(conversation_id) {
            previous.cancel.cancel();
            info!(conversation_id, superseded = %previous.id, "superseding in-flight exchange");
        }

        let handle = spawn_exchange(backend, messages, model, Arc::clone(&self.metrics));
        inflight.insert(
            conversation_id.to_owned(),
            InflightExchange {
                id: handle.id(),
                cancel: handle.cancellation_token(),
            },
        );
        drop(inflight);

        self.forget_when_finished(conversation_id.to_owned(), handle.id(), handle.finished.clone());
        handle
    }

    pub async fn cancel(&self, conversation_id: &str) -> bool {
        let removed = self.inflight.lock().await.remove(conversation_id);
        match removed {
            Some(exchange) => {
                exchange.cancel.cancel();
                info!(conversation_id, exchange_id = %exchange.id, "exchange cancelled by caller");
                true
            }
            None => false,
        }
    }

    pub async fn in_flight(&self, conversation_id: &str) -> bool {
        self.inflight
            .lock()
            .await
            .get(conversation_id)
            .is_some_and(|exchange| !exchange.cancel.is_cancelled())
    }

    pub async fn in_flight_count(&self) -> usize {
        self.inflight.lock().await.len()
    }

    fn forget_when_finished(&self, conversation_id: String, id: Uuid, finished: CancellationToken) {
        let inflight = Arc::clone(&self.inflight);
        tokio::spawn(async move {
            finished.cancelled().await;
            let mut inflight = inflight.lock().await;
            if inflight
                .get(&conversation_id)
                .is_some_and(|exchange| exchange.id == id)
            {
                inflight.remove(&conversation_id);
            }
        });
    }
}
