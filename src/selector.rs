use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    backend::{
        blocking::NonStreamingAdapter,
        cloud::{CloudBackend, CloudCompletion},
        image::ImageGenerationBackend,
        local::LocalSimulatedBackend,
        on_device::{InferenceRuntime, OnDeviceBackend},
        ChatBackend,
    },
    config::{BackendPreference, ChatConfig},
    models::{BackendModel, ProviderKind},
};

#[derive(Clone)]
pub struct Candidate {
    pub backend: Arc<dyn ChatBackend>,
    pub model: BackendModel,
}

pub trait BackendFactory: Send + Sync {
    fn build(&self, slot: BackendPreference) -> Candidate;
}

#[derive(Clone)]
pub struct Selection {
    pub backend: Arc<dyn ChatBackend>,
    pub model: BackendModel,
    pub slot: BackendPreference,
    pub fell_back: bool,
}

#[derive(Clone)]
pub struct BackendSelector {
    factory: Arc<dyn BackendFactory>,
}

impl BackendSelector {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self { factory }
    }

    /// Uses the preferred slot unless it reports unavailable and the alternate
    /// is ready. When neither is ready the preferred backend is returned so the
    /// caller sees its error.
    pub fn select(&self, preference: BackendPreference) -> Selection {
        let preferred = self.factory.build(preference);
        if preferred.backend.is_available() {
            debug!(slot = preference.as_str(), backend = preferred.backend.name(), "preferred backend selected");
            return selection(preferred, preference, false);
        }

        let alternate_slot = preference.alternate();
        let alternate = self.factory.build(alternate_slot);
        if alternate.backend.is_available() {
            warn!(
                preferred = preferred.backend.name(),
                selected = alternate.backend.name(),
                "preferred backend unavailable, falling back"
            );
            return selection(alternate, alternate_slot, true);
        }

        warn!(
            preferred = preferred.backend.name(),
            alternate = alternate.backend.name(),
            "no backend available, keeping preferred"
        );
        selection(preferred, preference, false)
    }
}

fn selection(candidate: Candidate, slot: BackendPreference, fell_back: bool) -> Selection {
    Selection {
        backend: candidate.backend,
        model: candidate.model,
        slot,
        fell_back,
    }
}

pub struct ConfiguredBackends {
    config: ChatConfig,
    client: reqwest::Client,
    runtime: Option<Arc<dyn InferenceRuntime>>,
}

impl ConfiguredBackends {
    pub fn new(config: ChatConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            runtime: None,
        }
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn InferenceRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    fn cloud(&self) -> Arc<dyn ChatBackend> {
        let provider = self.config.provider.clone();
        let timeout = self.config.completion_timeout;
        match provider.kind {
            ProviderKind::ImageGeneration(dialect) => Arc::new(NonStreamingAdapter::new(
                ImageGenerationBackend::new(self.client.clone(), provider, dialect, timeout),
            )),
            ProviderKind::Chat if provider.streaming => Arc::new(CloudBackend::new(
                self.client.clone(),
                provider,
                self.config.framing,
            )),
            ProviderKind::Chat => Arc::new(NonStreamingAdapter::new(CloudCompletion::new(
                self.client.clone(),
                provider,
                timeout,
            ))),
        }
    }

    fn local(&self) -> Arc<dyn ChatBackend> {
        match &self.runtime {
            Some(runtime) => Arc::new(OnDeviceBackend::new(Arc::clone(runtime))),
            None => Arc::new(
                LocalSimulatedBackend::default().with_chunk_delay(self.config.local_chunk_delay),
            ),
        }
    }
}

impl BackendFactory for ConfiguredBackends {
    fn build(&self, slot: BackendPreference) -> Candidate {
        match slot {
            BackendPreference::Cloud => Candidate {
                backend: self.cloud(),
                model: self.config.model.clone(),
            },
            BackendPreference::Local => Candidate {
                backend: self.local(),
                model: self.config.local_model.clone(),
            },
        }
    }
}
