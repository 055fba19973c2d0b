use prometheus::{opts, Encoder, IntCounterVec, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct ExchangeMetrics {
    registry: Registry,
    exchanges_total: IntCounterVec,
    chunks_total: IntCounterVec,
    inflight_exchanges: IntGauge,
    fallbacks_total: IntCounterVec,
}

pub struct InflightGuard<'a> {
    metrics: &'a ExchangeMetrics,
}

impl ExchangeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let exchanges_total = IntCounterVec::new(
            opts!(
                "chat_exchanges_total",
                "Exchanges by backend and the outcome delivered to the caller"
            ),
            &["backend", "outcome"],
        )
        .expect("valid exchanges_total metric");

        let chunks_total = IntCounterVec::new(
            opts!("chat_chunks_total", "Chunk events delivered to callers"),
            &["backend"],
        )
        .expect("valid chunks_total metric");

        let inflight_exchanges = IntGauge::new(
            "chat_inflight_exchanges",
            "Exchanges currently producing events",
        )
        .expect("valid inflight_exchanges metric");

        let fallbacks_total = IntCounterVec::new(
            opts!(
                "chat_backend_fallbacks_total",
                "Exchanges served by the alternate backend"
            ),
            &["preferred", "selected"],
        )
        .expect("valid fallbacks_total metric");

        registry
            .register(Box::new(exchanges_total.clone()))
            .expect("register exchanges_total");
        registry
            .register(Box::new(chunks_total.clone()))
            .expect("register chunks_total");
        registry
            .register(Box::new(inflight_exchanges.clone()))
            .expect("register inflight_exchanges");
        registry
            .register(Box::new(fallbacks_total.clone()))
            .expect("register fallbacks_total");

        Self {
            registry,
            exchanges_total,
            chunks_total,
            inflight_exchanges,
            fallbacks_total,
        }
    }

    pub fn inflight_guard(&self) -> InflightGuard<'_> {
        self.inflight_exchanges.inc();
        InflightGuard { metrics: self }
    }

    pub fn inflight(&self) -> i64 {
        self.inflight_exchanges.get()
    }

    pub fn observe_chunk(&self, backend: &str) {
        self.chunks_total.with_label_values(&[backend]).inc();
    }

    pub fn observe_outcome(&self, backend: &str, outcome: &str) {
        self.exchanges_total
            .with_label_values(&[backend, outcome])
            .inc();
    }

    pub fn observe_fallback(&self, preferred: &str, selected: &str) {
        self.fallbacks_total
            .with_label_values(&[preferred, selected])
            .inc();
    }

    pub fn exchanges(&self, backend: &str, outcome: &str) -> u64 {
        self.exchanges_total
            .with_label_values(&[backend, outcome])
            .get()
    }

    pub fn render(&self) -> Result<String, String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|error| error.to_string())?;
        String::from_utf8(buffer).map_err(|error| error.to_string())
    }
}

impl Default for ExchangeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.metrics.inflight_exchanges.dec();
    }
}
