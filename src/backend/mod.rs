pub mod blocking;
pub mod cloud;
pub mod image;
pub mod local;
pub mod on_device;
pub mod sse;

use futures_util::stream::BoxStream;

use crate::models::{BackendModel, ChatEvent, WireMessage};

pub type EventStream = BoxStream<'static, ChatEvent>;

/// The returned stream is lazy: no I/O happens until it is polled, and dropping
/// it releases whatever connection it holds.
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Pre-flight readiness from local state only. Never touches the network.
    fn is_available(&self) -> bool;

    fn stream(&self, messages: Vec<WireMessage>, model: BackendModel) -> EventStream;
}
