use crate::engine::Callback;
use crate::proxy::InstanceHandle;

/// Receives what the broker sends back while a proxy call is in flight.
///
/// Every method has a no-op default.
pub trait ClientCallbacks: Send {
    /// An engine callback for `handle`, in the order the engine emitted it.
    fn on_callback(&mut self, _handle: InstanceHandle, _callback: Callback) {}

    /// Text around the caret and the caret's offset within it.
    fn surrounding_text(
        &mut self,
        _handle: InstanceHandle,
        _max_before: u32,
        _max_after: u32,
    ) -> Option<(String, u32)> {
        None
    }

    fn selection(&mut self, _handle: InstanceHandle) -> Option<String> {
        None
    }
}

/// Discards every callback and answers no queries.
#[derive(Debug, Default)]
pub struct NoCallbacks;

impl ClientCallbacks for NoCallbacks {}
