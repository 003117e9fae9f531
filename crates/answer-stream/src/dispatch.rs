use tracing::{debug, warn};

use crate::model::Source;
use crate::stream::StreamEvent;

/// Callbacks for decoded stream events.
///
/// Every method defaults to a no-op, so implementors register only the
/// events they care about.
pub trait EventHandler {
    fn on_meta(&mut self, _session_id: &str) {}
    fn on_log(&mut self, _message: &str) {}
    fn on_sources(&mut self, _sources: Vec<Source>) {}
    fn on_answer_chunk(&mut self, _text: &str) {}
    fn on_answer(&mut self, _text: String, _session_id: Option<String>) {}
    fn on_error(&mut self, _message: &str) {}
}

/// Routes one event to exactly one handler method.
pub fn dispatch<H: EventHandler + ?Sized>(event: StreamEvent, handler: &mut H) {
    match event {
        StreamEvent::Meta { session_id } => handler.on_meta(&session_id),
        StreamEvent::Log { message } => handler.on_log(&message),
        StreamEvent::Sources { sources } => handler.on_sources(sources),
        StreamEvent::AnswerChunk { text } => handler.on_answer_chunk(&text),
        StreamEvent::Answer { text, session_id } => handler.on_answer(text, session_id),
        StreamEvent::Error { message } => handler.on_error(&message),
    }
}

/// Decodes a frame payload and dispatches it.
///
/// Malformed payloads are logged and skipped; unknown types are ignored.
/// Returns whether a handler method was invoked.
pub fn dispatch_payload<H: EventHandler + ?Sized>(payload: &str, handler: &mut H) -> bool {
    match StreamEvent::from_payload(payload) {
        Ok(Some(event)) => {
            debug!(kind = event.kind(), "dispatching stream event");
            dispatch(event, handler);
            true
        }
        Ok(None) => {
            debug!("ignoring event with unknown type");
            false
        }
        Err(err) => {
            warn!(error = %err, "skipping malformed stream payload");
            false
        }
    }
}
