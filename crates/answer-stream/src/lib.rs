//! Client for a streaming answer service with citation-aware rendering.
//!
//! A query is posted to `/api/chat`; the response is a `data: <json>`
//! frame stream of progress logs, sources, answer chunks and a final
//! answer. [`ChatSession`] drives one request at a time, re-rendering the
//! accumulated answer as sanitized HTML with `[n]` markers linked to their
//! sources, and supports cancellation and supersession.
//!
//! # Streaming an answer
//!
//! ```no_run
//! use answer_stream::prelude::*;
//!
//! struct Stdout;
//!
//! impl AnswerView for Stdout {
//!     fn log(&mut self, message: &str) {
//!         eprintln!("… {message}");
//!     }
//!
//!     fn paint(&mut self, html: &str) {
//!         println!("{html}");
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let session = ChatSession::http(ClientConfig::from_env()?)?;
//! let options = QueryOptions::default().search_engine("duckduckgo");
//!
//! match session.send("What is Rust?", &options, &mut Stdout).await? {
//!     Outcome::Completed { session_id, .. } => eprintln!("session {session_id:?}"),
//!     Outcome::Cancelled { .. } => eprintln!("stopped"),
//! }
//! # Ok(())
//! # }
//! ```

/// Settings and chat-history endpoints.
pub mod api;
/// Recovering sources from persisted answer text.
pub mod citation;
/// Client configuration.
pub mod config;
/// Decoded event fan-out to handler callbacks.
pub mod dispatch;
/// Public error types.
pub mod errors;
/// Frame decoding over raw response bytes.
pub mod frame;
/// Sources, query options and the chat request body.
pub mod model;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Markdown, sanitization and citation linking.
pub mod render;
/// Request lifecycle, cancellation and supersession.
pub mod session;
/// Typed stream events.
pub mod stream;
/// Transport seam and the HTTP implementation.
pub mod transport;

pub use api::{ApiClient, ChatMessage, ChatRecord, ChatSummary, Settings};
pub use citation::extract_sources;
pub use config::ClientConfig;
pub use dispatch::{EventHandler, dispatch, dispatch_payload};
pub use errors::{ClientError, DecodeError};
pub use frame::{Frame, FrameDecoder, FrameStream};
pub use model::{ChatRequest, QueryOptions, Source};
pub use observability::init_observability;
pub use render::{Annotation, CitationRenderer, link_citations};
pub use session::{
    AbortHandle, AnswerBuffer, AnswerView, CancelReason, ChatSession, Outcome, SessionState,
};
pub use stream::StreamEvent;
pub use transport::{AnswerTransport, ByteStream, HttpTransport};
