//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, AnswerView, ApiClient, CancelReason, ChatSession, CitationRenderer, ClientConfig,
    ClientError, Outcome, QueryOptions, SessionState, Settings, Source, StreamEvent,
};
