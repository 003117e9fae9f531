use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::dispatch::{EventHandler, dispatch_payload};
use crate::errors::ClientError;
use crate::frame::{Frame, FrameStream};
use crate::model::{ChatRequest, QueryOptions, Source};
use crate::render::{Annotation, CitationRenderer};
use crate::transport::{AnswerTransport, HttpTransport};

/// Lifecycle of the session's current request.
///
/// Every terminal state accepts a new request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    /// True while a request is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming)
    }
}

/// Why a request ended without completing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller stopped it.
    User,
    /// A newer request on the same session replaced it.
    Superseded,
}

/// Non-error result of `ChatSession::send`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed {
        answer: String,
        session_id: Option<String>,
    },
    Cancelled {
        reason: CancelReason,
        partial: String,
    },
}

/// Handle used to request cancellation of an in-flight request.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    /// Requests cancellation. The request stops at its next network read.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

async fn wait_aborted(rx: &mut watch::Receiver<bool>) {
    let observed = rx.wait_for(|aborted| *aborted).await.map(|_| ());
    if observed.is_err() {
        // Handle dropped without aborting: never fires.
        std::future::pending::<()>().await;
    }
}

/// Answer text accumulated for one request.
#[derive(Debug, Default)]
pub struct AnswerBuffer {
    text: String,
}

impl AnswerBuffer {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn push_str(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    fn replace(&mut self, text: String) {
        self.text = text;
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

/// Caller-side callbacks for one request.
///
/// `paint` always receives the complete HTML for the answer area: the
/// re-rendered answer followed by any status notes.
pub trait AnswerView {
    fn session_assigned(&mut self, _session_id: &str) {}
    fn log(&mut self, _message: &str) {}
    fn sources(&mut self, _sources: &[Source]) {}
    fn paint(&mut self, html: &str);
    fn error(&mut self, _message: &str) {}
    fn finished(&mut self, _state: SessionState) {}
}

struct SessionInner {
    session_id: Option<String>,
    state: SessionState,
    generation: u64,
    abort: Option<AbortHandle>,
}

/// Owns the request lifecycle for one conversation.
///
/// Cloning is cheap and clones share state, so one task can stream while
/// another cancels or submits a superseding query. At most one request is
/// live per session: starting a request aborts the previous one.
#[derive(Clone)]
pub struct ChatSession {
    transport: Arc<dyn AnswerTransport>,
    renderer: CitationRenderer,
    inner: Arc<Mutex<SessionInner>>,
}

impl ChatSession {
    /// Creates a session over `transport` with the default renderer.
    pub fn new(transport: Arc<dyn AnswerTransport>) -> Self {
        Self {
            transport,
            renderer: CitationRenderer::default(),
            inner: Arc::new(Mutex::new(SessionInner {
                session_id: None,
                state: SessionState::Idle,
                generation: 0,
                abort: None,
            })),
        }
    }

    /// Creates a session talking HTTP to the configured service.
    pub fn http(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Replaces the renderer used for painting answers.
    pub fn with_renderer(mut self, renderer: CitationRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn renderer(&self) -> &CitationRenderer {
        &self.renderer
    }

    /// Session id sent with the next request, if any.
    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    /// Switches conversation: `None` starts a new one on the next request.
    pub fn set_session_id(&self, session_id: Option<String>) {
        self.lock().session_id = session_id;
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_processing(&self) -> bool {
        self.state().is_active()
    }

    /// Handle for cancelling the current request from elsewhere.
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        let inner = self.lock();
        inner
            .abort
            .as_ref()
            .filter(|_| inner.state.is_active())
            .cloned()
    }

    /// Stops the in-flight request. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        match self.abort_handle() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Submits `query` and streams the answer into `view`.
    ///
    /// Transport failures are painted as a failure note and returned as
    /// errors; cancellation is an `Ok(Outcome::Cancelled)`.
    pub async fn send<V>(
        &self,
        query: &str,
        options: &QueryOptions,
        view: &mut V,
    ) -> Result<Outcome, ClientError>
    where
        V: AnswerView + ?Sized,
    {
        if query.trim().is_empty() {
            return Err(ClientError::Validation("query must not be empty".into()));
        }

        let (generation, mut abort_rx, session_id) = self.begin();
        let request = ChatRequest::new(query, session_id, options);
        let mut active = ActiveRequest {
            session: self,
            request_id: uuid::Uuid::new_v4(),
            generation,
            view,
            buffer: AnswerBuffer::default(),
            sources: Vec::new(),
            notes: Vec::new(),
            answered: false,
            settled: false,
        };
        info!(request_id = %active.request_id, generation, "request started");

        let opened = tokio::select! {
            biased;
            _ = wait_aborted(&mut abort_rx) => None,
            opened = self.transport.open(&request) => Some(opened),
        };
        let body = match opened {
            None => return Ok(active.cancelled()),
            Some(Err(err)) => return active.failed(err),
            Some(Ok(body)) => body,
        };
        if !self.transition(generation, SessionState::Streaming) {
            return Ok(active.cancelled());
        }
        debug!(request_id = %active.request_id, "response streaming");

        let mut frames = FrameStream::new(body);
        loop {
            let next = match frames.take_buffered() {
                Some(frame) => Ok(Some(frame)),
                None => tokio::select! {
                    biased;
                    _ = wait_aborted(&mut abort_rx) => return Ok(active.cancelled()),
                    next = frames.next_frame() => next,
                },
            };
            match next {
                Ok(Some(Frame::Data(payload))) => {
                    if !self.is_current(generation) {
                        return Ok(active.cancelled());
                    }
                    dispatch_payload(&payload, &mut active);
                    if active.answered {
                        return Ok(active.completed());
                    }
                }
                Ok(Some(Frame::Done)) => return Ok(active.completed()),
                Ok(None) => {
                    if !active.answered {
                        warn!(request_id = %active.request_id, "stream closed without [DONE]");
                    }
                    return Ok(active.completed());
                }
                Err(err) => return active.failed(err),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> (u64, watch::Receiver<bool>, Option<String>) {
        let mut inner = self.lock();
        if let Some(previous) = inner.abort.take() {
            if inner.state.is_active() {
                warn!(generation = inner.generation, "superseding in-flight request");
            }
            previous.abort();
        }
        inner.generation += 1;
        inner.state = SessionState::Requesting;
        let (handle, rx) = AbortHandle::new();
        inner.abort = Some(handle);
        (inner.generation, rx, inner.session_id.clone())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn transition(&self, generation: u64, state: SessionState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.state = state;
        true
    }

    /// Moves the session to a terminal state if `generation` still owns it.
    fn settle(&self, generation: u64, state: SessionState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.state = state;
        inner.abort = None;
        true
    }

    fn adopt_session_id(&self, generation: u64, session_id: &str) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.session_id = Some(session_id.to_string());
        true
    }
}

/// Per-request state; receives dispatched events.
struct ActiveRequest<'a, V: AnswerView + ?Sized> {
    session: &'a ChatSession,
    request_id: uuid::Uuid,
    generation: u64,
    view: &'a mut V,
    buffer: AnswerBuffer,
    sources: Vec<Source>,
    notes: Vec<Annotation>,
    answered: bool,
    settled: bool,
}

impl<V: AnswerView + ?Sized> ActiveRequest<'_, V> {
    fn repaint(&mut self) {
        let mut html = self
            .session
            .renderer
            .render(self.buffer.as_str(), &self.sources);
        for note in &self.notes {
            html.push_str(&note.to_html());
        }
        self.view.paint(&html);
    }

    /// Records the terminal state. False when a newer request owns the session.
    fn settle(&mut self, state: SessionState) -> bool {
        self.settled = true;
        self.session.settle(self.generation, state)
    }

    fn completed(mut self) -> Outcome {
        if !self.settle(SessionState::Completed) {
            return self.superseded();
        }
        info!(request_id = %self.request_id, answer_len = self.buffer.as_str().len(), "request completed");
        self.view.finished(SessionState::Completed);
        Outcome::Completed {
            answer: self.buffer.take(),
            session_id: self.session.session_id(),
        }
    }

    fn cancelled(mut self) -> Outcome {
        if !self.settle(SessionState::Cancelled) {
            return self.superseded();
        }
        info!(request_id = %self.request_id, "request stopped by user");
        self.notes.push(Annotation::Stopped);
        self.repaint();
        self.view.finished(SessionState::Cancelled);
        Outcome::Cancelled {
            reason: CancelReason::User,
            partial: self.buffer.take(),
        }
    }

    fn failed(mut self, err: ClientError) -> Result<Outcome, ClientError> {
        if !self.settle(SessionState::Failed) {
            debug!(request_id = %self.request_id, error = %err, "failure on superseded request ignored");
            return Ok(self.superseded());
        }
        error!(request_id = %self.request_id, error = %err, "request failed");
        self.notes.push(Annotation::Failure(err.to_string()));
        self.repaint();
        self.view.finished(SessionState::Failed);
        Err(err)
    }

    fn superseded(mut self) -> Outcome {
        self.settled = true;
        info!(request_id = %self.request_id, "request superseded");
        self.view.finished(SessionState::Cancelled);
        Outcome::Cancelled {
            reason: CancelReason::Superseded,
            partial: self.buffer.take(),
        }
    }
}

/// A `send` future dropped mid-request still releases the session.
impl<V: AnswerView + ?Sized> Drop for ActiveRequest<'_, V> {
    fn drop(&mut self) {
        if !self.settled && self.session.settle(self.generation, SessionState::Cancelled) {
            info!(request_id = %self.request_id, "request dropped before finishing");
        }
    }
}

impl<V: AnswerView + ?Sized> EventHandler for ActiveRequest<'_, V> {
    fn on_meta(&mut self, session_id: &str) {
        if self.session.adopt_session_id(self.generation, session_id) {
            self.view.session_assigned(session_id);
        }
    }

    fn on_log(&mut self, message: &str) {
        self.view.log(message);
    }

    fn on_sources(&mut self, sources: Vec<Source>) {
        debug!(request_id = %self.request_id, count = sources.len(), "sources replaced");
        self.sources = sources;
        self.view.sources(&self.sources);
    }

    fn on_answer_chunk(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.repaint();
    }

    fn on_answer(&mut self, text: String, session_id: Option<String>) {
        self.buffer.replace(text);
        if let Some(session_id) = session_id
            && self.session.adopt_session_id(self.generation, &session_id)
        {
            self.view.session_assigned(&session_id);
        }
        self.repaint();
        self.answered = true;
    }

    fn on_error(&mut self, message: &str) {
        warn!(request_id = %self.request_id, message, "server reported error");
        self.notes.push(Annotation::Error(message.to_string()));
        self.view.error(message);
        self.repaint();
    }
}
