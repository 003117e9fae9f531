//! Frame decoding for the chunked answer stream.
//!
//! The wire format is a sequence of blocks separated by a blank line. A block
//! is a payload frame only when it starts with `data: `; everything else is
//! dropped. The payload `[DONE]` ends the stream.

use std::collections::VecDeque;

use futures::StreamExt as _;
use tracing::debug;

use crate::errors::ClientError;
use crate::transport::ByteStream;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// One complete unit of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload text following the `data: ` prefix.
    Data(String),
    /// The `[DONE]` sentinel. Nothing follows it.
    Done,
}

/// Incremental frame decoder.
///
/// Bytes are buffered raw and only decoded as UTF-8 once a whole block is
/// available, so a multi-byte character split across chunks is reassembled
/// first.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    /// Appends a chunk and returns every frame it completes, in order.
    ///
    /// Once `[DONE]` has been produced this always returns an empty list,
    /// whatever is still buffered or pushed later.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if self.done {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(idx) = find_frame_delimiter(&self.buf[consumed..]) {
            let block = &self.buf[consumed..consumed + idx];
            consumed += idx + 2;
            match parse_block(block) {
                Some(Frame::Done) => {
                    frames.push(Frame::Done);
                    self.done = true;
                    break;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }
        if self.done {
            if consumed < self.buf.len() {
                debug!(
                    bytes = self.buf.len() - consumed,
                    "discarding bytes buffered after [DONE]"
                );
            }
            self.buf.clear();
        } else {
            self.buf.drain(..consumed);
        }
        frames
    }

    /// Returns true once the `[DONE]` sentinel has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of bytes held back waiting for a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Called at end of stream. An undelimited trailing fragment is dropped.
    pub fn finish(&mut self) {
        if !self.buf.is_empty() {
            debug!(bytes = self.buf.len(), "dropping undelimited trailing fragment");
            self.buf.clear();
        }
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_block(bytes: &[u8]) -> Option<Frame> {
    let text = String::from_utf8_lossy(bytes);
    let Some(payload) = text.strip_prefix(DATA_PREFIX) else {
        if !text.is_empty() {
            debug!(len = text.len(), "dropping non-data block");
        }
        return None;
    };
    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }
    Some(Frame::Data(payload.to_string()))
}

/// Pull-based sequence of frames read from one response body.
///
/// Finite and non-restartable: after `Frame::Done`, a read error, or end of
/// body it yields nothing more and performs no further reads.
pub struct FrameStream {
    bytes: ByteStream,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    exhausted: bool,
}

impl FrameStream {
    pub fn new(bytes: ByteStream) -> Self {
        Self {
            bytes,
            decoder: FrameDecoder::default(),
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Pops a frame that has already been decoded, without touching the
    /// network.
    pub fn take_buffered(&mut self) -> Option<Frame> {
        self.pending.pop_front()
    }

    /// Returns the next frame, reading more bytes only when nothing is
    /// buffered. `Ok(None)` marks the end of the sequence.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, ClientError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            if self.exhausted || self.decoder.is_done() {
                return Ok(None);
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = self.decoder.push_chunk(&chunk);
                    self.pending.extend(frames);
                }
                Some(Err(err)) => {
                    self.exhausted = true;
                    return Err(err);
                }
                None => {
                    self.exhausted = true;
                    self.decoder.finish();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const SAMPLE: &str = concat!(
        "data: {\"type\":\"meta\",\"session_id\":\"s1\"}\n\n",
        "data: {\"type\":\"log\",\"content\":\"搜索中…\"}\n\n",
        ": keep-alive comment\n\n",
        "event: ignored\n\n",
        "data: {\"type\":\"answer_chunk\",\"content\":\"Hé\"}\n\n",
        "data: [DONE]\n\n",
    );

    fn whole(input: &[u8]) -> Vec<Frame> {
        FrameDecoder::default().push_chunk(input)
    }

    fn byte_by_byte(input: &[u8]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::default();
        let mut frames = Vec::new();
        for byte in input {
            frames.extend(decoder.push_chunk(std::slice::from_ref(byte)));
        }
        frames
    }

    #[test]
    fn decoder_handles_partial_chunk_boundaries() {
        let mut decoder = FrameDecoder::default();
        let frames1 = decoder.push_chunk(b"data: {\"type\":\"log\",\"content\":\"hel");
        assert!(frames1.is_empty());
        assert!(decoder.buffered_len() > 0);
        let frames2 = decoder.push_chunk(b"lo\"}\n\n");
        assert_eq!(
            frames2,
            vec![Frame::Data(r#"{"type":"log","content":"hello"}"#.into())]
        );
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn byte_at_a_time_matches_single_chunk() {
        let expected = whole(SAMPLE.as_bytes());
        assert_eq!(expected.len(), 4);
        assert_eq!(byte_by_byte(SAMPLE.as_bytes()), expected);
    }

    #[test]
    fn multi_byte_characters_survive_chunk_splits() {
        let input = "data: {\"type\":\"log\",\"content\":\"你好\"}\n\n".as_bytes();
        let split = input.iter().position(|b| *b >= 0x80).expect("multibyte") + 1;
        let mut decoder = FrameDecoder::default();
        let mut frames = decoder.push_chunk(&input[..split]);
        frames.extend(decoder.push_chunk(&input[split..]));
        assert_eq!(
            frames,
            vec![Frame::Data(r#"{"type":"log","content":"你好"}"#.into())]
        );
    }

    #[test]
    fn non_data_blocks_are_dropped() {
        let frames = whole(b"retry: 10\n\n:comment\n\ndata:{\"no\":\"space\"}\n\ndata: x\n\n");
        assert_eq!(frames, vec![Frame::Data("x".into())]);
    }

    #[test]
    fn done_stops_production_even_with_buffered_frames() {
        let mut decoder = FrameDecoder::default();
        let frames = decoder.push_chunk(b"data: a\n\ndata: [DONE]\n\ndata: b\n\ndata: c");
        assert_eq!(frames, vec![Frame::Data("a".into()), Frame::Done]);
        assert!(decoder.is_done());
        assert_eq!(decoder.buffered_len(), 0);
        assert!(decoder.push_chunk(b"\n\ndata: d\n\n").is_empty());
    }

    #[test]
    fn trailing_fragment_is_dropped_on_finish() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push_chunk(b"data: partial").is_empty());
        decoder.finish();
        assert_eq!(decoder.buffered_len(), 0);
    }

    fn byte_stream(items: Vec<Result<&'static [u8], ClientError>>) -> ByteStream {
        Box::pin(stream::iter(
            items
                .into_iter()
                .map(|item| item.map(bytes::Bytes::from_static)),
        ))
    }

    #[tokio::test]
    async fn frame_stream_stops_reading_after_done() {
        let mut frames = FrameStream::new(byte_stream(vec![
            Ok(b"data: one\n\ndata: [DO"),
            Ok(b"NE]\n\n"),
            Err(ClientError::transport("must not be read")),
        ]));
        assert_eq!(
            frames.next_frame().await.expect("first"),
            Some(Frame::Data("one".into()))
        );
        assert_eq!(frames.next_frame().await.expect("done"), Some(Frame::Done));
        assert_eq!(frames.next_frame().await.expect("end"), None);
    }

    #[tokio::test]
    async fn frame_stream_buffers_frames_from_one_chunk() {
        let mut frames = FrameStream::new(byte_stream(vec![Ok(b"data: a\n\ndata: b\n\n")]));
        assert!(frames.take_buffered().is_none());
        assert_eq!(
            frames.next_frame().await.expect("a"),
            Some(Frame::Data("a".into()))
        );
        assert_eq!(frames.take_buffered(), Some(Frame::Data("b".into())));
        assert_eq!(frames.next_frame().await.expect("eof"), None);
    }

    #[tokio::test]
    async fn frame_stream_surfaces_read_errors_once() {
        let mut frames = FrameStream::new(byte_stream(vec![
            Ok(b"data: a\n\n"),
            Err(ClientError::transport("connection reset")),
        ]));
        assert!(frames.next_frame().await.expect("a").is_some());
        assert!(matches!(
            frames.next_frame().await,
            Err(ClientError::Transport(msg)) if msg.contains("reset")
        ));
        assert_eq!(frames.next_frame().await.expect("after error"), None);
    }
}
