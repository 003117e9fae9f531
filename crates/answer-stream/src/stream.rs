use serde::Deserialize;

use crate::errors::DecodeError;
use crate::model::Source;

/// Typed event decoded from one stream payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Session id assigned by the server for this conversation.
    Meta { session_id: String },
    /// Progress line from the search workflow.
    Log { message: String },
    /// Full replacement of the citation source list.
    Sources { sources: Vec<Source> },
    /// Partial answer text to append.
    AnswerChunk { text: String },
    /// Authoritative full answer text.
    Answer {
        text: String,
        session_id: Option<String>,
    },
    /// Application error reported in-band. Does not end the stream.
    Error { message: String },
}

#[derive(Deserialize)]
struct WireRecord {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: serde_json::Value,
    #[serde(default)]
    session_id: Option<serde_json::Value>,
}

impl StreamEvent {
    /// Short name of the variant, matching the wire `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Meta { .. } => "meta",
            Self::Log { .. } => "log",
            Self::Sources { .. } => "sources",
            Self::AnswerChunk { .. } => "answer_chunk",
            Self::Answer { .. } => "answer",
            Self::Error { .. } => "error",
        }
    }

    /// Decodes a frame payload.
    ///
    /// Returns `Ok(None)` for well-formed records with an unknown `type`.
    pub fn from_payload(payload: &str) -> Result<Option<Self>, DecodeError> {
        let record: WireRecord =
            serde_json::from_str(payload).map_err(|e| DecodeError::Json(e.to_string()))?;
        let kind = record.kind.ok_or(DecodeError::MissingType)?;
        let event = match kind.as_str() {
            "meta" => Self::Meta {
                session_id: string_field(record.session_id.as_ref(), "meta", "session_id")?,
            },
            "log" => Self::Log {
                message: string_field(Some(&record.content), "log", "content")?,
            },
            "sources" => Self::Sources {
                sources: serde_json::from_value(record.content).map_err(|_| {
                    DecodeError::Field {
                        kind: "sources",
                        field: "content",
                    }
                })?,
            },
            "answer_chunk" => Self::AnswerChunk {
                text: string_field(Some(&record.content), "answer_chunk", "content")?,
            },
            "answer" => Self::Answer {
                text: string_field(Some(&record.content), "answer", "content")?,
                session_id: match record.session_id {
                    None | Some(serde_json::Value::Null) => None,
                    Some(value) => Some(string_field(Some(&value), "answer", "session_id")?),
                },
            },
            "error" => Self::Error {
                message: string_field(Some(&record.content), "error", "content")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn string_field(
    value: Option<&serde_json::Value>,
    kind: &'static str,
    field: &'static str,
) -> Result<String, DecodeError> {
    value
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned)
        .ok_or(DecodeError::Field { kind, field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(payload: &str) -> StreamEvent {
        StreamEvent::from_payload(payload)
            .expect("decodes")
            .expect("known type")
    }

    #[test]
    fn decodes_every_variant() {
        assert_eq!(
            decode(r#"{"type":"meta","session_id":"20250101"}"#),
            StreamEvent::Meta {
                session_id: "20250101".into()
            }
        );
        assert_eq!(
            decode(r#"{"type":"log","content":"searching"}"#),
            StreamEvent::Log {
                message: "searching".into()
            }
        );
        assert_eq!(
            decode(r#"{"type":"sources","content":[{"id":1,"url":"https://a"}]}"#),
            StreamEvent::Sources {
                sources: vec![Source::new("1", "https://a")]
            }
        );
        assert_eq!(
            decode(r#"{"type":"answer_chunk","content":"Hel"}"#),
            StreamEvent::AnswerChunk { text: "Hel".into() }
        );
        assert_eq!(
            decode(r#"{"type":"answer","content":"Hello","session_id":"s2"}"#),
            StreamEvent::Answer {
                text: "Hello".into(),
                session_id: Some("s2".into())
            }
        );
        assert_eq!(
            decode(r#"{"type":"error","content":"quota"}"#),
            StreamEvent::Error {
                message: "quota".into()
            }
        );
    }

    #[test]
    fn answer_session_id_is_optional() {
        assert_eq!(
            decode(r#"{"type":"answer","content":"x","session_id":null}"#),
            StreamEvent::Answer {
                text: "x".into(),
                session_id: None
            }
        );
    }

    #[test]
    fn unknown_type_is_ignored() {
        assert_eq!(
            StreamEvent::from_payload(r#"{"type":"heartbeat"}"#).expect("ok"),
            None
        );
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            StreamEvent::from_payload("{not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            StreamEvent::from_payload("[1,2]"),
            Err(DecodeError::Json(_))
        ));
        assert_eq!(
            StreamEvent::from_payload(r#"{"content":"x"}"#),
            Err(DecodeError::MissingType)
        );
        assert_eq!(
            StreamEvent::from_payload(r#"{"type":"log","content":7}"#),
            Err(DecodeError::Field {
                kind: "log",
                field: "content"
            })
        );
        assert_eq!(
            StreamEvent::from_payload(r#"{"type":"sources","content":"nope"}"#),
            Err(DecodeError::Field {
                kind: "sources",
                field: "content"
            })
        );
        assert_eq!(
            StreamEvent::from_payload(r#"{"type":"meta"}"#),
            Err(DecodeError::Field {
                kind: "meta",
                field: "session_id"
            })
        );
    }
}
