/// Errors returned by the client API.
///
/// Cancellation is deliberately absent: a cancelled request completes with
/// `Outcome::Cancelled`, not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (blank query, malformed session id, ...).
    #[error("validation error: {0}")]
    Validation(String),
    /// Connection or stream I/O failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Server answered with a non-success HTTP status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// A response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Internal invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true for failures that happened on the wire (connection,
    /// read, or HTTP status) as opposed to caller or configuration mistakes.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ClientError::Decode(value.to_string())
        } else {
            ClientError::Transport(value.to_string())
        }
    }
}

/// Reasons a single stream payload could not be turned into an event.
///
/// These never abort a stream; the dispatcher logs and skips the frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not valid JSON or not a JSON object.
    #[error("invalid event JSON: {0}")]
    Json(String),
    /// Payload has no string `type` discriminator.
    #[error("event payload has no type")]
    MissingType,
    /// A recognized event is missing a field or has the wrong shape.
    #[error("{kind} event has invalid `{field}`")]
    Field {
        kind: &'static str,
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_transport_count_as_transport_failures() {
        assert!(ClientError::transport("reset").is_transport_failure());
        assert!(
            ClientError::Status {
                status: 502,
                body: "bad gateway".into()
            }
            .is_transport_failure()
        );
        assert!(!ClientError::Validation("empty".into()).is_transport_failure());
    }

    #[test]
    fn field_error_names_event_and_field() {
        let err = DecodeError::Field {
            kind: "sources",
            field: "content",
        };
        assert_eq!(err.to_string(), "sources event has invalid `content`");
    }
}
