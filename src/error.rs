use std::{error::Error as StdError, fmt};

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Error returned when opening a stream fails, or when a running relay ends
/// abnormally.
///
/// Stopping a relay is not an error. See [`Shutdown`](crate::Shutdown).
#[derive(Debug)]
pub struct Error {
    kind: Box<ErrorKind>,
    source: Option<BoxError>,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            source: None,
        }
    }

    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            kind: Box::new(ErrorKind::Transport),
            source: Some(err.into()),
        }
    }

    pub(crate) fn unexpected_status(status: u16) -> Self {
        Self::new(ErrorKind::UnexpectedStatus(status))
    }

    pub(crate) fn protocol_mismatch(content_type: String) -> Self {
        Self::new(ErrorKind::ProtocolMismatch(content_type))
    }

    pub(crate) fn missing_location(status: u16) -> Self {
        Self::new(ErrorKind::MissingLocation(status))
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    pub(crate) fn task_failed(err: tokio::task::JoinError) -> Self {
        Self {
            kind: Box::new(ErrorKind::TaskFailed),
            source: Some(Box::new(err)),
        }
    }

    pub(crate) fn parser(err: crate::parser::Error) -> Self {
        use crate::parser::Error as ParseError;

        match err {
            ParseError::Violation(line) => Self::new(ErrorKind::ProtocolViolation(
                String::from_utf8_lossy(&line).into_owned(),
            )),
            ParseError::Utf8 { ref line, .. } => {
                let line = String::from_utf8_lossy(line).into_owned();
                Self {
                    kind: Box::new(ErrorKind::ProtocolViolation(line)),
                    source: Some(Box::new(err)),
                }
            }
            ParseError::LineTooLong(_) => Self::transport(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.kind, source),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// The connection failed or a read from it failed.
    #[error("transport failure")]
    Transport,

    /// The stream was answered with something other than `200 OK`.
    #[error("unexpected response status {0}")]
    UnexpectedStatus(u16),

    /// The response was not an event stream. Carries the actual content type.
    #[error("invalid content type {0:?}")]
    ProtocolMismatch(String),

    /// A line of the stream matched none of the recognized forms.
    #[error("protocol violation on line {0:?}")]
    ProtocolViolation(String),

    /// Creating a channel returned no `Location` header.
    #[error("channel endpoint answered {0} without a location")]
    MissingLocation(u16),

    /// The open call was cancelled before a response arrived.
    #[error("cancelled")]
    Cancelled,

    /// The relay task panicked.
    #[error("relay task failed")]
    TaskFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_carries_the_offending_line() {
        let err = Error::parser(crate::parser::Error::Violation("garbage".into()));
        assert_eq!(err.kind(), &ErrorKind::ProtocolViolation("garbage".into()));
        assert!(err.source().is_none());
    }

    #[test]
    fn line_too_long_is_a_transport_failure() {
        let err = Error::parser(crate::parser::Error::LineTooLong(16));
        assert_eq!(err.kind(), &ErrorKind::Transport);
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "transport failure: line exceeds the 16 byte limit"
        );
    }

    #[test]
    fn status_is_displayed() {
        assert_eq!(
            Error::unexpected_status(404).to_string(),
            "unexpected response status 404"
        );
    }
}
