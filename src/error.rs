use std::io;

use thiserror::Error;

/// Failure of the byte source underneath a decoder.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream ended on a value boundary. This is how a healthy peer
    /// hangs up.
    #[error("stream closed")]
    Closed,

    /// The stream ended in the middle of a value.
    #[error("stream ended inside a value ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Bytes that arrived intact but do not form a valid value.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown type tag {tag:#04x} at byte {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("invalid value at byte {offset}: {message}")]
    Invalid { offset: usize, message: String },

    #[error("value exceeds {limit} buffered bytes")]
    FrameTooLarge { limit: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl Error {
    /// True when the peer closed the stream cleanly between values.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Stream(StreamError::Closed))
    }

    pub(crate) fn end_of_stream(buffered: usize) -> Self {
        if buffered == 0 {
            StreamError::Closed.into()
        } else {
            StreamError::Truncated { buffered }.into()
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Stream(StreamError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_stream() {
        assert!(Error::end_of_stream(0).is_closed());
        let err = Error::end_of_stream(3);
        assert!(!err.is_closed());
        assert!(matches!(
            err,
            Error::Stream(StreamError::Truncated { buffered: 3 })
        ));
    }

    #[test]
    fn test_display() {
        let err: Error = ProtocolError::UnknownTag { tag: b'@', offset: 0 }.into();
        assert_eq!(err.to_string(), "unknown type tag 0x40 at byte 0");
    }
}
