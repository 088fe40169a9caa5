use bytes::{Buf as _, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt as _};
use tracing::{debug, trace};

use crate::config::Limits;
use crate::error::{Error, ProtocolError, Result};
use crate::parser;
use crate::scanner::{FrameScanner, Scan};
use crate::value::Value;

/// Async counterpart of [`crate::Decoder`], driving one connection's stream.
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    scanner: FrameScanner,
    limits: Limits,
}

impl<S: AsyncRead + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self::with_limits(stream, Limits::default())
    }

    pub fn with_limits(stream: S, limits: Limits) -> Self {
        Connection {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
            scanner: FrameScanner::new(),
            limits,
        }
    }

    /// Reads the next complete value, awaiting more bytes as needed.
    ///
    /// Dropping the returned future loses nothing: bytes already read stay
    /// buffered for the next call.
    pub async fn read_value(&mut self) -> Result<Value> {
        loop {
            if self.scanner.scan(&self.buffer[..], &self.limits) == Scan::Ready {
                match parser::frame(&self.buffer[..], &self.limits) {
                    Ok(Some((value, consumed))) => {
                        self.buffer.advance(consumed);
                        self.scanner.reset();
                        trace!("decoded {:?} value from {} bytes", value.kind(), consumed);
                        return Ok(value);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        debug!("protocol error, discarding {} bytes: {}", self.buffer.len(), err);
                        self.buffer.clear();
                        self.scanner.reset();
                        return Err(err.into());
                    }
                }
            }
            if self.buffer.len() > self.limits.max_frame_size {
                self.buffer.clear();
                self.scanner.reset();
                return Err(ProtocolError::FrameTooLarge {
                    limit: self.limits.max_frame_size,
                }
                .into());
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                trace!("end of stream with {} bytes buffered", self.buffer.len());
                let err = parser::leftover(&self.buffer[..], &self.limits);
                if matches!(err, Error::Protocol(_)) {
                    self.buffer.clear();
                    self.scanner.reset();
                }
                return Err(err);
            }
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
