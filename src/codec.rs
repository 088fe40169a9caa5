use bytes::{Buf as _, BytesMut};
use tokio_util::codec::Decoder;

use crate::config::Limits;
use crate::error::{Error, ProtocolError};
use crate::parser;
use crate::scanner::{FrameScanner, Scan};
use crate::value::Value;

/// Frames a byte stream into values for `tokio_util::codec::FramedRead`.
#[derive(Debug, Default)]
pub struct RespDecoder {
    limits: Limits,
    scanner: FrameScanner,
}

impl RespDecoder {
    pub fn new(limits: Limits) -> Self {
        RespDecoder {
            limits,
            scanner: FrameScanner::new(),
        }
    }
}

impl Decoder for RespDecoder {
    type Item = Value;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let parsed = match self.scanner.scan(&src[..], &self.limits) {
            Scan::Pending => Ok(None),
            Scan::Ready => parser::frame(&src[..], &self.limits),
        };
        match parsed {
            Ok(Some((value, consumed))) => {
                src.advance(consumed);
                self.scanner.reset();
                Ok(Some(value))
            }
            Ok(None) if src.len() > self.limits.max_frame_size => {
                src.clear();
                self.scanner.reset();
                Err(ProtocolError::FrameTooLarge {
                    limit: self.limits.max_frame_size,
                }
                .into())
            }
            Ok(None) => Ok(None),
            Err(err) => {
                src.clear();
                self.scanner.reset();
                Err(err.into())
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(value) => Ok(Some(value)),
            None if buf.is_empty() => Ok(None),
            None => {
                let err = parser::leftover(&buf[..], &self.limits);
                if matches!(err, Error::Protocol(_)) {
                    buf.clear();
                }
                self.scanner.reset();
                Err(err)
            }
        }
    }
}
