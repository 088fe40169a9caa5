use std::io::{self, Read};

use bytes::{Buf as _, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::config::Limits;
use crate::error::{Error, ProtocolError, Result};
use crate::parser;
use crate::scanner::{FrameScanner, Scan};
use crate::value::Value;

const READ_CHUNK: usize = 4 * 1024;

/// Blocking decoder that owns one byte stream for its whole lifetime.
///
/// Each call to [`Decoder::read_value`] returns exactly one top-level value.
/// After any error the stream position is unspecified and the decoder should
/// be dropped.
pub struct Decoder<R> {
    stream: R,
    buffer: BytesMut,
    limits: Limits,
}

impl<R: Read> Decoder<R> {
    pub fn new(stream: R) -> Self {
        Self::with_limits(stream, Limits::default())
    }

    pub fn with_limits(stream: R, limits: Limits) -> Self {
        Decoder {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            limits,
        }
    }

    /// Reads the next complete value from the stream.
    pub fn read_value(&mut self) -> Result<Value> {
        let limits = self.limits;
        let mut scanner = FrameScanner::new();
        let (value, consumed) = self.fill_until(
            |buf| match scanner.scan(buf, &limits) {
                Scan::Pending => Ok(None),
                Scan::Ready => parser::frame(buf, &limits),
            },
            |buf| parser::leftover(buf, &limits),
        )?;
        self.buffer.advance(consumed);
        trace!("decoded {:?} value from {} bytes", value.kind(), consumed);
        Ok(value)
    }

    /// Reads one CRLF-terminated line, returning its content without the
    /// terminator and the number of bytes consumed including it.
    pub fn read_line(&mut self) -> Result<(Bytes, usize)> {
        let (len, consumed) = self.fill_until(
            |buf| Ok(parser::line_frame(buf)),
            |buf| Error::end_of_stream(buf.len()),
        )?;
        let mut line = self.buffer.split_to(consumed);
        line.truncate(len);
        Ok((line.freeze(), consumed))
    }

    /// Bytes read from the stream but not yet decoded.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn get_ref(&self) -> &R {
        &self.stream
    }

    pub fn into_inner(self) -> R {
        self.stream
    }

    fn fill_until<O>(
        &mut self,
        mut parse: impl FnMut(&[u8]) -> std::result::Result<Option<O>, ProtocolError>,
        at_eof: impl FnOnce(&[u8]) -> Error,
    ) -> Result<O> {
        loop {
            if !self.buffer.is_empty() {
                match parse(&self.buffer[..]) {
                    Ok(Some(out)) => return Ok(out),
                    Ok(None) => {}
                    Err(err) => {
                        debug!("protocol error, discarding {} bytes: {}", self.buffer.len(), err);
                        self.buffer.clear();
                        return Err(err.into());
                    }
                }
                if self.buffer.len() > self.limits.max_frame_size {
                    self.buffer.clear();
                    return Err(ProtocolError::FrameTooLarge {
                        limit: self.limits.max_frame_size,
                    }
                    .into());
                }
            }

            if self.fill()? == 0 {
                trace!("end of stream with {} bytes buffered", self.buffer.len());
                let err = at_eof(&self.buffer[..]);
                if matches!(err, Error::Protocol(_)) {
                    self.buffer.clear();
                }
                return Err(err);
            }
        }
    }

    fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::StreamError;

    /// Hands out at most one byte per read.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((byte, rest)) if !buf.is_empty() => {
                    buf[0] = *byte;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_read_values_in_order() {
        let mut decoder = Decoder::new(Cursor::new(b"+OK\r\n:-7\r\n$3\r\nfoo\r\n*-1\r\n"));
        assert_eq!(decoder.read_value().unwrap(), Value::SimpleString("OK".into()));
        assert_eq!(decoder.read_value().unwrap(), Value::Integer(-7));
        assert_eq!(decoder.read_value().unwrap(), Value::BulkString(b"foo".to_vec()));
        assert_eq!(decoder.read_value().unwrap(), Value::Null);
        assert!(decoder.read_value().unwrap_err().is_closed());
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = b"*2\r\n*1\r\n:1\r\n:2\r\n%1\r\n$1\r\nk\r\n,2.5\r\n";
        let mut decoder = Decoder::new(Trickle(input));
        assert_eq!(
            decoder.read_value().unwrap(),
            Value::Array(vec![
                Value::Array(vec![Value::Integer(1)]),
                Value::Integer(2)
            ])
        );
        assert_eq!(
            decoder.read_value().unwrap(),
            Value::Map(vec![(Value::BulkString(b"k".to_vec()), Value::Double(2.5))])
        );
        assert!(decoder.read_value().unwrap_err().is_closed());
    }

    #[test]
    fn test_closed_at_boundary() {
        let mut decoder = Decoder::new(Cursor::new(b""));
        let err = decoder.read_value().unwrap_err();
        assert!(matches!(err, Error::Stream(StreamError::Closed)));
    }

    #[test]
    fn test_truncated_array_is_not_returned() {
        let mut decoder = Decoder::new(Cursor::new(b"*3\r\n:1\r\n:2\r\n"));
        let err = decoder.read_value().unwrap_err();
        assert!(!err.is_closed());
        assert!(matches!(
            err,
            Error::Stream(StreamError::Truncated { buffered: 12 })
        ));
    }

    #[test]
    fn test_unknown_tag() {
        let mut decoder = Decoder::new(Cursor::new(b"@\r\n"));
        assert!(matches!(
            decoder.read_value(),
            Err(Error::Protocol(ProtocolError::UnknownTag { tag: b'@', .. }))
        ));
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn test_io_error() {
        let mut decoder = Decoder::new(Broken);
        assert!(matches!(
            decoder.read_value(),
            Err(Error::Stream(StreamError::Io(_)))
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let limits = Limits {
            max_frame_size: 8,
            ..Limits::default()
        };
        let mut decoder = Decoder::with_limits(Trickle(b"+0123456789abcdef\r\n"), limits);
        assert!(matches!(
            decoder.read_value(),
            Err(Error::Protocol(ProtocolError::FrameTooLarge { limit: 8 }))
        ));
    }

    #[test]
    fn test_read_line() {
        let mut decoder = Decoder::new(Trickle(b"hello\r\n\r\nwor\rld\r\n+OK\r\n"));
        assert_eq!(decoder.read_line().unwrap(), (Bytes::from_static(b"hello"), 7));
        assert_eq!(decoder.read_line().unwrap(), (Bytes::new(), 2));
        assert_eq!(decoder.read_line().unwrap(), (Bytes::from_static(b"wor\rld"), 8));
        assert_eq!(decoder.read_value().unwrap(), Value::SimpleString("OK".into()));
    }

    #[test]
    fn test_read_line_without_terminator() {
        let mut decoder = Decoder::new(Cursor::new(b"hello\r"));
        assert!(matches!(
            decoder.read_line(),
            Err(Error::Stream(StreamError::Truncated { buffered: 6 }))
        ));

        let mut decoder = Decoder::new(Cursor::new(b"hello\n"));
        assert!(matches!(
            decoder.read_line(),
            Err(Error::Stream(StreamError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_malformed_tail_at_end_of_stream() {
        let mut decoder = Decoder::new(Cursor::new(b":1\r\n:x"));
        assert_eq!(decoder.read_value().unwrap(), Value::Integer(1));
        assert!(matches!(
            decoder.read_value(),
            Err(Error::Protocol(ProtocolError::Invalid { offset: 1, .. }))
        ));
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn test_large_array_across_many_reads() {
        let count = 200_000;
        let mut input = format!("*{count}\r\n").into_bytes();
        for _ in 0..count {
            input.extend_from_slice(b":1\r\n");
        }
        input.extend_from_slice(b"+next\r\n");

        let mut decoder = Decoder::new(Cursor::new(input));
        match decoder.read_value().unwrap() {
            Value::Array(elements) => {
                assert_eq!(elements.len(), count);
                assert!(elements.iter().all(|e| *e == Value::Integer(1)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(decoder.read_value().unwrap(), Value::SimpleString("next".into()));
    }

    #[test]
    fn test_into_inner() {
        let mut decoder = Decoder::new(Cursor::new(b":1\r\n"));
        decoder.read_value().unwrap();
        assert_eq!(decoder.get_ref().position(), 4);
        assert_eq!(decoder.into_inner().position(), 4);
    }
}
