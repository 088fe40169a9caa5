//! Incremental frame boundary detection.
//!
//! The decoders hand every read to [`FrameScanner::scan`], which walks the
//! new bytes once without building values. The full parser only runs when
//! a frame is known to be buffered in full, or when the scanner sees input
//! it cannot frame and the parser has to report the error.

use crate::config::Limits;
use crate::parser::parse_decimal;
use crate::value::Kind;

/// Outcome of scanning the buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// More bytes are needed before anything can be decoded.
    Pending,
    /// The parser should run now; a whole frame, or a malformed one, is
    /// buffered.
    Ready,
}

/// Resumable skip-only walk over one frame.
///
/// The scanner remembers where it stopped, so feeding it a buffer that
/// only grows at the back costs time proportional to the new bytes. Call
/// [`reset`](FrameScanner::reset) whenever the front of the buffer is
/// consumed or discarded.
#[derive(Debug, Default)]
pub struct FrameScanner {
    /// Start of the next element that is not yet complete.
    pos: usize,
    /// Where the CRLF search of the element at `pos` resumes.
    searched: usize,
    /// Children still owed by each open aggregate, innermost last.
    pending: Vec<usize>,
}

/// What an element header asks for once its line has been read.
enum Step {
    /// The element ended with its header line.
    Done,
    /// A bulk body of this many bytes plus CRLF follows.
    Body(usize),
    /// An aggregate with this many children follows.
    Open(usize),
    /// The parser must take over.
    Malformed,
}

impl FrameScanner {
    pub fn new() -> FrameScanner {
        FrameScanner::default()
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.searched = 0;
        self.pending.clear();
    }

    /// Continues scanning `buf`, which must extend the buffer passed to the
    /// previous call since the last [`reset`](FrameScanner::reset).
    pub fn scan(&mut self, buf: &[u8], limits: &Limits) -> Scan {
        loop {
            let Some(&tag) = buf.get(self.pos) else {
                return Scan::Pending;
            };
            let Some(kind) = Kind::from_tag(tag) else {
                return Scan::Ready;
            };
            let Some(eol) = self.find_crlf(buf) else {
                return Scan::Pending;
            };
            let header = &buf[self.pos + 1..eol];
            let next = eol + 2;

            match self.step(kind, header, limits) {
                Step::Malformed => return Scan::Ready,
                Step::Body(len) => {
                    let Some(end) = next.checked_add(len).and_then(|n| n.checked_add(2)) else {
                        return Scan::Ready;
                    };
                    if buf.len() < end {
                        return Scan::Pending;
                    }
                    self.advance(end);
                }
                Step::Open(0) | Step::Done => self.advance(next),
                Step::Open(children) => {
                    self.pending.push(children);
                    self.pos = next;
                    self.searched = next;
                    continue;
                }
            }

            if self.pending.is_empty() {
                return Scan::Ready;
            }
        }
    }

    fn step(&self, kind: Kind, header: &[u8], limits: &Limits) -> Step {
        match kind {
            Kind::BulkString | Kind::BulkError | Kind::VerbatimString => {
                match parse_decimal(header) {
                    Some(len) if len < 0 && kind == Kind::BulkString => Step::Done,
                    Some(len) => match usize::try_from(len) {
                        Ok(len) if len <= limits.max_bulk_len => Step::Body(len),
                        _ => Step::Malformed,
                    },
                    None => Step::Malformed,
                }
            }
            Kind::Array | Kind::Map | Kind::Set | Kind::Push | Kind::Attribute => {
                let Some(len) = parse_decimal(header) else {
                    return Step::Malformed;
                };
                if len < 0 {
                    return if kind == Kind::Array {
                        Step::Done
                    } else {
                        Step::Malformed
                    };
                }
                if self.pending.len() >= limits.max_depth {
                    return Step::Malformed;
                }
                let len = match usize::try_from(len) {
                    Ok(len) if len <= limits.max_elements => len,
                    _ => return Step::Malformed,
                };
                match kind {
                    Kind::Map => Step::Open(len.saturating_mul(2)),
                    // entries plus the value they annotate
                    Kind::Attribute => Step::Open(len.saturating_mul(2).saturating_add(1)),
                    _ => Step::Open(len),
                }
            }
            _ => Step::Done,
        }
    }

    /// Marks the element at `pos` complete, closing every aggregate it
    /// finishes.
    fn advance(&mut self, end: usize) {
        self.pos = end;
        self.searched = end;
        while let Some(remaining) = self.pending.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                break;
            }
            self.pending.pop();
        }
    }

    /// Offset of the first CRLF after the tag byte at `pos`.
    fn find_crlf(&mut self, buf: &[u8]) -> Option<usize> {
        let start = self.searched.max(self.pos + 1);
        let found = buf
            .get(start..)?
            .windows(2)
            .position(|w| w == b"\r\n")
            .map(|i| start + i);
        if found.is_none() {
            // a trailing `\r` may still pair with the next byte
            self.searched = buf.len().saturating_sub(1).max(self.pos + 1);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(input: &[u8]) -> Scan {
        FrameScanner::new().scan(input, &Limits::default())
    }

    /// Feeds `input` one byte at a time and returns the length at which the
    /// scanner first reported `Ready`.
    fn ready_at(input: &[u8], limits: &Limits) -> Option<usize> {
        let mut scanner = FrameScanner::new();
        (1..=input.len()).find(|&n| scanner.scan(&input[..n], limits) == Scan::Ready)
    }

    #[test]
    fn test_simple_frames() {
        assert_eq!(scan_all(b"+OK\r\n"), Scan::Ready);
        assert_eq!(scan_all(b":-0\r\n"), Scan::Ready);
        assert_eq!(scan_all(b"_\r\n"), Scan::Ready);
        assert_eq!(scan_all(b"+OK\r"), Scan::Pending);
        assert_eq!(scan_all(b""), Scan::Pending);
    }

    #[test]
    fn test_bulk_body_may_contain_crlf() {
        assert_eq!(scan_all(b"$7\r\nfoo\r\nba"), Scan::Pending);
        assert_eq!(scan_all(b"$7\r\nfoo\r\nba\r\n"), Scan::Ready);
        assert_eq!(scan_all(b"$-1\r\n"), Scan::Ready);
        assert_eq!(scan_all(b"$03\r\nabc\r\n"), Scan::Ready);
    }

    #[test]
    fn test_byte_at_a_time() {
        let limits = Limits::default();
        let input = b"*3\r\n$5\r\nhello\r\n%1\r\n+k\r\n*0\r\n|1\r\n+ttl\r\n:1\r\n*-1\r\n";
        assert_eq!(ready_at(input, &limits), Some(input.len()));
        let input = b"+a\r\r\n";
        assert_eq!(ready_at(input, &limits), Some(input.len()));
    }

    #[test]
    fn test_stops_at_first_frame() {
        let limits = Limits::default();
        let input = b"*2\r\n:1\r\n:2\r\n+next\r\n";
        assert_eq!(ready_at(input, &limits), Some(12));
    }

    #[test]
    fn test_malformed_input_is_handed_to_the_parser() {
        assert_eq!(scan_all(b"@oops"), Scan::Ready);
        assert_eq!(scan_all(b"*2\r\n:1\r\n@"), Scan::Ready);
        assert_eq!(scan_all(b"$abc\r\n"), Scan::Ready);
        assert_eq!(scan_all(b"%-1\r\n"), Scan::Ready);
        assert_eq!(scan_all(b"!-1\r\n"), Scan::Ready);
    }

    #[test]
    fn test_limits_end_the_wait() {
        let limits = Limits {
            max_depth: 1,
            max_elements: 2,
            max_bulk_len: 4,
            ..Limits::default()
        };
        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.scan(b"*1\r\n*1\r\n", &limits), Scan::Ready);
        scanner.reset();
        assert_eq!(scanner.scan(b"*1\r\n*-1\r\n", &limits), Scan::Ready);
        scanner.reset();
        assert_eq!(scanner.scan(b"*3\r\n", &limits), Scan::Ready);
        scanner.reset();
        assert_eq!(scanner.scan(b"$5\r\n", &limits), Scan::Ready);
        scanner.reset();
        assert_eq!(scanner.scan(b"$4\r\n", &limits), Scan::Pending);
    }

    #[test]
    fn test_resumes_where_it_stopped() {
        let limits = Limits::default();
        let input = b"*3\r\n:1\r\n+partial line";
        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.scan(input, &limits), Scan::Pending);
        assert_eq!(scanner.pos, 8);
        assert_eq!(scanner.searched, input.len() - 1);
        assert_eq!(scanner.pending, vec![2]);

        let mut input = input.to_vec();
        input.extend_from_slice(b"\r\n$3\r\nab");
        assert_eq!(scanner.scan(&input, &limits), Scan::Pending);
        assert_eq!(scanner.pos, 23);
        assert_eq!(scanner.pending, vec![1]);

        input.extend_from_slice(b"c\r\n");
        assert_eq!(scanner.scan(&input, &limits), Scan::Ready);
        assert!(scanner.pending.is_empty());
    }

    #[test]
    fn test_reset_starts_over() {
        let limits = Limits::default();
        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.scan(b"*2\r\n:1\r\n", &limits), Scan::Pending);
        scanner.reset();
        assert_eq!(scanner.scan(b":1\r\n", &limits), Scan::Ready);
    }
}
