use core::str;

use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, fail, opt, peek, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode, StrContext::*};
use winnow::prelude::*;
use winnow::stream::Stream as _;
use winnow::token::{any, one_of, take, take_until};
use winnow::{dispatch, BStr, Partial};

use crate::config::Limits;
use crate::error::{Error, ProtocolError};
use crate::value::{Kind, Value};

pub type Input<'i> = Partial<&'i BStr>;

const CRLF: &[u8] = b"\r\n";

const TYPE_TAG: &str = "type tag";

pub fn new_input(input: &[u8]) -> Input {
    Partial::new(BStr::new(input))
}

/// Decodes one value from the front of `buf`.
///
/// Returns the value with the number of bytes it occupied, or `None` when
/// `buf` holds only a prefix of a value.
pub fn frame(buf: &[u8], limits: &Limits) -> Result<Option<(Value, usize)>, ProtocolError> {
    let mut input = new_input(buf);
    let result = value(&mut input, limits, 0);
    let offset = buf.len() - input.eof_offset();
    match result {
        Ok(value) => Ok(Some((value, offset))),
        Err(ErrMode::Incomplete(_)) => Ok(None),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(protocol_error(buf, offset, &err)),
    }
}

/// Classifies bytes left over when the stream ends: malformed input is a
/// protocol error, anything else a truncated frame.
pub fn leftover(buf: &[u8], limits: &Limits) -> Error {
    match frame(buf, limits) {
        Err(err) => err.into(),
        Ok(_) => Error::end_of_stream(buf.len()),
    }
}

/// Finds the first CRLF-terminated line in `buf`.
///
/// Returns the length of the line content and the bytes consumed including
/// the terminator.
pub fn line_frame(buf: &[u8]) -> Option<(usize, usize)> {
    let mut input = new_input(buf);
    let line = raw_line.parse_next(&mut input).ok()?;
    Some((line.len(), buf.len() - input.eof_offset()))
}

fn protocol_error(buf: &[u8], offset: usize, err: &ContextError) -> ProtocolError {
    let unknown_tag = err
        .context()
        .any(|c| matches!(c, Label(label) if *label == TYPE_TAG));
    match buf.get(offset) {
        Some(&tag) if unknown_tag => ProtocolError::UnknownTag { tag, offset },
        _ => ProtocolError::Invalid {
            offset,
            message: err.to_string().replace('\n', "; "),
        },
    }
}

pub fn value(input: &mut Input<'_>, limits: &Limits, depth: usize) -> PResult<Value> {
    dispatch! {
        peek(any).map(Kind::from_tag);
        Some(Kind::SimpleString) => simple_string,
        Some(Kind::SimpleError) => simple_error,
        Some(Kind::Integer) => integer,
        Some(Kind::BulkString) => |i: &mut Input<'_>| bulk_string(i, limits),
        Some(Kind::Array) => |i: &mut Input<'_>| array(i, limits, depth),
        Some(Kind::Null) => null,
        Some(Kind::Boolean) => boolean,
        Some(Kind::Double) => double,
        Some(Kind::BigNumber) => big_number,
        Some(Kind::BulkError) => |i: &mut Input<'_>| bulk_error(i, limits),
        Some(Kind::VerbatimString) => |i: &mut Input<'_>| verbatim_string(i, limits),
        Some(Kind::Map) => |i: &mut Input<'_>| map(i, limits, depth),
        Some(Kind::Attribute) => |i: &mut Input<'_>| attribute(i, limits, depth),
        Some(Kind::Set) => |i: &mut Input<'_>| set(i, limits, depth),
        Some(Kind::Push) => |i: &mut Input<'_>| push(i, limits, depth),
        _ => cut_err(fail).context(Label(TYPE_TAG)),
    }
    .parse_next(input)
}

fn reject<O>(input: &mut Input<'_>, what: &'static str) -> PResult<O> {
    cut_err(fail).context(Label(what)).parse_next(input)
}

#[inline]
fn raw_line<'i>(input: &mut Input<'i>) -> PResult<&'i [u8]> {
    terminated(take_until(0.., CRLF), CRLF).parse_next(input)
}

#[inline]
fn line<'i>(input: &mut Input<'i>) -> PResult<&'i str> {
    raw_line.try_map(|s| str::from_utf8(s)).parse_next(input)
}

/// Optionally signed base-10 `i64`, accepting leading zeros and `-0`.
pub(crate) fn parse_decimal(s: &[u8]) -> Option<i64> {
    str::from_utf8(s).ok()?.parse().ok()
}

fn decimal(input: &mut Input<'_>) -> PResult<i64> {
    (opt(one_of([b'+', b'-'])), digit1)
        .take()
        .verify_map(parse_decimal)
        .parse_next(input)
}

#[inline]
fn length(input: &mut Input) -> PResult<i64> {
    terminated(decimal, CRLF)
        .context(Label("length"))
        .parse_next(input)
}

/// Declared body length of a bulk-framed value; `None` for negative lengths.
fn bulk_len(input: &mut Input<'_>, limits: &Limits) -> PResult<Option<usize>> {
    let len = length.parse_next(input)?;
    if len < 0 {
        return Ok(None);
    }
    match usize::try_from(len) {
        Ok(len) if len <= limits.max_bulk_len => Ok(Some(len)),
        _ => reject(input, "bulk length"),
    }
}

/// Element count of an aggregate; `None` for negative counts.
fn aggregate_len(input: &mut Input<'_>, limits: &Limits, depth: usize) -> PResult<Option<usize>> {
    let len = length.parse_next(input)?;
    if len < 0 {
        return Ok(None);
    }
    if depth >= limits.max_depth {
        return reject(input, "nesting depth");
    }
    match usize::try_from(len) {
        Ok(len) if len <= limits.max_elements => Ok(Some(len)),
        _ => reject(input, "element count"),
    }
}

/// Exactly `len` bytes followed by CRLF.
fn bulk_body<'i>(input: &mut Input<'i>, len: usize) -> PResult<&'i [u8]> {
    terminated(take(len), cut_err(CRLF).context(Label("bulk length")))
        .parse_next(input)
}

fn elements(input: &mut Input<'_>, len: usize, limits: &Limits, depth: usize) -> PResult<Vec<Value>> {
    repeat(len, move |i: &mut Input<'_>| value(i, limits, depth + 1))
        .fold(Vec::new, |mut v: Vec<_>, elem: Value| {
            v.push(elem);
            v
        })
        .parse_next(input)
}

fn entries(
    input: &mut Input<'_>,
    len: usize,
    limits: &Limits,
    depth: usize,
) -> PResult<Vec<(Value, Value)>> {
    let child = move |i: &mut Input<'_>| value(i, limits, depth + 1);
    repeat(len, (child, child))
        .fold(Vec::new, |mut v: Vec<_>, entry: (Value, Value)| {
            v.push(entry);
            v
        })
        .parse_next(input)
}

fn simple_string(input: &mut Input) -> PResult<Value> {
    preceded(Kind::SimpleString.tag(), line)
        .map(|s| Value::SimpleString(s.into()))
        .context(Label("simple string"))
        .parse_next(input)
}

fn simple_error(input: &mut Input) -> PResult<Value> {
    preceded(Kind::SimpleError.tag(), line)
        .map(|s| Value::SimpleError(s.into()))
        .context(Label("simple error"))
        .parse_next(input)
}

fn integer(input: &mut Input) -> PResult<Value> {
    preceded(Kind::Integer.tag(), cut_err(terminated(decimal, CRLF)))
        .map(Value::Integer)
        .context(Label("integer"))
        .parse_next(input)
}

fn bulk_string(input: &mut Input<'_>, limits: &Limits) -> PResult<Value> {
    preceded(Kind::BulkString.tag(), move |input: &mut Input<'_>| {
        match bulk_len(input, limits)? {
            None => Ok(Value::NullBulkString),
            Some(len) => bulk_body(input, len).map(|s| Value::BulkString(s.into())),
        }
    })
    .context(Label("bulk string"))
    .parse_next(input)
}

fn bulk_error(input: &mut Input<'_>, limits: &Limits) -> PResult<Value> {
    preceded(Kind::BulkError.tag(), move |input: &mut Input<'_>| {
        match bulk_len(input, limits)? {
            None => reject(input, "bulk error length"),
            Some(len) => bulk_body(input, len).map(|s| Value::BulkError(s.into())),
        }
    })
    .context(Label("bulk error"))
    .parse_next(input)
}

fn verbatim_string(input: &mut Input<'_>, limits: &Limits) -> PResult<Value> {
    preceded(Kind::VerbatimString.tag(), move |input: &mut Input<'_>| {
        let Some(len) = bulk_len(input, limits)? else {
            return reject(input, "verbatim string length");
        };
        let body = bulk_body(input, len)?;
        // `fmt:` prefix: three format bytes and a colon
        if body.len() < 4 || body[3] != b':' {
            return reject(input, "verbatim string format");
        }
        match str::from_utf8(&body[..3]) {
            Ok(format) => Ok(Value::VerbatimString {
                format: format.into(),
                text: body[4..].into(),
            }),
            Err(_) => reject(input, "verbatim string format"),
        }
    })
    .context(Label("verbatim string"))
    .parse_next(input)
}

fn null(input: &mut Input) -> PResult<Value> {
    preceded(Kind::Null.tag(), cut_err(CRLF))
        .value(Value::Null)
        .context(Label("null"))
        .parse_next(input)
}

fn boolean(input: &mut Input) -> PResult<Value> {
    preceded(
        Kind::Boolean.tag(),
        cut_err(terminated(alt((b't'.value(true), b'f'.value(false))), CRLF)),
    )
    .map(Value::Boolean)
    .context(Label("boolean"))
    .parse_next(input)
}

/// `inf`, `-inf`, `nan`, or a finite decimal with optional fraction and
/// exponent.
fn parse_double(s: &str) -> Option<f64> {
    match s {
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ if s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E')) =>
        {
            s.parse().ok().filter(|d: &f64| d.is_finite())
        }
        _ => None,
    }
}

fn double(input: &mut Input) -> PResult<Value> {
    preceded(
        Kind::Double.tag(),
        cut_err(line.verify_map(|s: &str| parse_double(s))),
    )
    .map(Value::Double)
    .context(Label("double"))
    .parse_next(input)
}

fn is_big_number(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn big_number(input: &mut Input) -> PResult<Value> {
    preceded(
        Kind::BigNumber.tag(),
        cut_err(line.verify(|s: &str| is_big_number(s))),
    )
    .map(|s| Value::BigNumber(s.into()))
    .context(Label("big number"))
    .parse_next(input)
}

fn array(input: &mut Input<'_>, limits: &Limits, depth: usize) -> PResult<Value> {
    preceded(Kind::Array.tag(), move |input: &mut Input<'_>| {
        match aggregate_len(input, limits, depth)? {
            None => Ok(Value::Null),
            Some(len) => elements(input, len, limits, depth).map(Value::Array),
        }
    })
    .context(Label("array"))
    .parse_next(input)
}

fn set(input: &mut Input<'_>, limits: &Limits, depth: usize) -> PResult<Value> {
    preceded(Kind::Set.tag(), move |input: &mut Input<'_>| {
        match aggregate_len(input, limits, depth)? {
            None => reject(input, "set length"),
            Some(len) => elements(input, len, limits, depth).map(Value::Set),
        }
    })
    .context(Label("set"))
    .parse_next(input)
}

fn push(input: &mut Input<'_>, limits: &Limits, depth: usize) -> PResult<Value> {
    preceded(Kind::Push.tag(), move |input: &mut Input<'_>| {
        match aggregate_len(input, limits, depth)? {
            None => reject(input, "push length"),
            Some(len) => elements(input, len, limits, depth).map(Value::Push),
        }
    })
    .context(Label("push"))
    .parse_next(input)
}

fn map(input: &mut Input<'_>, limits: &Limits, depth: usize) -> PResult<Value> {
    preceded(Kind::Map.tag(), move |input: &mut Input<'_>| {
        match aggregate_len(input, limits, depth)? {
            None => reject(input, "map length"),
            Some(len) => entries(input, len, limits, depth).map(Value::Map),
        }
    })
    .context(Label("map"))
    .parse_next(input)
}

fn attribute(input: &mut Input<'_>, limits: &Limits, depth: usize) -> PResult<Value> {
    preceded(Kind::Attribute.tag(), move |input: &mut Input<'_>| {
        let Some(len) = aggregate_len(input, limits, depth)? else {
            return reject(input, "attribute length");
        };
        let attributes = entries(input, len, limits, depth)?;
        // the attributed value counts as one level deeper so that chained
        // attributes stay bounded by the depth limit
        let value = value(input, limits, depth + 1)?;
        Ok(Value::Attribute {
            attributes,
            value: Box::new(value),
        })
    })
    .context(Label("attribute"))
    .parse_next(input)
}
