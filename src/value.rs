use std::fmt;

/// Type vocabulary of the protocol, one entry per [`Value`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    SimpleString,
    SimpleError,
    Integer,
    BulkString,
    NullBulkString,
    Array,
    Null,
    Boolean,
    Double,
    BigNumber,
    BulkError,
    VerbatimString,
    Map,
    Attribute,
    Set,
    Push,
}

impl Kind {
    /// Wire tag byte that introduces a value of this kind.
    ///
    /// `NullBulkString` has no tag of its own; it travels as a bulk string
    /// with a negative length.
    pub const fn tag(self) -> u8 {
        match self {
            Kind::SimpleString => b'+',
            Kind::SimpleError => b'-',
            Kind::Integer => b':',
            Kind::BulkString | Kind::NullBulkString => b'$',
            Kind::Array => b'*',
            Kind::Null => b'_',
            Kind::Boolean => b'#',
            Kind::Double => b',',
            Kind::BigNumber => b'(',
            Kind::BulkError => b'!',
            Kind::VerbatimString => b'=',
            Kind::Map => b'%',
            // RESP3 wire byte; `.` is the streamed-aggregate terminator and
            // is never accepted as a tag
            Kind::Attribute => b'|',
            Kind::Set => b'~',
            Kind::Push => b'>',
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Kind> {
        Some(match tag {
            b'+' => Kind::SimpleString,
            b'-' => Kind::SimpleError,
            b':' => Kind::Integer,
            b'$' => Kind::BulkString,
            b'*' => Kind::Array,
            b'_' => Kind::Null,
            b'#' => Kind::Boolean,
            b',' => Kind::Double,
            b'(' => Kind::BigNumber,
            b'!' => Kind::BulkError,
            b'=' => Kind::VerbatimString,
            b'%' => Kind::Map,
            b'|' => Kind::Attribute,
            b'~' => Kind::Set,
            b'>' => Kind::Push,
            _ => return None,
        })
    }
}

/// A decoded protocol value.
///
/// Values form finite trees: aggregates own their children and nothing
/// points back up.
#[derive(Clone, PartialEq)]
pub enum Value {
    SimpleString(String),
    SimpleError(String),
    Integer(i64),
    BulkString(Vec<u8>),
    NullBulkString,
    Array(Vec<Value>),
    Null,
    Boolean(bool),
    Double(f64),
    /// Sign and decimal digits, kept as text since they may exceed any
    /// native integer.
    BigNumber(String),
    BulkError(Vec<u8>),
    VerbatimString {
        format: String,
        text: Vec<u8>,
    },
    Map(Vec<(Value, Value)>),
    Attribute {
        attributes: Vec<(Value, Value)>,
        value: Box<Value>,
    },
    Set(Vec<Value>),
    Push(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::SimpleString(_) => Kind::SimpleString,
            Value::SimpleError(_) => Kind::SimpleError,
            Value::Integer(_) => Kind::Integer,
            Value::BulkString(_) => Kind::BulkString,
            Value::NullBulkString => Kind::NullBulkString,
            Value::Array(_) => Kind::Array,
            Value::Null => Kind::Null,
            Value::Boolean(_) => Kind::Boolean,
            Value::Double(_) => Kind::Double,
            Value::BigNumber(_) => Kind::BigNumber,
            Value::BulkError(_) => Kind::BulkError,
            Value::VerbatimString { .. } => Kind::VerbatimString,
            Value::Map(_) => Kind::Map,
            Value::Attribute { .. } => Kind::Attribute,
            Value::Set(_) => Kind::Set,
            Value::Push(_) => Kind::Push,
        }
    }

    /// Text payload of string-like kinds.
    pub fn text(&self) -> Option<&[u8]> {
        match self {
            Value::SimpleString(s) | Value::SimpleError(s) => Some(s.as_bytes()),
            Value::BulkString(b) | Value::BulkError(b) => Some(b),
            Value::VerbatimString { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Children of sequence aggregates (arrays, sets and pushes).
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) | Value::Set(v) | Value::Push(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::NullBulkString)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value_debug(f, self, 0)
    }
}

fn write_value_debug(f: &mut fmt::Formatter<'_>, v: &Value, indent: usize) -> fmt::Result {
    match v {
        Value::Null | Value::NullBulkString => writeln!(f, "(nil)"),
        Value::SimpleError(s) => writeln!(f, "(error) {s}"),
        Value::BulkError(b) => writeln!(f, "(error) {}", b.escape_ascii()),
        Value::SimpleString(s) => writeln!(f, "\"{s}\""),
        Value::BulkString(b) => writeln!(f, "\"{}\"", b.escape_ascii()),
        Value::VerbatimString { format, text } => {
            writeln!(f, "\"{format}:{}\"", text.escape_ascii())
        }
        Value::Integer(i) => writeln!(f, "(integer) {i}"),
        Value::Boolean(b) => writeln!(f, "({b})"),
        Value::Double(d) => writeln!(f, "(double) {d}"),
        Value::BigNumber(n) => writeln!(f, "(big number) {n}"),
        Value::Array(v) | Value::Push(v) => write_elements(f, v, ')', indent),
        Value::Set(v) => write_elements(f, v, '~', indent),
        Value::Map(entries) => write_entries(f, entries, '#', indent),
        Value::Attribute { attributes, value } => {
            write_entries(f, attributes, '|', indent)?;
            write!(f, "{:>indent$}", "")?;
            write_value_debug(f, value, indent)
        }
    }
}

fn number_width(len: usize) -> usize {
    (len as f64).log10().floor() as usize + 1
}

fn write_elements(f: &mut fmt::Formatter<'_>, v: &[Value], marker: char, indent: usize) -> fmt::Result {
    if v.is_empty() {
        return writeln!(f, "(empty array)");
    }
    let num_width = number_width(v.len());
    for (i, v) in v.iter().enumerate() {
        if i > 0 {
            write!(f, "{:>indent$}", "")?;
        }
        write!(f, "{i:>num_width$}{marker} ", i = i + 1)?;
        write_value_debug(f, v, indent + num_width + 2)?
    }
    Ok(())
}

fn write_entries(
    f: &mut fmt::Formatter<'_>,
    entries: &[(Value, Value)],
    marker: char,
    indent: usize,
) -> fmt::Result {
    if entries.is_empty() {
        return writeln!(f, "(empty hash)");
    }
    let num_width = number_width(entries.len());
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            write!(f, "{:>indent$}", "")?;
        }
        write!(f, "{i:>num_width$}{marker} ", i = i + 1)?;
        write_value_debug(f, key, indent + num_width + 2)?;
        write!(f, "{:>width$}=> ", "", width = indent + num_width + 2)?;
        write_value_debug(f, value, indent + num_width + 5)?
    }
    Ok(())
}
