// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::Cursor;
use std::str;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// How many arrays may be nested inside each other. Parsing recurses once per level, so this
/// bounds the stack a single request can use.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type '{}'", .0.escape_ascii())]
    InvalidDataType(u8),
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
    #[error("invalid length {0}")]
    InvalidLength(i64),
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    #[error("arrays nested deeper than {} levels", MAX_DEPTH)]
    NestingTooDeep,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    /// Builds a simple string reply. CR and LF can't be carried by a simple string, so they are
    /// replaced with spaces.
    pub fn simple(s: impl Into<String>) -> Frame {
        Frame::Simple(single_line(s.into()))
    }

    /// Builds an error reply, with the same line restriction as [`Frame::simple`].
    pub fn error(s: impl Into<String>) -> Frame {
        Frame::Error(single_line(s.into()))
    }

    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_nested(src, 0)
    }

    fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let line = get_line(src)?;
                Ok(Frame::Simple(to_string(line)?))
            }
            DataType::SimpleError => {
                let line = get_line(src)?;
                Ok(Frame::Error(to_string(line)?))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = get_integer(src)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }
                let data = get_bulk(src, length)?;

                Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let length = get_integer(src)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }
                let length = usize::try_from(length).map_err(|_| Error::InvalidLength(length))?;
                if length > 0 && depth >= MAX_DEPTH {
                    return Err(Error::NestingTooDeep);
                }

                // Every element takes at least one byte, so never reserve more than what is
                // buffered.
                let mut frames = Vec::with_capacity(length.min(src.remaining()));
                for _ in 0..length {
                    let frame = Self::parse_nested(src, depth + 1)?;
                    frames.push(frame);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    /// Writes the wire representation of the frame into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(u8::from(DataType::SimpleString));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.put_u8(u8::from(DataType::SimpleError));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(bytes.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(bytes);
                dst.put_slice(CRLF);
            }
            // RESP2 null bulk string.
            Frame::Null => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(b"-1");
                dst.put_slice(CRLF);
            }
            Frame::Array(arr) => {
                dst.put_u8(u8::from(DataType::Array));
                dst.put_slice(arr.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for frame in arr {
                    frame.encode(dst);
                }
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.encode(&mut bytes);
        bytes.to_vec()
    }
}

// Used for logging only, bulk payloads are rendered lossily.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}[", arr.len())?;
                for (i, frame) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", frame)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// What [`read_header`] found at the start of an element.
#[derive(Debug, PartialEq)]
pub(crate) enum Header {
    /// A whole element that contains nothing else: a string, an error, a bulk string or a null.
    Leaf,
    /// The header of an array, followed by this many elements.
    Array(usize),
}

/// Skips over the next element without building it, stopping right after the count line when
/// the element is an array. Lets the codec find out whether a whole frame is buffered without
/// parsing it over and over.
pub(crate) fn read_header(src: &mut Cursor<&[u8]>) -> Result<Header, Error> {
    let first_byte = get_byte(src)?;

    match DataType::try_from(first_byte)? {
        DataType::SimpleString | DataType::SimpleError => {
            get_line(src)?;
            Ok(Header::Leaf)
        }
        DataType::BulkString => {
            let length = get_integer(src)?;
            if length != -1 {
                get_bulk(src, length)?;
            }
            Ok(Header::Leaf)
        }
        DataType::Array => {
            let length = get_integer(src)?;
            match length {
                -1 | 0 => Ok(Header::Leaf),
                _ => usize::try_from(length)
                    .map(Header::Array)
                    .map_err(|_| Error::InvalidLength(length)),
            }
        }
    }
}

fn single_line(s: String) -> String {
    if s.contains(['\r', '\n']) {
        s.replace(['\r', '\n'], " ")
    } else {
        s
    }
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;

    str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::InvalidInteger(String::from_utf8_lossy(line).into_owned()))
}

// The payload is binary safe, so it is sliced by length rather than by searching for the next
// CRLF.
fn get_bulk<'a>(src: &mut Cursor<&'a [u8]>, length: i64) -> Result<&'a [u8], Error> {
    let length = usize::try_from(length).map_err(|_| Error::InvalidLength(length))?;
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = start.saturating_add(length);
    if buf.len().saturating_sub(start) < length.saturating_add(CRLF.len()) {
        return Err(Error::Incomplete);
    }

    if &buf[end..end + CRLF.len()] != CRLF {
        return Err(Error::MissingTerminator);
    }
    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn to_string(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)
}

/// The type markers this server understands. Null has no marker of its own, it is the bulk
/// string marker followed by a length of -1.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
