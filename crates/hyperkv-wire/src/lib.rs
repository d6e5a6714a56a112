//! RESP (REdis Serialization Protocol) v2 wire codec.
//!
//! [`Decoder`] consumes a growing [`BytesMut`] and yields zero or more
//! complete [`Frame`]s; it never advances the buffer past bytes that do not
//! yet form a complete frame. [`Frame::encode`] produces the canonical
//! textual wire form for a reply.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Default ceiling on a bulk string's declared length.
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Result type for wire codec operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised while decoding or encoding RESP frames.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("bulk string length {len} exceeds configured maximum {max}")]
    BulkTooLarge { len: i64, max: usize },

    #[error("array length {len} exceeds configured maximum {max}")]
    ArrayTooLarge { len: i64, max: usize },
}

impl WireError {
    fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }
}

/// A single RESP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    SimpleString(Bytes),
    Error(Bytes),
    Integer(i64),
    /// `None` represents the RESP null bulk string (`$-1\r\n`).
    BulkString(Option<Bytes>),
    /// `None` represents the RESP null array (`*-1\r\n`).
    Array(Option<Vec<Frame>>),
}

impl Frame {
    pub fn simple(s: impl Into<Bytes>) -> Self {
        Frame::SimpleString(s.into())
    }

    pub fn error(s: impl Into<Bytes>) -> Self {
        Frame::Error(s.into())
    }

    pub fn integer(v: i64) -> Self {
        Frame::Integer(v)
    }

    pub fn bulk(b: impl Into<Bytes>) -> Self {
        Frame::BulkString(Some(b.into()))
    }

    pub fn null_bulk() -> Self {
        Frame::BulkString(None)
    }

    pub fn array(frames: Vec<Frame>) -> Self {
        Frame::Array(Some(frames))
    }

    pub fn null_array() -> Self {
        Frame::Array(None)
    }

    /// Interprets this frame as a command: a non-null array of bulk strings.
    ///
    /// Returns `None` if the frame is not shaped like a command (callers
    /// should treat that as a protocol error).
    pub fn as_command(&self) -> Option<Vec<Bytes>> {
        let Frame::Array(Some(items)) = self else {
            return None;
        };
        items
            .iter()
            .map(|item| match item {
                Frame::BulkString(Some(b)) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    /// Encodes this frame into its canonical RESP textual representation.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Frame::SimpleString(s) => {
                buf.extend_from_slice(b"+");
                buf.extend_from_slice(s);
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Error(s) => {
                buf.extend_from_slice(b"-");
                buf.extend_from_slice(s);
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Integer(v) => {
                buf.extend_from_slice(b":");
                buf.extend_from_slice(v.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Frame::BulkString(None) => {
                buf.extend_from_slice(b"$-1\r\n");
            }
            Frame::BulkString(Some(b)) => {
                buf.extend_from_slice(b"$".as_ref());
                buf.extend_from_slice(b.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(b);
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Array(None) => {
                buf.extend_from_slice(b"*-1\r\n");
            }
            Frame::Array(Some(items)) => {
                buf.extend_from_slice(b"*");
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }
}

/// Incremental RESP decoder.
///
/// One [`Decoder`] is owned per connection. [`Decoder::decode`] is called
/// whenever new bytes arrive; it returns `Ok(None)` when the buffer holds no
/// complete frame yet, without consuming anything.
#[derive(Debug, Clone)]
pub struct Decoder {
    max_bulk_len: usize,
    max_array_len: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_array_len: 1024 * 1024,
        }
    }
}

impl Decoder {
    pub fn new(max_bulk_len: usize, max_array_len: usize) -> Self {
        Self {
            max_bulk_len,
            max_array_len,
        }
    }

    /// Attempts to decode one complete frame from the front of `buf`.
    ///
    /// On success, the consumed bytes are removed from `buf`. On
    /// `Ok(None)`, `buf` is left untouched: the caller should read more
    /// bytes and call again.
    #[tracing::instrument(skip_all, fields(buf_len = buf.len()))]
    pub fn decode(&self, buf: &mut BytesMut) -> WireResult<Option<Frame>> {
        let mut pos = 0usize;
        match self.parse_frame(buf, &mut pos)? {
            Some(frame) => {
                buf.advance(pos);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    fn parse_frame(&self, buf: &[u8], pos: &mut usize) -> WireResult<Option<Frame>> {
        if *pos >= buf.len() {
            return Ok(None);
        }
        let marker = buf[*pos];
        let body_start = *pos + 1;
        match marker {
            b'+' => self.parse_line(buf, body_start, pos, |line| {
                Frame::SimpleString(Bytes::copy_from_slice(line))
            }),
            b'-' => self.parse_line(buf, body_start, pos, |line| {
                Frame::Error(Bytes::copy_from_slice(line))
            }),
            b':' => {
                let Some((line, line_end)) = read_line(buf, body_start) else {
                    return Ok(None);
                };
                let text = std::str::from_utf8(line)
                    .map_err(|_| WireError::protocol("non-UTF-8 integer"))?;
                let value: i64 = text
                    .parse()
                    .map_err(|_| WireError::protocol(format!("invalid integer: {text}")))?;
                *pos = line_end;
                Ok(Some(Frame::Integer(value)))
            }
            b'$' => self.parse_bulk_string(buf, body_start, pos),
            b'*' => self.parse_array(buf, body_start, pos),
            other => Err(WireError::protocol(format!(
                "unexpected type byte {other:#04x}"
            ))),
        }
    }

    fn parse_line(
        &self,
        buf: &[u8],
        body_start: usize,
        pos: &mut usize,
        build: impl FnOnce(&[u8]) -> Frame,
    ) -> WireResult<Option<Frame>> {
        let Some((line, line_end)) = read_line(buf, body_start) else {
            return Ok(None);
        };
        *pos = line_end;
        Ok(Some(build(line)))
    }

    fn parse_bulk_string(
        &self,
        buf: &[u8],
        body_start: usize,
        pos: &mut usize,
    ) -> WireResult<Option<Frame>> {
        let Some((len_line, after_len)) = read_line(buf, body_start) else {
            return Ok(None);
        };
        let text = std::str::from_utf8(len_line)
            .map_err(|_| WireError::protocol("non-UTF-8 bulk length"))?;
        let len: i64 = text
            .parse()
            .map_err(|_| WireError::protocol(format!("invalid bulk length: {text}")))?;

        if len == -1 {
            *pos = after_len;
            return Ok(Some(Frame::BulkString(None)));
        }
        if len < -1 {
            return Err(WireError::protocol(format!("negative bulk length {len}")));
        }
        if len as usize > self.max_bulk_len {
            return Err(WireError::BulkTooLarge {
                len,
                max: self.max_bulk_len,
            });
        }

        let len = len as usize;
        let payload_end = after_len + len;
        let terminator_end = payload_end + 2;
        if buf.len() < terminator_end {
            return Ok(None);
        }
        if &buf[payload_end..terminator_end] != b"\r\n" {
            return Err(WireError::protocol("bulk string missing CRLF terminator"));
        }

        let payload = Bytes::copy_from_slice(&buf[after_len..payload_end]);
        *pos = terminator_end;
        Ok(Some(Frame::BulkString(Some(payload))))
    }

    fn parse_array(
        &self,
        buf: &[u8],
        body_start: usize,
        pos: &mut usize,
    ) -> WireResult<Option<Frame>> {
        let Some((len_line, after_len)) = read_line(buf, body_start) else {
            return Ok(None);
        };
        let text = std::str::from_utf8(len_line)
            .map_err(|_| WireError::protocol("non-UTF-8 array length"))?;
        let len: i64 = text
            .parse()
            .map_err(|_| WireError::protocol(format!("invalid array length: {text}")))?;

        if len == -1 {
            *pos = after_len;
            return Ok(Some(Frame::Array(None)));
        }
        if len < -1 {
            return Err(WireError::protocol(format!("negative array length {len}")));
        }
        if len as usize > self.max_array_len {
            return Err(WireError::ArrayTooLarge {
                len,
                max: self.max_array_len,
            });
        }

        let mut items = Vec::with_capacity(len as usize);
        let mut cursor = after_len;
        for _ in 0..len {
            match self.parse_frame(buf, &mut cursor)? {
                Some(frame) => items.push(frame),
                None => return Ok(None),
            }
        }
        *pos = cursor;
        Ok(Some(Frame::Array(Some(items))))
    }
}

/// Finds the `\r\n`-terminated line starting at `start`, returning the line
/// contents (excluding the terminator) and the index just past it.
fn read_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let mut i = start;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some((&buf[start..i], i + 2));
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn decode_all(input: &[u8]) -> Vec<Frame> {
        let decoder = Decoder::default();
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test_case(b"+OK\r\n", Frame::simple("OK"))]
    #[test_case(b"-ERR bad\r\n", Frame::error("ERR bad"))]
    #[test_case(b":42\r\n", Frame::integer(42))]
    #[test_case(b":-7\r\n", Frame::integer(-7))]
    #[test_case(b"$3\r\nfoo\r\n", Frame::bulk(&b"foo"[..]))]
    #[test_case(b"$0\r\n\r\n", Frame::bulk(&b""[..]))]
    #[test_case(b"$-1\r\n", Frame::null_bulk())]
    #[test_case(b"*-1\r\n", Frame::null_array())]
    fn decodes_single_frame(input: &[u8], expected: Frame) {
        let mut frames = decode_all(input);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames.remove(0), expected);
    }

    #[test]
    fn decodes_command_array() {
        let input = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n";
        let frames = decode_all(input);
        assert_eq!(frames.len(), 1);
        let cmd = frames[0].as_command().unwrap();
        assert_eq!(cmd, vec![Bytes::from("SET"), Bytes::from("k"), Bytes::from("v")]);
    }

    #[test]
    fn incomplete_frame_does_not_consume() {
        let decoder = Decoder::default();
        let mut buf = BytesMut::from(&b"$5\r\nhel"[..]);
        let result = decoder.decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(&buf[..], b"$5\r\nhel");

        buf.extend_from_slice(b"lo\r\n");
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::bulk(&b"hello"[..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_bulk_string_over_limit() {
        let decoder = Decoder::new(4, 16);
        let mut buf = BytesMut::from(&b"$5\r\nhello\r\n"[..]);
        let err = decoder.decode(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::BulkTooLarge { len: 5, max: 4 }));
    }

    #[test]
    fn rejects_malformed_type_byte() {
        let decoder = Decoder::default();
        let mut buf = BytesMut::from(&b"!nope\r\n"[..]);
        let err = decoder.decode(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::Protocol(_)));
    }

    #[test]
    fn encode_decode_roundtrip_nested_array() {
        let frame = Frame::array(vec![
            Frame::bulk(&b"message"[..]),
            Frame::bulk(&b"news"[..]),
            Frame::BulkString(None),
            Frame::integer(7),
        ]);
        let mut encoded = BytesMut::from(&frame.encode()[..]);
        let decoder = Decoder::default();
        let decoded = decoder.decode(&mut encoded).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(encoded.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn bulk_string_roundtrip(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let frame = Frame::bulk(Bytes::from(bytes));
            let mut encoded = BytesMut::from(&frame.encode()[..]);
            let decoder = Decoder::default();
            let decoded = decoder.decode(&mut encoded).unwrap().unwrap();
            proptest::prop_assert_eq!(decoded, frame);
        }
    }
}
