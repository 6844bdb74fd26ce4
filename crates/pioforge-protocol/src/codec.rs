//! Player.IO binary wire codec.
//!
//! Every value on the socket is a one-byte tag followed by a payload. The
//! tag carries both the type and, for short values, the value or length
//! itself in its low bits. The layout is frozen by the legacy client:
//!
//! ```text
//! 0xC0|len        string, len <= 63        0x0C|(n-1)  string, n-byte BE length
//! 0x40|len        bytes, len <= 63         0x10|(n-1)  bytes, n-byte BE length
//! 0x80|v          small unsigned int       0x08|(n-1)  u32, n BE bytes
//! 0x04|(n-1)      i32, n BE bytes          0x30|(n-1)  i64, 1..=4 BE bytes
//! 0x34|(n-5)      i64, 5..=8 BE bytes      0x38|(n-1)  u64, 1..=4 BE bytes
//! 0x3C|(n-5)      u64, 5..=8 BE bytes      0x03 f64    0x02 f32
//! 0x01 true       0x00 false               0xFF        never valid
//! ```
//!
//! A message is its element count minus one, encoded as an integer,
//! followed by the elements. Several messages may share one buffer.
//!
//! Two entry points are provided:
//! - [`encode`] / [`decode`] work on complete buffers and treat a short
//!   buffer as an error.
//! - [`WireCodec`] implements the `tokio_util` codec traits for streams,
//!   where a short buffer just means "wait for more bytes".

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{ProtocolError, Value};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

const STRING_SHORT: u8 = 0xC0;
const STRING: u8 = 0x0C;
const BYTES_SHORT: u8 = 0x40;
const BYTES: u8 = 0x10;
const ULONG_SHORT: u8 = 0x38;
const ULONG: u8 = 0x3C;
const LONG_SHORT: u8 = 0x30;
const LONG: u8 = 0x34;
const UINT_SHORT: u8 = 0x80;
const UINT: u8 = 0x08;
const INT: u8 = 0x04;
const DOUBLE: u8 = 0x03;
const FLOAT: u8 = 0x02;
const TRUE: u8 = 0x01;
const FALSE: u8 = 0x00;
const DOES_NOT_EXIST: u8 = 0xFF;

/// Largest value or length that fits in the low bits of a short tag.
const SHORT_MAX: usize = 63;

/// The pattern a tag byte belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    DoesNotExist,
    StringShort,
    UIntShort,
    BytesShort,
    ULong,
    ULongShort,
    Long,
    LongShort,
    Bytes,
    String,
    UInt,
    Int,
    Double,
    Float,
    True,
    False,
}

/// Patterns in descending numeric order. A byte belongs to the first
/// pattern whose bits it fully contains.
const PATTERNS: [(u8, Pattern); 16] = [
    (DOES_NOT_EXIST, Pattern::DoesNotExist),
    (STRING_SHORT, Pattern::StringShort),
    (UINT_SHORT, Pattern::UIntShort),
    (BYTES_SHORT, Pattern::BytesShort),
    (ULONG, Pattern::ULong),
    (ULONG_SHORT, Pattern::ULongShort),
    (LONG, Pattern::Long),
    (LONG_SHORT, Pattern::LongShort),
    (BYTES, Pattern::Bytes),
    (STRING, Pattern::String),
    (UINT, Pattern::UInt),
    (INT, Pattern::Int),
    (DOUBLE, Pattern::Double),
    (FLOAT, Pattern::Float),
    (TRUE, Pattern::True),
    (FALSE, Pattern::False),
];

fn classify(byte: u8) -> Pattern {
    PATTERNS
        .iter()
        .find(|(bits, _)| byte & bits == *bits)
        .map(|(_, p)| *p)
        .unwrap_or(Pattern::DoesNotExist)
}

// =========================================================================
// Encoding
// =========================================================================

/// Encodes one message.
///
/// # Errors
/// Returns [`ProtocolError::UnsupportedValue`] for an empty message, or
/// for a string/byte payload longer than `u32::MAX`.
pub fn encode(values: &[Value]) -> Result<Vec<u8>, ProtocolError> {
    if values.is_empty() {
        return Err(ProtocolError::UnsupportedValue(
            "a message needs at least one element".into(),
        ));
    }
    let mut out = Vec::with_capacity(16 * values.len());
    let count = i32::try_from(values.len() - 1).map_err(|_| {
        ProtocolError::UnsupportedValue("too many elements".into())
    })?;
    write_value(&mut out, &Value::Int(count))?;
    for value in values {
        write_value(&mut out, value)?;
    }
    Ok(out)
}

/// Encodes `[type, args...]`, the shape of every typed server message.
pub fn encode_message(
    msg_type: &str,
    args: impl IntoIterator<Item = Value>,
) -> Result<Vec<u8>, ProtocolError> {
    let mut values = vec![Value::from(msg_type)];
    values.extend(args);
    encode(&values)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), ProtocolError> {
    match value {
        Value::String(s) => {
            // A 63-byte short string would be tagged 0xFF, which the
            // client reserves, so it takes the long form instead.
            write_length_prefixed(out, s.as_bytes(), STRING_SHORT, STRING, SHORT_MAX - 1)?;
        }
        Value::Bytes(b) => {
            write_length_prefixed(out, b, BYTES_SHORT, BYTES, SHORT_MAX)?;
        }
        Value::Bool(true) => out.push(TRUE),
        Value::Bool(false) => out.push(FALSE),
        Value::Int(v) => {
            if (0..=SHORT_MAX as i32).contains(v) {
                out.push(UINT_SHORT | *v as u8);
            } else {
                let be = v.to_be_bytes();
                let body = strip_leading_zeros(&be);
                out.push(INT | (body.len() as u8 - 1));
                out.extend_from_slice(body);
            }
        }
        Value::UInt(v) => {
            let be = v.to_be_bytes();
            let body = strip_leading_zeros(&be);
            out.push(UINT | (body.len() as u8 - 1));
            out.extend_from_slice(body);
        }
        Value::Long(v) | Value::Timestamp(v) => {
            write_wide(out, &v.to_be_bytes(), LONG_SHORT, LONG);
        }
        Value::ULong(v) => {
            write_wide(out, &v.to_be_bytes(), ULONG_SHORT, ULONG);
        }
        Value::Double(v) => {
            out.push(DOUBLE);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float(v) => {
            out.push(FLOAT);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::List(_) | Value::Map(_) => {
            let json = value.to_json().to_string();
            write_value(out, &Value::String(json))?;
        }
    }
    Ok(())
}

fn write_length_prefixed(
    out: &mut Vec<u8>,
    payload: &[u8],
    short: u8,
    full: u8,
    short_max: usize,
) -> Result<(), ProtocolError> {
    if payload.len() <= short_max {
        out.push(short | payload.len() as u8);
    } else {
        let len = u32::try_from(payload.len()).map_err(|_| {
            ProtocolError::UnsupportedValue(format!(
                "payload of {} bytes is too long",
                payload.len()
            ))
        })?;
        let be = len.to_be_bytes();
        let header = strip_leading_zeros(&be);
        out.push(full | (header.len() as u8 - 1));
        out.extend_from_slice(header);
    }
    out.extend_from_slice(payload);
    Ok(())
}

/// Writes a 64-bit integer using the 1..=4 byte or 5..=8 byte tag.
fn write_wide(out: &mut Vec<u8>, be: &[u8; 8], short: u8, full: u8) {
    let body = strip_leading_zeros(be);
    let n = body.len() as u8;
    if n > 4 {
        out.push(full | (n - 5));
    } else {
        out.push(short | (n - 1));
    }
    out.extend_from_slice(body);
}

/// Drops leading zero bytes, keeping at least one byte.
fn strip_leading_zeros(be: &[u8]) -> &[u8] {
    let first = be
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(be.len().saturating_sub(1));
    &be[first..]
}

// =========================================================================
// Decoding
// =========================================================================

/// Result of trying to read something from a possibly-partial buffer.
enum Step<T> {
    Done(T, usize),
    Incomplete,
}

/// Decodes every message in a complete buffer.
///
/// # Errors
/// Returns [`ProtocolError::MalformedWireValue`] on an unknown tag, a
/// non-integer element count, invalid UTF-8, or a buffer that ends in the
/// middle of a message.
pub fn decode(bytes: &[u8]) -> Result<Vec<Vec<Value>>, ProtocolError> {
    let mut messages = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match read_message(bytes, pos, usize::MAX)? {
            Step::Done(msg, next) => {
                messages.push(msg);
                pos = next;
            }
            Step::Incomplete => {
                return Err(ProtocolError::malformed(pos, "truncated message"));
            }
        }
    }
    Ok(messages)
}

fn read_message(
    buf: &[u8],
    start: usize,
    limit: usize,
) -> Result<Step<Vec<Value>>, ProtocolError> {
    let (count, mut pos) = match read_value(buf, start, limit)? {
        Step::Done(v, next) => (v, next),
        Step::Incomplete => return Ok(Step::Incomplete),
    };
    let count = count
        .as_i64()
        .filter(|c| *c >= 0)
        .ok_or_else(|| {
            ProtocolError::malformed(start, "message count is not a non-negative integer")
        })?;

    let total = count as usize + 1;
    let mut values = Vec::with_capacity(total.min(64));
    for _ in 0..total {
        match read_value(buf, pos, limit)? {
            Step::Done(v, next) => {
                values.push(v);
                pos = next;
            }
            Step::Incomplete => return Ok(Step::Incomplete),
        }
    }
    Ok(Step::Done(values, pos))
}

/// `limit` bounds the declared length of a long string or byte payload.
fn read_value(buf: &[u8], pos: usize, limit: usize) -> Result<Step<Value>, ProtocolError> {
    let Some(&tag) = buf.get(pos) else {
        return Ok(Step::Incomplete);
    };
    let body = pos + 1;
    let low = |bits: u8| (tag & !bits) as usize;

    let step = match classify(tag) {
        Pattern::DoesNotExist => {
            return Err(ProtocolError::malformed(pos, format!("unknown tag 0x{tag:02x}")));
        }
        Pattern::True => Step::Done(Value::Bool(true), body),
        Pattern::False => Step::Done(Value::Bool(false), body),
        Pattern::UIntShort => Step::Done(Value::Int(low(UINT_SHORT) as i32), body),
        Pattern::StringShort => match take(buf, body, low(STRING_SHORT)) {
            Some((bytes, next)) => Step::Done(Value::String(utf8(bytes, pos)?), next),
            None => Step::Incomplete,
        },
        Pattern::BytesShort => match take(buf, body, low(BYTES_SHORT)) {
            Some((bytes, next)) => Step::Done(Value::Bytes(bytes.to_vec()), next),
            None => Step::Incomplete,
        },
        Pattern::String | Pattern::Bytes => {
            let header_len = (tag & 0x03) as usize + 1;
            let Some((header, data_start)) = take(buf, body, header_len) else {
                return Ok(Step::Incomplete);
            };
            let len = usize::try_from(be_u64(header))
                .ok()
                .filter(|len| *len <= limit)
                .ok_or_else(|| {
                    ProtocolError::malformed(
                        pos,
                        format!("declared length {} exceeds {limit}", be_u64(header)),
                    )
                })?;
            match take(buf, data_start, len) {
                Some((bytes, next)) if classify(tag) == Pattern::String => {
                    Step::Done(Value::String(utf8(bytes, pos)?), next)
                }
                Some((bytes, next)) => Step::Done(Value::Bytes(bytes.to_vec()), next),
                None => Step::Incomplete,
            }
        }
        Pattern::UInt => number(buf, body, (tag & 0x03) as usize + 1, |n| {
            Value::UInt(n as u32)
        }),
        Pattern::Int => number(buf, body, (tag & 0x03) as usize + 1, |n| {
            Value::Int(n as u32 as i32)
        }),
        Pattern::LongShort => number(buf, body, (tag & 0x03) as usize + 1, |n| {
            Value::Long(n as i64)
        }),
        Pattern::Long => number(buf, body, (tag & 0x03) as usize + 5, |n| {
            Value::Long(n as i64)
        }),
        Pattern::ULongShort => number(buf, body, (tag & 0x03) as usize + 1, Value::ULong),
        Pattern::ULong => number(buf, body, (tag & 0x03) as usize + 5, Value::ULong),
        Pattern::Double => match take(buf, body, 8) {
            Some((b, next)) => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                Step::Done(Value::Double(f64::from_be_bytes(raw)), next)
            }
            None => Step::Incomplete,
        },
        Pattern::Float => match take(buf, body, 4) {
            Some((b, next)) => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(b);
                Step::Done(Value::Float(f32::from_be_bytes(raw)), next)
            }
            None => Step::Incomplete,
        },
    };
    Ok(step)
}

fn take(buf: &[u8], start: usize, len: usize) -> Option<(&[u8], usize)> {
    let end = start.checked_add(len)?;
    buf.get(start..end).map(|slice| (slice, end))
}

fn number(
    buf: &[u8],
    start: usize,
    len: usize,
    make: impl FnOnce(u64) -> Value,
) -> Step<Value> {
    match take(buf, start, len) {
        Some((bytes, next)) => Step::Done(make(be_u64(bytes)), next),
        None => Step::Incomplete,
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn utf8(bytes: &[u8], offset: usize) -> Result<String, ProtocolError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ProtocolError::malformed(offset, format!("invalid utf-8: {e}")))
}

// ---------------------------------------------------------------------------
// WireCodec
// ---------------------------------------------------------------------------

/// Streaming form of the codec for use on a socket read loop.
///
/// `decode` yields one message at a time and leaves any partial tail in
/// the buffer. After an error the buffer contents are unusable; callers
/// should clear it.
///
/// A message may not be larger than `max_message_size`. A payload that
/// declares more, or a partial message that has already buffered more,
/// is rejected instead of waiting for the rest.
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    max_message_size: usize,
}

impl WireCodec {
    /// Limit used by [`WireCodec::default`]: 1 MiB.
    pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::with_max_size(Self::DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Decoder for WireCodec {
    type Item = Vec<Value>;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        match read_message(&src[..], 0, self.max_message_size)? {
            Step::Done(msg, used) => {
                src.advance(used);
                Ok(Some(msg))
            }
            Step::Incomplete if src.len() > self.max_message_size => {
                Err(ProtocolError::malformed(
                    0,
                    format!(
                        "partial message of {} bytes exceeds {}",
                        src.len(),
                        self.max_message_size
                    ),
                ))
            }
            Step::Incomplete => Ok(None),
        }
    }
}

impl Encoder<Vec<Value>> for WireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Vec<Value>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&encode(&item)?);
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(values: Vec<Value>) {
        let bytes = encode(&values).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded, vec![values]);
    }

    // =====================================================================
    // classify()
    // =====================================================================

    #[test]
    fn test_classify_short_and_long_forms() {
        assert_eq!(classify(0xC5), Pattern::StringShort);
        assert_eq!(classify(0xBF), Pattern::UIntShort);
        assert_eq!(classify(0x7F), Pattern::BytesShort);
        assert_eq!(classify(0x3D), Pattern::ULong);
        assert_eq!(classify(0x39), Pattern::ULongShort);
        assert_eq!(classify(0x35), Pattern::Long);
        assert_eq!(classify(0x31), Pattern::LongShort);
        assert_eq!(classify(0x11), Pattern::Bytes);
        assert_eq!(classify(0x0D), Pattern::String);
        assert_eq!(classify(0x09), Pattern::UInt);
        assert_eq!(classify(0x07), Pattern::Int);
        assert_eq!(classify(0x03), Pattern::Double);
        assert_eq!(classify(0x02), Pattern::Float);
        assert_eq!(classify(0x01), Pattern::True);
        assert_eq!(classify(0x00), Pattern::False);
        assert_eq!(classify(0xFF), Pattern::DoesNotExist);
    }

    // =====================================================================
    // encode()
    // =====================================================================

    #[test]
    fn test_encode_join_message_exact_bytes() {
        let bytes = encode(&[Value::from("join"), Value::from("k1")]).unwrap();
        assert_eq!(
            bytes,
            vec![0x81, 0xC4, b'j', b'o', b'i', b'n', 0xC2, b'k', b'1']
        );
    }

    #[test]
    fn test_encode_int_uses_short_form_only_for_0_to_63() {
        let bytes = encode(&[Value::Int(63), Value::Int(64), Value::Int(-1)]).unwrap();
        assert_eq!(
            bytes,
            vec![0x82, 0xBF, 0x04, 0x40, 0x07, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_encode_long_picks_tag_by_significant_bytes() {
        let small = encode(&[Value::Long(300)]).unwrap();
        assert_eq!(small, vec![0x80, 0x31, 0x01, 0x2C]);

        let big = encode(&[Value::Long(1 << 40)]).unwrap();
        // 6 significant bytes → LONG | (6 - 5)
        assert_eq!(big, vec![0x80, 0x35, 0x01, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_double_is_big_endian() {
        let bytes = encode(&[Value::Double(1.5)]).unwrap();
        assert_eq!(bytes, vec![0x80, 0x03, 0x3F, 0xF8, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_long_string_uses_length_header() {
        let s = "x".repeat(300);
        let bytes = encode(&[Value::from(s.as_str())]).unwrap();
        // 300 = 0x012C → two header bytes → STRING | 1
        assert_eq!(&bytes[..4], &[0x80, 0x0D, 0x01, 0x2C]);
        assert_eq!(bytes.len(), 4 + 300);
    }

    #[test]
    fn test_encode_63_byte_string_avoids_reserved_tag() {
        let s = "y".repeat(63);
        let bytes = encode(&[Value::from(s.as_str())]).unwrap();
        assert_eq!(&bytes[..3], &[0x80, 0x0C, 63]);
        assert!(!bytes.contains(&0xFF));
    }

    #[test]
    fn test_encode_map_lowers_to_json_string() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("a".to_string(), Value::Int(1));
        let bytes = encode(&[Value::Map(map)]).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded[0][0], Value::from("{\"a\":1}"));
    }

    #[test]
    fn test_encode_timestamp_lowers_to_long() {
        let bytes = encode(&[Value::Timestamp(1_700_000_000_000)]).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded[0][0], Value::Long(1_700_000_000_000));
    }

    #[test]
    fn test_encode_empty_message_is_rejected() {
        assert!(matches!(
            encode(&[]),
            Err(ProtocolError::UnsupportedValue(_))
        ));
    }

    // =====================================================================
    // decode()
    // =====================================================================

    #[test]
    fn test_roundtrip_representative_leaves() {
        roundtrip(vec![
            Value::from(""),
            Value::from("héllo wörld"),
            Value::Int(0),
            Value::Int(i32::MIN),
            Value::Int(i32::MAX),
            Value::UInt(5),
            Value::UInt(u32::MAX),
            Value::Long(-2),
            Value::Long(i64::MAX),
            Value::ULong(u64::MAX),
            Value::Bool(true),
            Value::Bool(false),
            Value::Float(-0.25),
            Value::Double(123456.789),
            Value::Bytes(vec![]),
            Value::Bytes((0..=255).collect()),
        ]);
    }

    #[test]
    fn test_decode_multiple_messages_in_one_buffer() {
        let mut bytes = encode(&[Value::from("ic")]).unwrap();
        bytes.extend(encode(&[Value::from("qp"), Value::from("x")]).unwrap());
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0], vec![Value::from("ic")]);
        assert_eq!(decoded[1], vec![Value::from("qp"), Value::from("x")]);
    }

    #[test]
    fn test_decode_unknown_tag_is_malformed() {
        let err = decode(&[0x80, 0xFF]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedWireValue { offset: 1, .. }
        ));
    }

    #[test]
    fn test_decode_truncated_string_is_malformed() {
        let mut bytes = encode(&[Value::from("truncate me")]).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            decode(&bytes),
            Err(ProtocolError::MalformedWireValue { .. })
        ));
    }

    #[test]
    fn test_decode_non_integer_count_is_malformed() {
        // count encoded as a boolean
        assert!(matches!(
            decode(&[0x01, 0xC0]),
            Err(ProtocolError::MalformedWireValue { offset: 0, .. })
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_is_malformed() {
        assert!(matches!(
            decode(&[0x80, 0xC2, 0xC3, 0x28]),
            Err(ProtocolError::MalformedWireValue { .. })
        ));
    }

    // =====================================================================
    // WireCodec
    // =====================================================================

    #[test]
    fn test_wire_codec_waits_for_partial_message() {
        let bytes = encode(&[Value::from("join"), Value::from("key")]).unwrap();
        let mut codec = WireCodec::default();
        let mut buf = BytesMut::from(&bytes[..5]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5, "partial input must stay buffered");

        buf.extend_from_slice(&bytes[5..]);
        let msg = codec.decode(&mut buf).unwrap().expect("complete now");
        assert_eq!(msg, vec![Value::from("join"), Value::from("key")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_wire_codec_rejects_oversized_declared_length() {
        // count 0, then a string declaring 0xFFFFFFFF bytes
        let mut codec = WireCodec::default();
        let mut buf = BytesMut::from(&[0x80, 0x0F, 0xFF, 0xFF, 0xFF, 0xFF][..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MalformedWireValue { offset: 1, .. })
        ));
    }

    #[test]
    fn test_wire_codec_rejects_partial_message_past_limit() {
        // 10000 elements announced, then a stream of one-byte ints that
        // never completes the message.
        let mut codec = WireCodec::with_max_size(256);
        let mut buf = BytesMut::from(&[0x05, 0x27, 0x0F][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        let mut fed = 0;
        let outcome = loop {
            buf.extend_from_slice(&[0x81; 64]);
            fed += 64;
            match codec.decode(&mut buf) {
                Ok(None) if fed < 4096 => continue,
                other => break other,
            }
        };
        assert!(matches!(
            outcome,
            Err(ProtocolError::MalformedWireValue { .. })
        ));
        assert!(fed <= 256 + 64, "rejected after {fed} bytes");
    }

    #[test]
    fn test_wire_codec_accepts_message_at_limit() {
        let bytes = encode(&[Value::from("x".repeat(100))]).unwrap();
        let mut codec = WireCodec::with_max_size(bytes.len());
        let mut buf = BytesMut::from(&bytes[..]);

        let msg = codec.decode(&mut buf).unwrap().expect("fits exactly");
        assert_eq!(msg, vec![Value::from("x".repeat(100))]);
    }

    #[test]
    fn test_wire_codec_encoder_matches_encode() {
        let mut codec = WireCodec::default();
        let mut dst = BytesMut::new();
        codec
            .encode(vec![Value::from("tu"), Value::Double(1.0)], &mut dst)
            .unwrap();
        assert_eq!(
            &dst[..],
            &encode(&[Value::from("tu"), Value::Double(1.0)]).unwrap()[..]
        );
    }
}
