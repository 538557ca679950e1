//! Canonical wire encoding for the ACL protocol
//!
//! Every record is encoded big-endian on 4-byte words, so the bytes are the
//! same whatever the host byte order or word size:
//!
//! - **Fixed-size structures** (ids, operations, tokens) are written as their
//!   exact byte layout with no length prefix.
//! - **Optional fields** are a presence word (`0` absent, `1` present)
//!   followed by the payload only when present.
//! - **Sequences** are a word count followed by that many fixed-size elements.
//! - **Strings** are a word length, the bytes, then zero padding up to the
//!   next word boundary.
//!
//! Decoding never reads past the buffer: a short buffer is
//! [`WireError::Truncated`] and a count that cannot fit in what is left is
//! [`WireError::MalformedLength`], checked before anything is allocated.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of a word in bytes
pub const WORD_SIZE: usize = 4;
/// Size of a hyper (64-bit) value in bytes
pub const HYPER_SIZE: usize = 8;

const ABSENT: u32 = 0;
const PRESENT: u32 = 1;

/// Reasons a byte buffer is not a well-formed record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("truncated record: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("malformed length: {count} elements overrun {remaining} remaining bytes")]
    MalformedLength { count: u32, remaining: usize },
    #[error("invalid presence tag {0}")]
    InvalidPresenceTag(u32),
    #[error("unknown procedure {0}")]
    UnknownProcedure(u32),
    #[error("unknown reply status {0}")]
    UnknownStatus(u32),
    #[error("unknown reply body {0}")]
    UnknownBody(u32),
    #[error("string field is not valid utf-8")]
    InvalidString,
    #[error("non-zero padding")]
    NonZeroPadding,
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

/// Values with a fixed encoded length
///
/// Sequence decoding uses this to reject an element count that cannot fit in
/// the remaining buffer.
pub trait FixedWireSize {
    const WIRE_SIZE: usize;
}

pub trait WireEncode {
    fn encode<B: BufMut>(&self, buf: &mut B);

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

pub trait WireDecode: Sized {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError>;

    /// Decode a complete record, rejecting any trailing bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let mut buf = bytes;
        let value = Self::decode(&mut buf)?;
        if buf.has_remaining() {
            return Err(WireError::TrailingBytes(buf.remaining()));
        }
        Ok(value)
    }
}

fn ensure<B: Buf>(buf: &B, needed: usize) -> Result<(), WireError> {
    if buf.remaining() < needed {
        return Err(WireError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_word<B: Buf>(buf: &mut B) -> Result<u32, WireError> {
    ensure(buf, WORD_SIZE)?;
    Ok(buf.get_u32())
}

pub fn get_hyper<B: Buf>(buf: &mut B) -> Result<u64, WireError> {
    ensure(buf, HYPER_SIZE)?;
    Ok(buf.get_u64())
}

pub fn get_fixed<const N: usize, B: Buf>(buf: &mut B) -> Result<[u8; N], WireError> {
    ensure(buf, N)?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn padding(len: usize) -> usize {
    (WORD_SIZE - len % WORD_SIZE) % WORD_SIZE
}

/// Element count as written on the wire
///
/// Counts are one word, so at most `u32::MAX` elements are ever encoded.
/// Anything beyond that is dropped rather than written under a wrapped count.
fn wire_count(len: usize) -> u32 {
    debug_assert!(u32::try_from(len).is_ok(), "{} elements exceed a wire count", len);
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Longest prefix of `value` that is at most `max` bytes and ends on a char boundary
fn clip_str(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub fn put_string<B: BufMut>(buf: &mut B, value: &str) {
    let value = clip_str(value, u32::MAX as usize);
    buf.put_u32(wire_count(value.len()));
    buf.put_slice(value.as_bytes());
    buf.put_bytes(0, padding(value.len()));
}

pub fn get_string<B: Buf>(buf: &mut B) -> Result<String, WireError> {
    let len = get_word(buf)?;
    let padded = (len as usize).checked_add(padding(len as usize));
    match padded {
        Some(total) if total <= buf.remaining() => {}
        _ => {
            return Err(WireError::MalformedLength {
                count: len,
                remaining: buf.remaining(),
            })
        }
    }
    let mut raw = vec![0u8; len as usize];
    buf.copy_to_slice(&mut raw);
    for _ in 0..padding(len as usize) {
        if buf.get_u8() != 0 {
            return Err(WireError::NonZeroPadding);
        }
    }
    String::from_utf8(raw).map_err(|_| WireError::InvalidString)
}

impl<T: WireEncode> WireEncode for Option<T> {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            Some(value) => {
                buf.put_u32(PRESENT);
                value.encode(buf);
            }
            None => buf.put_u32(ABSENT),
        }
    }
}

impl<T: WireDecode> WireDecode for Option<T> {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        match get_word(buf)? {
            ABSENT => Ok(None),
            PRESENT => Ok(Some(T::decode(buf)?)),
            tag => Err(WireError::InvalidPresenceTag(tag)),
        }
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        let count = wire_count(self.len());
        buf.put_u32(count);
        for item in self.iter().take(count as usize) {
            item.encode(buf);
        }
    }
}

impl<T: WireDecode + FixedWireSize> WireDecode for Vec<T> {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        let count = get_word(buf)?;
        let fits = (count as usize)
            .checked_mul(T::WIRE_SIZE)
            .is_some_and(|len| len <= buf.remaining());
        if !fits {
            return Err(WireError::MalformedLength {
                count,
                remaining: buf.remaining(),
            });
        }
        (0..count).map(|_| T::decode(buf)).collect()
    }
}
