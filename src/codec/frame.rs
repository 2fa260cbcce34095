//! Length-prefixed framing shared by every request and response on the wire.
//!
//! Every frame is a 4-byte signed big-endian length `N` followed by `N`
//! bytes. This module only concerns itself with carving frames out of (or
//! into) a byte stream; decoding the frame body into a typed request or
//! response happens in [`crate::codec::request`] and [`crate::codec::response`].

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Frames larger than this are rejected outright; a legitimate produce
/// batch is bounded well below this, and without a ceiling a corrupt or
/// malicious length prefix could trigger an unbounded allocation.
pub const MAX_FRAME_LEN: usize = 512 * 1024 * 1024;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    #[error("frame length {0} exceeds the maximum of {MAX_FRAME_LEN}")]
    TooLarge(i64),

    #[error("negative frame length: {0}")]
    Negative(i32),
}

/// Attempts to split one complete length-prefixed frame off the front of
/// `buf`. Returns `Ok(None)` if `buf` does not yet contain a full frame;
/// any bytes belonging to a following, still-partial frame are left
/// untouched in `buf` either way.
pub fn try_parse_frame(buf: &mut BytesMut) -> Result<Option<BytesMut>, FrameError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let len = i32::from_be_bytes(buf[..4].try_into().unwrap());
    if len < 0 {
        return Err(FrameError::Negative(len));
    }
    let len = len as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len as i64));
    }

    if buf.len() < 4 + len {
        return Ok(None);
    }

    buf.advance(4);
    Ok(Some(buf.split_to(len)))
}

/// Prepends a 4-byte big-endian length prefix for `body` onto `out`.
pub fn put_frame(out: &mut BytesMut, body: &[u8]) {
    out.put_i32(body.len() as i32);
    out.put_slice(body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_complete_frame() {
        let mut buf = BytesMut::new();
        put_frame(&mut buf, b"hello");

        let frame = try_parse_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn retains_partial_frame() {
        let mut full = BytesMut::new();
        put_frame(&mut full, b"hello world");

        // Feed everything but the last two bytes.
        let mut buf = BytesMut::from(&full[..full.len() - 2]);
        assert!(try_parse_frame(&mut buf).unwrap().is_none());
        // Nothing was consumed.
        assert_eq!(buf.len(), full.len() - 2);
    }

    #[test]
    fn parses_back_to_back_frames() {
        let mut buf = BytesMut::new();
        put_frame(&mut buf, b"one");
        put_frame(&mut buf, b"two");

        let first = try_parse_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&first[..], b"one");
        let second = try_parse_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&second[..], b"two");
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_negative_length() {
        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        assert!(try_parse_frame(&mut buf).is_err());
    }
}
