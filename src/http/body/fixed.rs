use bytes::BytesMut;

use super::{Decoded, closed_error};
use crate::error::ProtocolError;

/// Reads exactly `length` bytes.
#[derive(Debug)]
pub struct FixedDecoder {
    remaining: u64,
}

impl FixedDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn decode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Decoded {
        let take = std::cmp::min(self.remaining, src.len() as u64) as usize;
        if take > 0 {
            dst.extend_from_slice(&src.split_to(take));
            self.remaining -= take as u64;
        }
        if self.remaining == 0 {
            Decoded::Done
        } else {
            Decoded::Partial
        }
    }

    /// The stream ended; anything still owed is a truncated body.
    pub fn decode_eof(&mut self) -> Result<Decoded, ProtocolError> {
        if self.remaining == 0 {
            Ok(Decoded::Done)
        } else {
            Err(ProtocolError::UnexpectedEof)
        }
    }
}

/// Passes bytes through and counts them.
///
/// Whether the count matches the declared length is checked by the caller.
#[derive(Debug, Default)]
pub struct FixedEncoder {
    written: u64,
    finished: bool,
}

impl FixedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, data: &[u8], dst: &mut BytesMut) -> std::io::Result<()> {
        if self.finished {
            return Err(closed_error());
        }
        dst.extend_from_slice(data);
        self.written += data.len() as u64;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_length() {
        let mut decoder = FixedDecoder::new(3);
        let mut src = BytesMut::from(&b"abcdef"[..]);
        let mut dst = BytesMut::new();
        assert_eq!(decoder.decode(&mut src, &mut dst), Decoded::Done);
        assert_eq!(&dst[..], b"abc");
        assert_eq!(&src[..], b"def");
    }

    #[test]
    fn short_body_is_an_error_at_eof() {
        let mut decoder = FixedDecoder::new(5);
        let mut src = BytesMut::from(&b"ab"[..]);
        let mut dst = BytesMut::new();
        assert_eq!(decoder.decode(&mut src, &mut dst), Decoded::Partial);
        assert_eq!(decoder.decode_eof(), Err(ProtocolError::UnexpectedEof));
    }

    #[test]
    fn encoder_refuses_writes_after_finish() {
        let mut encoder = FixedEncoder::new();
        let mut dst = BytesMut::new();
        encoder.encode(b"hi", &mut dst).unwrap();
        encoder.finish();
        assert!(encoder.encode(b"!", &mut dst).is_err());
        assert_eq!(encoder.written(), 2);
    }
}
