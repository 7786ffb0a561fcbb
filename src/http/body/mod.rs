//! Entity adapters: one decoder and one encoder per framing mode.
//!
//! Decoders consume from a Way's receive buffer and append decoded bytes to
//! a sink. They never need the whole body at once: when the buffer runs dry
//! they report [`Decoded::Partial`] and pick up where they stopped on the
//! next call. Encoders append wire bytes to a Way's send buffer.

mod chunked;
mod close;
mod fixed;

pub use chunked::{ChunkedDecoder, ChunkedEncoder};
pub use close::{CloseDecoder, CloseEncoder};
pub use fixed::{FixedDecoder, FixedEncoder};

use bytes::BytesMut;

use crate::error::ProtocolError;
use crate::http::framing::FramingMode;

/// Progress of a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// More input is needed.
    Partial,
    /// The entity is complete.
    Done,
}

/// An inbound entity reader.
#[derive(Debug)]
pub enum Decoder {
    Fixed(FixedDecoder),
    Chunked(ChunkedDecoder),
    Close(CloseDecoder),
}

impl Decoder {
    /// Selects the decoder for `mode`, or `None` when there is no entity.
    pub fn for_mode(mode: FramingMode, max_line_bytes: usize) -> Option<Self> {
        match mode {
            FramingMode::None => None,
            FramingMode::FixedLength(length) => Some(Decoder::Fixed(FixedDecoder::new(length))),
            FramingMode::Chunked => Some(Decoder::Chunked(ChunkedDecoder::new(max_line_bytes))),
            FramingMode::CloseDelimited => Some(Decoder::Close(CloseDecoder::new())),
        }
    }

    /// Limits the trailer fields of a chunked entity; other modes have none.
    pub fn with_header_limit(self, max_headers: usize, seen: usize) -> Self {
        match self {
            Decoder::Chunked(decoder) => Decoder::Chunked(decoder.with_header_limit(max_headers, seen)),
            other => other,
        }
    }

    /// Moves as much of the entity as is buffered from `src` to `dst`.
    pub fn decode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<Decoded, ProtocolError> {
        match self {
            Decoder::Fixed(decoder) => Ok(decoder.decode(src, dst)),
            Decoder::Chunked(decoder) => decoder.decode(src, dst),
            Decoder::Close(decoder) => Ok(decoder.decode(src, dst)),
        }
    }

    /// Called when the peer has half-closed the connection.
    ///
    /// Only a close-delimited entity may legitimately end here.
    pub fn decode_eof(&mut self) -> Result<Decoded, ProtocolError> {
        match self {
            Decoder::Fixed(decoder) => decoder.decode_eof(),
            Decoder::Chunked(decoder) => decoder.decode_eof(),
            Decoder::Close(decoder) => Ok(decoder.decode_eof()),
        }
    }

    /// Trailer fields collected by a chunked decoder.
    pub fn take_trailers(&mut self) -> Vec<(String, String)> {
        match self {
            Decoder::Chunked(decoder) => decoder.take_trailers(),
            _ => Vec::new(),
        }
    }
}

/// An outbound entity writer.
#[derive(Debug)]
pub enum Encoder {
    Fixed(FixedEncoder),
    Chunked(ChunkedEncoder),
    Close(CloseEncoder),
}

impl Encoder {
    pub fn for_mode(mode: FramingMode) -> Option<Self> {
        match mode {
            FramingMode::None => None,
            FramingMode::FixedLength(_) => Some(Encoder::Fixed(FixedEncoder::new())),
            FramingMode::Chunked => Some(Encoder::Chunked(ChunkedEncoder::new())),
            FramingMode::CloseDelimited => Some(Encoder::Close(CloseEncoder::new())),
        }
    }

    /// Frames `data` into `dst`.
    ///
    /// Fails with [`std::io::ErrorKind::BrokenPipe`] once the encoder was
    /// finished.
    pub fn encode(&mut self, data: &[u8], dst: &mut BytesMut) -> std::io::Result<()> {
        match self {
            Encoder::Fixed(encoder) => encoder.encode(data, dst),
            Encoder::Chunked(encoder) => encoder.encode(data, dst),
            Encoder::Close(encoder) => encoder.encode(data, dst),
        }
    }

    /// Writes whatever marks the end of the entity.
    pub fn finish(&mut self, dst: &mut BytesMut) {
        match self {
            Encoder::Fixed(encoder) => encoder.finish(),
            Encoder::Chunked(encoder) => encoder.finish(dst),
            Encoder::Close(encoder) => encoder.finish(),
        }
    }

    /// Body bytes accepted so far, excluding framing.
    pub fn written(&self) -> u64 {
        match self {
            Encoder::Fixed(encoder) => encoder.written(),
            Encoder::Chunked(encoder) => encoder.written(),
            Encoder::Close(encoder) => encoder.written(),
        }
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "entity already finished")
}
