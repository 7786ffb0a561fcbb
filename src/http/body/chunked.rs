use std::fmt::Write as _;

use bytes::{Buf, BytesMut};

use super::{Decoded, closed_error};
use crate::error::ProtocolError;
use crate::http::parser;

/// Checks whether a byte can legally appear in the chunk extensions section.
fn is_chunk_ext_char(b: u8) -> bool {
    b == b'\t' || !b.is_ascii_control()
}

/// The different states that the decoder can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading the hex size; `digits` counts the digits seen so far.
    Size { value: u64, digits: u8 },
    /// Skipping chunk extensions up to the CR.
    Ext(u64),
    /// Expecting the LF that ends a chunk header.
    HeaderLf(u64),
    /// Copying chunk data; the value is what is left of the chunk.
    Data(u64),
    DataCr,
    DataLf,
    /// Reading a trailer line (or the final blank line).
    Trailer,
    TrailerLf,
    Done,
}

/// Decodes the chunked transfer-coding, trailers included.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
    line: Vec<u8>,
    max_line_bytes: usize,
    trailers: Vec<(String, String)>,
    /// Trailer fields still allowed, and the limit reported when exceeded.
    trailer_budget: usize,
    max_headers: usize,
}

impl ChunkedDecoder {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            state: State::Size { value: 0, digits: 0 },
            line: Vec::new(),
            max_line_bytes,
            trailers: Vec::new(),
            trailer_budget: usize::MAX,
            max_headers: usize::MAX,
        }
    }

    /// Counts trailer fields against the message's header limit, `seen`
    /// fields of which the head already used.
    pub fn with_header_limit(mut self, max_headers: usize, seen: usize) -> Self {
        self.max_headers = max_headers;
        self.trailer_budget = max_headers.saturating_sub(seen);
        self
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn take_trailers(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.trailers)
    }

    pub fn decode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<Decoded, ProtocolError> {
        loop {
            match self.state {
                State::Done => return Ok(Decoded::Done),
                State::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(Decoded::Partial);
                    }
                    let take = std::cmp::min(remaining, src.len() as u64) as usize;
                    dst.extend_from_slice(&src.split_to(take));
                    let remaining = remaining - take as u64;
                    self.state = if remaining == 0 {
                        State::DataCr
                    } else {
                        State::Data(remaining)
                    };
                }
                _ => {
                    if !src.has_remaining() {
                        return Ok(Decoded::Partial);
                    }
                    let byte = src.get_u8();
                    self.step(byte)?;
                }
            }
        }
    }

    pub fn decode_eof(&mut self) -> Result<Decoded, ProtocolError> {
        if self.is_done() {
            Ok(Decoded::Done)
        } else {
            Err(ProtocolError::UnexpectedEof)
        }
    }

    fn step(&mut self, b: u8) -> Result<(), ProtocolError> {
        self.state = match self.state {
            State::Size { value, digits } => match b {
                b if b.is_ascii_hexdigit() => {
                    if value >= 0x1000_0000_0000_0000 {
                        return Err(ProtocolError::ChunkSizeOverflow);
                    }
                    let nybble = (b as char).to_digit(16).unwrap_or_default() as u64;
                    State::Size {
                        value: (value << 4) | nybble,
                        digits: digits.saturating_add(1),
                    }
                }
                b';' | b' ' | b'\t' if digits > 0 => State::Ext(value),
                b'\r' if digits > 0 => State::HeaderLf(value),
                _ => return Err(ProtocolError::InvalidChunkSize),
            },
            State::Ext(size) => match b {
                b'\r' => State::HeaderLf(size),
                b if is_chunk_ext_char(b) => State::Ext(size),
                _ => return Err(ProtocolError::InvalidChunkSize),
            },
            State::HeaderLf(size) => match b {
                b'\n' if size == 0 => State::Trailer,
                b'\n' => State::Data(size),
                _ => return Err(ProtocolError::MissingChunkTerminator),
            },
            State::DataCr => match b {
                b'\r' => State::DataLf,
                _ => return Err(ProtocolError::MissingChunkTerminator),
            },
            State::DataLf => match b {
                b'\n' => State::Size { value: 0, digits: 0 },
                _ => return Err(ProtocolError::MissingChunkTerminator),
            },
            State::Trailer => match b {
                b'\r' => State::TrailerLf,
                b'\n' => return Err(ProtocolError::BareLineFeed),
                b => {
                    if self.line.len() >= self.max_line_bytes {
                        return Err(ProtocolError::LineTooLong(self.max_line_bytes));
                    }
                    self.line.push(b);
                    State::Trailer
                }
            },
            State::TrailerLf => match b {
                b'\n' if self.line.is_empty() => State::Done,
                b'\n' => {
                    if self.trailers.len() >= self.trailer_budget {
                        return Err(ProtocolError::TooManyHeaders(self.max_headers));
                    }
                    let field = parser::parse_header_line(&self.line)?;
                    self.trailers.push(field);
                    self.line.clear();
                    State::Trailer
                }
                _ => return Err(ProtocolError::MissingChunkTerminator),
            },
            State::Data(_) | State::Done => self.state,
        };
        Ok(())
    }
}

/// Encodes writes as chunks and closes with the zero-size chunk.
#[derive(Debug, Default)]
pub struct ChunkedEncoder {
    written: u64,
    finished: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits one chunk per call. Empty writes emit nothing, since a
    /// zero-size chunk would end the body.
    pub fn encode(&mut self, data: &[u8], dst: &mut BytesMut) -> std::io::Result<()> {
        if self.finished {
            return Err(closed_error());
        }
        if data.is_empty() {
            return Ok(());
        }
        let mut size = String::with_capacity(18);
        let _ = write!(size, "{:X}\r\n", data.len());
        dst.reserve(size.len() + data.len() + 2);
        dst.extend_from_slice(size.as_bytes());
        dst.extend_from_slice(data);
        dst.extend_from_slice(b"\r\n");
        self.written += data.len() as u64;
        Ok(())
    }

    pub fn finish(&mut self, dst: &mut BytesMut) {
        if !self.finished {
            dst.extend_from_slice(b"0\r\n\r\n");
            self.finished = true;
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}
