use bytes::BytesMut;

use super::{Decoded, closed_error};

/// Reads until the peer half-closes the connection.
#[derive(Debug, Default)]
pub struct CloseDecoder {
    ended: bool,
}

impl CloseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Decoded {
        dst.extend_from_slice(&src.split());
        if self.ended {
            Decoded::Done
        } else {
            Decoded::Partial
        }
    }

    pub fn decode_eof(&mut self) -> Decoded {
        self.ended = true;
        Decoded::Done
    }
}

/// Writes raw bytes; the end of the entity is the end of the connection.
#[derive(Debug, Default)]
pub struct CloseEncoder {
    written: u64,
    finished: bool,
}

impl CloseEncoder {
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
