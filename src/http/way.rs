//! State shared by both directions of message processing.

use std::io;
use std::sync::{Arc, Weak};

use bytes::{Buf, BytesMut};

use crate::config::ConnectionConfig;
use crate::error::ProtocolError;
use crate::http::connection::Connection;
use crate::transport::{Interest, Transport};

/// Where a Way is within the message it is processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    StartLine,
    Headers,
    Body,
    End,
}

/// One direction of a connection: a bounded byte buffer plus the line being
/// accumulated and the message state.
///
/// The back-reference to the owning [`Connection`] is weak; the connection
/// owns its Ways, never the other way round.
#[derive(Debug)]
pub struct Way {
    connection: Weak<Connection>,
    buffer: BytesMut,
    scratch: Box<[u8]>,
    line: BytesMut,
    pending_cr: bool,
    state: MessageState,
    max_line_bytes: usize,
}

impl Way {
    pub(crate) fn new(connection: Weak<Connection>, config: &ConnectionConfig) -> Self {
        Self {
            connection,
            buffer: BytesMut::with_capacity(config.buffer_size),
            scratch: vec![0; config.buffer_size.max(1)].into_boxed_slice(),
            line: BytesMut::new(),
            pending_cr: false,
            state: MessageState::StartLine,
            max_line_bytes: config.max_line_bytes,
        }
    }

    pub(crate) fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.upgrade()
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: MessageState) {
        self.state = state;
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Nothing of a next message has been seen yet.
    pub(crate) fn is_between_messages(&self) -> bool {
        self.state == MessageState::StartLine
            && self.buffer.is_empty()
            && self.line.is_empty()
            && !self.pending_cr
    }

    /// Consumes buffered bytes up to the next CRLF.
    ///
    /// Returns the line without its terminator, or `None` when the buffer
    /// ran out first. Bytes of an unfinished line are kept for the next call.
    pub(crate) fn read_line(&mut self) -> Result<Option<BytesMut>, ProtocolError> {
        while !self.buffer.is_empty() {
            if self.pending_cr {
                self.pending_cr = false;
                if self.buffer.get_u8() == b'\n' {
                    return Ok(Some(self.line.split()));
                }
                return Err(ProtocolError::MissingLineFeed);
            }

            match self.buffer.iter().position(|&b| b == b'\r' || b == b'\n') {
                Some(end) => {
                    if self.buffer[end] == b'\n' {
                        return Err(ProtocolError::BareLineFeed);
                    }
                    self.append_line(end)?;
                    self.buffer.advance(1);
                    self.pending_cr = true;
                }
                None => {
                    let all = self.buffer.len();
                    self.append_line(all)?;
                }
            }
        }
        Ok(None)
    }

    fn append_line(&mut self, len: usize) -> Result<(), ProtocolError> {
        if self.line.len() + len > self.max_line_bytes {
            return Err(ProtocolError::LineTooLong(self.max_line_bytes));
        }
        self.line.extend_from_slice(&self.buffer.split_to(len));
        Ok(())
    }

    /// Reads whatever the transport has into the buffer.
    pub(crate) fn fill(&mut self, transport: &dyn Transport) -> io::Result<usize> {
        loop {
            match transport.try_read(&mut self.scratch) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&self.scratch[..n]);
                    return Ok(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if e.kind() == io::ErrorKind::WouldBlock {
                        transport.register_interest(Interest::READABLE);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Writes the buffer out.
    ///
    /// Returns `false` when the transport would block with bytes left over.
    pub(crate) fn flush(&mut self, transport: &dyn Transport) -> io::Result<bool> {
        while !self.buffer.is_empty() {
            match transport.try_write(&self.buffer) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.buffer.advance(n),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    transport.register_interest(Interest::WRITABLE);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
        transport.flush()?;
        Ok(true)
    }

    /// Drops any partial state, as after an aborted message.
    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
        self.line.clear();
        self.pending_cr = false;
        self.state = MessageState::StartLine;
    }
}
