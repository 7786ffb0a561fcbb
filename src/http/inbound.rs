//! Inbound message parsing.
//!
//! ```text
//!   START_LINE ──line──▶ HEADERS ──blank line──▶ BODY ──entity done──▶ END
//!       ▲                   │                                          │
//!       │                   └──── framing = None ─────────────────────▶│
//!       └────────────────────────── message handed off ────────────────┘
//! ```
//!
//! Every step consumes only what is buffered. Running dry in the middle of a
//! line or an entity returns `Ok(None)` and the next call continues from the
//! same spot.

use std::collections::VecDeque;
use std::sync::Weak;

use bytes::BytesMut;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{Error, ProtocolError};
use crate::http::body::{Decoded, Decoder};
use crate::http::connection::{Connection, ReadProgress};
use crate::http::entity::Entity;
use crate::http::framing::{self, FramingMode, MessageKind};
use crate::http::headers::{self, Headers};
use crate::http::parser::{self, RequestLine, StatusLine};
use crate::http::request::{HTTP_10, Method, Request};
use crate::http::response::Response;
use crate::http::way::{MessageState, Way};
use crate::transport::Transport;

/// Which side of the exchange this Way parses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Parses requests.
    Server,
    /// Parses responses.
    Client,
}

/// A fully parsed inbound message.
#[derive(Debug)]
pub enum InboundMessage {
    Request(Request),
    Response(Response),
}

#[derive(Debug)]
enum StartLine {
    Request(RequestLine),
    Status(StatusLine),
}

/// The message currently being built.
#[derive(Debug)]
struct Partial {
    start: StartLine,
    headers: Headers,
    framing: FramingMode,
    decoder: Option<Decoder>,
    body: BytesMut,
}

#[derive(Debug)]
pub struct InboundWay {
    way: Way,
    role: Role,
    partial: Option<Partial>,
    max_headers: usize,
    max_line_bytes: usize,
    max_body_bytes: u64,
    peer_closed: bool,
    /// Methods of requests whose responses are still to be parsed.
    expected: VecDeque<Method>,
}

impl InboundWay {
    /// A Way that is not bound to a connection; bytes are supplied with
    /// [`InboundWay::push_bytes`].
    pub fn new(role: Role, config: &ConnectionConfig) -> Self {
        Self::attached(Weak::new(), role, config)
    }

    pub(crate) fn attached(connection: Weak<Connection>, role: Role, config: &ConnectionConfig) -> Self {
        Self {
            way: Way::new(connection, config),
            role,
            partial: None,
            max_headers: config.max_headers,
            max_line_bytes: config.max_line_bytes,
            max_body_bytes: config.max_body_bytes,
            peer_closed: false,
            expected: VecDeque::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> MessageState {
        self.way.state()
    }

    /// Bytes received but not consumed yet.
    pub fn buffered(&self) -> usize {
        self.way.buffered()
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        self.way.push_bytes(data);
    }

    /// Records the method of a request sent on this connection, so the
    /// matching response is framed correctly.
    pub fn expect_response(&mut self, method: Method) {
        self.expected.push_back(method);
    }

    /// Advances the state machine over the buffered bytes.
    ///
    /// Returns a message each time one completes, `None` when the buffer is
    /// exhausted first.
    pub fn advance(&mut self) -> Result<Option<InboundMessage>, ProtocolError> {
        loop {
            match self.way.state() {
                MessageState::StartLine => {
                    let Some(line) = self.way.read_line()? else {
                        return Ok(None);
                    };
                    // Leading empty lines are tolerated.
                    if line.is_empty() {
                        continue;
                    }
                    self.start_message(&line)?;
                    self.way.set_state(MessageState::Headers);
                }
                MessageState::Headers => {
                    let Some(line) = self.way.read_line()? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        self.end_headers()?;
                    } else {
                        self.add_header(&line)?;
                    }
                }
                MessageState::Body => {
                    let Some(partial) = self.partial.as_mut() else {
                        self.way.set_state(MessageState::StartLine);
                        continue;
                    };
                    let Some(decoder) = partial.decoder.as_mut() else {
                        self.way.set_state(MessageState::End);
                        continue;
                    };
                    let decoded = decoder.decode(self.way.buffer_mut(), &mut partial.body)?;
                    if partial.body.len() as u64 > self.max_body_bytes {
                        return Err(ProtocolError::BodyTooLarge(self.max_body_bytes));
                    }
                    match decoded {
                        Decoded::Partial => return Ok(None),
                        Decoded::Done => self.way.set_state(MessageState::End),
                    }
                }
                MessageState::End => {
                    self.way.set_state(MessageState::StartLine);
                    if let Some(message) = self.complete() {
                        return Ok(Some(message));
                    }
                }
            }
        }
    }

    /// Handles the peer half-closing the connection.
    ///
    /// Completes a close-delimited entity; anything else cut short is a
    /// protocol error. Returns `None` when no message was in progress.
    pub fn advance_eof(&mut self) -> Result<Option<InboundMessage>, ProtocolError> {
        self.peer_closed = true;
        if self.way.is_between_messages() {
            return Ok(None);
        }
        let in_body = self.way.state() == MessageState::Body;
        match self.partial.as_mut().and_then(|p| p.decoder.as_mut()) {
            Some(decoder) if in_body => {
                decoder.decode_eof()?;
            }
            _ => return Err(ProtocolError::UnexpectedEof),
        }
        self.advance()
    }

    /// Parses messages until the transport runs dry, handing each one to the
    /// owning connection.
    pub(crate) fn read_messages(&mut self, transport: &dyn Transport) -> Result<ReadProgress, Error> {
        let connection = self.way.connection().ok_or(Error::Closed)?;
        loop {
            if let Some(message) = self.advance()? {
                connection.accept(message);
                if !connection.may_keep_reading() {
                    return Ok(ReadProgress::Paused);
                }
                continue;
            }

            match self.way.fill(transport) {
                Ok(0) => {
                    debug!(connection = %connection.id(), "peer closed its side");
                    if let Some(message) = self.advance_eof()? {
                        connection.accept(message);
                    }
                    return Ok(ReadProgress::Eof);
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Ok(ReadProgress::Suspended);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Drops the message in progress along with buffered bytes.
    pub(crate) fn abort(&mut self) {
        self.partial = None;
        self.way.reset();
    }

    fn start_message(&mut self, line: &[u8]) -> Result<(), ProtocolError> {
        let start = match self.role {
            Role::Server => StartLine::Request(parser::parse_request_line(line)?),
            Role::Client => StartLine::Status(parser::parse_status_line(line)?),
        };
        self.partial = Some(Partial {
            start,
            headers: Headers::new(),
            framing: FramingMode::None,
            decoder: None,
            body: BytesMut::new(),
        });
        Ok(())
    }

    fn add_header(&mut self, line: &[u8]) -> Result<(), ProtocolError> {
        let Some(partial) = self.partial.as_mut() else {
            return Err(ProtocolError::InvalidHeader(String::from_utf8_lossy(line).into_owned()));
        };

        if parser::is_continuation(line) {
            let continuation = String::from_utf8_lossy(line);
            let Some(folded) = partial.headers.last_field_len() else {
                return Err(ProtocolError::InvalidHeader(continuation.into_owned()));
            };
            // The unfolded field is held to the same limit as a single line.
            if folded + 1 + continuation.trim().len() > self.max_line_bytes {
                return Err(ProtocolError::LineTooLong(self.max_line_bytes));
            }
            partial.headers.continue_last(continuation.trim());
            return Ok(());
        }

        if partial.headers.len() >= self.max_headers {
            return Err(ProtocolError::TooManyHeaders(self.max_headers));
        }
        let (name, value) = parser::parse_header_line(line)?;
        partial.headers.add(name, value);
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), ProtocolError> {
        let Some(partial) = self.partial.as_mut() else {
            self.way.set_state(MessageState::StartLine);
            return Ok(());
        };

        let kind = match &partial.start {
            StartLine::Request(_) => MessageKind::Request,
            StartLine::Status(line) => {
                let closing = self.peer_closed
                    || partial.headers.has_token(headers::CONNECTION, "close")
                    || (line.version == HTTP_10
                        && !partial.headers.has_token(headers::CONNECTION, "keep-alive"));
                MessageKind::Response {
                    status: line.status,
                    request_method: self.expected.front(),
                    closing,
                }
            }
        };

        let framing = framing::resolve(&partial.headers, kind)?;
        if let FramingMode::FixedLength(length) = framing {
            if length > self.max_body_bytes {
                return Err(ProtocolError::BodyTooLarge(self.max_body_bytes));
            }
        }

        partial.framing = framing;
        let seen = partial.headers.len();
        partial.decoder = Decoder::for_mode(framing, self.max_line_bytes)
            .map(|decoder| decoder.with_header_limit(self.max_headers, seen));
        self.way.set_state(if partial.decoder.is_some() {
            MessageState::Body
        } else {
            MessageState::End
        });
        Ok(())
    }

    fn complete(&mut self) -> Option<InboundMessage> {
        let Partial {
            start,
            mut headers,
            framing,
            decoder,
            body,
        } = self.partial.take()?;

        if let Some(mut decoder) = decoder {
            headers.extend(decoder.take_trailers());
        }

        let entity = match framing {
            FramingMode::None => None,
            _ => Some(Entity::from_headers(body.freeze(), &headers)),
        };

        let message = match start {
            StartLine::Request(line) => InboundMessage::Request(Request {
                method: line.method,
                target: line.target,
                version: line.version,
                headers,
                entity,
            }),
            StartLine::Status(line) => {
                if !line.status.is_informational() {
                    self.expected.pop_front();
                }
                InboundMessage::Response(Response {
                    status: line.status,
                    reason: (!line.reason.is_empty()).then_some(line.reason),
                    version: line.version,
                    headers,
                    entity,
                    on_sent: None,
                })
            }
        };
        Some(message)
    }
}
