//! Outbound message writing.
//!
//! Responses leave in the order their requests arrived. Each one is first
//! checked against the body rules of its status and method
//! ([`prepare_response`]), then serialized into the Way's buffer: head in one
//! go, entity a buffer at a time, so a slow peer never makes the whole entity
//! sit in memory.

use std::io;
use std::sync::Weak;

use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, PolicyViolation};
use crate::http::body::Encoder;
use crate::http::connection::{Connection, Outgoing, WriteProgress};
use crate::http::entity::Entity;
use crate::http::framing::FramingMode;
use crate::http::headers::{self, Headers};
use crate::http::request::{HTTP_10, HTTP_11, Method};
use crate::http::response::{Delivery, OnSent, Response, StatusCode};
use crate::http::way::{MessageState, Way};
use crate::http::writer;
use crate::transport::Transport;

/// A response after the write policy was applied, ready to serialize.
#[derive(Debug)]
pub struct PreparedResponse {
    pub version: String,
    pub status: StatusCode,
    pub reason: String,
    pub headers: Headers,
    pub framing: FramingMode,
    /// The entity to write; `None` when no body goes on the wire.
    pub entity: Option<Entity>,
    /// Whether the connection stays open after this response.
    pub persistent: bool,
    pub violations: Vec<PolicyViolation>,
    pub on_sent: Option<OnSent>,
}

/// Applies the body rules and computes the head of a response.
///
/// Entities that must not be written are dropped here, which runs their
/// release callbacks.
pub fn prepare_response(
    request_method: &Method,
    request_version: &str,
    mut response: Response,
    persistent: bool,
    agent: Option<&str>,
) -> PreparedResponse {
    let status = response.status;
    let reason = response.reason_phrase();
    let mut persistent = persistent && !response.headers.has_token(headers::CONNECTION, "close");
    let mut headers = Headers::new();
    let mut violations = Vec::new();
    let mut entity = response.entity.take();

    let head = request_method.is_head();
    let bodiless_status = status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
        || status == StatusCode::NOT_MODIFIED;

    if head {
        if let Some(entity) = &entity {
            entity.write_headers(&mut headers, true);
        }
        entity = None;
    } else if bodiless_status {
        if let Some(dropped) = entity.take() {
            if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
                dropped.write_headers(&mut headers, status == StatusCode::NOT_MODIFIED);
            }
            if dropped.is_available() {
                violations.push(PolicyViolation::ForbiddenBody(status));
            }
        }
    } else if status == StatusCode::OK && !entity.as_ref().is_some_and(Entity::is_available) {
        if let Some(dropped) = entity.take() {
            dropped.write_headers(&mut headers, false);
        }
        violations.push(PolicyViolation::MissingBody);
    } else if let Some(current) = &entity {
        if current.is_available() {
            current.write_headers(&mut headers, true);
        } else {
            current.write_headers(&mut headers, false);
            violations.push(PolicyViolation::UnavailableEntity);
            entity = None;
        }
    }

    let http10 = request_version == HTTP_10;
    let framing = match entity.as_ref().map(Entity::size) {
        Some(Some(length)) => FramingMode::FixedLength(length),
        Some(None) if http10 => {
            persistent = false;
            FramingMode::CloseDelimited
        }
        Some(None) => {
            headers.set(headers::TRANSFER_ENCODING, "chunked");
            FramingMode::Chunked
        }
        None => FramingMode::None,
    };

    // Application headers come after the entity's own; the framing ones stay
    // under our control except where they describe a body that isn't sent.
    let keeps_length = head || status == StatusCode::NOT_MODIFIED;
    for (name, value) in response.headers.iter() {
        if name.eq_ignore_ascii_case(headers::TRANSFER_ENCODING)
            || name.eq_ignore_ascii_case(headers::CONNECTION)
        {
            continue;
        }
        if name.eq_ignore_ascii_case(headers::CONTENT_LENGTH)
            && (!keeps_length || headers.contains(headers::CONTENT_LENGTH))
        {
            continue;
        }
        if headers.contains(name) && is_entity_header(name) {
            continue;
        }
        headers.add(name, value);
    }

    if framing == FramingMode::None
        && !head
        && !bodiless_status
        && !headers.contains(headers::CONTENT_LENGTH)
    {
        headers.set(headers::CONTENT_LENGTH, "0");
    }

    if !persistent {
        headers.set(headers::CONNECTION, "close");
    } else if http10 {
        headers.set(headers::CONNECTION, "keep-alive");
    }

    if let Some(agent) = agent {
        if !headers.contains(headers::SERVER) {
            headers.add(headers::SERVER, agent);
        }
    }

    let version = if request_version == HTTP_10 || request_version == HTTP_11 {
        request_version
    } else {
        HTTP_11
    };

    PreparedResponse {
        version: version.to_string(),
        status,
        reason,
        headers,
        framing,
        entity,
        persistent,
        violations,
        on_sent: response.on_sent.take(),
    }
}

fn is_entity_header(name: &str) -> bool {
    [
        headers::CONTENT_TYPE,
        headers::CONTENT_ENCODING,
        headers::CONTENT_LANGUAGE,
        headers::CONTENT_RANGE,
        headers::CONTENT_MD5,
    ]
    .iter()
    .any(|known| name.eq_ignore_ascii_case(known))
}

/// The response whose bytes are currently going out.
#[derive(Debug)]
struct Current {
    seq: u64,
    target: String,
    entity: Option<Entity>,
    encoder: Option<Encoder>,
    declared: Option<u64>,
    persistent: bool,
    truncated: bool,
    on_sent: Option<OnSent>,
}

#[derive(Debug)]
pub struct OutboundWay {
    way: Way,
    current: Option<Current>,
    high_water: usize,
    agent: Option<String>,
}

impl OutboundWay {
    pub(crate) fn new(connection: Weak<Connection>, config: &ConnectionConfig) -> Self {
        Self {
            way: Way::new(connection, config),
            current: None,
            high_water: config.buffer_size.max(1),
            agent: config.agent.clone(),
        }
    }

    pub fn state(&self) -> MessageState {
        self.way.state()
    }

    /// Whether a response is partially written.
    pub fn is_writing(&self) -> bool {
        self.current.is_some()
    }

    /// Writes queued responses until none is ready or the transport blocks.
    pub(crate) fn write_messages(&mut self, transport: &dyn Transport) -> Result<WriteProgress, Error> {
        let connection = self.way.connection().ok_or(Error::Closed)?;
        loop {
            if self.current.is_none() {
                let Some(outgoing) = connection.next_outgoing() else {
                    return Ok(WriteProgress::Idle);
                };
                let persistent = connection.is_persistent() && outgoing.keep_alive;
                self.begin(outgoing, persistent);
            }

            match self.pump(transport) {
                Ok(true) => {
                    if let Some(mut done) = self.current.take() {
                        self.way.set_state(MessageState::StartLine);
                        if let Some(on_sent) = done.on_sent.take() {
                            on_sent.fire(Delivery::Written);
                        }
                        debug!(connection = %connection.id(), resource = %done.target, "response written");
                        connection.response_written(done.seq, done.persistent);
                    }
                }
                Ok(false) => return Ok(WriteProgress::Blocked),
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            }
        }
    }

    /// Drops the response in progress, releasing its entity.
    pub(crate) fn abort(&mut self) {
        if let Some(mut current) = self.current.take() {
            if let Some(entity) = current.entity.as_mut() {
                entity.release();
            }
            if let Some(on_sent) = current.on_sent.take() {
                on_sent.fire(Delivery::Failed);
            }
        }
        self.way.reset();
    }

    fn begin(&mut self, outgoing: Outgoing, persistent: bool) {
        let Outgoing {
            seq,
            method,
            version,
            target,
            response,
            ..
        } = outgoing;

        let prepared = prepare_response(&method, &version, response, persistent, self.agent.as_deref());
        for violation in &prepared.violations {
            warn!(resource = %target, status = %prepared.status, "{}", violation);
        }

        let buf = self.way.buffer_mut();
        writer::write_status_line(buf, &prepared.version, prepared.status, &prepared.reason);
        writer::write_headers(buf, &prepared.headers);

        let encoder = prepared.entity.as_ref().and(Encoder::for_mode(prepared.framing));
        self.way.set_state(if encoder.is_some() {
            MessageState::Body
        } else {
            MessageState::End
        });

        self.current = Some(Current {
            seq,
            target,
            entity: prepared.entity,
            encoder,
            declared: match prepared.framing {
                FramingMode::FixedLength(length) => Some(length),
                _ => None,
            },
            persistent: prepared.persistent,
            truncated: false,
            on_sent: prepared.on_sent,
        });
    }

    /// Alternates filling and flushing the buffer.
    ///
    /// Returns `true` once the whole response is out, `false` when the
    /// transport blocked first.
    fn pump(&mut self, transport: &dyn Transport) -> Result<bool, Error> {
        loop {
            self.fill()?;
            if !self.way.flush(transport)? {
                return Ok(false);
            }
            if self.way.state() == MessageState::End {
                return Ok(true);
            }
        }
    }

    /// Encodes entity content until the buffer reaches its high-water mark
    /// or the entity ends.
    fn fill(&mut self) -> io::Result<()> {
        let Some(current) = self.current.as_mut() else {
            return Ok(());
        };

        while self.way.state() == MessageState::Body && self.way.buffered() < self.high_water {
            let Some(encoder) = current.encoder.as_mut() else {
                self.way.set_state(MessageState::End);
                break;
            };

            match current.entity.as_mut().and_then(Entity::next_chunk) {
                Some(chunk) => {
                    let mut chunk = chunk?;
                    if let Some(declared) = current.declared {
                        let room = declared.saturating_sub(encoder.written());
                        if chunk.len() as u64 > room {
                            if !current.truncated {
                                warn!(
                                    resource = %current.target,
                                    declared,
                                    "entity is longer than its declared size, truncating"
                                );
                                current.truncated = true;
                            }
                            chunk.truncate(room as usize);
                        }
                    }
                    encoder.encode(&chunk, self.way.buffer_mut())?;
                }
                None => {
                    if let Some(declared) = current.declared {
                        if encoder.written() < declared {
                            warn!(
                                resource = %current.target,
                                declared,
                                written = encoder.written(),
                                "entity is shorter than its declared size, closing the connection"
                            );
                            current.persistent = false;
                        }
                    }
                    encoder.finish(self.way.buffer_mut());
                    if let Some(entity) = current.entity.as_mut() {
                        entity.release();
                    }
                    self.way.set_state(MessageState::End);
                }
            }
        }
        Ok(())
    }
}
