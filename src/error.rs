//! Error taxonomy of the connection engine.
//!
//! Parsing failures are [`ProtocolError`]s and always cost the connection.
//! Socket failures surface as [`Error::Transport`]. Running out of buffered
//! bytes halfway through a line or a body is not an error at all: the step
//! that hit it simply returns and resumes on the next refill.

use std::io;

use thiserror::Error;

use crate::http::response::StatusCode;

/// Malformed framing received from the peer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("carriage return not followed by a line feed")]
    MissingLineFeed,

    #[error("line feed without a preceding carriage return")]
    BareLineFeed,

    #[error("invalid start line: {0}")]
    InvalidStartLine(String),

    #[error("invalid protocol version: {0}")]
    InvalidVersion(String),

    #[error("invalid status code: {0}")]
    InvalidStatus(String),

    #[error("invalid header line: {0}")]
    InvalidHeader(String),

    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("conflicting content-length values")]
    ConflictingContentLength,

    #[error("unsupported transfer-coding: {0}")]
    UnsupportedTransferCoding(String),

    #[error("chunk size is not a hex number")]
    InvalidChunkSize,

    #[error("chunk size is too large")]
    ChunkSizeOverflow,

    #[error("chunk framing is missing a line terminator")]
    MissingChunkTerminator,

    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("more than {0} header fields")]
    TooManyHeaders(usize),

    #[error("body exceeds {0} bytes")]
    BodyTooLarge(u64),

    #[error("end of stream inside a message")]
    UnexpectedEof,
}

/// A response that breaks the body rules for its status or method.
///
/// Never fatal: the outbound side logs it, fixes the response up and sends
/// it anyway.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("responses with a {0} status can't have an entity, ignoring it")]
    ForbiddenBody(StatusCode),

    #[error("a response with a 200 (OK) status should have an entity; return one or use 204 (No Content)")]
    MissingBody,

    #[error("the returned entity isn't available, ignoring it")]
    UnavailableEntity,
}

/// Everything a connection step can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("connection closed")]
    Closed,
}

impl Error {
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
