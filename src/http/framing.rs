//! Chooses how the boundaries of an inbound entity are found.

use crate::error::ProtocolError;
use crate::http::headers::{self, Headers};
use crate::http::request::Method;
use crate::http::response::StatusCode;

/// Rule by which an entity's end is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// No entity; the message ends with its headers.
    None,
    FixedLength(u64),
    Chunked,
    /// The entity runs until the peer closes its side.
    CloseDelimited,
}

/// What kind of message is being framed.
#[derive(Debug, Clone, Copy)]
pub enum MessageKind<'a> {
    Request,
    Response {
        status: StatusCode,
        /// Method of the request this response answers, when known.
        request_method: Option<&'a Method>,
        /// Whether the connection ends after this message.
        closing: bool,
    },
}

/// Maps a header set to exactly one framing mode.
///
/// Priority: chunked transfer-coding, then Content-Length, then (responses
/// only) close-delimited when the connection is ending, else no entity.
pub fn resolve(headers: &Headers, kind: MessageKind<'_>) -> Result<FramingMode, ProtocolError> {
    if let MessageKind::Response {
        status,
        request_method,
        ..
    } = kind
    {
        let head = request_method.is_some_and(Method::is_head);
        if head
            || status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::RESET_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            return Ok(FramingMode::None);
        }
    }

    let mut codings = headers.tokens(headers::TRANSFER_ENCODING).peekable();
    if codings.peek().is_some() {
        let last = codings.last().unwrap_or_default();
        if last.eq_ignore_ascii_case("chunked") {
            return Ok(FramingMode::Chunked);
        }
        return match kind {
            MessageKind::Request => Err(ProtocolError::UnsupportedTransferCoding(last.to_string())),
            MessageKind::Response { .. } => Ok(FramingMode::CloseDelimited),
        };
    }

    if let Some(length) = content_length(headers)? {
        return Ok(FramingMode::FixedLength(length));
    }

    match kind {
        MessageKind::Response { closing: true, .. } => Ok(FramingMode::CloseDelimited),
        _ => Ok(FramingMode::None),
    }
}

/// Folds every Content-Length value into one length.
///
/// Identical repeats are accepted; anything non-numeric or differing is a
/// protocol error.
pub fn content_length(headers: &Headers) -> Result<Option<u64>, ProtocolError> {
    let mut length = None;
    for value in headers.tokens(headers::CONTENT_LENGTH) {
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidContentLength(value.to_string()));
        }
        let parsed: u64 = value
            .parse()
            .map_err(|_| ProtocolError::InvalidContentLength(value.to_string()))?;
        match length {
            Some(previous) if previous != parsed => {
                return Err(ProtocolError::ConflictingContentLength);
            }
            _ => length = Some(parsed),
        }
    }
    if length.is_none() && headers.get_all(headers::CONTENT_LENGTH).next().is_some() {
        return Err(ProtocolError::InvalidContentLength(String::new()));
    }
    Ok(length)
}
