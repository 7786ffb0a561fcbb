//! HTTP/1.x line grammar.
//!
//! These functions see one complete line at a time, without its CRLF. The
//! streaming side (finding line ends across buffer refills) lives in the
//! Way; this module only decides what a finished line means.

use crate::config::ConnectionConfig;
use crate::error::ProtocolError;
use crate::http::inbound::{InboundMessage, InboundWay, Role};
use crate::http::request::{self, Method, Request};
use crate::http::response::{Response, StatusCode};

/// Tokens of a request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: String,
}

/// Tokens of a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub status: StatusCode,
    pub reason: String,
}

fn text(line: &[u8]) -> Result<&str, ProtocolError> {
    std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidStartLine(lossy(line)))
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

fn check_version(version: &str) -> Result<(), ProtocolError> {
    let valid = version
        .strip_prefix("HTTP/")
        .is_some_and(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit() || b == b'.'));
    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidVersion(version.to_string()))
    }
}

fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Splits off the next whitespace-delimited token.
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start_matches(is_space);
    match s.find(is_space) {
        Some(end) => (&s[..end], &s[end..]),
        None => (s, ""),
    }
}

/// Parses `method SP target SP version`. Tokens may be separated by any
/// run of SP or HT.
///
/// An empty or absent target stands for `/`.
pub fn parse_request_line(line: &[u8]) -> Result<RequestLine, ProtocolError> {
    let line = text(line)?;
    let invalid = || ProtocolError::InvalidStartLine(line.to_string());

    let (method_str, rest) = split_token(line);
    let method = Method::from_str(method_str).ok_or_else(invalid)?;

    let (first, rest) = split_token(rest);
    let (second, rest) = split_token(rest);
    if !rest.trim_matches(is_space).is_empty() {
        return Err(invalid());
    }
    let (target, version) = match (first, second) {
        (target, version) if !version.is_empty() => (target, version),
        (version, "") if version.starts_with("HTTP/") => ("", version),
        _ => return Err(invalid()),
    };
    check_version(version)?;

    let target = if target.is_empty() { "/" } else { target };

    Ok(RequestLine {
        method,
        target: target.to_string(),
        version: version.to_string(),
    })
}

/// Parses `version SP code SP reason`; the reason may be empty and keeps
/// its inner spaces.
pub fn parse_status_line(line: &[u8]) -> Result<StatusLine, ProtocolError> {
    let line = text(line)?;
    let (version, rest) = split_token(line);
    check_version(version)?;

    let (code, reason) = split_token(rest);
    let status = (code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()))
        .then(|| code.parse().ok())
        .flatten()
        .and_then(StatusCode::from_u16)
        .ok_or_else(|| ProtocolError::InvalidStatus(code.to_string()))?;

    Ok(StatusLine {
        version: version.to_string(),
        status,
        reason: reason.trim_matches(is_space).to_string(),
    })
}

/// Parses `Name: value`, trimming optional whitespace around the value.
pub fn parse_header_line(line: &[u8]) -> Result<(String, String), ProtocolError> {
    let invalid = || ProtocolError::InvalidHeader(lossy(line));
    let colon = line.iter().position(|&b| b == b':').ok_or_else(invalid)?;

    let name = std::str::from_utf8(&line[..colon]).map_err(|_| invalid())?;
    if !request::is_token(name) {
        return Err(invalid());
    }

    let value = String::from_utf8_lossy(&line[colon + 1..]);
    let value = value.trim_matches(|c| c == ' ' || c == '\t');

    Ok((name.to_string(), value.to_string()))
}

/// Whether a header line continues the previous field (obs-fold).
pub(crate) fn is_continuation(line: &[u8]) -> bool {
    matches!(line.first(), Some(b' ' | b'\t'))
}

/// Parses one complete request from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` holds only part of a request, otherwise the
/// request and the number of bytes it occupied.
pub fn parse_request(buf: &[u8]) -> Result<Option<(Request, usize)>, ProtocolError> {
    let mut way = InboundWay::new(Role::Server, &ConnectionConfig::default());
    way.push_bytes(buf);
    match way.advance()? {
        Some(InboundMessage::Request(request)) => Ok(Some((request, buf.len() - way.buffered()))),
        _ => Ok(None),
    }
}

/// Parses one complete response from the front of `buf`.
///
/// `request_method` is the method of the request being answered; responses
/// to HEAD never carry a body.
pub fn parse_response(
    buf: &[u8],
    request_method: Method,
) -> Result<Option<(Response, usize)>, ProtocolError> {
    let mut way = InboundWay::new(Role::Client, &ConnectionConfig::default());
    way.expect_response(request_method);
    way.push_bytes(buf);
    match way.advance()? {
        Some(InboundMessage::Response(response)) => Ok(Some((response, buf.len() - way.buffered()))),
        _ => Ok(None),
    }
}
