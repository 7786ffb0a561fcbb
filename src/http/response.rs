use std::fmt;

use crate::http::entity::Entity;
use crate::http::headers::Headers;
use crate::http::request::HTTP_11;

/// HTTP status code.
///
/// Any three-digit code is representable; the common ones have constants.
///
/// # Example
///
/// ```
/// # use conduit::http::response::StatusCode;
/// assert_eq!(StatusCode::OK.as_u16(), 200);
/// assert_eq!(StatusCode::NOT_FOUND.reason_phrase(), Some("Not Found"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const CONTINUE: StatusCode = StatusCode(100);
    pub const SWITCHING_PROTOCOLS: StatusCode = StatusCode(101);
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const RESET_CONTENT: StatusCode = StatusCode(205);
    pub const PARTIAL_CONTENT: StatusCode = StatusCode(206);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);
    pub const GATEWAY_TIMEOUT: StatusCode = StatusCode(504);

    /// Accepts codes in `100..=999`.
    pub fn from_u16(code: u16) -> Option<Self> {
        (100..=999).contains(&code).then_some(StatusCode(code))
    }

    /// Returns the numeric HTTP status code.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the standard reason phrase, if the code has one.
    pub fn reason_phrase(&self) -> Option<&'static str> {
        let phrase = match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            411 => "Length Required",
            413 => "Content Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => return None,
        };
        Some(phrase)
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.0)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the write of a response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every byte was handed to the transport.
    Written,
    /// The write started but the transport failed.
    Failed,
    /// The connection closed before the response's turn came.
    Discarded,
}

type SentFn = Box<dyn FnOnce(Delivery) + Send>;

/// Callback run once a response is no longer pending.
///
/// Fires exactly once; dropping it unfired reports [`Delivery::Discarded`].
pub struct OnSent(Option<SentFn>);

impl OnSent {
    pub(crate) fn fire(mut self, delivery: Delivery) {
        if let Some(callback) = self.0.take() {
            callback(delivery);
        }
    }
}

impl Drop for OnSent {
    fn drop(&mut self) {
        if let Some(callback) = self.0.take() {
            callback(Delivery::Discarded);
        }
    }
}

impl fmt::Debug for OnSent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnSent")
    }
}

/// Represents an HTTP response, either produced by the application or
/// parsed from a peer.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Reason phrase; the standard one is used when absent
    pub reason: Option<String>,
    /// Protocol version of a parsed response; written responses follow the
    /// request's version
    pub version: String,
    /// HTTP headers in insertion order
    pub headers: Headers,
    /// Response body, if any
    pub entity: Option<Entity>,
    /// Notified once the response has been written or given up on
    pub on_sent: Option<OnSent>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use conduit::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Cache-Control", "no-cache")
///     .body("{}")
///     .build();
/// assert_eq!(response.status, StatusCode::OK);
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    reason: Option<String>,
    headers: Headers,
    entity: Option<Entity>,
    on_sent: Option<OnSent>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            entity: None,
            on_sent: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Appends a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    /// Sets an in-memory body of known size.
    pub fn body(self, body: impl Into<bytes::Bytes>) -> Self {
        self.entity(Entity::from_bytes(body))
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Runs `callback` once the response is written, fails, or is dropped
    /// unsent.
    pub fn on_sent(mut self, callback: impl FnOnce(Delivery) + Send + 'static) -> Self {
        self.on_sent = Some(OnSent(Some(Box::new(callback))));
        self
    }

    /// Builds the final Response.
    ///
    /// Framing headers are not computed here; the outbound side derives them
    /// from the entity when the response is written.
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            reason: self.reason,
            version: HTTP_11.to_string(),
            headers: self.headers,
            entity: self.entity,
            on_sent: self.on_sent,
        }
    }
}

impl Response {
    pub fn new(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::new(status)
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<bytes::Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::OK)
            .entity(Entity::from_bytes(body).with_media_type("text/plain"))
            .build()
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NOT_FOUND)
            .entity(Entity::from_bytes("404 Not Found").with_media_type("text/plain"))
            .build()
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .entity(
                Entity::from_bytes("500 Internal Server Error").with_media_type("text/plain"),
            )
            .build()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// The reason phrase to put on the status line.
    pub fn reason_phrase(&self) -> String {
        match (&self.reason, self.status.reason_phrase()) {
            (Some(reason), _) => reason.clone(),
            (None, Some(standard)) => standard.to_string(),
            (None, None) => format!("Status {}", self.status),
        }
    }

    /// The body bytes of a parsed response, empty when there is none.
    pub fn body(&self) -> &[u8] {
        self.entity
            .as_ref()
            .and_then(Entity::bytes)
            .map(|bytes| bytes.as_ref())
            .unwrap_or_default()
    }
}
