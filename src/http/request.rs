use std::fmt;

use crate::http::entity::Entity;
use crate::http::headers::{self, Headers};

pub const HTTP_10: &str = "HTTP/1.0";
pub const HTTP_11: &str = "HTTP/1.1";

/// HTTP request methods.
///
/// The common methods have their own variant. Any other token is kept
/// verbatim as an extension method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// CONNECT - Establish a tunnel
    CONNECT,
    /// TRACE - Loop the request back
    TRACE,
    /// Any other method token
    Extension(String),
}

/// Represents a parsed HTTP request.
///
/// `entity` is `None` when the request carried no body.
#[derive(Debug)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target (e.g., "/index.html")
    pub target: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers in arrival order
    pub headers: Headers,
    /// Request body, if any
    pub entity: Option<Entity>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Option<String>,
    headers: Headers,
    entity: Option<Entity>,
}

impl Method {
    /// Parses a method token.
    ///
    /// Unknown tokens become [`Method::Extension`]; `None` is returned only
    /// when `s` is not a valid token.
    ///
    /// # Example
    ///
    /// ```
    /// # use conduit::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("PURGE"), Some(Method::Extension("PURGE".into())));
    /// assert_eq!(Method::from_str("GE T"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let method = match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            "CONNECT" => Method::CONNECT,
            "TRACE" => Method::TRACE,
            other if is_token(other) => Method::Extension(other.to_string()),
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::CONNECT => "CONNECT",
            Method::TRACE => "TRACE",
            Method::Extension(token) => token,
        }
    }

    /// Methods whose responses never carry a body.
    pub fn is_head(&self) -> bool {
        matches!(self, Method::HEAD)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 9110 `tchar` sequence.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: None,
            headers: Headers::new(),
            entity: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            target: self.target.unwrap_or_else(|| "/".to_string()),
            version: self.version.unwrap_or_else(|| HTTP_11.to_string()),
            headers: self.headers,
            entity: self.entity,
        })
    }
}

impl Request {
    /// Retrieves the first value of a header, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Declared Content-Length, 0 when missing or not a valid number.
    pub fn content_length(&self) -> u64 {
        self.header(headers::CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// The body bytes, empty when there is no entity.
    pub fn body(&self) -> &[u8] {
        self.entity
            .as_ref()
            .and_then(Entity::bytes)
            .map(|bytes| bytes.as_ref())
            .unwrap_or_default()
    }

    /// Whether the exchange expects a response written back.
    pub fn expects_response(&self) -> bool {
        true
    }

    /// Determines whether the connection may stay open after the response.
    ///
    /// `Connection: close` always ends it. HTTP/1.1 defaults to keep-alive,
    /// HTTP/1.0 only keeps alive when asked to.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token(headers::CONNECTION, "close") {
            return false;
        }
        if self.version == HTTP_10 {
            return self.headers.has_token(headers::CONNECTION, "keep-alive");
        }
        true
    }

    /// Resolves the target into an absolute reference using the Host header.
    pub fn resource_ref(&self) -> Option<url::Url> {
        if let Ok(url) = url::Url::parse(&self.target) {
            return Some(url);
        }
        let host = self.header(headers::HOST)?;
        url::Url::parse(&format!("http://{}{}", host.trim(), self.target)).ok()
    }

    /// Target resolved for log lines; falls back to the raw target.
    pub(crate) fn describe(&self) -> String {
        self.resource_ref()
            .map(|url| url.to_string())
            .unwrap_or_else(|| self.target.clone())
    }
}
