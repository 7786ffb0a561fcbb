//! Entity descriptor: a message body plus its metadata and release hook.

use std::fmt;
use std::io;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::http::headers::{self, Headers};

type ChunkSource = Box<dyn Iterator<Item = io::Result<Bytes>> + Send>;
type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Where the bytes of an entity come from.
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// Chunks pulled lazily while the entity is written.
    Stream(ChunkSource),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A `Content-Range` value, `unit first-last/complete`, where either side
/// of the slash may be `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRange {
    pub unit: String,
    /// First and last positions, inclusive. `None` for `*`.
    pub range: Option<(u64, u64)>,
    /// Length of the whole representation, when known.
    pub complete_length: Option<u64>,
}

impl ContentRange {
    pub fn bytes(first: u64, last: u64, complete_length: Option<u64>) -> Self {
        Self {
            unit: "bytes".to_string(),
            range: Some((first, last)),
            complete_length,
        }
    }

    /// Parses a header value; `None` when it is malformed.
    pub fn parse(value: &str) -> Option<Self> {
        let (unit, rest) = value.trim().split_once(' ')?;
        let (range, complete) = rest.trim().split_once('/')?;

        let range = match range.trim() {
            "*" => None,
            bounds => {
                let (first, last) = bounds.split_once('-')?;
                let first: u64 = first.trim().parse().ok()?;
                let last: u64 = last.trim().parse().ok()?;
                if last < first {
                    return None;
                }
                Some((first, last))
            }
        };
        let complete_length = match complete.trim() {
            "*" => None,
            length => Some(length.parse().ok()?),
        };
        if range.is_none() && complete_length.is_none() {
            return None;
        }

        Some(Self {
            unit: unit.to_string(),
            range,
            complete_length,
        })
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.unit)?;
        match self.range {
            Some((first, last)) => write!(f, "{first}-{last}/")?,
            None => f.write_str("*/")?,
        }
        match self.complete_length {
            Some(length) => write!(f, "{length}"),
            None => f.write_str("*"),
        }
    }
}

/// A digest of the entity content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub algorithm: String,
    pub value: Vec<u8>,
}

impl Digest {
    pub const MD5: &'static str = "MD5";

    pub fn md5(value: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: Self::MD5.to_string(),
            value: value.into(),
        }
    }

    /// Decodes a base64 `Content-MD5` value.
    pub fn from_content_md5(value: &str) -> Option<Self> {
        STANDARD.decode(value.trim()).ok().map(Self::md5)
    }

    fn is_md5(&self) -> bool {
        self.algorithm.eq_ignore_ascii_case(Self::MD5)
    }
}

/// The body portion of a message.
///
/// The release callback runs exactly once: when [`Entity::release`] is
/// called, or when the entity is dropped without having been released.
pub struct Entity {
    body: Body,
    size: Option<u64>,
    available: bool,
    media_type: Option<String>,
    /// Content codings in the order they were applied.
    encodings: Vec<String>,
    languages: Vec<String>,
    range: Option<ContentRange>,
    digest: Option<Digest>,
    on_release: Option<ReleaseFn>,
}

impl Entity {
    /// An entity whose size is known up front.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let size = Some(bytes.len() as u64);
        Self::with_body(Body::Bytes(bytes), size)
    }

    /// An entity of unknown size produced chunk by chunk.
    pub fn stream<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = io::Result<Bytes>>,
        I::IntoIter: Send + 'static,
    {
        Self::with_body(Body::Stream(Box::new(chunks.into_iter())), None)
    }

    /// An entity that carries metadata only.
    pub fn empty() -> Self {
        let mut entity = Self::with_body(Body::Empty, Some(0));
        entity.available = false;
        entity
    }

    fn with_body(body: Body, size: Option<u64>) -> Self {
        Self {
            body,
            size,
            available: true,
            media_type: None,
            encodings: Vec::new(),
            languages: Vec::new(),
            range: None,
            digest: None,
            on_release: None,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Adds a content coding. `identity` is not a coding and is skipped.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        let encoding = encoding.into();
        if !encoding.eq_ignore_ascii_case("identity") {
            self.encodings.push(encoding);
        }
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.push(language.into());
        self
    }

    pub fn with_range(mut self, range: ContentRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Declares the size of a streamed entity.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Marks the content as (un)available while keeping its metadata.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Installs the callback run once the body is consumed or abandoned.
    pub fn on_release(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(callback));
        self
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn encodings(&self) -> &[String] {
        &self.encodings
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn range(&self) -> Option<&ContentRange> {
        self.range.as_ref()
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    /// Whether there is content to transfer.
    pub fn is_available(&self) -> bool {
        self.available && !matches!(self.body, Body::Empty)
    }

    /// Returns the content when it is held in memory.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Pulls the next piece of content, `None` once exhausted.
    pub fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        match std::mem::replace(&mut self.body, Body::Empty) {
            Body::Empty => None,
            Body::Bytes(bytes) => Some(Ok(bytes)),
            Body::Stream(mut chunks) => {
                let next = chunks.next();
                if next.is_some() {
                    self.body = Body::Stream(chunks);
                }
                next
            }
        }
    }

    /// Collects the remaining content into one buffer.
    pub fn into_bytes(mut self) -> io::Result<Bytes> {
        let mut collected = Vec::new();
        while let Some(chunk) = self.next_chunk() {
            collected.extend_from_slice(&chunk?);
        }
        self.release();
        Ok(Bytes::from(collected))
    }

    /// Runs the release callback if it has not run yet.
    pub fn release(&mut self) {
        if let Some(callback) = self.on_release.take() {
            callback();
        }
    }

    /// Builds an inbound entity, copying the content metadata headers.
    ///
    /// Malformed `Content-Range` and `Content-MD5` values are left out.
    pub(crate) fn from_headers(body: Bytes, headers: &Headers) -> Self {
        let mut entity = Self::from_bytes(body);
        entity.media_type = headers.get(headers::CONTENT_TYPE).map(str::to_owned);
        entity.encodings = headers
            .tokens(headers::CONTENT_ENCODING)
            .filter(|coding| !coding.eq_ignore_ascii_case("identity"))
            .map(str::to_owned)
            .collect();
        entity.languages = headers
            .tokens(headers::CONTENT_LANGUAGE)
            .map(str::to_owned)
            .collect();
        entity.range = headers
            .get(headers::CONTENT_RANGE)
            .and_then(ContentRange::parse);
        entity.digest = headers
            .get(headers::CONTENT_MD5)
            .and_then(Digest::from_content_md5);
        entity
    }

    /// Adds the headers describing this entity to `headers`.
    pub(crate) fn write_headers(&self, headers: &mut Headers, with_length: bool) {
        if let Some(media_type) = &self.media_type {
            headers.set(headers::CONTENT_TYPE, media_type.as_str());
        }
        if !self.encodings.is_empty() {
            headers.set(headers::CONTENT_ENCODING, self.encodings.join(", "));
        }
        if !self.languages.is_empty() {
            headers.set(headers::CONTENT_LANGUAGE, self.languages.join(", "));
        }
        if let Some(range) = &self.range {
            headers.set(headers::CONTENT_RANGE, range.to_string());
        }
        if let Some(digest) = self.digest.as_ref().filter(|digest| digest.is_md5()) {
            headers.set(headers::CONTENT_MD5, STANDARD.encode(&digest.value));
        }
        if with_length {
            if let Some(size) = self.size {
                headers.set(headers::CONTENT_LENGTH, size.to_string());
            }
        }
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("body", &self.body)
            .field("size", &self.size)
            .field("available", &self.available)
            .field("media_type", &self.media_type)
            .field("encodings", &self.encodings)
            .field("languages", &self.languages)
            .field("range", &self.range)
            .field("released", &self.on_release.is_none())
            .finish()
    }
}
