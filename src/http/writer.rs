use bytes::BytesMut;

use crate::http::headers::Headers;
use crate::http::response::StatusCode;

/// Appends `version SP code SP reason CRLF`.
pub fn write_status_line(buf: &mut BytesMut, version: &str, status: StatusCode, reason: &str) {
    let status_line = format!("{} {} {}\r\n", version, status.as_u16(), reason);
    buf.extend_from_slice(status_line.as_bytes());
}

/// Appends every header as `name: value CRLF`, then the blank line.
pub fn write_headers(buf: &mut BytesMut, headers: &Headers) {
    for (k, v) in headers.iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");
}
