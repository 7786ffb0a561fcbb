use conduit::error::ProtocolError;
use conduit::http::framing::{FramingMode, MessageKind, content_length, resolve};
use conduit::http::headers::Headers;
use conduit::http::request::Method;
use conduit::http::response::StatusCode;

fn headers(fields: &[(&str, &str)]) -> Headers {
    fields.iter().copied().collect()
}

fn response(status: u16, closing: bool) -> MessageKind<'static> {
    MessageKind::Response {
        status: StatusCode::from_u16(status).unwrap(),
        request_method: None,
        closing,
    }
}

#[test]
fn test_request_without_framing_headers_has_no_entity() {
    assert_eq!(resolve(&Headers::new(), MessageKind::Request), Ok(FramingMode::None));
}

#[test]
fn test_content_length_gives_fixed_length() {
    let h = headers(&[("content-length", "42")]);
    assert_eq!(resolve(&h, MessageKind::Request), Ok(FramingMode::FixedLength(42)));
}

#[test]
fn test_chunked_must_be_the_last_coding() {
    let h = headers(&[("Transfer-Encoding", "gzip, chunked")]);
    assert_eq!(resolve(&h, MessageKind::Request), Ok(FramingMode::Chunked));

    let h = headers(&[("Transfer-Encoding", "chunked, gzip")]);
    assert!(matches!(
        resolve(&h, MessageKind::Request),
        Err(ProtocolError::UnsupportedTransferCoding(_))
    ));
    assert_eq!(resolve(&h, response(200, false)), Ok(FramingMode::CloseDelimited));
}

#[test]
fn test_closing_response_without_length_is_close_delimited() {
    assert_eq!(resolve(&Headers::new(), response(200, true)), Ok(FramingMode::CloseDelimited));
    assert_eq!(resolve(&Headers::new(), response(200, false)), Ok(FramingMode::None));
}

#[test]
fn test_bodiless_responses_ignore_framing_headers() {
    let h = headers(&[("Content-Length", "10")]);
    for status in [101, 204, 205, 304] {
        assert_eq!(resolve(&h, response(status, true)), Ok(FramingMode::None), "{status}");
    }

    let head = Method::HEAD;
    let kind = MessageKind::Response {
        status: StatusCode::OK,
        request_method: Some(&head),
        closing: false,
    };
    assert_eq!(resolve(&h, kind), Ok(FramingMode::None));
}

#[test]
fn test_duplicate_content_lengths() {
    let same = headers(&[("Content-Length", "5"), ("Content-Length", "5")]);
    assert_eq!(content_length(&same), Ok(Some(5)));

    let listed = headers(&[("Content-Length", "5, 5")]);
    assert_eq!(content_length(&listed), Ok(Some(5)));

    let differing = headers(&[("Content-Length", "5"), ("Content-Length", "6")]);
    assert_eq!(content_length(&differing), Err(ProtocolError::ConflictingContentLength));
}

#[test]
fn test_non_numeric_content_length_is_rejected() {
    let h = headers(&[("Content-Length", "abc")]);
    assert!(matches!(
        resolve(&h, MessageKind::Request),
        Err(ProtocolError::InvalidContentLength(_))
    ));
}
