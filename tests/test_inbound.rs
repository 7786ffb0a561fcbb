use conduit::config::ConnectionConfig;
use conduit::error::ProtocolError;
use conduit::http::entity::{ContentRange, Digest};
use conduit::http::inbound::{InboundMessage, InboundWay, Role};
use conduit::http::request::{Method, Request};
use conduit::http::response::{Response, StatusCode};
use conduit::http::way::MessageState;

fn server() -> InboundWay {
    InboundWay::new(Role::Server, &ConnectionConfig::default())
}

fn client() -> InboundWay {
    InboundWay::new(Role::Client, &ConnectionConfig::default())
}

fn request(way: &mut InboundWay) -> Request {
    match way.advance().unwrap() {
        Some(InboundMessage::Request(request)) => request,
        other => panic!("expected a request, got {other:?}"),
    }
}

fn response(way: &mut InboundWay) -> Response {
    match way.advance().unwrap() {
        Some(InboundMessage::Response(response)) => response,
        other => panic!("expected a response, got {other:?}"),
    }
}

#[test]
fn test_simple_get_frees_the_way() {
    let mut way = server();
    way.push_bytes(b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n");
    let parsed = request(&mut way);

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.target, "/x");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.headers.len(), 1);
    assert_eq!(parsed.header("Host"), Some("a"));
    assert!(parsed.entity.is_none());
    assert_eq!(way.state(), MessageState::StartLine);
}

#[test]
fn test_split_delivery_parses_the_same() {
    let raw: &[u8] = b"POST /upload?id=7 HTTP/1.1\r\nHost: example.com\r\nX-Folded: one\r\n two\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";

    let mut whole = server();
    whole.push_bytes(raw);
    let expected = request(&mut whole);

    for split in 0..=raw.len() {
        let mut way = server();
        way.push_bytes(&raw[..split]);
        let early = way.advance().unwrap();
        let parsed = match early {
            Some(InboundMessage::Request(parsed)) => parsed,
            Some(other) => panic!("unexpected message {other:?}"),
            None => {
                way.push_bytes(&raw[split..]);
                request(&mut way)
            }
        };

        assert_eq!(parsed.method, expected.method, "split at {split}");
        assert_eq!(parsed.target, expected.target, "split at {split}");
        assert_eq!(parsed.version, expected.version, "split at {split}");
        assert_eq!(parsed.headers, expected.headers, "split at {split}");
        assert_eq!(parsed.body(), b"Wikipedia", "split at {split}");
    }
}

#[test]
fn test_byte_at_a_time_delivery() {
    let raw = b"PUT /r HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc";
    let mut way = server();
    let mut parsed = None;
    for byte in raw {
        way.push_bytes(&[*byte]);
        if let Some(InboundMessage::Request(request)) = way.advance().unwrap() {
            parsed = Some(request);
        }
    }
    let parsed = parsed.unwrap();
    assert_eq!(parsed.method, Method::PUT);
    assert_eq!(parsed.body(), b"abc");
}

#[test]
fn test_leading_blank_lines_are_skipped() {
    let mut way = server();
    way.push_bytes(b"\r\n\r\nGET / HTTP/1.1\r\n\r\n");
    assert_eq!(request(&mut way).target, "/");
}

#[test]
fn test_pipelined_requests_come_out_in_order() {
    let mut way = server();
    way.push_bytes(b"GET /1 HTTP/1.1\r\n\r\nPOST /2 HTTP/1.1\r\nContent-Length: 2\r\n\r\nokGET /3 HTTP/1.1\r\n\r\n");

    assert_eq!(request(&mut way).target, "/1");
    let second = request(&mut way);
    assert_eq!(second.target, "/2");
    assert_eq!(second.body(), b"ok");
    assert_eq!(request(&mut way).target, "/3");
    assert!(way.advance().unwrap().is_none());
}

#[test]
fn test_trailers_are_merged_into_headers() {
    let mut way = server();
    way.push_bytes(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n1\r\nx\r\n0\r\nX-Checksum: 42\r\n\r\n");
    let parsed = request(&mut way);
    assert_eq!(parsed.header("X-Checksum"), Some("42"));
    assert_eq!(parsed.body(), b"x");
}

#[test]
fn test_entity_metadata_is_copied() {
    let mut way = server();
    way.push_bytes(b"POST / HTTP/1.1\r\nContent-Type: application/json\r\nContent-Language: fr, en-CA\r\nContent-Encoding: identity, gzip\r\nContent-Encoding: br\r\nContent-Length: 2\r\n\r\n{}");
    let parsed = request(&mut way);
    let entity = parsed.entity.as_ref().unwrap();
    assert_eq!(entity.media_type(), Some("application/json"));
    assert_eq!(entity.languages(), vec!["fr".to_string(), "en-CA".to_string()]);
    assert_eq!(entity.encodings(), vec!["gzip".to_string(), "br".to_string()]);
    assert_eq!(entity.size(), Some(2));
}

#[test]
fn test_range_and_digest_are_read() {
    let mut way = server();
    way.push_bytes(b"PUT /f HTTP/1.1\r\nContent-Range: bytes 10-11/100\r\nContent-MD5: Q2hlY2sgSW50ZWdyaXR5IQ==\r\nContent-Length: 2\r\n\r\nab");
    let parsed = request(&mut way);
    let entity = parsed.entity.as_ref().unwrap();
    assert_eq!(entity.range(), Some(&ContentRange::bytes(10, 11, Some(100))));
    assert_eq!(entity.digest(), Some(&Digest::md5(b"Check Integrity!".to_vec())));

    let mut way = server();
    way.push_bytes(b"PUT /f HTTP/1.1\r\nContent-Range: bytes x-y/z\r\nContent-MD5: !!\r\nContent-Length: 0\r\n\r\n");
    let parsed = request(&mut way);
    let entity = parsed.entity.as_ref().unwrap();
    assert!(entity.range().is_none());
    assert!(entity.digest().is_none());
}

#[test]
fn test_bare_line_feed_is_rejected() {
    let mut way = server();
    way.push_bytes(b"GET / HTTP/1.1\nHost: a\n\n");
    assert_eq!(way.advance().unwrap_err(), ProtocolError::BareLineFeed);
}

#[test]
fn test_header_limits() {
    let config = ConnectionConfig {
        max_headers: 2,
        max_line_bytes: 32,
        ..ConnectionConfig::default()
    };

    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n");
    assert_eq!(way.advance().unwrap_err(), ProtocolError::TooManyHeaders(2));

    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(b"GET /a-very-long-target-that-goes-on HTTP/1.1\r\n");
    assert_eq!(way.advance().unwrap_err(), ProtocolError::LineTooLong(32));
}

#[test]
fn test_trailers_count_against_the_header_limit() {
    let config = ConnectionConfig {
        max_headers: 2,
        ..ConnectionConfig::default()
    };

    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n1\r\nx\r\n0\r\nA: 1\r\n\r\n");
    assert_eq!(request(&mut way).headers.len(), 2);

    let mut trailers = String::new();
    for index in 0..1000 {
        trailers.push_str(&format!("X-{index}: v\r\n"));
    }
    let raw = format!("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n1\r\nx\r\n0\r\n{trailers}\r\n");
    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(raw.as_bytes());
    assert_eq!(way.advance().unwrap_err(), ProtocolError::TooManyHeaders(2));
}

#[test]
fn test_folded_header_is_held_to_the_line_limit() {
    let config = ConnectionConfig {
        max_line_bytes: 64,
        ..ConnectionConfig::default()
    };

    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(b"GET / HTTP/1.1\r\nX-A: one\r\n two\r\n\r\n");
    assert_eq!(request(&mut way).header("X-A"), Some("one two"));

    let mut raw = b"GET / HTTP/1.1\r\nX-A: start\r\n".to_vec();
    for _ in 0..10_000 {
        raw.extend_from_slice(b" 0123456789012345678901234567890123456789\r\n");
    }
    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(&raw);
    assert_eq!(way.advance().unwrap_err(), ProtocolError::LineTooLong(64));
}

#[test]
fn test_body_limit() {
    let config = ConnectionConfig {
        max_body_bytes: 4,
        ..ConnectionConfig::default()
    };

    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n");
    assert_eq!(way.advance().unwrap_err(), ProtocolError::BodyTooLarge(4));

    let mut way = InboundWay::new(Role::Server, &config);
    way.push_bytes(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nabcde\r\n0\r\n\r\n");
    assert_eq!(way.advance().unwrap_err(), ProtocolError::BodyTooLarge(4));
}

#[test]
fn test_unknown_transfer_coding_on_request_is_rejected() {
    let mut way = server();
    way.push_bytes(b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");
    assert!(matches!(
        way.advance().unwrap_err(),
        ProtocolError::UnsupportedTransferCoding(_)
    ));
}

#[test]
fn test_response_to_head_has_no_body() {
    let mut way = client();
    way.expect_response(Method::HEAD);
    way.expect_response(Method::GET);
    way.push_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");

    let head = response(&mut way);
    assert!(head.entity.is_none());
    assert_eq!(head.header("Content-Length"), Some("5"));

    let get = response(&mut way);
    assert_eq!(get.body(), b"hello");
}

#[test]
fn test_informational_response_precedes_final_one() {
    let mut way = client();
    way.expect_response(Method::POST);
    way.push_bytes(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n");

    assert_eq!(response(&mut way).status, StatusCode::CONTINUE);
    let last = response(&mut way);
    assert_eq!(last.status, StatusCode::NO_CONTENT);
    assert!(last.entity.is_none());
}

#[test]
fn test_close_delimited_response_ends_at_eof() {
    let mut way = client();
    way.expect_response(Method::GET);
    way.push_bytes(b"HTTP/1.0 200 OK\r\n\r\nstreamed until close");
    assert!(way.advance().unwrap().is_none());

    match way.advance_eof().unwrap() {
        Some(InboundMessage::Response(parsed)) => {
            assert_eq!(parsed.version, "HTTP/1.0");
            assert_eq!(parsed.body(), b"streamed until close");
        }
        other => panic!("expected a response, got {other:?}"),
    }
}

#[test]
fn test_eof_inside_headers_is_an_error() {
    let mut way = server();
    way.push_bytes(b"GET / HTTP/1.1\r\nHost: a");
    assert!(way.advance().unwrap().is_none());
    assert_eq!(way.advance_eof().unwrap_err(), ProtocolError::UnexpectedEof);
}
