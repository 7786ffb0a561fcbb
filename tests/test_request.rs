use conduit::http::entity::Entity;
use conduit::http::request::{Method, RequestBuilder};

#[test]
fn test_request_header_retrieval() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_builder_defaults() {
    let req = RequestBuilder::new().method(Method::GET).build().unwrap();

    assert_eq!(req.target, "/");
    assert_eq!(req.version, "HTTP/1.1");
    assert!(req.entity.is_none());
    assert!(RequestBuilder::new().build().is_err());
}

#[test]
fn test_request_content_length_parsing() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .header("Content-Length", "42")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing_or_invalid() {
    let missing = RequestBuilder::new().method(Method::GET).build().unwrap();
    assert_eq!(missing.content_length(), 0);

    let invalid = RequestBuilder::new()
        .method(Method::POST)
        .header("Content-Length", "not-a-number")
        .build()
        .unwrap();
    assert_eq!(invalid.content_length(), 0);
}

#[test]
fn test_request_keep_alive_http11_default() {
    // HTTP/1.1 defaults to keep-alive
    let req = RequestBuilder::new().method(Method::GET).build().unwrap();
    assert!(req.keep_alive());
}

#[test]
fn test_request_keep_alive_connection_close() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .header("Connection", "Upgrade, Close")
        .build()
        .unwrap();
    assert!(!req.keep_alive());
}

#[test]
fn test_request_keep_alive_http10() {
    // HTTP/1.0 closes unless asked otherwise
    let plain = RequestBuilder::new()
        .method(Method::GET)
        .version("HTTP/1.0")
        .build()
        .unwrap();
    assert!(!plain.keep_alive());

    let asked = RequestBuilder::new()
        .method(Method::GET)
        .version("HTTP/1.0")
        .header("Connection", "keep-alive")
        .build()
        .unwrap();
    assert!(asked.keep_alive());
}

#[test]
fn test_request_body_from_entity() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .entity(Entity::from_bytes("payload"))
        .build()
        .unwrap();

    assert_eq!(req.body(), b"payload");
    assert!(req.expects_response());
}

#[test]
fn test_request_resource_ref() {
    let relative = RequestBuilder::new()
        .method(Method::GET)
        .target("/a/b?c=d")
        .header("Host", "example.com:8080")
        .build()
        .unwrap();
    assert_eq!(
        relative.resource_ref().unwrap().as_str(),
        "http://example.com:8080/a/b?c=d"
    );

    let absolute = RequestBuilder::new()
        .method(Method::GET)
        .target("http://other.test/x")
        .build()
        .unwrap();
    assert_eq!(absolute.resource_ref().unwrap().host_str(), Some("other.test"));

    let hostless = RequestBuilder::new().method(Method::GET).build().unwrap();
    assert!(hostless.resource_ref().is_none());
}

#[test]
fn test_method_display() {
    assert_eq!(Method::DELETE.to_string(), "DELETE");
    assert_eq!(Method::Extension("MKCOL".into()).to_string(), "MKCOL");
    assert!(Method::HEAD.is_head());
    assert!(!Method::GET.is_head());
}
