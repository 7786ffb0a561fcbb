//! HTTP/1.x protocol engine.
//!
//! # Architecture
//!
//! - **`headers`**, **`request`**, **`response`**, **`entity`**: the message model
//! - **`framing`**: decides how a message body is delimited
//! - **`body`**: readers and writers for each framing mode
//! - **`parser`**, **`writer`**: the line grammar, both directions
//! - **`way`**: buffer and line handling shared by both directions
//! - **`inbound`**: the parsing state machine
//! - **`outbound`**: the response-writing policy
//! - **`connection`**: ties both Ways to a transport and the dispatch queue
//!
//! # Message State Machine
//!
//! Both Ways walk every message through the same states:
//!
//! ```text
//!        ┌─────────────┐
//!        │  StartLine  │ ← Request or status line
//!        └──────┬──────┘
//!               │
//!               ▼
//!        ┌─────────────┐
//!        │   Headers   │ ← Until the blank line; framing is resolved here
//!        └──────┬──────┘
//!               │
//!               ▼
//!        ┌─────────────┐
//!        │    Body     │ ← Skipped when there is no entity
//!        └──────┬──────┘
//!               │
//!               ▼
//!        ┌─────────────┐
//!        │     End     │ ← Message handed off, back to StartLine
//!        └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use conduit::http::parser::parse_request;
//!
//! let (request, used) = parse_request(b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(request.target, "/x");
//! assert_eq!(used, 28);
//! ```

pub mod body;
pub mod connection;
pub mod entity;
pub mod framing;
pub mod headers;
pub mod inbound;
pub mod outbound;
pub mod parser;
pub mod request;
pub mod response;
pub mod way;
pub mod writer;
