//! Conduit - HTTP/1.x connection engine
//!
//! Turns a socket's byte stream into requests, frames bodies, and writes
//! responses back in order, under either a blocking or a reactor I/O
//! discipline.

pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod transport;

pub use config::Config;
pub use error::{Error, PolicyViolation, ProtocolError, Result};
