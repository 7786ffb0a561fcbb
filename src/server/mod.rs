//! Drivers that put connections on sockets.
//!
//! The protocol work happens in [`crate::http::connection::Connection`];
//! these modules only decide who calls it and when. The reactor drivers
//! live on a tokio runtime, the blocking ones on plain threads.

pub mod blocking;
pub mod dispatch;
pub mod listener;
pub mod reactor;

pub use dispatch::Handler;
