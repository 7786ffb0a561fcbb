//! Socket abstraction shared by both scheduling disciplines.
//!
//! The Ways only ever call [`Transport::try_read`], [`Transport::try_write`]
//! and [`Transport::register_interest`]. A blocking transport waits inside
//! those calls; a reactor transport returns
//! [`std::io::ErrorKind::WouldBlock`] instead and remembers which readiness
//! the driver has to wait for. An `Ok(0)` read always means the peer closed
//! its side, never "no data right now".

pub mod blocking;
pub mod reactor;

use std::io;

use serde::Deserialize;
pub use tokio::io::Interest;

pub use blocking::BlockingTransport;
pub use reactor::ReactorTransport;

/// How a connection is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// One thread per connection, suspended inside blocking socket calls.
    Blocking,
    /// A small pool of tasks woken by socket readiness.
    #[default]
    Reactor,
}

pub trait Transport: Send + Sync {
    /// Reads into `buf`. `Ok(0)` is end of stream.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes from `buf`, returning how much was accepted.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Records that progress is waiting on `interest`.
    fn register_interest(&self, interest: Interest);

    /// Shuts down both directions of the socket.
    fn shutdown(&self) -> io::Result<()>;

    fn discipline(&self) -> Discipline;
}
