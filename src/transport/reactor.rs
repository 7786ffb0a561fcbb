use std::io;
use std::net::{Shutdown, SocketAddr};

use parking_lot::Mutex;
use socket2::SockRef;
use tokio::io::Ready;
use tokio::net::TcpStream;

use super::{Discipline, Interest, Transport};

/// A tokio socket driven by readiness.
///
/// `try_read`/`try_write` never wait. When they would, the Way registers its
/// interest here and the driver awaits [`ReactorTransport::ready`].
#[derive(Debug)]
pub struct ReactorTransport {
    stream: TcpStream,
    interest: Mutex<Option<Interest>>,
}

impl ReactorTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            interest: Mutex::new(None),
        })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Takes the interest registered since the last call.
    pub fn take_interest(&self) -> Option<Interest> {
        self.interest.lock().take()
    }

    /// Waits until the socket is ready for `interest`.
    pub async fn ready(&self, interest: Interest) -> io::Result<Ready> {
        self.stream.ready(interest).await
    }
}

impl Transport for ReactorTransport {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.stream.try_write(buf)
    }

    fn register_interest(&self, interest: Interest) {
        let mut registered = self.interest.lock();
        *registered = Some(match *registered {
            Some(existing) => existing | interest,
            None => interest,
        });
    }

    fn shutdown(&self) -> io::Result<()> {
        SockRef::from(&self.stream).shutdown(Shutdown::Both)
    }

    fn discipline(&self) -> Discipline {
        Discipline::Reactor
    }
}
