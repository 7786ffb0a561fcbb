use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use super::{Discipline, Interest, Transport};

/// A std socket in blocking mode; reads and writes park the calling thread.
#[derive(Debug)]
pub struct BlockingTransport {
    stream: TcpStream,
}

impl BlockingTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl Transport for BlockingTransport {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.stream).write(buf)
    }

    fn flush(&self) -> io::Result<()> {
        (&self.stream).flush()
    }

    fn register_interest(&self, _interest: Interest) {}

    fn shutdown(&self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }

    fn discipline(&self) -> Discipline {
        Discipline::Blocking
    }
}
