//! In-memory transport for driving connections without sockets.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use conduit::config::ConnectionConfig;
use conduit::http::connection::{Connection, PendingReceiver, pending_queue};
use conduit::transport::{Discipline, Interest, Transport};
use parking_lot::Mutex;

/// What the next read returns.
#[derive(Debug)]
pub enum Step {
    Data(Vec<u8>),
    WouldBlock,
    Eof,
}

/// Scripted reads, captured writes.
///
/// An empty script reads as "would block". `Eof` stays at the front once
/// reached, like a real half-closed socket.
#[derive(Debug)]
pub struct MemoryTransport {
    reads: Mutex<VecDeque<Step>>,
    written: Mutex<Vec<u8>>,
    /// Bytes `try_write` still accepts; `None` is unlimited.
    write_budget: Mutex<Option<usize>>,
    interest: Mutex<Option<Interest>>,
    shutdowns: AtomicUsize,
    discipline: Discipline,
}

impl MemoryTransport {
    pub fn new(discipline: Discipline) -> Arc<Self> {
        Arc::new(Self {
            reads: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            write_budget: Mutex::new(None),
            interest: Mutex::new(None),
            shutdowns: AtomicUsize::new(0),
            discipline,
        })
    }

    pub fn blocking() -> Arc<Self> {
        Self::new(Discipline::Blocking)
    }

    pub fn reactor() -> Arc<Self> {
        Self::new(Discipline::Reactor)
    }

    pub fn push(&self, data: impl AsRef<[u8]>) {
        self.reads.lock().push_back(Step::Data(data.as_ref().to_vec()));
    }

    pub fn push_would_block(&self) {
        self.reads.lock().push_back(Step::WouldBlock);
    }

    pub fn push_eof(&self) {
        self.reads.lock().push_back(Step::Eof);
    }

    pub fn set_write_budget(&self, budget: Option<usize>) {
        *self.write_budget.lock() = budget;
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    pub fn take_interest(&self) -> Option<Interest> {
        self.interest.lock().take()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reads = self.reads.lock();
        match reads.pop_front() {
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    reads.push_front(Step::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::Eof) => {
                reads.push_front(Step::Eof);
                Ok(0)
            }
            Some(Step::WouldBlock) | None => {
                if self.shutdowns() > 0 {
                    Ok(0)
                } else {
                    Err(io::ErrorKind::WouldBlock.into())
                }
            }
        }
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        if self.shutdowns() > 0 {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let mut budget = self.write_budget.lock();
        let n = match *budget {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(left) => {
                let n = left.min(buf.len());
                *budget = Some(left - n);
                n
            }
            None => buf.len(),
        };
        self.written.lock().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn register_interest(&self, interest: Interest) {
        let mut registered = self.interest.lock();
        *registered = Some(match *registered {
            Some(existing) => existing | interest,
            None => interest,
        });
    }

    fn shutdown(&self) -> io::Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn discipline(&self) -> Discipline {
        self.discipline
    }
}

/// An open connection over `transport`, plus the receiving end of its
/// pending queue.
pub fn open(transport: &Arc<MemoryTransport>, config: &ConnectionConfig) -> (Arc<Connection>, PendingReceiver) {
    let (pending, receiver) = pending_queue();
    let connection = Connection::new(transport.clone(), config, pending);
    connection.open();
    (connection, receiver)
}

/// Splits a raw HTTP message into head and body at the blank line.
pub fn split_head(raw: &str) -> (&str, &str) {
    raw.split_once("\r\n\r\n").unwrap_or((raw, ""))
}
