//! A live connection: two Ways, the queues between them and the dispatch
//! layer, and the lifecycle.
//!
//! ```text
//!   OPENING ──open()──▶ OPEN ──close(true) / Connection: close──▶ CLOSING
//!                         │                                          │
//!                         └──────── close(false) / error ───────────▶│
//!                                                                    ▼
//!                                            queues drained ──▶ CLOSED
//! ```
//!
//! Requests get a sequence number when parsed. Responses may come back from
//! the dispatch layer in any order; the outbound side only takes the one
//! whose number is at the front of the inbound queue, which keeps replies
//! in request order with or without pipelining.
//!
//! Each Way is advanced by whoever wins its busy flag. The flags and both
//! queues sit behind one short lock that is never held across I/O.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::Error;
use crate::http::inbound::{InboundMessage, InboundWay, Role};
use crate::http::outbound::OutboundWay;
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::transport::{Discipline, Transport};

/// Fallback wake-up for blocking readers, in case a state change raced
/// with the wait.
const WAIT_SLICE: Duration = Duration::from_millis(250);

/// Process-unique connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Opening = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Opening,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Why a read step returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadProgress {
    /// The transport ran dry; resume when it is readable.
    Suspended,
    /// Reading is held back: the connection is busy answering, closing, or
    /// another context is reading.
    Paused,
    /// The peer closed its side.
    Eof,
}

/// Why a write step returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Nothing left that may be written now.
    Idle,
    /// The transport can't take more; resume when it is writable.
    Blocked,
    /// Another context is writing.
    Busy,
}

/// A response waiting for its turn on the wire.
#[derive(Debug)]
pub(crate) struct Outgoing {
    pub seq: u64,
    pub method: Method,
    pub version: String,
    pub target: String,
    /// Whether the request allowed the connection to stay open.
    pub keep_alive: bool,
    pub response: Response,
}

#[derive(Debug, Default)]
struct Queues {
    /// Sequence numbers of requests still owed a response, in arrival order.
    inbound: VecDeque<u64>,
    /// Responses handed back, sorted by sequence number.
    outbound: VecDeque<Outgoing>,
    inbound_busy: bool,
    outbound_busy: bool,
    next_seq: u64,
}

impl Queues {
    fn next_writable(&self) -> bool {
        matches!(
            (self.outbound.front(), self.inbound.front()),
            (Some(outgoing), Some(&seq)) if outgoing.seq == seq
        )
    }

    fn is_drained(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty() && !self.outbound_busy
    }
}

/// The sending half of the queue shared by all connections of a server.
pub type PendingQueue = mpsc::UnboundedSender<Exchange>;

/// The receiving half, drained by the dispatch layer.
pub type PendingReceiver = mpsc::UnboundedReceiver<Exchange>;

/// Creates the pending-dispatch queue.
pub fn pending_queue() -> (PendingQueue, PendingReceiver) {
    mpsc::unbounded_channel()
}

pub struct Connection {
    id: ConnectionId,
    weak: Weak<Connection>,
    transport: Arc<dyn Transport>,
    state: AtomicU8,
    persistent: AtomicBool,
    pipelining: bool,
    queues: Mutex<Queues>,
    inbound: Mutex<InboundWay>,
    outbound: Mutex<OutboundWay>,
    pending: PendingQueue,
    ready: Condvar,
    notify: Notify,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>, config: &ConnectionConfig, pending: PendingQueue) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id: ConnectionId::next(),
            weak: weak.clone(),
            transport,
            state: AtomicU8::new(ConnectionState::Opening as u8),
            persistent: AtomicBool::new(config.persistent),
            pipelining: config.pipelining,
            queues: Mutex::new(Queues::default()),
            inbound: Mutex::new(InboundWay::attached(weak.clone(), Role::Server, config)),
            outbound: Mutex::new(OutboundWay::new(weak.clone(), config)),
            pending,
            ready: Condvar::new(),
            notify: Notify::new(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Acquire)
    }

    pub fn is_pipelining(&self) -> bool {
        self.pipelining
    }

    pub fn discipline(&self) -> Discipline {
        self.transport.discipline()
    }

    /// Marks the connection ready for traffic.
    pub fn open(&self) {
        let opened = self
            .state
            .compare_exchange(
                ConnectionState::Opening as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if opened {
            debug!(connection = %self.id, "connection open");
        }
    }

    /// Requests still owed a response.
    pub fn outstanding(&self) -> usize {
        self.queues.lock().inbound.len()
    }

    /// Moves the state forward, never back. Returns the previous state.
    fn advance_state(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.state.fetch_max(state as u8, Ordering::AcqRel))
    }

    /// Wakes whichever driver waits on this connection.
    fn signal(&self) {
        self.ready.notify_all();
        self.notify.notify_one();
    }

    /// Waits until a reactor driver has something to do.
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    /// Blocks until reading may resume. Returns `false` once it never will.
    pub fn wait_readable(&self) -> bool {
        let mut queues = self.queues.lock();
        loop {
            if self.state() != ConnectionState::Open {
                return false;
            }
            if !queues.inbound_busy && (self.pipelining || queues.inbound.is_empty()) {
                return true;
            }
            self.ready.wait_for(&mut queues, WAIT_SLICE);
        }
    }

    /// Blocks until the connection has reached [`ConnectionState::Closed`].
    pub fn wait_closed(&self) {
        let mut queues = self.queues.lock();
        while self.state() != ConnectionState::Closed {
            self.ready.wait_for(&mut queues, WAIT_SLICE);
        }
    }

    /// Whether the reader should go on parsing after handing off a message.
    pub(crate) fn may_keep_reading(&self) -> bool {
        self.state() == ConnectionState::Open
            && (self.pipelining || self.queues.lock().inbound.is_empty())
    }

    /// Takes a message completed by the inbound Way.
    pub(crate) fn accept(&self, message: InboundMessage) {
        let request = match message {
            InboundMessage::Request(request) => request,
            InboundMessage::Response(response) => {
                warn!(connection = %self.id, status = %response.status, "unexpected response from peer, ignoring it");
                return;
            }
        };

        // Earlier responses keep their own persistence; only this request's
        // response announces the close.
        let keep_alive = request.keep_alive();
        if !keep_alive && self.advance_state(ConnectionState::Closing) == ConnectionState::Open {
            debug!(connection = %self.id, "peer asked to close after this exchange");
        }

        let seq = {
            let mut queues = self.queues.lock();
            let seq = queues.next_seq;
            queues.next_seq += 1;
            if request.expects_response() {
                queues.inbound.push_back(seq);
            }
            seq
        };

        let target = request.describe();
        debug!(connection = %self.id, method = %request.method, resource = %target, "request received");

        let responder = Responder {
            connection: self.weak.clone(),
            seq,
            method: request.method.clone(),
            version: request.version.clone(),
            target,
            keep_alive,
            answered: !request.expects_response(),
        };

        if let Err(mpsc::error::SendError(exchange)) = self.pending.send(Exchange { request, responder }) {
            warn!(connection = %self.id, "dispatch queue is gone");
            // Answered with a 500 by the responder's drop.
            drop(exchange);
        }
    }

    /// Parses whatever the transport has, handing complete requests to the
    /// dispatch queue.
    ///
    /// A protocol or transport error closes the connection at once, without
    /// a response. End of stream starts a graceful close.
    pub fn read_messages(&self) -> Result<ReadProgress, Error> {
        {
            let mut queues = self.queues.lock();
            let may_read = self.state() == ConnectionState::Open
                && !queues.inbound_busy
                && (self.pipelining || queues.inbound.is_empty());
            if !may_read {
                return Ok(ReadProgress::Paused);
            }
            queues.inbound_busy = true;
        }

        let result = {
            let mut way = self.inbound.lock();
            let result = way.read_messages(&*self.transport);
            if result.is_err() {
                way.abort();
            }
            result
        };
        self.queues.lock().inbound_busy = false;

        match result {
            Ok(ReadProgress::Eof) => {
                self.close(true);
                Ok(ReadProgress::Eof)
            }
            Ok(progress) => Ok(progress),
            Err(e) => {
                match &e {
                    Error::Protocol(error) => {
                        warn!(connection = %self.id, %error, "malformed request, closing connection")
                    }
                    error => debug!(connection = %self.id, %error, "read failed, closing connection"),
                }
                self.close(false);
                Err(e)
            }
        }
    }

    /// Writes queued responses that are next in line.
    ///
    /// Safe to call from any context; a caller that finds another context
    /// writing gets [`WriteProgress::Busy`] and leaves the work to it.
    pub fn write_messages(&self) -> Result<WriteProgress, Error> {
        loop {
            {
                let mut queues = self.queues.lock();
                if queues.outbound_busy {
                    return Ok(WriteProgress::Busy);
                }
                if self.state() == ConnectionState::Closed {
                    return Ok(WriteProgress::Idle);
                }
                queues.outbound_busy = true;
            }

            let result = self.outbound.lock().write_messages(&*self.transport);

            let more = {
                let mut queues = self.queues.lock();
                queues.outbound_busy = false;
                queues.next_writable()
            };
            self.signal();

            match result {
                Ok(WriteProgress::Idle) => {
                    self.finish_closing();
                    if !more {
                        return Ok(WriteProgress::Idle);
                    }
                }
                Ok(progress) => return Ok(progress),
                Err(e) => {
                    warn!(connection = %self.id, error = %e, "failed to write response, closing connection");
                    self.close(false);
                    return Err(e);
                }
            }
        }
    }

    /// Queues a response, keeping the outbound queue in request order.
    pub(crate) fn enqueue(&self, outgoing: Outgoing) {
        let rejected = {
            let mut queues = self.queues.lock();
            if self.state() == ConnectionState::Closed {
                Some(outgoing)
            } else {
                let at = queues
                    .outbound
                    .iter()
                    .position(|queued| queued.seq > outgoing.seq)
                    .unwrap_or(queues.outbound.len());
                queues.outbound.insert(at, outgoing);
                None
            }
        };

        if let Some(outgoing) = rejected {
            debug!(connection = %self.id, resource = %outgoing.target, "connection closed, discarding response");
        }
    }

    /// Pops the next response if its request is the oldest unanswered one.
    pub(crate) fn next_outgoing(&self) -> Option<Outgoing> {
        let mut queues = self.queues.lock();
        if queues.next_writable() {
            queues.outbound.pop_front()
        } else {
            None
        }
    }

    /// Records that the response to request `seq` is fully written.
    ///
    /// A response that announced `Connection: close` is the last one on the
    /// wire: the socket is released and anything still owed is discarded.
    pub(crate) fn response_written(&self, seq: u64, persistent: bool) {
        {
            let mut queues = self.queues.lock();
            if queues.inbound.front() == Some(&seq) {
                queues.inbound.pop_front();
            }
        }
        if !persistent {
            self.persistent.store(false, Ordering::Release);
            debug!(connection = %self.id, "non-persistent exchange done, closing");
            self.finalize();
            return;
        }
        self.signal();
    }

    /// Closes the connection.
    ///
    /// Graceful closes stop reading and let queued responses go out first;
    /// the socket is released once nothing is owed. A hard close releases it
    /// right away and discards whatever is still queued. Idempotent.
    pub fn close(&self, graceful: bool) {
        if !graceful {
            self.finalize();
            return;
        }

        let previous = self.advance_state(ConnectionState::Closing);
        if previous < ConnectionState::Closing {
            debug!(connection = %self.id, "closing connection");
        }
        self.finish_closing();
        self.signal();
    }

    fn finish_closing(&self) {
        if self.state() == ConnectionState::Closing && self.queues.lock().is_drained() {
            self.finalize();
        }
    }

    fn finalize(&self) {
        if self.advance_state(ConnectionState::Closed) == ConnectionState::Closed {
            return;
        }

        if let Err(error) = self.transport.shutdown() {
            debug!(connection = %self.id, %error, "socket shutdown failed");
        }

        let abandoned: Vec<Outgoing> = {
            let mut queues = self.queues.lock();
            queues.inbound.clear();
            queues.outbound.drain(..).collect()
        };
        if !abandoned.is_empty() {
            debug!(connection = %self.id, count = abandoned.len(), "dropping unwritten responses");
        }
        // Entities are released here, outside the lock.
        drop(abandoned);

        self.signal();
        debug!(connection = %self.id, "connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("persistent", &self.is_persistent())
            .field("pipelining", &self.pipelining)
            .finish()
    }
}

/// The right to answer one request.
///
/// Dropping it unanswered sends a 500, so later responses on the same
/// connection aren't held up forever.
#[derive(Debug)]
pub struct Responder {
    connection: Weak<Connection>,
    seq: u64,
    method: Method,
    version: String,
    target: String,
    keep_alive: bool,
    answered: bool,
}

impl Responder {
    /// Queues the response for writing.
    ///
    /// Under the blocking discipline it is written on the calling thread;
    /// under the reactor discipline the connection's task is woken.
    pub fn respond(mut self, response: Response) {
        self.answered = true;
        self.deliver(response, false);
    }

    /// Queues the response and writes it right away.
    pub fn commit(mut self, response: Response) {
        self.answered = true;
        self.deliver(response, true);
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn deliver(&self, response: Response, expedite: bool) {
        let Some(connection) = self.connection.upgrade() else {
            debug!(resource = %self.target, "connection is gone, dropping response");
            return;
        };

        connection.enqueue(Outgoing {
            seq: self.seq,
            method: self.method.clone(),
            version: self.version.clone(),
            target: self.target.clone(),
            keep_alive: self.keep_alive,
            response,
        });

        if expedite || connection.discipline() == Discipline::Blocking {
            // Failures close the connection and are logged there.
            let _ = connection.write_messages();
        } else {
            connection.signal();
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if !self.answered {
            self.answered = true;
            warn!(resource = %self.target, "request dropped without a response, answering 500");
            self.deliver(Response::internal_error(), false);
        }
    }
}

/// A parsed request together with the means to answer it.
#[derive(Debug)]
pub struct Exchange {
    request: Request,
    responder: Responder,
}

impl Exchange {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_parts(self) -> (Request, Responder) {
        (self.request, self.responder)
    }

    pub fn respond(self, response: Response) {
        self.responder.respond(response);
    }

    pub fn commit(self, response: Response) {
        self.responder.commit(response);
    }
}
