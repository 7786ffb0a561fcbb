//! The application side of the pending queue.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::http::connection::{Exchange, PendingReceiver};
use crate::http::request::Request;
use crate::http::response::Response;

/// Turns a request into a response.
///
/// Handlers run off the I/O path, so they may block.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Runs the handler for one exchange and sends its response back.
///
/// A panicking handler leaves its responder unanswered, which answers 500.
pub fn answer(handler: &dyn Handler, exchange: Exchange) {
    let (request, responder) = exchange.into_parts();
    let response = handler.handle(&request);
    responder.respond(response);
}

/// Drains the pending queue on a tokio runtime, one blocking task per
/// exchange.
pub async fn run_reactor(mut pending: PendingReceiver, handler: Arc<dyn Handler>) {
    while let Some(exchange) = pending.recv().await {
        let handler = Arc::clone(&handler);
        tokio::task::spawn_blocking(move || answer(&*handler, exchange));
    }
    debug!("pending queue closed, dispatch stopped");
}

/// Starts `threads` workers sharing the pending queue.
///
/// Workers exit once every sender of the queue is gone.
pub fn spawn_workers(
    pending: PendingReceiver,
    handler: Arc<dyn Handler>,
    threads: usize,
) -> io::Result<Vec<JoinHandle<()>>> {
    let pending = Arc::new(Mutex::new(pending));

    (0..threads.max(1))
        .map(|index| {
            let pending = Arc::clone(&pending);
            let handler = Arc::clone(&handler);
            thread::Builder::new()
                .name(format!("conduit-dispatch-{index}"))
                .spawn(move || {
                    loop {
                        let Some(exchange) = pending.lock().blocking_recv() else {
                            break;
                        };
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| answer(&*handler, exchange)));
                        if outcome.is_err() {
                            error!("handler panicked");
                        }
                    }
                    debug!("dispatch worker {index} stopped");
                })
        })
        .collect()
}
