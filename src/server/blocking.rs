use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use tracing::{info, info_span, warn};

use crate::config::{Config, ConnectionConfig};
use crate::http::connection::{Connection, PendingQueue, pending_queue};
use crate::server::dispatch::{self, Handler};
use crate::transport::BlockingTransport;

/// Binds the configured address and serves it with a thread per
/// connection.
pub fn run(cfg: &Config, handler: Arc<dyn Handler>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr)
        .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;
    info!("Listening on {} (blocking)", listener.local_addr()?);

    let (pending, receiver) = pending_queue();
    dispatch::spawn_workers(receiver, handler, cfg.server.dispatch_threads)
        .context("failed to start dispatch workers")?;

    serve(listener, &cfg.connection, pending)
}

/// Accepts connections until the listener fails.
pub fn serve(listener: TcpListener, config: &ConnectionConfig, pending: PendingQueue) -> anyhow::Result<()> {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                warn!(%error, "accept failed");
                continue;
            }
        };

        let transport = match BlockingTransport::new(stream) {
            Ok(transport) => Arc::new(transport),
            Err(error) => {
                warn!(%error, "failed to set up connection");
                continue;
            }
        };
        let peer = match transport.peer_addr() {
            Ok(peer) => peer,
            Err(error) => {
                warn!(%error, "peer went away before the connection was set up");
                continue;
            }
        };
        let connection = Connection::new(transport, config, pending.clone());
        info!(connection = %connection.id(), %peer, "Accepted connection");

        let span = info_span!("connection", id = %connection.id(), %peer);
        thread::Builder::new()
            .name(format!("conduit-conn-{}", connection.id()))
            .spawn(move || span.in_scope(|| serve_connection(connection)))
            .context("failed to spawn connection thread")?;
    }
    Ok(())
}

/// Reads requests on the calling thread until the connection is done.
///
/// Responses are written by whichever thread answers; this one only waits
/// for its turn to read again and, at the end, for the drain to finish.
pub fn serve_connection(connection: Arc<Connection>) {
    connection.open();

    loop {
        // Errors close the connection; they are logged where they happen.
        if connection.read_messages().is_err() {
            break;
        }
        if !connection.wait_readable() {
            break;
        }
    }

    connection.wait_closed();
}
