use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{Instrument, info, info_span, warn};

use crate::config::{Config, ConnectionConfig};
use crate::http::connection::{Connection, PendingQueue};
use crate::server::reactor;
use crate::transport::ReactorTransport;

/// Binds the configured address and serves it under the reactor discipline.
pub async fn run(cfg: &Config, pending: PendingQueue) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;
    info!("Listening on {} (reactor)", listener.local_addr()?);

    serve(listener, cfg.connection.clone(), pending).await
}

/// Accepts connections forever, one task each.
pub async fn serve(listener: TcpListener, config: ConnectionConfig, pending: PendingQueue) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await.context("accept failed")?;

        let transport = match ReactorTransport::new(socket) {
            Ok(transport) => Arc::new(transport),
            Err(error) => {
                warn!(%peer, %error, "failed to set up connection");
                continue;
            }
        };

        let connection = Connection::new(transport.clone(), &config, pending.clone());
        info!(connection = %connection.id(), %peer, "Accepted connection");

        let span = info_span!("connection", id = %connection.id(), %peer);
        tokio::spawn(reactor::serve(connection, transport).instrument(span));
    }
}
