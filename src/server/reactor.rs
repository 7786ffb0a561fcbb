use std::io;
use std::sync::Arc;

use tracing::debug;

use crate::http::connection::{Connection, ConnectionState};
use crate::transport::{Interest, ReactorTransport};

/// Drives one connection until it is closed.
///
/// Each turn reads and writes as far as the socket allows, then sleeps until
/// the socket becomes ready for what was registered or the connection is
/// signalled (a response was queued, reading may resume).
pub async fn serve(connection: Arc<Connection>, transport: Arc<ReactorTransport>) {
    connection.open();

    while connection.state() != ConnectionState::Closed {
        // Errors close the connection; they are logged where they happen.
        let _ = connection.read_messages();
        let _ = connection.write_messages();

        if connection.state() == ConnectionState::Closed {
            break;
        }

        let interest = transport.take_interest();
        tokio::select! {
            ready = readiness(&transport, interest) => {
                if let Err(error) = ready {
                    debug!(connection = %connection.id(), %error, "readiness failed");
                    connection.close(false);
                }
            }
            _ = connection.notified() => {}
        }
    }

    debug!(connection = %connection.id(), "connection task done");
}

async fn readiness(transport: &ReactorTransport, interest: Option<Interest>) -> io::Result<()> {
    match interest {
        Some(interest) => transport.ready(interest).await.map(drop),
        None => std::future::pending().await,
    }
}
