use std::sync::Arc;

use conduit::config::Config;
use conduit::http::connection::pending_queue;
use conduit::http::entity::Entity;
use conduit::http::request::{Method, Request};
use conduit::http::response::{Response, StatusCode};
use conduit::server::{self, Handler, dispatch, listener};
use conduit::transport::Discipline;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let handler: Arc<dyn Handler> = Arc::new(demo);

    match cfg.server.discipline {
        Discipline::Blocking => server::blocking::run(&cfg, handler),
        Discipline::Reactor => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(cfg.server.io_threads.max(1))
                .enable_all()
                .build()?;

            runtime.block_on(async {
                let (pending, receiver) = pending_queue();
                tokio::spawn(dispatch::run_reactor(receiver, handler));

                tokio::select! {
                    res = listener::run(&cfg, pending) => {
                        res?;
                    }

                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                    }
                }

                Ok::<_, anyhow::Error>(())
            })
        }
    }
}

/// Greets GETs and echoes request bodies back.
fn demo(request: &Request) -> Response {
    match (&request.method, &request.entity) {
        (Method::POST | Method::PUT, Some(entity)) => {
            let mut echo = Entity::from_bytes(request.body().to_vec());
            if let Some(media_type) = entity.media_type() {
                echo = echo.with_media_type(media_type);
            }
            Response::new(StatusCode::OK).entity(echo).build()
        }
        (Method::GET | Method::HEAD, _) => Response::ok("Hello from conduit\n"),
        _ => Response::new(StatusCode::NO_CONTENT).build(),
    }
}
