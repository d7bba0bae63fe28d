use std::sync::Arc;
use std::time::Duration;

use lodge::clock::{Clock, SystemClock};
use lodge::config::Config;
use lodge::content::ContentResolver;
use lodge::http::request::{Method, Request};
use lodge::http::response::{Response, ResponseBuilder, StatusCode};
use lodge::http::router::Router;
use lodge::server::{Dispatcher, listener};
use lodge::session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sessions = session::open_store(&cfg.session, clock.clone()).await?;
    let dispatcher = Arc::new(
        Dispatcher::new(
            ContentResolver::new(&cfg.content.base_dir),
            sessions,
            cfg.auth.clone(),
            clock,
        )
        .with_router(routes()),
    );

    let sweeper = listener::spawn_sweeper(
        &dispatcher,
        Duration::from_secs(cfg.session.sweep_interval_secs.max(1)),
    );

    tokio::select! {
        res = listener::run(&cfg.server, dispatcher) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    sweeper.abort();
    Ok(())
}

fn routes() -> Router {
    Router::new().route(Method::PUT, "/hello", hello)
}

/// Greets whoever is named in the form body.
fn hello(request: &Request) -> Response {
    let mut fields: Vec<_> = request.form().into_iter().collect();
    fields.sort();

    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .header("Connection", "close")
        .body(format!("Hello\n{}", body))
        .build()
}
