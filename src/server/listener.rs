use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::http::connection::Connection;
use crate::server::dispatch::Dispatcher;
use crate::session;

/// Accepts connections forever, one task per connection.
pub async fn run(cfg: &ServerConfig, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", cfg.listen_addr);
    serve(listener, cfg.clone(), dispatcher).await
}

/// Runs the accept loop on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    cfg: ServerConfig,
    dispatcher: Arc<Dispatcher>,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let limits = cfg.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer, limits, dispatcher);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

/// Starts periodic session housekeeping in the background.
pub fn spawn_sweeper(dispatcher: &Dispatcher, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(session::run_sweeper(dispatcher.sessions().clone(), every))
}
