//! Serving the supervisor API.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{api, Supervisor};

/// Serve the API on `listener` until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    supervisor: Arc<Supervisor>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = api::router(supervisor);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let mut shutdown = shutdown;
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("HTTP server shutting down");
        })
        .await
}

/// A server running on a background task.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    /// Bind `addr` and serve on a background task.
    pub async fn spawn(addr: SocketAddr, supervisor: Arc<Supervisor>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(serve(listener, supervisor, shutdown_rx));
        info!(addr = %addr, "Listening for assignment pushes");

        Ok(Self {
            addr,
            shutdown_tx,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal graceful shutdown and wait for the server task.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        match self.handle.await {
            Ok(Ok(())) => info!("Server exited normally"),
            Ok(Err(e)) => error!(error = %e, "Server error"),
            Err(e) => error!(error = %e, "Server task panicked"),
        }
    }
}
