//! Gateway lifecycle.
//!
//! Owns the two listeners that serve the same logical store: the binary
//! gRPC listener at the configured address and the JSON/HTTP bridge at the
//! same host with the port shifted by a fixed offset.

use crate::http;
use crate::kv::KvService;
use crate::proto::kv_server::KvServer;
use crate::store::StoreAdapter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

/// Fixed offset between the binary port and the HTTP bridge port. Part of
/// the gateway's contract: callers derive the HTTP address from the binary
/// one.
pub const HTTP_PORT_OFFSET: u16 = 10_000;

/// Bound on graceful shutdown: in-flight work gets this long to drain
/// before the listeners are forced closed.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Dual-listener gateway over a pluggable store.
///
/// `start` binds both listeners and serves them on background tasks;
/// `shutdown` drains them under a bounded deadline. Both are safe to call
/// on a gateway that never started.
pub struct Gateway {
    bind_addr: SocketAddr,
    store: Arc<dyn StoreAdapter>,
    grpc_addr: Option<SocketAddr>,
    http_addr: Option<SocketAddr>,
    grpc_shutdown: Option<oneshot::Sender<()>>,
    http_shutdown: Option<oneshot::Sender<()>>,
    grpc_handle: Option<JoinHandle<Result<(), tonic::transport::Error>>>,
    http_handle: Option<JoinHandle<Result<(), std::io::Error>>>,
}

impl Gateway {
    /// Create a gateway that will bind its binary listener at `bind_addr`.
    pub fn new(bind_addr: SocketAddr, store: Arc<dyn StoreAdapter>) -> Self {
        Self {
            bind_addr,
            store,
            grpc_addr: None,
            http_addr: None,
            grpc_shutdown: None,
            http_shutdown: None,
            grpc_handle: None,
            http_handle: None,
        }
    }

    /// Bind both listeners and start serving in the background.
    ///
    /// Bind failures surface synchronously here; a failure to serve after a
    /// successful bind is a fatal operational condition and is logged by
    /// the serving task. If the HTTP side fails to come up, the already
    /// started binary listener is torn down before returning.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        // Bind first so the bound address is known even when the caller
        // asked for port 0.
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| GatewayError::Bind(self.bind_addr, e))?;
        let grpc_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(self.bind_addr, e))?;

        tracing::info!(%grpc_addr, "starting binary listener");

        let kv_service = KvService::new(self.store.clone());
        let (grpc_tx, grpc_rx) = oneshot::channel::<()>();
        let incoming = TcpListenerStream::new(listener);
        let server = Server::builder()
            .add_service(KvServer::new(kv_service))
            .serve_with_incoming_shutdown(incoming, async {
                grpc_rx.await.ok();
            });

        let grpc_handle = tokio::spawn(async move {
            let result = server.await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "binary listener serve failed");
            }
            result
        });

        self.grpc_addr = Some(grpc_addr);
        self.grpc_shutdown = Some(grpc_tx);
        self.grpc_handle = Some(grpc_handle);

        // The bridge binds the same host with the port shifted by the
        // fixed offset, derived from the actually bound port.
        let http_bind = match grpc_addr.port().checked_add(HTTP_PORT_OFFSET) {
            Some(port) => SocketAddr::new(grpc_addr.ip(), port),
            None => {
                let _ = self.shutdown().await;
                return Err(GatewayError::DerivedPortOutOfRange(grpc_addr));
            }
        };

        let http_listener = match TcpListener::bind(http_bind).await {
            Ok(l) => l,
            Err(e) => {
                let _ = self.shutdown().await;
                return Err(GatewayError::Bind(http_bind, e));
            }
        };
        let http_addr = match http_listener.local_addr() {
            Ok(a) => a,
            Err(e) => {
                let _ = self.shutdown().await;
                return Err(GatewayError::Bind(http_bind, e));
            }
        };

        tracing::info!(%http_addr, "starting http bridge");

        let app = http::router(grpc_addr);
        let (http_tx, http_rx) = oneshot::channel::<()>();
        let http_handle = tokio::spawn(async move {
            let result = axum::serve(http_listener, app)
                .with_graceful_shutdown(async {
                    http_rx.await.ok();
                })
                .await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "http bridge serve failed");
            }
            result
        });

        self.http_addr = Some(http_addr);
        self.http_shutdown = Some(http_tx);
        self.http_handle = Some(http_handle);

        tracing::info!(%grpc_addr, %http_addr, "gateway started");
        Ok(())
    }

    /// Gracefully stop both listeners: refuse new work, let in-flight
    /// calls finish, force-close whatever is still running once the
    /// deadline expires. Idempotent, and a no-op on a gateway that never
    /// started.
    pub async fn shutdown(&mut self) -> Result<(), GatewayError> {
        if let Some(tx) = self.grpc_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self.http_shutdown.take() {
            let _ = tx.send(());
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_DEADLINE;
        let mut timed_out = false;

        if let Some(mut handle) = self.grpc_handle.take() {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "binary listener task failed during shutdown")
                }
                Err(_) => {
                    tracing::warn!("binary listener did not drain in time, aborting");
                    handle.abort();
                    timed_out = true;
                }
            }
        }

        if let Some(mut handle) = self.http_handle.take() {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "http bridge task failed during shutdown")
                }
                Err(_) => {
                    tracing::warn!("http bridge did not drain in time, aborting");
                    handle.abort();
                    timed_out = true;
                }
            }
        }

        self.grpc_addr = None;
        self.http_addr = None;

        if timed_out {
            return Err(GatewayError::ShutdownTimeout(SHUTDOWN_DEADLINE));
        }

        tracing::info!("gateway shutdown complete");
        Ok(())
    }

    /// Bound address of the binary listener.
    pub fn addr(&self) -> Result<SocketAddr, GatewayError> {
        self.grpc_addr.ok_or(GatewayError::NotStarted)
    }

    /// Bound address of the HTTP bridge.
    pub fn http_addr(&self) -> Result<SocketAddr, GatewayError> {
        self.http_addr.ok_or(GatewayError::NotStarted)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to bind {0}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("derived http port out of range for binary listener at {0}")]
    DerivedPortOutOfRange(SocketAddr),

    #[error("gateway is not running")]
    NotStarted,

    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}
