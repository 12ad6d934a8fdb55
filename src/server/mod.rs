//! Serial TCP server using Tokio.
//!
//! Accepts one connection at a time and services it completely (read, parse,
//! dispatch, write, close) before accepting the next. The workload is a handful
//! of status and chart requests, so the loop trades throughput for a design in
//! which the route table and statistics never see concurrent writers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::router::Router;
use crate::stats::Statistics;

mod connection;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
struct ShutdownState {
    stop: AtomicBool,
    wake: Notify,
}

/// Cooperative stop signal for a running [`Server`].
///
/// The flag is checked between connections, and a pending `accept` is woken so
/// the loop does not wait for another client to arrive. A request that is
/// already being dispatched is always finished.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    state: Arc<ShutdownState>,
}

impl ShutdownHandle {
    /// Asks the server to stop after the connection it is currently serving.
    pub fn shutdown(&self) {
        self.state.stop.store(true, Ordering::SeqCst);
        self.state.wake.notify_one();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.state.stop.load(Ordering::SeqCst)
    }
}

/// The pingmon status server.
///
/// # Examples
///
/// ```rust,no_run
/// use pingmon::config::ServerConfig;
/// use pingmon::http::{QueryParams, Response, StatusCode};
/// use pingmon::router::Router;
/// use pingmon::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.get(&["hello"], |_params: QueryParams| async {
///         Ok(Response::text(StatusCode::OK, "Hello, world!"))
///     })?;
///
///     let server = Server::bind(ServerConfig::default()).await?;
///     server.run(router).await;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    statistics: Arc<Statistics>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Binds the server to `config.bind`.
    ///
    /// Binding to port `0` picks a free port; see [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.bind.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config,
            statistics: Arc::new(Statistics::new()),
            shutdown: ShutdownHandle::default(),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the counters updated by this server.
    pub fn statistics(&self) -> Arc<Statistics> {
        Arc::clone(&self.statistics)
    }

    /// Returns a handle that stops [`run`](Self::run).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accepts and services connections until the shutdown handle fires.
    ///
    /// Each connection is serviced inline, so the Nth connection is answered and
    /// closed before the (N+1)th is accepted. Accept failures are logged and the
    /// loop carries on; only a shutdown request ends it. A connection accepted
    /// after shutdown was requested (such as a wake-up connection) is closed
    /// without being read.
    pub async fn run(self, router: Router) {
        info!(address = %self.local_addr, routes = router.len(), "pingmon listening");

        while !self.shutdown.is_shutdown() {
            let accepted = tokio::select! {
                biased;
                () = self.shutdown.state.wake.notified() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            if self.shutdown.is_shutdown() {
                debug!(peer = %peer, "dropping connection accepted after shutdown");
                break;
            }

            debug!(peer = %peer, "connection accepted");
            connection::serve(stream, peer, &router, &self.statistics, &self.config).await;
        }

        info!(address = %self.local_addr, "pingmon stopped");
    }
}
