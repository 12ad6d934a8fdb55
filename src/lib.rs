//! # pingmon
//!
//! A latency monitor whose collected history is served by a small embedded
//! HTTP/1.1 server written directly on top of Tokio sockets.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pingmon::config::ServerConfig;
//! use pingmon::http::{QueryParams, Response, StatusCode};
//! use pingmon::router::Router;
//! use pingmon::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.get(&["hello"], |_params: QueryParams| async {
//!         Ok(Response::text(StatusCode::OK, "Hello, world!"))
//!     })?;
//!
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run(router).await;
//!     Ok(())
//! }
//! ```

// ── Status server ─────────────────────────────────────────────────────────────
pub mod config;
pub mod http;
pub mod router;
pub mod server;
pub mod stats;

// ── Monitoring data exposed by the server ────────────────────────────────────
pub mod monitor;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ConfigError, ServerConfig};
pub use http::{Headers, Method, QueryParams, Request, Response, StatusCode};
pub use router::{BoxError, Router};
pub use server::{Server, ServerError, ShutdownHandle};
pub use stats::{Statistics, StatsSnapshot};
