//! # hyperkv-server: the `HyperKV` network daemon
//!
//! Exposes a keyspace over RESP on a TCP listener using a single-threaded
//! `mio` event loop — no async runtime, explicit control flow at every
//! suspension point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       hyperkv-server                       │
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────────┐  │
//! │  │  Listener  │ → │ Connections │ → │    Dispatcher     │  │
//! │  │  (TCP)     │   │ (mio poll)  │   │ (→ Keyspace/PubSub)│  │
//! │  └────────────┘   └─────────────┘   └──────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use hyperkv_config::HyperKvConfig;
//! use hyperkv_server::{bootstrap, Server};
//!
//! let config = HyperKvConfig::load()?;
//! let bootstrapped = bootstrap::bootstrap(&config, 1)?;
//! let mut server = Server::bind(
//!     bootstrapped.addr,
//!     bootstrapped.dispatcher,
//!     bootstrapped.clients,
//!     bootstrapped.snapshot_store,
//!     bootstrapped.options,
//!     bootstrapped.tls_config,
//! )?;
//! server.run()?;
//! ```

pub mod auth;
pub mod bootstrap;
pub mod buffer_pool;
pub mod client_registry;
pub mod connection;
pub mod dispatcher;
mod error;
pub mod metrics;
pub mod notify;
pub mod pem;
pub mod shard;
pub mod server;
pub mod tls;

pub use auth::AuthGate;
pub use bootstrap::{bootstrap, Bootstrapped};
pub use buffer_pool::BytesMutPool;
pub use client_registry::{ClientInfo, ClientRegistry};
pub use connection::{Connection, ConnectionMode};
pub use dispatcher::{error_to_wire, DispatchOutcome, Dispatcher};
pub use error::{ServerError, ServerResult};
pub use metrics::Metrics;
pub use notify::PubSubNotifier;
pub use server::{Server, ServerOptions};
pub use shard::ShardRouter;
pub use tls::TlsConfig;
