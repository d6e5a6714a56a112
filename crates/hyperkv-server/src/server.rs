//! The mio event loop: accepts connections, drives reads/writes, and runs
//! the periodic maintenance tasks (TTL sweep, append-log fsync, slow-client
//! cleanup, subscriber queue drain) from a single thread.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use rustls::ServerConfig as RustlsServerConfig;

use hyperkv_storage::SnapshotStore;
use hyperkv_types::Timestamp;
use hyperkv_wire::Frame;

use crate::client_registry::{ClientInfo, ClientRegistry};
use crate::connection::Connection;
use crate::dispatcher::Dispatcher;
use crate::error::{ServerError, ServerResult};

const LISTENER: Token = Token(0);
const SIGNAL_TOKEN: Token = Token(1);
const FIRST_CONN_TOKEN: usize = 2;
const FSYNC_INTERVAL: Duration = Duration::from_secs(1);
const CLIENT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Runtime knobs the event loop consults every tick. Everything here is
/// resolved from `HyperKvConfig` before `Server::bind` is called.
pub struct ServerOptions {
    pub max_connections: usize,
    pub buffer_size: usize,
    pub client_timeout: Option<Duration>,
    pub ttl_check_interval: Duration,
    pub ttl_sweep_budget: usize,
    pub snapshot_on_shutdown: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            buffer_size: 8 * 1024,
            client_timeout: None,
            ttl_check_interval: Duration::from_millis(100),
            ttl_sweep_budget: 20,
            snapshot_on_shutdown: false,
        }
    }
}

pub struct Server {
    listener: TcpListener,
    poll: Poll,
    #[cfg(unix)]
    signals: Option<signal_hook_mio::v1_0::Signals>,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    next_conn_id: u64,
    dispatcher: Dispatcher,
    clients: ClientRegistry,
    snapshot_store: Option<SnapshotStore>,
    options: ServerOptions,
    tls_config: Option<Arc<RustlsServerConfig>>,
    last_ttl_sweep: Instant,
    last_fsync: Instant,
    last_client_sweep: Instant,
    running: bool,
}

impl Server {
    pub fn bind(
        addr: SocketAddr,
        dispatcher: Dispatcher,
        clients: ClientRegistry,
        snapshot_store: Option<SnapshotStore>,
        options: ServerOptions,
        tls_config: Option<Arc<RustlsServerConfig>>,
    ) -> ServerResult<Self> {
        let mut listener = TcpListener::bind(addr).map_err(|source| ServerError::BindFailed { addr, source })?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;

        #[cfg(unix)]
        let signals = {
            let mut signals = signal_hook_mio::v1_0::Signals::new([signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT])?;
            poll.registry().register(&mut signals, SIGNAL_TOKEN, Interest::READABLE)?;
            Some(signals)
        };

        Ok(Self {
            listener,
            poll,
            #[cfg(unix)]
            signals,
            connections: HashMap::new(),
            next_token: FIRST_CONN_TOKEN,
            next_conn_id: 1,
            dispatcher,
            clients,
            snapshot_store,
            options,
            tls_config,
            last_ttl_sweep: Instant::now(),
            last_fsync: Instant::now(),
            last_client_sweep: Instant::now(),
            running: false,
        })
    }

    /// Runs until a `SHUTDOWN` command or a signal flips `running` off.
    pub fn run(&mut self) -> ServerResult<()> {
        self.running = true;
        let mut events = Events::with_capacity(1024);

        while self.running {
            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                if event.token() == LISTENER {
                    self.accept_connections()?;
                } else if event.token() == SIGNAL_TOKEN {
                    self.handle_signals();
                } else {
                    self.handle_connection_event(event.token(), event)?;
                }
            }

            self.drain_subscriber_queues();
            self.apply_kill_requests();
            self.run_periodic_tasks()?;
            self.reap_closed_connections();
        }

        self.shutdown()
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[cfg(unix)]
    fn handle_signals(&mut self) {
        let Some(signals) = &mut self.signals else {
            return;
        };
        for signal in signals.pending() {
            tracing::info!(signal, "received shutdown signal");
            self.running = false;
        }
    }

    #[cfg(not(unix))]
    fn handle_signals(&mut self) {
        self.running = false;
    }

    fn accept_connections(&mut self) -> ServerResult<()> {
        loop {
            let (mut stream, remote_addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            if self.connections.len() >= self.options.max_connections {
                let reply = Frame::error("ERR max number of clients reached").encode();
                let _ = io::Write::write_all(&mut stream, &reply);
                tracing::warn!(%remote_addr, "rejected connection: max_connections reached");
                continue;
            }

            let token = Token(self.next_token);
            self.next_token += 1;

            let conn_id = self.next_conn_id;
            self.next_conn_id += 1;
            let mut conn = match Connection::new(token, conn_id, stream, remote_addr, self.options.buffer_size, self.tls_config.clone()) {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(%remote_addr, error = %e, "failed to initialize connection");
                    continue;
                }
            };
            self.poll.registry().register(conn.socket_mut(), token, conn.interest())?;
            self.clients.upsert(ClientInfo {
                id: conn.id,
                remote_addr,
                connected_at: conn.connected_at,
                last_activity: conn.last_activity,
                bytes_in: 0,
                bytes_out: 0,
                subscribed: false,
            });
            tracing::debug!(%remote_addr, conn_id, "accepted connection");
            self.connections.insert(token, conn);
        }
    }

    fn handle_connection_event(&mut self, token: Token, event: &Event) -> ServerResult<()> {
        let Server {
            connections,
            dispatcher,
            ..
        } = self;
        let Some(conn) = connections.get_mut(&token) else {
            return Ok(());
        };

        if conn.is_tls_handshaking() {
            if let Err(e) = conn.drive_tls_handshake() {
                tracing::debug!(conn_id = conn.id, error = %e, "TLS handshake failed");
                conn.closing = true;
            }
            if conn.closing || conn.is_tls_handshaking() {
                if !conn.closing {
                    self.poll.registry().reregister(conn.socket_mut(), token, conn.interest())?;
                }
                return Ok(());
            }
        }

        if event.is_readable() {
            match conn.read() {
                Ok(true) => conn.touch(),
                Ok(false) => conn.closing = true,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(_) => conn.closing = true,
            }

            loop {
                match conn.try_decode_command() {
                    Ok(Some(args)) => {
                        let outcome = dispatcher.dispatch(conn, args);
                        for frame in &outcome.frames {
                            conn.queue_frame(frame);
                        }
                        if outcome.shutdown_requested {
                            self.running = false;
                        }
                        if outcome.close_connection {
                            conn.closing = true;
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        conn.queue_frame(&Frame::error(format!("ERR protocol error: {e}")));
                        conn.closing = true;
                        break;
                    }
                }
            }
        }

        if event.is_writable() || !conn.write_buf.is_empty() {
            match conn.write() {
                Ok(_) => {}
                Err(_) => conn.closing = true,
            }
        }

        if !conn.closing {
            self.poll.registry().reregister(conn.socket_mut(), token, conn.interest())?;
            self.clients.upsert(ClientInfo {
                id: conn.id,
                remote_addr: conn.remote_addr,
                connected_at: conn.connected_at,
                last_activity: conn.last_activity,
                bytes_in: conn.bytes_in,
                bytes_out: conn.bytes_out,
                subscribed: conn.has_subscriptions(),
            });
        }

        Ok(())
    }

    /// Pushes queued pub/sub messages into each subscribed connection's
    /// write buffer. Runs once per tick, after command dispatch.
    fn drain_subscriber_queues(&mut self) {
        for conn in self.connections.values_mut() {
            let Some(queue) = &conn.subscriber_queue else {
                continue;
            };
            while let Some(message) = queue.try_pop() {
                let frame = match &message.pattern {
                    Some(pattern) => Frame::array(vec![
                        Frame::bulk("pmessage"),
                        Frame::bulk(pattern.clone()),
                        Frame::bulk(message.channel.clone()),
                        Frame::bulk(message.payload.clone()),
                    ]),
                    None => Frame::array(vec![
                        Frame::bulk("message"),
                        Frame::bulk(message.channel.clone()),
                        Frame::bulk(message.payload.clone()),
                    ]),
                };
                conn.queue_frame(&frame);
            }
            if !conn.write_buf.is_empty() {
                if let Err(e) = conn.write() {
                    tracing::debug!(conn_id = conn.id, error = %e, "failed to flush subscriber push");
                }
            }
        }
    }

    fn apply_kill_requests(&mut self) {
        for conn in self.connections.values_mut() {
            if self.clients.is_kill_requested(conn.id) {
                conn.closing = true;
            }
        }
    }

    fn run_periodic_tasks(&mut self) -> ServerResult<()> {
        let now_instant = Instant::now();

        if now_instant.duration_since(self.last_ttl_sweep) >= self.options.ttl_check_interval {
            self.last_ttl_sweep = now_instant;
            let now = Timestamp::now();
            let expired = self.dispatcher.keyspace_mut().sweep_expired(now, self.options.ttl_sweep_budget);
            self.dispatcher.note_expired(expired.len());
        }

        if now_instant.duration_since(self.last_fsync) >= FSYNC_INTERVAL {
            self.last_fsync = now_instant;
            self.dispatcher.keyspace_mut().fsync_append_log()?;
        }

        if now_instant.duration_since(self.last_client_sweep) >= CLIENT_SWEEP_INTERVAL {
            self.last_client_sweep = now_instant;
            if let Some(timeout) = self.options.client_timeout {
                for conn in self.connections.values_mut() {
                    if conn.is_idle(timeout) {
                        conn.closing = true;
                    }
                }
            }
        }

        Ok(())
    }

    fn reap_closed_connections(&mut self) {
        let closing: Vec<Token> = self.connections.iter().filter(|(_, conn)| conn.closing).map(|(token, _)| *token).collect();
        for token in closing {
            if let Some(mut conn) = self.connections.remove(&token) {
                self.dispatcher.on_disconnect(&conn);
                self.clients.remove(conn.id);
                let _ = self.poll.registry().deregister(conn.socket_mut());
            }
        }
    }

    /// Stops accepting, drains nothing further (in-flight commands already
    /// completed synchronously), flushes the append log, optionally writes
    /// a final snapshot, and closes every connection.
    fn shutdown(&mut self) -> ServerResult<()> {
        tracing::info!("shutting down");
        self.dispatcher.keyspace_mut().fsync_append_log()?;

        if self.options.snapshot_on_shutdown {
            if let Some(store) = &self.snapshot_store {
                let now = Timestamp::now();
                let entries = self.dispatcher.keyspace_mut().iter_raw();
                let metadata = serde_json::json!({ "reason": "shutdown" });
                match store.create(&entries, metadata, now) {
                    Ok(path) => {
                        self.dispatcher.note_snapshot_created();
                        tracing::info!(path = %path.display(), "wrote final snapshot");
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to write final snapshot"),
                }
            }
        }

        for (_, conn) in self.connections.drain() {
            self.dispatcher.on_disconnect(&conn);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthGate;
    use crate::metrics::Metrics;
    use crate::shard::ShardRouter;
    use hyperkv_keyspace::{EvictionEngine, EvictionPolicy, Keyspace, KeyspaceConfig};
    use hyperkv_pubsub::{BackpressurePolicy, PubSub};
    use hyperkv_storage::MemoryBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_dispatcher() -> Dispatcher {
        let keyspace = Keyspace::new(Box::new(MemoryBackend::default()), EvictionEngine::new(EvictionPolicy::Lru), KeyspaceConfig::default());
        let pubsub = Rc::new(RefCell::new(PubSub::new(BackpressurePolicy::DropNewest, 16)));
        Dispatcher::new(keyspace, pubsub, ClientRegistry::new(), AuthGate::default(), Rc::new(Metrics::new()), ShardRouter::new(1), HashMap::new())
    }

    #[test]
    fn bind_picks_an_ephemeral_port_and_listens() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = Server::bind(addr, make_dispatcher(), ClientRegistry::new(), None, ServerOptions::default(), None).expect("bind should succeed");
        let local = server.local_addr().expect("listener should have a local addr");
        assert_eq!(local.ip(), addr.ip());
        assert!(local.port() > 0);
    }

    #[test]
    fn stop_flips_running_off() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut server = Server::bind(addr, make_dispatcher(), ClientRegistry::new(), None, ServerOptions::default(), None).expect("bind should succeed");
        server.running = true;
        server.stop();
        assert!(!server.running);
    }
}
