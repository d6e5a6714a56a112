//! Command dispatch: turns a decoded RESP command into keyspace/pub-sub
//! calls and a reply, the same `handle`/single error-mapping-function shape
//! the reference dispatcher uses, minus anything tenant- or RBAC-specific.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use bytes::Bytes;
use hyperkv_keyspace::{Keyspace, SetOptions};
use hyperkv_pubsub::{PubSub, SubscriberId};
use hyperkv_types::{CrdtKind, Timestamp};
use hyperkv_wire::Frame;

use crate::auth::AuthGate;
use crate::client_registry::ClientRegistry;
use crate::connection::{Connection, ConnectionMode};
use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::shard::ShardRouter;

/// Subset of commands a `Subscribed` connection may still issue.
const SUBSCRIBED_ALLOWED: &[&str] = &["SUBSCRIBE", "UNSUBSCRIBE", "PSUBSCRIBE", "PUNSUBSCRIBE", "PING", "QUIT"];

/// What the event loop should do after a dispatched command.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub frames: Vec<Frame>,
    pub close_connection: bool,
    pub shutdown_requested: bool,
}

impl DispatchOutcome {
    fn reply(frame: Frame) -> Self {
        Self {
            frames: vec![frame],
            ..Default::default()
        }
    }
}

/// Owns the keyspace and every other piece of server-wide state the command
/// vocabulary touches. One instance per shard; with `--shards 1` (the
/// default) there is exactly one.
pub struct Dispatcher {
    keyspace: Keyspace,
    pubsub: Rc<RefCell<PubSub>>,
    subscriber_conns: HashMap<SubscriberId, u64>,
    clients: ClientRegistry,
    auth: AuthGate,
    metrics: Rc<Metrics>,
    shard_router: ShardRouter,
    config_params: HashMap<String, String>,
    started_at: Instant,
}

impl Dispatcher {
    pub fn new(
        keyspace: Keyspace,
        pubsub: Rc<RefCell<PubSub>>,
        clients: ClientRegistry,
        auth: AuthGate,
        metrics: Rc<Metrics>,
        shard_router: ShardRouter,
        config_params: HashMap<String, String>,
    ) -> Self {
        Self {
            keyspace,
            pubsub,
            subscriber_conns: HashMap::new(),
            clients,
            auth,
            metrics,
            shard_router,
            config_params,
            started_at: Instant::now(),
        }
    }

    pub fn keyspace_mut(&mut self) -> &mut Keyspace {
        &mut self.keyspace
    }

    /// Records `count` TTL-driven expirations. Called by the event loop's
    /// sweep driver, which owns the timing but not the metrics registry.
    pub fn note_expired(&self, count: usize) {
        self.metrics.keys_expired.inc_by(count as u64);
    }

    pub fn note_snapshot_created(&self) {
        self.metrics.snapshots_created.inc();
    }

    /// Dispatches one already-decoded command for `conn`.
    pub fn dispatch(&mut self, conn: &mut Connection, args: Vec<Bytes>) -> DispatchOutcome {
        let now = Timestamp::now();
        let Some(name) = command_name(&args) else {
            return DispatchOutcome::reply(Frame::error("ERR invalid command"));
        };
        self.metrics.record_command(&name);

        if self.auth.required() && !conn.authenticated && name != "AUTH" && name != "PING" && name != "QUIT" {
            return DispatchOutcome::reply(Frame::error("NOAUTH Authentication required."));
        }

        if conn.mode == ConnectionMode::Subscribed && !SUBSCRIBED_ALLOWED.contains(&name.as_str()) {
            return DispatchOutcome::reply(Frame::error(format!(
                "ERR Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT are allowed in this context",
                name.to_lowercase()
            )));
        }

        match name.as_str() {
            "PING" => self.cmd_ping(&args),
            "AUTH" => self.cmd_auth(conn, &args),
            "QUIT" => DispatchOutcome {
                frames: vec![Frame::simple("OK")],
                close_connection: true,
                shutdown_requested: false,
            },
            "GET" => self.cmd_get(&args, now),
            "SET" => self.cmd_set(&args, now),
            "DEL" => self.cmd_del(&args, now),
            "EXISTS" => self.cmd_exists(&args, now),
            "EXPIRE" => self.cmd_expire(&args, now),
            "TTL" => self.cmd_ttl(&args, now),
            "PERSIST" => self.cmd_persist(&args, now),
            "KEYS" => self.cmd_keys(&args),
            "SCAN" => self.cmd_scan(&args),
            "FLUSHDB" => {
                self.keyspace.flushdb(now);
                DispatchOutcome::reply(Frame::simple("OK"))
            }
            "MGET" => self.cmd_mget(&args, now),
            "MSET" => self.cmd_mset(&args, now),
            "PUBLISH" => self.cmd_publish(&args),
            "SUBSCRIBE" => self.cmd_subscribe(conn, &args),
            "PSUBSCRIBE" => self.cmd_psubscribe(conn, &args),
            "UNSUBSCRIBE" => self.cmd_unsubscribe(conn, &args),
            "PUNSUBSCRIBE" => self.cmd_punsubscribe(conn, &args),
            "INFO" => self.cmd_info(&args),
            "CLIENT" => self.cmd_client(conn, &args),
            "CONFIG" => self.cmd_config(&args),
            "SHUTDOWN" => DispatchOutcome {
                frames: vec![],
                close_connection: true,
                shutdown_requested: true,
            },
            other => DispatchOutcome::reply(Frame::error(format!("ERR unknown command '{}'", other.to_lowercase()))),
        }
    }

    /// Removes every trace of `conn` from shared registries. Called by the
    /// event loop right before a socket is torn down.
    pub fn on_disconnect(&mut self, conn: &Connection) {
        if let Some(id) = conn.subscriber_id {
            self.pubsub.borrow_mut().remove_subscriber(id);
            self.subscriber_conns.remove(&id);
        }
        self.clients.remove(conn.id);
    }

    // -- administrative ---------------------------------------------------

    fn cmd_ping(&self, args: &[Bytes]) -> DispatchOutcome {
        match args.len() {
            1 => DispatchOutcome::reply(Frame::simple("PONG")),
            2 => DispatchOutcome::reply(Frame::bulk(args[1].clone())),
            _ => DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'ping' command")),
        }
    }

    fn cmd_auth(&self, conn: &mut Connection, args: &[Bytes]) -> DispatchOutcome {
        if args.len() != 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'auth' command"));
        }
        if !self.auth.required() {
            return DispatchOutcome::reply(Frame::error("ERR Client sent AUTH, but no password is set"));
        }
        let supplied = String::from_utf8_lossy(&args[1]);
        let ok = self.auth.check(&supplied);
        self.metrics.record_auth_attempt(ok);
        conn.authenticated = ok;
        if ok {
            DispatchOutcome::reply(Frame::simple("OK"))
        } else {
            DispatchOutcome::reply(Frame::error("WRONGPASS invalid username-password pair"))
        }
    }

    fn cmd_info(&self, args: &[Bytes]) -> DispatchOutcome {
        let section = args.get(1).map(|b| String::from_utf8_lossy(b).to_ascii_lowercase());
        let mut out = String::new();

        if section.is_none() || section.as_deref() == Some("server") {
            out.push_str("# Server\r\n");
            out.push_str(&format!("hyperkv_version:{}\r\n", env!("CARGO_PKG_VERSION")));
            out.push_str(&format!("uptime_in_seconds:{}\r\n", self.started_at.elapsed().as_secs()));
            out.push_str(&format!("shard_count:{}\r\n", self.shard_router.shard_count()));
            out.push_str("\r\n");
        }
        if section.is_none() || section.as_deref() == Some("keyspace") {
            out.push_str("# Keyspace\r\n");
            out.push_str(&format!("db0:keys={},used_memory={}\r\n", self.keyspace.len(), self.keyspace.used_memory()));
            out.push_str("\r\n");
        }
        if section.is_none() || section.as_deref() == Some("metrics") {
            out.push_str("# Metrics\r\n");
            out.push_str(&self.metrics.render_info());
        }
        DispatchOutcome::reply(Frame::bulk(out))
    }

    fn cmd_client(&mut self, conn: &Connection, args: &[Bytes]) -> DispatchOutcome {
        let Some(sub) = args.get(1).map(|b| String::from_utf8_lossy(b).to_ascii_uppercase()) else {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'client' command"));
        };
        match sub.as_str() {
            "LIST" => {
                let mut lines = String::new();
                for info in self.clients.list() {
                    lines.push_str(&format!(
                        "id={} addr={} age={} idle={} sub={}\n",
                        info.id,
                        info.remote_addr,
                        info.connected_at.elapsed().as_secs(),
                        info.last_activity.elapsed().as_secs(),
                        i32::from(info.subscribed)
                    ));
                }
                DispatchOutcome::reply(Frame::bulk(lines))
            }
            "KILL" => {
                let Some(id_arg) = args.get(2) else {
                    return DispatchOutcome::reply(Frame::error("ERR syntax error"));
                };
                let Ok(id) = String::from_utf8_lossy(id_arg).parse::<u64>() else {
                    return DispatchOutcome::reply(Frame::error("ERR invalid client id"));
                };
                if id == conn.id {
                    return DispatchOutcome::reply(Frame::error("ERR No such client"));
                }
                if self.clients.request_kill(id) {
                    DispatchOutcome::reply(Frame::simple("OK"))
                } else {
                    DispatchOutcome::reply(Frame::error("ERR No such client"))
                }
            }
            other => DispatchOutcome::reply(Frame::error(format!("ERR unknown CLIENT subcommand '{}'", other.to_lowercase()))),
        }
    }

    fn cmd_config(&mut self, args: &[Bytes]) -> DispatchOutcome {
        let Some(sub) = args.get(1).map(|b| String::from_utf8_lossy(b).to_ascii_uppercase()) else {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'config' command"));
        };
        match sub.as_str() {
            "GET" => {
                let Some(pattern) = args.get(2) else {
                    return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'config|get' command"));
                };
                let mut frames = Vec::new();
                for (key, value) in &self.config_params {
                    if hyperkv_storage::glob_matches(pattern, key.as_bytes()) {
                        frames.push(Frame::bulk(key.clone()));
                        frames.push(Frame::bulk(value.clone()));
                    }
                }
                DispatchOutcome::reply(Frame::array(frames))
            }
            "SET" => {
                let (Some(param), Some(value)) = (args.get(2), args.get(3)) else {
                    return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'config|set' command"));
                };
                let key = String::from_utf8_lossy(param).to_string();
                let value = String::from_utf8_lossy(value).to_string();
                self.config_params.insert(key, value);
                DispatchOutcome::reply(Frame::simple("OK"))
            }
            other => DispatchOutcome::reply(Frame::error(format!("ERR unknown CONFIG subcommand '{}'", other.to_lowercase()))),
        }
    }

    // -- keyspace commands --------------------------------------------------

    fn cmd_get(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() != 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'get' command"));
        }
        self.reply_result(self.keyspace.get(&args[1], now).map(|v| match v {
            Some(bytes) => Frame::bulk(bytes),
            None => Frame::null_bulk(),
        }))
    }

    fn cmd_mget(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() < 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'mget' command"));
        }
        let keys: Vec<_> = args[1..].to_vec();
        self.reply_result(self.keyspace.mget(&keys, now).map(|values| {
            Frame::array(
                values
                    .into_iter()
                    .map(|v| match v {
                        Some(bytes) => Frame::bulk(bytes),
                        None => Frame::null_bulk(),
                    })
                    .collect(),
            )
        }))
    }

    fn cmd_set(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() < 3 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'set' command"));
        }
        let key = args[1].clone();
        let value = args[2].clone();
        let options = match parse_set_options(&args[3..], now) {
            Ok(options) => options,
            Err(err) => return DispatchOutcome::reply(Frame::error(err)),
        };
        self.reply_result(self.keyspace.set(key, value, options, now).map(|applied| {
            if applied {
                Frame::simple("OK")
            } else {
                Frame::null_bulk()
            }
        }))
    }

    fn cmd_mset(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() < 3 || args.len() % 2 != 1 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'mset' command"));
        }
        for pair in args[1..].chunks(2) {
            if let Err(err) = self.keyspace.set(pair[0].clone(), pair[1].clone(), SetOptions::default(), now) {
                return DispatchOutcome::reply(Frame::error(error_to_wire(&ServerError::from(err))));
            }
        }
        DispatchOutcome::reply(Frame::simple("OK"))
    }

    fn cmd_del(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() < 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'del' command"));
        }
        let keys: Vec<_> = args[1..].to_vec();
        DispatchOutcome::reply(Frame::integer(self.keyspace.del(&keys, now) as i64))
    }

    fn cmd_exists(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() < 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'exists' command"));
        }
        let keys: Vec<_> = args[1..].to_vec();
        DispatchOutcome::reply(Frame::integer(self.keyspace.exists(&keys, now) as i64))
    }

    fn cmd_expire(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() != 3 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'expire' command"));
        }
        let Ok(seconds) = String::from_utf8_lossy(&args[2]).parse::<i64>() else {
            return DispatchOutcome::reply(Frame::error("ERR value is not an integer or out of range"));
        };
        let applied = self.keyspace.expire(&args[1], seconds, now);
        DispatchOutcome::reply(Frame::integer(i64::from(applied)))
    }

    fn cmd_ttl(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() != 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'ttl' command"));
        }
        DispatchOutcome::reply(Frame::integer(self.keyspace.ttl(&args[1], now)))
    }

    fn cmd_persist(&mut self, args: &[Bytes], now: Timestamp) -> DispatchOutcome {
        if args.len() != 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'persist' command"));
        }
        DispatchOutcome::reply(Frame::integer(i64::from(self.keyspace.persist(&args[1], now))))
    }

    fn cmd_keys(&mut self, args: &[Bytes]) -> DispatchOutcome {
        if args.len() != 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'keys' command"));
        }
        let matched = self.keyspace.keys(&args[1]);
        DispatchOutcome::reply(Frame::array(matched.into_iter().map(Frame::bulk).collect()))
    }

    fn cmd_scan(&mut self, args: &[Bytes]) -> DispatchOutcome {
        if args.len() < 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'scan' command"));
        }
        let Ok(cursor) = String::from_utf8_lossy(&args[1]).parse::<u64>() else {
            return DispatchOutcome::reply(Frame::error("ERR invalid cursor"));
        };
        let mut pattern: Option<Bytes> = None;
        let mut count = 10usize;
        let mut i = 2;
        while i < args.len() {
            let opt = String::from_utf8_lossy(&args[i]).to_ascii_uppercase();
            match opt.as_str() {
                "MATCH" if i + 1 < args.len() => {
                    pattern = Some(args[i + 1].clone());
                    i += 2;
                }
                "COUNT" if i + 1 < args.len() => {
                    count = String::from_utf8_lossy(&args[i + 1]).parse().unwrap_or(10);
                    i += 2;
                }
                _ => return DispatchOutcome::reply(Frame::error("ERR syntax error")),
            }
        }
        let (next_cursor, keys) = self.keyspace.scan(cursor, pattern.as_deref(), count);
        DispatchOutcome::reply(Frame::array(vec![
            Frame::bulk(next_cursor.to_string()),
            Frame::array(keys.into_iter().map(Frame::bulk).collect()),
        ]))
    }

    // -- pub/sub --------------------------------------------------------------

    fn cmd_publish(&mut self, args: &[Bytes]) -> DispatchOutcome {
        if args.len() != 3 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'publish' command"));
        }
        let outcome = self.pubsub.borrow_mut().publish(&args[1], args[2].clone());
        for killed in outcome.killed {
            if let Some(&conn_id) = self.subscriber_conns.get(&killed) {
                tracing::warn!(conn_id, reason = "slow_consumer", "disconnecting backpressured subscriber");
                self.clients.request_kill(conn_id);
            }
            self.subscriber_conns.remove(&killed);
        }
        DispatchOutcome::reply(Frame::integer(outcome.delivered as i64))
    }

    fn cmd_subscribe(&mut self, conn: &mut Connection, args: &[Bytes]) -> DispatchOutcome {
        if args.len() < 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'subscribe' command"));
        }
        self.ensure_subscriber(conn);
        let sub_id = conn.subscriber_id.expect("ensure_subscriber registers an id");
        let mut frames = Vec::new();
        for channel in &args[1..] {
            self.pubsub.borrow_mut().subscribe(sub_id, channel.clone());
            conn.channels.insert(channel.clone());
            frames.push(Frame::array(vec![
                Frame::bulk("subscribe"),
                Frame::bulk(channel.clone()),
                Frame::integer((conn.channels.len() + conn.patterns.len()) as i64),
            ]));
        }
        conn.mode = ConnectionMode::Subscribed;
        DispatchOutcome {
            frames,
            ..Default::default()
        }
    }

    fn cmd_psubscribe(&mut self, conn: &mut Connection, args: &[Bytes]) -> DispatchOutcome {
        if args.len() < 2 {
            return DispatchOutcome::reply(Frame::error("ERR wrong number of arguments for 'psubscribe' command"));
        }
        self.ensure_subscriber(conn);
        let sub_id = conn.subscriber_id.expect("ensure_subscriber registers an id");
        let mut frames = Vec::new();
        for pattern in &args[1..] {
            self.pubsub.borrow_mut().psubscribe(sub_id, pattern.clone());
            conn.patterns.insert(pattern.clone());
            frames.push(Frame::array(vec![
                Frame::bulk("psubscribe"),
                Frame::bulk(pattern.clone()),
                Frame::integer((conn.channels.len() + conn.patterns.len()) as i64),
            ]));
        }
        conn.mode = ConnectionMode::Subscribed;
        DispatchOutcome {
            frames,
            ..Default::default()
        }
    }

    fn cmd_unsubscribe(&mut self, conn: &mut Connection, args: &[Bytes]) -> DispatchOutcome {
        let Some(sub_id) = conn.subscriber_id else {
            return DispatchOutcome::reply(Frame::array(vec![Frame::bulk("unsubscribe"), Frame::null_bulk(), Frame::integer(0)]));
        };
        let targets: Vec<Bytes> = if args.len() > 1 { args[1..].to_vec() } else { conn.channels.iter().cloned().collect() };
        let mut frames = Vec::new();
        for channel in targets {
            self.pubsub.borrow_mut().unsubscribe(sub_id, &channel);
            conn.channels.remove(&channel);
            frames.push(Frame::array(vec![
                Frame::bulk("unsubscribe"),
                Frame::bulk(channel),
                Frame::integer((conn.channels.len() + conn.patterns.len()) as i64),
            ]));
        }
        self.maybe_leave_subscribed(conn);
        DispatchOutcome {
            frames,
            ..Default::default()
        }
    }

    fn cmd_punsubscribe(&mut self, conn: &mut Connection, args: &[Bytes]) -> DispatchOutcome {
        let Some(sub_id) = conn.subscriber_id else {
            return DispatchOutcome::reply(Frame::array(vec![Frame::bulk("punsubscribe"), Frame::null_bulk(), Frame::integer(0)]));
        };
        let targets: Vec<Bytes> = if args.len() > 1 { args[1..].to_vec() } else { conn.patterns.iter().cloned().collect() };
        let mut frames = Vec::new();
        for pattern in targets {
            self.pubsub.borrow_mut().punsubscribe(sub_id, &pattern);
            conn.patterns.remove(&pattern);
            frames.push(Frame::array(vec![
                Frame::bulk("punsubscribe"),
                Frame::bulk(pattern),
                Frame::integer((conn.channels.len() + conn.patterns.len()) as i64),
            ]));
        }
        self.maybe_leave_subscribed(conn);
        DispatchOutcome {
            frames,
            ..Default::default()
        }
    }

    fn ensure_subscriber(&mut self, conn: &mut Connection) {
        if conn.subscriber_id.is_some() {
            return;
        }
        let (sub_id, queue) = self.pubsub.borrow_mut().register();
        conn.subscriber_id = Some(sub_id);
        conn.subscriber_queue = Some(queue);
        self.subscriber_conns.insert(sub_id, conn.id);
    }

    fn maybe_leave_subscribed(&mut self, conn: &mut Connection) {
        if !conn.has_subscriptions() {
            conn.mode = ConnectionMode::Normal;
            if let Some(id) = conn.subscriber_id.take() {
                self.pubsub.borrow_mut().remove_subscriber(id);
                self.subscriber_conns.remove(&id);
            }
            conn.subscriber_queue = None;
        }
    }

    fn reply_result<E>(&self, result: Result<Frame, E>) -> DispatchOutcome
    where
        ServerError: From<E>,
    {
        match result {
            Ok(frame) => DispatchOutcome::reply(frame),
            Err(err) => DispatchOutcome::reply(Frame::error(error_to_wire(&ServerError::from(err)))),
        }
    }
}

fn command_name(args: &[Bytes]) -> Option<String> {
    let first = args.first()?;
    Some(String::from_utf8_lossy(first).to_ascii_uppercase())
}

fn parse_set_options(opts: &[Bytes], now: Timestamp) -> Result<SetOptions, &'static str> {
    let mut options = SetOptions::default();
    let mut i = 0;
    while i < opts.len() {
        let token = String::from_utf8_lossy(&opts[i]).to_ascii_uppercase();
        match token.as_str() {
            "NX" => {
                options.nx = true;
                i += 1;
            }
            "XX" => {
                options.xx = true;
                i += 1;
            }
            "EX" => {
                let seconds: i64 = opts.get(i + 1).and_then(|b| String::from_utf8_lossy(b).parse().ok()).ok_or("ERR value is not an integer or out of range")?;
                options.ttl = Some(now.plus_secs(seconds));
                i += 2;
            }
            "PX" => {
                let millis: i64 = opts.get(i + 1).and_then(|b| String::from_utf8_lossy(b).parse().ok()).ok_or("ERR value is not an integer or out of range")?;
                options.ttl = Some(now.plus_millis(millis));
                i += 2;
            }
            "CRDT" => {
                let kind = opts.get(i + 1).map(|b| String::from_utf8_lossy(b).to_ascii_lowercase()).ok_or("ERR syntax error")?;
                options.crdt = Some(match kind.as_str() {
                    "lww" => CrdtKind::Lww,
                    "orset" => CrdtKind::OrSet,
                    "counter" => CrdtKind::Counter,
                    "plain" => CrdtKind::Plain,
                    _ => return Err("ERR unsupported CRDT kind"),
                });
                i += 2;
            }
            _ => return Err("ERR syntax error"),
        }
    }
    if options.nx && options.xx {
        return Err("ERR syntax error");
    }
    Ok(options)
}

/// Maps every `ServerError` to the wire string the reference error taxonomy
/// assigns it. The one place this crate decides what goes out on the wire
/// for a failure.
pub fn error_to_wire(error: &ServerError) -> String {
    use hyperkv_keyspace::KeyspaceError;

    match error {
        ServerError::Keyspace(KeyspaceError::Syntax) => "ERR syntax error".to_string(),
        ServerError::Keyspace(KeyspaceError::WrongType(msg)) => format!("WRONGTYPE {msg}"),
        ServerError::Keyspace(KeyspaceError::Oom) => "OOM command not allowed when used memory > 'maxmemory'".to_string(),
        ServerError::Keyspace(KeyspaceError::Storage(err)) => format!("ERR {err}"),
        ServerError::Keyspace(KeyspaceError::Merge(err)) => format!("WRONGTYPE {err}"),
        ServerError::Keyspace(KeyspaceError::Codec(err)) => format!("ERR corrupted value: {err}"),
        ServerError::Syntax => "ERR syntax error".to_string(),
        ServerError::UnknownCommand(cmd) => format!("ERR unknown command '{cmd}'"),
        ServerError::WrongContext(msg) => format!("ERR {msg}"),
        ServerError::Unauthorized(msg) => format!("NOAUTH {msg}"),
        ServerError::MaxConnectionsReached(_) => "ERR max number of clients reached".to_string(),
        other => format!("ERR {other}"),
    }
}
