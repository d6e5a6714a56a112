//! Connection state management.

use std::collections::BTreeSet;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use mio::net::TcpStream;
use mio::{Interest, Token};
use rustls::ServerConfig as RustlsServerConfig;

use hyperkv_pubsub::{BoundedQueue, Message, SubscriberId};
use hyperkv_wire::{Decoder, Frame};

use crate::error::ServerResult;
use crate::tls::TlsStream;

/// Either a bare socket or a TLS-wrapped one. The raw `TcpStream` stays
/// reachable through `socket_mut` either way, since mio's registry only
/// knows how to register the concrete socket type, never the TLS wrapper.
enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    fn socket_mut(&mut self) -> &mut TcpStream {
        match self {
            Transport::Plain(socket) => socket,
            Transport::Tls(tls) => &mut tls.socket,
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(socket) => socket.read(buf),
            Transport::Tls(tls) => tls.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(socket) => socket.write(buf),
            Transport::Tls(tls) => tls.write(buf),
        }
    }
}

/// Whether a connection is accepting general commands or is locked into
/// the pub/sub command subset after a successful `SUBSCRIBE`/`PSUBSCRIBE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Normal,
    Subscribed,
}

/// State of a client connection.
pub struct Connection {
    /// Unique token for this connection (kept for debugging and `CLIENT LIST`).
    pub token: Token,
    pub id: u64,
    pub remote_addr: SocketAddr,
    pub connected_at: Instant,
    /// Plain or TLS-wrapped socket.
    transport: Transport,
    /// Whether a TLS handshake is still in progress on this connection.
    tls_handshaking: bool,
    /// Read buffer.
    pub read_buf: BytesMut,
    /// Write buffer.
    pub write_buf: BytesMut,
    /// Whether the connection is closing.
    pub closing: bool,
    /// Last activity timestamp for idle timeout tracking.
    pub last_activity: Instant,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub mode: ConnectionMode,
    pub authenticated: bool,
    pub subscriber_id: Option<SubscriberId>,
    pub subscriber_queue: Option<Arc<BoundedQueue<Message>>>,
    pub channels: BTreeSet<Bytes>,
    pub patterns: BTreeSet<Bytes>,
    decoder: Decoder,
}

impl Connection {
    /// Creates a new connection. When `tls_config` is `Some`, the socket is
    /// wrapped in a `TlsStream` and the connection starts in the
    /// handshaking state rather than ready to read plaintext commands.
    pub fn new(
        token: Token,
        id: u64,
        stream: TcpStream,
        remote_addr: SocketAddr,
        buffer_size: usize,
        tls_config: Option<Arc<RustlsServerConfig>>,
    ) -> ServerResult<Self> {
        let now = Instant::now();
        let (transport, tls_handshaking) = match tls_config {
            Some(config) => (Transport::Tls(Box::new(TlsStream::new(stream, config)?)), true),
            None => (Transport::Plain(stream), false),
        };
        Ok(Self {
            token,
            id,
            remote_addr,
            connected_at: now,
            transport,
            tls_handshaking,
            read_buf: BytesMut::with_capacity(buffer_size),
            write_buf: BytesMut::with_capacity(buffer_size),
            closing: false,
            last_activity: now,
            bytes_in: 0,
            bytes_out: 0,
            mode: ConnectionMode::Normal,
            authenticated: false,
            subscriber_id: None,
            subscriber_queue: None,
            channels: BTreeSet::new(),
            patterns: BTreeSet::new(),
            decoder: Decoder::default(),
        })
    }

    /// Exposes the raw socket for mio registration; reads/writes never go
    /// through this directly when TLS is active.
    pub fn socket_mut(&mut self) -> &mut TcpStream {
        self.transport.socket_mut()
    }

    /// Whether this connection is still completing its TLS handshake.
    pub fn is_tls_handshaking(&self) -> bool {
        self.tls_handshaking
    }

    /// Drives the TLS handshake one step. A no-op on plaintext connections
    /// and once the handshake has already completed.
    pub fn drive_tls_handshake(&mut self) -> ServerResult<()> {
        if !self.tls_handshaking {
            return Ok(());
        }
        let Transport::Tls(tls) = &mut self.transport else {
            self.tls_handshaking = false;
            return Ok(());
        };
        if tls.do_handshake()? {
            self.tls_handshaking = false;
        }
        Ok(())
    }

    /// Updates the last activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Checks if the connection has been idle for longer than the timeout.
    /// Subscribed connections are exempt (they may sit idle between pushes).
    pub fn is_idle(&self, timeout: std::time::Duration) -> bool {
        self.mode != ConnectionMode::Subscribed && self.last_activity.elapsed() > timeout
    }

    /// Reads data from the socket into the read buffer.
    ///
    /// Returns `true` if the connection is still open.
    pub fn read(&mut self) -> io::Result<bool> {
        let mut temp_buf = [0u8; 4096];

        loop {
            match self.transport.read(&mut temp_buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&temp_buf[..n]);
                    self.bytes_in += n as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes data from the write buffer to the socket.
    ///
    /// Returns `true` if all data was written.
    pub fn write(&mut self) -> io::Result<bool> {
        while !self.write_buf.is_empty() {
            match self.transport.write(&self.write_buf) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "failed to write to socket"));
                }
                Ok(n) => {
                    let _ = self.write_buf.split_to(n);
                    self.bytes_out += n as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Attempts to decode one RESP command from the read buffer.
    pub fn try_decode_command(&mut self) -> ServerResult<Option<Vec<Bytes>>> {
        match self.decoder.decode(&mut self.read_buf)? {
            Some(frame) => match frame.as_command() {
                Some(command) => Ok(Some(command)),
                None => Err(hyperkv_wire::WireError::Protocol("expected array of bulk strings".to_string()).into()),
            },
            None => Ok(None),
        }
    }

    /// Queues a reply frame to be sent.
    pub fn queue_frame(&mut self, frame: &Frame) {
        self.write_buf.extend_from_slice(&frame.encode());
    }

    /// Returns the interest flags for this connection. A connection still
    /// completing its TLS handshake wants both directions regardless of
    /// buffer state, since the handshake itself may need to read or write
    /// at any point.
    pub fn interest(&self) -> Interest {
        if self.tls_handshaking || !self.write_buf.is_empty() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    pub fn has_subscriptions(&self) -> bool {
        !self.channels.is_empty() || !self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::TcpListener;

    fn make_plain_connection() -> Connection {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (stream, remote) = listener.accept().unwrap();
        let _ = client;
        Connection::new(Token(0), 1, stream, remote, 4096, None).expect("plaintext connection")
    }

    #[test]
    fn plain_connection_is_not_handshaking() {
        let conn = make_plain_connection();
        assert!(!conn.is_tls_handshaking());
        assert_eq!(conn.interest(), Interest::READABLE);
    }

    #[test]
    fn interest_adds_writable_once_a_frame_is_queued() {
        let mut conn = make_plain_connection();
        conn.queue_frame(&Frame::simple("OK"));
        assert_eq!(conn.interest(), Interest::READABLE | Interest::WRITABLE);
    }

    #[test]
    fn drive_tls_handshake_is_a_no_op_on_a_plain_connection() {
        let mut conn = make_plain_connection();
        conn.drive_tls_handshake().expect("no-op succeeds");
        assert!(!conn.is_tls_handshaking());
    }
}
