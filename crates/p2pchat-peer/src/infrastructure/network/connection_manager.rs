//! ConnectionManager: owns the listening socket, the single peer stream, and
//! the background tasks that service them.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!                 start_server            peer accepted
//!  Disconnected ─────────────────► Listening ─────────────► Connected
//!       │                                                      ▲  │
//!       │ connect_to_peer          stream opened               │  │ EOF
//!       └──────────────► Connecting ───────────────────────────┘  ▼
//!                             │                             Disconnected
//!                             └── timeout / refused ──► Error   (or Error on
//!                                                               a read failure)
//! ```
//!
//! `stop_connection` returns to `Disconnected` from any state.  It bumps a
//! *session counter* so that any task still running on behalf of the old
//! session sees that it has been superseded and leaves the shared state alone.
//! Tasks are aborted, and dropping the owned listener and stream halves closes
//! their file descriptors, which unblocks any pending accept, connect, or read.
//!
//! An aborted task only drops what it owns the next time the runtime polls it,
//! so the listener may still hold its port right after `stop_connection`
//! returns.  `start_server` and `connect_to_peer` therefore await every
//! retired task before opening a new socket.  A send blocked on a full socket
//! buffer is woken by the same teardown and fails instead of keeping the
//! stream open.
//!
//! # Publishing
//!
//! State and the message list are published through `tokio::sync::watch`
//! channels.  Observers call [`ConnectionManager::subscribe_state`] or
//! [`ConnectionManager::subscribe_messages`] and always see the latest value.

use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use p2pchat_core::{ChatMessage, ConnectionState};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::futures::Notified;
use tokio::sync::{watch, Mutex as AsyncMutex, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound on resolving and connecting to a peer.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const LISTEN_BACKLOG: u32 = 16;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error type for connection operations.
///
/// The `Display` text of these errors is what ends up inside
/// [`ConnectionState::Error`] when an operation fails.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to start server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("could not resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to [{address}]:{port} failed: {source}")]
    Connect {
        address: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("connection to [{address}]:{port} timed out after {}s", .timeout.as_secs())]
    ConnectTimeout {
        address: String,
        port: u16,
        timeout: Duration,
    },
    #[error("server stopped: {0}")]
    Accept(#[source] io::Error),
    #[error("connection lost: {0}")]
    Io(#[from] io::Error),
    #[error("no peer connection is open")]
    NotConnected,
    #[error("connection attempt was cancelled")]
    Cancelled,
    #[error("connection manager has been destroyed")]
    Destroyed,
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Why a reader loop ended.
#[derive(Debug)]
enum ReaderExit {
    EndOfStream,
    Failed(io::Error),
}

/// Socket resources and generation counters, guarded by one mutex.
#[derive(Default)]
struct Link {
    /// Bumped by every stop; tasks carry the value they were started under.
    session: u64,
    /// Bumped whenever the current peer stream is replaced or released.
    peer: u64,
    local_port: Option<u16>,
    accept_task: Option<JoinHandle<()>>,
    connect_task: Option<AbortHandle>,
    reader_task: Option<JoinHandle<()>>,
    writer: Option<Arc<AsyncMutex<OwnedWriteHalf>>>,
    stream_id: Option<Uuid>,
    /// Aborted tasks that may not have dropped their sockets yet.
    retired: Vec<JoinHandle<()>>,
}

impl Link {
    fn has_resources(&self) -> bool {
        self.accept_task.is_some()
            || self.connect_task.is_some()
            || self.reader_task.is_some()
            || self.writer.is_some()
    }

    fn retire(&mut self, task: JoinHandle<()>) {
        task.abort();
        self.retired.retain(|t| !t.is_finished());
        self.retired.push(task);
    }

    /// Drops the current peer stream, if any.
    fn release_peer(&mut self) {
        self.peer = self.peer.wrapping_add(1);
        if let Some(task) = self.reader_task.take() {
            self.retire(task);
        }
        self.writer = None;
        self.stream_id = None;
    }

    /// Drops every socket and task and invalidates the current session.
    fn release_all(&mut self) {
        self.session = self.session.wrapping_add(1);
        if let Some(task) = self.accept_task.take() {
            self.retire(task);
        }
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.local_port = None;
        self.release_peer();
    }
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    messages: watch::Sender<Vec<ChatMessage>>,
    link: Mutex<Link>,
    /// Woken whenever the peer stream is released.
    released: Notify,
    destroyed: AtomicBool,
}

impl Shared {
    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_peer(&self, link: &mut Link) {
        link.release_peer();
        self.released.notify_waiters();
    }

    fn release_all(&self, link: &mut Link) {
        link.release_all();
        self.released.notify_waiters();
    }

    /// Hands over the tasks retired so far, for the caller to await.
    fn take_retired(&self) -> Vec<JoinHandle<()>> {
        let mut link = self.lock_link();
        std::mem::take(&mut link.retired)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            debug!("connection state: {previous} -> {next}");
        }
    }

    /// Records `err` as the current state if `session` is still current.
    fn fail_if_current(&self, session: u64, err: &ConnectionError) {
        let link = self.lock_link();
        if link.session == session {
            self.set_state(ConnectionState::error(err.to_string()));
        } else {
            debug!("ignoring failure from superseded session {session}: {err}");
        }
    }

    /// Replaces any previous listener with `listener` and starts accepting.
    fn install_listener(self: &Arc<Self>, listener: TcpListener, port: u16) {
        let mut link = self.lock_link();
        self.release_all(&mut link);
        link.local_port = Some(port);
        let session = link.session;
        self.set_state(ConnectionState::Listening);
        link.accept_task = Some(tokio::spawn(accept_loop(Arc::clone(self), listener, session)));
    }

    /// Starts a connect attempt under a fresh session.
    fn begin_connect(
        &self,
        address: &str,
        port: u16,
    ) -> (u64, JoinHandle<Result<TcpStream, ConnectionError>>) {
        let mut link = self.lock_link();
        self.release_all(&mut link);
        let session = link.session;
        self.set_state(ConnectionState::Connecting);
        let task = tokio::spawn(open_stream(address.to_string(), port));
        link.connect_task = Some(task.abort_handle());
        (session, task)
    }

    /// Adopts an outbound stream unless the attempt was superseded.
    fn complete_connect(
        self: &Arc<Self>,
        session: u64,
        stream: TcpStream,
        peer_address: &str,
    ) -> Result<(), ConnectionError> {
        let mut link = self.lock_link();
        if link.session != session {
            debug!("discarding stream from superseded session {session}");
            return Err(ConnectionError::Cancelled);
        }
        link.connect_task = None;
        self.attach_peer(&mut link, stream, peer_address.to_string());
        Ok(())
    }

    /// Adopts an inbound stream. Returns `false` once `session` is stale.
    fn attach_inbound(self: &Arc<Self>, session: u64, stream: TcpStream, peer_address: String) -> bool {
        let mut link = self.lock_link();
        if link.session != session {
            return false;
        }
        if link.writer.is_some() {
            info!("new peer {peer_address} replaces the current connection");
        }
        self.attach_peer(&mut link, stream, peer_address);
        true
    }

    fn attach_peer(self: &Arc<Self>, link: &mut Link, stream: TcpStream, peer_address: String) {
        self.release_peer(link);
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {e}");
        }
        let stream_id = Uuid::new_v4();
        let (read_half, write_half) = stream.into_split();
        link.writer = Some(Arc::new(AsyncMutex::new(write_half)));
        link.stream_id = Some(stream_id);
        let peer = link.peer;
        info!(%stream_id, "connected to {peer_address}");
        self.set_state(ConnectionState::connected(peer_address));
        link.reader_task = Some(tokio::spawn(read_loop(
            Arc::clone(self),
            read_half,
            peer,
            stream_id,
        )));
    }

    fn push_received(&self, peer: u64, content: String) {
        let link = self.lock_link();
        if link.peer == peer {
            self.messages
                .send_modify(|messages| messages.push(ChatMessage::received(content)));
        }
    }

    /// The current write half, plus a future that completes once that stream
    /// is released.
    fn current_writer(&self) -> Option<(Arc<AsyncMutex<OwnedWriteHalf>>, Uuid, Notified<'_>)> {
        let link = self.lock_link();
        let writer = link.writer.as_ref()?;
        Some((
            Arc::clone(writer),
            link.stream_id.unwrap_or_default(),
            self.released.notified(),
        ))
    }

    /// Called by a reader loop when its stream ends.
    fn finish_peer(&self, peer: u64, stream_id: Uuid, exit: ReaderExit) {
        let mut link = self.lock_link();
        if link.peer != peer {
            debug!(%stream_id, "reader for a replaced stream finished");
            return;
        }
        link.reader_task = None;
        link.writer = None;
        link.stream_id = None;
        self.released.notify_waiters();

        let was_connected = self.state.borrow().is_connected();
        match exit {
            ReaderExit::EndOfStream => {
                info!(%stream_id, "peer closed the connection");
                if was_connected {
                    self.set_state(ConnectionState::Disconnected);
                }
            }
            ReaderExit::Failed(e) => {
                let err = ConnectionError::Io(e);
                warn!(%stream_id, "{err}");
                if was_connected {
                    self.set_state(ConnectionState::error(err.to_string()));
                }
            }
        }
    }
}

// ── ConnectionManager ─────────────────────────────────────────────────────────

/// Owns at most one listening socket and at most one peer stream.
///
/// Operations may be called from any task.  Dropping the manager stops every
/// background task it started.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Creates a manager in the `Disconnected` state with no messages.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (messages, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(Shared {
                state,
                messages,
                link: Mutex::new(Link::default()),
                released: Notify::new(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Returns a receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Returns a snapshot of the message list, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.shared.messages.borrow().clone()
    }

    /// Returns a receiver that observes every change to the message list.
    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.shared.messages.subscribe()
    }

    /// Port the listening socket is bound to, or 0 when not listening.
    pub fn local_port(&self) -> u16 {
        self.shared.lock_link().local_port.unwrap_or(0)
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> Result<(), ConnectionError> {
        if self.is_destroyed() {
            Err(ConnectionError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// `stop_connection`, then waits until every aborted task has dropped the
    /// sockets it owned.
    async fn teardown(&self) {
        self.stop_connection();
        for task in self.shared.take_retired() {
            let _ = task.await;
        }
    }

    /// Begins hosting: tears down any prior activity, binds `[::]:port`
    /// (0 lets the OS choose), and starts accepting peers in the background.
    ///
    /// Each accepted peer replaces the previous one.  The listener keeps
    /// accepting after a peer disconnects, until `stop_connection`.
    ///
    /// Returns the port actually bound.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Bind`] if the socket cannot be created or
    /// bound; the state becomes `Error` with the same message.
    pub async fn start_server(&self, port: u16) -> Result<u16, ConnectionError> {
        self.ensure_alive()?;
        self.teardown().await;

        match bind_listener(port) {
            Ok((listener, bound)) => {
                self.shared.install_listener(listener, bound);
                info!("listening on [::]:{bound}");
                Ok(bound)
            }
            Err(err) => {
                error!("{err}");
                self.shared.set_state(ConnectionState::error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Begins joining: tears down any prior activity and opens one outbound
    /// stream to `address`/`port` within [`CONNECT_TIMEOUT`].
    ///
    /// `address` may be an IPv6 literal (optionally with a `%zone`), an IPv4
    /// literal, or a host name.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Resolve`], [`ConnectionError::Connect`] or
    ///   [`ConnectionError::ConnectTimeout`] when the attempt fails; the state
    ///   becomes `Error`.
    /// - [`ConnectionError::Cancelled`] when `stop_connection` (or another
    ///   start) interrupts the attempt; the state is left to the interrupter.
    pub async fn connect_to_peer(&self, address: &str, port: u16) -> Result<(), ConnectionError> {
        self.ensure_alive()?;
        self.teardown().await;

        info!("connecting to [{address}]:{port}");
        let (session, task) = self.shared.begin_connect(address, port);
        let outcome = match task.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_cancelled() => Err(ConnectionError::Cancelled),
            Err(join_error) => Err(ConnectionError::Io(io::Error::new(
                io::ErrorKind::Other,
                join_error.to_string(),
            ))),
        };

        match outcome {
            Ok(stream) => self.shared.complete_connect(session, stream, address),
            Err(err) => {
                warn!("{err}");
                self.shared.fail_if_current(session, &err);
                Err(err)
            }
        }
    }

    /// Sends one message to the peer and records it as sent.
    ///
    /// Returns `false` (and records nothing) when there is no open stream or
    /// the write fails.  A failed write does not change the state; the reader
    /// loop reports the broken stream.  A write still pending when the stream
    /// is stopped or replaced fails at that moment.
    pub async fn send_message(&self, content: &str) -> bool {
        match self.try_send_message(content).await {
            Ok(()) => true,
            Err(err) => {
                debug!("send skipped: {err}");
                false
            }
        }
    }

    /// Like [`send_message`](Self::send_message) but reports why nothing was sent.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Destroyed`] after `destroy`.
    /// - [`ConnectionError::NotConnected`] when no peer stream is open.
    /// - [`ConnectionError::Io`] when the write or flush fails, or the stream
    ///   is released before the write completes.
    pub async fn try_send_message(&self, content: &str) -> Result<(), ConnectionError> {
        self.ensure_alive()?;
        let (writer, stream_id, released) = self
            .shared
            .current_writer()
            .ok_or(ConnectionError::NotConnected)?;

        let written = tokio::select! {
            result = write_line(&writer, content) => result,
            () = released => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection stopped during send",
            )),
        };
        drop(writer);
        if let Err(e) = written {
            warn!(%stream_id, "send failed: {e}");
            return Err(ConnectionError::Io(e));
        }
        self.shared
            .messages
            .send_modify(|messages| messages.push(ChatMessage::sent(content)));
        Ok(())
    }

    /// Tears down the listener, the peer stream, and any pending connect, and
    /// sets the state to `Disconnected`.  Safe to call repeatedly.
    pub fn stop_connection(&self) {
        let mut link = self.shared.lock_link();
        let had_resources = link.has_resources();
        self.shared.release_all(&mut link);
        self.shared.set_state(ConnectionState::Disconnected);
        if had_resources {
            info!("connection stopped");
        }
    }

    /// Empties the message list without touching the connection.
    pub fn clear_messages(&self) {
        self.shared.messages.send_replace(Vec::new());
    }

    /// Stops everything and refuses further start, connect, and send calls.
    pub fn destroy(&self) {
        self.stop_connection();
        self.shared.destroyed.store(true, Ordering::Release);
        debug!("connection manager destroyed");
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut link = self.shared.lock_link();
        self.shared.release_all(&mut link);
    }
}

// ── Background tasks ──────────────────────────────────────────────────────────

fn bind_listener(port: u16) -> Result<(TcpListener, u16), ConnectionError> {
    let bind_err = |source| ConnectionError::Bind { port, source };
    let socket = TcpSocket::new_v6().map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket
        .bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)))
        .map_err(bind_err)?;
    let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;
    let bound = listener.local_addr().map_err(bind_err)?.port();
    Ok((listener, bound))
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener, session: u64) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                debug!("accepted connection from {remote}");
                if !shared.attach_inbound(session, stream, peer_label(remote)) {
                    debug!("listener session {session} superseded");
                    break;
                }
            }
            Err(e) => {
                let err = ConnectionError::Accept(e);
                error!("{err}");
                shared.fail_if_current(session, &err);
                break;
            }
        }
    }
}

async fn open_stream(address: String, port: u16) -> Result<TcpStream, ConnectionError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, dial(&address, port)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ConnectionError::ConnectTimeout {
            address,
            port,
            timeout: CONNECT_TIMEOUT,
        }),
    }
}

async fn dial(address: &str, port: u16) -> Result<TcpStream, ConnectionError> {
    let host = address.trim_start_matches('[').trim_end_matches(']');
    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| ConnectionError::Resolve {
            address: address.to_string(),
            source,
        })?
        .collect();

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("connect to {candidate} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(ConnectionError::Connect {
        address: address.to_string(),
        port,
        source: last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved")
        }),
    })
}

async fn read_loop(shared: Arc<Shared>, read_half: OwnedReadHalf, peer: u64, stream_id: Uuid) {
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::with_capacity(256);
    let exit = loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break ReaderExit::EndOfStream,
            Ok(n) => {
                debug!(%stream_id, "received {n} bytes");
                shared.push_received(peer, decode_line(&line));
            }
            Err(e) => break ReaderExit::Failed(e),
        }
    };
    shared.finish_peer(peer, stream_id, exit);
}

async fn write_line(writer: &AsyncMutex<OwnedWriteHalf>, content: &str) -> io::Result<()> {
    let mut frame = Vec::with_capacity(content.len() + 1);
    frame.extend_from_slice(content.as_bytes());
    frame.push(b'\n');
    let mut half = writer.lock().await;
    half.write_all(&frame).await?;
    half.flush().await
}

/// Strips the line terminator (`\n` or `\r\n`) and decodes lossily.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Textual peer address; IPv4-mapped addresses are shown as plain IPv4.
fn peer_label(remote: SocketAddr) -> String {
    match remote.ip() {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV6};

    async fn refused_port() -> u16 {
        let listener = TcpListener::bind("[::1]:0").await.expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        port
    }

    // ── decode_line / peer_label ──────────────────────────────────────────────

    #[test]
    fn test_decode_line_strips_lf_and_crlf() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"\n"), "");
    }

    #[test]
    fn test_decode_line_replaces_invalid_utf8() {
        let decoded = decode_line(b"ok \xff\n");
        assert_eq!(decoded, "ok \u{FFFD}");
    }

    #[test]
    fn test_peer_label_unwraps_ipv4_mapped_addresses() {
        let mapped = Ipv4Addr::new(192, 0, 2, 7).to_ipv6_mapped();
        let remote = SocketAddr::V6(SocketAddrV6::new(mapped, 5000, 0, 0));
        assert_eq!(peer_label(remote), "192.0.2.7");
    }

    #[test]
    fn test_peer_label_keeps_native_ipv6() {
        let remote: SocketAddr = "[2001:db8::5]:5000".parse().expect("literal");
        assert_eq!(peer_label(remote), "2001:db8::5");
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    #[test]
    fn test_new_manager_is_disconnected_and_empty() {
        let manager = ConnectionManager::new();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.messages().is_empty());
        assert_eq!(manager.local_port(), 0);
    }

    #[test]
    fn test_stop_connection_is_idempotent() {
        let manager = ConnectionManager::new();
        manager.stop_connection();
        manager.stop_connection();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_start_server_reports_bound_port_and_listens() {
        // Arrange
        let manager = ConnectionManager::new();

        // Act
        let port = manager.start_server(0).await.expect("bind ephemeral port");

        // Assert
        assert_ne!(port, 0);
        assert_eq!(manager.local_port(), port);
        assert_eq!(manager.state(), ConnectionState::Listening);
    }

    #[tokio::test]
    async fn test_stop_then_restart_server_on_same_port() {
        let manager = ConnectionManager::new();
        let first = manager.start_server(0).await.expect("first start");

        manager.stop_connection();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.local_port(), 0);

        let port = manager.start_server(first).await.expect("second start");
        assert_eq!(port, first);
        assert_eq!(manager.state(), ConnectionState::Listening);
    }

    #[tokio::test]
    async fn test_teardown_leaves_no_retired_tasks() {
        // Arrange
        let manager = ConnectionManager::new();
        manager.start_server(0).await.expect("first start");

        // Act
        manager.teardown().await;

        // Assert
        assert!(manager.shared.lock_link().retired.is_empty());
        assert!(!manager.shared.lock_link().has_resources());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_on_same_port_with_worker_threads() {
        let manager = ConnectionManager::new();
        let port = manager.start_server(0).await.expect("first start");

        let again = manager.start_server(port).await;

        assert_eq!(again.expect("restart on the same port"), port);
        assert_eq!(manager.state(), ConnectionState::Listening);
    }

    #[tokio::test]
    async fn test_start_server_on_busy_port_sets_error() {
        // Arrange: hold a port without SO_REUSEADDR semantics for listening
        let holder = TcpListener::bind("[::]:0").await.expect("bind holder");
        let busy = holder.local_addr().expect("addr").port();
        let manager = ConnectionManager::new();

        // Act
        let result = manager.start_server(busy).await;

        // Assert
        assert!(matches!(result, Err(ConnectionError::Bind { .. })));
        assert!(matches!(manager.state(), ConnectionState::Error { .. }));
    }

    #[tokio::test]
    async fn test_send_without_peer_returns_false_and_records_nothing() {
        let manager = ConnectionManager::new();
        assert!(!manager.send_message("hello").await);
        assert!(matches!(
            manager.try_send_message("hello").await,
            Err(ConnectionError::NotConnected)
        ));
        assert!(manager.messages().is_empty());
    }

    #[tokio::test]
    async fn test_connect_refused_sets_error_state() {
        // Arrange
        let port = refused_port().await;
        let manager = ConnectionManager::new();

        // Act
        let result = manager.connect_to_peer("::1", port).await;

        // Assert
        assert!(matches!(result, Err(ConnectionError::Connect { .. })));
        match manager.state() {
            ConnectionState::Error { message } => assert!(message.contains("failed")),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_destroyed_manager_refuses_operations() {
        let manager = ConnectionManager::new();
        manager.destroy();

        assert!(manager.is_destroyed());
        assert!(matches!(
            manager.start_server(0).await,
            Err(ConnectionError::Destroyed)
        ));
        assert!(matches!(
            manager.connect_to_peer("::1", 1).await,
            Err(ConnectionError::Destroyed)
        ));
        assert!(!manager.send_message("x").await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_clear_messages_leaves_state_untouched() {
        let manager = ConnectionManager::new();
        manager
            .shared
            .messages
            .send_modify(|m| m.push(ChatMessage::received("hi")));

        manager.clear_messages();

        assert!(manager.messages().is_empty());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_timeout_error_message_names_duration() {
        let err = ConnectionError::ConnectTimeout {
            address: "::1".to_string(),
            port: 80,
            timeout: CONNECT_TIMEOUT,
        };
        assert_eq!(err.to_string(), "connection to [::1]:80 timed out after 10s");
    }
}
