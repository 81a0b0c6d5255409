//! Common test utilities for netconf-session integration tests
//!
//! Provides in-memory peers, a scripted transport connector, a mock TCP
//! server and a listener that records every callback.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::BytesMut;
use netconf_session::framing::chunk::encode_chunks;
use netconf_session::traits::*;
use netconf_session::{
    CapabilitySet, ChunkAggregator, EomFrameDecoder, HelloMessage, NetconfMessage, Session,
    BASE_1_0, BASE_1_1,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio_util::codec::Decoder;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Upper bound for anything a test waits on
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const RPC_GET: &str =
    r#"<rpc message-id="101" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><get/></rpc>"#;

pub const RPC_REPLY_OK: &str =
    r#"<rpc-reply message-id="101" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><ok/></rpc-reply>"#;

pub fn base_1_0() -> CapabilitySet {
    CapabilitySet::new([BASE_1_0])
}

pub fn base_1_1() -> CapabilitySet {
    CapabilitySet::new([BASE_1_0, BASE_1_1])
}

pub fn server_hello(capabilities: CapabilitySet, session_id: u64) -> HelloMessage {
    HelloMessage::new(capabilities).with_session_id(session_id)
}

/// The remote end of a connection under test
pub struct MockPeer<S> {
    stream: S,
    buffer: BytesMut,
    chunked: bool,
}

impl<S> MockPeer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            chunked: false,
        }
    }

    /// Switch both directions to chunked framing
    pub fn use_chunked_framing(&mut self) {
        self.chunked = true;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Send a document with the peer's current framing
    pub async fn send_document(&mut self, document: &str) {
        let mut out = BytesMut::new();
        if self.chunked {
            encode_chunks(document.as_bytes(), 8192, &mut out);
        } else {
            out.extend_from_slice(document.as_bytes());
            out.extend_from_slice(b"]]>]]>");
        }
        self.send_raw(&out).await;
    }

    pub async fn send_hello(&mut self, hello: &HelloMessage) {
        self.send_document(&hello.to_document()).await;
    }

    /// Read one document with the peer's current framing
    pub async fn read_document(&mut self) -> String {
        tokio::time::timeout(TEST_TIMEOUT, self.read_document_inner())
            .await
            .expect("timed out reading document")
            .expect("stream ended before a complete document")
    }

    /// Read one document if it arrives within `within`
    pub async fn try_read_document(&mut self, within: Duration) -> Option<String> {
        tokio::time::timeout(within, self.read_document_inner())
            .await
            .ok()
            .flatten()
    }

    async fn read_document_inner(&mut self) -> Option<String> {
        let mut eom = EomFrameDecoder::new(1024 * 1024);
        let mut chunks = ChunkAggregator::new(1024 * 1024);
        loop {
            let decoded = if self.chunked {
                chunks.decode(&mut self.buffer)
            } else {
                eom.decode(&mut self.buffer)
            };
            if let Some(frame) = decoded.unwrap() {
                return Some(String::from_utf8(frame.to_vec()).unwrap());
            }
            if self.stream.read_buf(&mut self.buffer).await.ok()? == 0 {
                return None;
            }
        }
    }

    pub async fn read_hello(&mut self) -> HelloMessage {
        HelloMessage::from_document(&self.read_document().await).unwrap()
    }

    /// True if the other side closed the stream without sending anything more
    pub async fn closed_by_remote(&mut self) -> bool {
        let mut scratch = [0u8; 1024];
        loop {
            match tokio::time::timeout(TEST_TIMEOUT, self.stream.read(&mut scratch)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }

    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Wrap a connected in-memory pair as (client stream, peer)
pub fn duplex_pair() -> (TransportStream, MockPeer<DuplexStream>) {
    let (client, server) = tokio::io::duplex(256 * 1024);
    (TransportStream::new(client, "mock-peer"), MockPeer::new(server))
}

/// Two transport streams joined by an in-memory pipe holding at most
/// `capacity` bytes in each direction
pub fn transport_pair(capacity: usize) -> (TransportStream, TransportStream) {
    let (client, server) = tokio::io::duplex(capacity);
    (
        TransportStream::new(client, "mock-server"),
        TransportStream::new(server, "mock-client"),
    )
}

/// A stream that reads normally but fails every write
pub struct RejectingWrites {
    inner: DuplexStream,
}

impl RejectingWrites {
    /// The stream and the peer end it reads from
    pub fn pair() -> (TransportStream, DuplexStream) {
        let (local, remote) = tokio::io::duplex(1024);
        let stream = TransportStream::new(Self { inner: local }, "rejecting-peer");
        (stream, remote)
    }
}

impl AsyncRead for RejectingWrites {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RejectingWrites {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "write rejected")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// What the scripted connector does on a connect call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Refuse,
    Accept,
}

/// Connector following a script; refuses once the script runs out
pub struct ScriptedConnector {
    script: Mutex<VecDeque<ConnectOutcome>>,
    peers: mpsc::UnboundedSender<MockPeer<DuplexStream>>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(
        script: impl IntoIterator<Item = ConnectOutcome>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer<DuplexStream>>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            peers,
            connects: AtomicUsize::new(0),
        });
        (connector, rx)
    }

    pub fn push(&self, outcome: ConnectOutcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    async fn connect(&self, _timeout: Duration) -> Result<TransportStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().pop_front().unwrap_or(ConnectOutcome::Refuse);
        match outcome {
            ConnectOutcome::Refuse => Err(NetconfError::Transport("connection refused".into())),
            ConnectOutcome::Accept => {
                let (stream, peer) = duplex_pair();
                let _ = self.peers.send(peer);
                Ok(stream)
            }
        }
    }

    fn peer(&self) -> String {
        "mock-peer".to_string()
    }
}

/// Every callback a listener received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Up(u64),
    Down(u64, NetconfError),
    Terminated(u64, String),
    Message(u64, String),
    Error(u64, NetconfError),
}

pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    tx: mpsc::UnboundedSender<ListenerEvent>,
}

impl RecordingListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ListenerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Arc::new(Self {
            events: Mutex::new(Vec::new()),
            tx,
        });
        (listener, rx)
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    fn record(&self, event: ListenerEvent) {
        self.events.lock().push(event.clone());
        let _ = self.tx.send(event);
    }
}

impl SessionListener for RecordingListener {
    fn on_session_up(&self, session: &Session) {
        self.record(ListenerEvent::Up(session.session_id()));
    }

    fn on_session_down(&self, session: &Session, cause: &NetconfError) {
        self.record(ListenerEvent::Down(session.session_id(), cause.clone()));
    }

    fn on_session_terminated(&self, session: &Session, reason: &TerminationReason) {
        self.record(ListenerEvent::Terminated(
            session.session_id(),
            reason.reason().to_string(),
        ));
    }

    fn on_message(&self, session: &Session, message: NetconfMessage) {
        self.record(ListenerEvent::Message(
            session.session_id(),
            message.into_document(),
        ));
    }

    fn on_error(&self, session: &Session, error: &NetconfError) {
        self.record(ListenerEvent::Error(session.session_id(), error.clone()));
    }
}

/// Wait for the next listener callback
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ListenerEvent>) -> ListenerEvent {
    tokio::time::timeout(TEST_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for listener event")
        .expect("listener dropped")
}

/// A NETCONF server over TCP
///
/// Every accepted connection gets a hello with an increasing session id.
/// Framing follows the client hello; every request is answered with
/// [`RPC_REPLY_OK`].
pub struct MockNetconfServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockNetconfServer {
    pub async fn start(capabilities: CapabilitySet) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            let mut next_session_id = 1;
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let hello = server_hello(capabilities.clone(), next_session_id);
                                next_session_id += 1;
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, hello, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: TcpStream, hello: HelloMessage, shutdown: Arc<Notify>) {
        let mut peer = MockPeer::new(stream);
        peer.send_hello(&hello).await;

        let client = tokio::select! {
            client = peer.read_document_inner() => match client {
                Some(document) => HelloMessage::from_document(&document),
                None => return,
            },
            _ = shutdown.notified() => return,
        };
        let Ok(client) = client else { return };
        if client.capabilities().supports_chunked_framing()
            && hello.capabilities().supports_chunked_framing()
        {
            peer.use_chunked_framing();
        }

        loop {
            tokio::select! {
                request = peer.read_document_inner() => match request {
                    Some(_) => peer.send_document(RPC_REPLY_OK).await,
                    None => break,
                },
                _ = shutdown.notified() => break,
            }
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockNetconfServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
