// ============================================
// File: crates/decada-transport/src/mock.rs
// ============================================
//! # Mock Collaborators
//!
//! ## Creation Reason
//! Provides in-memory implementations of every collaborator trait for
//! testing provisioning and session logic without network access.
//!
//! ## Main Functionality
//! - `MockResolver`: table-driven name resolution
//! - `MockTransport` / `MockLink`: scripted secure socket with captured
//!   writes, injected inbound bytes and an optional auto-responder
//! - `MockHttpTransport`: scripted HTTP routes with request recording
//! - `SequenceEntropy`: deterministic, never-repeating "randomness"
//!
//! ## Usage in Tests
//! ```ignore
//! use std::time::Duration;
//! use decada_transport::mock::MockTransport;
//! use decada_transport::traits::{SecureTransport, SocketEndpoint};
//! use decada_transport::credentials::TlsCredentials;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = MockTransport::new();
//! transport.link().inject(b"hello".to_vec());
//!
//! let endpoint = SocketEndpoint {
//!     ip: "127.0.0.1".parse()?,
//!     port: 8883,
//!     sni_hostname: "broker".into(),
//! };
//! let mut socket = transport
//!     .open_secure_socket(&endpoint, &TlsCredentials::server_only("CA"))
//!     .await?;
//! let mut buf = [0u8; 16];
//! let n = socket.recv(&mut buf, Duration::from_millis(10)).await?;
//! assert_eq!(&buf[..n], b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Every socket opened by one `MockTransport` shares the same `MockLink`
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementations

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::credentials::TlsCredentials;
use crate::error::{Result, TransportError};
use crate::traits::{
    EntropySource, HttpMethod, HttpRequest, HttpResponse, HttpTransport, Resolver, SecureSocket,
    SecureTransport, SocketEndpoint,
};

// ============================================
// MockResolver
// ============================================

/// Table-driven resolver.
#[derive(Debug, Default)]
pub struct MockResolver {
    answers: Mutex<HashMap<String, IpAddr>>,
    calls: AtomicUsize,
}

impl MockResolver {
    /// Creates a resolver with no entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    #[must_use]
    pub fn with(self, host: &str, ip: IpAddr) -> Self {
        self.answers.lock().insert(host.to_string(), ip);
        self
    }

    /// Number of `resolve` calls made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .get(host)
            .copied()
            .ok_or_else(|| TransportError::DnsResolution {
                host: host.to_string(),
                attempts: 1,
            })
    }
}

// ============================================
// MockLink
// ============================================

/// Produces replies for each written frame.
pub type Responder = Box<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

/// Shared state behind every `MockSocket` of one `MockTransport`.
pub struct MockLink {
    inbound: Mutex<VecDeque<Vec<u8>>>,
    inbound_notify: Notify,
    written: Mutex<Vec<Vec<u8>>>,
    responder: Mutex<Option<Responder>>,
    fail_sends: AtomicBool,
    peer_closed: AtomicBool,
    closed_by_client: AtomicBool,
    fail_opens: AtomicU32,
    opens: AtomicUsize,
    last_credentials: Mutex<Option<TlsCredentials>>,
}

impl MockLink {
    fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            inbound_notify: Notify::new(),
            written: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
            peer_closed: AtomicBool::new(false),
            closed_by_client: AtomicBool::new(false),
            fail_opens: AtomicU32::new(0),
            opens: AtomicUsize::new(0),
            last_credentials: Mutex::new(None),
        }
    }

    /// Queues bytes for the next `recv`.
    pub fn inject(&self, bytes: Vec<u8>) {
        self.inbound.lock().push_back(bytes);
        self.inbound_notify.notify_one();
    }

    /// Installs a function that answers every written frame.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Box::new(responder));
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` opens fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.fail_opens.store(count, Ordering::SeqCst);
    }

    /// Simulates the peer closing the connection.
    pub fn close_from_peer(&self) {
        self.peer_closed.store(true, Ordering::SeqCst);
        self.inbound_notify.notify_waiters();
        self.inbound_notify.notify_one();
    }

    /// Takes all frames written so far.
    #[must_use]
    pub fn take_written(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.written.lock())
    }

    /// Number of frames written so far.
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.written.lock().len()
    }

    /// Number of successful opens.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// `true` once a socket was closed by the client side.
    #[must_use]
    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }

    /// Credentials passed to the most recent open.
    #[must_use]
    pub fn last_credentials(&self) -> Option<TlsCredentials> {
        self.last_credentials.lock().clone()
    }
}

// ============================================
// MockTransport / MockSocket
// ============================================

/// Scripted `SecureTransport`.
#[derive(Clone)]
pub struct MockTransport {
    link: Arc<MockLink>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a transport with an empty link.
    #[must_use]
    pub fn new() -> Self {
        Self {
            link: Arc::new(MockLink::new()),
        }
    }

    /// Shared link state.
    #[must_use]
    pub fn link(&self) -> Arc<MockLink> {
        Arc::clone(&self.link)
    }
}

#[async_trait]
impl SecureTransport for MockTransport {
    async fn open_secure_socket(
        &self,
        endpoint: &SocketEndpoint,
        credentials: &TlsCredentials,
    ) -> Result<Box<dyn SecureSocket>> {
        let pending_failures = self.link.fail_opens.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.link.fail_opens.store(pending_failures - 1, Ordering::SeqCst);
            return Err(TransportError::ConnectFailed {
                addr: std::net::SocketAddr::new(endpoint.ip, endpoint.port),
                reason: "mock open failure".into(),
            });
        }

        self.link.opens.fetch_add(1, Ordering::SeqCst);
        self.link.peer_closed.store(false, Ordering::SeqCst);
        *self.link.last_credentials.lock() = Some(credentials.clone());
        Ok(Box::new(MockSocket {
            link: Arc::clone(&self.link),
        }))
    }
}

/// Socket over a `MockLink`.
pub struct MockSocket {
    link: Arc<MockLink>,
}

impl MockSocket {
    fn pop_into(&self, buf: &mut [u8]) -> Option<usize> {
        let mut inbound = self.link.inbound.lock();
        let mut frame = inbound.pop_front()?;
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        if n < frame.len() {
            inbound.push_front(frame.split_off(n));
        }
        Some(n)
    }
}

#[async_trait]
impl SecureSocket for MockSocket {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.link.peer_closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.link.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::send("mock send failure"));
        }
        self.link.written.lock().push(data.to_vec());

        let replies = self
            .link
            .responder
            .lock()
            .as_ref()
            .map(|respond| respond(data))
            .unwrap_or_default();
        for reply in replies {
            self.link.inject(reply);
        }
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(n) = self.pop_into(buf) {
                return Ok(n);
            }
            if self.link.peer_closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            if tokio::time::timeout_at(deadline, self.link.inbound_notify.notified())
                .await
                .is_err()
            {
                return Err(TransportError::timeout(
                    "recv",
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.link.closed_by_client.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================
// MockHttpTransport
// ============================================

/// A scripted HTTP outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with this status and body.
    Response(HttpResponse),
    /// Fail without a response.
    Fail(String),
}

impl MockReply {
    /// 200 with `body`.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Response(HttpResponse {
            status: 200,
            body: body.into(),
        })
    }

    /// `status` with `body`.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Response(HttpResponse {
            status,
            body: body.into(),
        })
    }
}

struct Route {
    method: HttpMethod,
    url_contains: String,
    replies: VecDeque<MockReply>,
}

/// Scripted `HttpTransport`.
///
/// Routes match on method plus a URL substring; the first matching route
/// answers. Each route plays its replies in order and keeps repeating the
/// last one. Unmatched requests get a 404.
#[derive(Default)]
pub struct MockHttpTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpTransport {
    /// Creates a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    #[must_use]
    pub fn route(self, method: HttpMethod, url_contains: &str, replies: Vec<MockReply>) -> Self {
        self.routes.lock().push(Route {
            method,
            url_contains: url_contains.to_string(),
            replies: replies.into(),
        });
        self
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests matching `method` and `url_contains`.
    #[must_use]
    pub fn count(&self, method: HttpMethod, url_contains: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.contains(url_contains))
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());

        let reply = {
            let mut routes = self.routes.lock();
            routes
                .iter_mut()
                .find(|route| route.method == request.method && request.url.contains(&route.url_contains))
                .and_then(|route| {
                    if route.replies.len() > 1 {
                        route.replies.pop_front()
                    } else {
                        route.replies.front().cloned()
                    }
                })
        };

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Fail(reason)) => Err(TransportError::http(reason)),
            None => Ok(HttpResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

// ============================================
// SequenceEntropy
// ============================================

/// Deterministic entropy: every call yields a different buffer.
#[derive(Debug, Default)]
pub struct SequenceEntropy {
    counter: AtomicU8,
    fail: AtomicBool,
}

impl SequenceEntropy {
    /// Creates a source starting at counter 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail (or succeed again).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl EntropySource for SequenceEntropy {
    fn fill_random(&self, buf: &mut [u8]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Entropy {
                reason: "mock entropy failure".into(),
            });
        }
        let base = self.counter.fetch_add(1, Ordering::SeqCst);
        for (i, byte) in buf.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let offset = i as u8;
            *byte = base.wrapping_mul(31).wrapping_add(offset);
        }
        Ok(())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> SocketEndpoint {
        SocketEndpoint {
            ip: "127.0.0.1".parse().unwrap(),
            port: 18885,
            sni_hostname: "broker.test".into(),
        }
    }

    #[tokio::test]
    async fn test_resolver_table() {
        let resolver = MockResolver::new().with("broker.test", "10.0.0.1".parse().unwrap());
        assert_eq!(resolver.resolve("broker.test").await.unwrap().to_string(), "10.0.0.1");
        assert!(resolver.resolve("other").await.is_err());
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_socket_responder_and_capture() {
        let transport = MockTransport::new();
        let link = transport.link();
        link.set_responder(|frame| vec![frame.iter().rev().copied().collect()]);

        let mut socket = transport
            .open_secure_socket(&endpoint(), &TlsCredentials::server_only("CA"))
            .await
            .unwrap();
        socket.send(b"abc").await.unwrap();

        let mut buf = [0u8; 2];
        let n = socket.recv(&mut buf, Duration::from_millis(50)).await.unwrap();
        assert_eq!(&buf[..n], b"cb");
        let n = socket.recv(&mut buf, Duration::from_millis(50)).await.unwrap();
        assert_eq!(&buf[..n], b"a");

        assert_eq!(link.take_written(), vec![b"abc".to_vec()]);
        assert_eq!(link.opens(), 1);
        assert_eq!(link.last_credentials().unwrap().ca_cert_pem, "CA");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_timeout_and_close() {
        let transport = MockTransport::new();
        let mut socket = transport
            .open_secure_socket(&endpoint(), &TlsCredentials::server_only("CA"))
            .await
            .unwrap();
        let mut buf = [0u8; 8];

        let err = socket.recv(&mut buf, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_timeout());

        transport.link().close_from_peer();
        let err = socket.recv(&mut buf, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(socket.send(b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_open_and_send_failures() {
        let transport = MockTransport::new();
        transport.link().fail_next_opens(1);
        assert!(transport
            .open_secure_socket(&endpoint(), &TlsCredentials::server_only("CA"))
            .await
            .is_err());

        let mut socket = transport
            .open_secure_socket(&endpoint(), &TlsCredentials::server_only("CA"))
            .await
            .unwrap();
        transport.link().set_fail_sends(true);
        assert!(socket.send(b"x").await.unwrap_err().is_disconnect());
    }

    #[tokio::test]
    async fn test_http_routes_are_sticky() {
        let http = MockHttpTransport::new().route(
            HttpMethod::Post,
            "/token",
            vec![MockReply::Fail("down".into()), MockReply::ok("{}")],
        );

        assert!(http.execute(HttpRequest::post("https://x/token")).await.is_err());
        assert_eq!(http.execute(HttpRequest::post("https://x/token")).await.unwrap().status, 200);
        assert_eq!(http.execute(HttpRequest::post("https://x/token")).await.unwrap().status, 200);
        assert_eq!(http.execute(HttpRequest::get("https://x/token")).await.unwrap().status, 404);
        assert_eq!(http.count(HttpMethod::Post, "/token"), 3);
    }

    #[test]
    fn test_sequence_entropy_never_repeats() {
        let entropy = SequenceEntropy::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        entropy.fill_random(&mut a).unwrap();
        entropy.fill_random(&mut b).unwrap();
        assert_ne!(a, b);

        entropy.set_fail(true);
        assert!(entropy.fill_random(&mut a).is_err());
    }
}
