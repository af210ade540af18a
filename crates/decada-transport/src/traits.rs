// ============================================
// File: crates/decada-transport/src/traits.rs
// ============================================
//! # Collaborator Traits
//!
//! ## Creation Reason
//! Defines the narrow interfaces through which the provisioning and
//! session logic reach the outside world, enabling mock implementations
//! for testing and platform-specific implementations in production.
//!
//! ## Main Functionality
//! - `Resolver`: hostname to IP address
//! - `SecureTransport` / `SecureSocket`: authenticated byte stream
//! - `HttpTransport`: one HTTPS request/response exchange
//! - `EntropySource`: random bytes for seeding the key DRBG
//!
//! ## Design Philosophy
//! - Async-first design with `async_trait`
//! - Every blocking network call takes or carries an explicit deadline
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync for use in async contexts
//! - `SecureSocket::recv` reports an idle deadline as `Timeout`, which
//!   callers treat as "no data yet", not as a failure
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::credentials::TlsCredentials;
use crate::error::Result;

// ============================================
// Resolver
// ============================================

/// Resolves broker and API hostnames.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `host` to one IP address.
    ///
    /// # Errors
    /// Returns `DnsResolution` once the implementation's attempt budget
    /// is exhausted.
    async fn resolve(&self, host: &str) -> Result<IpAddr>;
}

// ============================================
// SecureSocket / SecureTransport
// ============================================

/// Where to open a secure socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEndpoint {
    /// Resolved address.
    pub ip: IpAddr,
    /// TCP port.
    pub port: u16,
    /// Hostname presented via SNI and checked against the certificate.
    pub sni_hostname: String,
}

/// A connected, authenticated byte stream.
#[async_trait]
pub trait SecureSocket: Send {
    /// Writes all of `data`.
    ///
    /// # Errors
    /// Returns `SendFailed` or `Closed` if the stream is unusable.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Reads available bytes into `buf`, waiting at most `timeout`.
    ///
    /// # Returns
    /// Number of bytes read (never 0)
    ///
    /// # Errors
    /// - `Timeout` if nothing arrived in time
    /// - `Closed` if the peer closed the stream
    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Shuts the stream down.
    ///
    /// # Errors
    /// Returns error if shutdown fails
    async fn close(&mut self) -> Result<()>;
}

/// Opens secure sockets configured with installed credentials.
#[async_trait]
pub trait SecureTransport: Send + Sync {
    /// Connects and completes the TLS handshake.
    ///
    /// # Errors
    /// Returns `ConnectFailed`, `Tls` or `Timeout`.
    async fn open_secure_socket(
        &self,
        endpoint: &SocketEndpoint,
        credentials: &TlsCredentials,
    ) -> Result<Box<dyn SecureSocket>>;
}

// ============================================
// HttpTransport
// ============================================

/// HTTP method subset used by the cloud API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// An outgoing HTTPS request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// URL without query string.
    pub url: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body, if any.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Starts a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Starts a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Sets the query parameters.
    #[must_use]
    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the value of header `name` (case-insensitive).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of query parameter `name`.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A received HTTPS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// Returns `true` for 2xx status codes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Performs one HTTPS exchange.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `request` and returns the response, whatever its status.
    ///
    /// # Errors
    /// Returns `Http` if no response was received.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

// ============================================
// EntropySource
// ============================================

/// Hardware or OS randomness.
pub trait EntropySource: Send + Sync {
    /// Fills `buf` with random bytes.
    ///
    /// # Errors
    /// Returns `Entropy` if the source is unavailable.
    fn fill_random(&self, buf: &mut [u8]) -> Result<()>;
}

// ============================================
// Tests
// ============================================
