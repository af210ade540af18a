// ============================================
// File: crates/decada-transport/src/tls.rs
// ============================================
//! # TLS Socket Transport
//!
//! ## Creation Reason
//! Production `SecureTransport`: TCP connect plus rustls client handshake,
//! configured from the credential slots populated during provisioning.
//!
//! ## Main Functionality
//! - `build_client_config`: PEM credentials to a rustls `ClientConfig`
//! - `TlsTransport`: connect + handshake under one deadline
//! - `TlsSocket`: `SecureSocket` over `tokio_rustls::client::TlsStream`
//!
//! ## ⚠️ Important Note for Next Developer
//! - The ring provider is selected explicitly so no process-wide default
//!   provider has to be installed
//! - SNI uses `SocketEndpoint::sni_hostname`, not the resolved IP
//!
//! ## Last Modified
//! v0.1.0 - Initial TLS transport

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use crate::credentials::TlsCredentials;
use crate::error::{Result, TransportError};
use crate::traits::{SecureSocket, SecureTransport, SocketEndpoint};

/// Default deadline for TCP connect plus handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// Client Configuration
// ============================================

fn parse_certificates(pem: &str, what: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut Cursor::new(pem.as_bytes()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TransportError::tls(format!("invalid {what} PEM: {e}")))?;
    if certs.is_empty() {
        return Err(TransportError::tls(format!("no certificate found in {what} PEM")));
    }
    Ok(certs)
}

fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut Cursor::new(pem.as_bytes()))
        .map_err(|e| TransportError::tls(format!("invalid private key PEM: {e}")))?
        .ok_or_else(|| TransportError::tls("no private key found in PEM"))
}

/// Builds a rustls client configuration from PEM credentials.
///
/// The CA PEM may hold several certificates; all become trust anchors.
/// Client authentication is enabled only when both certificate and key
/// are present.
///
/// # Errors
/// Returns `Tls` if any PEM is unparseable or rustls rejects the key.
pub fn build_client_config(credentials: &TlsCredentials) -> Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    for cert in parse_certificates(&credentials.ca_cert_pem, "CA")? {
        roots
            .add(cert)
            .map_err(|e| TransportError::tls(format!("CA certificate rejected: {e}")))?;
    }

    let builder = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TransportError::tls(e.to_string()))?
    .with_root_certificates(roots);

    match (&credentials.client_cert_pem, &credentials.client_key_pem) {
        (Some(cert), Some(key)) => {
            let chain = parse_certificates(cert, "client certificate")?;
            let key = parse_private_key(key)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| TransportError::tls(format!("client identity rejected: {e}")))
        }
        _ => Ok(builder.with_no_client_auth()),
    }
}

// ============================================
// TlsTransport
// ============================================

/// rustls-backed secure socket factory.
#[derive(Debug, Clone)]
pub struct TlsTransport {
    handshake_timeout: Duration,
}

impl Default for TlsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl TlsTransport {
    /// Creates a transport whose connect + handshake is bounded by
    /// `handshake_timeout`.
    #[must_use]
    pub const fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }

    async fn connect(
        &self,
        addr: SocketAddr,
        server_name: ServerName<'static>,
        config: ClientConfig,
    ) -> Result<TlsStream<TcpStream>> {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                addr,
                reason: e.to_string(),
            })?;
        tcp.set_nodelay(true)?;

        TlsConnector::from(Arc::new(config))
            .connect(server_name, tcp)
            .await
            .map_err(|e| TransportError::tls(format!("handshake with {addr} failed: {e}")))
    }
}

#[async_trait]
impl SecureTransport for TlsTransport {
    async fn open_secure_socket(
        &self,
        endpoint: &SocketEndpoint,
        credentials: &TlsCredentials,
    ) -> Result<Box<dyn SecureSocket>> {
        let config = build_client_config(credentials)?;
        let server_name = ServerName::try_from(endpoint.sni_hostname.clone())
            .map_err(|e| TransportError::tls(format!("invalid SNI hostname: {e}")))?;
        let addr = SocketAddr::new(endpoint.ip, endpoint.port);

        debug!(%addr, sni = %endpoint.sni_hostname, mutual = credentials.has_client_identity(), "Opening TLS socket");

        let stream = tokio::time::timeout(self.handshake_timeout, self.connect(addr, server_name, config))
            .await
            .map_err(|_| {
                TransportError::timeout(
                    format!("TLS connect to {addr}"),
                    u64::try_from(self.handshake_timeout.as_millis()).unwrap_or(u64::MAX),
                )
            })??;

        info!(%addr, "TLS session established");
        Ok(Box::new(TlsSocket { stream }))
    }
}

// ============================================
// TlsSocket
// ============================================

/// Established TLS stream.
pub struct TlsSocket {
    stream: TlsStream<TcpStream>,
}

#[async_trait]
impl SecureSocket for TlsSocket {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|e| TransportError::send(e.to_string()))?;
        self.stream
            .flush()
            .await
            .map_err(|e| TransportError::send(e.to_string()))
    }

    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match tokio::time::timeout(timeout, self.stream.read(buf)).await {
            Err(_) => Err(TransportError::timeout(
                "recv",
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
            Ok(Ok(0)) => Err(TransportError::Closed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(TransportError::RecvFailed {
                reason: e.to_string(),
            }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

// ============================================
// Tests
// ============================================
