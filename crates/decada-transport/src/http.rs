// ============================================
// File: crates/decada-transport/src/http.rs
// ============================================
//! # HTTPS Transport
//!
//! `HttpTransport` backed by a `reqwest::Client` using rustls. An extra CA
//! bundle can be trusted in addition to the built-in web roots, for API
//! gateways fronted by a private CA.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Default whole-request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed HTTPS client.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Creates a client with a whole-request `timeout` that additionally
    /// trusts the certificates in `extra_ca_pem`.
    ///
    /// # Errors
    /// Returns `Http` if the CA bundle is unparseable or the client cannot
    /// be built.
    pub fn new(timeout: Duration, extra_ca_pem: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder().use_rustls_tls().timeout(timeout);
        if let Some(pem) = extra_ca_pem {
            let certs = Certificate::from_pem_bundle(pem.as_bytes())
                .map_err(|e| TransportError::http(format!("invalid API CA bundle: {e}")))?;
            if certs.is_empty() {
                return Err(TransportError::http("API CA bundle holds no certificates"));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::http(format!("failed to build client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(&request.url),
            HttpMethod::Post => self.http.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::http(format!("{} {}: {e}", request.method, request.url)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::http(format!("reading body: {e}")))?;

        debug!(method = %request.method, url = %request.url, status, "HTTP exchange complete");
        Ok(HttpResponse { status, body })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_extra_ca() {
        assert!(ReqwestTransport::new(DEFAULT_HTTP_TIMEOUT, None).is_ok());
    }

    #[test]
    fn test_bad_ca_bundle_rejected() {
        let err = ReqwestTransport::new(DEFAULT_HTTP_TIMEOUT, Some("no certificates here")).unwrap_err();
        assert!(matches!(err, TransportError::Http { .. }));
    }
}
