//! The "perform an HTTP request" capability the dispatcher depends on.
//!
//! # Design
//! `Transport` is the only place network I/O happens. A transport returns
//! every HTTP status as data; only failures to obtain a response at all are
//! errors, already sorted into the categories the dispatcher reports.
//! [`UreqTransport`] is the default blocking implementation.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use ureq::unversioned::multipart::{Form, Part};
use ureq::Agent;

use crate::config::Config;
use crate::http::{HttpRequest, HttpResponse};
use crate::tls;

/// Why no HTTP response could be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{0}")]
    Ssl(String),

    #[error("{0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    /// A response arrived but its body could not be read or decoded.
    #[error("{0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

/// Executes prepared requests.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a `ureq` agent.
///
/// Response bodies are read in full. A body cap applies only when one is
/// configured, and never to `stream` requests.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    verify_ssl: bool,
    body_limit: Option<u64>,
}

impl UreqTransport {
    pub fn new(config: &Config) -> Self {
        Self::with_options(config.timeout, config.verify_ssl).with_body_limit(config.max_body_size)
    }

    pub fn with_options(timeout: Duration, verify_ssl: bool) -> Self {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(!verify_ssl)
            .build();
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .tls_config(tls)
            .build()
            .new_agent();
        Self {
            agent,
            verify_ssl,
            body_limit: None,
        }
    }

    /// Cap buffered (non-stream) response bodies at `limit` bytes; `None` reads everything.
    pub fn with_body_limit(mut self, limit: Option<u64>) -> Self {
        self.body_limit = limit;
        self
    }

    fn body_limit_for(&self, stream: bool) -> u64 {
        match (stream, self.body_limit) {
            (false, Some(limit)) => limit,
            _ => u64::MAX,
        }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if !self.verify_ssl && !tls::insecure_tls_acknowledged() {
            warn!(url = %request.url, "sending request without TLS certificate verification");
        }

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let HttpRequest {
            body, files, stream, ..
        } = request;
        let invalid = |e: ureq::http::Error| TransportError::Other(e.to_string());

        let result = match (&files, body) {
            (Some(files), _) => {
                let mut form = Form::new();
                for part in files.parts() {
                    form = form.part(
                        &part.field,
                        Part::bytes(&part.content).file_name(&part.file_name),
                    );
                }
                self.agent.run(builder.body(form).map_err(invalid)?)
            }
            (None, Some(body)) => self.agent.run(builder.body(body).map_err(invalid)?),
            (None, None) => self.agent.run(builder.body(()).map_err(invalid)?),
        };
        let mut response = result.map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit_for(stream))
            .read_to_vec();
        let body = body.map_err(|e| match TransportError::from(e) {
            TransportError::Timeout => TransportError::Timeout,
            other => TransportError::Body(other.to_string()),
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        let detail = err.to_string();
        match &err {
            ureq::Error::Timeout(_) => TransportError::Timeout,
            ureq::Error::Tls(_) => TransportError::Ssl(detail),
            ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
                TransportError::Connection(detail)
            }
            ureq::Error::Io(io_err) => classify_io(io_err.kind(), detail),
            _ if looks_like_tls(&detail) => TransportError::Ssl(detail),
            _ => TransportError::Other(detail),
        }
    }
}

fn classify_io(kind: io::ErrorKind, detail: String) -> TransportError {
    match kind {
        io::ErrorKind::TimedOut => TransportError::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::BrokenPipe => TransportError::Connection(detail),
        _ if looks_like_tls(&detail) => TransportError::Ssl(detail),
        _ => TransportError::Other(detail),
    }
}

// TLS backend errors (rustls, native-tls) have no dedicated variant on
// every feature set, so fall back to their rendered message.
fn looks_like_tls(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["tls", "ssl", "certificate", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
}
