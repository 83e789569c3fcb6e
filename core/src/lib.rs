//! Blocking client for the SSC REST API.
//!
//! # Overview
//! Endpoint methods on [`SscClient`] (projects, versions, attributes,
//! artifacts, file and auth tokens, cloud scan jobs) build a
//! [`DispatchRequest`] and pass it to the [`Dispatcher`], which adds
//! headers and credentials, performs the call through a [`Transport`], and
//! normalizes the outcome into a [`Response`].
//!
//! # Design
//! - Every call returns a `Response`: HTTP errors keep their status code,
//!   non-JSON bodies are passed through as raw bytes, and transport failures
//!   come back with `response_code == -1` and a descriptive message.
//! - Authentication is an [`AuthStrategy`] chosen once from [`Config`].
//! - I/O happens only behind the `Transport` trait; [`UreqTransport`] is the
//!   default.
//!
//! ```no_run
//! use ssc_core::{Config, SscClient};
//!
//! let client = SscClient::new(Config::new("https://ssc.example.com").with_token("token"));
//! let response = client.get_projects();
//! if response.success() {
//!     println!("{}", response.data_json(true).unwrap_or_default());
//! } else {
//!     eprintln!("{}", response.message());
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod response;
pub mod tls;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use auth::{AuthStrategy, BasicAuth, FortifyTokenAuth, RequestDecorator};
pub use client::SscClient;
pub use config::{Config, DEFAULT_CLIENT_VERSION, DEFAULT_TIMEOUT};
pub use dispatch::{DispatchRequest, Dispatcher};
pub use error::{ApiError, Result};
pub use http::{filename_from_content_disposition, HttpMethod, HttpRequest, HttpResponse, MultipartForm};
pub use response::{Payload, Response, NO_RESPONSE_CODE};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{
    AttributeDefinition, AttributeOption, AttributeValue, CommitPayload, FileTokenPurpose,
    FileTokenRequest, ProjectRef, ProjectVersionAttribute, ProjectVersionPayload,
};
