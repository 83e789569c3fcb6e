//! HTTP exchange types handed to and returned from a [`Transport`].
//!
//! # Design
//! Requests and responses are plain data. The dispatcher fills in an
//! `HttpRequest` (URL, headers, auth, body) and a transport turns it into an
//! `HttpResponse`. Nothing in this module touches the network, so the
//! dispatcher can be exercised against scripted transports in tests.
//!
//! [`Transport`]: crate::transport::Transport

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Methods that get a JSON `Content-Type` when the caller supplies no headers.
    pub(crate) fn sends_json(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Post | HttpMethod::Put)
    }
}

/// A fully prepared HTTP request: absolute URL, final headers, body or files.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Files to send as `multipart/form-data`; the transport encodes them
    /// and sets the boundary. Takes precedence over `body`.
    pub files: Option<MultipartForm>,
    /// Read the response body without any configured size limit.
    pub stream: bool,
}

impl HttpRequest {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Replace every header named `name` with a single `name: value` entry.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_header(&mut self.headers, name, value.into());
    }
}

/// A raw HTTP response as returned by a transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

/// A single file part of a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Files to send as `multipart/form-data`.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file under `field`; the transport sends it as `application/octet-stream`.
    pub fn file(mut self, field: &str, file_name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.parts.push(FilePart {
            field: field.to_string(),
            file_name: file_name.to_string(),
            content: content.into(),
        });
        self
    }

    pub fn parts(&self) -> &[FilePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Extract the file name from a `Content-Disposition` header value.
///
/// Understands `filename="x"`, bare `filename=x` and the RFC 5987 form
/// `filename*=UTF-8''x` (which wins when both are present). Returns `None`
/// when no usable name is found.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(value).into_iter().skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let raw = raw.trim();
        if key.eq_ignore_ascii_case("filename*") {
            extended = raw
                .split_once("''")
                .and_then(|(_, name)| percent_decode_str(name).decode_utf8().ok())
                .map(Cow::into_owned)
                .filter(|name| !name.is_empty());
        } else if key.eq_ignore_ascii_case("filename") {
            let name = raw.trim_matches(|c| c == '"' || c == '\'');
            if !name.is_empty() {
                plain = Some(name.to_string());
            }
        }
    }

    extended.or(plain)
}

/// Split header parameters on `;`, except inside double-quoted values.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}
