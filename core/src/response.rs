//! The uniform result of every client call.
//!
//! # Design
//! Success, HTTP errors, undecodable bodies and transport failures all come
//! back as a `Response`. Fields are private and only readable, so a value is
//! fixed once the dispatcher builds it. `response_code` is `-1` whenever no
//! HTTP response was obtained.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{find_header, HttpResponse};

/// Response code used when no HTTP response was obtained.
pub const NO_RESPONSE_CODE: i32 = -1;

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The body parsed as JSON.
    Json(Value),
    /// The body was not JSON and is passed through unchanged.
    Raw(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Json(_) => None,
            Payload::Raw(bytes) => Some(bytes),
        }
    }

    /// Decode `body` as JSON, keeping the bytes when it is not JSON.
    fn decode(body: Vec<u8>) -> Self {
        match serde_json::from_slice(&body) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(body),
        }
    }
}

// Raw bytes serialize as (lossy) UTF-8 text.
impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Json(value) => value.serialize(serializer),
            Payload::Raw(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(value) => write!(f, "{value}"),
            Payload::Raw(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// Container for all SSC API responses, even errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    success: bool,
    message: String,
    response_code: i32,
    data: Option<Payload>,
    headers: Option<Vec<(String, String)>>,
}

impl Response {
    /// A failure that never reached the server or produced no HTTP response.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            response_code: NO_RESPONSE_CODE,
            data: None,
            headers: None,
        }
    }

    /// Classify an HTTP response obtained from the transport.
    ///
    /// 2xx is a success; every other status is a failure that still carries
    /// the status code, headers and whatever body the server sent.
    pub fn from_http(response: HttpResponse) -> Self {
        let status = response.status;
        let (success, message) = match status {
            200..=299 => (true, "OK".to_string()),
            400..=599 => (false, format!("The server returned an error status: HTTP {status}.")),
            _ => (false, format!("Unexpected HTTP status {status}.")),
        };
        let data = if response.body.is_empty() {
            None
        } else {
            Some(Payload::decode(response.body))
        };
        Self {
            success,
            message,
            response_code: i32::from(status),
            data,
            headers: Some(response.headers),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response_code(&self) -> i32 {
        self.response_code
    }

    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    /// The body as JSON, if it decoded as JSON.
    pub fn json(&self) -> Option<&Value> {
        self.data.as_ref().and_then(Payload::as_json)
    }

    /// The body as raw bytes, if it was not JSON.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_ref().and_then(Payload::as_bytes)
    }

    pub fn into_data(self) -> Option<Payload> {
        self.data
    }

    pub fn headers(&self) -> Option<&[(String, String)]> {
        self.headers.as_deref()
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_deref().and_then(|h| find_header(h, name))
    }

    /// Serialize `data` as JSON text. `pretty` sorts keys and indents by four spaces.
    pub fn data_json(&self, pretty: bool) -> serde_json::Result<String> {
        if !pretty {
            return serde_json::to_string(&self.data);
        }
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        // Value::Object is a BTreeMap here, so keys come out sorted.
        self.data.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        Response::failure(err.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{data}"),
            None => f.write_str(&self.message),
        }
    }
}
