//! Authentication strategies.
//!
//! The strategy is fixed when the client is built and applied to every
//! outgoing request through a [`RequestDecorator`].

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::http::HttpRequest;

/// Mutates an outgoing request before it is sent.
pub trait RequestDecorator {
    fn decorate(&self, request: &mut HttpRequest);
}

/// `Authorization: FortifyToken <token>`.
pub struct FortifyTokenAuth<'a> {
    token: &'a str,
}

impl<'a> FortifyTokenAuth<'a> {
    pub fn new(token: &'a str) -> Self {
        Self { token }
    }
}

impl RequestDecorator for FortifyTokenAuth<'_> {
    fn decorate(&self, request: &mut HttpRequest) {
        request.set_header("Authorization", format!("FortifyToken {}", self.token));
    }
}

/// HTTP basic credentials.
pub struct BasicAuth<'a> {
    username: &'a str,
    password: &'a str,
}

impl<'a> BasicAuth<'a> {
    pub fn new(username: &'a str, password: &'a str) -> Self {
        Self { username, password }
    }
}

impl RequestDecorator for BasicAuth<'_> {
    fn decorate(&self, request: &mut HttpRequest) {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        request.set_header("Authorization", format!("Basic {encoded}"));
    }
}

/// How requests are authenticated.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthStrategy {
    Basic { username: String, password: String },
    Token(String),
    #[default]
    None,
}

impl AuthStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthStrategy::Basic { .. } => "basic",
            AuthStrategy::Token(_) => "token",
            AuthStrategy::None => "unauthenticated",
        }
    }

    /// Attach credentials for this strategy to `request`.
    pub fn apply(&self, request: &mut HttpRequest) {
        match self {
            AuthStrategy::Basic { username, password } => {
                BasicAuth::new(username, password).decorate(request)
            }
            AuthStrategy::Token(token) => FortifyTokenAuth::new(token).decorate(request),
            AuthStrategy::None => {}
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthStrategy::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
            AuthStrategy::None => f.write_str("None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: "https://ssc.example.com/ssc/api/v1/projects".to_string(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            files: None,
            stream: false,
        }
    }

    #[test]
    fn token_auth_sets_fortify_header() {
        let mut req = request();
        AuthStrategy::Token("abc-123".into()).apply(&mut req);
        assert_eq!(req.header("authorization"), Some("FortifyToken abc-123"));
    }

    #[test]
    fn basic_auth_encodes_credentials() {
        let mut req = request();
        AuthStrategy::Basic {
            username: "admin".into(),
            password: "password".into(),
        }
        .apply(&mut req);
        assert_eq!(req.header("Authorization"), Some("Basic YWRtaW46cGFzc3dvcmQ="));
    }

    #[test]
    fn none_leaves_headers_alone() {
        let mut req = request();
        AuthStrategy::None.apply(&mut req);
        assert_eq!(req.headers.len(), 1);
        assert!(req.header("Authorization").is_none());
    }

    #[test]
    fn decorator_replaces_existing_authorization() {
        let mut req = request();
        req.headers.push(("authorization".into(), "Bearer stale".into()));
        FortifyTokenAuth::new("fresh").decorate(&mut req);
        assert_eq!(req.header("Authorization"), Some("FortifyToken fresh"));
        assert_eq!(req.headers.len(), 2);
    }

    #[test]
    fn debug_redacts_secrets() {
        let basic = AuthStrategy::Basic {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{basic:?} {:?}", AuthStrategy::Token("s3cret".into()));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
    }
}
