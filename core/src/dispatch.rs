//! The single choke point every endpoint call goes through.
//!
//! # Design
//! `Dispatcher` owns the configuration and the transport. For each
//! [`DispatchRequest`] it fills in default headers, the user agent, the
//! absolute URL and credentials, hands the result to the transport, and
//! folds whatever happens into a [`Response`]. It never returns an error
//! and never panics on a failed call.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::ApiError;
use crate::http::{self, HttpMethod, HttpRequest, MultipartForm};
use crate::response::Response;
use crate::transport::{Transport, TransportError};

/// One call to the server, as described by an endpoint method.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub method: HttpMethod,
    /// Path relative to the configured host; may carry its own query string.
    pub path: String,
    /// Extra query parameters, URL-escaped when appended.
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    /// Multipart files; when present they replace `body`.
    pub files: Option<MultipartForm>,
    /// Header overrides; `None` means the JSON defaults apply.
    pub headers: Option<Vec<(String, String)>>,
    pub stream: bool,
}

impl DispatchRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            files: None,
            headers: None,
            stream: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `payload` as the JSON body.
    pub fn json<P: Serialize + ?Sized>(self, payload: &P) -> Result<Self, ApiError> {
        let body = serde_json::to_string(payload)?;
        Ok(self.body(body))
    }

    pub fn files(mut self, files: MultipartForm) -> Self {
        self.files = Some(files);
        self
    }

    pub fn headers<K: Into<String>, V: Into<String>>(
        mut self,
        headers: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.headers = Some(
            headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn stream(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Builds, authenticates, sends and classifies requests.
#[derive(Debug)]
pub struct Dispatcher<T> {
    config: Config,
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(config: Config, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` and normalize the outcome.
    pub fn dispatch(&self, request: DispatchRequest) -> Response {
        let method = request.method;
        let path = request.path.clone();

        let prepared = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(err) => return self.transport_failure(method, &path, err),
        };

        debug!(method = method.as_str(), path = %path, auth = self.config.auth.kind(), "sending request");
        match self.transport.send(prepared) {
            Ok(http_response) => {
                let response = Response::from_http(http_response);
                debug!(
                    method = method.as_str(),
                    path = %path,
                    status = response.response_code(),
                    success = response.success(),
                    "request completed"
                );
                response
            }
            Err(err) => self.transport_failure(method, &path, err),
        }
    }

    /// Assemble the final request: headers, user agent, URL, body and auth.
    pub fn prepare(&self, request: DispatchRequest) -> Result<HttpRequest, TransportError> {
        let mut headers = match request.headers {
            Some(headers) if !headers.is_empty() => headers,
            _ => {
                let mut defaults = vec![("Accept".to_string(), "application/json".to_string())];
                if request.method.sends_json() {
                    defaults.push(("Content-Type".to_string(), "application/json".to_string()));
                }
                defaults
            }
        };
        http::set_header(&mut headers, "User-Agent", self.config.user_agent.clone());

        let (body, files) = match request.files {
            Some(files) => (None, Some(files)),
            None => (request.body.map(String::into_bytes), None),
        };

        let mut prepared = HttpRequest {
            method: request.method,
            url: self.url(&request.path, &request.query)?,
            headers,
            body,
            files,
            stream: request.stream,
        };
        self.config.auth.apply(&mut prepared);
        Ok(prepared)
    }

    fn url(&self, path: &str, query: &[(String, String)]) -> Result<String, TransportError> {
        let raw = format!("{}{}", self.config.host, path);
        let mut url = Url::parse(&raw)
            .map_err(|e| TransportError::Other(format!("Invalid URL {raw:?}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    fn transport_failure(&self, method: HttpMethod, path: &str, err: TransportError) -> Response {
        warn!(method = method.as_str(), path = %path, error = %err, "request failed");
        let message = match err {
            TransportError::Ssl(detail) => format!("An SSL error occurred. {detail}"),
            TransportError::Connection(detail) => format!("A connection error occurred. {detail}"),
            TransportError::Timeout => format!(
                "The request timed out after {} seconds.",
                format_secs(self.config.timeout)
            ),
            TransportError::Body(detail) => format!("JSON response could not be decoded {detail}."),
            TransportError::Other(detail) => {
                format!("There was an error while handling the request. {detail}")
            }
        };
        Response::failure(message)
    }
}

fn format_secs(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        timeout.as_secs_f64().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::testing::ScriptedTransport;
    use serde_json::json;

    const HOST: &str = "https://ssc.example.com";

    fn dispatcher(config: Config) -> (Dispatcher<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new();
        (Dispatcher::new(config, transport.clone()), transport)
    }

    fn ok_json(status: u16, body: serde_json::Value) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        })
    }

    #[test]
    fn default_headers_for_json_methods() {
        let (d, _) = dispatcher(Config::new(HOST).with_user_agent("agent/1"));
        for request in [
            DispatchRequest::get("/x"),
            DispatchRequest::post("/x"),
            DispatchRequest::put("/x"),
        ] {
            let prepared = d.prepare(request).unwrap();
            assert_eq!(prepared.header("Accept"), Some("application/json"));
            assert_eq!(prepared.header("Content-Type"), Some("application/json"));
            assert_eq!(prepared.header("User-Agent"), Some("agent/1"));
        }
    }

    #[test]
    fn delete_gets_no_content_type() {
        let (d, _) = dispatcher(Config::new(HOST));
        let prepared = d.prepare(DispatchRequest::delete("/x")).unwrap();
        assert_eq!(prepared.header("Accept"), Some("application/json"));
        assert!(prepared.header("Content-Type").is_none());
    }

    #[test]
    fn caller_headers_replace_defaults_but_not_user_agent() {
        let (d, _) = dispatcher(Config::new(HOST).with_user_agent("agent/1"));
        let prepared = d
            .prepare(DispatchRequest::get("/x").headers([("Accept", "text/html"), ("user-agent", "curl")]))
            .unwrap();
        assert_eq!(prepared.header("Accept"), Some("text/html"));
        assert!(prepared.header("Content-Type").is_none());
        assert_eq!(prepared.header("User-Agent"), Some("agent/1"));
        assert_eq!(prepared.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("user-agent")).count(), 1);
    }

    #[test]
    fn query_pairs_are_escaped_and_appended() {
        let (d, _) = dispatcher(Config::new(HOST));
        let prepared = d
            .prepare(
                DispatchRequest::get("/ssc/upload/resultFileUpload.html?mat=abc")
                    .query("Upload", "Submit Query")
                    .query("q", "name:\"Dev Phase\""),
            )
            .unwrap();
        assert_eq!(
            prepared.url,
            "https://ssc.example.com/ssc/upload/resultFileUpload.html?mat=abc&Upload=Submit+Query&q=name%3A%22Dev+Phase%22"
        );
    }

    #[test]
    fn auth_strategies_are_applied() {
        let (d, _) = dispatcher(Config::new(HOST).with_token("tok"));
        let prepared = d.prepare(DispatchRequest::get("/x")).unwrap();
        assert_eq!(prepared.header("Authorization"), Some("FortifyToken tok"));

        let (d, _) = dispatcher(Config::new(HOST).with_basic_auth("admin", "password"));
        let prepared = d.prepare(DispatchRequest::get("/x")).unwrap();
        assert_eq!(prepared.header("Authorization"), Some("Basic YWRtaW46cGFzc3dvcmQ="));

        let (d, _) = dispatcher(Config::new(HOST));
        let prepared = d.prepare(DispatchRequest::get("/x")).unwrap();
        assert!(prepared.header("Authorization").is_none());
    }

    #[test]
    fn multipart_files_replace_body() {
        let (d, _) = dispatcher(Config::new(HOST));
        let form = MultipartForm::new().file("file", "scan.fpr", b"data".to_vec());
        let prepared = d
            .prepare(
                DispatchRequest::post("/upload")
                    .body("ignored")
                    .files(form)
                    .headers([("Accept", "*/*")]),
            )
            .unwrap();
        assert!(prepared.body.is_none());
        assert!(prepared.header("Content-Type").is_none());
        let files = prepared.files.unwrap();
        assert_eq!(files.parts()[0].file_name, "scan.fpr");
        assert_eq!(files.parts()[0].content, b"data");
    }

    #[test]
    fn success_with_json() {
        let (d, t) = dispatcher(Config::new(HOST));
        t.push(ok_json(200, json!({"data": [1, 2]})));
        let resp = d.dispatch(DispatchRequest::get("/ssc/api/v1/projects"));
        assert!(resp.success());
        assert_eq!(resp.response_code(), 200);
        assert_eq!(resp.json(), Some(&json!({"data": [1, 2]})));
        assert_eq!(t.requests().len(), 1);
    }

    #[test]
    fn server_error_is_failure_with_code() {
        let (d, t) = dispatcher(Config::new(HOST));
        t.push(ok_json(500, json!({"message": "boom"})));
        let resp = d.dispatch(DispatchRequest::get("/x"));
        assert!(!resp.success());
        assert_eq!(resp.response_code(), 500);
        assert_eq!(resp.json().unwrap()["message"], "boom");
        assert!(resp.headers().is_some());
    }

    #[test]
    fn transport_failures_are_classified() {
        let cases = [
            (TransportError::Ssl("bad cert".into()), "An SSL error occurred. bad cert"),
            (TransportError::Connection("refused".into()), "A connection error occurred. refused"),
            (TransportError::Timeout, "The request timed out after 60 seconds."),
            (TransportError::Body("truncated".into()), "JSON response could not be decoded truncated."),
            (
                TransportError::Other("weird".into()),
                "There was an error while handling the request. weird",
            ),
        ];
        for (err, expected) in cases {
            let (d, t) = dispatcher(Config::new(HOST));
            t.push(Err(err));
            let resp = d.dispatch(DispatchRequest::get("/x"));
            assert!(!resp.success());
            assert_eq!(resp.response_code(), -1);
            assert_eq!(resp.message(), expected);
            assert!(resp.headers().is_none());
        }
    }

    #[test]
    fn fractional_timeout_in_message() {
        let (d, t) = dispatcher(Config::new(HOST).with_timeout(Duration::from_millis(1500)));
        t.push(Err(TransportError::Timeout));
        let resp = d.dispatch(DispatchRequest::get("/x"));
        assert_eq!(resp.message(), "The request timed out after 1.5 seconds.");
    }

    #[test]
    fn invalid_host_never_reaches_transport() {
        let (d, t) = dispatcher(Config::new("not a url"));
        let resp = d.dispatch(DispatchRequest::get("/x"));
        assert!(!resp.success());
        assert!(resp
            .message()
            .starts_with("There was an error while handling the request."));
        assert!(t.requests().is_empty());
    }
}
