//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportError};

/// Replays queued results in order and records every request it receives.
/// An empty queue answers with a connection error.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, result: Result<HttpResponse, TransportError>) {
        self.inner.script.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(Ok(HttpResponse {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        }));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.inner.sent.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.inner.sent.lock().unwrap().push(request);
        self.inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".into())))
    }
}
