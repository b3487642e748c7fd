//! In-memory transports for unit tests.

use std::sync::Mutex;

use crate::http::{Headers, HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportError};

pub(crate) enum Reply {
    Respond(HttpResponse),
    Fail(&'static str),
    Hang,
}

type Script = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

/// Answers each request with whatever the script returns and keeps a log of
/// everything it was sent.
pub(crate) struct ScriptedTransport {
    requests: Mutex<Vec<HttpRequest>>,
    script: Script,
}

impl ScriptedTransport {
    pub(crate) fn new(script: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = (self.script)(&request);
        self.requests.lock().unwrap().push(request);
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(TransportError(message.to_string())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

pub(crate) fn response(status: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
    let mut headers = Headers::new();
    if let Some(ct) = content_type {
        headers.insert("content-type", ct);
    }
    HttpResponse {
        status,
        status_text: String::new(),
        headers,
        body: body.to_string(),
    }
}
