use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::transport::{RawResponse, Transport, TransportError};
use crate::ApiRequest;

pub(crate) type Scripted = Result<RawResponse, TransportError>;

/// Replays canned responses in order and records every request.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests mutex").len()
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests mutex").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        self.requests
            .lock()
            .expect("requests mutex")
            .push(request.clone());
        self.script
            .lock()
            .expect("script mutex")
            .pop_front()
            .unwrap_or(Err(TransportError::Connect("script exhausted".to_owned())))
    }
}

pub(crate) fn ok(body: &str) -> Scripted {
    Ok(RawResponse::new(StatusCode::OK, body.as_bytes().to_vec()))
}

pub(crate) fn status(code: StatusCode) -> Scripted {
    Ok(RawResponse::new(code, b"{}".to_vec()))
}
