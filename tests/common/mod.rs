#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use actito_sdk::{ActitoConfig, ActitoOptions};
use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
pub struct MockResponse {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl MockResponse {
    pub fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::from_millis(0),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::from_millis(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    hits: Arc<AtomicUsize>,
}

async fn handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .requests
        .lock()
        .expect("request log mutex must not be poisoned")
        .push(RecordedRequest {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, response.body)
}

pub struct TestServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }

    pub fn push(&self, response: MockResponse) {
        self.responses
            .lock()
            .expect("response queue mutex must not be poisoned")
            .push_back(response);
    }

    /// Config pointing at this server with fast retries.
    pub fn config(&self) -> ActitoConfig {
        ActitoConfig::new("key", "secret")
            .with_services_url(&self.base_url)
            .with_options(fast_options(0))
    }
}

pub fn fast_options(max_retries: usize) -> ActitoOptions {
    ActitoOptions {
        timeout_ms: 1_000,
        max_retries,
        retry_initial_delay_ms: 1,
        retry_backoff_factor: 2,
    }
}

pub async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        requests: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new().fallback(handler).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        requests: state.requests,
        responses: state.responses,
        task,
    }
}

pub fn application_body(services: JsonValue) -> JsonValue {
    json!({
        "application": {
            "_id": "app-1",
            "name": "Demo",
            "category": "Retail",
            "services": services,
            "inboxConfig": { "useInbox": true, "useUserInbox": false, "autoBadge": true }
        }
    })
}
