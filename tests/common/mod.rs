//! Fake procurement service shared by the integration tests
#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use procurement_relay::procurement::ProcurementConfig;

#[derive(Debug)]
struct FakeState {
    submissions: Vec<Value>,
    submit_status: u16,
    fetch_status: u16,
    results: String,
    fetched_ids: Vec<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            submissions: Vec::new(),
            submit_status: 200,
            fetch_status: 200,
            results: "[]".to_string(),
            fetched_ids: Vec::new(),
        }
    }
}

/// HTTP server answering `/orders`, `/orders/:id` and `/ping`
#[derive(Debug, Clone, Default)]
pub struct FakeProcurement {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcurement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve on an ephemeral port and return the base URL
    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/orders", post(submit))
            .route("/orders/:id", get(results))
            .route("/ping", get(|| async { "pong" }))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    pub fn set_results(&self, body: &str) {
        self.state.lock().unwrap().results = body.to_string();
    }

    pub fn set_submit_status(&self, status: u16) {
        self.state.lock().unwrap().submit_status = status;
    }

    pub fn set_fetch_status(&self, status: u16) {
        self.state.lock().unwrap().fetch_status = status;
    }

    /// JSON bodies of every submission received
    pub fn submissions(&self) -> Vec<Value> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// Library ids of every result request received
    pub fn fetched_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().fetched_ids.clone()
    }
}

async fn submit(State(fake): State<FakeProcurement>, Json(body): Json<Value>) -> StatusCode {
    let mut state = fake.state.lock().unwrap();
    state.submissions.push(body);
    StatusCode::from_u16(state.submit_status).unwrap()
}

async fn results(
    State(fake): State<FakeProcurement>,
    Path(id): Path<String>,
) -> (StatusCode, String) {
    let mut state = fake.state.lock().unwrap();
    state.fetched_ids.push(id);
    (
        StatusCode::from_u16(state.fetch_status).unwrap(),
        state.results.clone(),
    )
}

/// Client configuration pointing at `base_url`
pub fn procurement_config(base_url: &str) -> ProcurementConfig {
    ProcurementConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        connect_timeout_secs: 2,
        ..ProcurementConfig::default()
    }
}
