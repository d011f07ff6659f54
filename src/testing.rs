//! Fake backend for exercising the submission cycle without a network

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::app::App;
use crate::backend::{QueryBackend, QueryRequest, QueryResponse};

/// Backend that returns queued outcomes and records every request
#[derive(Default)]
pub struct FakeBackend {
    outcomes: Mutex<VecDeque<Result<QueryResponse, String>>>,
    requests: Mutex<Vec<QueryRequest>>,
    /// When set, each query waits for a notification before answering
    gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose answers are held until the returned gate is notified
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let backend = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (backend, gate)
    }

    pub fn queue_response(&self, response: QueryResponse) {
        self.outcomes.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, message: &str) {
        self.outcomes.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn recorded_requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for FakeBackend {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no fake response queued")),
        }
    }
}

/// App wired to a fresh fake backend
pub fn app_with_fake() -> (App, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::new());
    let app = App::new(backend.clone(), "http://fake.test");
    (app, backend)
}
