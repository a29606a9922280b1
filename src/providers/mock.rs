//! Scripted transport for tests and offline runs
//!
//! The handler decides the outcome of every request. Calls are counted and
//! recorded so tests can assert on what actually went over the "wire".

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::errors::{AppError, AppResult};
use crate::providers::transport::{HttpRequest, HttpTransport};

type Handler = dyn Fn(&HttpRequest) -> AppResult<Value> + Send + Sync;

#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> AppResult<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }

    /// Every request fails with a connection error
    pub fn failing() -> Self {
        Self::new(|req| Err(AppError::connection_failed(format!("unreachable: {}", req.url))))
    }

    /// Every request answers the same body
    pub fn always(body: Value) -> Self {
        Self::new(move |_| Ok(body.clone()))
    }

    /// Sleep before answering; honours the request timeout like a real client
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|reqs| reqs.clone())
            .unwrap_or_default()
    }

    /// Requests whose URL contains `needle`
    pub fn requests_to(&self, needle: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|req| req.url.contains(needle))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> AppResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request.clone());
        }

        if let Some(latency) = self.latency {
            if latency >= request.timeout {
                tokio::time::sleep(request.timeout).await;
                return Err(AppError::timeout(format!("{} timed out", request.url)));
            }
            tokio::time::sleep(latency).await;
        }

        (self.handler)(&request)
    }
}
