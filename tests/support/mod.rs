#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use http::StatusCode;

use httpstash::{Body, Handler, Request, Response, ResponseHead, Transport};

/// Scripted origin that counts how often it is invoked. Serves the same
/// canned response to every request; an optional delay keeps the fill
/// in flight long enough for concurrent callers to pile up behind it.
pub struct CountingOrigin {
    calls: AtomicUsize,
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: String,
    delay: Option<Duration>,
}

impl CountingOrigin {
    pub fn new(status: StatusCode, body: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            status,
            headers: Vec::new(),
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut head = ResponseHead::new(self.status);
        for (name, value) in &self.headers {
            head = head.with_header(name.clone(), value.clone());
        }
        Ok(Response::new(head, Body::from_bytes(self.body.clone())))
    }
}

#[async_trait]
impl Transport for CountingOrigin {
    async fn round_trip(&self, _request: Request) -> Result<Response> {
        self.respond().await
    }
}

#[async_trait]
impl Handler for CountingOrigin {
    async fn serve(&self, _request: Request) -> Result<Response> {
        self.respond().await
    }
}

pub fn get(uri: &str) -> Request {
    Request::get(uri.parse().expect("valid test uri"))
}

/// Status, named header value, and full body of a response, for comparing
/// what concurrent callers observed.
pub async fn observe(response: Response, header: &str) -> (u16, Option<String>, Vec<u8>) {
    let (head, body) = response.into_parts();
    let value = head.header(header).map(str::to_string);
    let bytes = body.bytes().await.expect("readable body");
    (head.status.as_u16(), value, bytes.to_vec())
}
