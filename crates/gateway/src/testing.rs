//! Test doubles shared across the gateway test modules.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use cachefront_client::{FetchedResponse, Fetcher};
use cachefront_core::{Error, WorkerRequest};
use url::Url;

/// A fetcher scripted with canned responses per URL.
///
/// Each URL holds a queue: every fetch consumes the next scripted response,
/// and once the queue is drained the most recently served one repeats
/// forever. Scripting a URL again between fetches therefore makes the new
/// response the next one served, which models content that changed on the
/// network. Unscripted URLs and offline mode fail the way a dead network
/// does.
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, VecDeque<FetchedResponse>>>,
    served: Mutex<HashMap<String, FetchedResponse>>,
    offline: AtomicBool,
    calls: Mutex<Vec<WorkerRequest>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, content_type: &str, body: &str) {
        let parsed = Url::parse(url).unwrap();
        self.respond_with(url, FetchedResponse {
            url: parsed.clone(),
            final_url: parsed,
            status,
            content_type: Some(content_type.to_string()),
            headers: Vec::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
            fetch_ms: 1,
        });
    }

    pub fn respond_with(&self, url: &str, response: FetchedResponse) {
        self.responses.lock().unwrap().entry(url.to_string()).or_default().push_back(response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|request| request.url.to_string()).collect()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|request| request.url.as_str() == url).count()
    }

    /// The most recent request exactly as the fetcher received it.
    pub fn last_request(&self) -> Option<WorkerRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &WorkerRequest) -> Result<FetchedResponse, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Fetch("offline".to_string()));
        }

        let mut responses = self.responses.lock().unwrap();
        if let Some(response) = responses.get_mut(&url).and_then(VecDeque::pop_front) {
            self.served.lock().unwrap().insert(url, response.clone());
            return Ok(response);
        }
        drop(responses);

        let served = self.served.lock().unwrap();
        served.get(&url).cloned().ok_or_else(|| Error::Fetch(format!("no scripted response for {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_advances_and_last_repeats() {
        let fetcher = FakeFetcher::new();
        fetcher.respond("http://localhost:8080/a", 200, "text/plain", "one");
        fetcher.respond("http://localhost:8080/a", 200, "text/plain", "two");
        let request = WorkerRequest::get(Url::parse("http://localhost:8080/a").unwrap());

        assert_eq!(fetcher.fetch(&request).await.unwrap().body.as_ref(), b"one");
        assert_eq!(fetcher.fetch(&request).await.unwrap().body.as_ref(), b"two");
        assert_eq!(fetcher.fetch(&request).await.unwrap().body.as_ref(), b"two");
        assert_eq!(fetcher.calls(), vec!["http://localhost:8080/a".to_string(); 3]);
    }

    #[tokio::test]
    async fn test_response_scripted_between_fetches_is_served_next() {
        let fetcher = FakeFetcher::new();
        let request = WorkerRequest::get(Url::parse("http://localhost:8080/a").unwrap());

        fetcher.respond("http://localhost:8080/a", 200, "text/plain", "old");
        assert_eq!(fetcher.fetch(&request).await.unwrap().body.as_ref(), b"old");

        fetcher.respond("http://localhost:8080/a", 200, "text/plain", "new");
        assert_eq!(fetcher.fetch(&request).await.unwrap().body.as_ref(), b"new");
        assert_eq!(fetcher.fetch(&request).await.unwrap().body.as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_offline_and_unscripted_fail() {
        let fetcher = FakeFetcher::new();
        let request = WorkerRequest::get(Url::parse("http://localhost:8080/a").unwrap());

        assert!(matches!(fetcher.fetch(&request).await, Err(Error::Fetch(_))));

        fetcher.respond("http://localhost:8080/a", 200, "text/plain", "one");
        fetcher.set_offline(true);
        assert!(matches!(fetcher.fetch(&request).await, Err(Error::Fetch(_))));

        fetcher.set_offline(false);
        assert!(fetcher.fetch(&request).await.is_ok());
    }
}
