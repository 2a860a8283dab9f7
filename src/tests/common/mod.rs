// tests/common/mod.rs
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use reqwest::Client;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::manager::TokenEvent;
use crate::sources::{FetchResult, Fetcher};

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

enum Step {
    Reply(FetchResult),
    /// reply only once the paired sender fires (or is dropped)
    Hold(FetchResult, oneshot::Receiver<()>),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    calls: Vec<Instant>,
    urls: Vec<String>,
}

/// Fetcher replaying a fixed script of results.
/// Once the script runs out every call is a transport error.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFetcher {
    pub fn reply(self, result: FetchResult) -> Self {
        self.script.lock().unwrap().steps.push_back(Step::Reply(result));
        self
    }

    pub fn success(self, value: &str, expires_in_seconds: i64) -> Self {
        self.reply(FetchResult::Success {
            value: value.to_owned(),
            expires_in_seconds,
        })
    }

    /// Queue a result that is held back until the returned sender fires.
    pub fn hold(&self, result: FetchResult) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().steps.push_back(Step::Hold(result, rx));
        tx
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.script.lock().unwrap().urls.clone()
    }

    /// Wait until at least `n` fetches were dispatched.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let step = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Instant::now());
            script.urls.push(url.to_owned());
            script.steps.pop_front()
        };

        match step {
            Some(Step::Reply(result)) => result,
            Some(Step::Hold(result, release)) => {
                let _ = release.await;
                result
            }
            None => FetchResult::TransportError("script exhausted".to_owned()),
        }
    }
}

/// Next event, failing the test instead of hanging forever.
pub async fn next_event(rx: &mut broadcast::Receiver<TokenEvent>) -> TokenEvent {
    tokio::time::timeout(Duration::from_secs(24 * 3600), rx.recv())
        .await
        .expect("no event within a day")
        .expect("event channel closed")
}

/// Assert nothing is emitted for a long (virtual) while.
pub async fn assert_no_event(rx: &mut broadcast::Receiver<TokenEvent>) {
    let received = tokio::time::timeout(Duration::from_secs(3 * 3600), rx.recv()).await;
    assert!(received.is_err(), "unexpected event: {:?}", received);
}
