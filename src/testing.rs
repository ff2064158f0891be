//! Mock capabilities shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::network::Network;

/// A scripted network. Unknown URLs answer 404; `offline` fails everything.
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<Vec<String>>,
    offline: Mutex<bool>,
    calls: Mutex<Vec<Request>>,
}

impl MockNetwork {
    pub fn online() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            offline: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn offline() -> Self {
        let network = Self::online();
        network.set_offline(true);
        network
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Makes requests to `url` fail at the network level.
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().push(url.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.calls.lock().unwrap().push(request.clone());
        let url = request.url.to_string();
        if *self.offline.lock().unwrap() || self.failing.lock().unwrap().contains(&url) {
            return Err(Error::Network(format!("{url}: connection refused")));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}
