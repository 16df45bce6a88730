use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::util::http_prober::{MetadataFetcher, UrlProber};

/// in-memory stand-in for remote repositories, recording every request - for testing purposes
#[derive(Default)]
pub struct TransientRemote {
    files: HashSet<String>,
    documents: HashMap<String, String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
}
impl TransientRemote {
    pub fn new() -> TransientRemote {
        Default::default()
    }

    pub fn with_file(mut self, url: &str) -> TransientRemote {
        self.files.insert(url.to_string());
        self
    }

    pub fn with_document(mut self, url: &str, content: &str) -> TransientRemote {
        self.documents.insert(url.to_string(), content.to_string());
        self
    }

    /// every request suspends for this long before answering
    pub fn with_delay(mut self, delay: Duration) -> TransientRemote {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap()
            .iter()
            .filter(|r| r.as_str() == url)
            .count()
    }

    async fn record(&self, url: &Url) {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl UrlProber for TransientRemote {
    async fn exists(&self, url: &Url) -> anyhow::Result<bool> {
        self.record(url).await;
        Ok(self.files.contains(url.as_str()))
    }
}

#[async_trait]
impl MetadataFetcher for TransientRemote {
    async fn fetch_text(&self, url: &Url) -> anyhow::Result<Option<String>> {
        self.record(url).await;
        Ok(self.documents.get(url.as_str()).cloned())
    }
}
