use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use hyper::{Body, Client, Method, Request, Response, Uri};
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::header::{LOCATION, USER_AGENT};
use hyper_tls::HttpsConnector;
use tracing::{debug, trace};
use url::Url;

// Maven Central returns a 403 without a user agent
const USER_AGENT_VALUE: &str = concat!("slimjar-resolver/", env!("CARGO_PKG_VERSION"));

/// Upper bound for metadata documents; maven-metadata.xml files are a few KB at most.
const MAX_METADATA_BYTES: usize = 1024 * 1024;

/// Redirects followed per request, e.g. from a repository host to its CDN
const MAX_REDIRECTS: usize = 5;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cheap existence check for a remote file.
///
/// Redirects are followed. Ordinary failure to reach the file (timeout, 404, connection
///  refused, unsupported scheme) is reported as `Ok(false)`. `Err` is reserved for a URL that cannot be turned into a
///  request at all.
#[async_trait]
pub trait UrlProber: Send + Sync {
    async fn exists(&self, url: &Url) -> anyhow::Result<bool>;
}

/// Retrieval of small text documents such as maven-metadata.xml. `Ok(None)` means the document
///  could not be retrieved for any ordinary reason.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch_text(&self, url: &Url) -> anyhow::Result<Option<String>>;
}

/// Prober and metadata fetcher backed by a hyper client. Instances do HTTP connection caching
///  internally, so a single instance should be shared by all enquirers.
pub struct HttpUrlProber {
    client: Client<HttpsConnector<HttpConnector>>,
    timeout: Duration,
}
impl HttpUrlProber {
    pub fn new(timeout: Duration) -> HttpUrlProber {
        HttpUrlProber {
            client: Client::builder()
                .build::<_, Body>(HttpsConnector::new()),
            timeout,
        }
    }

    /// `None` for URLs this prober does not handle
    fn to_uri(url: &Url) -> anyhow::Result<Option<Uri>> {
        match url.scheme() {
            "http" | "https" => Ok(Some(Uri::try_from(url.as_str())?)),
            other => {
                debug!("not probing {} - unsupported scheme {}", url, other);
                Ok(None)
            }
        }
    }

    fn request(method: Method, uri: Uri) -> anyhow::Result<Request<Body>> {
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Body::empty())?)
    }

    /// Sends the request, following up to [MAX_REDIRECTS] redirects with the same method.
    ///  `None` if there is no final answer: transport failure, a redirect without a usable
    ///  `Location`, a redirect to an unsupported scheme, or too many redirects.
    async fn request_following_redirects(&self, method: Method, url: &Url, uri: Uri) -> Option<Response<Body>> {
        let mut current = url.clone();
        let mut uri = uri;

        for _ in 0..=MAX_REDIRECTS {
            let request = match Self::request(method.clone(), uri) {
                Ok(request) => request,
                Err(e) => {
                    debug!("cannot build request for {}: {}", current, e);
                    return None;
                }
            };
            let response = match self.client.request(request).await {
                Ok(response) => response,
                Err(e) => {
                    debug!("request to {} failed: {}", current, e);
                    return None;
                }
            };
            trace!("{} {} -> {}", method, current, response.status());

            if !response.status().is_redirection() {
                return Some(response);
            }

            let target = response.headers()
                .get(LOCATION)
                .and_then(|location| location.to_str().ok())
                .and_then(|location| current.join(location).ok());
            current = match target {
                Some(target) => target,
                None => {
                    debug!("redirect from {} without a usable location", current);
                    return None;
                }
            };
            uri = match Self::to_uri(&current) {
                Ok(Some(uri)) => uri,
                _ => return None,
            };
        }

        debug!("giving up on {} after {} redirects", url, MAX_REDIRECTS);
        None
    }

    async fn read_limited(mut body: Body) -> anyhow::Result<Vec<u8>> {
        let mut result = Vec::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk?;
            if result.len() + chunk.len() > MAX_METADATA_BYTES {
                return Err(anyhow!("document exceeds {} bytes", MAX_METADATA_BYTES));
            }
            result.extend_from_slice(&chunk);
        }
        Ok(result)
    }
}

impl Default for HttpUrlProber {
    fn default() -> Self {
        HttpUrlProber::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl UrlProber for HttpUrlProber {
    async fn exists(&self, url: &Url) -> anyhow::Result<bool> {
        let uri = match Self::to_uri(url)? {
            Some(uri) => uri,
            None => return Ok(false),
        };

        // HEAD never transfers the body; the timeout covers all redirects
        match tokio::time::timeout(self.timeout, self.request_following_redirects(Method::HEAD, url, uri)).await {
            Ok(response) => Ok(response
                .map(|r| r.status().is_success())
                .unwrap_or(false)),
            Err(_) => {
                debug!("probing {} timed out after {:?}", url, self.timeout);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl MetadataFetcher for HttpUrlProber {
    async fn fetch_text(&self, url: &Url) -> anyhow::Result<Option<String>> {
        let uri = match Self::to_uri(url)? {
            Some(uri) => uri,
            None => return Ok(None),
        };

        let response = match tokio::time::timeout(self.timeout, self.request_following_redirects(Method::GET, url, uri)).await {
            Ok(Some(response)) if response.status().is_success() => response,
            Ok(_) => return Ok(None),
            Err(_) => {
                debug!("fetching {} timed out after {:?}", url, self.timeout);
                return Ok(None);
            }
        };

        // the timeout covers the body as well, a stalled transfer must not block the caller
        match tokio::time::timeout(self.timeout, Self::read_limited(response.into_body())).await {
            Ok(Ok(bytes)) => Ok(String::from_utf8(bytes).ok()),
            Ok(Err(e)) => {
                debug!("failed to read {}: {}", url, e);
                Ok(None)
            }
            Err(_) => {
                debug!("reading {} timed out after {:?}", url, self.timeout);
                Ok(None)
            }
        }
    }
}
