//! The HTTP transport contract (§2 layer 3, §9 "global curl/session lifetime").
//!
//! This crate treats the transport as an external collaborator: a GET/POST
//! client with a cookie jar, default headers/user agent, and an optional
//! on-disk response cache keyed by request fingerprint. [`ReqwestTransport`]
//! is the concrete implementation, built around a `reqwest::Client` with a
//! cookie store enabled and a fixed `User-Agent`; [`Transport`] is the seam
//! the wire layer programs against so tests can substitute a fake.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::{Error, HttpError, NetworkError, Result};

const UA: &str = concat!(
    "wiki.rs",
    "/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/fee1-dead/wiki.rs bot-framework)"
);

/// The default total per-request timeout (§5 "cancellation & timeouts").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A POST body: either URL-encoded form fields or raw multipart parts, mirroring
/// the two encodings MediaWiki write actions accept.
#[derive(Debug, Clone, Default)]
pub struct FormBody(pub Vec<(String, String)>);

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), value.into()));
        self
    }
}

/// The GET/POST contract the wire layer dispatches through.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: Url) -> Result<String>;
    async fn post(&self, url: Url, body: FormBody) -> Result<String>;
}

/// A `reqwest`-backed transport with a cookie jar and fixed user agent,
/// optionally wrapped by [`CachingTransport`] for offline replay.
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(UA)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(NetworkError(e.to_string())))?;
        Ok(Self { client, timeout })
    }

    /// Expose the underlying client's cookie-aware session, for callers
    /// (the session layer) that need to persist/restore cookies across runs.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn classify(resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Network(NetworkError(e.to_string())))?;
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::Http(HttpError::from_status(status.as_u16(), body)));
        }
        Ok(body)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: Url) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(NetworkError(e.to_string())))?;
        Self::classify(resp).await
    }

    async fn post(&self, url: Url, body: FormBody) -> Result<String> {
        let resp = self
            .client
            .post(url)
            .form(&body.0)
            .send()
            .await
            .map_err(|e| Error::Network(NetworkError(e.to_string())))?;
        Self::classify(resp).await
    }
}

fn fingerprint(url: &Url, body: Option<&FormBody>) -> String {
    let mut h = DefaultHasher::new();
    url.as_str().hash(&mut h);
    if let Some(b) = body {
        for (k, v) in &b.0 {
            k.hash(&mut h);
            v.hash(&mut h);
        }
    }
    format!("{:016x}", h.finish())
}

/// A transport decorator that serves (and, when `record` is set, saves)
/// responses from an on-disk cache keyed by a hash of the request, for
/// replaying a recorded session without touching the network.
pub struct CachingTransport<T> {
    inner: T,
    dir: PathBuf,
    record: bool,
}

impl<T: Transport> CachingTransport<T> {
    pub fn new(inner: T, dir: PathBuf, record: bool) -> Self {
        Self { inner, dir, record }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn cached_or_fetch<F>(&self, key: String, fetch: F) -> Result<String>
    where
        F: std::future::Future<Output = Result<String>> + Send,
    {
        let path = self.path_for(&key);
        if let Ok(body) = tokio::fs::read_to_string(&path).await {
            return Ok(body);
        }
        if !self.record {
            return Err(Error::PageNotInCache);
        }
        let body = fetch.await?;
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let _ = tokio::fs::write(&path, &body).await;
        Ok(body)
    }
}

#[async_trait]
impl<T: Transport> Transport for CachingTransport<T> {
    async fn get(&self, url: Url) -> Result<String> {
        let key = fingerprint(&url, None);
        self.cached_or_fetch(key, self.inner.get(url)).await
    }

    async fn post(&self, url: Url, body: FormBody) -> Result<String> {
        let key = fingerprint(&url, Some(&body));
        self.cached_or_fetch(key, self.inner.post(url, body)).await
    }
}
