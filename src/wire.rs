//! The wire layer: builds a request by accumulating `(param -> string)` pairs,
//! URL-encodes it, and classifies the transport's outcome for the retry loop
//! in [`crate::wiki`] (§4.4).
//!
//! A request object with typed setters accumulates string parameters, the
//! same approach `mediawiki_rust`'s `Api` uses with a plain
//! `HashMap<String, String>`. The surface area here (dozens of read/write
//! operations, sessions, an archiver) is broad enough that hand written
//! per-endpoint structs pay for themselves better than a derive-macro query
//! builder that would need extending for every new parameter shape.

use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::date::Date;
use crate::error::{Error, HttpError, LowLevelKind, NetworkError, WikiError};

/// How a request should be dispatched, matching the three cases in §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Get,
    /// POST, but safe to retry (no side effect, or idempotent).
    PostRetrySafe,
    /// POST that changes content and is not idempotent; never retried.
    PostNoRetry,
}

/// Default `maxlag` threshold, in seconds (§4.4).
pub const DEFAULT_MAXLAG: u32 = 5;

/// An accumulating MediaWiki API request.
#[derive(Debug, Clone)]
pub struct WikiRequest {
    action: &'static str,
    dispatch: Dispatch,
    params: BTreeMap<String, String>,
    maxlag: Option<u32>,
    assert_user: bool,
}

impl WikiRequest {
    pub fn new(action: &'static str, dispatch: Dispatch) -> Self {
        let mut params = BTreeMap::new();
        params.insert("action".to_owned(), action.to_owned());
        Self {
            action,
            dispatch,
            params,
            maxlag: Some(DEFAULT_MAXLAG),
            assert_user: false,
        }
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }

    /// Suppress the default `&maxlag=5`.
    pub fn without_maxlag(mut self) -> Self {
        self.maxlag = None;
        self
    }

    /// Append `&assert=user`, done automatically by the session layer once logged in.
    pub fn assert_user(mut self, yes: bool) -> Self {
        self.assert_user = yes;
        self
    }

    pub fn param_str(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_owned(), value.into());
        self
    }

    pub fn param_opt_str(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.param_str(key, v),
            None => self,
        }
    }

    pub fn param_int(self, key: &str, value: impl std::fmt::Display) -> Self {
        self.param_str(key, value.to_string())
    }

    pub fn param_revid(self, key: &str, revid: u64) -> Self {
        self.param_str(key, revid.to_string())
    }

    pub fn param_date(self, key: &str, date: Date) -> Self {
        self.param_str(key, date.to_iso8601())
    }

    pub fn param_enum(self, key: &str, keyword: &str) -> Self {
        self.param_str(key, keyword)
    }

    /// A bitset of flags, rendered as a `|`-joined token list, e.g.
    /// `rvprop=ids|content|timestamp`.
    pub fn param_flags<'a>(self, key: &str, flags: impl IntoIterator<Item = &'a str>) -> Self {
        let joined = flags.into_iter().collect::<Vec<_>>().join("|");
        if joined.is_empty() {
            self
        } else {
            self.param_str(key, joined)
        }
    }

    pub fn param_titles(self, key: &str, titles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let joined = titles
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>()
            .join("|");
        self.param_str(key, joined)
    }

    pub fn continue_from(mut self, cont: &serde_json::Value) -> Self {
        if let Some(obj) = cont.as_object() {
            for (k, v) in obj {
                if let Some(s) = v.as_str() {
                    self.params.insert(k.clone(), s.to_owned());
                } else {
                    self.params.insert(k.clone(), v.to_string());
                }
            }
        }
        self
    }

    pub(crate) fn finish(mut self, format_version: u8) -> BTreeMap<String, String> {
        self.params
            .insert("format".to_owned(), "json".to_owned());
        self.params
            .insert("formatversion".to_owned(), format_version.to_string());
        if let Some(maxlag) = self.maxlag {
            self.params.insert("maxlag".to_owned(), maxlag.to_string());
        }
        if self.assert_user {
            self.params.insert("assert".to_owned(), "user".to_owned());
        }
        self.params
    }

    /// Build the GET URL for this request against `base`.
    pub fn to_url(self, base: &Url) -> Result<Url, Error> {
        let params = self.finish(2);
        let mut url = base.clone();
        {
            let mut qp = url.query_pairs_mut();
            for (k, v) in &params {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Build the POST form body for this request.
    pub fn to_form(self) -> Vec<(String, String)> {
        self.finish(2).into_iter().collect()
    }
}

/// A write request adds token handling, the emergency-stop check, and the
/// pre-edit delay on top of [`WikiRequest`] (§4.4, §4.5). The token itself is
/// attached by [`crate::wiki::Wiki::dispatch_write`] once fetched, since
/// fetching it is itself an API round trip owned by the session layer.
#[derive(Debug, Clone)]
pub struct WikiWriteRequest {
    pub inner: WikiRequest,
    pub needs_csrf_token: bool,
}

impl WikiWriteRequest {
    pub fn new(action: &'static str) -> Self {
        Self {
            inner: WikiRequest::new(action, Dispatch::PostNoRetry),
            needs_csrf_token: true,
        }
    }

    pub fn param_str(mut self, key: &str, value: impl Into<String>) -> Self {
        self.inner = self.inner.param_str(key, value);
        self
    }

    pub fn param_opt_str(mut self, key: &str, value: Option<impl Into<String>>) -> Self {
        self.inner = self.inner.param_opt_str(key, value);
        self
    }

    pub fn param_flags<'a>(mut self, key: &str, flags: impl IntoIterator<Item = &'a str>) -> Self {
        self.inner = self.inner.param_flags(key, flags);
        self
    }

    pub fn with_token(self, token: &str) -> WikiRequest {
        self.inner.param_str("token", token)
    }
}

/// Per-attempt classification of a raw transport/API outcome (§4.4 `apiRequest`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Terminal success.
    Success,
    /// Retry, counting against the attempt budget.
    Retry,
    /// Retry, but doesn't count against the attempt budget (maxlag, assertuserfailed).
    RetryFree,
    /// Terminal failure.
    Fatal,
}

pub fn classify_error(err: &Error) -> Classification {
    match err {
        Error::Network(_) | Error::Http(HttpError::ServerError(..)) | Error::Json(_) => {
            Classification::Retry
        }
        Error::Wiki(WikiError::LowLevel(LowLevelKind::ReadOnly)) => Classification::Retry,
        Error::Wiki(WikiError::LowLevel(_)) => Classification::Retry,
        Error::Wiki(WikiError::Api { code, .. }) if code == "maxlag" => Classification::RetryFree,
        Error::Wiki(WikiError::Api { code, .. }) if code == "assertuserfailed" => {
            Classification::RetryFree
        }
        Error::Wiki(WikiError::EditConflict(_))
        | Error::Wiki(WikiError::PageAlreadyExists(_))
        | Error::Wiki(WikiError::PageNotFound(_))
        | Error::Wiki(WikiError::InvalidParameter(_))
        | Error::Wiki(WikiError::ProtectedPage(_))
        | Error::Wiki(WikiError::EmergencyStop(_))
        | Error::Wiki(WikiError::BotExclusion(_)) => Classification::Fatal,
        Error::Wiki(WikiError::Api { .. }) => Classification::Fatal,
        _ => Classification::Fatal,
    }
}

/// The retry schedule: 30s, 60s, 90s, ... capped at 600s, for at most 5
/// attempts (§4.4). `canRetry == false` collapses this to a single attempt.
pub struct RetrySchedule {
    pub max_attempts: u32,
    attempt: u32,
}

impl RetrySchedule {
    pub fn new(can_retry: bool) -> Self {
        Self {
            max_attempts: if can_retry { 5 } else { 1 },
            attempt: 0,
        }
    }

    /// Record an attempt that counted against the budget. Returns `false`
    /// once the budget is exhausted.
    pub fn tick(&mut self) -> bool {
        self.attempt += 1;
        self.attempt < self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::from((self.attempt).min(20)) * 30)
    }
}
