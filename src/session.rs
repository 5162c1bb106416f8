//! Session & token state (§4.5), grounded on `Wiki::logIn`/`loginInternal`/
//! `sessionToString`/`sessionFromString`/`getToken` in the original
//! implementation. This module owns the state a logged-in [`crate::wiki::Wiki`]
//! carries between requests; the requests themselves (login POST, token
//! fetch, `meta=siteinfo`) are issued by `wiki.rs`, which calls back into the
//! methods here to read/update that state.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::date::Date;
use crate::error::{Error, ParseError};
use crate::types::SiteInfo;

pub const BASIC_API_LIMIT: u32 = 500;
pub const BASIC_API_TITLES_LIMIT: u32 = 50;
pub const HIGH_API_LIMIT: u32 = 5000;
pub const HIGH_API_TITLES_LIMIT: u32 = 500;

/// The minimum plausible length of a real CSRF/watch token for a logged-in
/// user; anything shorter is almost certainly a malformed API response.
pub const MIN_TOKEN_SIZE: usize = 4;

pub const DEFAULT_DELAY_BEFORE_REQUESTS: u32 = 0;
pub const DEFAULT_DELAY_BETWEEN_EDITS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Csrf,
    Watch,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Csrf => "csrf",
            TokenKind::Watch => "watch",
        }
    }
}

/// Supplies the one-time code for `clientlogin`'s interactive two-factor
/// continuation (§4.5): when a login attempt comes back with status `UI`,
/// [`crate::wiki::Wiki::log_in`] calls this to get an `OATHToken` and re-POSTs
/// with `logincontinue=1`. Library code never reads a TTY itself; callers
/// (typically a bot binary) supply a provider that does.
pub trait OathTokenProvider: Send + Sync {
    fn provide_oath_token(&self) -> Result<String, Error>;
}

/// Parameters to [`crate::wiki::Wiki::log_in`], mirroring the original's
/// `LoginParams`.
#[derive(Clone, Default)]
pub struct LoginParams {
    pub url: String,
    pub user_name: String,
    pub password: String,
    /// Use `action=clientlogin` (supports two-factor auth) rather than the
    /// legacy `action=login`.
    pub client_login: bool,
    pub user_agent: Option<String>,
    pub delay_before_requests: Option<u32>,
    pub delay_between_edits: Option<u32>,
    pub max_lag: Option<u32>,
    pub read_site_info: bool,
    /// Consulted on a `clientlogin` status-`UI` response; `None` means the
    /// login path can't complete a two-factor continuation.
    pub oath_token_provider: Option<Arc<dyn OathTokenProvider>>,
}

impl fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginParams")
            .field("url", &self.url)
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("client_login", &self.client_login)
            .field("user_agent", &self.user_agent)
            .field("delay_before_requests", &self.delay_before_requests)
            .field("delay_between_edits", &self.delay_between_edits)
            .field("max_lag", &self.max_lag)
            .field("read_site_info", &self.read_site_info)
            .field("oath_token_provider", &self.oath_token_provider.is_some())
            .finish()
    }
}

impl LoginParams {
    pub fn anonymous(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            read_site_info: true,
            ..Default::default()
        }
    }
}

/// The part of a session's identity that changes on (re-)login, kept behind
/// one lock so a concurrent re-login (triggered by `assertuserfailed` or a
/// second `badtoken`) can't be observed half-updated.
#[derive(Debug, Clone, Default)]
struct Identity {
    internal: String,
    external: String,
}

struct LoadedSession {
    url: String,
    internal_user_name: String,
    cookies: String,
    site_info: SiteInfo,
}

/// Parse the `url=`/`user=`/`session=`/`siteinfo=` lines written by
/// [`Session::to_session_string`].
fn parse_session_string(buffer: &str) -> Result<LoadedSession, ParseError> {
    let mut url = None;
    let mut user = String::new();
    let mut cookies = String::new();
    let mut site_info = None;

    for line in buffer.lines() {
        let (param, value) = line
            .split_once('=')
            .ok_or_else(|| ParseError::new(format!("invalid line '{line}' in session file")))?;
        match param {
            "url" => url = Some(value.to_owned()),
            "user" => user = value.to_owned(),
            "session" => cookies = value.to_owned(),
            "siteinfo" => {
                site_info = Some(SiteInfo::from_json(value).map_err(|e| {
                    ParseError::new(format!("invalid siteinfo in session file: {e}"))
                })?);
            }
            _ => {}
        }
    }

    Ok(LoadedSession {
        url: url.ok_or_else(|| ParseError::new("missing url in session file"))?,
        internal_user_name: user,
        cookies,
        site_info: site_info.unwrap_or_default(),
    })
}

/// A logged-in (or anonymous) session's state: identity, site info, cached
/// tokens and API limits. Cheap to share across concurrent requests — the
/// token cache is the only part that's mutated after login.
pub struct Session {
    pub wiki_url: String,
    identity: RwLock<Identity>,
    pub password: String,
    pub site_info: SiteInfo,
    api_limit: AtomicU32,
    api_titles_limit: AtomicU32,
    pub max_lag: u32,
    pub delay_before_requests: u32,
    pub delay_between_edits: u32,
    pub last_edit: Mutex<Date>,
    tokens: Mutex<HashMap<TokenKind, String>>,
    pub session_file: Option<PathBuf>,
}

impl Session {
    pub fn anonymous(wiki_url: impl Into<String>) -> Self {
        Self {
            wiki_url: wiki_url.into(),
            identity: RwLock::new(Identity::default()),
            password: String::new(),
            site_info: SiteInfo::new(),
            api_limit: AtomicU32::new(BASIC_API_LIMIT),
            api_titles_limit: AtomicU32::new(BASIC_API_TITLES_LIMIT),
            max_lag: 5,
            delay_before_requests: DEFAULT_DELAY_BEFORE_REQUESTS,
            delay_between_edits: DEFAULT_DELAY_BETWEEN_EDITS,
            last_edit: Mutex::new(Date::now()),
            tokens: Mutex::new(HashMap::new()),
            session_file: None,
        }
    }

    pub async fn internal_user_name(&self) -> String {
        self.identity.read().await.internal.clone()
    }

    pub async fn external_user_name(&self) -> String {
        self.identity.read().await.external.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        !self.identity.read().await.internal.is_empty()
    }

    pub fn api_limit(&self) -> u32 {
        self.api_limit.load(Ordering::Relaxed)
    }

    pub fn api_titles_limit(&self) -> u32 {
        self.api_titles_limit.load(Ordering::Relaxed)
    }

    /// Set the internal user name (`name@botpassword` or `name`), deriving
    /// the external name by stripping anything from the first `@`, and
    /// bumping the API limits to the "logged in" tier. Usable after the
    /// initial login too, so a forced re-login (`assertuserfailed`, a second
    /// `badtoken`) can refresh identity without rebuilding the session.
    pub async fn set_internal_user_name(&self, name: impl Into<String>) {
        let internal: String = name.into();
        let external = internal.split('@').next().unwrap_or_default().to_owned();
        if internal.is_empty() {
            self.api_limit.store(BASIC_API_LIMIT, Ordering::Relaxed);
            self.api_titles_limit
                .store(BASIC_API_TITLES_LIMIT, Ordering::Relaxed);
        } else {
            self.api_limit.store(HIGH_API_LIMIT, Ordering::Relaxed);
            self.api_titles_limit
                .store(HIGH_API_TITLES_LIMIT, Ordering::Relaxed);
        }
        *self.identity.write().await = Identity { internal, external };
    }

    pub async fn cached_token(&self, kind: TokenKind) -> Option<String> {
        self.tokens.lock().await.get(&kind).cloned()
    }

    pub async fn set_cached_token(&self, kind: TokenKind, token: String) {
        self.tokens.lock().await.insert(kind, token);
    }

    /// `badtoken` invalidates every cached token kind (§4.5).
    pub async fn clear_token_cache(&self) {
        self.tokens.lock().await.clear();
    }

    pub async fn record_edit(&self, when: Date) {
        *self.last_edit.lock().await = when;
    }

    pub async fn last_edit(&self) -> Date {
        *self.last_edit.lock().await
    }

    /// Serialize to the text format written by [`Self::save_to_file`]:
    /// `url=`/`user=`/`session=`/`siteinfo=` lines.
    pub async fn to_session_string(&self, cookies: &str) -> Result<String, Error> {
        Ok(format!(
            "url={}\nuser={}\nsession={}\nsiteinfo={}\n",
            self.wiki_url,
            self.internal_user_name().await,
            cookies,
            self.site_info.to_json()?,
        ))
    }

    /// Atomically write the session to `path` (temp file + rename, so a
    /// crash mid-write never leaves a truncated session file).
    pub async fn save_to_file(&self, path: &Path, cookies: &str) -> Result<(), Error> {
        let contents = self.to_session_string(cookies).await?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(Error::System)?;
        tokio::fs::rename(&tmp, path).await.map_err(Error::System)?;
        Ok(())
    }

    /// Load session state from `path`. Returns the parsed cookies string
    /// alongside the reconstructed [`Session`] so the caller can feed them
    /// into its cookie jar.
    pub async fn load_from_file(path: &Path) -> Result<(Self, String), Error> {
        let buffer = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_owned())
            } else {
                Error::System(e)
            }
        })?;
        let loaded = parse_session_string(&buffer)?;
        let mut session = Session::anonymous(loaded.url);
        session.site_info = loaded.site_info;
        session.set_internal_user_name(loaded.internal_user_name).await;
        session.session_file = Some(path.to_owned());
        Ok((session, loaded.cookies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_cache_round_trips_and_clears() {
        let session = Session::anonymous("https://example.org/w");
        assert_eq!(session.cached_token(TokenKind::Csrf).await, None);
        session
            .set_cached_token(TokenKind::Csrf, "abc123+\\".to_owned())
            .await;
        assert_eq!(
            session.cached_token(TokenKind::Csrf).await,
            Some("abc123+\\".to_owned())
        );
        session.clear_token_cache().await;
        assert_eq!(session.cached_token(TokenKind::Csrf).await, None);
    }

    #[tokio::test]
    async fn set_internal_user_name_splits_botpassword_suffix() {
        let session = Session::anonymous("https://example.org/w");
        session.set_internal_user_name("ExampleBot@task1").await;
        assert_eq!(session.internal_user_name().await, "ExampleBot@task1");
        assert_eq!(session.external_user_name().await, "ExampleBot");
        assert_eq!(session.api_limit(), HIGH_API_LIMIT);
    }

    #[tokio::test]
    async fn empty_user_name_keeps_basic_limits() {
        let session = Session::anonymous("https://example.org/w");
        session.set_internal_user_name("").await;
        assert_eq!(session.api_limit(), BASIC_API_LIMIT);
    }

    #[tokio::test]
    async fn session_string_round_trips() {
        let session = Session::anonymous("https://example.org/w");
        let s = session.to_session_string("cookiejar=1").await.unwrap();
        let loaded = parse_session_string(&s).unwrap();
        assert_eq!(loaded.url, "https://example.org/w");
        assert_eq!(loaded.cookies, "cookiejar=1");
    }

    #[test]
    fn missing_url_line_is_rejected() {
        assert!(parse_session_string("user=Foo\n").is_err());
    }
}
