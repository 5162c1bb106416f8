//! The data model shared by the read/write API (§3): revisions, log events,
//! recent changes, page protection, write tokens, and site info.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::date::Date;
use crate::error::{Error, ParseError};

bitflags::bitflags! {
    /// Per-revision boolean flags.
    #[derive(Default)]
    pub struct RevisionFlags: u8 {
        const MINOR = 1 << 0;
        const BOT = 1 << 1;
        const NEW = 1 << 2;
        const REDIRECT = 1 << 3;
        const PATROLLED = 1 << 4;
        const CONTENT_HIDDEN = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentModel {
    Invalid,
    Wikitext,
    FlowBoard,
}

impl ContentModel {
    pub fn from_api(s: &str) -> Self {
        match s {
            "wikitext" => ContentModel::Wikitext,
            "flow-board" => ContentModel::FlowBoard,
            _ => ContentModel::Invalid,
        }
    }
}

/// A single revision of a page. `rev_id == 0` means unset; `rev_id == u64::MAX`
/// (mapped from `-1`) means the title did not exist when it was read.
#[derive(Debug, Clone)]
pub struct Revision {
    pub title: String,
    pub revid: u64,
    pub timestamp: Date,
    pub user: String,
    pub userid: u64,
    pub size: u64,
    pub comment: String,
    pub parsed_comment: String,
    pub content: Option<String>,
    pub sha1: String,
    pub tags: Vec<String>,
    pub content_model: ContentModel,
    pub flags: RevisionFlags,
}

impl Revision {
    pub const MISSING: u64 = u64::MAX;

    pub fn exists(&self) -> bool {
        self.revid != Self::MISSING
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    Block,
    Protect,
    Rights,
    Delete,
    Upload,
    Move,
    Import,
    Patrol,
    Merge,
    Suppress,
    AbuseFilter,
    NewUsers,
    Create,
    Other,
}

impl LogType {
    pub fn from_api(s: &str) -> Self {
        match s {
            "block" => Self::Block,
            "protect" => Self::Protect,
            "rights" => Self::Rights,
            "delete" => Self::Delete,
            "upload" => Self::Upload,
            "move" => Self::Move,
            "import" => Self::Import,
            "patrol" => Self::Patrol,
            "merge" => Self::Merge,
            "suppress" => Self::Suppress,
            "abusefilter" => Self::AbuseFilter,
            "newusers" => Self::NewUsers,
            "create" => Self::Create,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MoveParams {
    pub new_title: String,
    pub suppress_redirect: bool,
}

#[derive(Debug, Clone)]
pub struct LogEvent {
    pub logid: u64,
    pub log_type: LogType,
    pub action: String,
    pub timestamp: Date,
    pub title: String,
    pub user: String,
    pub userid: u64,
    pub comment: String,
    pub parsed_comment: String,
    pub move_params: Option<MoveParams>,
}

/// Either an edit, a page creation, or a logged action, as produced by the
/// recent-changes stream/replica.
#[derive(Debug, Clone)]
pub enum RecentChange {
    Edit {
        rcid: u64,
        revision: Revision,
        old_revid: u64,
        old_size: u64,
    },
    New {
        rcid: u64,
        revision: Revision,
        old_revid: u64,
        old_size: u64,
    },
    Log {
        rcid: u64,
        event: LogEvent,
        old_revid: u64,
        old_size: u64,
    },
}

impl RecentChange {
    pub fn rcid(&self) -> u64 {
        match self {
            RecentChange::Edit { rcid, .. }
            | RecentChange::New { rcid, .. }
            | RecentChange::Log { rcid, .. } => *rcid,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            RecentChange::Edit { revision, .. } | RecentChange::New { revision, .. } => {
                &revision.title
            }
            RecentChange::Log { event, .. } => &event.title,
        }
    }

    pub fn timestamp(&self) -> Date {
        match self {
            RecentChange::Edit { revision, .. } | RecentChange::New { revision, .. } => {
                revision.timestamp
            }
            RecentChange::Log { event, .. } => event.timestamp,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            RecentChange::Edit { revision, .. } | RecentChange::New { revision, .. } => {
                &revision.user
            }
            RecentChange::Log { event, .. } => &event.user,
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            RecentChange::Edit { revision, .. } | RecentChange::New { revision, .. } => {
                &revision.comment
            }
            RecentChange::Log { event, .. } => &event.comment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionType {
    Edit,
    Move,
    Upload,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtectionLevel {
    None,
    Autoconfirmed,
    Autopatrolled,
    Sysop,
}

impl ProtectionLevel {
    pub fn from_api(s: &str) -> Self {
        match s {
            "autoconfirmed" => Self::Autoconfirmed,
            "autopatrolled" => Self::Autopatrolled,
            "sysop" => Self::Sysop,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageProtection {
    pub kind: ProtectionType,
    pub level: ProtectionLevel,
    /// `None` means infinite.
    pub expiry: Option<Date>,
}

/// Client-side state needed to detect edit conflicts and nobots violations
/// on write, produced by a read and consumed by a write (§3, §8 property 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteToken {
    Uninitialized,
    Create {
        title: String,
    },
    Edit {
        title: String,
        base_timestamp: Date,
        needs_nobots_bypass: bool,
    },
    NoConflictDetection {
        title: String,
    },
}

impl WriteToken {
    pub fn title(&self) -> Option<&str> {
        match self {
            WriteToken::Uninitialized => None,
            WriteToken::Create { title }
            | WriteToken::Edit { title, .. }
            | WriteToken::NoConflictDetection { title } => Some(title),
        }
    }

    /// Render to the stable string form round-tripped by [`Self::from_string`].
    pub fn to_string_token(&self) -> String {
        match self {
            WriteToken::Uninitialized => "uninit".to_owned(),
            WriteToken::Create { title } => format!("create\t{title}"),
            WriteToken::Edit {
                title,
                base_timestamp,
                needs_nobots_bypass,
            } => format!(
                "edit\t{title}\t{}\t{}",
                base_timestamp.to_iso8601(),
                *needs_nobots_bypass as u8
            ),
            WriteToken::NoConflictDetection { title } => format!("noconflict\t{title}"),
        }
    }

    pub fn from_string(s: &str) -> Result<Self, ParseError> {
        let mut parts = s.split('\t');
        match parts.next() {
            Some("uninit") => Ok(WriteToken::Uninitialized),
            Some("create") => {
                let title = parts
                    .next()
                    .ok_or_else(|| ParseError::new("missing title in WriteToken"))?;
                Ok(WriteToken::Create {
                    title: title.to_owned(),
                })
            }
            Some("edit") => {
                let title = parts
                    .next()
                    .ok_or_else(|| ParseError::new("missing title in WriteToken"))?;
                let ts = parts
                    .next()
                    .ok_or_else(|| ParseError::new("missing timestamp in WriteToken"))?;
                let bypass = parts
                    .next()
                    .ok_or_else(|| ParseError::new("missing nobots flag in WriteToken"))?;
                Ok(WriteToken::Edit {
                    title: title.to_owned(),
                    base_timestamp: Date::from_iso8601(ts)?,
                    needs_nobots_bypass: bypass == "1",
                })
            }
            Some("noconflict") => {
                let title = parts
                    .next()
                    .ok_or_else(|| ParseError::new("missing title in WriteToken"))?;
                Ok(WriteToken::NoConflictDetection {
                    title: title.to_owned(),
                })
            }
            _ => Err(ParseError::new(format!("invalid WriteToken string {s:?}"))),
        }
    }
}

impl fmt::Display for WriteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_token())
    }
}

bitflags::bitflags! {
    /// Flags accepted by write operations (§4.7).
    #[derive(Default)]
    pub struct EditFlags: u16 {
        const MINOR = 1 << 0;
        const OMIT_BOT_FLAG = 1 << 1;
        const APPEND = 1 << 2;
        const ALLOW_BLANKING = 1 << 3;
        const BYPASS_NOBOTS = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceCase {
    CaseSensitive,
    FirstLetter,
}

#[derive(Debug, Clone)]
pub struct NamespaceInfo {
    pub canonical_name: String,
    pub case: NamespaceCase,
}

#[derive(Debug, Clone)]
pub struct InterwikiInfo {
    pub unnormalized_prefix: String,
    pub language: Option<String>,
}

/// Namespace 0 is `main`; this crate represents the interwiki sentinel
/// namespace as `-99`, per §4 GLOSSARY ("SPLIT_TITLE_INTERWIKI").
pub const SPLIT_TITLE_INTERWIKI: i32 = -99;
pub const MAIN_NAMESPACE: i32 = 0;

/// Cached site configuration, serialized as JSON version 1 (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteInfo {
    pub siteinfo_version: u32,
    pub namespaces: HashMap<i32, SiteInfoNamespace>,
    pub aliases: HashMap<String, i32>,
    pub interwikis: HashMap<String, SiteInfoInterwiki>,
    #[serde(rename = "redirect-aliases")]
    pub redirect_aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfoNamespace {
    pub number: i32,
    pub casemode: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteInfoInterwiki {
    pub lang: Option<String>,
}

impl SiteInfo {
    pub fn new() -> Self {
        Self {
            siteinfo_version: 1,
            namespaces: HashMap::new(),
            aliases: HashMap::new(),
            interwikis: HashMap::new(),
            redirect_aliases: vec!["#redirect".to_owned(), "#redirection".to_owned()],
        }
    }

    pub fn namespace_case(&self, ns: i32) -> NamespaceCase {
        match self.namespaces.get(&ns).map(|n| n.casemode) {
            Some(0) => NamespaceCase::CaseSensitive,
            _ => NamespaceCase::FirstLetter,
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    /// Reload from the raw `meta=siteinfo` API response (`query.namespaces`,
    /// `query.namespacealiases`, `query.interwikimap`).
    pub fn from_api_response(v: &serde_json::Value) -> Self {
        let mut info = SiteInfo::new();
        if let Some(namespaces) = crate::json::get(v, "namespaces").as_object() {
            for (num, ns) in namespaces {
                let number: i32 = num.parse().unwrap_or(0);
                let canonical = ns
                    .get("canonical")
                    .or_else(|| ns.get("*"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned();
                let casemode = if ns.get("case").and_then(|v| v.as_str()) == Some("case-sensitive")
                {
                    0
                } else {
                    1
                };
                info.aliases
                    .insert(canonical.to_lowercase(), number);
                info.namespaces.insert(
                    number,
                    SiteInfoNamespace {
                        number,
                        casemode,
                    },
                );
                let _ = canonical;
            }
        }
        if let Some(aliases) = crate::json::get(v, "namespacealiases").as_array() {
            for alias in aliases {
                if let (Some(name), Some(id)) = (
                    alias.get("*").and_then(|v| v.as_str()),
                    alias.get("id").and_then(|v| v.as_i64()),
                ) {
                    info.aliases.insert(name.to_lowercase(), id as i32);
                }
            }
        }
        if let Some(iw) = crate::json::get(v, "interwikimap").as_array() {
            for entry in iw {
                if let Some(prefix) = entry.get("prefix").and_then(|v| v.as_str()) {
                    info.interwikis.insert(
                        prefix.to_lowercase(),
                        SiteInfoInterwiki {
                            lang: entry
                                .get("language")
                                .and_then(|v| v.as_str())
                                .map(str::to_owned),
                        },
                    );
                }
            }
        }
        info
    }
}

/// The carved-up parts of a single title string (§3 "TitleParts").
///
/// The original title string is kept whole; the other fields are byte offsets
/// into it so that namespace/unprefixed-title/anchor are *views*, not copies.
#[derive(Debug, Clone)]
pub struct TitleParts {
    pub title: String,
    pub unprefixed_title_begin: usize,
    pub anchor_begin: Option<usize>,
    pub namespace_number: i32,
}

impl TitleParts {
    pub fn namespace(&self) -> &str {
        &self.title[..self.unprefixed_title_begin.saturating_sub(1).min(self.title.len())]
    }

    pub fn unprefixed_title(&self) -> &str {
        let end = self.anchor_begin.unwrap_or(self.title.len());
        &self.title[self.unprefixed_title_begin..end]
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor_begin.map(|b| &self.title[b..])
    }

    /// Truncate the anchor off, in place.
    pub fn clear_anchor(&mut self) {
        if let Some(b) = self.anchor_begin.take() {
            self.title.truncate(b);
        }
    }
}
