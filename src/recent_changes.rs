//! Read-only access to a local sqlite replica of the recent-changes stream
//! (§4.9), grounded on `RecentChangesReader::enumRecentChanges` and
//! `parseContinueToken`/`buildContinueToken` from the original live-replication
//! reader. Unlike [`crate::wiki::Wiki::get_recent_changes`] (which polls the
//! API), this reads a `recentchanges`-shaped sqlite table directly, the way a
//! bot running on wiki infrastructure would read the replica database rather
//! than round-trip through HTTP for a high-volume scan.

use rusqlite::{Connection, OpenFlags, Row};

use crate::date::Date;
use crate::error::{Error, ParseError, Result};
use crate::types::{LogEvent, LogType, MoveParams, RecentChange, Revision};

/// `WikiPager::PAGER_ALL`, re-exported here since this module has its own
/// pager-shaped cursor independent of [`crate::wiki`].
pub const PAGER_ALL: i64 = crate::wiki::PAGER_ALL;

/// Which kinds of recent change to enumerate, mirroring `RC_TYPES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Edit,
    New,
    Log,
}

impl ChangeType {
    fn as_sql(self) -> &'static str {
        match self {
            ChangeType::Edit => "edit",
            ChangeType::New => "new",
            ChangeType::Log => "log",
        }
    }

    fn from_sql(s: &str) -> Option<Self> {
        match s {
            "edit" => Some(ChangeType::Edit),
            "new" => Some(ChangeType::New),
            "log" => Some(ChangeType::Log),
            _ => None,
        }
    }
}

/// Options controlling one [`RecentChangesReader::enum_recent_changes`] scan.
#[derive(Debug, Clone, Default)]
pub struct EnumOptions {
    /// Resume from this continue token rather than `start`/the latest rcid.
    pub continue_token: Option<String>,
    /// Only include changes at or after this timestamp. Ignored once
    /// `continue_token` is set (the token already encodes a position).
    pub start: Option<Date>,
    /// Stop (without erroring) once a change at or after this timestamp is seen.
    pub end: Option<Date>,
    /// Restrict to these change types; empty means all three.
    pub types: Vec<ChangeType>,
    /// Stop after this many results. `PAGER_ALL` (the default, `0`, is
    /// treated the same as `PAGER_ALL` here since there's no natural "zero"
    /// scan) means unbounded.
    pub limit: i64,
    /// Skip changes attributed to this user, e.g. to exclude the calling
    /// bot's own edits from `getRecentlyUpdatedPages`.
    pub excluded_user: Option<String>,
}

/// One page of an [`RecentChangesReader::enum_recent_changes`] scan: the
/// changes found plus the token to resume from.
pub struct EnumPage {
    pub changes: Vec<RecentChange>,
    pub continue_token: String,
}

/// Parse a `"type|data"` continue token, checking it matches `expected_type`
/// (`parseContinueToken`).
fn parse_continue_token(token: &str, expected_type: &str) -> Result<i64> {
    let (kind, data) = token
        .split_once('|')
        .ok_or_else(|| Error::Parse(ParseError::new(format!("malformed continue token {token:?}"))))?;
    if kind != expected_type {
        return Err(Error::Parse(ParseError::new(format!(
            "continue token {token:?} has type {kind:?}, expected {expected_type:?}"
        ))));
    }
    data.parse().map_err(|_| {
        Error::Parse(ParseError::new(format!(
            "continue token {token:?} has a non-numeric payload"
        )))
    })
}

/// Build a `"type|data"` continue token (`buildContinueToken`).
fn build_continue_token(kind: &str, data: i64) -> String {
    format!("{kind}|{data}")
}

fn row_to_move_params(row: &Row<'_>) -> rusqlite::Result<Option<MoveParams>> {
    let new_title: Option<String> = row.get("new_title")?;
    Ok(new_title.map(|new_title| MoveParams {
        new_title,
        suppress_redirect: false,
    }))
}

fn row_to_recent_change(row: &Row<'_>) -> rusqlite::Result<RecentChange> {
    let rcid: i64 = row.get("rcid")?;
    let rcid = rcid as u64;
    let old_revid: i64 = row.get::<_, Option<i64>>("old_revid")?.unwrap_or(0);
    let old_size: i64 = row.get::<_, Option<i64>>("oldlen")?.unwrap_or(0);
    let kind: String = row.get("type")?;
    let timestamp_str: String = row.get("timestamp")?;
    let timestamp = Date::from_iso8601(&timestamp_str).unwrap_or(Date::null());

    match ChangeType::from_sql(&kind) {
        Some(ChangeType::Edit) | Some(ChangeType::New) => {
            let revision = Revision {
                title: row.get("title")?,
                revid: row.get::<_, Option<i64>>("revid")?.unwrap_or(0) as u64,
                timestamp,
                user: row.get("user")?,
                userid: 0,
                size: row.get::<_, Option<i64>>("size")?.unwrap_or(0) as u64,
                comment: row.get("comment")?,
                parsed_comment: String::new(),
                content: None,
                sha1: String::new(),
                tags: Vec::new(),
                content_model: crate::types::ContentModel::Invalid,
                flags: crate::types::RevisionFlags::empty(),
            };
            Ok(if kind == "new" {
                RecentChange::New { rcid, revision, old_revid: old_revid as u64, old_size: old_size as u64 }
            } else {
                RecentChange::Edit { rcid, revision, old_revid: old_revid as u64, old_size: old_size as u64 }
            })
        }
        _ => {
            let logid: i64 = row.get::<_, Option<i64>>("logid")?.unwrap_or(0);
            let event = LogEvent {
                logid: logid as u64,
                log_type: row
                    .get::<_, Option<String>>("logtype")?
                    .as_deref()
                    .map(LogType::from_api)
                    .unwrap_or(LogType::Other),
                action: row.get::<_, Option<String>>("logaction")?.unwrap_or_default(),
                timestamp,
                title: row.get("title")?,
                user: row.get("user")?,
                userid: 0,
                comment: row.get("comment")?,
                parsed_comment: String::new(),
                move_params: row_to_move_params(row)?,
            };
            Ok(RecentChange::Log { rcid, event, old_revid: old_revid as u64, old_size: old_size as u64 })
        }
    }
}

/// Read-only handle to a `recentchanges`-shaped sqlite replica.
pub struct RecentChangesReader {
    conn: Connection,
}

impl RecentChangesReader {
    pub fn open(database_path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(database_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| Error::Core(format!("failed to open recent changes database: {e}")))?;
        Ok(Self { conn })
    }

    /// An always-empty reader, for tests and for wikis with no local replica
    /// configured (`EmptyRecentChangesReader`).
    pub fn empty() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Core(format!("failed to open in-memory database: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE recentchanges (
                rcid INTEGER PRIMARY KEY, type TEXT, title TEXT, new_title TEXT, user TEXT,
                timestamp TEXT, size INTEGER, oldlen INTEGER, comment TEXT, revid INTEGER,
                old_revid INTEGER, logid INTEGER, logtype TEXT, logaction TEXT
            );",
        )
        .map_err(|e| Error::Core(format!("failed to initialize in-memory database: {e}")))?;
        Ok(Self { conn })
    }

    fn resolve_start_rcid(&self, options: &EnumOptions) -> Result<i64> {
        if let Some(token) = &options.continue_token {
            return parse_continue_token(token, "rc");
        }
        if let Some(start) = options.start {
            let row: Option<i64> = self
                .conn
                .query_row(
                    "SELECT MIN(rcid) FROM recentchanges WHERE timestamp >= ?1",
                    [start.to_iso8601()],
                    |r| r.get(0),
                )
                .ok();
            return Ok(row.unwrap_or(i64::MAX));
        }
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(rcid) FROM recentchanges", [], |r| r.get(0))
            .unwrap_or(None);
        Ok(max.map(|m| m + 1).unwrap_or(1))
    }

    /// Scan the replica from `options`'s resume point, calling `callback` for
    /// each matching row in ascending `rcid` order, until `options.limit`
    /// results have been emitted, `options.end` is reached, or the table is
    /// exhausted. Returns the continue token to resume a later scan from.
    pub fn enum_recent_changes(
        &self,
        options: &EnumOptions,
        mut callback: impl FnMut(&RecentChange),
    ) -> Result<String> {
        let start_rcid = self.resolve_start_rcid(options)?;
        let type_filter = if options.types.is_empty() {
            "(type='edit' OR type='new' OR type='log')".to_owned()
        } else {
            let clauses: Vec<String> = options
                .types
                .iter()
                .map(|t| format!("type='{}'", t.as_sql()))
                .collect();
            format!("({})", clauses.join(" OR "))
        };
        let query = format!(
            "SELECT rcid, type, title, new_title, user, timestamp, size, oldlen, comment, \
             revid, old_revid, logid, logtype, logaction \
             FROM recentchanges WHERE rcid >= ?1 AND {type_filter} ORDER BY rcid"
        );
        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| Error::Core(format!("invalid recent changes query: {e}")))?;
        let mut rows = stmt
            .query([start_rcid])
            .map_err(|e| Error::Core(format!("recent changes query failed: {e}")))?;

        let mut emitted = 0i64;
        let mut next_rcid = start_rcid;
        while let Some(row) = rows.next().map_err(|e| Error::Core(e.to_string()))? {
            if options.limit != PAGER_ALL && emitted >= options.limit {
                break;
            }
            let change = row_to_recent_change(row).map_err(|e| Error::Core(e.to_string()))?;
            if let Some(end) = options.end {
                if change.timestamp() >= end {
                    break;
                }
            }
            next_rcid = change.rcid() as i64 + 1;
            if let Some(excluded) = &options.excluded_user {
                if change.user() == excluded {
                    continue;
                }
            }
            callback(&change);
            emitted += 1;
        }
        Ok(build_continue_token("rc", next_rcid))
    }

    /// Pages that were newly created or edited, in `rcid` order
    /// (`getRecentlyUpdatedPages`).
    pub fn get_recently_updated_pages(&self, options: &EnumOptions) -> Result<EnumPage> {
        let mut filtered = options.clone();
        filtered.types = vec![ChangeType::Edit, ChangeType::New];
        let mut changes = Vec::new();
        let continue_token = self.enum_recent_changes(&filtered, |c| changes.push(c.clone()))?;
        Ok(EnumPage { changes, continue_token })
    }

    /// Logged actions only, in `rcid` order (`getRecentLogEvents`).
    pub fn get_recent_log_events(&self, options: &EnumOptions) -> Result<EnumPage> {
        let mut filtered = options.clone();
        filtered.types = vec![ChangeType::Log];
        let mut changes = Vec::new();
        let continue_token = self.enum_recent_changes(&filtered, |c| changes.push(c.clone()))?;
        Ok(EnumPage { changes, continue_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE recentchanges (
                rcid INTEGER PRIMARY KEY,
                type TEXT,
                title TEXT,
                new_title TEXT,
                user TEXT,
                timestamp TEXT,
                size INTEGER,
                oldlen INTEGER,
                comment TEXT,
                revid INTEGER,
                old_revid INTEGER,
                logid INTEGER,
                logtype TEXT,
                logaction TEXT
            );
            INSERT INTO recentchanges (rcid, type, title, user, timestamp, size, oldlen, comment, revid, old_revid)
                VALUES (1, 'edit', 'Foo', 'Alice', '2020-01-01T00:00:00Z', 100, 90, 'edit summary', 11, 10);
            INSERT INTO recentchanges (rcid, type, title, user, timestamp, size, oldlen, comment, revid)
                VALUES (2, 'new', 'Bar', 'Bob', '2020-01-02T00:00:00Z', 50, 0, 'new page', 20);
            INSERT INTO recentchanges (rcid, type, title, user, timestamp, comment, logid, logtype, logaction)
                VALUES (3, 'log', 'Baz', 'Carol', '2020-01-03T00:00:00Z', 'deleted page', 5, 'delete', 'delete');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn continue_token_round_trips() {
        let token = build_continue_token("rc", 42);
        assert_eq!(token, "rc|42");
        assert_eq!(parse_continue_token(&token, "rc").unwrap(), 42);
    }

    #[test]
    fn continue_token_rejects_wrong_type() {
        assert!(parse_continue_token("other|42", "rc").is_err());
    }

    #[test]
    fn continue_token_rejects_malformed_payload() {
        assert!(parse_continue_token("rc|notanumber", "rc").is_err());
    }

    #[test]
    fn enum_recent_changes_yields_rows_in_rcid_order_and_builds_a_resumable_token() {
        let reader = RecentChangesReader { conn: seed_db() };
        let mut seen = Vec::new();
        let token = reader
            .enum_recent_changes(&EnumOptions::default(), |c| seen.push(c.rcid()))
            .unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(token, "rc|4");
    }

    #[test]
    fn enum_recent_changes_resumes_from_a_continue_token() {
        let reader = RecentChangesReader { conn: seed_db() };
        let options = EnumOptions {
            continue_token: Some("rc|2".to_owned()),
            ..Default::default()
        };
        let mut seen = Vec::new();
        reader.enum_recent_changes(&options, |c| seen.push(c.rcid())).unwrap();
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn get_recently_updated_pages_excludes_log_events() {
        let reader = RecentChangesReader { conn: seed_db() };
        let page = reader.get_recently_updated_pages(&EnumOptions::default()).unwrap();
        assert_eq!(page.changes.len(), 2);
        assert!(page.changes.iter().all(|c| c.rcid() != 3));
    }

    #[test]
    fn get_recently_updated_pages_honors_excluded_user() {
        let reader = RecentChangesReader { conn: seed_db() };
        let options = EnumOptions {
            excluded_user: Some("Alice".to_owned()),
            ..Default::default()
        };
        let page = reader.get_recently_updated_pages(&options).unwrap();
        assert_eq!(page.changes.len(), 1);
        assert_eq!(page.changes[0].rcid(), 2);
    }

    #[test]
    fn get_recent_log_events_only_returns_log_entries() {
        let reader = RecentChangesReader { conn: seed_db() };
        let page = reader.get_recent_log_events(&EnumOptions::default()).unwrap();
        assert_eq!(page.changes.len(), 1);
        assert_eq!(page.changes[0].rcid(), 3);
    }

    #[test]
    fn empty_reader_yields_nothing() {
        let reader = RecentChangesReader::empty().unwrap();
        let mut seen = 0;
        reader.enum_recent_changes(&EnumOptions::default(), |_| seen += 1).unwrap();
        assert_eq!(seen, 0);
    }
}
