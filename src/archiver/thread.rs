//! Thread extraction and the archivability state machine (§4.8), grounded on
//! `thread.h`/`thread.cpp` and `thread_util.cpp`.

use crate::date::{Date, DateDiff};
use crate::wiki::{RevProp, Wiki};
use crate::Result;

use super::algorithm::{ParameterizedAlgorithm, ThreadAction};
use super::signature_date::extract_max_signature_date;

/// Where a thread stands in the archiving pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Not a level-2 section (the preamble before the first heading, or a
    /// subsection of a real thread): never touched.
    NeverArchivableBecauseOfTitleLevel,
    /// Contains an explicit "ne pas archiver" opt-out.
    NeverArchivableBecauseOfText,
    NotArchivableYet,
    Archivable,
    Erasable,
    Archived,
    Erased,
}

/// One `== Title ==` section of a talk page (or the preamble before the
/// first such heading), with whatever [`Thread::compute_state`] decided.
#[derive(Debug, Clone)]
pub struct Thread {
    pub title_level: u32,
    pub text: String,
    pub date: Date,
    pub state: ThreadState,
}

/// The heading depth of `line` (the number of matching leading/trailing
/// `=` characters, comments stripped first), or `0` if it isn't a heading.
pub fn get_title_level(line: &str) -> u32 {
    let stripped = strip_comments(line);
    let trimmed = stripped.trim_end();
    let leading = trimmed.chars().take_while(|&c| c == '=').count();
    if leading == 0 {
        return 0;
    }
    let trailing = trimmed.chars().rev().take_while(|&c| c == '=').count();
    if trimmed.trim().len() <= leading + trailing {
        // The whole (trimmed) line is just `=` characters: not a heading.
        return 0;
    }
    leading.min(trailing) as u32
}

fn strip_comments(line: &str) -> String {
    let mut out = String::new();
    let mut rest = line;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        rest = match rest[start..].find("-->") {
            Some(end) => &rest[start + end + 3..],
            None => return out,
        };
    }
    out.push_str(rest);
    out
}

/// Split `code` into threads: a line whose heading level is 1 or 2 starts a
/// new thread running up to (but not including) the next such line.
/// Anything before the first heading is its own level-0 "preamble" thread,
/// always [`ThreadState::NeverArchivableBecauseOfTitleLevel`].
pub fn parse_code_as_threads(code: &str) -> Vec<Thread> {
    let mut threads = Vec::new();
    let mut current_level = 0u32;
    let mut current_text = String::new();
    let mut any_heading_seen = false;

    for line in code.split_inclusive('\n') {
        let trimmed = line.strip_suffix('\n').unwrap_or(line);
        let level = get_title_level(trimmed);
        if level == 1 || level == 2 {
            if any_heading_seen || !current_text.is_empty() {
                threads.push(Thread::new(current_level, std::mem::take(&mut current_text)));
            }
            any_heading_seen = true;
            current_level = level;
        }
        current_text.push_str(line);
    }
    if !current_text.is_empty() || !any_heading_seen {
        threads.push(Thread::new(current_level, current_text));
    }
    threads
}

impl Thread {
    fn new(title_level: u32, text: String) -> Self {
        Thread {
            title_level,
            text,
            date: Date::null(),
            state: ThreadState::NotArchivableYet,
        }
    }

    /// The thread's title line (empty for the level-0 preamble).
    pub fn title(&self) -> &str {
        self.text.lines().next().unwrap_or("").trim()
    }

    /// Run every candidate algorithm in priority order, applying the page's
    /// own non-archivability overrides first (§4.8 "never archivable"), and
    /// settle this thread's [`ThreadState`] and the date its age was measured
    /// from.
    pub async fn compute_state(
        &mut self,
        wiki: &Wiki,
        now: Date,
        algorithms: &[ParameterizedAlgorithm],
        history_cache: &mut HistoryCache,
    ) -> Result<()> {
        if self.title_level != 2 {
            self.state = ThreadState::NeverArchivableBecauseOfTitleLevel;
            return Ok(());
        }
        let lower = self.text.to_lowercase();
        if lower.contains("ne pas archiver") {
            self.state = ThreadState::NeverArchivableBecauseOfText;
            return Ok(());
        }

        let mut decided_action = ThreadAction::Keep;
        let mut decided_date = Date::null();
        for param in algorithms {
            let result = param.algorithm.run(&self.text);
            if result.action == ThreadAction::Keep {
                continue;
            }
            let age_from = if !result.forced_date.is_null() {
                result.forced_date
            } else {
                let signature = extract_max_signature_date(&self.text);
                if !signature.is_null() {
                    signature.utc_date
                } else {
                    history_cache.search_thread_at_date(wiki, self.title()).await?
                }
            };
            if age_from + DateDiff::from_days(param.max_age_in_days) <= now {
                decided_action = result.action;
                decided_date = age_from;
                break;
            }
        }

        self.date = decided_date;
        self.state = match decided_action {
            ThreadAction::Keep => ThreadState::NotArchivableYet,
            ThreadAction::Archive => ThreadState::Archivable,
            ThreadAction::Erase => ThreadState::Erasable,
        };
        Ok(())
    }
}

/// Finds the date a thread first appeared on its talk page by walking page
/// history, for threads whose own age can't be read off a signature
/// (`thread.cpp`'s `HistoryCache`). Revisions are fetched once per page and
/// reused across every thread that needs the fallback.
pub struct HistoryCache {
    title: String,
    revisions: Vec<(Date, String)>,
    loaded: bool,
}

impl HistoryCache {
    pub fn new(title: impl Into<String>) -> Self {
        HistoryCache {
            title: title.into(),
            revisions: Vec::new(),
            loaded: false,
        }
    }

    async fn ensure_loaded(&mut self, wiki: &Wiki) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        self.loaded = true;
        let history = wiki
            .get_history(&self.title, 500, RevProp::CONTENT | RevProp::TIMESTAMP)
            .await?;
        self.revisions = history
            .into_iter()
            .filter_map(|rev| rev.content.map(|content| (rev.timestamp, content)))
            .collect();
        Ok(())
    }

    /// The oldest revision (walking back through history, newest first) that
    /// already contained a thread titled `thread_title`, or [`Date::now`] if
    /// it can't be found anywhere in the retained history (treated as "just
    /// created").
    pub async fn search_thread_at_date(&mut self, wiki: &Wiki, thread_title: &str) -> Result<Date> {
        self.ensure_loaded(wiki).await?;
        let mut earliest_seen = Date::now();
        for (timestamp, content) in &self.revisions {
            let present = parse_code_as_threads(content)
                .iter()
                .any(|thread| thread.title() == thread_title);
            if !present {
                break;
            }
            earliest_seen = *timestamp;
        }
        Ok(earliest_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_level_counts_matching_equals() {
        assert_eq!(get_title_level("== Hello =="), 2);
        assert_eq!(get_title_level("=== Hello ==="), 3);
        assert_eq!(get_title_level("Not a heading"), 0);
        assert_eq!(get_title_level("== mismatched ="), 1);
    }

    #[test]
    fn title_level_ignores_comments() {
        assert_eq!(get_title_level("==<!-- c -->Hello<!-- c -->=="), 2);
    }

    #[test]
    fn splits_into_threads_with_preamble() {
        let code = "Intro text.\n== A ==\nFirst thread.\n== B ==\nSecond thread.\n";
        let threads = parse_code_as_threads(code);
        assert_eq!(threads.len(), 3);
        assert_eq!(threads[0].title_level, 0);
        assert_eq!(threads[1].title(), "== A ==");
        assert_eq!(threads[2].title(), "== B ==");
    }

    #[test]
    fn no_heading_is_a_single_preamble_thread() {
        let threads = parse_code_as_threads("Just some text.\n");
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].title_level, 0);
    }
}
