//! Talk-page archiving (§4.8): split a talk page into threads, decide which
//! are old enough to archive or erase per the page's own
//! `{{Archivage par bot}}` configuration, and write the result back —
//! archive pages first, then the trimmed source page — grounded on
//! `orlodrimbot/talk_page_archiver/archiver.cpp`.

mod algorithm;
mod archive_page;
mod archive_template;
pub mod frwiki_algorithms;
mod signature_date;
mod thread;
mod tracking_template;

pub use algorithm::{Algorithm, Algorithms, ParameterizedAlgorithm, RunResult, ThreadAction};
pub use archive_page::{expand_archive_pattern, generate_edit_summary, ArchivePagesBuffer};
pub use archive_template::{ArchiveParams, ParamsInitializationError, ARCHIVE_TEMPLATE_NAME};
pub use signature_date::{
    compute_date_in_title, extract_first_date, extract_max_signature_date, parse_date, ParseFlags, SignatureDate,
};
pub use thread::{get_title_level, parse_code_as_threads, HistoryCache, Thread, ThreadState};
pub use tracking_template::{extract_tracking_template, TrackingTemplateExtraction};

use std::collections::HashMap;
use std::path::Path;

use crate::date::Date;
use crate::parser::{List, NormalizeFlags, ParserOptions};
use crate::types::EditFlags;
use crate::wiki::{RevProp, Wiki, PAGER_ALL};

/// Errors specific to the archiving pipeline, layered on top of the
/// crate-wide [`crate::Error`] (`archiver.cpp`'s `ArchiverError`).
#[derive(Debug, thiserror::Error)]
pub enum ArchiverError {
    #[error("{0:?} is not a valid archive target for {1:?} (must be one of its subpages)")]
    InvalidArchiveName(String, String),
    #[error(transparent)]
    Params(#[from] ParamsInitializationError),
    #[error(transparent)]
    Wiki(#[from] crate::Error),
    #[error("{0:?} has a category tracking template, which only supports the 'oldtitle' algorithm")]
    TrackingTemplateNeedsOldtitle(String),
}

/// `checkArchiveName`: an archive target must be a genuine subpage of the
/// page it archives, never the page itself or an unrelated title.
fn check_archive_name(page_title: &str, archive_title: &str) -> Result<(), ArchiverError> {
    if archive_title == page_title || !archive_title.starts_with(&format!("{page_title}/")) {
        return Err(ArchiverError::InvalidArchiveName(archive_title.to_owned(), page_title.to_owned()));
    }
    Ok(())
}

/// Re-parse just the preamble chunk to rewrite the config template's
/// `counter=` field, rather than re-threading the whole page through one
/// mutable tree: threads are handled as plain text everywhere else in this
/// module, so only the one chunk that might contain the template needs to
/// round-trip through the parser.
fn rewrite_counter_field(chunk: &str, new_counter: i64) -> String {
    let mut tree = match crate::parser::parse(chunk, &ParserOptions::default()) {
        Ok(tree) => tree,
        Err(_) => return chunk.to_owned(),
    };
    match archive_template::find_archive_template(&mut tree) {
        Some(template) => {
            let fields = template.parsed_fields(NormalizeFlags::TRIM);
            match fields.index_of("counter") {
                Some(index) => template.set_field_value(index, &new_counter.to_string()),
                None => template.add_field(&format!("counter={new_counter}")),
            }
            tree.to_text()
        }
        None => chunk.to_owned(),
    }
}

/// How many threads moved where after one [`Archiver::archive_page`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub archived: usize,
    pub erased: usize,
}

/// Drives the archiving pipeline for one wiki, with one bot identity (used
/// in edit summaries) and one set of known [`Algorithm`]s (see
/// [`frwiki_algorithms::frwiki_algorithms`]).
pub struct Archiver<'a> {
    wiki: &'a Wiki,
    bot_name: String,
    algorithms: Algorithms,
}

impl<'a> Archiver<'a> {
    pub fn new(wiki: &'a Wiki, bot_name: impl Into<String>, algorithms: Algorithms) -> Self {
        Archiver { wiki, bot_name: bot_name.into(), algorithms }
    }

    /// Archive (and/or erase) every thread on `title` that's due, according
    /// to its own `{{Archivage par bot}}` configuration. Returns `None` when
    /// nothing changed: the page has no config template, doesn't exist, or
    /// doesn't currently meet `minthreadstoarchive`/`minthreadsleft`.
    pub async fn archive_page(&self, title: &str) -> Result<Option<ArchiveStats>, ArchiverError> {
        let (revision, token) = self.wiki.read_page_for_write(title).await?;
        let Some(content) = revision.content else {
            return Ok(None);
        };

        let mut config_tree = crate::parser::parse(&content, &ParserOptions::default()).unwrap_or_else(|_| List::new());
        let params = ArchiveParams::parse(&mut config_tree, &self.algorithms)?;
        let sample_archive_title = expand_archive_pattern(&params.archive, params.counter, Date::now());
        check_archive_name(title, &sample_archive_title)?;

        // A category tracking wrapper (§4.8 "page decomposition") splits the
        // page into threads read off its enclosed code only, carrying the
        // header/footer around it through untouched. `archiver.cpp` only
        // supports this in combination with the `oldtitle` algorithm, since
        // tracked sections are titled by date rather than signed.
        let tracking = extract_tracking_template(&content);
        if tracking.is_some()
            && (params.algorithms.len() != 1 || params.algorithms[0].algorithm.name() != "oldtitle")
        {
            return Err(ArchiverError::TrackingTemplateNeedsOldtitle(title.to_owned()));
        }
        let code_to_split = tracking.as_ref().map_or(content.as_str(), |t| t.inner_code.as_str());
        let has_tracking_template = tracking.is_some();

        let mut threads = parse_code_as_threads(code_to_split);
        let mut history_cache = HistoryCache::new(title);
        let now = Date::now();
        for thread in &mut threads {
            thread.compute_state(self.wiki, now, &params.algorithms, &mut history_cache).await?;
        }

        let archived_count = threads.iter().filter(|t| t.state == ThreadState::Archivable).count();
        let erased_count = threads.iter().filter(|t| t.state == ThreadState::Erasable).count();
        let kept_count = threads.len() - archived_count - erased_count;

        let (min_threads_left, min_threads_to_archive) = params.min_threads(has_tracking_template);
        if archived_count + erased_count < min_threads_to_archive as usize {
            return Ok(None);
        }
        if kept_count < min_threads_left as usize {
            return Ok(None);
        }

        let mut buffer = ArchivePagesBuffer::new(
            self.wiki,
            &params.archive,
            params.counter,
            params.max_archive_size,
            &params.archive_header,
        );
        let mut kept = Vec::new();
        let mut to_archive = Vec::new();
        for mut thread in threads {
            match thread.state {
                ThreadState::Archivable => {
                    thread.state = ThreadState::Archived;
                    to_archive.push(thread);
                }
                ThreadState::Erasable => {
                    thread.state = ThreadState::Erased;
                }
                _ => kept.push(thread),
            }
        }
        // A tracking-template page archives its newest thread first.
        if has_tracking_template {
            to_archive.reverse();
        }
        for thread in to_archive {
            buffer.add_thread(thread).await?;
        }

        let summary = generate_edit_summary(archived_count, erased_count, &self.bot_name);
        buffer.flush(&summary).await?;

        let mut rebuilt_inner = String::new();
        for (index, thread) in kept.iter().enumerate() {
            if !has_tracking_template && index == 0 && thread.title_level == 0 {
                rebuilt_inner.push_str(&rewrite_counter_field(&thread.text, buffer.final_counter()));
            } else {
                rebuilt_inner.push_str(&thread.text);
            }
        }

        let rebuilt = match &tracking {
            Some(t) => format!("{}{}{}", rewrite_counter_field(&t.header, buffer.final_counter()), rebuilt_inner, t.footer),
            None => rebuilt_inner,
        };

        self.wiki.write_page(&token, &rebuilt, &summary, EditFlags::BYPASS_NOBOTS).await?;
        Ok(Some(ArchiveStats { archived: archived_count, erased: erased_count }))
    }

    /// Archive every page in `titles`, collecting each page's own result
    /// rather than stopping at the first failure (one misconfigured talk
    /// page shouldn't block the rest of a batch).
    pub async fn archive_pages(&self, titles: &[String]) -> Vec<(String, Result<Option<ArchiveStats>, ArchiverError>)> {
        let mut results = Vec::with_capacity(titles.len());
        for title in titles {
            results.push((title.clone(), self.archive_page(title).await));
        }
        results
    }

    /// Archive every page transcluding the archiving config template,
    /// discovered via `template_title` (e.g. `"Modèle:Archivage par bot"`),
    /// skipping pages whose revision hasn't changed since the last run
    /// (`archiver.cpp`'s `filterStablePages`).
    pub async fn archive_all(
        &self,
        template_title: &str,
        stable_revids: &mut StableRevids,
    ) -> crate::Result<Vec<(String, Result<Option<ArchiveStats>, ArchiverError>)>> {
        let candidates = self.wiki.get_transclusions(template_title, PAGER_ALL).await?;
        let mut to_process = Vec::new();
        for title in candidates {
            let revision = self.wiki.read_page_if_exists(&title, RevProp::IDS).await?;
            if !revision.exists() {
                continue;
            }
            if stable_revids.get(&title) == Some(revision.revid) {
                continue;
            }
            to_process.push(title);
        }

        let results = self.archive_pages(&to_process).await;
        for (title, result) in &results {
            if result.is_ok() {
                if let Ok(revision) = self.wiki.read_page_if_exists(title, RevProp::IDS).await {
                    stable_revids.set(title.clone(), revision.revid);
                }
            }
        }
        Ok(results)
    }
}

/// A persisted map of page title to the revid last processed by
/// [`Archiver::archive_all`], so unchanged pages are skipped on the next run
/// (`archiver.cpp`'s `loadStableRevids`/`saveStableRevids`).
#[derive(Default)]
pub struct StableRevids {
    by_title: HashMap<String, u64>,
}

impl StableRevids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, title: &str) -> Option<u64> {
        self.by_title.get(title).copied()
    }

    pub fn set(&mut self, title: String, revid: u64) {
        self.by_title.insert(title, revid);
    }

    /// Load from a flat `title\trevid` file, one entry per line. A missing
    /// file loads as empty (first run).
    pub async fn load_from_file(path: &Path) -> std::io::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let mut by_title = HashMap::new();
                for line in contents.lines() {
                    if let Some((title, revid)) = line.split_once('\t') {
                        if let Ok(revid) = revid.parse() {
                            by_title.insert(title.to_owned(), revid);
                        }
                    }
                }
                Ok(StableRevids { by_title })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StableRevids::default()),
            Err(e) => Err(e),
        }
    }

    pub async fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        let mut contents = String::new();
        for (title, revid) in &self.by_title {
            contents.push_str(title);
            contents.push('\t');
            contents.push_str(&revid.to_string());
            contents.push('\n');
        }
        tokio::fs::write(path, contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_name_must_be_a_subpage() {
        assert!(check_archive_name("Discussion:Foo", "Discussion:Foo/Archive 1").is_ok());
        assert!(check_archive_name("Discussion:Foo", "Discussion:Foo").is_err());
        assert!(check_archive_name("Discussion:Foo", "Discussion:Bar/Archive 1").is_err());
    }

    #[test]
    fn rewrites_counter_in_place() {
        let chunk = "{{Archivage par bot|archive=Foo/Archive %(counter)d|counter=3}}\n";
        let rewritten = rewrite_counter_field(chunk, 4);
        assert!(rewritten.contains("counter=4"));
        assert!(!rewritten.contains("counter=3"));
    }

    #[test]
    fn rewrite_adds_counter_field_when_absent() {
        let chunk = "{{Archivage par bot|archive=Foo/Archive %(counter)d}}\n";
        let rewritten = rewrite_counter_field(chunk, 2);
        assert!(rewritten.contains("counter=2"));
    }

    #[test]
    fn stable_revids_round_trip_through_the_in_memory_map() {
        let mut store = StableRevids::new();
        assert_eq!(store.get("Discussion:Foo"), None);
        store.set("Discussion:Foo".to_owned(), 42);
        assert_eq!(store.get("Discussion:Foo"), Some(42));
    }
}
