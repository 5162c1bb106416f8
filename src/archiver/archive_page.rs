//! Archive-page selection and writing (§4.8), grounded on `archiver.cpp`'s
//! `ArchivePage`/`ArchivePagesBuffer`.

use std::collections::HashMap;

use crate::date::Date;
use crate::types::EditFlags;
use crate::wiki::{RevProp, Wiki};
use crate::Result;

use super::thread::Thread;

const MONTH_NAMES: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre", "octobre", "novembre",
    "décembre",
];

/// Expand the `%(counter)d`, `%(year)d`, `%(month)d`, `%(month)02d`,
/// `%(monthname)s` and `%(quarter)d` placeholders an `archive=` pattern may
/// contain, against one candidate thread's date and the page's running
/// counter.
pub fn expand_archive_pattern(pattern: &str, counter: i64, date: Date) -> String {
    let year = date.year().unwrap_or(1) as i64;
    let month = date.month().unwrap_or(1) as i64;
    let quarter = (month - 1) / 3 + 1;
    let monthname = MONTH_NAMES[(month as usize).saturating_sub(1).min(11)];

    let mut out = String::new();
    let mut rest = pattern;
    while let Some(start) = rest.find("%(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(close) = after.find(')') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let key = &after[..close];
        let spec = &after[close + 1..];
        let digits_end = spec.find(|c: char| !c.is_ascii_digit()).unwrap_or(spec.len());
        let width_spec = &spec[..digits_end];
        let conversion = spec.get(digits_end..digits_end + 1).unwrap_or("");
        let consumed = digits_end + conversion.len();
        let width: usize = width_spec.parse().unwrap_or(0);
        match (key, conversion) {
            ("counter", "d") => out.push_str(&format!("{counter:0width$}")),
            ("year", "d") => out.push_str(&format!("{year:0width$}")),
            ("month", "d") => out.push_str(&format!("{month:0width$}")),
            ("quarter", "d") => out.push_str(&format!("{quarter:0width$}")),
            ("monthname", "s") => out.push_str(monthname),
            _ => {
                out.push_str("%(");
                out.push_str(key);
                out.push(')');
            }
        }
        rest = &spec[consumed..];
    }
    out.push_str(rest);
    out
}

/// Buffers threads destined for each archive page so every thread bound for
/// the same target is written in a single edit, then writes them all.
/// Counter-style patterns (containing `%(counter)`) grow past
/// `max_archive_size` onto the next counter value; date-style patterns
/// (month/year/quarter) group strictly by the thread's own date.
pub struct ArchivePagesBuffer<'a> {
    wiki: &'a Wiki,
    pattern: String,
    max_archive_size: i64,
    archive_header: String,
    counter: i64,
    is_counter_style: bool,
    order: Vec<String>,
    pages: HashMap<String, Vec<Thread>>,
}

impl<'a> ArchivePagesBuffer<'a> {
    pub fn new(wiki: &'a Wiki, pattern: &str, counter: i64, max_archive_size: i64, archive_header: &str) -> Self {
        ArchivePagesBuffer {
            wiki,
            pattern: pattern.to_owned(),
            max_archive_size,
            archive_header: archive_header.to_owned(),
            counter,
            is_counter_style: pattern.contains("%(counter)"),
            order: Vec::new(),
            pages: HashMap::new(),
        }
    }

    fn push_to(&mut self, title: String, thread: Thread) {
        if !self.pages.contains_key(&title) {
            self.order.push(title.clone());
        }
        self.pages.entry(title).or_default().push(thread);
    }

    async fn page_size(&self, title: &str) -> Result<i64> {
        let revision = self.wiki.read_page_if_exists(title, RevProp::SIZE).await?;
        Ok(if revision.exists() { revision.size as i64 } else { 0 })
    }

    fn buffered_size(&self, title: &str) -> i64 {
        self.pages
            .get(title)
            .map(|threads| threads.iter().map(|t| t.text.len() as i64).sum())
            .unwrap_or(0)
    }

    /// Add one thread to whichever archive page it belongs on. For a
    /// counter-style pattern this is a linear probe forward from the current
    /// counter rather than `archiver.cpp`'s binary search over existing
    /// archives' sizes: this crate has no local cache of every archive
    /// page's size to binary-search over, only on-demand lookups, so there's
    /// nothing to save by bisecting.
    pub async fn add_thread(&mut self, thread: Thread) -> Result<()> {
        if !self.is_counter_style {
            let title = expand_archive_pattern(&self.pattern, self.counter, thread.date);
            self.push_to(title, thread);
            return Ok(());
        }
        loop {
            let title = expand_archive_pattern(&self.pattern, self.counter, thread.date);
            if self.pages.contains_key(&title) {
                let projected = self.buffered_size(&title) + thread.text.len() as i64;
                if projected <= self.max_archive_size {
                    self.push_to(title, thread);
                    return Ok(());
                }
                self.counter += 1;
                continue;
            }
            let existing_size = self.page_size(&title).await?;
            if existing_size == 0 || existing_size + thread.text.len() as i64 <= self.max_archive_size {
                self.push_to(title, thread);
                return Ok(());
            }
            self.counter += 1;
        }
    }

    /// The counter value to persist back into `{{Archivage par bot}}` after
    /// this batch, so the next run picks up where this one left off.
    pub fn final_counter(&self) -> i64 {
        self.counter
    }

    /// Write every buffered archive page, appending new threads after
    /// whatever content the page already has.
    pub async fn flush(&self, edit_summary: &str) -> Result<()> {
        for title in &self.order {
            let threads = &self.pages[title];
            let mut addition = String::new();
            for thread in threads {
                addition.push_str(&thread.text);
            }
            let (revision, token) = self.wiki.read_page_for_write(title).await?;
            let mut content = revision.content.unwrap_or_default();
            if content.is_empty() && !self.archive_header.is_empty() {
                content.push_str(&self.archive_header);
                content.push('\n');
            }
            content.push_str(&addition);
            self.wiki
                .write_page(&token, &content, edit_summary, EditFlags::BYPASS_NOBOTS)
                .await?;
        }
        Ok(())
    }
}

/// `generateEditSummary`: compose the French edit summary used when writing
/// back to the source talk page after archiving/erasing threads.
pub fn generate_edit_summary(archived: usize, erased: usize, bot_name: &str) -> String {
    let mut parts = Vec::new();
    if archived > 0 {
        parts.push(format!("{archived} section(s) archivée(s)"));
    }
    if erased > 0 {
        parts.push(format!("{erased} section(s) effacée(s)"));
    }
    if parts.is_empty() {
        format!("Maintenance de l'archivage ({bot_name})")
    } else {
        format!("{} ({bot_name})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_counter_and_date_placeholders() {
        let date = Date::from_ymd_hms(2021, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(
            expand_archive_pattern("Talk:Foo/Archive %(counter)d", 7, date),
            "Talk:Foo/Archive 7"
        );
        assert_eq!(
            expand_archive_pattern("Talk:Foo/%(year)d-%(month)02d", 1, date),
            "Talk:Foo/2021-03"
        );
        assert_eq!(
            expand_archive_pattern("Talk:Foo/%(monthname)s %(year)d", 1, date),
            "Talk:Foo/mars 2021"
        );
        assert_eq!(expand_archive_pattern("Talk:Foo/Q%(quarter)d %(year)d", 1, date), "Talk:Foo/Q1 2021");
    }

    #[test]
    fn summary_mentions_both_counts() {
        let summary = generate_edit_summary(2, 1, "ExampleBot");
        assert!(summary.contains("2 section"));
        assert!(summary.contains("1 section"));
    }

    #[test]
    fn summary_falls_back_when_nothing_happened() {
        let summary = generate_edit_summary(0, 0, "ExampleBot");
        assert!(summary.contains("ExampleBot"));
    }
}
