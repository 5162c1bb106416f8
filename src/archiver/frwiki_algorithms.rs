//! The concrete archiving algorithms used on the French Wikipedia (§4.8),
//! grounded on `frwiki_algorithms.cpp` and the base algorithms declared
//! alongside `Algorithm` itself in `algorithm.h`.

use std::sync::Arc;

use super::algorithm::{Algorithm, Algorithms, RunResult};
use super::signature_date::{compute_date_in_title, extract_max_signature_date};

fn title_line(thread_content: &str) -> &str {
    thread_content.lines().next().unwrap_or("").trim()
}

/// `ArchiveOldSectionsAlgorithm`: archive once the thread is old enough.
/// The age comparison itself happens in [`super::thread::Thread::compute_state`];
/// this algorithm only ever says "archive, using the thread's own age".
pub struct OldAlgorithm;

impl Algorithm for OldAlgorithm {
    fn name(&self) -> &'static str {
        "old"
    }

    fn run(&self, _thread_content: &str) -> RunResult {
        RunResult::archive()
    }
}

/// `EraseOldSectionsAlgorithm`: same as [`OldAlgorithm`] but deletes instead
/// of moving to an archive page (used for threads nobody wants kept, e.g.
/// vandalism reports once resolved).
pub struct EraseOldAlgorithm;

impl Algorithm for EraseOldAlgorithm {
    fn name(&self) -> &'static str {
        "eraseold"
    }

    fn run(&self, _thread_content: &str) -> RunResult {
        RunResult::erase()
    }
}

/// `"checked+old"`: only archivable once a reviewer has marked the thread as
/// settled, by placing one of a handful of check-mark templates in its title.
pub struct CheckInTitleAlgorithm;

const CHECK_MARKERS: [&str; 4] = ["{{vérifié", "{{verifie", "{{fait}}", "{{résolu"];

impl Algorithm for CheckInTitleAlgorithm {
    fn name(&self) -> &'static str {
        "checked+old"
    }

    fn run(&self, thread_content: &str) -> RunResult {
        let lower = title_line(thread_content).to_lowercase();
        if CHECK_MARKERS.iter().any(|marker| lower.contains(marker)) {
            RunResult::archive()
        } else {
            RunResult::keep()
        }
    }
}

/// `"oldtitle"`: measure age from a date embedded in the thread's title
/// (e.g. a monthly "== Janvier 2020 ==" section) rather than its signatures.
pub struct OldTitleAlgorithm;

impl Algorithm for OldTitleAlgorithm {
    fn name(&self) -> &'static str {
        "oldtitle"
    }

    fn run(&self, thread_content: &str) -> RunResult {
        let title = title_line(thread_content);
        let mut date = compute_date_in_title(title, true);
        if date.is_null() {
            date = extract_max_signature_date(title).utc_date;
        }
        if date.is_null() {
            return RunResult::keep();
        }
        RunResult::archive().with_forced_date(date)
    }
}

/// `FdNAlgorithm`: the fr-wiki "Forum des nouveaux" help desk keeps certain
/// templates on a thread while it's still an open question; those threads
/// are excluded from archiving regardless of age.
pub struct FdnAlgorithm;

const FDN_NON_FINAL_MARKERS: [&str; 2] = ["{{en cours}}", "{{question ouverte"];

impl Algorithm for FdnAlgorithm {
    fn name(&self) -> &'static str {
        "fdn"
    }

    fn run(&self, thread_content: &str) -> RunResult {
        let lower = thread_content.to_lowercase();
        if FDN_NON_FINAL_MARKERS.iter().any(|marker| lower.contains(marker)) {
            RunResult::keep()
        } else {
            RunResult::archive()
        }
    }
}

/// `EraseNewslettersAlgorithm`: mass-message newsletter deliveries and
/// similar automated notices are erased outright rather than archived.
pub struct EraseNewslettersAlgorithm;

const NEWSLETTER_MARKERS: [&str; 3] = ["{{raw/pdd}}", "{{wikimag message", "massmessage"];

impl Algorithm for EraseNewslettersAlgorithm {
    fn name(&self) -> &'static str {
        "eraseNewsletters"
    }

    fn run(&self, thread_content: &str) -> RunResult {
        let lower = thread_content.to_lowercase();
        if NEWSLETTER_MARKERS.iter().any(|marker| lower.contains(marker)) {
            RunResult::erase()
        } else {
            RunResult::keep()
        }
    }
}

/// `getFrwikiAlgorithms()`: the algorithms registered for fr-wiki talk-page
/// archiving, in priority order (earlier entries are tried, and matched by
/// rank, before later ones).
pub fn frwiki_algorithms() -> Algorithms {
    let mut algorithms = Algorithms::new();
    algorithms.add(Arc::new(EraseNewslettersAlgorithm));
    algorithms.add(Arc::new(FdnAlgorithm));
    algorithms.add(Arc::new(CheckInTitleAlgorithm));
    algorithms.add(Arc::new(OldTitleAlgorithm));
    algorithms.add(Arc::new(OldAlgorithm));
    algorithms.add(Arc::new(EraseOldAlgorithm));
    algorithms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_title_algorithm_forces_date_from_title() {
        let content = "== Janvier 2020 ==\nBonjour.";
        let result = OldTitleAlgorithm.run(content);
        assert_eq!(result.action, super::super::algorithm::ThreadAction::Archive);
        assert!(!result.forced_date.is_null());
    }

    #[test]
    fn check_in_title_keeps_unmarked_threads() {
        let content = "== Une question ==\nBonjour.";
        let result = CheckInTitleAlgorithm.run(content);
        assert_eq!(result.action, super::super::algorithm::ThreadAction::Keep);
    }

    #[test]
    fn check_in_title_archives_marked_threads() {
        let content = "== Une question {{Fait}} ==\nBonjour.";
        let result = CheckInTitleAlgorithm.run(content);
        assert_eq!(result.action, super::super::algorithm::ThreadAction::Archive);
    }

    #[test]
    fn erase_newsletters_only_matches_known_markers() {
        let content = "== Bulletin ==\n{{RAW/PdD}}";
        assert_eq!(
            EraseNewslettersAlgorithm.run(content).action,
            super::super::algorithm::ThreadAction::Erase
        );
        assert_eq!(
            EraseNewslettersAlgorithm.run("== Bonjour ==\ntexte").action,
            super::super::algorithm::ThreadAction::Keep
        );
    }

    #[test]
    fn frwiki_algorithms_registers_every_known_name() {
        let algorithms = frwiki_algorithms();
        for name in ["old", "eraseold", "checked+old", "oldtitle", "fdn", "eraseNewsletters"] {
            assert!(algorithms.find(name).is_some(), "missing {name}");
        }
    }
}
