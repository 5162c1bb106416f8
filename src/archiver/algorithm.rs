//! Pluggable per-thread archiving policy (§4.8), grounded on `algorithm.h`'s
//! `Algorithm`/`Algorithms`/`ParameterizedAlgorithm`.

use std::sync::Arc;

use crate::date::Date;

/// What an [`Algorithm`] decided to do with a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadAction {
    Keep,
    Archive,
    Erase,
}

/// The outcome of running one [`Algorithm`] against a thread's raw wikicode.
#[derive(Debug, Clone, Copy)]
pub struct RunResult {
    pub action: ThreadAction,
    /// A date this algorithm insists on measuring the thread's age from
    /// instead of its own signatures or page-history fallback (e.g. a date
    /// parsed out of the thread's title). [`Date::null`] means "no override".
    pub forced_date: Date,
}

impl RunResult {
    pub fn keep() -> Self {
        RunResult {
            action: ThreadAction::Keep,
            forced_date: Date::null(),
        }
    }

    pub fn archive() -> Self {
        RunResult {
            action: ThreadAction::Archive,
            forced_date: Date::null(),
        }
    }

    pub fn erase() -> Self {
        RunResult {
            action: ThreadAction::Erase,
            forced_date: Date::null(),
        }
    }

    pub fn with_forced_date(mut self, date: Date) -> Self {
        self.forced_date = date;
        self
    }
}

/// One named archiving policy. Stateless by construction — everything it
/// needs comes from the thread text it's handed — so instances are shared
/// behind an `Arc` rather than rebuilt per page.
pub trait Algorithm: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, thread_content: &str) -> RunResult;
}

/// An [`Algorithm`] together with the "after N days" threshold parsed out of
/// `{{Archivage par bot}}`'s `algo` parameter, e.g. `old(30d)`.
#[derive(Clone)]
pub struct ParameterizedAlgorithm {
    pub algorithm: Arc<dyn Algorithm>,
    pub max_age_in_days: i64,
}

/// The ordered, named collection of algorithms a wiki makes available,
/// mirroring `Algorithms::add`/`find` (rank = registration order, used to
/// keep `archive_template`'s parsed algorithm list in a stable priority
/// order regardless of how the page's `algo=` parameter lists them).
#[derive(Default, Clone)]
pub struct Algorithms {
    entries: Vec<Arc<dyn Algorithm>>,
}

impl Algorithms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, algorithm: Arc<dyn Algorithm>) {
        self.entries.push(algorithm);
    }

    /// The algorithm named `name`, along with its registration rank.
    pub fn find(&self, name: &str) -> Option<(usize, Arc<dyn Algorithm>)> {
        self.entries
            .iter()
            .position(|a| a.name() == name)
            .map(|rank| (rank, self.entries[rank].clone()))
    }
}
