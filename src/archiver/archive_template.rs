//! Parses the `{{Archivage par bot}}` configuration template that opts a talk
//! page into archiving (§4.8), grounded on `archive_template.cpp`.

use crate::parser::{List, NormalizeFlags, TemplateNode};

use super::algorithm::{Algorithms, ParameterizedAlgorithm};

/// `ARCHIVE_TEMPLATE_NAME`.
pub const ARCHIVE_TEMPLATE_NAME: &str = "Archivage par bot";

const DEF_MIN_THREADS_LEFT: i64 = 5;
const DEF_MIN_THREADS_TO_ARCHIVE: i64 = 2;

/// A parameter present in the template but whose value doesn't parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsInitializationError {
    #[error("no {{{{{ARCHIVE_TEMPLATE_NAME}}}}} template found on the page")]
    TemplateNotFound,
    #[error("{{{{{ARCHIVE_TEMPLATE_NAME}}}}} is missing its archive= parameter")]
    MissingArchiveParam,
    #[error("invalid algo parameter {0:?}")]
    InvalidAlgorithm(String),
    #[error("invalid {name}={value:?}")]
    InvalidIntParam { name: &'static str, value: String },
}

/// The parsed, validated configuration for one talk page
/// (`archive_template.cpp`'s `ArchiveParams`).
#[derive(Clone)]
pub struct ArchiveParams {
    /// The `archive=` pattern, e.g. `"Talk:Foo/Archive %(counter)d"`.
    pub archive: String,
    pub counter: i64,
    pub max_archive_size: i64,
    /// `None` when the template doesn't override the default, which itself
    /// depends on whether the page has a tracking-template wrapper — see
    /// [`ArchiveParams::min_threads`].
    pub min_threads_left_override: Option<i64>,
    pub min_threads_to_archive_override: Option<i64>,
    pub archive_header: String,
    /// `key=`: an opaque token some configurations use to invalidate a stale
    /// cached counter; carried through unparsed.
    pub key: String,
    pub algorithms: Vec<ParameterizedAlgorithm>,
}

fn parse_int_param(name: &'static str, value: &str, default: i64) -> Result<i64, ParamsInitializationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed
        .parse()
        .map_err(|_| ParamsInitializationError::InvalidIntParam { name, value: value.to_owned() })
}

/// Like [`parse_int_param`], but an absent/blank value yields `None` instead
/// of a fixed default, so the caller can pick a context-dependent default.
fn parse_opt_int_param(name: &'static str, value: &str) -> Result<Option<i64>, ParamsInitializationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ParamsInitializationError::InvalidIntParam { name, value: value.to_owned() })
}

/// The default archive size threshold (bytes) when `maxarchivesize` is
/// absent from the template (`archiver.cpp`: `params.maxarchivesize() > 0 ?
/// ... : 500 * 1000`).
const DEFAULT_MAX_ARCHIVE_SIZE_BYTES: i64 = 500_000;

/// The hard ceiling on `maxarchivesize`, in kB: "the maximum size of a wiki
/// page is 2 MB" (`archive_template.cpp`).
const MAX_ARCHIVE_SIZE_CAP_KB: i64 = 1950;

/// Parse `maxarchivesize=<int>k`, returning a byte threshold. Absent or
/// blank yields [`DEFAULT_MAX_ARCHIVE_SIZE_BYTES`]; present values are
/// capped at [`MAX_ARCHIVE_SIZE_CAP_KB`] kB before being converted to bytes.
fn parse_max_archive_size(value: &str) -> Result<i64, ParamsInitializationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_MAX_ARCHIVE_SIZE_BYTES);
    }
    let invalid = || ParamsInitializationError::InvalidIntParam {
        name: "maxarchivesize",
        value: value.to_owned(),
    };
    let digits_end = trimmed.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    if digits_end == 0 {
        return Err(invalid());
    }
    let rest = trimmed[digits_end..].trim();
    if !rest.eq_ignore_ascii_case("k") {
        return Err(invalid());
    }
    let kb: i64 = trimmed[..digits_end].parse().map_err(|_| invalid())?;
    Ok(kb.min(MAX_ARCHIVE_SIZE_CAP_KB) * 1000)
}

/// Parse `algo`, e.g. `"old(30d), checked+old(5d)"`, against the algorithms
/// known for this wiki. The result is sorted by registration rank so the
/// page's own ordering can't change which policy takes priority.
fn parse_algorithms(spec: &str, known: &Algorithms) -> Result<Vec<ParameterizedAlgorithm>, ParamsInitializationError> {
    let mut ranked: Vec<(usize, ParameterizedAlgorithm)> = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let invalid = || ParamsInitializationError::InvalidAlgorithm(part.to_owned());
        let open = part.find('(').ok_or_else(invalid)?;
        if !part.ends_with(')') {
            return Err(invalid());
        }
        let name = part[..open].trim();
        let inner = part[open + 1..part.len() - 1].trim();
        let digits_end = inner.find(|c: char| !c.is_ascii_digit()).unwrap_or(inner.len());
        if digits_end == 0 {
            return Err(invalid());
        }
        let days: i64 = inner[..digits_end].parse().map_err(|_| invalid())?;
        if inner[digits_end..].trim() != "d" {
            return Err(invalid());
        }
        let (rank, algorithm) = known.find(name).ok_or_else(invalid)?;
        ranked.push((rank, ParameterizedAlgorithm { algorithm, max_age_in_days: days }));
    }
    ranked.sort_by_key(|(rank, _)| *rank);
    Ok(ranked.into_iter().map(|(_, param)| param).collect())
}

/// Find `{{Archivage par bot}}` among a page's templates, matched
/// case-sensitively on the normalized template name like the rest of this
/// crate's template lookups.
pub fn find_archive_template(tree: &mut List) -> Option<&mut TemplateNode> {
    tree.templates_mut().into_iter().find(|t| t.name() == ARCHIVE_TEMPLATE_NAME)
}

impl ArchiveParams {
    /// Parse a page's `{{Archivage par bot}}` template against the
    /// algorithms `known` to this wiki.
    pub fn parse(tree: &mut List, known: &Algorithms) -> Result<Self, ParamsInitializationError> {
        let template = find_archive_template(tree).ok_or(ParamsInitializationError::TemplateNotFound)?;
        let fields = template.parsed_fields(NormalizeFlags::TRIM);

        let archive = fields.get("archive").trim().to_owned();
        if archive.is_empty() {
            return Err(ParamsInitializationError::MissingArchiveParam);
        }
        let counter = parse_int_param("counter", fields.get("counter"), 1)?;
        let max_archive_size = parse_max_archive_size(fields.get("maxarchivesize"))?;
        let min_threads_left_override = parse_opt_int_param("minthreadsleft", fields.get("minthreadsleft"))?;
        let min_threads_to_archive_override =
            parse_opt_int_param("minthreadstoarchive", fields.get("minthreadstoarchive"))?;
        let archive_header = fields.get("archiveheader").to_owned();
        let key = fields.get("key").to_owned();
        let algorithms = parse_algorithms(fields.get("algo"), known)?;

        Ok(ArchiveParams {
            archive,
            counter,
            max_archive_size,
            min_threads_left_override,
            min_threads_to_archive_override,
            archive_header,
            key,
            algorithms,
        })
    }

    /// The effective `minthreadsleft`/`minthreadstoarchive` thresholds,
    /// resolving unset template parameters against whether the page has a
    /// tracking-template wrapper: 5/2 normally, 1/1 when it does
    /// (`archiver.cpp`: `hasTrackingTemplate() ? 1 : DEF_MIN_THREADS_LEFT`).
    pub fn min_threads(&self, has_tracking_template: bool) -> (i64, i64) {
        let (def_left, def_to_archive) =
            if has_tracking_template { (1, 1) } else { (DEF_MIN_THREADS_LEFT, DEF_MIN_THREADS_TO_ARCHIVE) };
        (
            self.min_threads_left_override.unwrap_or(def_left),
            self.min_threads_to_archive_override.unwrap_or(def_to_archive).max(1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::frwiki_algorithms::frwiki_algorithms;
    use crate::parser::{parse, ParserOptions};

    #[test]
    fn parses_a_well_formed_template() {
        let mut tree = parse(
            "{{Archivage par bot|archive=Discussion:Foo/Archive %(counter)d|counter=3|algo=old(30d)}}",
            &ParserOptions::default(),
        )
        .unwrap();
        let known = frwiki_algorithms();
        let params = ArchiveParams::parse(&mut tree, &known).unwrap();
        assert_eq!(params.archive, "Discussion:Foo/Archive %(counter)d");
        assert_eq!(params.counter, 3);
        assert_eq!(params.algorithms.len(), 1);
        assert_eq!(params.algorithms[0].max_age_in_days, 30);
        assert_eq!(params.min_threads(false), (DEF_MIN_THREADS_LEFT, DEF_MIN_THREADS_TO_ARCHIVE));
        assert_eq!(params.min_threads(true), (1, 1));
    }

    #[test]
    fn explicit_min_threads_override_tracking_template_defaults() {
        let mut tree = parse(
            "{{Archivage par bot|archive=Foo/Archive %(counter)d|minthreadsleft=10|minthreadstoarchive=3}}",
            &ParserOptions::default(),
        )
        .unwrap();
        let known = frwiki_algorithms();
        let params = ArchiveParams::parse(&mut tree, &known).unwrap();
        assert_eq!(params.min_threads(true), (10, 3));
    }

    #[test]
    fn missing_template_is_an_error() {
        let mut tree = parse("Just some text.", &ParserOptions::default()).unwrap();
        let known = frwiki_algorithms();
        assert_eq!(
            ArchiveParams::parse(&mut tree, &known).unwrap_err(),
            ParamsInitializationError::TemplateNotFound
        );
    }

    #[test]
    fn missing_archive_param_is_an_error() {
        let mut tree = parse("{{Archivage par bot|algo=old(30d)}}", &ParserOptions::default()).unwrap();
        let known = frwiki_algorithms();
        assert_eq!(
            ArchiveParams::parse(&mut tree, &known).unwrap_err(),
            ParamsInitializationError::MissingArchiveParam
        );
    }

    #[test]
    fn max_archive_size_defaults_to_500kb_when_absent() {
        let mut tree = parse(
            "{{Archivage par bot|archive=Foo/Archive %(counter)d}}",
            &ParserOptions::default(),
        )
        .unwrap();
        let known = frwiki_algorithms();
        let params = ArchiveParams::parse(&mut tree, &known).unwrap();
        assert_eq!(params.max_archive_size, 500_000);
    }

    #[test]
    fn max_archive_size_is_capped_at_1950kb() {
        let mut tree = parse(
            "{{Archivage par bot|archive=Foo/Archive %(counter)d|maxarchivesize=5000k}}",
            &ParserOptions::default(),
        )
        .unwrap();
        let known = frwiki_algorithms();
        let params = ArchiveParams::parse(&mut tree, &known).unwrap();
        assert_eq!(params.max_archive_size, 1_950_000);
    }

    #[test]
    fn unknown_algorithm_name_is_rejected() {
        let mut tree = parse(
            "{{Archivage par bot|archive=Foo/Archive %(counter)d|algo=bogus(5d)}}",
            &ParserOptions::default(),
        )
        .unwrap();
        let known = frwiki_algorithms();
        assert!(ArchiveParams::parse(&mut tree, &known).is_err());
    }
}
