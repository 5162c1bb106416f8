//! A hand-rolled date parser for French wiki signatures and thread-title
//! dates (§4.8 "Age determination"), grounded on
//! `orlodrimbot/wikiutil/date_parser.cpp`'s `FrenchDateParser`. Unlike the
//! teacher, which reaches for `re2` here, this port uses a small
//! word-at-a-time scanner in the style this crate's own wikicode lexer
//! already uses (§9: "date/time utilities beyond the contract given in §6"
//! are out of scope as a *general* facility, but the archiver needs this
//! one to exercise its age logic end to end).

use crate::date::{Date, DateDiff};

/// A date extracted from a signature: the UTC instant plus the
/// French-wiki-local offset it was originally expressed in (§3 GLOSSARY
/// "Signature"), mirroring `wikiutil::SignatureDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureDate {
    pub utc_date: Date,
    pub local_time_diff: DateDiff,
}

impl Default for SignatureDate {
    fn default() -> Self {
        SignatureDate { utc_date: Date::null(), local_time_diff: DateDiff::from_seconds(0) }
    }
}

impl SignatureDate {
    pub fn is_null(self) -> bool {
        self.utc_date.is_null()
    }

    pub fn local_date(self) -> Date {
        self.utc_date + self.local_time_diff
    }
}

impl PartialOrd for SignatureDate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for SignatureDate {}

impl Ord for SignatureDate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.utc_date.cmp(&other.utc_date)
    }
}

bitflags::bitflags! {
    /// `DateParser::ParseFlags`.
    #[derive(Default)]
    pub struct ParseFlags: u8 {
        const END_OF_DAY = 1 << 0;
        const AFTER_2000 = 1 << 1;
        const BEFORE_NOW = 1 << 2;
        const IMPLICIT_YEAR = 1 << 3;
    }
}

fn month_index(word: &str) -> Option<u32> {
    let lower = word.to_lowercase();
    Some(match lower.as_str() {
        "janvier" => 1,
        "février" | "fevrier" => 2,
        "mars" => 3,
        "avril" => 4,
        "mai" => 5,
        "juin" => 6,
        "juillet" => 7,
        "août" | "aout" => 8,
        "septembre" => 9,
        "octobre" => 10,
        "novembre" => 11,
        "décembre" | "decembre" => 12,
        _ => return None,
    })
}

fn days_in_month(month: u32, year: i32) -> u32 {
    const DAYS: [u32; 13] = [0, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && (year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)) {
        29
    } else if (1..=12).contains(&month) {
        DAYS[month as usize]
    } else {
        0
    }
}

/// One scanned word, along with what it could mean as a date component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok<'a> {
    /// "1er" / "1{{er}}": always means day 1.
    FirstDay,
    /// A 1-2 digit number: a possible day, month, or 2-digit year.
    TwoDigit(u32),
    /// A number with 3+ digits: a year.
    Year(u32),
    Month(u32),
    Word(&'a str),
    Other(char),
}

/// Splits `text` into the token stream `consume_*` below walks, tracking
/// the byte offset each token starts at so the lexer can rewind.
struct Lexer<'a> {
    text: &'a str,
    rest: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, rest: text }
    }

    fn pos(&self) -> usize {
        self.text.len() - self.rest.len()
    }

    fn rewind_to(&mut self, pos: usize) {
        self.rest = &self.text[pos..];
    }

    /// Advance past one token, returning it, or `None` at end of input.
    fn next(&mut self) -> Option<Tok<'a>> {
        self.rest = self.rest.trim_start();
        if self.rest.is_empty() {
            return None;
        }
        // "1er" / "1{{er}}"
        if let Some(rest) = self.rest.strip_prefix('1') {
            if let Some(rest2) = rest.strip_prefix("er").or_else(|| rest.strip_prefix("{{er}}")) {
                self.rest = rest2;
                return Some(Tok::FirstDay);
            }
        }
        let mut chars = self.rest.char_indices();
        let (_, first) = chars.next().unwrap();
        if first.is_ascii_digit() {
            let end = self
                .rest
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map(|(i, _)| i)
                .unwrap_or(self.rest.len());
            let digits = &self.rest[..end];
            self.rest = &self.rest[end..];
            let value: u32 = digits.parse().unwrap_or(0);
            return Some(if digits.len() >= 3 { Tok::Year(value) } else { Tok::TwoDigit(value) });
        }
        if first.is_alphabetic() {
            let end = self
                .rest
                .char_indices()
                .find(|(_, c)| !c.is_alphabetic())
                .map(|(i, _)| i)
                .unwrap_or(self.rest.len());
            let word = &self.rest[..end];
            self.rest = &self.rest[end..];
            return Some(match month_index(word) {
                Some(m) => Tok::Month(m),
                None => Tok::Word(word),
            });
        }
        self.rest = &self.rest[first.len_utf8()..];
        Some(Tok::Other(first))
    }
}

/// Look for a `day month year à hh:mm (CET|CEST)` signature starting at the
/// lexer's current position, consuming it on success.
fn consume_signature_date(lexer: &mut Lexer<'_>) -> Option<SignatureDate> {
    let day = match lexer.next()? {
        Tok::FirstDay => 1,
        Tok::TwoDigit(d) if (1..=31).contains(&d) => d,
        _ => return None,
    };
    let month = match lexer.next()? {
        Tok::Month(m) => m,
        _ => return None,
    };
    let year = match lexer.next()? {
        Tok::Year(y) if y >= 2000 => y as i32,
        _ => return None,
    };
    if day > days_in_month(month, year) {
        return None;
    }
    if !matches!(lexer.next()?, Tok::Word("à") | Tok::Word("a")) {
        return None;
    }
    let hour = match lexer.next()? {
        Tok::TwoDigit(h) if h < 24 => h,
        _ => return None,
    };
    if !matches!(lexer.next()?, Tok::Other(':')) {
        return None;
    }
    let minute = match lexer.next()? {
        Tok::TwoDigit(m) if m < 60 => m,
        _ => return None,
    };

    let mut local_diff = DateDiff::from_seconds(0);
    let saved = lexer.pos();
    if matches!(lexer.next(), Some(Tok::Other('('))) {
        match lexer.next() {
            Some(Tok::Word("CET")) if matches!(lexer.next(), Some(Tok::Other(')'))) => {
                local_diff = DateDiff::from_seconds(3600);
            }
            Some(Tok::Word("CEST")) if matches!(lexer.next(), Some(Tok::Other(')'))) => {
                local_diff = DateDiff::from_seconds(3600 * 2);
            }
            _ => lexer.rewind_to(saved),
        }
    } else {
        lexer.rewind_to(saved);
    }

    let naive = Date::from_ymd_hms(year, month, day, hour, minute, 0)?;
    let utc_date = naive - local_diff;
    // Reject dates implausibly far in the future (clock skew / timezone misread tolerance).
    if utc_date >= Date::now() + DateDiff::from_seconds(3600 * 2 + 300) {
        return None;
    }
    Some(SignatureDate { utc_date, local_time_diff: local_diff })
}

/// Advance `lexer` until positioned at a token that could start a day (so
/// callers don't have to retry a failed match one token at a time from
/// arbitrary punctuation).
fn jump_to_next_valid_day(lexer: &mut Lexer<'_>) -> bool {
    loop {
        let before = lexer.pos();
        match lexer.next() {
            None => return false,
            Some(Tok::FirstDay) => {
                lexer.rewind_to(before);
                return true;
            }
            Some(Tok::TwoDigit(d)) if (1..=31).contains(&d) => {
                lexer.rewind_to(before);
                return true;
            }
            _ => continue,
        }
    }
}

/// The latest wiki-signature date found in `text`, ignoring future dates.
/// Used to derive a thread's last-modified date from its content (§4.8).
pub fn extract_max_signature_date(text: &str) -> SignatureDate {
    let mut lexer = Lexer::new(text);
    let mut best = SignatureDate::default();
    while jump_to_next_valid_day(&mut lexer) {
        let save = lexer.pos();
        if let Some(date) = consume_signature_date(&mut lexer) {
            if date.utc_date > best.utc_date {
                best = date;
            }
        } else {
            lexer.rewind_to(save);
            lexer.next();
        }
    }
    best
}

fn next_month(date: Date) -> Date {
    let (year, month) = (date.year().unwrap_or(1), date.month().unwrap_or(1));
    let (y, m) = if month >= 12 { (year + 1, 1) } else { (year, month + 1) };
    Date::from_ymd_hms(y, m, 1, 0, 0, 0).unwrap_or(date)
}

fn consume_date(lexer: &mut Lexer<'_>, flags: ParseFlags) -> Option<Date> {
    let day = match lexer.next()? {
        Tok::FirstDay => 1,
        Tok::TwoDigit(d) if (1..=31).contains(&d) => d,
        _ => return None,
    };
    let month = match lexer.next()? {
        Tok::Month(m) => m,
        _ => return None,
    };
    let saved = lexer.pos();
    let year = match lexer.next() {
        Some(Tok::TwoDigit(y)) | Some(Tok::Year(y)) if y >= 1 => y as i32,
        _ if flags.contains(ParseFlags::IMPLICIT_YEAR) => {
            lexer.rewind_to(saved);
            let min_date = Date::now() - DateDiff::from_days(270);
            let base_year = min_date.year().unwrap_or(1970);
            base_year + if month <= min_date.month().unwrap_or(1) { 1 } else { 0 }
        }
        _ => return None,
    };
    if flags.contains(ParseFlags::AFTER_2000) && year < 2000 {
        return None;
    }
    if day > days_in_month(month, year) {
        return None;
    }
    let (hour, minute, second) = if flags.contains(ParseFlags::END_OF_DAY) { (23, 59, 59) } else { (0, 0, 0) };
    let date = Date::from_ymd_hms(year, month, day, hour, minute, second)?;
    if flags.contains(ParseFlags::BEFORE_NOW) {
        let mut slack = 3600 * 2 + 300;
        if flags.contains(ParseFlags::END_OF_DAY) {
            slack += 3600 * 24;
        }
        if date >= Date::now() + DateDiff::from_seconds(slack) {
            return None;
        }
    }
    Some(date)
}

/// Try to parse all of `text` as a single date (no time), e.g. a template
/// parameter value. French month names only; no numeric day/month/year.
pub fn parse_date(text: &str, flags: ParseFlags) -> Date {
    let mut lexer = Lexer::new(text);
    match consume_date(&mut lexer, flags) {
        Some(d) if lexer.next().is_none() => d,
        _ => Date::null(),
    }
}

/// Find and parse the first date anywhere in `text` (§4.8 `oldtitle`,
/// thread-title dates).
pub fn extract_first_date(text: &str, flags: ParseFlags) -> Date {
    let mut lexer = Lexer::new(text);
    while jump_to_next_valid_day(&mut lexer) {
        let save = lexer.pos();
        if let Some(date) = consume_date(&mut lexer, flags) {
            return date;
        }
        lexer.rewind_to(save);
        lexer.next();
    }
    Date::null()
}

/// §4.9 (thread_util.cpp) `computeDateInTitle`: extract a date from a
/// thread's title line, which may give only a month+year or a bare year.
/// `max_for_missing_fields` picks the last vs. first day of an under-specified
/// period (used when deciding the floor vs. ceiling of a thread's age).
pub fn compute_date_in_title(title: &str, max_for_missing_fields: bool) -> Date {
    let flags = ParseFlags::AFTER_2000 | ParseFlags::IMPLICIT_YEAR;
    let mut date = extract_first_date(title, flags);
    if date.is_null() {
        date = extract_first_date(&format!("1 {title}"), ParseFlags::AFTER_2000);
        if !date.is_null() && max_for_missing_fields {
            date = next_month(date) - DateDiff::from_days(1);
        }
    }
    if date.is_null() {
        if let Ok(year) = title.trim().parse::<i32>() {
            if (2000..=9999).contains(&year) {
                date = if max_for_missing_fields {
                    Date::from_ymd_hms(year, 12, 31, 0, 0, 0).unwrap()
                } else {
                    Date::from_ymd_hms(year, 1, 1, 0, 0, 0).unwrap()
                };
            }
        }
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::freeze_now;

    #[test]
    fn extracts_signature_with_timezone() {
        freeze_now(Date::from_ymd_hms(2020, 6, 1, 0, 0, 0).unwrap());
        let date = extract_max_signature_date("[[User:Foo|Foo]] 1 janvier 2020 à 12:34 (CET)");
        assert!(!date.is_null());
        assert_eq!(date.utc_date, Date::from_ymd_hms(2020, 1, 1, 11, 34, 0).unwrap());
        crate::date::unfreeze_now();
    }

    #[test]
    fn picks_the_max_of_several_signatures() {
        freeze_now(Date::from_ymd_hms(2020, 6, 1, 0, 0, 0).unwrap());
        let date = extract_max_signature_date(
            "1 janvier 2020 à 12:00 (CET) puis 2 janvier 2020 à 08:00 (CET)",
        );
        assert_eq!(date.utc_date, Date::from_ymd_hms(2020, 1, 2, 7, 0, 0).unwrap());
        crate::date::unfreeze_now();
    }

    #[test]
    fn title_date_month_year_picks_bound_of_month() {
        let date = compute_date_in_title("Janvier 2020", true);
        assert_eq!(date, Date::from_ymd_hms(2020, 1, 31, 0, 0, 0).unwrap());
        let date = compute_date_in_title("Janvier 2020", false);
        assert_eq!(date, Date::from_ymd_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn title_with_bare_year() {
        assert_eq!(compute_date_in_title("2021", false), Date::from_ymd_hms(2021, 1, 1, 0, 0, 0).unwrap());
    }
}
