//! Title parsing and redirect detection (§4.3), grounded on `TitlesUtil`
//! and `Wiki::readRedirect` (see `DESIGN.md`; `titles_util.cpp` itself
//! wasn't available, so the namespace/interwiki-splitting algorithm below is
//! reconstructed from `titles_util.h`'s contract).

use crate::types::{SiteInfo, TitleParts, MAIN_NAMESPACE, SPLIT_TITLE_INTERWIKI};
use crate::util::percent_decode;

bitflags::bitflags! {
    #[derive(Default)]
    pub struct ParseTitleFlags: u8 {
        const DECODE_URI_COMPONENT = 1 << 0;
        const NAMESPACE_ONLY = 1 << 1;
        const KEEP_INITIAL_COLON = 1 << 2;
    }
}

/// `PTF_LINK_TARGET`: the flag set used for link targets extracted from wikitext.
pub const LINK_TARGET: ParseTitleFlags = ParseTitleFlags::DECODE_URI_COMPONENT;

fn normalize_spacing(s: &str) -> String {
    s.replace('_', " ").trim().to_owned()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Title parsing bound to one wiki's namespace/interwiki configuration.
pub struct TitlesUtil<'a> {
    site_info: &'a SiteInfo,
}

impl<'a> TitlesUtil<'a> {
    pub fn new(site_info: &'a SiteInfo) -> Self {
        Self { site_info }
    }

    /// Parse `title` into its namespace, unprefixed title and anchor.
    pub fn parse_title(
        &self,
        title: &str,
        default_namespace: i32,
        flags: ParseTitleFlags,
    ) -> TitleParts {
        let mut working = normalize_spacing(title);
        if flags.contains(ParseTitleFlags::DECODE_URI_COMPONENT) {
            working = normalize_spacing(&percent_decode(&working));
        }

        let keep_initial_colon = flags.contains(ParseTitleFlags::KEEP_INITIAL_COLON);

        let mut body = working.as_str();
        let mut leading_colon = false;
        if let Some(rest) = body.strip_prefix(':') {
            leading_colon = true;
            body = rest.trim_start();
        }

        let mut namespace_number = default_namespace;
        let mut namespace_prefix: Option<&str> = None;
        if let Some(colon) = body.find(':') {
            let candidate = &body[..colon];
            let lower = candidate.to_lowercase();
            if let Some(&num) = self.site_info.aliases.get(&lower) {
                namespace_number = num;
                namespace_prefix = Some(candidate);
                body = &body[colon + 1..];
            } else if self.site_info.interwikis.contains_key(&lower) {
                namespace_number = SPLIT_TITLE_INTERWIKI;
                namespace_prefix = Some(candidate);
                body = &body[colon + 1..];
            }
        }
        if leading_colon && namespace_prefix.is_none() {
            namespace_number = MAIN_NAMESPACE;
        }
        body = body.trim_start();

        let (unprefixed, anchor) = match body.find('#') {
            Some(i) => (&body[..i], Some(&body[i..])),
            None => (body, None),
        };

        let unprefixed = if self.site_info.namespace_case(namespace_number)
            == crate::types::NamespaceCase::FirstLetter
        {
            capitalize_first(unprefixed)
        } else {
            unprefixed.to_owned()
        };

        let mut assembled = String::new();
        if leading_colon && keep_initial_colon {
            assembled.push(':');
        }
        if let Some(prefix) = namespace_prefix {
            assembled.push_str(prefix);
            assembled.push(':');
        }
        let unprefixed_title_begin = assembled.len();
        assembled.push_str(&unprefixed);
        let anchor_begin = anchor.map(|_| assembled.len());
        if let Some(a) = anchor {
            assembled.push_str(a);
        }

        TitleParts {
            title: assembled,
            unprefixed_title_begin,
            anchor_begin,
            namespace_number,
        }
    }

    /// The namespace number of `title`, without building the full [`TitleParts`].
    pub fn get_title_namespace(&self, title: &str) -> i32 {
        self.parse_title(title, MAIN_NAMESPACE, ParseTitleFlags::NAMESPACE_ONLY)
            .namespace_number
    }

    fn subject_or_talk(&self, title: &str, lower_bit: i32) -> String {
        let parts = self.parse_title(title, MAIN_NAMESPACE, ParseTitleFlags::default());
        if parts.namespace_number < 0 {
            return String::new();
        }
        let target_ns = (parts.namespace_number & !1) | lower_bit;
        match self.site_info.aliases.iter().find(|(_, &n)| n == target_ns) {
            Some((name, _)) if target_ns != MAIN_NAMESPACE => {
                format!("{}:{}", capitalize_first(name), parts.unprefixed_title())
            }
            _ => parts.unprefixed_title().to_owned(),
        }
    }

    pub fn get_talk_page(&self, title: &str) -> String {
        self.subject_or_talk(title, 1)
    }

    pub fn get_subject_page(&self, title: &str) -> String {
        self.subject_or_talk(title, 0)
    }

    /// A wikilink to `target`, forcing an interpretation as a plain link
    /// (rather than e.g. transcluding a category or embedding a file) with a
    /// leading `:` when the target's namespace requires it.
    pub fn make_link(&self, target: &str) -> String {
        const FILE_NS: i32 = 6;
        const CATEGORY_NS: i32 = 14;
        let ns = self.get_title_namespace(target);
        if ns == FILE_NS || ns == CATEGORY_NS {
            format!("[[:{target}]]")
        } else {
            format!("[[{target}]]")
        }
    }
}

/// Match `code` against `^#<redirect-alias>[ :]*\[\[<target>(\|...)?\]\]`,
/// returning the normalized target and its anchor (§4.3, §8 "S3").
pub fn read_redirect(code: &str, site_info: &SiteInfo) -> Option<(String, Option<String>)> {
    let code = code.trim_start();
    if !code.starts_with('#') {
        return None;
    }
    let keyword_end = code.find([' ', ':', '[', '\n'])?;
    let keyword = code[..keyword_end].to_lowercase();
    if !site_info.redirect_aliases.iter().any(|a| *a == keyword) {
        return None;
    }
    let mut rest = code[keyword_end..].trim_start();
    if let Some(after_colon) = rest.strip_prefix(':') {
        rest = after_colon.trim_start();
    }
    let rest = rest.strip_prefix("[[")?;

    let link_end = rest.find(['\n', '|', ']'])?;
    if rest.as_bytes()[link_end] == b'\n' {
        return None;
    }

    let titles_util = TitlesUtil::new(site_info);
    let mut parts = titles_util.parse_title(&rest[..link_end], MAIN_NAMESPACE, LINK_TARGET);
    let anchor = parts.anchor().map(str::to_owned);
    parts.clear_anchor();
    Some((parts.title, anchor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SiteInfoNamespace, SiteInfoInterwiki};

    fn test_site_info() -> SiteInfo {
        let mut info = SiteInfo::new();
        info.namespaces.insert(0, SiteInfoNamespace { number: 0, casemode: 0 });
        info.namespaces.insert(1, SiteInfoNamespace { number: 1, casemode: 1 });
        info.namespaces.insert(6, SiteInfoNamespace { number: 6, casemode: 1 });
        info.namespaces.insert(14, SiteInfoNamespace { number: 14, casemode: 1 });
        info.aliases.insert("talk".to_owned(), 1);
        info.aliases.insert("file".to_owned(), 6);
        info.aliases.insert("category".to_owned(), 14);
        info.interwikis.insert("en".to_owned(), SiteInfoInterwiki { lang: Some("en".to_owned()) });
        info
    }

    #[test]
    fn plain_title_defaults_to_main_namespace() {
        let info = test_site_info();
        let util = TitlesUtil::new(&info);
        let parts = util.parse_title("foo bar", MAIN_NAMESPACE, ParseTitleFlags::default());
        assert_eq!(parts.namespace_number, 0);
        assert_eq!(parts.unprefixed_title(), "Foo bar");
    }

    #[test]
    fn namespace_prefix_is_recognized() {
        let info = test_site_info();
        let util = TitlesUtil::new(&info);
        let parts = util.parse_title("Talk:Some page", MAIN_NAMESPACE, ParseTitleFlags::default());
        assert_eq!(parts.namespace_number, 1);
        assert_eq!(parts.unprefixed_title(), "Some page");
    }

    #[test]
    fn interwiki_prefix_is_split_title_interwiki() {
        let info = test_site_info();
        let util = TitlesUtil::new(&info);
        let parts = util.parse_title("en:Some page", MAIN_NAMESPACE, ParseTitleFlags::default());
        assert_eq!(parts.namespace_number, SPLIT_TITLE_INTERWIKI);
    }

    #[test]
    fn anchor_is_split_off() {
        let info = test_site_info();
        let util = TitlesUtil::new(&info);
        let parts = util.parse_title("Target#anchor", MAIN_NAMESPACE, ParseTitleFlags::default());
        assert_eq!(parts.unprefixed_title(), "Target");
        assert_eq!(parts.anchor(), Some("#anchor"));
    }

    #[test]
    fn s3_redirect_with_anchor() {
        let info = test_site_info();
        let (target, anchor) = read_redirect("#REDIRECT [[Target#anchor]]", &info).unwrap();
        assert_eq!(target, "Target");
        assert_eq!(anchor, Some("#anchor".to_owned()));
    }

    #[test]
    fn s3_redirect_alias_with_colon_and_piped_label() {
        let info = test_site_info();
        let (target, anchor) = read_redirect("  #redirection: [[X|Y]]", &info).unwrap();
        assert_eq!(target, "X");
        assert_eq!(anchor, None);
    }

    #[test]
    fn non_redirect_text_returns_none() {
        let info = test_site_info();
        assert!(read_redirect("Not a redirect", &info).is_none());
    }

    #[test]
    fn make_link_escapes_category_and_file() {
        let info = test_site_info();
        let util = TitlesUtil::new(&info);
        assert_eq!(util.make_link("Category:Foo"), "[[:Category:Foo]]");
        assert_eq!(util.make_link("File:Foo.png"), "[[:File:Foo.png]]");
        assert_eq!(util.make_link("Some page"), "[[Some page]]");
    }
}
