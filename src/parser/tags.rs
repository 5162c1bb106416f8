//! Parser-extension tag recognition (§4.1 "Tag recognition").
//!
//! MediaWiki treats a fixed set of tag names as parser extensions rather
//! than ordinary HTML; each is either RAW (content becomes a single [`Text`](super::Node::Text)
//! node, e.g. `<nowiki>`) or WIKICODE (content is recursively parsed, e.g. `<ref>`).

/// The recognized tag names, lowercase, alongside whether their content is
/// parsed recursively or kept verbatim.
const RECOGNIZED: &[(&str, TagClass)] = &[
    ("ref", TagClass::Wikicode),
    ("nowiki", TagClass::Raw),
    ("math", TagClass::Raw),
    ("pre", TagClass::Raw),
    ("gallery", TagClass::Wikicode),
    ("references", TagClass::Wikicode),
    ("poem", TagClass::Wikicode),
    ("score", TagClass::Raw),
    ("source", TagClass::Raw),
    ("syntaxhighlight", TagClass::Raw),
    ("timeline", TagClass::Raw),
    ("templatedata", TagClass::Raw),
    ("templatestyles", TagClass::Raw),
    ("ce", TagClass::Raw),
    ("chem", TagClass::Raw),
    ("hiero", TagClass::Raw),
    ("graph", TagClass::Raw),
    ("imagemap", TagClass::Wikicode),
    ("indicator", TagClass::Wikicode),
    ("inputbox", TagClass::Raw),
    ("mapframe", TagClass::Raw),
    ("maplink", TagClass::Raw),
    ("section", TagClass::Wikicode),
    ("categorytree", TagClass::Raw),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Raw,
    Wikicode,
}

/// Whether `name` (already lowercased) is a recognized parser-extension tag,
/// and if so, how its content should be treated.
pub fn classify(name: &str) -> Option<TagClass> {
    RECOGNIZED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)
}

/// `<pre>` is the only tag allowed to extend to end-of-input when it has no
/// closing tag (§3 "Tag"); every other recognized tag without a closer is
/// emitted as plain text instead.
pub fn tolerates_unclosed(name: &str) -> bool {
    name == "pre"
}

/// Scan `chars[from..]` for the lowercase `name`'s case-insensitive closing
/// tag `</name>` (optionally followed by whitespace and `>`), returning the
/// byte-like char index just after the closer, and the index where the
/// closer itself starts. This is a simple linear scan; real MediaWiki's
/// finder also special-cases nesting for a couple of tags, which we do not
/// attempt to reproduce here (see `DESIGN.md`).
pub fn find_closing_tag(chars: &[char], from: usize, name: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = format!("</{name}").chars().collect();
    let mut i = from;
    while i + needle.len() <= chars.len() {
        if chars[i..i + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            let start = i;
            let mut j = i + needle.len();
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && chars[j] == '>' {
                return Some((start, j + 1));
            }
        }
        i += 1;
    }
    None
}

/// Attempt to scan a tag opener starting at `chars[pos]` (which must be `<`).
/// Returns `(name, end_of_open_tag_index, self_closing)` on success.
pub fn scan_open_tag(chars: &[char], pos: usize) -> Option<(String, usize, bool)> {
    debug_assert_eq!(chars[pos], '<');
    let mut i = pos + 1;
    if i < chars.len() && chars[i] == '/' {
        return None; // a closer, not an opener
    }
    let name_start = i;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric()) {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name: String = chars[name_start..i].iter().collect::<String>().to_lowercase();
    if classify(&name).is_none() {
        return None;
    }
    // Skip attributes up to `>`, respecting quoted attribute values.
    let mut in_quote: Option<char> = None;
    let mut self_closing = false;
    while i < chars.len() {
        let c = chars[i];
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_quote = Some(c),
                '>' => {
                    i += 1;
                    return Some((name, i, self_closing));
                }
                '/' if i + 1 < chars.len() && chars[i + 1] == '>' => {
                    self_closing = true;
                }
                '<' => return None,
                _ => {}
            },
        }
        i += 1;
    }
    None
}
