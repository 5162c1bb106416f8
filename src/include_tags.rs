//! `<includeonly>`/`<noinclude>`/`<onlyinclude>` splitter (§4.2).
//!
//! A single linear scan recognizes five tag names — the three sectioning
//! tags plus the two raw-text tags `<nowiki>`/`<pre>`, whose content (and any
//! `<` inside it) must never be mistaken for a sectioning tag — plus HTML
//! comments, which are skipped over whole. Anything else is not a tag this
//! scan cares about and is left as ordinary text.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionTag {
    IncludeOnly,
    NoInclude,
    OnlyInclude,
}

impl SectionTag {
    const ALL: [SectionTag; 3] = [
        SectionTag::IncludeOnly,
        SectionTag::NoInclude,
        SectionTag::OnlyInclude,
    ];

    fn index(self) -> usize {
        match self {
            SectionTag::IncludeOnly => 0,
            SectionTag::NoInclude => 1,
            SectionTag::OnlyInclude => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawTextTag {
    Nowiki,
    Pre,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecognizedTag {
    Section(SectionTag),
    Raw(RawTextTag),
    Comment,
}

fn recognize(name_lower: &str) -> Option<RecognizedTag> {
    match name_lower {
        "includeonly" => Some(RecognizedTag::Section(SectionTag::IncludeOnly)),
        "noinclude" => Some(RecognizedTag::Section(SectionTag::NoInclude)),
        "onlyinclude" => Some(RecognizedTag::Section(SectionTag::OnlyInclude)),
        "nowiki" => Some(RecognizedTag::Raw(RawTextTag::Nowiki)),
        "pre" => Some(RecognizedTag::Raw(RawTextTag::Pre)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagEvent {
    Opening,
    Closing,
    SelfClosing,
}

/// A diagnostic from a malformed or suspicious tag arrangement. None of
/// these stop the scan; they're collected for the caller to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    UnclosedTag(&'static str),
    UnclosedComment,
    UnopenedTag(&'static str),
    NestedOpenOpen(&'static str),
    NestedOpenAutoclose(&'static str),
    OpenCloseMismatch { open: &'static str, close: &'static str },
    IncludeonlyAndNoinclude,
}

fn section_name(tag: SectionTag) -> &'static str {
    match tag {
        SectionTag::IncludeOnly => "includeonly",
        SectionTag::NoInclude => "noinclude",
        SectionTag::OnlyInclude => "onlyinclude",
    }
}

struct FoundTag {
    kind: RecognizedTag,
    event: TagEvent,
    begin: usize,
    end: usize,
}

/// Find the next tag this scan recognizes, starting at byte offset `from`.
/// `<!--` is always recognized as the start of a comment (and handled by the
/// caller, since a comment's extent depends on finding its own closer).
fn find_next_tag(code: &str, from: usize) -> Option<FoundTag> {
    let mut pos = from;
    loop {
        let lt = code[pos..].find('<')? + pos;
        if code[lt..].starts_with("<!--") {
            return Some(FoundTag {
                kind: RecognizedTag::Comment,
                event: TagEvent::Opening,
                begin: lt,
                end: lt + 4,
            });
        }
        let search_from = lt + 1;
        let rest = &code[search_from..];
        let stop = rest.find(['<', '>', '\n']);
        let stop = match stop {
            Some(i) => search_from + i,
            None => {
                pos = code.len();
                continue;
            }
        };
        if code.as_bytes()[stop] != b'>' {
            pos = stop;
            continue;
        }
        let tag_end = stop + 1;
        let closing = code.as_bytes().get(lt + 1) == Some(&b'/');
        let self_closing = !closing && code.as_bytes()[stop - 1] == b'/';
        let event = if closing {
            TagEvent::Closing
        } else if self_closing {
            TagEvent::SelfClosing
        } else {
            TagEvent::Opening
        };
        let name_start = lt + if closing { 2 } else { 1 };
        let name_end = code[name_start..]
            .find([' ', '/', '>'])
            .map(|i| name_start + i)
            .unwrap_or(stop);
        let name_lower = code[name_start..name_end].to_ascii_lowercase();
        if let Some(kind) = recognize(&name_lower) {
            return Some(FoundTag {
                kind,
                event,
                begin: lt,
                end: tag_end,
            });
        }
        pos = tag_end;
    }
}

/// The outcome of splitting `code` into its non-transcluded and transcluded
/// forms (§4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitResult {
    /// `code` as rendered directly on this page (`<includeonly>` sections dropped).
    pub not_transcluded: String,
    /// `code` as it appears when transcluded elsewhere (`<noinclude>` sections
    /// dropped; if any `<onlyinclude>` is present, only those sections survive).
    pub transcluded: String,
    pub issues: Vec<Issue>,
}

/// Split `code` into its non-transcluded and transcluded forms.
pub fn parse(code: &str) -> SplitResult {
    let mut is_open = [false; 3];
    let mut open_stack: Vec<SectionTag> = Vec::new();
    let mut with_only_include = false;
    let mut not_transcluded = String::new();
    let mut transcluded = String::new();
    let mut issues = Vec::new();

    let mut push_text = |token: &str,
                          is_open: &[bool; 3],
                          with_only_include: bool,
                          not_transcluded: &mut String,
                          transcluded: &mut String,
                          issues: &mut Vec<Issue>| {
        if !is_open[SectionTag::IncludeOnly.index()] {
            not_transcluded.push_str(token);
        }
        if !is_open[SectionTag::NoInclude.index()]
            && (!with_only_include || is_open[SectionTag::OnlyInclude.index()])
        {
            transcluded.push_str(token);
        }
        if is_open[SectionTag::IncludeOnly.index()] && is_open[SectionTag::NoInclude.index()] {
            issues.push(Issue::IncludeonlyAndNoinclude);
        }
    };

    let mut token_start = 0usize;
    let mut in_raw_text = false;
    let mut raw_text_tag = RawTextTag::Nowiki;
    let mut raw_text_tag_end = 0usize;
    let mut pos = 0usize;

    loop {
        let found = find_next_tag(code, pos);
        if !in_raw_text && found.is_none() {
            break;
        }

        let (tag_begin, tag_end) = match &found {
            Some(t) => (t.begin, t.end),
            None => (code.len(), code.len()),
        };

        if in_raw_text {
            let closes_raw = matches!(
                &found,
                Some(t) if t.kind == RecognizedTag::Raw(raw_text_tag) && t.event == TagEvent::Closing
            );
            if found.is_none() {
                issues.push(Issue::UnclosedTag(raw_text_name(raw_text_tag)));
                in_raw_text = false;
                pos = raw_text_tag_end;
                continue;
            } else if closes_raw {
                in_raw_text = false;
                pos = tag_end;
                continue;
            } else {
                pos = tag_end;
                continue;
            }
        }

        let tag = found.unwrap();
        match tag.kind {
            RecognizedTag::Section(section) => {
                if token_start < tag_begin {
                    push_text(
                        &code[token_start..tag_begin],
                        &is_open,
                        with_only_include,
                        &mut not_transcluded,
                        &mut transcluded,
                        &mut issues,
                    );
                }
                match tag.event {
                    TagEvent::Opening => {
                        if is_open[section.index()] {
                            issues.push(Issue::NestedOpenOpen(section_name(section)));
                        } else {
                            is_open[section.index()] = true;
                            open_stack.push(section);
                        }
                        if section == SectionTag::OnlyInclude && !with_only_include {
                            transcluded.clear();
                            with_only_include = true;
                        }
                    }
                    TagEvent::Closing => {
                        if is_open[section.index()] {
                            is_open[section.index()] = false;
                            match open_stack.last() {
                                Some(&top) if top == section => {
                                    open_stack.pop();
                                }
                                Some(&top) => {
                                    issues.push(Issue::OpenCloseMismatch {
                                        open: section_name(top),
                                        close: section_name(section),
                                    });
                                    open_stack.retain(|&t| t != section);
                                }
                                None => {}
                            }
                        } else {
                            issues.push(Issue::UnopenedTag(section_name(section)));
                        }
                    }
                    TagEvent::SelfClosing => {
                        if is_open[section.index()] {
                            issues.push(Issue::NestedOpenAutoclose(section_name(section)));
                        }
                    }
                }
                token_start = tag_end;
                pos = tag_end;
            }
            RecognizedTag::Comment => {
                pos = match code[tag_end..].find("-->") {
                    Some(i) => tag_end + i + 3,
                    None => {
                        issues.push(Issue::UnclosedComment);
                        code.len()
                    }
                };
            }
            RecognizedTag::Raw(raw) => {
                if tag.event == TagEvent::Opening {
                    in_raw_text = true;
                    raw_text_tag = raw;
                    raw_text_tag_end = tag_end;
                    pos = tag_end;
                } else if tag.event == TagEvent::Closing {
                    issues.push(Issue::UnopenedTag(raw_text_name(raw)));
                    pos = tag_end;
                } else {
                    pos = tag_end;
                }
            }
        }
    }

    if token_start < code.len() {
        push_text(
            &code[token_start..],
            &is_open,
            with_only_include,
            &mut not_transcluded,
            &mut transcluded,
            &mut issues,
        );
    }

    if let Some(&last) = open_stack.last() {
        issues.push(Issue::UnclosedTag(section_name(last)));
    }

    SplitResult {
        not_transcluded,
        transcluded,
        issues,
    }
}

fn raw_text_name(tag: RawTextTag) -> &'static str {
    match tag {
        RawTextTag::Nowiki => "nowiki",
        RawTextTag::Pre => "pre",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through_both_forms() {
        let r = parse("hello");
        assert_eq!(r.not_transcluded, "hello");
        assert_eq!(r.transcluded, "hello");
        assert!(r.issues.is_empty());
    }

    #[test]
    fn includeonly_hidden_on_page_but_shown_when_transcluded() {
        let r = parse("a<includeonly>b</includeonly>c");
        assert_eq!(r.not_transcluded, "ac");
        assert_eq!(r.transcluded, "abc");
    }

    #[test]
    fn noinclude_shown_on_page_but_hidden_when_transcluded() {
        let r = parse("a<noinclude>b</noinclude>c");
        assert_eq!(r.not_transcluded, "abc");
        assert_eq!(r.transcluded, "ac");
    }

    #[test]
    fn onlyinclude_restricts_transcluded_to_marked_sections() {
        let r = parse("a<onlyinclude>b</onlyinclude>c<onlyinclude>d</onlyinclude>e");
        assert_eq!(r.not_transcluded, "abcde");
        assert_eq!(r.transcluded, "bd");
    }

    #[test]
    fn nowiki_content_is_not_scanned_for_section_tags() {
        let r = parse("a<nowiki><includeonly></nowiki>b");
        assert_eq!(r.not_transcluded, "a<nowiki><includeonly></nowiki>b");
        assert_eq!(r.transcluded, "a<nowiki><includeonly></nowiki>b");
        assert!(r.issues.is_empty());
    }

    #[test]
    fn unclosed_includeonly_is_reported() {
        let r = parse("a<includeonly>b");
        assert!(r
            .issues
            .iter()
            .any(|i| *i == Issue::UnclosedTag("includeonly")));
    }

    #[test]
    fn comment_is_skipped_whole() {
        let r = parse("a<!-- <includeonly> -->b");
        assert_eq!(r.not_transcluded, "a<!-- <includeonly> -->b");
        assert_eq!(r.transcluded, "a<!-- <includeonly> -->b");
    }
}
