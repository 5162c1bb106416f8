//! The category-tracking-template wrapper (§4.8 "page decomposition"),
//! grounded on `archiver.cpp`'s `extractTrackingTemplate`.
//!
//! Some talk pages wrap their thread list in
//! `{{Utilisateur:OrlodrimBot/Suivi catégorie|format sections=...}}` ...
//! `{{Utilisateur:OrlodrimBot/Suivi catégorie/fin}}`, a marker pair a
//! category-watching process uses to find where to insert new sections. When
//! present, the enclosed code is what gets split into threads; everything
//! outside the wrapper is carried through untouched.
//!
//! Unlike the original, which scans every [`crate::parser::List`] in the
//! tree (so the wrapper can be nested inside another template's field), this
//! only looks at the page's top-level nodes: talk-page tracking wrappers are
//! placed directly on the page, never inside another transclusion's
//! parameter, so the nested case buys nothing here and isn't exercised by
//! any of this crate's callers.

use crate::parser::{Node, NormalizeFlags, ParserOptions};

const TRACKING_TEMPLATE_NAME: &str = "Utilisateur:OrlodrimBot/Suivi catégorie";
const TRACKING_TEMPLATE_END_NAME: &str = "Utilisateur:OrlodrimBot/Suivi catégorie/fin";

/// The three pieces of a page with a tracking-template wrapper: the code
/// before the begin marker, the code it wraps (empty if the wrapper was
/// never closed), and the code from the end marker (or, if unclosed, from
/// right after the begin marker) onward.
pub struct TrackingTemplateExtraction {
    pub header: String,
    pub inner_code: String,
    pub footer: String,
}

/// Look for the tracking-template wrapper among `code`'s top-level nodes.
/// Returns `None` if there's no begin marker with a meaningful
/// `format sections=` parameter (a bare `format sections=-` or absent
/// parameter means the wrapper isn't in tracking mode).
pub fn extract_tracking_template(code: &str) -> Option<TrackingTemplateExtraction> {
    let tree = crate::parser::parse(code, &ParserOptions::default()).ok()?;
    let children = tree.children();

    let mut begin_index = None;
    for (i, node) in children.iter().enumerate() {
        let Some(tpl) = node.as_template() else { continue };
        if tpl.name() != TRACKING_TEMPLATE_NAME {
            continue;
        }
        if begin_index.is_some() {
            // A second begin marker before any end marker: stop looking,
            // matching the original's `if (trackingTemplateIndex != -1) break;`.
            break;
        }
        let fields = tpl.parsed_fields(NormalizeFlags::TRIM);
        let format_sections = fields.get("format sections");
        if !format_sections.is_empty() && format_sections != "-" {
            begin_index = Some(i);
        }
    }
    let begin_index = begin_index?;

    let end_index = children[begin_index + 1..].iter().position(|node| {
        node.as_template().map_or(false, |tpl| tpl.name() == TRACKING_TEMPLATE_END_NAME)
    });

    let header = render(&children[..begin_index]);
    let (inner_code, footer) = match end_index {
        Some(offset) => {
            let end = begin_index + 1 + offset;
            (render(&children[begin_index + 1..end]), render(&children[end..]))
        }
        // Unterminated: nothing was "inside" the wrapper, and everything
        // after the begin marker is carried through as-is.
        None => (String::new(), render(&children[begin_index + 1..])),
    };

    Some(TrackingTemplateExtraction { header, inner_code, footer })
}

fn render(nodes: &[Node]) -> String {
    nodes.iter().map(Node::to_text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_wrapper_present() {
        assert!(extract_tracking_template("== Section 1 ==\nText\n== Section 2 ==\nText").is_none());
    }

    #[test]
    fn bare_format_sections_dash_is_not_tracking_mode() {
        let code = "{{Utilisateur:OrlodrimBot/Suivi catégorie|format sections = -}}\n\
                    *[[Article]]\n\
                    {{Utilisateur:OrlodrimBot/Suivi catégorie/fin}}";
        assert!(extract_tracking_template(code).is_none());
    }

    #[test]
    fn standard_case_splits_header_inner_and_footer() {
        let code = "Header.\n\
                    {{Utilisateur:OrlodrimBot/Suivi catégorie|format sections = == %(mois) %(année) ==}}\n\
                    == Section 1 ==\n\
                    *[[Article]]\n\
                    {{Utilisateur:OrlodrimBot/Suivi catégorie/fin}}\n\
                    Footer.";
        let extraction = extract_tracking_template(code).unwrap();
        assert_eq!(extraction.header, "Header.\n");
        assert_eq!(extraction.inner_code, "\n== Section 1 ==\n*[[Article]]\n");
        assert_eq!(
            extraction.footer,
            "{{Utilisateur:OrlodrimBot/Suivi catégorie/fin}}\nFooter."
        );
        // Recombining the three pieces round-trips to the original page.
        assert_eq!(
            format!("{}{{{{Utilisateur:OrlodrimBot/Suivi catégorie|format sections = == %(mois) %(année) ==}}}}{}{}",
                extraction.header, extraction.inner_code, extraction.footer),
            code
        );
    }

    #[test]
    fn unterminated_wrapper_yields_empty_inner_code() {
        let code = "{{Utilisateur:OrlodrimBot/Suivi catégorie|format sections = == %(mois) %(année) ==}}\n\
                    x\n\
                    Still no terminator.";
        let extraction = extract_tracking_template(code).unwrap();
        assert_eq!(extraction.inner_code, "");
        assert_eq!(extraction.footer, "x\nStill no terminator.");
    }
}
