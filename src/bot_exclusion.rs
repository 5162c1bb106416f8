//! Bot exclusion test (§4.2): `{{nobots}}` / `{{bots}}` per the fr-wiki
//! convention. A bare `{{nobots}}` denies every bot; `{{bots|allow=...}}`,
//! `{{bots|deny=...}}` and `{{bots|optout=...}}` take comma-separated bot
//! names (or the literal `all`/`none`) and a per-task opt-out list.
//! Malformed wikitext (a strict parse failure) fails safe to "excluded".

use crate::parser::{self, NormalizeFlags, Node, Order, ParserOptions, Traverser};

fn list_contains(list: &str, needle: &str) -> bool {
    list.split(',')
        .map(str::trim)
        .any(|s| s.eq_ignore_ascii_case(needle))
}

/// Whether `bot_name` (optionally performing task `task_id`) may edit a page
/// whose current wikitext is `wikitext`.
pub fn test_bot_exclusion(wikitext: &str, bot_name: &str, task_id: Option<&str>) -> bool {
    let tree = match parser::parse(wikitext, &ParserOptions::strict()) {
        Ok(tree) => tree,
        Err(_) => return false,
    };

    let mut allowed = true;
    Traverser::new(&tree, Order::Prefix)
        .with_filter(|n| matches!(n, Node::Template(_)))
        .for_each(|item| {
            let tpl = item.node().as_template().unwrap();
            let fields = tpl.parsed_fields(NormalizeFlags::TRIM);
            match tpl.name().to_lowercase().as_str() {
                "nobots" => {
                    allowed = if fields.contains("deny") {
                        !list_contains(fields.get("deny"), bot_name)
                    } else {
                        false
                    };
                }
                "bots" => {
                    let mut a = allowed;
                    if fields.contains("allow") {
                        let v = fields.get("allow");
                        a = v.eq_ignore_ascii_case("all") || list_contains(v, bot_name);
                    }
                    if fields.contains("deny") {
                        let v = fields.get("deny");
                        a = if v.eq_ignore_ascii_case("all") {
                            fields.contains("allow") && list_contains(fields.get("allow"), bot_name)
                        } else {
                            a && !list_contains(v, bot_name)
                        };
                    }
                    if let (true, Some(task)) = (fields.contains("optout"), task_id) {
                        let v = fields.get("optout");
                        if v.eq_ignore_ascii_case("all") || list_contains(v, task) {
                            a = false;
                        }
                    }
                    allowed = a;
                }
                _ => {}
            }
        });
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_exclusion_template_allows_editing() {
        assert!(test_bot_exclusion("plain text", "ExampleBot", None));
    }

    #[test]
    fn bare_nobots_denies_everyone() {
        assert!(!test_bot_exclusion("{{nobots}}", "ExampleBot", None));
    }

    #[test]
    fn nobots_with_deny_list_only_denies_listed_bots() {
        let text = "{{nobots|deny=OtherBot}}";
        assert!(test_bot_exclusion(text, "ExampleBot", None));
        assert!(!test_bot_exclusion(text, "OtherBot", None));
    }

    #[test]
    fn bots_allow_all() {
        assert!(test_bot_exclusion("{{bots|allow=all}}", "ExampleBot", None));
    }

    #[test]
    fn bots_deny_all_except_allow_list() {
        let text = "{{bots|deny=all|allow=ExampleBot}}";
        assert!(test_bot_exclusion(text, "ExampleBot", None));
        assert!(!test_bot_exclusion(text, "OtherBot", None));
    }

    #[test]
    fn bots_optout_denies_specific_task() {
        let text = "{{bots|optout=archiving}}";
        assert!(!test_bot_exclusion(text, "ExampleBot", Some("archiving")));
        assert!(test_bot_exclusion(text, "ExampleBot", Some("other-task")));
        assert!(test_bot_exclusion(text, "ExampleBot", None));
    }
}
