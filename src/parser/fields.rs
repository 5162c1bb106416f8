//! Template parameter parsing (§4.1 "Template helpers").
//!
//! Each `|`-separated field of a template is split into `(name, value)` by
//! scanning its direct children left to right: the first `=` encountered in a
//! *top-level* [`Node::Text`] child splits the field, unless that `=` opens a
//! nested heading inside the value (`"\n=="`, i.e. the character before it is
//! a newline and the character after it is another `=`) — equals signs inside
//! a nested [`Node::Link`]/[`Node::Template`]/etc. never count, since those
//! aren't direct `Text` children of the field. A field with no splitting `=`
//! is a positional parameter, numbered in encounter order starting at `"1"`.

use std::collections::HashMap;

use super::{List, Node};

bitflags::bitflags! {
    /// Value normalization applied by [`parse_fields`] (§4.1).
    #[derive(Default)]
    pub struct NormalizeFlags: u8 {
        const TRIM = 1 << 0;
        const TRIM_AND_COLLAPSE_SPACE = 1 << 1;
        const STRIP_COMMENTS = 1 << 2;
    }
}

/// One parsed `name=value` (or positional) field, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateField {
    pub name: String,
    pub value: String,
    /// 1-based index of this field among the template's parameter fields
    /// (i.e. excluding the name field).
    pub field_index: usize,
}

/// The result of [`super::TemplateNode::parsed_fields`]: an ordered list
/// (duplicates and blanks preserved) plus a by-name lookup where the last
/// occurrence of a name wins.
#[derive(Debug, Clone, Default)]
pub struct ParsedFields {
    ordered: Vec<TemplateField>,
    by_name: HashMap<String, usize>,
}

impl ParsedFields {
    pub fn ordered(&self) -> &[TemplateField] {
        &self.ordered
    }

    /// The value of the last occurrence of `name`, or `""` if absent.
    pub fn get(&self, name: &str) -> &str {
        self.by_name
            .get(name)
            .map(|&i| self.ordered[i].value.as_str())
            .unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// 1-based field index of the last occurrence of `name`, if any.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).map(|&i| self.ordered[i].field_index)
    }
}

/// Find the byte offset right after the splitting `=` in a field's direct
/// children, if any — the same scan [`split_field`] does, exposed so a
/// mutator can preserve whatever precedes it (name text and surrounding
/// whitespace) untouched.
fn find_value_start(field: &List) -> Option<(usize, usize)> {
    for (child_index, node) in field.children().iter().enumerate() {
        if let Node::Text(text) = node {
            if let Some(eq) = text.find('=') {
                let is_heading_equal = eq > 0
                    && text.as_bytes()[eq - 1] == b'\n'
                    && text.as_bytes().get(eq + 1) == Some(&b'=');
                if !is_heading_equal {
                    return Some((child_index, eq + 1));
                }
            }
        } else {
            continue;
        }
        // A non-`=` Text node before any split point is part of the name; keep scanning.
    }
    None
}

/// Replace a field's value in place, preserving the name and the whitespace
/// around `=` when the field was already a `name=value` pair (§4.1
/// "`setFieldName` and `setFieldValue` preserve surrounding whitespace").
/// `new_value` is parsed as wikicode so templates/links in the replacement
/// round-trip like any other field content.
pub fn set_field_value(field: &mut List, new_value: &str) {
    let mut parsed = super::parse(new_value, &super::ParserOptions::default()).unwrap_or_else(|_| List::new());
    match find_value_start(field) {
        Some((child_index, byte_offset)) => {
            let children = field.children_mut();
            children.truncate(child_index + 1);
            if let Node::Text(text) = &mut children[child_index] {
                text.truncate(byte_offset);
            }
            children.append(parsed.children_mut());
        }
        None => {
            // No existing `=`: there's nothing to preserve, so the field becomes the new value outright.
            *field = parsed;
        }
    }
}

/// Build a new field [`List`] from `spec`, e.g. `"counter=5"` or
/// `"archive=/Archive %(counter)d"`. Parsed as wikicode like any other field.
pub fn new_field(spec: &str) -> List {
    super::parse(spec, &super::ParserOptions::default()).unwrap_or_else(|_| List::new())
}

fn normalize_value(mut s: String, flags: NormalizeFlags) -> String {
    if flags.contains(NormalizeFlags::TRIM_AND_COLLAPSE_SPACE) {
        s = s.split_whitespace().collect::<Vec<_>>().join(" ");
    } else if flags.contains(NormalizeFlags::TRIM) {
        s = s.trim().to_owned();
    }
    s
}

/// Split one field's children into `(name, value)`, matching
/// `Template::splitParamValue`: scan direct children, looking for `=` only
/// inside `Text` nodes seen before the split point.
fn split_field(field: &List, flags: NormalizeFlags) -> (Option<String>, String) {
    let children = field.children();
    let mut name_buf = String::new();
    let mut value_buf = String::new();
    let mut before_equal = true;
    let mut split = false;
    let strip_comments = flags.contains(NormalizeFlags::STRIP_COMMENTS);

    for node in children {
        if before_equal {
            if let Node::Text(text) = node {
                if let Some(eq) = text.find('=') {
                    let is_heading_equal = eq > 0
                        && text.as_bytes()[eq - 1] == b'\n'
                        && text.as_bytes().get(eq + 1) == Some(&b'=');
                    if !is_heading_equal {
                        name_buf.push_str(&text[..eq]);
                        value_buf.push_str(&text[eq + 1..]);
                        before_equal = false;
                        split = true;
                        continue;
                    }
                }
            }
        }
        if before_equal {
            name_buf.push_str(&node.to_text());
        } else if strip_comments && matches!(node, Node::Comment(_)) {
            // dropped
        } else {
            value_buf.push_str(&node.to_text());
        }
    }

    let value = normalize_value(value_buf, flags);
    if split {
        (Some(name_buf.trim().to_owned()), value)
    } else {
        (None, value)
    }
}

/// Parse `fields` (a template's parameter fields, i.e. everything after the
/// name field) into a [`ParsedFields`].
pub fn parse_fields(fields: &[List], flags: NormalizeFlags) -> ParsedFields {
    let mut ordered = Vec::with_capacity(fields.len());
    let mut by_name = HashMap::new();
    let mut next_positional = 0usize;

    for (i, field) in fields.iter().enumerate() {
        let (name, value) = split_field(field, flags);
        let name = match name {
            Some(n) => n,
            None => {
                next_positional += 1;
                next_positional.to_string()
            }
        };
        let field_index = i + 1;
        by_name.insert(name.clone(), ordered.len());
        ordered.push(TemplateField {
            name,
            value,
            field_index,
        });
    }

    ParsedFields { ordered, by_name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, ParserOptions};

    #[test]
    fn s2_scenario() {
        let tree = parse(
            "{{t|color1=red|green|2=blue=orange}}",
            &ParserOptions::default(),
        )
        .unwrap();
        let tpl = tree.children()[0].as_template().unwrap();
        let parsed = tpl.parsed_fields(NormalizeFlags::default());
        assert_eq!(parsed.get("1"), "green");
        assert_eq!(parsed.get("2"), "blue=orange");
        assert_eq!(parsed.get("color1"), "red");

        let names: Vec<&str> = parsed.ordered().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["color1", "1", "2"]);
    }

    #[test]
    fn duplicate_names_last_wins_but_both_kept() {
        let tree = parse("{{t|a=1|a=2}}", &ParserOptions::default()).unwrap();
        let tpl = tree.children()[0].as_template().unwrap();
        let parsed = tpl.parsed_fields(NormalizeFlags::default());
        assert_eq!(parsed.get("a"), "2");
        assert_eq!(parsed.ordered().len(), 2);
    }

    #[test]
    fn heading_equals_does_not_split() {
        let tree = parse("{{t|1=\na==b==\nc}}", &ParserOptions::default()).unwrap();
        let tpl = tree.children()[0].as_template().unwrap();
        let parsed = tpl.parsed_fields(NormalizeFlags::default());
        assert_eq!(parsed.get("1"), "\na==b==\nc");
    }

    #[test]
    fn strip_comments_drops_comment_nodes_from_value() {
        let tree = parse("{{t|a=x<!--c-->y}}", &ParserOptions::default()).unwrap();
        let tpl = tree.children()[0].as_template().unwrap();
        let parsed = tpl.parsed_fields(NormalizeFlags::STRIP_COMMENTS);
        assert_eq!(parsed.get("a"), "xy");
    }
}
