//! The wikicode parser and its mutable tree (§4.1).
//!
//! A single-pass recursive-descent scan over the source characters builds a
//! [`List`] of [`Node`]s such that `list.to_string() == source` always holds
//! (the one load-bearing invariant, §8 property 1). Nesting is handled by
//! ordinary recursion rather than a shift-reduce stack machine:
//! because each recursive call owns exactly the slice of input between a
//! construct's opening and closing delimiters, there is no need for the
//! two-pass "unmatched link" fallback the original design describes — a
//! nested construct simply can't escape its parent's scan. See `DESIGN.md`
//! for the handful of corner cases (brace/bracket-count mismatches) where
//! this implementation's choice is a simplification rather than a faithful
//! port.

mod fields;
mod tags;
mod traversal;

pub use fields::{NormalizeFlags, ParsedFields};
pub use tags::TagClass;
pub use traversal::{Order, TraversalItem, Traverser};

use std::fmt;

use crate::error::ParseError;

/// How strictly malformed input is treated (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Never raises; best-effort recovery.
    Lenient,
    /// Raises a [`ParseError`] bundling every issue found.
    Strict,
}

/// The default recursion/nesting ceiling (§4.1 "Depth").
pub const DEFAULT_MAX_DEPTH: u32 = 1000;

#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub strictness: Strictness,
    pub max_depth: u32,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserOptions {
    pub fn strict() -> Self {
        Self {
            strictness: Strictness::Strict,
            ..Self::default()
        }
    }
}

/// An ordered sequence of sibling nodes. The root of any parsed document is
/// always a `List`; it is also the shape of a `Tag`'s content, each `|`-separated
/// field of a `Link`/`Template`, and a `Variable`'s name/default.
#[derive(Debug, Default, PartialEq)]
pub struct List {
    children: Vec<Node>,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn push(&mut self, node: Node) {
        // Parent lists never contain adjacent Text children (§3).
        if let (Some(Node::Text(prev)), Node::Text(new)) = (self.children.last_mut(), &node) {
            prev.push_str(new);
            return;
        }
        self.children.push(node);
    }

    /// The recursive depth of the deepest node in this tree, computed
    /// iteratively so a degenerate, very deep tree can't blow the stack
    /// (§8 property 3).
    pub fn depth(&self) -> u32 {
        let mut max = 0u32;
        let mut stack: Vec<(u32, &List)> = vec![(0, self)];
        while let Some((d, list)) = stack.pop() {
            max = max.max(d);
            for node in &list.children {
                match node {
                    Node::Tag(t) => {
                        if let Some(c) = &t.content {
                            stack.push((d + 1, c));
                        }
                    }
                    Node::Link(l) => {
                        for f in &l.fields {
                            stack.push((d + 1, f));
                        }
                    }
                    Node::Template(t) => {
                        for f in &t.fields {
                            stack.push((d + 1, f));
                        }
                    }
                    Node::Variable(v) => {
                        stack.push((d + 1, &v.name));
                        if let Some(def) = &v.default {
                            stack.push((d + 1, def));
                        }
                    }
                    Node::Text(_) | Node::Comment(_) => {}
                }
            }
        }
        max
    }

    pub fn to_text(&self) -> String {
        let mut s = String::new();
        self.write_to(&mut s);
        s
    }

    fn write_to(&self, out: &mut String) {
        for node in &self.children {
            node.write_to(out);
        }
    }

    /// Nodes of a given type, in document order, ignoring nesting inside
    /// fields/tag content deeper than the immediate children. Use
    /// [`for_each_prefix`]/[`for_each_postfix`] to recurse.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.children.iter()
    }

    /// Every `Template` node reachable from this list, postfix order,
    /// mutable — grounded on `wikicode::getTemplatesByName`'s non-const
    /// generator (see `DESIGN.md`), minus the name filter: callers match on
    /// [`TemplateNode::name`] themselves once they have a normalized title.
    /// Postfix rather than the generator's default prefix order, since that's
    /// what a safe recursive mutable borrow naturally gives here; archiver
    /// lookups only care about the first top-level match either way.
    pub fn templates_mut(&mut self) -> Vec<&mut TemplateNode> {
        let mut out = Vec::new();
        collect_templates_mut(&mut self.children, &mut out);
        out
    }
}

fn collect_templates_mut<'a>(children: &'a mut [Node], out: &mut Vec<&'a mut TemplateNode>) {
    for node in children {
        match node {
            Node::Template(t) => {
                // Postfix order (innermost fields before the template itself): simpler to
                // express with safe mutable borrows than a prefix DFS, and archiver
                // lookups only ever care about the *first* top-level match anyway.
                for field in &mut t.fields {
                    collect_templates_mut(&mut field.children, out);
                }
                out.push(t);
            }
            Node::Tag(t) => {
                if let Some(content) = &mut t.content {
                    collect_templates_mut(&mut content.children, out);
                }
            }
            Node::Link(l) => {
                for field in &mut l.fields {
                    collect_templates_mut(&mut field.children, out);
                }
            }
            Node::Variable(v) => {
                collect_templates_mut(&mut v.name.children, out);
                if let Some(default) = &mut v.default {
                    collect_templates_mut(&mut default.children, out);
                }
            }
            Node::Text(_) | Node::Comment(_) => {}
        }
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// A node is dropped iteratively: naively letting `Vec<Node>`'s derived drop
/// glue recurse through deeply nested `Tag`/`Link`/`Template`/`Variable`
/// content would overflow the stack on a pathological, very deep document
/// (§9 "cyclic / pointer-heavy wikicode tree"). Draining nested lists into an
/// explicit work queue first means every `List` we actually recurse into via
/// ordinary drop glue is already empty.
impl Drop for List {
    fn drop(&mut self) {
        let mut queue: Vec<Vec<Node>> = vec![std::mem::take(&mut self.children)];
        while let Some(children) = queue.pop() {
            for node in children {
                match node {
                    Node::Tag(mut t) => {
                        if let Some(mut c) = t.content.take() {
                            queue.push(std::mem::take(&mut c.children));
                        }
                    }
                    Node::Link(mut l) => {
                        for mut f in l.fields.drain(..) {
                            queue.push(std::mem::take(&mut f.children));
                        }
                    }
                    Node::Template(mut t) => {
                        for mut f in t.fields.drain(..) {
                            queue.push(std::mem::take(&mut f.children));
                        }
                    }
                    Node::Variable(mut v) => {
                        queue.push(std::mem::take(&mut v.name.children));
                        if let Some(mut d) = v.default.take() {
                            queue.push(std::mem::take(&mut d.children));
                        }
                    }
                    Node::Text(_) | Node::Comment(_) => {}
                }
            }
        }
    }
}

/// One node of the wikicode tree (§3 "Wikicode tree").
#[derive(Debug, PartialEq)]
pub enum Node {
    Text(String),
    Comment(String),
    Tag(TagNode),
    Link(LinkNode),
    Template(TemplateNode),
    Variable(VariableNode),
}

impl Node {
    fn write_to(&self, out: &mut String) {
        match self {
            Node::Text(s) => out.push_str(s),
            Node::Comment(s) => out.push_str(s),
            Node::Tag(t) => {
                out.push_str(&t.open);
                if let Some(c) = &t.content {
                    c.write_to(out);
                }
                out.push_str(&t.close);
            }
            Node::Link(l) => {
                out.push_str(&l.open);
                for (i, f) in l.fields.iter().enumerate() {
                    if i != 0 {
                        out.push('|');
                    }
                    f.write_to(out);
                }
                out.push_str(&l.close);
            }
            Node::Template(t) => {
                out.push_str(&t.open);
                for (i, f) in t.fields.iter().enumerate() {
                    if i != 0 {
                        out.push('|');
                    }
                    f.write_to(out);
                }
                out.push_str(&t.close);
            }
            Node::Variable(v) => {
                out.push_str(&v.open);
                v.name.write_to(out);
                if let Some(def) = &v.default {
                    out.push('|');
                    def.write_to(out);
                }
                out.push_str(&v.close);
            }
        }
    }

    pub fn to_text(&self) -> String {
        let mut s = String::new();
        self.write_to(&mut s);
        s
    }

    pub fn as_tag(&self) -> Option<&TagNode> {
        match self {
            Node::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&LinkNode> {
        match self {
            Node::Link(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&TemplateNode> {
        match self {
            Node::Template(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_template_mut(&mut self) -> Option<&mut TemplateNode> {
        match self {
            Node::Template(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableNode> {
        match self {
            Node::Variable(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct TagNode {
    /// Lowercased tag name.
    pub name: String,
    /// Verbatim opening tag text, including `<` and `>`.
    pub open: String,
    /// Verbatim closing tag text, or empty if the tag was self-closing or unclosed.
    pub close: String,
    pub content: Option<Box<List>>,
}

impl TagNode {
    pub fn class(&self) -> Option<TagClass> {
        tags::classify(&self.name)
    }
}

#[derive(Debug, PartialEq)]
pub struct LinkNode {
    open: String,
    close: String,
    pub fields: Vec<List>,
}

impl LinkNode {
    /// The link target and anchor, computed only when the first field
    /// contains only text and comments (§3 "Link").
    pub fn target_and_anchor(&self) -> Option<(String, Option<String>)> {
        let first = self.fields.first()?;
        let mut text = String::new();
        for node in first.iter() {
            match node {
                Node::Text(s) => text.push_str(s),
                Node::Comment(_) => {}
                _ => return None,
            }
        }
        let text = text.trim();
        match text.split_once('#') {
            Some((target, anchor)) => Some((target.to_owned(), Some(format!("#{anchor}")))),
            None => Some((text.to_owned(), None)),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct TemplateNode {
    open: String,
    close: String,
    pub fields: Vec<List>,
}

impl TemplateNode {
    /// The template name: strips one `subst:`/`safesubst:` wrapper and
    /// anything from the first `#` onward, unless the part before `#` is
    /// empty (a parser function, whose leading `#...` *is* the name).
    pub fn name(&self) -> String {
        let raw = self.fields.first().map(List::to_text).unwrap_or_default();
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        let stripped = if let Some(rest) = lower.strip_prefix("safesubst:") {
            &trimmed[trimmed.len() - rest.len()..]
        } else if let Some(rest) = lower.strip_prefix("subst:") {
            &trimmed[trimmed.len() - rest.len()..]
        } else {
            trimmed
        };
        match stripped.split_once('#') {
            Some((before, _)) if !before.is_empty() => before.trim().to_owned(),
            _ => stripped.trim().to_owned(),
        }
    }

    pub fn parsed_fields(&self, flags: fields::NormalizeFlags) -> ParsedFields {
        fields::parse_fields(&self.fields[1.min(self.fields.len())..], flags)
    }

    /// Set the value of the parameter field at 1-based `field_index` (as
    /// reported by [`ParsedFields::index_of`]), preserving the name and
    /// surrounding whitespace (§4.1).
    pub fn set_field_value(&mut self, field_index: usize, new_value: &str) {
        if let Some(field) = self.fields.get_mut(field_index) {
            fields::set_field_value(field, new_value);
        }
    }

    /// Append a new `name=value` parameter field, e.g. `"counter=5"`.
    pub fn add_field(&mut self, spec: &str) {
        self.fields.push(fields::new_field(spec));
    }
}

#[derive(Debug, PartialEq)]
pub struct VariableNode {
    open: String,
    close: String,
    pub name: Box<List>,
    pub default: Option<Box<List>>,
}

/// Parse `source` into a tree. In [`Strictness::Lenient`] mode this never
/// fails; in [`Strictness::Strict`] mode any issue recorded while scanning
/// (unmatched delimiters, a bad link opener, an unclosed comment, hitting
/// `max_depth`) is collected into one [`ParseError`].
pub fn parse(source: &str, options: &ParserOptions) -> Result<List, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut p = Scanner {
        chars: &chars,
        pos: 0,
        max_depth: options.max_depth,
        issues: Vec::new(),
    };
    let (children, _) = p.scan(0, End::TopLevel);
    let list = List { children };
    if options.strictness == Strictness::Strict && !p.issues.is_empty() {
        let message = p
            .issues
            .iter()
            .map(|i| i.describe(&chars))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ParseError::new(message));
    }
    Ok(list)
}

struct Issue {
    pos: usize,
    message: &'static str,
}

impl Issue {
    fn describe(&self, chars: &[char]) -> String {
        let (line, col) = line_col(chars, self.pos);
        let preview: String = chars.iter().skip(self.pos).take(20).collect();
        format!("{}:{}: {}: {preview:?}", line, col, self.message)
    }
}

fn line_col(chars: &[char], pos: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for &c in chars.iter().take(pos) {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    TopLevel,
    LinkField,
    TemplateOrVariableField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Eof,
    Pipe,
    /// The end delimiter was *seen* (peeked) but not consumed; the caller
    /// (`scan_link`/`scan_template_or_variable`) consumes it.
    Closer,
}

struct Scanner<'a> {
    chars: &'a [char],
    pos: usize,
    max_depth: u32,
    issues: Vec<Issue>,
}

impl<'a> Scanner<'a> {
    fn peek_run(&self, ch: char) -> usize {
        let mut n = 0;
        while self.chars.get(self.pos + n) == Some(&ch) {
            n += 1;
        }
        n
    }

    fn take_chars(&mut self, n: usize) -> String {
        let s: String = self.chars[self.pos..self.pos + n].iter().collect();
        self.pos += n;
        s
    }

    fn starts_with(&self, s: &str) -> bool {
        let n = s.chars().count();
        if self.pos + n > self.chars.len() {
            return false;
        }
        self.chars[self.pos..self.pos + n]
            .iter()
            .zip(s.chars())
            .all(|(a, b)| *a == b)
    }

    /// Scan a run of sibling nodes until `end`'s terminator is found (or EOF).
    fn scan(&mut self, depth: u32, end: End) -> (Vec<Node>, Terminator) {
        let mut nodes: Vec<Node> = Vec::new();
        let mut buf = String::new();

        macro_rules! flush {
            () => {
                if !buf.is_empty() {
                    push_text(&mut nodes, std::mem::take(&mut buf));
                }
            };
        }

        loop {
            if self.pos >= self.chars.len() {
                flush!();
                return (nodes, Terminator::Eof);
            }

            if depth > self.max_depth {
                self.issues.push(Issue {
                    pos: self.pos,
                    message: "MAX_DEPTH_REACHED",
                });
                while self.pos < self.chars.len() {
                    buf.push(self.chars[self.pos]);
                    self.pos += 1;
                }
                flush!();
                return (nodes, Terminator::Eof);
            }

            let c = self.chars[self.pos];

            if matches!(end, End::LinkField | End::TemplateOrVariableField) && c == '|' {
                flush!();
                self.pos += 1;
                return (nodes, Terminator::Pipe);
            }
            if end == End::LinkField && c == ']' && self.peek_run(']') >= 2 {
                flush!();
                return (nodes, Terminator::Closer);
            }
            if end == End::TemplateOrVariableField && c == '}' && self.peek_run('}') >= 2 {
                flush!();
                return (nodes, Terminator::Closer);
            }

            if self.starts_with("<!--") {
                flush!();
                self.scan_comment(&mut nodes);
                continue;
            }

            if c == '<' {
                if let Some((name, open_end, self_closing)) =
                    tags::scan_open_tag(self.chars, self.pos)
                {
                    flush!();
                    self.scan_tag(&mut nodes, depth, name, open_end, self_closing);
                    continue;
                }
                buf.push(c);
                self.pos += 1;
                continue;
            }

            if c == '[' && self.peek_run('[') >= 2 {
                flush!();
                self.scan_link(&mut nodes, depth);
                continue;
            }

            if c == '{' && self.peek_run('{') >= 2 {
                flush!();
                self.scan_template_or_variable(&mut nodes, depth);
                continue;
            }

            buf.push(c);
            self.pos += 1;
        }
    }

    fn scan_comment(&mut self, nodes: &mut Vec<Node>) {
        let start = self.pos;
        match find_substr(self.chars, self.pos + 4, "-->") {
            Some(end_of_marker) => {
                let text: String = self.chars[start..end_of_marker].iter().collect();
                self.pos = end_of_marker;
                nodes.push(Node::Comment(text));
            }
            None => {
                self.issues.push(Issue {
                    pos: start,
                    message: "unclosed comment",
                });
                let text: String = self.chars[start..].iter().collect();
                self.pos = self.chars.len();
                nodes.push(Node::Comment(text));
            }
        }
    }

    fn scan_tag(
        &mut self,
        nodes: &mut Vec<Node>,
        depth: u32,
        name: String,
        open_end: usize,
        self_closing: bool,
    ) {
        let start = self.pos;
        let open: String = self.chars[start..open_end].iter().collect();
        if self_closing {
            self.pos = open_end;
            nodes.push(Node::Tag(TagNode {
                name,
                open,
                close: String::new(),
                content: None,
            }));
            return;
        }
        match tags::find_closing_tag(self.chars, open_end, &name) {
            Some((close_start, close_end)) => {
                let close: String = self.chars[close_start..close_end].iter().collect();
                let content = self.build_content(open_end, close_start, depth, &name);
                self.pos = close_end;
                nodes.push(Node::Tag(TagNode {
                    name,
                    open,
                    close,
                    content: Some(Box::new(content)),
                }));
            }
            None if tags::tolerates_unclosed(&name) => {
                let content = self.build_content(open_end, self.chars.len(), depth, &name);
                self.pos = self.chars.len();
                nodes.push(Node::Tag(TagNode {
                    name,
                    open,
                    close: String::new(),
                    content: Some(Box::new(content)),
                }));
            }
            None => {
                self.issues.push(Issue {
                    pos: start,
                    message: "unclosed tag",
                });
                nodes.push(Node::Text(open));
                self.pos = open_end;
            }
        }
    }

    fn build_content(&mut self, from: usize, to: usize, depth: u32, name: &str) -> List {
        let raw: String = self.chars[from..to].iter().collect();
        match tags::classify(name) {
            Some(TagClass::Wikicode) => {
                let sub_chars: Vec<char> = raw.chars().collect();
                let mut sub = Scanner {
                    chars: &sub_chars,
                    pos: 0,
                    max_depth: self.max_depth,
                    issues: Vec::new(),
                };
                let (children, _) = sub.scan(depth + 1, End::TopLevel);
                self.issues.extend(sub.issues.into_iter().map(|mut i| {
                    i.pos += from;
                    i
                }));
                List { children }
            }
            _ => {
                if raw.is_empty() {
                    List::new()
                } else {
                    List {
                        children: vec![Node::Text(raw)],
                    }
                }
            }
        }
    }

    fn scan_link(&mut self, nodes: &mut Vec<Node>, depth: u32) {
        let n = self.peek_run('[');
        if n == 3 {
            self.issues.push(Issue {
                pos: self.pos,
                message: "bad link opener ([[[)",
            });
        }
        let leading_extra = n.saturating_sub(2);
        if leading_extra > 0 {
            nodes.push(Node::Text("[".repeat(leading_extra)));
        }
        self.pos += n;
        let open = "[[".to_owned();

        let mut fields = Vec::new();
        loop {
            let (children, term) = self.scan(depth + 1, End::LinkField);
            fields.push(List { children });
            match term {
                Terminator::Pipe => continue,
                Terminator::Closer | Terminator::Eof => break,
            }
        }

        let m = self.peek_run(']');
        let (close, trailing_extra) = if m >= 2 {
            self.pos += 2;
            ("]]".to_owned(), m - 2)
        } else {
            self.issues.push(Issue {
                pos: self.pos,
                message: "unmatched link opener",
            });
            (String::new(), 0)
        };

        nodes.push(Node::Link(LinkNode { open, close, fields }));
        if trailing_extra > 0 {
            nodes.push(Node::Text("]".repeat(trailing_extra)));
        }
    }

    fn scan_template_or_variable(&mut self, nodes: &mut Vec<Node>, depth: u32) {
        let n = self.peek_run('{');
        let is_variable = n >= 3;
        let delim_open = if is_variable { 3 } else { 2 };
        let leading_extra = n - delim_open;
        if leading_extra > 0 {
            nodes.push(Node::Text("{".repeat(leading_extra)));
        }
        self.pos += n;
        let open = "{".repeat(delim_open);

        let mut fields = Vec::new();
        loop {
            let (children, term) = self.scan(depth + 1, End::TemplateOrVariableField);
            fields.push(List { children });
            match term {
                Terminator::Pipe => continue,
                Terminator::Closer | Terminator::Eof => break,
            }
        }

        let m = self.peek_run('}');
        if m == 0 {
            self.issues.push(Issue {
                pos: self.pos,
                message: "unmatched template/variable opener",
            });
            let node = self.finish_template_or_variable(is_variable, open, String::new(), fields);
            nodes.push(node);
            return;
        }

        let delim_close = if is_variable { m.min(3) } else { 2.min(m) };
        let trailing_extra = m - delim_close;
        self.pos += delim_close;
        let close = "}".repeat(delim_close);
        let node = self.finish_template_or_variable(is_variable, open, close, fields);
        nodes.push(node);
        if trailing_extra > 0 {
            nodes.push(Node::Text("}".repeat(trailing_extra)));
        }
    }

    fn finish_template_or_variable(
        &self,
        is_variable: bool,
        open: String,
        close: String,
        mut fields: Vec<List>,
    ) -> Node {
        if is_variable {
            let default = if fields.len() > 1 {
                Some(Box::new(join_with_pipe(fields.split_off(1))))
            } else {
                None
            };
            let name = fields.pop().unwrap_or_default();
            Node::Variable(VariableNode {
                open,
                close,
                name: Box::new(name),
                default,
            })
        } else {
            Node::Template(TemplateNode { open, close, fields })
        }
    }
}

fn join_with_pipe(fields: Vec<List>) -> List {
    let mut out = List::new();
    for (i, f) in fields.into_iter().enumerate() {
        if i != 0 {
            out.push(Node::Text("|".to_owned()));
        }
        for child in f.children {
            out.push(child);
        }
    }
    out
}

fn push_text(nodes: &mut Vec<Node>, text: String) {
    if let Some(Node::Text(prev)) = nodes.last_mut() {
        prev.push_str(&text);
    } else {
        nodes.push(Node::Text(text));
    }
}

fn find_substr(chars: &[char], from: usize, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if from > chars.len() {
        return None;
    }
    let mut i = from;
    while i + needle.len() <= chars.len() {
        if chars[i..i + needle.len()] == needle[..] {
            return Some(i + needle.len());
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &str) {
        let tree = parse(s, &ParserOptions::default()).unwrap();
        assert_eq!(tree.to_text(), s);
    }

    #[test]
    fn roundtrips_plain_text() {
        roundtrip("hello world");
    }

    #[test]
    fn roundtrips_template_and_link() {
        roundtrip("[[Target|label]] and {{Template|a|b=c}}");
    }

    #[test]
    fn roundtrips_unclosed_comment_and_tags() {
        roundtrip("<!-- unterminated");
        roundtrip("text with <bogus> in it");
        roundtrip("<pre>raw content with no closer");
    }

    #[test]
    fn roundtrips_mismatched_braces() {
        roundtrip("{{{{{a}}}}}");
        roundtrip("[[[a]]]");
        roundtrip("{{a|b}}}");
    }

    #[test]
    fn s1_scenario() {
        let s = "{{a|b={{c}}}} {{{d|e<!--f--><ref>Test</ref>}}}";
        let tree = parse(s, &ParserOptions::default()).unwrap();
        assert_eq!(tree.to_text(), s);
        let children = tree.children();
        assert_eq!(children.len(), 3);
        let tpl = children[0].as_template().unwrap();
        assert_eq!(tpl.fields.len(), 2);
        assert_eq!(tpl.fields[0].to_text(), "a");
        assert_eq!(tpl.fields[1].to_text(), "b={{c}}");
        assert!(matches!(children[1], Node::Text(ref t) if t == " "));
        let var = children[2].as_variable().unwrap();
        assert_eq!(var.name.to_text(), "d");
        let default = var.default.as_ref().unwrap();
        match default.children() {
            [Node::Text(t), Node::Comment(c), Node::Tag(tag)] => {
                assert_eq!(t, "e");
                assert_eq!(c, "<!--f-->");
                assert_eq!(tag.name, "ref");
            }
            other => panic!("unexpected default children: {other:?}"),
        }
    }

    #[test]
    fn strict_mode_reports_bad_link_opener() {
        let err = parse("[[[a]]", &ParserOptions::strict()).unwrap_err();
        assert!(err.message.contains("bad link opener"));
    }

    #[test]
    fn depth_matches_nesting() {
        let tree = parse("{{a|{{b|{{c}}}}}}", &ParserOptions::default()).unwrap();
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn lenient_link_with_stray_bracket_inside() {
        // §9 "ambiguous source behavior": unsupported by the original lexer,
        // but should parse leniently as a link whose content has a stray `[`.
        let tree = parse("[[a|[b]]]", &ParserOptions::default()).unwrap();
        assert_eq!(tree.to_text(), "[[a|[b]]]");
        let link = tree.children()[0].as_link().unwrap();
        assert_eq!(link.target_and_anchor().unwrap().0, "a");
    }

    #[test]
    fn deeply_nested_tree_drops_without_overflow() {
        let mut s = String::new();
        for _ in 0..10_000 {
            s.push_str("[[");
        }
        s.push('x');
        for _ in 0..10_000 {
            s.push_str("]]");
        }
        let opts = ParserOptions {
            max_depth: 50_000,
            ..ParserOptions::default()
        };
        let tree = parse(&s, &opts).unwrap();
        drop(tree);
    }
}
