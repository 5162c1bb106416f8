//! Wikicode tree traversal (§4.1 "Traversal"): a depth-first walk over a
//! [`List`](super::List), in either prefix or postfix order, optionally
//! filtered to one [`Node`](super::Node) variant, with ancestor context at
//! each visited node.

use super::{List, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Visit a node before its descendants.
    Prefix,
    /// Visit a node after its descendants (safe for mutating descendants
    /// during the walk, since they're already visited by the time a parent is).
    Postfix,
}

/// One visited node plus its ancestor chain, innermost first.
pub struct TraversalItem<'a> {
    node: &'a Node,
    ancestors: Vec<&'a Node>,
    indices: Vec<usize>,
}

impl<'a> TraversalItem<'a> {
    pub fn node(&self) -> &'a Node {
        self.node
    }

    /// How many ancestors this node has (0 for a direct child of the root list).
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// The `k`-th ancestor, counting from the immediate parent (`k == 0`).
    pub fn ancestor(&self, k: usize) -> Option<&'a Node> {
        let n = self.ancestors.len();
        if k >= n {
            None
        } else {
            Some(self.ancestors[n - 1 - k])
        }
    }

    /// This node's index among its `k`-th ancestor's direct children (or,
    /// for the immediate parent's field/content list, the index of the
    /// field/content list itself within that ancestor).
    pub fn index_in_ancestor(&self, k: usize) -> Option<usize> {
        let n = self.indices.len();
        if k >= n {
            None
        } else {
            Some(self.indices[n - 1 - k])
        }
    }
}

/// Walk `root` in `order`, calling `visit` for every node, optionally
/// restricted to nodes for which `filter` returns `true`.
pub struct Traverser<'a> {
    root: &'a List,
    order: Order,
    filter: Option<fn(&Node) -> bool>,
}

impl<'a> Traverser<'a> {
    pub fn new(root: &'a List, order: Order) -> Self {
        Self {
            root,
            order,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: fn(&Node) -> bool) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn for_each(&self, mut visit: impl FnMut(TraversalItem<'a>)) {
        let mut ancestors = Vec::new();
        let mut indices = Vec::new();
        walk_list(
            self.root,
            self.order,
            self.filter,
            &mut ancestors,
            &mut indices,
            &mut visit,
        );
    }
}

fn walk_list<'a>(
    list: &'a List,
    order: Order,
    filter: Option<fn(&Node) -> bool>,
    ancestors: &mut Vec<&'a Node>,
    indices: &mut Vec<usize>,
    visit: &mut dyn FnMut(TraversalItem<'a>),
) {
    for (i, node) in list.children().iter().enumerate() {
        let matches = filter.map_or(true, |f| f(node));

        if order == Order::Prefix && matches {
            visit(TraversalItem {
                node,
                ancestors: ancestors.clone(),
                indices: push_clone(indices, i),
            });
        }

        ancestors.push(node);
        indices.push(i);
        match node {
            Node::Tag(t) => {
                if let Some(content) = &t.content {
                    walk_list(content, order, filter, ancestors, indices, visit);
                }
            }
            Node::Link(l) => {
                for field in &l.fields {
                    walk_list(field, order, filter, ancestors, indices, visit);
                }
            }
            Node::Template(t) => {
                for field in &t.fields {
                    walk_list(field, order, filter, ancestors, indices, visit);
                }
            }
            Node::Variable(v) => {
                walk_list(&v.name, order, filter, ancestors, indices, visit);
                if let Some(default) = &v.default {
                    walk_list(default, order, filter, ancestors, indices, visit);
                }
            }
            Node::Text(_) | Node::Comment(_) => {}
        }
        indices.pop();
        ancestors.pop();

        if order == Order::Postfix && matches {
            visit(TraversalItem {
                node,
                ancestors: ancestors.clone(),
                indices: push_clone(indices, i),
            });
        }
    }
}

fn push_clone(indices: &[usize], i: usize) -> Vec<usize> {
    let mut v = indices.to_vec();
    v.push(i);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, ParserOptions};

    #[test]
    fn prefix_visits_outer_before_inner() {
        let tree = parse("{{a|{{b}}}}", &ParserOptions::default()).unwrap();
        let mut seen = Vec::new();
        Traverser::new(&tree, Order::Prefix)
            .with_filter(|n| matches!(n, Node::Template(_)))
            .for_each(|item| seen.push(item.node().as_template().unwrap().name()));
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn postfix_visits_inner_before_outer() {
        let tree = parse("{{a|{{b}}}}", &ParserOptions::default()).unwrap();
        let mut seen = Vec::new();
        Traverser::new(&tree, Order::Postfix)
            .with_filter(|n| matches!(n, Node::Template(_)))
            .for_each(|item| seen.push(item.node().as_template().unwrap().name()));
        assert_eq!(seen, vec!["b", "a"]);
    }

    #[test]
    fn ancestor_context_reports_immediate_parent() {
        let tree = parse("{{a|{{b}}}}", &ParserOptions::default()).unwrap();
        let mut depths = Vec::new();
        Traverser::new(&tree, Order::Prefix)
            .with_filter(|n| matches!(n, Node::Template(_)))
            .for_each(|item| depths.push(item.depth()));
        assert_eq!(depths, vec![0, 1]);
    }
}
