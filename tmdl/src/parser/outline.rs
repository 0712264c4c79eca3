use std::ops::Range;

use crate::parser::lexer::{Assignment, LineKind, LineToken};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The declaration tree of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    pub objects: Vec<OutlineNode>,
}

/// A declared object and the objects nested under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub keyword: String,
    pub name: String,
    pub depth: usize,
    /// Lines from the declaration through the last non-blank line it owns.
    pub lines: Range<usize>,
    pub children: Vec<OutlineNode>,
}

impl Outline {
    /// Depth-first search for the first object with this keyword and name.
    pub fn find(&self, keyword: &str, name: &str) -> Option<&OutlineNode> {
        fn walk<'a>(nodes: &'a [OutlineNode], keyword: &str, name: &str) -> Option<&'a OutlineNode> {
            for node in nodes {
                if node.keyword == keyword && node.name == name {
                    return Some(node);
                }
                if let Some(found) = walk(&node.children, keyword, name) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.objects, keyword, name)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Build the declaration tree with an indentation stack.
///
/// A declaration closes every open object at the same or deeper depth; any
/// other non-blank line closes only objects deeper than itself. Objects whose
/// header opens an expression (`=` at end of line, or a partition kind) own
/// everything indented beneath them as body text, so declarations-looking
/// lines inside an expression never become children.
pub fn parse_outline(tokens: &[LineToken]) -> Outline {
    let mut state = OutlineState::default();
    for token in tokens {
        state.process(token);
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OutlineState {
    stack: Vec<NodeBuilder>,
    top: Vec<OutlineNode>,
}

struct NodeBuilder {
    keyword: String,
    name: String,
    depth: usize,
    start: usize,
    last: usize,
    accepts_children: bool,
    children: Vec<OutlineNode>,
}

impl NodeBuilder {
    fn into_node(self) -> OutlineNode {
        OutlineNode {
            keyword: self.keyword,
            name: self.name,
            depth: self.depth,
            lines: self.start..self.last + 1,
            children: self.children,
        }
    }
}

impl OutlineState {
    fn process(&mut self, token: &LineToken) {
        if token.is_blank() {
            return;
        }

        let header = token.header();

        // Deeper lines under an expression object are body text.
        if let Some(open) = self.stack.last() {
            if !open.accepts_children && token.depth > open.depth {
                self.touch(token.index);
                return;
            }
        }

        // Descriptions belong to the declaration that follows them.
        if matches!(token.kind, LineKind::Description) {
            return;
        }

        let closes_same_depth = header.is_some();
        self.close_to_depth(token.depth, closes_same_depth);

        if let Some(header) = header {
            let accepts_children = !matches!(
                header.assignment,
                Assignment::Open | Assignment::Kind(_) | Assignment::Inline(_)
            );
            self.stack.push(NodeBuilder {
                keyword: header.keyword.clone(),
                name: header.name.clone(),
                depth: token.depth,
                start: token.index,
                last: token.index,
                accepts_children,
                children: Vec::new(),
            });
        } else if matches!(token.kind, LineKind::Property(_) | LineKind::Other) {
            self.touch(token.index);
        }
    }

    /// Extend every open object through line `index`.
    fn touch(&mut self, index: usize) {
        for builder in &mut self.stack {
            builder.last = index;
        }
    }

    /// Pop objects deeper than `depth` (and at `depth` when `inclusive`).
    fn close_to_depth(&mut self, depth: usize, inclusive: bool) {
        while let Some(top) = self.stack.last() {
            let closes = top.depth > depth || (inclusive && top.depth == depth);
            if !closes {
                break;
            }
            let Some(builder) = self.stack.pop() else {
                break;
            };
            self.attach(builder.into_node());
        }
    }

    fn attach(&mut self, node: OutlineNode) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        } else {
            self.top.push(node);
        }
    }

    fn finalize(mut self) -> Outline {
        while let Some(builder) = self.stack.pop() {
            self.attach(builder.into_node());
        }
        Outline { objects: self.top }
    }
}
