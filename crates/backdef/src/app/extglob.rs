//! Single-segment matcher for bash-style extended globs.
//!
//! Supports `*`, `?`, bracket expressions and the `?(..)`, `*(..)`, `+(..)`,
//! `@(..)`, `!(..)` operators with `|`-separated alternatives. Matching is
//! plain backtracking; segments are file names, so inputs stay short.

use crate::app::pattern::class_end;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Char(char),
    AnyChar,
    AnyString,
    Class { negated: bool, items: Vec<(char, char)> },
    Ext { op: char, alternatives: Vec<Vec<Node>> },
}

/// Compiled extended glob for one path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtGlob {
    nodes: Vec<Node>,
}

impl ExtGlob {
    pub fn new(raw: &str) -> Self {
        let chars: Vec<char> = raw.chars().collect();
        Self {
            nodes: parse(&chars),
        }
    }

    pub fn is_match(&self, name: &str) -> bool {
        let chars: Vec<char> = name.chars().collect();
        match_nodes(&self.nodes, &chars)
    }
}

fn parse(chars: &[char]) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '?' | '*' | '+' | '@' | '!') && chars.get(i + 1) == Some(&'(') {
            if let Some(close) = group_end(chars, i + 1) {
                let alternatives = split_alternatives(&chars[i + 2..close])
                    .into_iter()
                    .map(parse)
                    .collect();
                nodes.push(Node::Ext { op: c, alternatives });
                i = close + 1;
                continue;
            }
        }
        match c {
            '\\' => {
                nodes.push(Node::Char(chars.get(i + 1).copied().unwrap_or('\\')));
                i += 2;
                continue;
            }
            '*' => nodes.push(Node::AnyString),
            '?' => nodes.push(Node::AnyChar),
            '[' => {
                if let Some(end) = class_end(chars, i) {
                    nodes.push(parse_class(&chars[i + 1..end]));
                    i = end + 1;
                    continue;
                }
                nodes.push(Node::Char('['));
            }
            other => nodes.push(Node::Char(other)),
        }
        i += 1;
    }
    nodes
}

/// Index of the `)` matching the `(` at `open`.
fn group_end(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_alternatives(chars: &[char]) -> Vec<&[char]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                parts.push(&chars[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&chars[start..]);
    parts
}

fn parse_class(body: &[char]) -> Node {
    let mut i = 0;
    let negated = matches!(body.first(), Some('!' | '^'));
    if negated {
        i += 1;
    }
    let mut items = Vec::new();
    while i < body.len() {
        let mut low = body[i];
        if low == '\\' && i + 1 < body.len() {
            i += 1;
            low = body[i];
        }
        if body.get(i + 1) == Some(&'-') && i + 2 < body.len() {
            let high = body[i + 2];
            items.push((low, high));
            i += 3;
        } else {
            items.push((low, low));
            i += 1;
        }
    }
    Node::Class { negated, items }
}

fn match_nodes(nodes: &[Node], input: &[char]) -> bool {
    let Some((node, rest)) = nodes.split_first() else {
        return input.is_empty();
    };
    match node {
        Node::Char(expected) => {
            input.first() == Some(expected) && match_nodes(rest, &input[1..])
        }
        Node::AnyChar => !input.is_empty() && match_nodes(rest, &input[1..]),
        Node::AnyString => (0..=input.len()).any(|k| match_nodes(rest, &input[k..])),
        Node::Class { negated, items } => input.first().is_some_and(|c| {
            let hit = items.iter().any(|(low, high)| low <= c && c <= high);
            hit != *negated
        }) && match_nodes(rest, &input[1..]),
        Node::Ext { op, alternatives } => (0..=input.len()).any(|k| {
            ext_matches(*op, alternatives, &input[..k]) && match_nodes(rest, &input[k..])
        }),
    }
}

fn ext_matches(op: char, alternatives: &[Vec<Node>], chunk: &[char]) -> bool {
    let any = |part: &[char]| alternatives.iter().any(|alt| match_nodes(alt, part));
    match op {
        '@' => any(chunk),
        '?' => chunk.is_empty() || any(chunk),
        '+' => repeated(alternatives, chunk),
        '*' => chunk.is_empty() || repeated(alternatives, chunk),
        '!' => !any(chunk),
        _ => false,
    }
}

/// One or more consecutive alternative matches covering `chunk`.
fn repeated(alternatives: &[Vec<Node>], chunk: &[char]) -> bool {
    if chunk.is_empty() {
        return alternatives.iter().any(|alt| match_nodes(alt, chunk));
    }
    (1..=chunk.len()).any(|k| {
        alternatives.iter().any(|alt| match_nodes(alt, &chunk[..k]))
            && (k == chunk.len() || repeated(alternatives, &chunk[k..]))
    })
}
