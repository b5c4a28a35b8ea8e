// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Strip inline reStructuredText markup from translated messages.
//!
//! Messages in a Sphinx catalog are single paragraphs, so only the
//! inline grammar is recognized: emphasis, strong emphasis, inline
//! literals, interpreted text with roles, references, substitutions,
//! footnotes and inline targets. The parser never fails: markup it
//! cannot close is kept as text and reported as a [`ParseWarning`].
//!
//! The spans most likely to hold code, product names or foreign words
//! (emphasis, literals, references, custom roles, ...) are dropped
//! entirely, only the remaining plain text is kept:
//!
//! ```
//! use pospell::rst::strip;
//!
//! assert_eq!(
//!     strip("Use :py:func:`len` to get the *size* of a list.")
//!         .split_whitespace()
//!         .collect::<Vec<_>>(),
//!     vec!["Use", "to", "get", "the", "of", "a", "list."],
//! );
//! ```

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Kind of an inline element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Emphasis,
    Strong,
    Literal,
    Subscript,
    Superscript,
    /// Interpreted text without a role.
    TitleReference,
    Abbreviation,
    /// Hyperlink reference, including standalone URIs and emails.
    Reference,
    FootnoteReference,
    SubstitutionReference,
    /// Inline internal target, like `` _`anchor` ``.
    Target,
    /// Interpreted text using a role which is not built in, like
    /// `:py:func:` or `:kbd:`.
    Custom(String),
}

impl ElementKind {
    /// Opaque elements are dropped together with all their content.
    pub fn is_opaque(&self) -> bool {
        match self {
            ElementKind::Emphasis
            | ElementKind::Strong
            | ElementKind::Literal
            | ElementKind::Superscript
            | ElementKind::TitleReference
            | ElementKind::Reference
            | ElementKind::FootnoteReference
            | ElementKind::Custom(_) => true,
            ElementKind::Subscript
            | ElementKind::Abbreviation
            | ElementKind::SubstitutionReference
            | ElementKind::Target => false,
        }
    }
}

/// A node in the parsed inline tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element {
        kind: ElementKind,
        children: Vec<Node>,
    },
}

/// What to do with a node when walking the tree.
#[derive(Debug, PartialEq, Eq)]
pub enum Visit<'a> {
    /// Leaf text to keep.
    Collect(&'a str),
    /// Drop the node and everything below it.
    Skip,
    /// Walk into the children.
    Descend(&'a [Node]),
}

impl Node {
    fn element(kind: ElementKind, content: &str) -> Node {
        Node::Element {
            kind,
            children: vec![Node::Text(String::from(content))],
        }
    }

    pub fn visit(&self) -> Visit<'_> {
        match self {
            Node::Text(text) => Visit::Collect(text),
            Node::Element { kind, .. } if kind.is_opaque() => Visit::Skip,
            Node::Element { children, .. } => Visit::Descend(children),
        }
    }
}

/// A recoverable problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Byte offset of the offending markup in the input.
    pub offset: usize,
    pub message: String,
}

/// Result of parsing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub nodes: Vec<Node>,
    pub warnings: Vec<ParseWarning>,
}

impl Parsed {
    /// Concatenate the kept text fragments in document order,
    /// separated by single spaces.
    pub fn text(&self) -> String {
        fn collect<'a>(nodes: &'a [Node], fragments: &mut Vec<&'a str>) {
            for node in nodes {
                match node.visit() {
                    Visit::Collect(text) => fragments.push(text),
                    Visit::Skip => {}
                    Visit::Descend(children) => collect(children, fragments),
                }
            }
        }

        let mut fragments = Vec::new();
        collect(&self.nodes, &mut fragments);
        fragments.join(" ")
    }
}

const STANDARD_ROLES: &[(&str, ElementKind)] = &[
    ("emphasis", ElementKind::Emphasis),
    ("strong", ElementKind::Strong),
    ("literal", ElementKind::Literal),
    ("code", ElementKind::Literal),
    ("subscript", ElementKind::Subscript),
    ("sub", ElementKind::Subscript),
    ("superscript", ElementKind::Superscript),
    ("sup", ElementKind::Superscript),
    ("title-reference", ElementKind::TitleReference),
    ("title", ElementKind::TitleReference),
    ("t", ElementKind::TitleReference),
    ("pep-reference", ElementKind::Reference),
    ("pep", ElementKind::Reference),
    ("rfc-reference", ElementKind::Reference),
    ("rfc", ElementKind::Reference),
    ("abbreviation", ElementKind::Abbreviation),
    ("ab", ElementKind::Abbreviation),
];

/// Maps role names to element kinds.
///
/// Starts with the standard roles. Any other role name is registered
/// the first time it is seen, as a [`ElementKind::Custom`] element.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: HashMap<String, ElementKind>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        let roles = STANDARD_ROLES
            .iter()
            .map(|(name, kind)| (String::from(*name), kind.clone()))
            .collect();
        RoleRegistry { roles }
    }
}

impl RoleRegistry {
    pub fn get(&self, name: &str) -> Option<&ElementKind> {
        self.roles.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Look up `name`, registering it as a custom role if unknown.
    pub fn resolve(&mut self, name: &str) -> ElementKind {
        let name = name.to_lowercase();
        if let Some(kind) = self.roles.get(&name) {
            return kind.clone();
        }
        log::debug!("Registering unknown role {name:?} as a generic role");
        let kind = ElementKind::Custom(name.clone());
        self.roles.insert(name, kind.clone());
        kind
    }
}

fn role_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:([A-Za-z0-9](?:[-_.:+]?[A-Za-z0-9])*):").unwrap())
}

fn footnote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(?:[0-9]+|#[A-Za-z0-9_.-]*|\*|[A-Za-z][\w.-]*)\]_").unwrap()
    })
}

fn uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?:(?:https?|ftp)://|mailto:)[^\s<>]*[^\s<>.,;:!?'")\]]"#).unwrap()
    })
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.+-]+@[\w-]+(?:\.[\w-]+)+").unwrap())
}

fn named_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w(?:[-_.+:]?\w)*__?").unwrap())
}

/// Inline markup can only start after these characters.
fn is_start_boundary(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || "-:/'\"<([{‘“«‹‚„".contains(c),
    }
}

/// Inline markup can only end before these characters.
fn is_end_boundary(next: Option<char>) -> bool {
    match next {
        None => true,
        Some(c) => c.is_whitespace() || "-.,:;!?\\/'\")]}>’”»›".contains(c),
    }
}

/// Find the end-string `delim` searching from `from`.
///
/// The `suffix` callback returns the length of any suffix following
/// the end-string (like the `_` of a reference), the end boundary is
/// checked after it. Returns the offsets of the end-string and of the
/// end of the markup.
fn find_end(
    text: &str,
    from: usize,
    delim: &str,
    suffix: impl Fn(&str) -> usize,
) -> Option<(usize, usize)> {
    let mut search = from;
    while let Some(offset) = text[search..].find(delim) {
        let idx = search + offset;
        let before = text[..idx].chars().next_back();
        if idx > from && before.is_some_and(|c| !c.is_whitespace()) {
            let after_delim = idx + delim.len();
            let markup_end = after_delim + suffix(&text[after_delim..]);
            if is_end_boundary(text[markup_end..].chars().next()) {
                return Some((idx, markup_end));
            }
        }
        search = idx + 1;
    }
    None
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().map_or(true, char::is_whitespace)
}

fn reference_suffix(after: &str) -> usize {
    if after.starts_with("__") {
        2
    } else if after.starts_with('_') {
        1
    } else {
        0
    }
}

enum Scan {
    /// Markup recognized, ending at the given offset.
    Markup(Node, usize),
    /// A start-string with no matching end-string.
    Unterminated { what: &'static str, len: usize },
    /// No markup starts here.
    Plain,
}

fn delimited(
    text: &str,
    pos: usize,
    start: &str,
    end: &str,
    kind: ElementKind,
    what: &'static str,
) -> Scan {
    let content_start = pos + start.len();
    if starts_with_whitespace(&text[content_start..]) {
        return Scan::Plain;
    }
    match find_end(text, content_start, end, |_| 0) {
        Some((content_end, markup_end)) => Scan::Markup(
            Node::element(kind, &text[content_start..content_end]),
            markup_end,
        ),
        None => Scan::Unterminated {
            what,
            len: start.len(),
        },
    }
}

/// Parses inline markup and strips it down to plain text.
///
/// The role registry lives as long as the stripper, so reusing one
/// stripper for a whole catalog registers each custom role once.
#[derive(Debug, Clone, Default)]
pub struct MarkupStripper {
    roles: RoleRegistry,
}

impl MarkupStripper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    /// Parse `text` into a tree of inline nodes.
    pub fn parse(&mut self, text: &str) -> Parsed {
        let mut nodes = Vec::new();
        let mut warnings = Vec::new();
        let mut pending = String::new();
        let mut pos = 0;

        while let Some(c) = text[pos..].chars().next() {
            if c == '\\' {
                // A backslash escapes the next character, an escaped
                // whitespace disappears.
                match text[pos + 1..].chars().next() {
                    Some(escaped) => {
                        if !escaped.is_whitespace() {
                            pending.push(escaped);
                        }
                        pos += 1 + escaped.len_utf8();
                    }
                    None => pos += 1,
                }
                continue;
            }

            if is_start_boundary(text[..pos].chars().next_back()) {
                match self.scan(text, pos) {
                    Scan::Markup(node, end) => {
                        if !pending.is_empty() {
                            nodes.push(Node::Text(std::mem::take(&mut pending)));
                        }
                        nodes.push(node);
                        pos = end;
                        continue;
                    }
                    Scan::Unterminated { what, len } => {
                        warnings.push(ParseWarning {
                            offset: pos,
                            message: format!("Inline {what} start-string without end-string."),
                        });
                        pending.push_str(&text[pos..pos + len]);
                        pos += len;
                        continue;
                    }
                    Scan::Plain => {}
                }
            }

            pending.push(c);
            pos += c.len_utf8();
        }

        if !pending.is_empty() {
            nodes.push(Node::Text(pending));
        }
        Parsed { nodes, warnings }
    }

    /// Strip markup from `text`, keeping only plain text.
    ///
    /// A trailing `::` (which introduces a literal block) is removed
    /// first. Parse warnings are logged and otherwise ignored.
    pub fn strip(&mut self, text: &str) -> String {
        let trimmed = text.trim_end();
        let text = trimmed.strip_suffix("::").unwrap_or(trimmed).trim_end();
        let parsed = self.parse(text);
        for warning in &parsed.warnings {
            log::debug!(
                "{} (at offset {} in {text:?})",
                warning.message,
                warning.offset
            );
        }
        parsed.text()
    }

    fn scan(&mut self, text: &str, pos: usize) -> Scan {
        let rest = &text[pos..];
        if rest.starts_with("``") {
            return delimited(text, pos, "``", "``", ElementKind::Literal, "literal");
        }
        if rest.starts_with("**") {
            return delimited(text, pos, "**", "**", ElementKind::Strong, "strong");
        }
        if rest.starts_with('*') {
            return delimited(text, pos, "*", "*", ElementKind::Emphasis, "emphasis");
        }
        if rest.starts_with("_`") {
            return delimited(text, pos, "_`", "`", ElementKind::Target, "target");
        }
        if rest.starts_with('`') {
            return self.interpreted(text, pos + 1, None);
        }
        if let Some(caps) = role_re().captures(rest) {
            let prefix_len = caps[0].len();
            if rest[prefix_len..].starts_with('`') {
                let role = caps.get(1).map_or("", |m| m.as_str());
                return match self.interpreted(text, pos + prefix_len + 1, Some(role)) {
                    Scan::Unterminated { what, .. } => Scan::Unterminated {
                        what,
                        len: prefix_len + 1,
                    },
                    scan => scan,
                };
            }
        }
        if rest.starts_with('|') {
            return self.substitution(text, pos);
        }
        if let Some(m) = footnote_re().find(rest) {
            if is_end_boundary(rest[m.end()..].chars().next()) {
                let node = Node::element(ElementKind::FootnoteReference, m.as_str());
                return Scan::Markup(node, pos + m.end());
            }
        }
        if let Some(m) = uri_re().find(rest).or_else(|| email_re().find(rest)) {
            let node = Node::element(ElementKind::Reference, m.as_str());
            return Scan::Markup(node, pos + m.end());
        }
        if let Some(m) = named_reference_re().find(rest) {
            if is_end_boundary(rest[m.end()..].chars().next()) {
                let node = Node::element(ElementKind::Reference, m.as_str());
                return Scan::Markup(node, pos + m.end());
            }
        }
        Scan::Plain
    }

    /// Interpreted text or phrase reference, `content_start` is just
    /// after the opening backtick.
    fn interpreted(&mut self, text: &str, content_start: usize, role: Option<&str>) -> Scan {
        if starts_with_whitespace(&text[content_start..]) {
            return Scan::Plain;
        }
        // A role given as prefix excludes a role or reference suffix.
        let suffix = |after: &str| match role {
            Some(_) => 0,
            None => match reference_suffix(after) {
                0 => role_re().find(after).map_or(0, |m| m.end()),
                len => len,
            },
        };
        let Some((content_end, markup_end)) = find_end(text, content_start, "`", suffix) else {
            return Scan::Unterminated {
                what: "interpreted text or phrase reference",
                len: 1,
            };
        };

        let content = &text[content_start..content_end];
        let suffix = &text[content_end + 1..markup_end];
        let kind = if suffix.starts_with('_') {
            ElementKind::Reference
        } else if let Some(role) = role {
            self.roles.resolve(role)
        } else if !suffix.is_empty() {
            self.roles.resolve(suffix.trim_matches(':'))
        } else {
            ElementKind::TitleReference
        };
        Scan::Markup(Node::element(kind, content), markup_end)
    }

    fn substitution(&mut self, text: &str, pos: usize) -> Scan {
        let content_start = pos + 1;
        if starts_with_whitespace(&text[content_start..]) {
            return Scan::Plain;
        }
        match find_end(text, content_start, "|", reference_suffix) {
            Some((content_end, markup_end)) => {
                let kind = if markup_end > content_end + 1 {
                    ElementKind::Reference
                } else {
                    ElementKind::SubstitutionReference
                };
                Scan::Markup(
                    Node::element(kind, &text[content_start..content_end]),
                    markup_end,
                )
            }
            None => Scan::Unterminated {
                what: "substitution_reference",
                len: 1,
            },
        }
    }
}

/// Strip markup from `text` with a fresh [`MarkupStripper`].
pub fn strip(text: &str) -> String {
    MarkupStripper::new().strip(text)
}
