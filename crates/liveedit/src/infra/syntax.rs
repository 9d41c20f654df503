//! Error-recovering JSX/TSX parsing built on tree-sitter.
//!
//! Both the stamping pass and the patch engine go through this module, so the
//! element positions they compute always agree: [`source_position`] is the one
//! place the `(line, column)` convention lives.

use std::ops::{ControlFlow, Range};

use tree_sitter::{Language, Node, Parser, Tree};

use crate::domain::errors::ParseError;
use crate::domain::location::SourcePosition;

const ELEMENT: &str = "jsx_element";
const SELF_CLOSING_ELEMENT: &str = "jsx_self_closing_element";
const ATTRIBUTE: &str = "jsx_attribute";
const COMMENT: &str = "comment";
const TEXT_KINDS: &[&str] = &["jsx_text", "html_character_reference"];

/// Grammar used for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// JavaScript with JSX.
    Jsx,
    /// TypeScript with JSX.
    Tsx,
    /// Plain TypeScript. `<T>x` is a type assertion here, never markup.
    TypeScript,
}

impl Dialect {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "tsx" => Dialect::Tsx,
            "ts" | "mts" | "cts" => Dialect::TypeScript,
            _ => Dialect::Jsx,
        }
    }

    fn language(self) -> Language {
        match self {
            Dialect::Jsx => tree_sitter_javascript::LANGUAGE.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }
}

/// Canonical 1-based position of `node` within `source`.
///
/// Lines come from the parser's row. Columns count UTF-16 code units between
/// the start of the line and the node, plus one; tabs count as one unit.
pub fn source_position(node: Node<'_>, source: &str) -> SourcePosition {
    let start = node.start_byte();
    let point = node.start_position();
    let line_start = start.saturating_sub(point.column);
    let prefix = source.get(line_start..start).unwrap_or_default();
    let units = prefix.encode_utf16().count();

    SourcePosition {
        line: saturating_u32(point.row).saturating_add(1),
        column: saturating_u32(units).saturating_add(1),
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// A parsed source file. Never outlives the text it was parsed from.
pub struct SyntaxTree<'s> {
    tree: Tree,
    source: &'s str,
}

impl<'s> SyntaxTree<'s> {
    /// Parse `source`. Syntax errors are recovered from; only a parser that
    /// cannot produce any tree is reported as an error.
    pub fn parse(dialect: Dialect, source: &'s str) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&dialect.language())
            .map_err(|err| ParseError::Language(err.to_string()))?;
        let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;
        Ok(Self { tree, source })
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Depth-first, pre-order traversal of every node. Returning
    /// [`ControlFlow::Break`] stops the walk immediately.
    pub fn walk<'t, B>(
        &'t self,
        mut visit: impl FnMut(Node<'t>) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        let mut cursor = self.tree.walk();
        loop {
            if let ControlFlow::Break(value) = visit(cursor.node()) {
                return ControlFlow::Break(value);
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return ControlFlow::Continue(());
                }
            }
        }
    }

    /// [`SyntaxTree::walk`] restricted to element nodes.
    pub fn visit_elements<'t, B>(
        &'t self,
        mut visit: impl FnMut(ElementNode<'t>) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        self.walk(|node| match ElementNode::from_node(node) {
            Some(element) => visit(element),
            None => ControlFlow::Continue(()),
        })
    }

    /// All elements in document order.
    pub fn elements(&self) -> Vec<ElementNode<'_>> {
        let mut elements = Vec::new();
        let _ = self.visit_elements(|element| {
            elements.push(element);
            ControlFlow::<()>::Continue(())
        });
        elements
    }

    /// The element whose opening tag starts at `position`, if any.
    pub fn element_at(&self, position: SourcePosition) -> Option<ElementNode<'_>> {
        let source = self.source;
        match self.visit_elements(|element| {
            if element.position(source) == position {
                ControlFlow::Break(element)
            } else {
                ControlFlow::Continue(())
            }
        }) {
            ControlFlow::Break(element) => Some(element),
            ControlFlow::Continue(()) => None,
        }
    }
}

/// An element with a named opening tag: `<p>..</p>` or `<img />`.
///
/// For paired elements the node is the whole element, so its children
/// (including text) are directly reachable. Its start is the start of the
/// opening tag, which is what positions are computed from.
#[derive(Debug, Clone, Copy)]
pub struct ElementNode<'t> {
    node: Node<'t>,
    opening: Node<'t>,
}

impl<'t> ElementNode<'t> {
    /// Wrap `node` if it is an element. Fragments (`<>..</>`) have no tag
    /// name and are not elements.
    pub fn from_node(node: Node<'t>) -> Option<Self> {
        let opening = match node.kind() {
            ELEMENT => node.child_by_field_name("open_tag")?,
            SELF_CLOSING_ELEMENT => node,
            _ => return None,
        };
        opening.child_by_field_name("name")?;
        Some(Self { node, opening })
    }

    pub fn node(&self) -> Node<'t> {
        self.node
    }

    pub fn position(&self, source: &str) -> SourcePosition {
        source_position(self.node, source)
    }

    pub fn is_self_closing(&self) -> bool {
        self.node.kind() == SELF_CLOSING_ELEMENT
    }

    /// Whether the opening tag itself contains syntax errors.
    pub fn opening_has_error(&self) -> bool {
        self.opening.has_error() || self.opening.is_missing()
    }

    pub fn has_error(&self) -> bool {
        self.node.has_error()
    }

    pub fn tag_name<'s>(&self, source: &'s str) -> &'s str {
        self.opening
            .child_by_field_name("name")
            .and_then(|name| source.get(name.byte_range()))
            .unwrap_or_default()
    }

    /// Attribute names in source order. Spread attributes are not listed.
    pub fn attribute_names<'s>(&self, source: &'s str) -> Vec<&'s str> {
        let mut cursor = self.opening.walk();
        self.opening
            .named_children(&mut cursor)
            .filter(|child| child.kind() == ATTRIBUTE)
            .filter_map(|attribute| {
                let mut inner = attribute.walk();
                let name = attribute.named_children(&mut inner).next()?;
                source.get(name.byte_range())
            })
            .collect()
    }

    pub fn has_attribute(&self, source: &str, name: &str) -> bool {
        self.attribute_names(source).contains(&name)
    }

    /// Byte offset right after the tag name or the last attribute, where a
    /// new attribute is appended. Comments inside the tag are stepped over so
    /// the attribute never lands inside a `//` comment.
    pub fn attribute_insertion_offset(&self) -> usize {
        let mut cursor = self.opening.walk();
        self.opening
            .named_children(&mut cursor)
            .filter(|child| child.kind() != COMMENT)
            .last()
            .map_or_else(|| self.opening.start_byte() + 1, |child| child.end_byte())
    }

    /// Byte span of the first text child among the direct children.
    ///
    /// Consecutive text nodes form one run, trimmed of surrounding whitespace
    /// so indentation survives a replacement. A body that is empty or only
    /// whitespace, with no nested nodes, is an implicit empty text child
    /// covering the whole body. Returns `None` when the element has no text
    /// to replace.
    pub fn text_slot(&self, source: &str) -> Option<Range<usize>> {
        if self.is_self_closing() {
            return None;
        }
        let close = self.node.child_by_field_name("close_tag")?;
        let body = self.opening.end_byte()..close.start_byte();

        let mut run: Option<Range<usize>> = None;
        let mut nested = false;
        let mut cursor = self.node.walk();
        for child in self.node.named_children(&mut cursor) {
            if child.id() == self.opening.id() || child.id() == close.id() {
                continue;
            }
            if TEXT_KINDS.contains(&child.kind()) {
                if let Some(span) = trimmed_span(child.byte_range(), source) {
                    match run.as_mut() {
                        Some(current) => current.end = span.end,
                        None => run = Some(span),
                    }
                }
            } else {
                nested = true;
                if run.is_some() {
                    break;
                }
            }
        }

        if run.is_some() {
            return run;
        }
        let body_text = source.get(body.clone())?;
        (!nested && trim_jsx_whitespace(body_text).is_empty()).then_some(body)
    }

    /// Current text of the first text child, if any.
    pub fn text<'s>(&self, source: &'s str) -> Option<&'s str> {
        self.text_slot(source).and_then(|span| source.get(span))
    }
}

/// JSX only collapses ASCII whitespace; characters such as U+00A0 are text.
fn is_jsx_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

fn trim_jsx_whitespace(text: &str) -> &str {
    text.trim_matches(is_jsx_whitespace)
}

fn trimmed_span(range: Range<usize>, source: &str) -> Option<Range<usize>> {
    let text = source.get(range.clone())?;
    let trimmed = trim_jsx_whitespace(text);
    if trimmed.is_empty() {
        return None;
    }
    let leading = text.len() - text.trim_start_matches(is_jsx_whitespace).len();
    let start = range.start + leading;
    Some(start..start + trimmed.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SyntaxTree<'_> {
        SyntaxTree::parse(Dialect::Tsx, source).expect("tsx parses")
    }

    #[test]
    fn positions_are_one_based() {
        let source = "export function A() {\n  return (\n    <p>Hello</p>\n  );\n}\n";
        let tree = parse(source);
        let elements = tree.elements();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].position(source), SourcePosition::new(3, 5));
        assert_eq!(elements[0].tag_name(source), "p");
    }

    #[test]
    fn columns_count_utf16_units() {
        let source = "const s = \"😀\"; const x = <b>hi</b>;\n";
        let tree = SyntaxTree::parse(Dialect::Jsx, source).unwrap();
        let element = tree.elements()[0];
        assert_eq!(element.position(source), SourcePosition::new(1, 27));
    }

    #[test]
    fn visits_nested_elements_in_document_order() {
        let source = "const v = <ul>\n  <li>a</li>\n  <li>b</li>\n  <img />\n</ul>;\n";
        let tree = parse(source);
        let tags: Vec<_> = tree
            .elements()
            .iter()
            .map(|element| element.tag_name(source))
            .collect();
        assert_eq!(tags, ["ul", "li", "li", "img"]);
    }

    #[test]
    fn fragments_are_not_elements() {
        let source = "const v = <>\n  <span>x</span>\n</>;\n";
        let tree = parse(source);
        let elements = tree.elements();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].tag_name(source), "span");
    }

    #[test]
    fn element_at_stops_on_match() {
        let source = "const v = <div><b>one</b><i>two</i></div>;\n";
        let tree = parse(source);
        let column = source.find("<i>").unwrap() as u32 + 1;
        let element = tree
            .element_at(SourcePosition::new(1, column))
            .expect("element found");
        assert_eq!(element.tag_name(source), "i");
        assert!(tree.element_at(SourcePosition::new(1, 2)).is_none());
    }

    #[test]
    fn walk_breaks_early() {
        let source = "const v = <div><b>one</b><i>two</i></div>;\n";
        let tree = parse(source);
        let mut seen = 0;
        let result = tree.visit_elements(|_| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(seen)
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(result, ControlFlow::Break(2));
        assert_eq!(seen, 2);
    }

    #[test]
    fn lists_attributes_in_order() {
        let source = "const v = <a href=\"/\" data-edit-id=\"x\" {...rest} target=\"_blank\">go</a>;\n";
        let tree = parse(source);
        let element = tree.elements()[0];
        assert_eq!(
            element.attribute_names(source),
            ["href", "data-edit-id", "target"]
        );
        assert!(element.has_attribute(source, "data-edit-id"));
        assert!(!element.has_attribute(source, "id"));
    }

    #[test]
    fn insertion_offset_follows_last_attribute() {
        let source = "const v = <img src=\"a.png\" />;\n";
        let tree = parse(source);
        let element = tree.elements()[0];
        let offset = element.attribute_insertion_offset();
        assert_eq!(&source[..offset], "const v = <img src=\"a.png\"");
    }

    #[test]
    fn text_slot_trims_whitespace_and_joins_lines() {
        let source = "const v = (\n  <p>\n    Hello\n    world\n  </p>\n);\n";
        let tree = parse(source);
        let element = tree.elements()[0];
        assert_eq!(element.text(source), Some("Hello\n    world"));
    }

    #[test]
    fn insertion_offset_steps_over_trailing_comment() {
        let source = "const v = (\n  <p\n    className=\"x\" // note\n  >Hello</p>\n);\n";
        let tree = SyntaxTree::parse(Dialect::Jsx, source).unwrap();
        let element = tree.elements()[0];
        let offset = element.attribute_insertion_offset();
        assert!(source[..offset].ends_with("className=\"x\""));
        assert_eq!(element.attribute_names(source), ["className"]);
    }

    #[test]
    fn text_slot_keeps_non_breaking_space() {
        let source = "const v = <p>\u{a0}Hello </p>;\n";
        let tree = parse(source);
        let element = tree.elements()[0];
        assert_eq!(element.text(source), Some("\u{a0}Hello"));
    }

    #[test]
    fn plain_typescript_reads_angle_brackets_as_assertions() {
        assert_eq!(Dialect::from_extension("ts"), Dialect::TypeScript);
        assert_eq!(Dialect::from_extension("TSX"), Dialect::Tsx);
        assert_eq!(Dialect::from_extension("jsx"), Dialect::Jsx);

        let source = "const n = <number>value;\n";
        let tree = SyntaxTree::parse(Dialect::TypeScript, source).unwrap();
        assert!(!tree.has_errors());
        assert!(tree.elements().is_empty());
    }

    #[test]
    fn text_slot_skips_leading_nested_elements() {
        let source = "const v = <p><b>bold</b> tail</p>;\n";
        let tree = parse(source);
        let element = tree.elements()[0];
        assert_eq!(element.text(source), Some("tail"));
    }

    #[test]
    fn empty_body_is_an_empty_text_slot() {
        let source = "const v = <p></p>;\n";
        let tree = parse(source);
        let element = tree.elements()[0];
        let slot = element.text_slot(source).expect("slot");
        assert!(slot.is_empty());
        assert_eq!(slot.start, source.find("</p>").unwrap());
    }

    #[test]
    fn nested_only_and_self_closing_have_no_slot() {
        let source = "const v = (\n  <div>\n    <span>x</span>\n  </div>\n);\nconst w = <br />;\n";
        let tree = parse(source);
        let elements = tree.elements();
        assert_eq!(elements[0].tag_name(source), "div");
        assert!(elements[0].text_slot(source).is_none());
        assert_eq!(elements[2].tag_name(source), "br");
        assert!(elements[2].text_slot(source).is_none());
    }

    #[test]
    fn recovers_from_syntax_errors() {
        let source = "const broken = ;\nconst v = <p>still here</p>;\n";
        let tree = parse(source);
        assert!(tree.has_errors());
        let elements = tree.elements();
        assert!(elements.iter().any(|element| element.tag_name(source) == "p"));
    }
}
