//! XML serializer.
//!
//! [`XmlWriter`] is a [`ContentHandler`] that turns an event stream into
//! markup, so it can sit at the end of a rewrite chain as well as behind
//! [`write_node`].

use std::fmt::Write;

use crate::sax::{write_node, Attributes, ContentHandler};
use crate::tree::{Forest, NodeId};

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use oxfxml::serial::{serialize_with_options, SerializeOptions};
/// use oxfxml::tree::Forest;
///
/// let mut forest = Forest::new();
/// let doc = forest.parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = serialize_with_options(&forest, doc, &SerializeOptions::default().indent(true));
/// assert!(xml.contains("\n  <child>"));
/// ```
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Whether to produce indented (pretty-printed) output.
    /// Defaults to `false`.
    pub indent: bool,
    /// The indentation string used for each level when `indent` is `true`.
    /// Defaults to two spaces.
    pub indent_str: String,
    /// Whether `start_document` writes an XML declaration. Defaults to
    /// `true`.
    pub xml_declaration: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
            xml_declaration: true,
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output.
    ///
    /// Elements holding text are never indented inside, so mixed content
    /// keeps its exact whitespace.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }

    #[must_use]
    pub fn xml_declaration(mut self, yes: bool) -> Self {
        self.xml_declaration = yes;
        self
    }
}

/// Serializes a document or subtree to an XML string.
///
/// # Examples
///
/// ```
/// use oxfxml::serial::serialize;
/// use oxfxml::tree::Forest;
///
/// let mut forest = Forest::new();
/// let doc = forest.parse_str("<root a=\"1\"><child/></root>").unwrap();
/// assert_eq!(
///     serialize(&forest, doc),
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root a=\"1\"><child/></root>\n"
/// );
/// ```
#[must_use]
pub fn serialize(forest: &Forest, node: NodeId) -> String {
    serialize_with_options(forest, node, &SerializeOptions::default())
}

/// Serializes a document or subtree with the given options.
#[must_use]
pub fn serialize_with_options(forest: &Forest, node: NodeId, options: &SerializeOptions) -> String {
    let mut writer = XmlWriter::with_options(options.clone());
    write_node(forest, node, &mut writer);
    writer.into_string()
}

#[derive(Debug, Default)]
struct Frame {
    has_text: bool,
    has_children: bool,
}

/// Streaming XML serializer.
///
/// Prefix mappings are written as `xmlns` attributes on the next start
/// tag. Elements without content are collapsed to `<name/>`.
#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
    options: SerializeOptions,
    pending_namespaces: Vec<(String, String)>,
    /// A start tag is written up to its attributes but not closed yet.
    tag_open: bool,
    frames: Vec<Frame>,
    in_document: bool,
}

impl XmlWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: SerializeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// The markup written so far. A start tag may still be unterminated.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    #[must_use]
    pub fn into_string(mut self) -> String {
        self.close_start_tag();
        self.out
    }

    fn close_start_tag(&mut self) {
        if self.tag_open {
            self.out.push('>');
            self.tag_open = false;
        }
    }

    /// Prepares for a child node: closes the parent's start tag and
    /// writes the indentation for markup children.
    fn begin_child(&mut self, is_text: bool) {
        self.close_start_tag();
        let indent = self.options.indent;
        let depth = self.frames.len();
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        frame.has_children = true;
        if is_text {
            frame.has_text = true;
            return;
        }
        if indent && !frame.has_text {
            self.out.push('\n');
            for _ in 0..depth {
                self.out.push_str(&self.options.indent_str);
            }
        }
    }

    /// Top-level nodes of a document each end a line.
    fn end_top_level(&mut self) {
        if self.frames.is_empty() && self.in_document {
            self.out.push('\n');
        }
    }
}

impl ContentHandler for XmlWriter {
    fn start_document(&mut self) {
        self.in_document = true;
        if self.options.xml_declaration {
            self.out
                .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        }
    }

    fn end_document(&mut self) {
        self.close_start_tag();
        self.in_document = false;
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.pending_namespaces
            .push((prefix.to_string(), uri.to_string()));
    }

    fn start_element(&mut self, _uri: &str, _local_name: &str, qname: &str, attributes: &Attributes) {
        self.begin_child(false);
        self.out.push('<');
        self.out.push_str(qname);
        for (prefix, uri) in std::mem::take(&mut self.pending_namespaces) {
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                let _ = write!(self.out, " xmlns:{prefix}=\"");
            }
            write_escaped_attr(&mut self.out, &uri);
            self.out.push('"');
        }
        for attr in attributes {
            self.out.push(' ');
            self.out.push_str(&attr.qname);
            self.out.push_str("=\"");
            write_escaped_attr(&mut self.out, &attr.value);
            self.out.push('"');
        }
        self.tag_open = true;
        self.frames.push(Frame::default());
    }

    fn end_element(&mut self, _uri: &str, _local_name: &str, qname: &str) {
        let frame = self.frames.pop().unwrap_or_default();
        if self.tag_open {
            self.out.push_str("/>");
            self.tag_open = false;
        } else {
            if self.options.indent && frame.has_children && !frame.has_text {
                self.out.push('\n');
                for _ in 0..self.frames.len() {
                    self.out.push_str(&self.options.indent_str);
                }
            }
            self.out.push_str("</");
            self.out.push_str(qname);
            self.out.push('>');
        }
        self.end_top_level();
    }

    fn characters(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.begin_child(true);
        write_escaped_text(&mut self.out, text);
    }

    fn ignorable_whitespace(&mut self, text: &str) {
        if self.frames.is_empty() || self.options.indent {
            return;
        }
        self.begin_child(true);
        self.out.push_str(text);
    }

    fn cdata(&mut self, text: &str) {
        self.begin_child(true);
        self.out.push_str("<![CDATA[");
        self.out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
        self.out.push_str("]]>");
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.begin_child(false);
        self.out.push_str("<?");
        self.out.push_str(target);
        if !data.is_empty() {
            self.out.push(' ');
            self.out.push_str(data);
        }
        self.out.push_str("?>");
        self.end_top_level();
    }

    fn skipped_entity(&mut self, name: &str) {
        self.begin_child(true);
        let _ = write!(self.out, "&{name};");
    }

    fn comment(&mut self, text: &str) {
        self.begin_child(false);
        self.out.push_str("<!--");
        self.out.push_str(text);
        self.out.push_str("-->");
        self.end_top_level();
    }
}

fn write_hex_char_ref(out: &mut String, ch: char) {
    let _ = write!(out, "&#x{:X};", ch as u32);
}

/// Escapes text content: markup characters as entities, carriage returns
/// and other control characters as character references.
fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}

/// Escapes a double-quoted attribute value. Whitespace other than the
/// space is written as a character reference so it survives
/// normalization.
fn write_escaped_attr(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}
