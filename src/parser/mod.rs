//! Namespace-aware SAX2 parsing.
//!
//! Tokenizing is done by `quick-xml`; this module adds what a SAX2
//! producer is expected to do on top: namespace resolution with prefix
//! mapping events, entity expansion, text coalescing and the document-level
//! well-formedness checks (a single root, no stray text, balanced tags).

use std::borrow::Cow;

use log::trace;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ParseError, SourceLocation};
use crate::sax::{Attributes, ContentHandler};
use crate::util::qname::{split_qname, XML_NAMESPACE};

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Parse options.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use oxfxml::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .no_blanks(true)
///     .max_depth(128)
///     .system_id("file:///tmp/in.xml");
/// assert!(opts.no_blanks);
/// ```
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// If true, whitespace-only text inside elements is reported through
    /// `ignorable_whitespace` instead of `characters`.
    pub no_blanks: bool,
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
    /// If true, accept several top-level elements and top-level text.
    pub fragment: bool,
    /// System id passed to `set_document_locator`.
    pub system_id: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            no_blanks: false,
            max_depth: DEFAULT_MAX_DEPTH,
            fragment: false,
            system_id: None,
        }
    }
}

impl ParseOptions {
    /// Enables or disables reporting blank text as ignorable whitespace.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Accepts a fragment instead of a document.
    #[must_use]
    pub fn fragment(mut self, yes: bool) -> Self {
        self.fragment = yes;
        self
    }

    #[must_use]
    pub fn system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }
}

/// Parses XML from a string, firing SAX events on `handler`.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed or uses an
/// undeclared namespace prefix. Events already delivered stay delivered.
///
/// # Examples
///
/// ```
/// use oxfxml::parser::{parse_sax, ParseOptions};
/// use oxfxml::sax::DefaultHandler;
///
/// let mut handler = DefaultHandler;
/// parse_sax("<root/>", &ParseOptions::default(), &mut handler).unwrap();
/// assert!(parse_sax("<a></b>", &ParseOptions::default(), &mut handler).is_err());
/// ```
pub fn parse_sax<H: ContentHandler + ?Sized>(
    input: &str,
    options: &ParseOptions,
    handler: &mut H,
) -> Result<(), ParseError> {
    SaxParser::new(input, options, handler).parse()
}

/// Parses raw bytes, detecting and decoding the encoding first.
///
/// # Errors
///
/// Returns `ParseError` for undecodable or malformed input.
pub fn parse_bytes_sax<H: ContentHandler + ?Sized>(
    input: &[u8],
    options: &ParseOptions,
    handler: &mut H,
) -> Result<(), ParseError> {
    let text = crate::encoding::decode_to_utf8(input)?;
    parse_sax(&text, options, handler)
}

struct OpenElement {
    uri: String,
    local_name: String,
    qname: String,
    /// Prefixes this element declared, in declaration order.
    declared: usize,
}

struct SaxParser<'a, 'h, H: ?Sized> {
    input: &'a str,
    reader: Reader<&'a [u8]>,
    options: &'a ParseOptions,
    handler: &'h mut H,
    /// In-scope bindings, innermost last.
    bindings: Vec<(String, String)>,
    open: Vec<OpenElement>,
    text: String,
    seen_root: bool,
}

impl<'a, 'h, H: ContentHandler + ?Sized> SaxParser<'a, 'h, H> {
    fn new(input: &'a str, options: &'a ParseOptions, handler: &'h mut H) -> Self {
        let mut reader = Reader::from_str(input);
        let config = reader.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = true;
        Self {
            input,
            reader,
            options,
            handler,
            bindings: Vec::new(),
            open: Vec::new(),
            text: String::new(),
            seen_root: false,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let offset = usize::try_from(self.reader.buffer_position()).unwrap_or(usize::MAX);
        ParseError::new(message, SourceLocation::at(self.input, offset))
    }

    fn parse(mut self) -> Result<(), ParseError> {
        self.handler
            .set_document_locator(self.options.system_id.as_deref());
        self.handler.start_document();

        loop {
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(err) => return Err(self.error(err.to_string())),
            };
            match event {
                Event::Start(e) => {
                    self.flush_text();
                    self.start_element(&e)?;
                }
                Event::End(_) => {
                    self.flush_text();
                    self.end_element();
                }
                Event::Empty(e) => {
                    self.flush_text();
                    self.start_element(&e)?;
                    self.end_element();
                }
                Event::Text(e) => {
                    let raw = self.utf8(&e)?;
                    let text = unescape(raw).map_err(|err| self.error(err.to_string()))?;
                    let text = normalize_line_endings(&text).into_owned();
                    self.push_text(&text)?;
                }
                Event::CData(e) => {
                    self.require_open("CDATA section")?;
                    self.flush_text();
                    let text = self.utf8(&e)?.to_string();
                    self.handler.cdata(&normalize_line_endings(&text));
                }
                Event::GeneralRef(e) => {
                    let name = self.utf8(&e)?.to_string();
                    self.general_ref(&name)?;
                }
                Event::Comment(e) => {
                    self.flush_text();
                    let text = self.utf8(&e)?.to_string();
                    self.handler.comment(&normalize_line_endings(&text));
                }
                Event::PI(e) => {
                    self.flush_text();
                    let target = self.utf8(e.target())?.to_string();
                    let data = self.utf8(e.content())?.trim_start().to_string();
                    self.handler.processing_instruction(&target, &data);
                }
                Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        self.flush_text();
        if let Some(open) = self.open.last() {
            return Err(self.error(format!("unclosed element <{}>", open.qname)));
        }
        if !self.seen_root && !self.options.fragment {
            return Err(self.error("no root element"));
        }
        self.handler.end_document();
        Ok(())
    }

    fn utf8<'b>(&self, bytes: &'b [u8]) -> Result<&'b str, ParseError> {
        std::str::from_utf8(bytes).map_err(|err| self.error(err.to_string()))
    }

    fn require_open(&self, what: &str) -> Result<(), ParseError> {
        if self.open.is_empty() && !self.options.fragment {
            return Err(self.error(format!("{what} outside the root element")));
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str) -> Result<(), ParseError> {
        if self.open.is_empty() && text.chars().all(char::is_whitespace) {
            return Ok(());
        }
        self.require_open("text")?;
        self.text.push_str(text);
        Ok(())
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        if self.options.no_blanks && text.chars().all(char::is_whitespace) {
            self.handler.ignorable_whitespace(&text);
        } else {
            self.handler.characters(&text);
        }
    }

    fn general_ref(&mut self, name: &str) -> Result<(), ParseError> {
        if let Some(number) = name.strip_prefix('#') {
            let code = match number.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => number.parse::<u32>().ok(),
            };
            let Some(ch) = code.and_then(char::from_u32) else {
                return Err(self.error(format!("invalid character reference &{name};")));
            };
            let mut buf = [0u8; 4];
            return self.push_text(ch.encode_utf8(&mut buf));
        }
        if let Some(text) = resolve_predefined_entity(name) {
            return self.push_text(text);
        }
        self.require_open("entity reference")?;
        self.flush_text();
        self.handler.skipped_entity(name);
        Ok(())
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn start_element(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        if self.open.is_empty() {
            if self.seen_root && !self.options.fragment {
                return Err(self.error("content after the root element"));
            }
            self.seen_root = true;
        }
        if self.open.len() >= self.options.max_depth as usize {
            return Err(self.error(format!(
                "maximum nesting depth of {} exceeded",
                self.options.max_depth
            )));
        }

        let qname = self.utf8(e.name().as_ref())?.to_string();
        let mut declared = Vec::new();
        let mut raw_attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.error(err.to_string()))?;
            let key = self.utf8(attr.key.as_ref())?.to_string();
            let raw = self.utf8(&attr.value)?;
            let value = unescape(raw)
                .map_err(|err| self.error(err.to_string()))?
                .into_owned();
            if key == "xmlns" {
                declared.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                if value.is_empty() {
                    return Err(self.error(format!("prefix {prefix} bound to an empty URI")));
                }
                if prefix == "xmlns" || (prefix == "xml" && value != XML_NAMESPACE) {
                    return Err(self.error(format!("reserved prefix {prefix} cannot be rebound")));
                }
                declared.push((prefix.to_string(), value));
            } else {
                raw_attributes.push((key, value));
            }
        }

        for (prefix, uri) in &declared {
            self.handler.start_prefix_mapping(prefix, uri);
        }
        let declared_count = declared.len();
        self.bindings.extend(declared);

        let (prefix, local) = split_qname(&qname);
        let uri = match prefix {
            Some(p) => self
                .resolve(p)
                .ok_or_else(|| self.error(format!("unbound namespace prefix {p}")))?,
            None => self.resolve("").unwrap_or(""),
        }
        .to_string();
        let local = local.to_string();

        let mut attributes = Attributes::new();
        for (key, value) in raw_attributes {
            let (attr_prefix, attr_local) = split_qname(&key);
            let attr_uri = match attr_prefix {
                Some(p) => self
                    .resolve(p)
                    .ok_or_else(|| self.error(format!("unbound namespace prefix {p}")))?,
                None => "",
            }
            .to_string();
            if attributes.index_of(&attr_uri, attr_local).is_some() {
                return Err(self.error(format!("duplicate attribute {key}")));
            }
            let attr_local = attr_local.to_string();
            attributes.add(attr_uri, attr_local, key, value);
        }

        trace!("start element {qname} at depth {}", self.open.len());
        self.handler.start_element(&uri, &local, &qname, &attributes);
        self.open.push(OpenElement {
            uri,
            local_name: local,
            qname,
            declared: declared_count,
        });
        Ok(())
    }

    fn end_element(&mut self) {
        let Some(open) = self.open.pop() else {
            return;
        };
        self.handler
            .end_element(&open.uri, &open.local_name, &open.qname);
        for _ in 0..open.declared {
            if let Some((prefix, _)) = self.bindings.pop() {
                self.handler.end_prefix_mapping(&prefix);
            }
        }
    }
}

fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
