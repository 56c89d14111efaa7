//! Building a tree from SAX events.

use super::{Forest, NodeId};
use crate::error::TreeError;
use crate::sax::{Attributes, ContentHandler};
use crate::util::qname::QName;

/// A [`ContentHandler`] that appends a new document to a [`Forest`].
///
/// Prefix mappings announced before a start tag become namespace nodes on
/// that element. The first structural error is kept and
/// returned by [`finish`](Self::finish).
///
/// ```
/// use oxfxml::parser::{parse_sax, ParseOptions};
/// use oxfxml::tree::{Forest, TreeBuilder};
///
/// let mut forest = Forest::new();
/// let mut builder = TreeBuilder::new(&mut forest).ignore_comments(true);
/// parse_sax("<a><!--x-->text</a>", &ParseOptions::default(), &mut builder).unwrap();
/// let doc = builder.finish().unwrap();
///
/// let root = forest.root_element(doc).unwrap();
/// assert_eq!(forest.content(root).len(), 1);
/// ```
pub struct TreeBuilder<'f> {
    forest: &'f mut Forest,
    document: NodeId,
    stack: Vec<NodeId>,
    pending_namespaces: Vec<(String, String)>,
    text: String,
    merge_adjacent_text: bool,
    strip_whitespace_text: bool,
    ignore_comments: bool,
    error: Option<TreeError>,
}

impl<'f> TreeBuilder<'f> {
    pub fn new(forest: &'f mut Forest) -> Self {
        let document = forest.create_document();
        Self {
            forest,
            document,
            stack: Vec::new(),
            pending_namespaces: Vec::new(),
            text: String::new(),
            merge_adjacent_text: true,
            strip_whitespace_text: false,
            ignore_comments: false,
            error: None,
        }
    }

    /// Joins consecutive character events into one text node.
    #[must_use]
    pub fn merge_adjacent_text(mut self, yes: bool) -> Self {
        self.merge_adjacent_text = yes;
        self
    }

    /// Drops text nodes that are only whitespace.
    #[must_use]
    pub fn strip_whitespace_text(mut self, yes: bool) -> Self {
        self.strip_whitespace_text = yes;
        self
    }

    #[must_use]
    pub fn ignore_comments(mut self, yes: bool) -> Self {
        self.ignore_comments = yes;
        self
    }

    /// The document being built.
    #[must_use]
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// Ends the build.
    ///
    /// # Errors
    ///
    /// The first `TreeError` hit while attaching nodes.
    pub fn finish(mut self) -> Result<NodeId, TreeError> {
        self.flush_text();
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self.document),
        }
    }

    fn record(&mut self, result: Result<(), TreeError>) {
        if let Err(err) = result {
            if self.error.is_none() {
                self.error = Some(err);
            }
        }
    }

    /// Attaches a leaf or element to the open element, or to the document
    /// at the top level.
    fn attach(&mut self, node: NodeId) -> Result<(), TreeError> {
        match self.stack.last() {
            Some(&parent) => self.forest.add_child(parent, node),
            None => self.forest.add_node(self.document, node),
        }
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        if self.strip_whitespace_text && text.chars().all(char::is_whitespace) {
            return;
        }
        self.append_text(text);
    }

    fn append_text(&mut self, text: String) {
        let Some(&parent) = self.stack.last() else {
            return;
        };
        let node = self.forest.create_text(text);
        let result = self.forest.add_child(parent, node);
        self.record(result);
    }
}

impl ContentHandler for TreeBuilder<'_> {
    fn set_document_locator(&mut self, system_id: Option<&str>) {
        if let Some(system_id) = system_id {
            let result = self.forest.set_name(self.document, system_id);
            self.record(result);
        }
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.pending_namespaces
            .push((prefix.to_string(), uri.to_string()));
    }

    fn start_element(&mut self, uri: &str, _local_name: &str, qname: &str, attributes: &Attributes) {
        self.flush_text();
        let namespaces = std::mem::take(&mut self.pending_namespaces);
        let el = self.forest.create_element(QName::from_parts(uri, qname));
        let result = self.attach(el);
        self.record(result);
        for (prefix, uri) in namespaces {
            let result = self.forest.add_namespace(el, &prefix, &uri).map(drop);
            self.record(result);
        }
        for attr in attributes {
            let name = QName::from_parts(&attr.uri, &attr.qname);
            let result = self.forest.add_attribute(el, name, attr.value.as_str()).map(drop);
            self.record(result);
        }
        self.stack.push(el);
    }

    fn end_element(&mut self, _uri: &str, _local_name: &str, _qname: &str) {
        self.flush_text();
        self.stack.pop();
    }

    fn characters(&mut self, text: &str) {
        if self.stack.is_empty() {
            return;
        }
        if self.merge_adjacent_text {
            self.text.push_str(text);
        } else if !(self.strip_whitespace_text && text.chars().all(char::is_whitespace)) {
            self.append_text(text.to_string());
        }
    }

    fn cdata(&mut self, text: &str) {
        self.flush_text();
        let Some(&parent) = self.stack.last() else {
            return;
        };
        let node = self.forest.create_cdata(text);
        let result = self.forest.add_child(parent, node);
        self.record(result);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.flush_text();
        let node = self.forest.create_processing_instruction(target, data);
        let result = self.attach(node);
        self.record(result);
    }

    fn comment(&mut self, text: &str) {
        self.flush_text();
        if self.ignore_comments {
            return;
        }
        let node = self.forest.create_comment(text);
        let result = self.attach(node);
        self.record(result);
    }
}
