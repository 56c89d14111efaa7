//! URL rewriting for XHTML-like output.
//!
//! [`RewriteState`] rewrites link, form and resource attributes through a
//! [`UrlRewriter`] and escapes `wsrp_rewrite` in text. [`NoRewriteState`]
//! copies a subtree as is. Elements switch between the two with the
//! `f:url-norewrite` attribute from [`FORMATTING_NAMESPACE`].

use std::rc::Rc;

use log::debug;

use super::{DocumentRootState, FragmentRootState, State, StatefulHandler, Transition};
use crate::sax::{Attributes, ContentHandler};
use crate::util::qname::XHTML_NAMESPACE;

/// Namespace of the `url-type` and `url-norewrite` attributes and of the
/// `rewrite` element.
pub const FORMATTING_NAMESPACE: &str = "http://orbeon.org/oxf/xml/formatting";

/// Namespace of the `is-portlet-form` attribute.
pub const PORTLET_NAMESPACE: &str = "http://orbeon.org/oxf/xml/portlet";

const WSRP_REWRITE: &str = "wsrp_rewrite";
const WSRP_REWRITE_ESCAPED: &str = "wsrp_rewritewsrp_rewrite";

/// Turns the URLs found in a page into URLs the client can follow.
pub trait UrlRewriter {
    /// URL of a form submission or other state-changing request.
    fn rewrite_action_url(&self, url: &str) -> String;

    /// URL of a page view.
    fn rewrite_render_url(&self, url: &str) -> String;

    /// URL of a static resource such as an image or script.
    fn rewrite_resource_url(&self, url: &str) -> String;
}

impl<T: UrlRewriter + ?Sized> UrlRewriter for Rc<T> {
    fn rewrite_action_url(&self, url: &str) -> String {
        (**self).rewrite_action_url(url)
    }

    fn rewrite_render_url(&self, url: &str) -> String {
        (**self).rewrite_render_url(url)
    }

    fn rewrite_resource_url(&self, url: &str) -> String {
        (**self).rewrite_resource_url(url)
    }
}

/// Resolves URLs against a servlet-style context path and request path.
///
/// | input          | output                                 |
/// |----------------|----------------------------------------|
/// | `http://x/y`   | unchanged                              |
/// | `#top`, empty  | unchanged                              |
/// | `/a/b`         | context path + `/a/b`                  |
/// | `?q=1`         | context path + request path + `?q=1`   |
/// | `b.png`        | context path + request directory + `b.png` |
///
/// All three URL kinds resolve the same way.
///
/// ```
/// use oxfxml::rewrite::{ContextPathRewriter, UrlRewriter};
///
/// let rewriter = ContextPathRewriter::new("/app", "/pages/home.xhtml");
/// assert_eq!(rewriter.rewrite_render_url("/about"), "/app/about");
/// assert_eq!(rewriter.rewrite_action_url("?go=1"), "/app/pages/home.xhtml?go=1");
/// assert_eq!(rewriter.rewrite_resource_url("logo.png"), "/app/pages/logo.png");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPathRewriter {
    context_path: String,
    request_path: String,
}

impl ContextPathRewriter {
    /// A trailing `/` on the context path is dropped and the request path
    /// is made absolute.
    pub fn new(context_path: impl Into<String>, request_path: impl Into<String>) -> Self {
        let mut context_path = context_path.into();
        while context_path.ends_with('/') {
            context_path.pop();
        }
        let mut request_path = request_path.into();
        if !request_path.starts_with('/') {
            request_path.insert(0, '/');
        }
        Self {
            context_path,
            request_path,
        }
    }

    #[must_use]
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    #[must_use]
    pub fn request_path(&self) -> &str {
        &self.request_path
    }

    /// The request path up to and including its last `/`.
    fn request_directory(&self) -> &str {
        match self.request_path.rfind('/') {
            Some(i) => &self.request_path[..=i],
            None => "/",
        }
    }

    fn resolve(&self, url: &str) -> String {
        if url.is_empty() || url.starts_with('#') || url.starts_with("//") || has_scheme(url) {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{url}", self.context_path)
        } else if url.starts_with('?') {
            format!("{}{}{url}", self.context_path, self.request_path)
        } else {
            format!("{}{}{url}", self.context_path, self.request_directory())
        }
    }
}

impl UrlRewriter for ContextPathRewriter {
    fn rewrite_action_url(&self, url: &str) -> String {
        self.resolve(url)
    }

    fn rewrite_render_url(&self, url: &str) -> String {
        self.resolve(url)
    }

    fn rewrite_resource_url(&self, url: &str) -> String {
        self.resolve(url)
    }
}

/// `scheme ":"` where scheme is `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
fn has_scheme(url: &str) -> bool {
    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = &url[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Settings for [`url_rewrite_handler`] and the rewrite states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Namespace of the elements whose attributes are rewritten. The empty
    /// string selects un-namespaced HTML.
    pub rewrite_uri: String,
    /// Forms get `method="post"` when they have no method.
    pub portlet: bool,
    /// The input is a sequence of elements rather than a document.
    pub fragment: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            rewrite_uri: XHTML_NAMESPACE.to_string(),
            portlet: false,
            fragment: false,
        }
    }
}

impl RewriteOptions {
    #[must_use]
    pub fn rewrite_uri(mut self, uri: impl Into<String>) -> Self {
        self.rewrite_uri = uri.into();
        self
    }

    #[must_use]
    pub fn portlet(mut self, yes: bool) -> Self {
        self.portlet = yes;
        self
    }

    #[must_use]
    pub fn fragment(mut self, yes: bool) -> Self {
        self.fragment = yes;
        self
    }
}

/// Builds the full rewriting chain in front of `sink`.
///
/// ```
/// use oxfxml::parser::{parse_sax, ParseOptions};
/// use oxfxml::rewrite::{url_rewrite_handler, ContextPathRewriter, RewriteOptions};
/// use oxfxml::serial::{SerializeOptions, XmlWriter};
///
/// let writer = XmlWriter::with_options(SerializeOptions::default().xml_declaration(false));
/// let rewriter = ContextPathRewriter::new("/app", "/index.html");
/// let options = RewriteOptions::default().rewrite_uri("");
/// let mut handler = url_rewrite_handler(rewriter, writer, &options);
///
/// parse_sax("<p><a href=\"/x\">x</a></p>", &ParseOptions::default(), &mut handler).unwrap();
/// assert_eq!(
///     handler.into_inner().into_string(),
///     "<p><a href=\"/app/x\">x</a></p>\n"
/// );
/// ```
pub fn url_rewrite_handler<R, H>(rewriter: R, sink: H, options: &RewriteOptions) -> StatefulHandler<H>
where
    R: UrlRewriter + 'static,
    H: ContentHandler,
{
    let next: Box<dyn State> = Box::new(RewriteState::new(rewriter, options));
    let root: Box<dyn State> = if options.fragment {
        Box::new(FragmentRootState::with_next_state(next))
    } else {
        Box::new(DocumentRootState::with_next_state(next))
    };
    StatefulHandler::new(root, sink)
}

/// Shared by every state of one rewrite.
struct Context {
    rewriter: Box<dyn UrlRewriter>,
    rewrite_uri: String,
    portlet: bool,
}

impl Context {
    fn new(rewriter: impl UrlRewriter + 'static, options: &RewriteOptions) -> Rc<Self> {
        Rc::new(Self {
            rewriter: Box::new(rewriter),
            rewrite_uri: options.rewrite_uri.clone(),
            portlet: options.portlet,
        })
    }

    fn is_script(&self, uri: &str, local_name: &str) -> bool {
        uri == self.rewrite_uri && local_name == "script"
    }

    fn rewrite(&self, kind: UrlKind, url: &str) -> String {
        let rewritten = match kind {
            UrlKind::Action => self.rewriter.rewrite_action_url(url),
            UrlKind::Render => self.rewriter.rewrite_render_url(url),
            UrlKind::Resource => self.rewriter.rewrite_resource_url(url),
        };
        debug!("{kind:?} url {url:?} -> {rewritten:?}");
        rewritten
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlKind {
    Action,
    Render,
    Resource,
}

/// Elements whose attribute holds a resource URL.
const RESOURCE_ATTRIBUTES: &[(&str, &str)] = &[
    ("link", "href"),
    ("img", "src"),
    ("frame", "src"),
    ("iframe", "src"),
    ("script", "src"),
    ("td", "background"),
    ("body", "background"),
];

fn flag(attributes: &Attributes, uri: &str, local_name: &str) -> Option<bool> {
    match attributes.value(uri, local_name) {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Copies the attributes that are in no namespace.
fn unqualified(attributes: &Attributes) -> Attributes {
    let mut out = Attributes::new();
    for attr in attributes.iter().filter(|a| a.uri.is_empty()) {
        out.add("", &attr.local_name, &attr.qname, attr.value.as_str());
    }
    out
}

/// Copies the attributes, leaving out the rewrite control attributes.
fn without_controls(attributes: &Attributes) -> Attributes {
    let mut out = Attributes::new();
    for attr in attributes
        .iter()
        .filter(|a| a.uri != FORMATTING_NAMESPACE && a.uri != PORTLET_NAMESPACE)
    {
        out.add(&attr.uri, &attr.local_name, &attr.qname, attr.value.as_str());
    }
    out
}

/// Rewrites URLs in the elements of the rewrite namespace.
///
/// Text is held back until the next markup event so that `wsrp_rewrite`
/// can be escaped across split character events. Inside `script` text is
/// forwarded right away and left untouched.
pub struct RewriteState {
    depth: usize,
    context: Rc<Context>,
    script_depth: usize,
    text: String,
}

impl RewriteState {
    pub fn new(rewriter: impl UrlRewriter + 'static, options: &RewriteOptions) -> Self {
        Self::with_context(Context::new(rewriter, options), 0)
    }

    fn with_context(context: Rc<Context>, script_depth: usize) -> Self {
        Self {
            depth: 0,
            context,
            script_depth,
            text: String::new(),
        }
    }

    fn flush_text(&mut self, out: &mut dyn ContentHandler) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        if text.contains(WSRP_REWRITE) {
            out.characters(&text.replace(WSRP_REWRITE, WSRP_REWRITE_ESCAPED));
        } else {
            out.characters(&text);
        }
    }

    /// Start tag of an element in the rewrite namespace that carries a URL.
    /// Returns `None` when the element has no URL to rewrite.
    fn rewrite_start(
        &self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Option<Transition> {
        let context = &*self.context;
        let (attribute, kind) = match local_name {
            "a" => {
                attributes.value("", "href")?;
                let kind = match attributes.value(FORMATTING_NAMESPACE, "url-type") {
                    None | Some("render") => Some(UrlKind::Render),
                    Some("action") => Some(UrlKind::Action),
                    Some("resource") => Some(UrlKind::Resource),
                    Some(_) => None,
                };
                let mut rewritten = unqualified(attributes);
                match kind {
                    Some(kind) => {
                        let href = context.rewrite(kind, attributes.value("", "href")?);
                        rewritten.set_value("", "href", href);
                    }
                    None => {
                        rewritten.remove("", "href");
                    }
                }
                out.start_element(uri, local_name, qname, &rewritten);
                return Some(Transition::Stay);
            }
            "form" => return Some(self.rewrite_form(out, uri, local_name, qname, attributes)),
            "area" => ("href", UrlKind::Action),
            "input" if attributes.value("", "type") == Some("image") => ("src", UrlKind::Resource),
            _ => {
                let (_, attribute) = RESOURCE_ATTRIBUTES
                    .iter()
                    .find(|(element, _)| *element == local_name)?;
                (*attribute, UrlKind::Resource)
            }
        };
        let url = attributes.value("", attribute)?;
        let mut rewritten = unqualified(attributes);
        rewritten.set_value("", attribute, context.rewrite(kind, url));
        out.start_element(uri, local_name, qname, &rewritten);
        Some(Transition::Stay)
    }

    fn rewrite_form(
        &self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Transition {
        let context = &*self.context;
        let mut rewritten = unqualified(attributes);
        match attributes.value("", "action") {
            Some(action) => rewritten.set_value("", "action", context.rewrite(UrlKind::Action, action)),
            None => rewritten.add_plain("action", context.rewrite(UrlKind::Action, "")),
        }
        if context.portlet && attributes.value("", "method").is_none() {
            rewritten.add_plain("method", "post");
        }
        out.start_element(uri, local_name, qname, &rewritten);
        if flag(attributes, PORTLET_NAMESPACE, "is-portlet-form") == Some(true) {
            Transition::Enter(Box::new(NoRewriteState::with_context(
                Rc::clone(&self.context),
                self.script_depth,
            )))
        } else {
            Transition::Stay
        }
    }
}

impl State for RewriteState {
    fn depth(&self) -> usize {
        self.depth
    }

    fn depth_mut(&mut self) -> &mut usize {
        &mut self.depth
    }

    fn start_element_start(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Transition {
        self.flush_text(out);
        if flag(attributes, FORMATTING_NAMESPACE, "url-norewrite") == Some(true) {
            return Transition::Delegate(Box::new(NoRewriteState::with_context(
                Rc::clone(&self.context),
                self.script_depth,
            )));
        }
        if uri == FORMATTING_NAMESPACE && local_name == "rewrite" {
            if let Some(url) = attributes.value("", "url") {
                let kind = match attributes.value("", "type") {
                    Some("action") => UrlKind::Action,
                    Some("render") => UrlKind::Render,
                    _ => UrlKind::Resource,
                };
                out.characters(&self.context.rewrite(kind, url));
            }
            return Transition::Enter(Box::new(DropState::default()));
        }
        if self.context.is_script(uri, local_name) {
            self.script_depth += 1;
        }
        if uri == self.context.rewrite_uri {
            if let Some(transition) = self.rewrite_start(out, uri, local_name, qname, attributes) {
                return transition;
            }
        }
        out.start_element(uri, local_name, qname, &without_controls(attributes));
        Transition::Stay
    }

    fn end_element_start(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) {
        self.flush_text(out);
        if self.context.is_script(uri, local_name) {
            self.script_depth = self.script_depth.saturating_sub(1);
        }
        out.end_element(uri, local_name, qname);
    }

    fn characters(&mut self, out: &mut dyn ContentHandler, text: &str) {
        if self.script_depth > 0 {
            out.characters(text);
        } else {
            self.text.push_str(text);
        }
    }

    fn ignorable_whitespace(&mut self, out: &mut dyn ContentHandler, text: &str) {
        self.flush_text(out);
        out.ignorable_whitespace(text);
    }

    fn cdata(&mut self, out: &mut dyn ContentHandler, text: &str) {
        self.flush_text(out);
        out.cdata(text);
    }

    fn processing_instruction(&mut self, out: &mut dyn ContentHandler, target: &str, data: &str) {
        self.flush_text(out);
        out.processing_instruction(target, data);
    }

    fn skipped_entity(&mut self, out: &mut dyn ContentHandler, name: &str) {
        self.flush_text(out);
        out.skipped_entity(name);
    }

    fn comment(&mut self, out: &mut dyn ContentHandler, text: &str) {
        self.flush_text(out);
        out.comment(text);
    }
}

/// Copies a subtree without touching URLs or text.
///
/// Only the rewrite control attributes and other namespaced attributes are
/// dropped. An element with `f:url-norewrite="false"` goes back to
/// rewriting for its subtree.
pub struct NoRewriteState {
    depth: usize,
    context: Rc<Context>,
    script_depth: usize,
}

impl NoRewriteState {
    pub fn new(rewriter: impl UrlRewriter + 'static, options: &RewriteOptions) -> Self {
        Self::with_context(Context::new(rewriter, options), 0)
    }

    fn with_context(context: Rc<Context>, script_depth: usize) -> Self {
        Self {
            depth: 0,
            context,
            script_depth,
        }
    }
}

impl State for NoRewriteState {
    fn depth(&self) -> usize {
        self.depth
    }

    fn depth_mut(&mut self) -> &mut usize {
        &mut self.depth
    }

    fn start_element_start(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Transition {
        if flag(attributes, FORMATTING_NAMESPACE, "url-norewrite") == Some(false) {
            return Transition::Delegate(Box::new(RewriteState::with_context(
                Rc::clone(&self.context),
                self.script_depth,
            )));
        }
        if self.context.is_script(uri, local_name) {
            self.script_depth += 1;
        }
        out.start_element(uri, local_name, qname, &unqualified(attributes));
        Transition::Stay
    }

    fn end_element_start(
        &mut self,
        out: &mut dyn ContentHandler,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) {
        if self.context.is_script(uri, local_name) {
            self.script_depth = self.script_depth.saturating_sub(1);
        }
        out.end_element(uri, local_name, qname);
    }
}

/// Swallows an element and everything inside it.
#[derive(Default)]
struct DropState {
    depth: usize,
}

impl State for DropState {
    fn depth(&self) -> usize {
        self.depth
    }

    fn depth_mut(&mut self) -> &mut usize {
        &mut self.depth
    }

    fn start_element_start(
        &mut self,
        _out: &mut dyn ContentHandler,
        _uri: &str,
        _local_name: &str,
        _qname: &str,
        _attributes: &Attributes,
    ) -> Transition {
        Transition::Stay
    }

    fn end_element_start(&mut self, _out: &mut dyn ContentHandler, _uri: &str, _local: &str, _qname: &str) {}

    fn start_prefix_mapping(&mut self, _out: &mut dyn ContentHandler, _prefix: &str, _uri: &str) {}

    fn end_prefix_mapping(&mut self, _out: &mut dyn ContentHandler, _prefix: &str) {}

    fn characters(&mut self, _out: &mut dyn ContentHandler, _text: &str) {}

    fn ignorable_whitespace(&mut self, _out: &mut dyn ContentHandler, _text: &str) {}

    fn cdata(&mut self, _out: &mut dyn ContentHandler, _text: &str) {}

    fn processing_instruction(&mut self, _out: &mut dyn ContentHandler, _target: &str, _data: &str) {}

    fn skipped_entity(&mut self, _out: &mut dyn ContentHandler, _name: &str) {}

    fn comment(&mut self, _out: &mut dyn ContentHandler, _text: &str) {}
}
