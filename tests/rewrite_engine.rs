//! End-to-end tests of the streaming rewrite engine: state stack
//! discipline, root filtering and URL rewriting from text and from trees.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use oxfxml::parser::{parse_sax, ParseOptions};
use oxfxml::rewrite::{
    url_rewrite_handler, Completion, ContextPathRewriter, DocumentRootState, RewriteOptions,
    State, StatefulHandler, Transition, UrlRewriter,
};
use oxfxml::sax::{write_node, Attributes, ContentHandler, DefaultHandler};
use oxfxml::serial::{serialize, SerializeOptions, XmlWriter};
use oxfxml::tree::{Forest, TreeBuilder};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A state that stays current for every element and records when its
/// depth unwinds to zero.
struct Nesting {
    depth: usize,
    returned: Rc<RefCell<Vec<usize>>>,
    ends: usize,
}

impl State for Nesting {
    fn depth(&self) -> usize {
        self.depth
    }

    fn depth_mut(&mut self) -> &mut usize {
        &mut self.depth
    }

    fn end_element_start(&mut self, out: &mut dyn ContentHandler, uri: &str, local: &str, qname: &str) {
        self.ends += 1;
        if self.depth == 1 {
            self.returned.borrow_mut().push(self.ends);
        }
        out.end_element(uri, local, qname);
    }
}

fn nesting() -> (Nesting, Rc<RefCell<Vec<usize>>>) {
    let returned = Rc::new(RefCell::new(Vec::new()));
    let state = Nesting {
        depth: 0,
        returned: Rc::clone(&returned),
        ends: 0,
    };
    (state, returned)
}

fn writer() -> XmlWriter {
    XmlWriter::with_options(SerializeOptions::default().xml_declaration(false))
}

// ---------------------------------------------------------------------------
// Depth symmetry
// ---------------------------------------------------------------------------

#[test]
fn test_depth_symmetry() {
    for n in [0usize, 1, 5] {
        let (mut state, returned) = nesting();
        let mut sink = DefaultHandler;
        let mut completions = Vec::new();
        for _ in 0..n {
            let t = state.handle_start_element(&mut sink, "", "x", "x", &Attributes::new());
            assert!(matches!(t, Transition::Stay));
        }
        for _ in 0..n {
            completions.push(state.handle_end_element(&mut sink, "", "x", "x"));
        }

        let returns = completions.iter().filter(|&&c| c == Completion::Return).count();
        assert_eq!(returns, usize::from(n > 0), "n = {n}");
        if n > 0 {
            assert_eq!(completions.last(), Some(&Completion::Return));
            assert_eq!(*returned.borrow(), vec![n]);
        }
        assert_eq!(state.depth(), 0);
    }
}

#[test]
fn test_depth_symmetry_through_the_stack() {
    for n in [1usize, 5] {
        let (state, _) = nesting();
        let root = DocumentRootState::with_next_state(Box::new(state));
        let mut handler = StatefulHandler::new(Box::new(root), writer());
        for _ in 0..n {
            handler.start_element("", "x", "x", &Attributes::new());
            assert_eq!(handler.stack_len(), 2);
        }
        for i in 0..n {
            assert_eq!(handler.stack_len(), 2, "popped before end {i}");
            handler.end_element("", "x", "x");
        }
        assert_eq!(handler.stack_len(), 1);
        // A stray end tag changes nothing.
        handler.end_element("", "x", "x");
        assert_eq!(handler.stack_len(), 1);

        let open = "<x>".repeat(n - 1);
        let close = "</x>".repeat(n - 1);
        assert_eq!(
            handler.into_inner().into_string(),
            format!("{open}<x/>{close}")
        );
    }
}

// ---------------------------------------------------------------------------
// Root filtering
// ---------------------------------------------------------------------------

#[test]
fn test_document_root_filters_prologue() {
    let (state, returned) = nesting();
    let root = DocumentRootState::with_next_state(Box::new(state));
    let mut handler = StatefulHandler::new(Box::new(root), writer());
    parse_sax(
        "<!--lead--><?app go?>\n<root><k/></root>\n<!--tail-->",
        &ParseOptions::default(),
        &mut handler,
    )
    .unwrap();
    assert_eq!(returned.borrow().len(), 1);
    assert_eq!(
        handler.into_inner().into_string(),
        "<?app go?>\n<root><k/></root>\n"
    );
}

// ---------------------------------------------------------------------------
// URL rewriting
// ---------------------------------------------------------------------------

const PAGE: &str = "<html xmlns=\"http://www.w3.org/1999/xhtml\" \
    xmlns:f=\"http://orbeon.org/oxf/xml/formatting\">\
    <head><link href=\"style.css\"/><script src=\"/js/app.js\">var s = 'wsrp_rewrite';</script></head>\
    <body><a href=\"?page=2\">next wsrp_rewrite</a>\
    <form><input type=\"image\" src=\"go.png\"/></form>\
    <div f:url-norewrite=\"true\"><img src=\"raw.png\"/></div>\
    </body></html>";

const REWRITTEN: &str = "<html xmlns=\"http://www.w3.org/1999/xhtml\" \
    xmlns:f=\"http://orbeon.org/oxf/xml/formatting\">\
    <head><link href=\"/shop/cart/style.css\"/><script src=\"/shop/js/app.js\">var s = 'wsrp_rewrite';</script></head>\
    <body><a href=\"/shop/cart/view?page=2\">next wsrp_rewritewsrp_rewrite</a>\
    <form action=\"\"><input type=\"image\" src=\"/shop/cart/go.png\"/></form>\
    <div><img src=\"raw.png\"/></div>\
    </body></html>\n";

#[test]
fn test_rewrites_xhtml_page() {
    let rewriter = ContextPathRewriter::new("/shop", "/cart/view");
    let mut handler = url_rewrite_handler(rewriter, writer(), &RewriteOptions::default());
    parse_sax(PAGE, &ParseOptions::default(), &mut handler).unwrap();
    assert_eq!(handler.into_inner().into_string(), REWRITTEN);
}

#[test]
fn test_rewrites_tree_into_tree() {
    let mut forest = Forest::new();
    let doc = forest.parse_str(PAGE).unwrap();

    let mut out = Forest::new();
    let rebuilt = {
        let mut handler = url_rewrite_handler(
            ContextPathRewriter::new("/shop", "/cart/view"),
            TreeBuilder::new(&mut out),
            &RewriteOptions::default(),
        );
        write_node(&forest, doc, &mut handler);
        handler.into_inner().finish().unwrap()
    };
    let root = out.root_element(rebuilt).unwrap();
    assert_eq!(format!("{}\n", serialize(&out, root)), REWRITTEN);
}

/// Marks every URL with its kind.
struct Tagging;

impl UrlRewriter for Tagging {
    fn rewrite_action_url(&self, url: &str) -> String {
        format!("action:{url}")
    }

    fn rewrite_render_url(&self, url: &str) -> String {
        format!("render:{url}")
    }

    fn rewrite_resource_url(&self, url: &str) -> String {
        format!("resource:{url}")
    }
}

#[test]
fn test_url_kinds_per_element() {
    let mut handler = url_rewrite_handler(
        Tagging,
        writer(),
        &RewriteOptions::default().rewrite_uri("").portlet(true),
    );
    parse_sax(
        "<p xmlns:f=\"http://orbeon.org/oxf/xml/formatting\">\
         <a href=\"1\"/><a href=\"2\" f:url-type=\"action\"/><area href=\"3\"/>\
         <form action=\"4\"/><img src=\"5\"/><f:rewrite url=\"6\" type=\"action\"/></p>",
        &ParseOptions::default(),
        &mut handler,
    )
    .unwrap();
    assert_eq!(
        handler.into_inner().into_string(),
        "<p xmlns:f=\"http://orbeon.org/oxf/xml/formatting\">\
         <a href=\"render:1\"/><a href=\"action:2\"/><area href=\"action:3\"/>\
         <form action=\"action:4\" method=\"post\"/><img src=\"resource:5\"/>action:6</p>\n"
    );
}

#[test]
fn test_shared_rewriter() {
    let rewriter = Rc::new(ContextPathRewriter::new("/c", "/"));
    for input in ["<a href=\"/x\"/>", "<img src=\"y\"/>"] {
        let mut handler = url_rewrite_handler(
            Rc::clone(&rewriter),
            writer(),
            &RewriteOptions::default().rewrite_uri(""),
        );
        parse_sax(input, &ParseOptions::default(), &mut handler).unwrap();
        assert!(handler.into_inner().into_string().contains("/c/"));
    }
}

// ---------------------------------------------------------------------------
// States that pass their first element on
// ---------------------------------------------------------------------------

fn rewrite_at_ctx(input: &str) -> (String, usize) {
    let mut handler = url_rewrite_handler(
        ContextPathRewriter::new("/ctx", "/"),
        writer(),
        &RewriteOptions::default().rewrite_uri(""),
    );
    parse_sax(input, &ParseOptions::default(), &mut handler).unwrap();
    let depth = handler.stack_len();
    (handler.into_inner().into_string(), depth)
}

#[test]
fn test_portlet_form_reenabled_inside_norewrite() {
    let (out, stack) = rewrite_at_ctx(
        "<div xmlns:f=\"http://orbeon.org/oxf/xml/formatting\" \
         xmlns:portlet=\"http://orbeon.org/oxf/xml/portlet\">\
         <span f:url-norewrite=\"true\">\
         <form action=\"/a\" f:url-norewrite=\"false\" portlet:is-portlet-form=\"true\">\
         <img src=\"/i\"/></form></span><img src=\"/j\"/></div>",
    );
    assert_eq!(stack, 1);
    assert_eq!(
        out,
        "<div xmlns:f=\"http://orbeon.org/oxf/xml/formatting\" \
         xmlns:portlet=\"http://orbeon.org/oxf/xml/portlet\">\
         <span><form action=\"/ctx/a\"><img src=\"/i\"/></form></span>\
         <img src=\"/ctx/j\"/></div>\n"
    );
}

#[test]
fn test_portlet_form_as_root_element() {
    let (out, stack) = rewrite_at_ctx(
        "<form xmlns:portlet=\"http://orbeon.org/oxf/xml/portlet\" action=\"/a\" \
         portlet:is-portlet-form=\"true\"><img src=\"/i\"/></form><!--tail-->",
    );
    assert_eq!(stack, 1);
    assert_eq!(
        out,
        "<form xmlns:portlet=\"http://orbeon.org/oxf/xml/portlet\" action=\"/ctx/a\">\
         <img src=\"/i\"/></form>\n"
    );
}

#[test]
fn test_norewrite_root_element() {
    let (out, stack) = rewrite_at_ctx(
        "<p xmlns:f=\"http://orbeon.org/oxf/xml/formatting\" f:url-norewrite=\"true\">\
         <a href=\"/x\"/></p>\n<!--tail-->",
    );
    assert_eq!(stack, 1);
    assert_eq!(
        out,
        "<p xmlns:f=\"http://orbeon.org/oxf/xml/formatting\"><a href=\"/x\"/></p>\n"
    );
}

#[test]
fn test_rewrite_element_reenabled_inside_norewrite() {
    let (out, stack) = rewrite_at_ctx(
        "<p xmlns:f=\"http://orbeon.org/oxf/xml/formatting\">\
         <span f:url-norewrite=\"true\">\
         <f:rewrite url=\"/d\" f:url-norewrite=\"false\">gone</f:rewrite>\
         <a href=\"/x\"/></span><a href=\"/y\"/></p>",
    );
    assert_eq!(stack, 1);
    assert_eq!(
        out,
        "<p xmlns:f=\"http://orbeon.org/oxf/xml/formatting\">\
         <span>/ctx/d<a href=\"/x\"/></span><a href=\"/ctx/y\"/></p>\n"
    );
}
