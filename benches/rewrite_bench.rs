#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use oxfxml::parser::{parse_sax, ParseOptions};
use oxfxml::rewrite::{url_rewrite_handler, ContextPathRewriter, RewriteOptions};
use oxfxml::sax::{Attributes, ContentHandler};
use oxfxml::serial::{serialize, XmlWriter};
use oxfxml::Forest;

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates an XHTML page with `rows` table rows full of links and images.
fn make_page(rows: usize) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\
         <head><link href=\"style.css\"/><script src=\"/app.js\">var a = 1;</script></head>\
         <body><form><table>\n",
    );
    for i in 0..rows {
        let _ = writeln!(
            xml,
            "  <tr><td background=\"bg{i}.png\"><a href=\"item?id={i}\">Item {i} wsrp_rewrite</a></td>\
             <td><img src=\"/img/{i}.png\" alt=\"{i}\"/></td></tr>"
        );
    }
    xml.push_str("</table></form></body></html>\n");
    xml
}

/// Generates a namespace-heavy document with nested scopes.
fn make_namespaced(depth: usize) -> String {
    let mut xml = String::new();
    for i in 0..depth {
        let _ = write!(xml, "<p{i}:e xmlns:p{i}=\"urn:ns{i}\" xmlns=\"urn:default\">");
    }
    xml.push_str("<leaf/>");
    for i in (0..depth).rev() {
        let _ = write!(xml, "</p{i}:e>");
    }
    xml
}

// ---------------------------------------------------------------------------
// Rewrite benchmarks
// ---------------------------------------------------------------------------

/// Counts events, so the rewrite cost is measured without serialization.
#[derive(Default)]
struct CountingHandler {
    elements: u64,
    characters: u64,
}

impl ContentHandler for CountingHandler {
    fn start_element(&mut self, _uri: &str, _local: &str, _qname: &str, _atts: &Attributes) {
        self.elements += 1;
    }

    fn characters(&mut self, _text: &str) {
        self.characters += 1;
    }
}

fn bench_parse_only(c: &mut Criterion) {
    let xml = make_page(500);
    c.bench_function("parse_page", |b| {
        b.iter(|| {
            let mut handler = CountingHandler::default();
            parse_sax(black_box(&xml), &ParseOptions::default(), &mut handler)
                .expect("parse failed");
            handler.elements
        });
    });
}

fn bench_rewrite_counting(c: &mut Criterion) {
    let xml = make_page(500);
    let options = RewriteOptions::default();
    c.bench_function("rewrite_page_counting", |b| {
        b.iter(|| {
            let mut handler = url_rewrite_handler(
                ContextPathRewriter::new("/ctx", "/dir/page"),
                CountingHandler::default(),
                &options,
            );
            parse_sax(black_box(&xml), &ParseOptions::default(), &mut handler)
                .expect("rewrite failed");
            handler.into_inner().characters
        });
    });
}

fn bench_rewrite_serialized(c: &mut Criterion) {
    let xml = make_page(500);
    let options = RewriteOptions::default();
    c.bench_function("rewrite_page_serialized", |b| {
        b.iter(|| {
            let mut handler = url_rewrite_handler(
                ContextPathRewriter::new("/ctx", "/dir/page"),
                XmlWriter::new(),
                &options,
            );
            parse_sax(black_box(&xml), &ParseOptions::default(), &mut handler)
                .expect("rewrite failed");
            handler.into_inner().into_string()
        });
    });
}

// ---------------------------------------------------------------------------
// Tree benchmarks
// ---------------------------------------------------------------------------

fn bench_clone_page(c: &mut Criterion) {
    let mut forest = Forest::new();
    let doc = forest.parse_str(&make_page(200)).expect("parse failed");
    let root = forest.root_element(doc).expect("no root");
    c.bench_function("clone_page", |b| {
        b.iter(|| forest.clone_node(black_box(root)));
    });
}

fn bench_clone_namespaced_leaf(c: &mut Criterion) {
    let mut forest = Forest::new();
    let doc = forest.parse_str(&make_namespaced(64)).expect("parse failed");
    let leaf = forest
        .descendants(doc)
        .find(|&n| forest.name(n) == Some("leaf"))
        .expect("no leaf");
    c.bench_function("clone_namespaced_leaf", |b| {
        b.iter(|| forest.clone_node(black_box(leaf)));
    });
}

fn bench_serialize_page(c: &mut Criterion) {
    let mut forest = Forest::new();
    let doc = forest.parse_str(&make_page(500)).expect("parse failed");
    c.bench_function("serialize_page", |b| {
        b.iter(|| serialize(&forest, black_box(doc)));
    });
}

criterion_group!(
    benches,
    bench_parse_only,
    bench_rewrite_counting,
    bench_rewrite_serialized,
    bench_clone_page,
    bench_clone_namespaced_leaf,
    bench_serialize_page,
);
criterion_main!(benches);
