#![no_main]
use libfuzzer_sys::fuzz_target;
use oxfxml::parser::{parse_sax, ParseOptions};
use oxfxml::rewrite::{url_rewrite_handler, ContextPathRewriter, RewriteOptions};
use oxfxml::serial::XmlWriter;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Rewriting arbitrary input, document or fragment, should never panic
        for fragment in [false, true] {
            let options = RewriteOptions::default().rewrite_uri("").fragment(fragment);
            let mut handler = url_rewrite_handler(
                ContextPathRewriter::new("/ctx", "/dir/page"),
                XmlWriter::new(),
                &options,
            );
            let _ = parse_sax(s, &ParseOptions::default().fragment(fragment), &mut handler);
            let _ = handler.into_inner().into_string();
        }
    }
});
