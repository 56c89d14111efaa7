#![no_main]
use libfuzzer_sys::fuzz_target;
use oxfxml::serial::serialize;
use oxfxml::Forest;

fuzz_target!(|data: &[u8]| {
    let mut forest = Forest::new();
    // Parse -> clone -> serialize -> parse should never panic
    if let Ok(doc) = forest.parse_bytes(data) {
        let copy = forest.clone_node(doc);
        let output = serialize(&forest, doc);
        let _ = serialize(&forest, copy);
        let _ = forest.parse_str(&output);
        if let Some(root) = forest.root_element(doc) {
            for el in forest.descendants(root).collect::<Vec<_>>() {
                if forest.is_element(el) {
                    let _ = forest.clone_node(el);
                }
            }
        }
    }
});
