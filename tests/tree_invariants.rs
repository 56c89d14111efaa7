//! Structural invariants of the document tree: cloning, namespace
//! bookkeeping and document ownership.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;

use oxfxml::error::TreeError;
use oxfxml::serial::serialize;
use oxfxml::tree::{ContentStorage, Forest, ForestOptions, NodeKind, UserData};
use oxfxml::util::qname::{Namespace, QName};

fn forests() -> Vec<Forest> {
    vec![
        Forest::new(),
        Forest::with_options(ForestOptions::default().storage(ContentStorage::Lazy)),
    ]
}

// ---------------------------------------------------------------------------
// Cloning
// ---------------------------------------------------------------------------

#[test]
fn test_clone_is_independent() {
    for mut forest in forests() {
        let a = forest.create_element(QName::new("a"));
        let b = forest.add_element(a, QName::new("b")).unwrap();

        let copy = forest.clone_node(a);
        assert_ne!(copy, a);
        let copied_b = forest.child_elements(copy).next().unwrap();
        assert_ne!(copied_b, b);

        assert!(forest.remove_child(copy, copied_b));
        assert_eq!(forest.child_elements(copy).count(), 0);
        assert_eq!(forest.child_elements(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(forest.parent(b), Some(a));
    }
}

#[test]
fn test_clone_has_no_tree_context() {
    let mut forest = Forest::new();
    let doc = forest.parse_str("<r><c a=\"1\">t<!--x--></c></r>").unwrap();
    let root = forest.root_element(doc).unwrap();
    let c = forest.child_elements(root).next().unwrap();

    for node in [root, c, forest.content(c)[0], forest.attributes(c)[0]] {
        let copy = forest.clone_node(node);
        assert_eq!(forest.parent(copy), None);
        assert_eq!(forest.document(copy), None);
    }
    assert_eq!(forest.document(c), Some(doc));
}

#[test]
fn test_clone_carries_inherited_namespaces() {
    let mut forest = Forest::new();
    let doc = forest
        .parse_str("<root xmlns:p=\"urn:p\" xmlns=\"urn:d\"><child/></root>")
        .unwrap();
    let root = forest.root_element(doc).unwrap();
    let child = forest.child_elements(root).next().unwrap();
    assert_eq!(forest.declared_namespaces(child).count(), 0);

    let copy = forest.clone_node(child);
    let mut declared: Vec<(String, String)> = forest
        .declared_namespaces(copy)
        .map(|ns| (ns.prefix().to_string(), ns.uri().to_string()))
        .collect();
    declared.sort();
    assert_eq!(
        declared,
        vec![
            (String::new(), "urn:d".to_string()),
            ("p".to_string(), "urn:p".to_string()),
        ]
    );
    assert_eq!(
        serialize(&forest, copy),
        "<child xmlns=\"urn:d\" xmlns:p=\"urn:p\"/>"
    );
}

#[test]
fn test_nearest_declaration_wins_on_clone() {
    let mut forest = Forest::new();
    let doc = forest
        .parse_str("<a xmlns:p=\"urn:outer\"><b xmlns:p=\"urn:inner\"><c/></b></a>")
        .unwrap();
    let c = forest
        .descendants(doc)
        .find(|&n| forest.name(n) == Some("c"))
        .unwrap();
    let copy = forest.clone_node(c);
    let declared: Vec<&Namespace> = forest.declared_namespaces(copy).collect();
    assert_eq!(declared.len(), 1);
    assert_eq!(declared[0].uri(), "urn:inner");
}

#[test]
fn test_read_only_nodes_are_shared() {
    let mut forest = Forest::new();
    let ns = forest.namespace("p", "urn:p");
    assert!(forest.is_read_only(ns));
    assert_eq!(forest.clone_node(ns), ns);
    assert_eq!(forest.namespace("p", "urn:p"), ns);
}

#[test]
fn test_clone_keeps_user_data() {
    let mut forest = Forest::new();
    let el = forest.create_element(QName::new("e"));
    forest.set_user_data(el, Some(UserData::new("payload"))).unwrap();
    let copy = forest.clone_node(el);
    let original = forest.user_data(el).unwrap();
    let copied = forest.user_data(copy).unwrap();
    assert!(original.ptr_eq(copied));
    assert_eq!(copied.downcast_ref::<&str>(), Some(&"payload"));
}

// ---------------------------------------------------------------------------
// Namespace bookkeeping on attach
// ---------------------------------------------------------------------------

#[test]
fn test_redundant_declaration_pruned_on_attach() {
    for mut forest in forests() {
        let parent = forest.create_element(QName::new("parent"));
        forest.add_namespace(parent, "p", "urn:p").unwrap();

        let child = forest.create_element(QName::with_namespace(
            "child",
            Namespace::new("p", "urn:p"),
        ));
        forest.add_namespace(child, "p", "urn:p").unwrap();
        forest.add_namespace(child, "q", "urn:q").unwrap();
        forest.add_child(parent, child).unwrap();

        let declared: Vec<&str> = forest.declared_namespaces(child).map(Namespace::prefix).collect();
        assert_eq!(declared, vec!["q"]);
        assert_eq!(
            forest.namespace_for_prefix(child, "p").map(|ns| ns.uri().to_string()),
            Some("urn:p".to_string())
        );
    }
}

#[test]
fn test_conflicting_declaration_survives_attach() {
    let mut forest = Forest::new();
    let parent = forest.create_element(QName::new("parent"));
    forest.add_namespace(parent, "p", "urn:one").unwrap();
    let child = forest.create_element(QName::new("child"));
    forest.add_namespace(child, "p", "urn:two").unwrap();
    forest.add_child(parent, child).unwrap();
    assert_eq!(forest.declared_namespaces(child).count(), 1);
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[test]
fn test_removing_root_clears_root_reference() {
    let mut forest = Forest::new();
    let doc = forest.parse_str("<?pi x?><r/>").unwrap();
    let root = forest.root_element(doc).unwrap();
    assert!(forest.remove_node(doc, root));
    assert_eq!(forest.root_element(doc), None);
    assert_eq!(forest.document(root), None);
    assert_eq!(forest.content(doc).len(), 1);

    forest.clear_content(doc);
    assert_eq!(forest.root_element(doc), None);
    assert!(forest.content(doc).is_empty());
}

#[test]
fn test_node_owned_by_other_document_is_rejected() {
    let mut forest = Forest::new();
    let doc_a = forest.parse_str("<a/><!--owned-->").unwrap();
    let comment = *forest.content(doc_a).last().unwrap();
    let doc_b = forest.parse_str("<b/>").unwrap();
    let before = forest.content(doc_b).to_vec();

    let err = forest.add_node(doc_b, comment).unwrap_err();
    assert!(matches!(err, TreeError::IllegalAdd { .. }), "{err}");
    assert_eq!(forest.content(doc_b), before.as_slice());
    assert_eq!(forest.document(comment), Some(doc_a));

    let root_a = forest.root_element(doc_a).unwrap();
    assert!(forest.set_root_element(doc_b, root_a).is_err());
    assert_eq!(forest.content(doc_b), before.as_slice());
}

#[test]
fn test_detached_node_can_move_between_documents() {
    let mut forest = Forest::new();
    let doc_a = forest.parse_str("<a/><!--moving-->").unwrap();
    let comment = *forest.content(doc_a).last().unwrap();
    let doc_b = forest.parse_str("<b/>").unwrap();

    let detached = forest.detach(comment);
    forest.add_node(doc_b, detached).unwrap();
    assert_eq!(forest.document(comment), Some(doc_b));
    assert_eq!(forest.content(doc_a).len(), 1);
    assert!(matches!(
        forest.kind(*forest.content(doc_b).last().unwrap()),
        NodeKind::Comment { .. }
    ));
}

#[test]
fn test_document_clone_round_trips() {
    for mut forest in forests() {
        let input = "<?xml-stylesheet href=\"s.xsl\"?><p:r xmlns:p=\"urn:p\" a=\"1\"><p:c>x</p:c></p:r>";
        let doc = forest.parse_str(input).unwrap();
        let copy = forest.clone_node(doc);
        assert_ne!(copy, doc);
        assert_eq!(serialize(&forest, copy), serialize(&forest, doc));

        let copied_root = forest.root_element(copy).unwrap();
        assert_eq!(forest.document(copied_root), Some(copy));
    }
}

#[test]
fn test_document_copy_of_nested_element() {
    let mut forest = Forest::new();
    let doc = forest
        .parse_str("<a xmlns:x=\"urn:x\"><b><x:c/></b></a>")
        .unwrap();
    let b = forest
        .descendants(doc)
        .find(|&n| forest.name(n) == Some("b"))
        .unwrap();
    let new_doc = forest.create_document_copy_parent_namespaces(b, false).unwrap();
    let new_root = forest.root_element(new_doc).unwrap();
    assert_eq!(
        serialize(&forest, new_root),
        "<b xmlns:x=\"urn:x\"><x:c/></b>"
    );
    // The original stays where it was.
    assert_eq!(forest.document(b), Some(doc));
}
