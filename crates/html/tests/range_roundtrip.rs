use html::dom_snapshot::{DomSnapshotOptions, assert_dom_eq, to_html};
use html::traverse::flattened_text;
use html::{
    Bias, Document, NodeId, PathOptions, WrapperSpec, leaf_position_at, parse_document,
    resolve_structural_path, structural_path, unwrap_span, wrap_span,
};

const ARTICLE: &str = "<html><body><article id=post>\
<p>An element receives a <code>click</code> event when a pointing device button \
(such as a <a href='#'>mouse's primary <i>mouse button</i></a>) is both pressed and \
released while the pointer is <strong>located inside</strong> the element.</p>\
<p>If the button is <em>pressed on one element</em> and moved outside.</p>\
</article></body></html>";

const MARK: &str = "data-highlight-id";

fn exact() -> DomSnapshotOptions {
    DomSnapshotOptions {
        coalesce_text: false,
        ..DomSnapshotOptions::default()
    }
}

fn paragraph(doc: &Document, n: usize) -> NodeId {
    let path = html::StructuralPath::parse(&format!("#post>p:nth-of-type({n})")).unwrap();
    resolve_structural_path(doc, &path, &PathOptions::ignoring(MARK)).unwrap()
}

fn wrap(doc: &mut Document, container: NodeId, start: usize, end: usize, id: &str) -> NodeId {
    let s = leaf_position_at(doc, container, start, Bias::Forward).unwrap();
    let e = leaf_position_at(doc, container, end, Bias::Backward).unwrap();
    let spec = WrapperSpec::new("span").with_attribute(MARK, id);
    wrap_span(doc, s, e, &spec).unwrap()
}

#[test]
fn wraps_keep_text_and_paths_stable() {
    let mut doc = parse_document(ARTICLE);
    let p1 = paragraph(&doc, 1);
    let p2 = paragraph(&doc, 2);
    let text_before = flattened_text(&doc, p1);
    let opts = PathOptions::ignoring(MARK);
    let path_before = structural_path(&doc, p2, &opts).unwrap();

    let a = wrap(&mut doc, p1, 22, 27, "a");
    let b = wrap(&mut doc, p1, 85, 130, "b");
    assert_eq!(flattened_text(&doc, a), "click");
    assert_eq!(flattened_text(&doc, b), &text_before[85..130]);
    assert_eq!(flattened_text(&doc, p1), text_before);
    assert_eq!(structural_path(&doc, p2, &opts).unwrap(), path_before);
    assert_eq!(paragraph(&doc, 1), p1);
}

#[test]
fn unwrapping_in_any_order_restores_the_tree_exactly() {
    let pristine = parse_document(ARTICLE);
    for order in [[0, 1, 2], [2, 1, 0], [1, 0, 2]] {
        let mut doc = parse_document(ARTICLE);
        let p1 = paragraph(&doc, 1);
        let p2 = paragraph(&doc, 2);
        let wrappers = [
            wrap(&mut doc, p1, 3, 40, "a"),
            wrap(&mut doc, p1, 80, 120, "b"),
            wrap(&mut doc, p2, 10, 30, "c"),
        ];
        assert_ne!(to_html(&doc), to_html(&pristine));
        for i in order {
            let outcome = unwrap_span(&mut doc, wrappers[i]).unwrap();
            assert!(outcome.conflicts.is_empty());
            assert!(!outcome.nodes.is_empty());
        }
        assert_dom_eq(&pristine, &doc, exact());
        assert_eq!(to_html(&doc), to_html(&pristine));
    }
}

#[test]
fn wrap_spanning_nested_inline_elements() {
    let mut doc = parse_document(ARTICLE);
    let p1 = paragraph(&doc, 1);
    let text = flattened_text(&doc, p1);
    let start = text.find("primary").unwrap();
    let end = text.find(" is both").unwrap();
    let wrapper = wrap(&mut doc, p1, start, end, "x");
    assert_eq!(flattened_text(&doc, wrapper), "primary mouse button)");
    let html = to_html(&doc);
    assert!(html.contains(
        "<a href=\"#\">mouse's </a><span data-highlight-id=\"x\"><a href=\"#\">primary \
<i>mouse button</i></a>)</span> is both"
    ));
}
