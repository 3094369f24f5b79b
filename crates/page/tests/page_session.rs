use highlight::{Anchor, DeleteTarget, EngineConfig, Selection, SpanCandidate};
use html::dom_snapshot::to_html;
use html::traverse::text_leaves;
use html::{Document, NodeId, parse_document};
use page::{Page, PageError};
use runtime_store::{MemoryBackend, StoreError, start_store_runtime};
use std::future::ready;

const DOC: &str = "<html><body><main id=main>\
<p>Highlights are stored per page.</p><p>Anchors in the url are <b>ignored</b>.</p>\
</main></body></html>";

fn leaf(doc: &Document, text: &str) -> NodeId {
    text_leaves(doc, doc.root())
        .find(|id| doc.text(*id) == Some(text))
        .unwrap()
}

fn first_paragraph(doc: &Document) -> NodeId {
    let main = doc.find_element(doc.root(), |d, n| d.attribute(n, "id") == Some("main"));
    doc.children(main.unwrap())[0]
}

#[test]
fn highlights_survive_reopening_under_another_fragment() {
    let store = start_store_runtime(MemoryBackend::new());
    let live_html = {
        let mut page = Page::open(
            parse_document(DOC),
            EngineConfig::default(),
            &store,
            ready("https://notes.test/page#first".to_string()),
        )
        .unwrap();
        assert_eq!(page.url(), "https://notes.test/page");
        let p = first_paragraph(page.document());
        page.highlight_span(
            SpanCandidate {
                container: p,
                start: 0,
                end: 10,
            },
            "yellow",
            Some("todo"),
        )
        .unwrap();
        let bold = leaf(page.document(), "ignored");
        page.highlight(
            &Selection::new(Anchor::new(bold, 0), Anchor::new(bold, 7)),
            "green",
            None,
        )
        .unwrap();
        assert_eq!(page.highlights().len(), 2);
        to_html(page.document())
    };
    store.flush().unwrap();

    let reopened = Page::open(
        parse_document(DOC),
        EngineConfig::default(),
        &store,
        ready("https://notes.test/page#second".to_string()),
    )
    .unwrap();
    assert!(reopened.restore_report().is_complete());
    assert_eq!(reopened.highlights().len(), 2);
    assert_eq!(to_html(reopened.document()), live_html);
    assert_eq!(store.categories().unwrap().recent.as_deref(), Some("todo"));
}

#[test]
fn clicking_removes_and_persists_the_removal() {
    let store = start_store_runtime(MemoryBackend::new());
    let mut page = Page::open(
        parse_document(DOC),
        EngineConfig::default(),
        &store,
        ready("https://notes.test/click".to_string()),
    )
    .unwrap();
    let p = first_paragraph(page.document());
    page.highlight_span(
        SpanCandidate {
            container: p,
            start: 11,
            end: 21,
        },
        "red",
        None,
    )
    .unwrap();
    assert_eq!(store.load("https://notes.test/click").unwrap().len(), 1);

    let outside = leaf(page.document(), "Highlights ");
    assert!(page.click(outside).unwrap().is_none());
    let inside = leaf(page.document(), "are stored");
    let removed = page.click(inside).unwrap().unwrap();
    assert_eq!(removed.removed.text_content(), "are stored");
    assert!(store.load("https://notes.test/click").unwrap().is_empty());
    assert_eq!(to_html(page.document()), to_html(&parse_document(DOC)));

    assert!(matches!(
        page.remove(DeleteTarget::Node(inside)),
        Err(PageError::Highlight(_))
    ));
}

#[test]
fn relative_url_is_rejected() {
    let store = start_store_runtime(MemoryBackend::new());
    let opened = Page::open(
        parse_document(DOC),
        EngineConfig::default(),
        &store,
        ready("page.html".to_string()),
    );
    assert!(matches!(
        opened,
        Err(PageError::Store(StoreError::InvalidUrl { .. }))
    ));
}
