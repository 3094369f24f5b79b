use crate::document::Document;
use crate::tokenizer::tokenize;
use crate::types::{NodeId, Token};

/// Parse markup into a fresh [`Document`].
pub fn parse_document(input: &str) -> Document {
    build_dom(&tokenize(input))
}

/// Build a document from a token stream with a stack of open elements.
///
/// End tags close the nearest open element with the same name; an end tag
/// with no matching open element is ignored.
pub fn build_dom(tokens: &[Token]) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    let mut open_elements: Vec<NodeId> = Vec::new();

    for token in tokens {
        let parent = open_elements.last().copied().unwrap_or(root);
        match token {
            Token::Doctype(s) => doc.set_doctype(Some(s.clone())),
            Token::Comment(c) => {
                let node = doc.create_comment(c);
                attach(&mut doc, parent, node);
            }
            Token::Text(txt) => {
                if !txt.is_empty() {
                    let node = doc.create_text(txt);
                    attach(&mut doc, parent, node);
                }
            }
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let node = doc.create_element(name, attributes.clone());
                attach(&mut doc, parent, node);
                if !*self_closing {
                    open_elements.push(node);
                }
            }
            Token::EndTag(name) => {
                if let Some(pos) = open_elements
                    .iter()
                    .rposition(|id| doc.element_name(*id) == Some(name.as_str()))
                {
                    open_elements.truncate(pos);
                }
            }
        }
    }
    doc
}

fn attach(doc: &mut Document, parent: NodeId, node: NodeId) {
    // Freshly created nodes under an open element cannot form a cycle.
    if let Err(err) = doc.append_child(parent, node) {
        debug_assert!(false, "dom builder append failed: {err}");
        log::warn!(target: "html.dom_builder", "dropping node {node}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests_elements_and_keeps_whitespace() {
        let doc = parse_document("<div>\n  <p>a<b>b</b></p>\n</div>");
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.element_name(div), Some("div"));
        let kids = doc.children(div);
        assert_eq!(kids.len(), 3);
        assert_eq!(doc.text(kids[0]), Some("\n  "));
        assert_eq!(doc.element_name(kids[1]), Some("p"));
        assert_eq!(doc.children(kids[1]).len(), 2);
    }

    #[test]
    fn stray_end_tag_is_ignored() {
        let doc = parse_document("<p>a</span>b</p>c");
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 2);
        assert_eq!(doc.text(doc.children(doc.root())[1]), Some("c"));
    }

    #[test]
    fn unclosed_inner_element_is_closed_by_outer_end_tag() {
        let doc = parse_document("<p><i>a</p>b");
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(doc.root()).len(), 2);
        assert_eq!(doc.children(p).len(), 1);
    }

    #[test]
    fn doctype_is_recorded() {
        let doc = parse_document("<!DOCTYPE html><html></html>");
        assert!(matches!(
            doc.kind(doc.root()),
            Some(crate::NodeKind::Document { doctype: Some(d) }) if d == "DOCTYPE html"
        ));
    }
}
