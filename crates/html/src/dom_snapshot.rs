use crate::document::Document;
use crate::tokenizer::is_void_element;
use crate::types::{NodeId, NodeKind};
use std::borrow::Cow;
use std::fmt::{self, Write};

/// Deterministic DOM rendering and equality rules for tests and round-trip
/// checks.
///
/// Equivalence rules:
/// - Node kinds must match.
/// - Element names must match.
/// - Attribute list order is significant; names and values must match.
/// - Text must match exactly (post entity decode). With `coalesce_text`,
///   runs of adjacent text leaves compare as one string.
/// - Comments and doctypes must match exactly.
/// - Node ids are ignored unless `ignore_ids` is off.
#[derive(Clone, Copy, Debug)]
pub struct DomSnapshotOptions {
    pub ignore_ids: bool,
    pub coalesce_text: bool,
}

impl Default for DomSnapshotOptions {
    fn default() -> Self {
        Self {
            ignore_ids: true,
            coalesce_text: true,
        }
    }
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(doc: &Document, root: NodeId, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk_snapshot(doc, View::Node(root), &options, 0, &mut lines);
        Self { lines }
    }

    pub fn of_document(doc: &Document, options: DomSnapshotOptions) -> Self {
        Self::new(doc, doc.root(), options)
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug)]
pub struct DomMismatch {
    path: String,
    detail: String,
    expected: String,
    actual: String,
}

impl DomMismatch {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for DomMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DOM mismatch at {}: {}", self.path, self.detail)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        Ok(())
    }
}

impl std::error::Error for DomMismatch {}

pub fn assert_dom_eq(expected: &Document, actual: &Document, options: DomSnapshotOptions) {
    if let Err(mismatch) = compare_dom(expected, actual, options) {
        panic!(
            "{mismatch}expected tree:\n{}\nactual tree:\n{}",
            DomSnapshot::of_document(expected, options),
            DomSnapshot::of_document(actual, options)
        );
    }
}

pub fn compare_dom(
    expected: &Document,
    actual: &Document,
    options: DomSnapshotOptions,
) -> Result<(), Box<DomMismatch>> {
    let mut path = vec!["#document".to_string()];
    let pair = Pair { expected, actual };
    compare_nodes(&pair, View::Node(expected.root()), View::Node(actual.root()), &options, &mut path)
}

struct Pair<'a> {
    expected: &'a Document,
    actual: &'a Document,
}

/// A child as seen by the comparison: a node, or a run of text leaves.
#[derive(Clone, Debug)]
enum View<'a> {
    Node(NodeId),
    Text(Cow<'a, str>),
}

fn child_views<'a>(doc: &'a Document, id: NodeId, options: &DomSnapshotOptions) -> Vec<View<'a>> {
    let mut out: Vec<View<'a>> = Vec::new();
    for &child in doc.children(id) {
        let Some(text) = doc.text(child).filter(|_| options.coalesce_text) else {
            out.push(View::Node(child));
            continue;
        };
        if let Some(View::Text(run)) = out.last_mut() {
            run.to_mut().push_str(text);
        } else {
            out.push(View::Text(Cow::Borrowed(text)));
        }
    }
    out
}

fn compare_nodes(
    pair: &Pair<'_>,
    expected: View<'_>,
    actual: View<'_>,
    options: &DomSnapshotOptions,
    path: &mut Vec<String>,
) -> Result<(), Box<DomMismatch>> {
    let expected_line = format_view_line(pair.expected, &expected, options);
    let actual_line = format_view_line(pair.actual, &actual, options);
    let (expected_id, actual_id) = match (&expected, &actual) {
        (View::Text(a), View::Text(b)) => {
            if a != b {
                return Err(mismatch(path, "text", expected_line, actual_line));
            }
            return Ok(());
        }
        (View::Node(a), View::Node(b)) => (*a, *b),
        _ => return Err(mismatch(path, "node kind", expected_line, actual_line)),
    };
    if !options.ignore_ids && expected_id != actual_id {
        return Err(mismatch(path, "node id", expected_line, actual_line));
    }
    let detail = match (pair.expected.kind(expected_id), pair.actual.kind(actual_id)) {
        (Some(NodeKind::Document { doctype: a }), Some(NodeKind::Document { doctype: b })) => {
            (a != b).then_some("doctype")
        }
        (
            Some(NodeKind::Element {
                name: a_name,
                attributes: a_attrs,
            }),
            Some(NodeKind::Element {
                name: b_name,
                attributes: b_attrs,
            }),
        ) => {
            if a_name != b_name {
                Some("element name")
            } else if a_attrs != b_attrs {
                Some("attributes")
            } else {
                None
            }
        }
        (Some(NodeKind::Text { text: a }), Some(NodeKind::Text { text: b })) => {
            (a != b).then_some("text")
        }
        (Some(NodeKind::Comment { text: a }), Some(NodeKind::Comment { text: b })) => {
            (a != b).then_some("comment")
        }
        _ => Some("node kind"),
    };
    if let Some(detail) = detail {
        return Err(mismatch(path, detail, expected_line, actual_line));
    }

    let expected_children = child_views(pair.expected, expected_id, options);
    let actual_children = child_views(pair.actual, actual_id, options);
    if expected_children.len() != actual_children.len() {
        let detail = format!(
            "child count (expected {}, actual {})",
            expected_children.len(),
            actual_children.len()
        );
        return Err(mismatch(path, &detail, expected_line, actual_line));
    }
    for (idx, (exp, act)) in expected_children.into_iter().zip(actual_children).enumerate() {
        path.push(format!("{}[{idx}]", view_label(pair.expected, &exp)));
        let result = compare_nodes(pair, exp, act, options, path);
        path.pop();
        result?;
    }
    Ok(())
}

fn mismatch(path: &[String], detail: &str, expected: String, actual: String) -> Box<DomMismatch> {
    Box::new(DomMismatch {
        path: format!("/{}", path.join("/")),
        detail: detail.to_string(),
        expected: truncate_line(expected, 160),
        actual: truncate_line(actual, 160),
    })
}

fn view_label(doc: &Document, view: &View<'_>) -> String {
    let id = match view {
        View::Text(_) => return "#text".to_string(),
        View::Node(id) => *id,
    };
    let Some(kind) = doc.kind(id) else {
        return "#missing".to_string();
    };
    let mut label = kind.label().to_string();
    if let Some(value) = doc.attribute(id, "id").filter(|v| !v.is_empty()) {
        label.push('#');
        write_escaped(&mut label, value);
    } else if let Some(value) = doc.attribute(id, "class").filter(|v| !v.is_empty()) {
        label.push_str(".class=");
        write_escaped(&mut label, value);
    }
    label
}

fn truncate_line(mut line: String, max_len: usize) -> String {
    if line.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
        line.push_str("...");
    }
    line
}

fn walk_snapshot(
    doc: &Document,
    view: View<'_>,
    options: &DomSnapshotOptions,
    depth: usize,
    out: &mut Vec<String>,
) {
    const INDENT_STEP: usize = 2;
    let mut line = " ".repeat(depth * INDENT_STEP);
    line.push_str(&format_view_line(doc, &view, options));
    out.push(line);
    if let View::Node(id) = view {
        for child in child_views(doc, id, options) {
            walk_snapshot(doc, child, options, depth + 1, out);
        }
    }
}

fn format_view_line(doc: &Document, view: &View<'_>, options: &DomSnapshotOptions) -> String {
    let mut out = String::new();
    let id = match view {
        View::Text(text) => {
            out.push('"');
            write_escaped(&mut out, text);
            out.push('"');
            return out;
        }
        View::Node(id) => *id,
    };
    match doc.kind(id) {
        Some(NodeKind::Document { doctype }) => {
            out.push_str("#document");
            if let Some(dt) = doctype {
                out.push_str(" doctype=\"");
                write_escaped(&mut out, dt);
                out.push('"');
            }
        }
        Some(NodeKind::Element { name, attributes }) => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                if let Some(value) = value {
                    out.push_str("=\"");
                    write_escaped(&mut out, value);
                    out.push('"');
                }
            }
            out.push('>');
        }
        Some(NodeKind::Text { text }) => {
            out.push('"');
            write_escaped(&mut out, text);
            out.push('"');
        }
        Some(NodeKind::Comment { text }) => {
            out.push_str("<!-- ");
            write_escaped(&mut out, text);
            out.push_str(" -->");
        }
        None => out.push_str("#missing"),
    }
    if !options.ignore_ids {
        let _ = write!(out, " {id}");
    }
    out
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ if ch.is_ascii() => out.push(ch),
            _ => {
                let _ = write!(out, "\\u{{{:X}}}", ch as u32);
            }
        }
    }
}

/// Serialize the whole document back to markup.
pub fn to_html(doc: &Document) -> String {
    let mut out = String::new();
    if let Some(NodeKind::Document {
        doctype: Some(doctype),
    }) = doc.kind(doc.root())
    {
        let _ = write!(out, "<!{doctype}>");
    }
    for &child in doc.children(doc.root()) {
        write_html(doc, child, false, &mut out);
    }
    out
}

/// Markup of `id`'s children.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    let raw = matches!(doc.element_name(id), Some("script" | "style"));
    for &child in doc.children(id) {
        write_html(doc, child, raw, &mut out);
    }
    out
}

/// Markup of `id` including its own tags.
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_html(doc, id, false, &mut out);
    out
}

fn write_html(doc: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    match doc.kind(id) {
        Some(NodeKind::Element { name, attributes }) => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                if let Some(value) = value {
                    out.push_str("=\"");
                    escape_html(out, value, true);
                    out.push('"');
                }
            }
            out.push('>');
            if is_void_element(name) {
                return;
            }
            let raw = name == "script" || name == "style";
            for &child in doc.children(id) {
                write_html(doc, child, raw, out);
            }
            let _ = write!(out, "</{name}>");
        }
        Some(NodeKind::Text { text }) if raw_text => out.push_str(text),
        Some(NodeKind::Text { text }) => escape_html(out, text, false),
        Some(NodeKind::Comment { text }) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Some(NodeKind::Document { .. }) | None => {}
    }
}

fn escape_html(out: &mut String, value: &str, attribute: bool) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
