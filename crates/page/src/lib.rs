//! One open document: its tree, its highlights and the store they persist to.
//!
//! Every completed insert or delete hands the full ordered snapshot to the
//! store runtime; the runtime applies saves in send order.

use highlight::{
    DeleteOutcome, DeleteTarget, EngineConfig, HighlightError, HighlightInfo,
    HighlightOrderedMap, HighlightSeq, InsertOutcome, RestoreReport, Selection, SpanCandidate,
};
use html::{Document, NodeId};
use runtime_store::{StoreError, StoreHandle, normalize_url};
use std::fmt;
use std::future::Future;

#[non_exhaustive]
#[derive(Debug)]
pub enum PageError {
    Store(StoreError),
    Highlight(HighlightError),
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::Store(err) => write!(f, "{err}"),
            PageError::Highlight(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PageError::Store(err) => Some(err),
            PageError::Highlight(err) => Some(err),
        }
    }
}

impl From<StoreError> for PageError {
    fn from(err: StoreError) -> Self {
        PageError::Store(err)
    }
}

impl From<HighlightError> for PageError {
    fn from(err: HighlightError) -> Self {
        PageError::Highlight(err)
    }
}

pub struct Page<'s> {
    document: Document,
    seq: HighlightSeq,
    url: String,
    store: &'s StoreHandle,
    report: RestoreReport,
}

/// Completion callback that queues the snapshot for `url`.
fn persist_to<'a>(store: &'a StoreHandle, url: &'a str) -> impl FnMut(&HighlightOrderedMap) + 'a {
    move |map: &HighlightOrderedMap| {
        if let Err(err) = store.save(url, map.map(HighlightInfo::serialize)) {
            log::warn!(target: "page", "could not queue save for {url}: {err}");
        }
    }
}

impl<'s> Page<'s> {
    /// Ask the host for the document address, load what is stored for it
    /// and re-apply it to `document`.
    pub fn open(
        mut document: Document,
        config: EngineConfig,
        store: &'s StoreHandle,
        url_query: impl Future<Output = String>,
    ) -> Result<Self, PageError> {
        let url = normalize_url(&pollster::block_on(url_query))?;
        let stored = store.load(&url)?;
        let (seq, report) = HighlightSeq::restore(&mut document, config, stored)?;
        log::debug!(
            target: "page",
            "opened {url}: {} restored, {} skipped",
            report.restored.len(),
            report.skipped.len()
        );
        Ok(Self {
            document,
            seq,
            url,
            store,
            report,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn highlights(&self) -> &HighlightOrderedMap {
        self.seq.highlights()
    }

    pub fn engine(&self) -> &HighlightSeq {
        &self.seq
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Outcome of the restore done by [`Page::open`].
    pub fn restore_report(&self) -> &RestoreReport {
        &self.report
    }

    pub fn highlight(
        &mut self,
        selection: &Selection,
        color: &str,
        category: Option<&str>,
    ) -> Result<InsertOutcome, PageError> {
        let mut persist = persist_to(self.store, &self.url);
        let outcome = self.seq.insert_selection(
            &mut self.document,
            selection,
            color,
            category,
            Some(&mut persist),
        )?;
        self.remember(category);
        Ok(outcome)
    }

    /// Highlight `start..end` of one container's flattened text.
    pub fn highlight_span(
        &mut self,
        candidate: SpanCandidate,
        color: &str,
        category: Option<&str>,
    ) -> Result<InsertOutcome, PageError> {
        let mut persist = persist_to(self.store, &self.url);
        let outcome = self.seq.insert_span(
            &mut self.document,
            candidate,
            color,
            category,
            Some(&mut persist),
        )?;
        self.remember(category);
        Ok(outcome)
    }

    pub fn remove(&mut self, target: DeleteTarget) -> Result<DeleteOutcome, PageError> {
        let mut persist = persist_to(self.store, &self.url);
        let outcome = self
            .seq
            .delete(&mut self.document, target, Some(&mut persist))?;
        Ok(outcome)
    }

    /// A click on `node` removes the highlight it falls in, if any.
    pub fn click(&mut self, node: NodeId) -> Result<Option<DeleteOutcome>, PageError> {
        let Some(id) = self
            .seq
            .highlight_at(&self.document, node)
            .map(|info| info.id().clone())
        else {
            return Ok(None);
        };
        self.seq.set_active(&id);
        self.remove(DeleteTarget::Id(id)).map(Some)
    }

    fn remember(&self, category: Option<&str>) {
        let Some(category) = category else {
            return;
        };
        if let Err(err) = self.store.remember_category(category) {
            log::warn!(target: "page", "could not remember category {category}: {err}");
        }
    }
}
