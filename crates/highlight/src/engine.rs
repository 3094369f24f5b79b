//! The highlight sequence: every live highlight of one document, kept in
//! document order.
//!
//! Invariants after every public operation:
//! - each record has exactly one attached wrapper carrying its id, and every
//!   wrapper in the tree belongs to a record;
//! - wrappers never nest and spans in one container never overlap;
//! - the order of `highlights` is the document order of the wrappers.
//!
//! Records address their span by container path and flattened-text
//! offsets. Wrapping and unwrapping never change a container's flattened
//! text, and node ids survive every tree edit, so other records only need
//! their wrapper handle re-checked after a mutation, never recomputed.

use crate::config::{EngineConfig, HighlightConfig};
use crate::error::HighlightError;
use crate::info::{HighlightInfo, crossing_block};
use crate::selection::{Selection, SpanCandidate, split_across_containers};
use core_types::{HighlightDescriptor, HighlightId};
use html::traverse::{
    compare_document_position, descendants, flattened_text, following, text_leaves,
};
use html::{Document, DomError, LeafPosition, NodeId, offset_of, unwrap_span};
use std::cmp::Ordering;
use std::fmt;
use tools::OrderedMap;

pub type HighlightOrderedMap = OrderedMap<HighlightId, HighlightInfo>;

/// Called after a completed insert or delete with the updated records.
pub type Completion<'a> = Option<&'a mut dyn FnMut(&HighlightOrderedMap)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    Id(HighlightId),
    /// The wrapper or any node inside it.
    Node(NodeId),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: Vec<HighlightId>,
    /// Records merged into the new ones and removed.
    pub absorbed: Vec<HighlightId>,
    /// Joins abandoned while unwrapping absorbed records.
    pub conflicts: Vec<HighlightError>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub removed: HighlightInfo,
    pub conflicts: Vec<HighlightError>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<HighlightId>,
    pub skipped: Vec<(HighlightId, HighlightError)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    MissingWrapper(HighlightId),
    StrayWrapper(NodeId),
    NestedWrapper { outer: HighlightId, inner: HighlightId },
    OutOfOrder { before: HighlightId, after: HighlightId },
    Overlap { left: HighlightId, right: HighlightId },
    TextMismatch(HighlightId),
    BlockInsideWrapper { id: HighlightId, block: NodeId },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::MissingWrapper(id) => write!(f, "{id} has no live wrapper"),
            InvariantViolation::StrayWrapper(node) => {
                write!(f, "wrapper {node} belongs to no record")
            }
            InvariantViolation::NestedWrapper { outer, inner } => {
                write!(f, "{inner} is nested inside {outer}")
            }
            InvariantViolation::OutOfOrder { before, after } => {
                write!(f, "{after} is stored after {before} but appears before it")
            }
            InvariantViolation::Overlap { left, right } => write!(f, "{left} overlaps {right}"),
            InvariantViolation::TextMismatch(id) => {
                write!(f, "{id} no longer covers its recorded text")
            }
            InvariantViolation::BlockInsideWrapper { id, block } => {
                write!(f, "wrapper of {id} contains block {block}")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// What to do when a new record overlaps existing ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Overlap {
    Absorb,
    Reject,
}

pub struct HighlightSeq {
    highlights: HighlightOrderedMap,
    config: EngineConfig,
    active: Option<HighlightId>,
}

fn record_key(info: &HighlightInfo) -> HighlightId {
    info.id().clone()
}

impl HighlightSeq {
    pub fn new(config: EngineConfig) -> Result<Self, HighlightError> {
        config.validate()?;
        Ok(Self {
            highlights: OrderedMap::new(record_key),
            config,
            active: None,
        })
    }

    /// Rebuild the highlights of a freshly loaded document.
    ///
    /// Descriptors are applied in stored order. A descriptor that is
    /// malformed, no longer matches the document, or overlaps one restored
    /// before it is skipped and reported; the rest are still restored.
    pub fn restore(
        doc: &mut Document,
        config: EngineConfig,
        descriptors: impl IntoIterator<Item = HighlightDescriptor>,
    ) -> Result<(Self, RestoreReport), HighlightError> {
        let mut seq = Self::new(config)?;
        let mut report = RestoreReport::default();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            let result = HighlightInfo::from_descriptor(descriptor)
                .and_then(|info| seq.insert_info(doc, info, Overlap::Reject));
            match result {
                Ok(placed) => report.restored.push(placed.id),
                Err(err) => {
                    log::warn!(target: "highlight.restore", "skipping {id}: {err}");
                    report.skipped.push((id, err));
                }
            }
        }
        log::debug!(
            target: "highlight.restore",
            "restored {} highlight(s), skipped {}",
            report.restored.len(),
            report.skipped.len()
        );
        Ok((seq, report))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn highlights(&self) -> &HighlightOrderedMap {
        &self.highlights
    }

    pub fn get(&self, id: &HighlightId) -> Option<&HighlightInfo> {
        self.highlights.find(id)
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    /// Persistable snapshot in document order.
    pub fn descriptors(&self) -> Vec<HighlightDescriptor> {
        self.highlights.map(HighlightInfo::serialize)
    }

    /// Highlight a live selection, one record per block it touches.
    pub fn insert_selection(
        &mut self,
        doc: &mut Document,
        selection: &Selection,
        color: &str,
        category: Option<&str>,
        completion: Completion<'_>,
    ) -> Result<InsertOutcome, HighlightError> {
        let candidates = split_across_containers(doc, selection, &self.config)?;
        let infos = candidates
            .into_iter()
            .map(|c| HighlightInfo::from_candidate(doc, c, &self.config, color, category))
            .collect::<Result<Vec<_>, _>>()?;
        self.insert_all(doc, infos, completion)
    }

    /// Highlight `start..end` of `candidate.container`'s flattened text.
    pub fn insert_span(
        &mut self,
        doc: &mut Document,
        candidate: SpanCandidate,
        color: &str,
        category: Option<&str>,
        completion: Completion<'_>,
    ) -> Result<InsertOutcome, HighlightError> {
        let info = HighlightInfo::from_candidate(doc, candidate, &self.config, color, category)?;
        self.insert_all(doc, vec![info], completion)
    }

    /// Insert a record built from explicit fields.
    pub fn insert(
        &mut self,
        doc: &mut Document,
        config: HighlightConfig,
        completion: Completion<'_>,
    ) -> Result<InsertOutcome, HighlightError> {
        let info = HighlightInfo::from_config(config)?;
        self.insert_all(doc, vec![info], completion)
    }

    fn insert_all(
        &mut self,
        doc: &mut Document,
        infos: Vec<HighlightInfo>,
        completion: Completion<'_>,
    ) -> Result<InsertOutcome, HighlightError> {
        let mut outcome = InsertOutcome::default();
        let mut failure = None;
        for info in infos {
            match self.insert_info(doc, info, Overlap::Absorb) {
                Ok(placed) => {
                    outcome.inserted.push(placed.id);
                    outcome.absorbed.extend(placed.absorbed);
                    outcome.conflicts.extend(placed.conflicts);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.debug_check(doc);
        if !outcome.inserted.is_empty() {
            if let Some(callback) = completion {
                callback(&self.highlights);
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    fn insert_info(
        &mut self,
        doc: &mut Document,
        mut info: HighlightInfo,
        overlap: Overlap,
    ) -> Result<Placed, HighlightError> {
        if self.highlights.has(info.id()) {
            return Err(HighlightError::MalformedDescriptor {
                id: info.id().clone(),
                reason: "id is already in use".to_string(),
            });
        }
        let located = info.resolve(doc, &self.config)?;
        if let Some(block) = crossing_block(doc, &located, &self.config) {
            let reason = format!("span under `{}` crosses block {block}", info.parent_selector());
            return Err(match overlap {
                Overlap::Absorb => HighlightError::InvalidSelection(reason),
                Overlap::Reject => HighlightError::MalformedDescriptor {
                    id: info.id().clone(),
                    reason,
                },
            });
        }
        let overlapping = self.overlapping(doc, located.container, located.start, located.end)?;

        let mut absorbed = Vec::new();
        let mut conflicts = Vec::new();
        if !overlapping.is_empty() {
            if overlap == Overlap::Reject {
                return Err(HighlightError::MalformedDescriptor {
                    id: info.id().clone(),
                    reason: format!("overlaps highlight {}", overlapping[0]),
                });
            }
            let union = self.union_span(doc, &info, located.container, &overlapping)?;
            let merged = HighlightInfo::from_candidate(
                doc,
                union,
                &self.config,
                info.color(),
                info.category(),
            )?;
            for id in &overlapping {
                let (removed, lost) = self.unwrap_record(doc, id)?;
                conflicts.extend(lost);
                absorbed.push(removed);
            }
            log::debug!(
                target: "highlight.engine",
                "{} absorbs {} highlight(s)",
                merged.id(),
                absorbed.len()
            );
            info = merged;
        }

        let absorbed_ids = absorbed.iter().map(|a| a.id().clone()).collect();
        let id = self.commit(doc, info, absorbed, HighlightInfo::materialize)?;
        log::debug!(
            target: "highlight.engine",
            "inserted {id} at {} of {}",
            self.highlights.find_idx(&id).unwrap_or_default(),
            self.highlights.len()
        );
        Ok(Placed {
            id,
            absorbed: absorbed_ids,
            conflicts,
        })
    }

    /// Wrap `info` and store it in document order. If wrapping fails the
    /// already unwrapped `absorbed` records are put back.
    fn commit(
        &mut self,
        doc: &mut Document,
        mut info: HighlightInfo,
        absorbed: Vec<HighlightInfo>,
        materialize: impl FnOnce(
            &mut HighlightInfo,
            &mut Document,
            &EngineConfig,
        ) -> Result<NodeId, HighlightError>,
    ) -> Result<HighlightId, HighlightError> {
        let wrapper = match materialize(&mut info, doc, &self.config) {
            Ok(wrapper) => wrapper,
            Err(err) => {
                self.rematerialize(doc, absorbed);
                return Err(err);
            }
        };
        let id = info.id().clone();
        self.highlights.append(info);
        self.place_in_document_order(doc, &id, wrapper);
        Ok(id)
    }

    /// Ids of records whose wrapper holds either end of the span or whose
    /// text overlaps it. Spans that merely touch are not included.
    fn overlapping(
        &self,
        doc: &Document,
        container: NodeId,
        start: LeafPosition,
        end: LeafPosition,
    ) -> Result<Vec<HighlightId>, HighlightError> {
        let span_start = offset_of(doc, container, start)?;
        let span_end = offset_of(doc, container, end)?;
        let mut out = Vec::new();
        for record in self.highlights.iter() {
            let Some(wrapper) = record.live_node() else {
                continue;
            };
            let holds_anchor =
                doc.is_ancestor(wrapper, start.leaf) || doc.is_ancestor(wrapper, end.leaf);
            let overlaps = holds_anchor
                || (doc.is_ancestor(container, wrapper)
                    && wrapper_span(doc, container, wrapper)?
                        .is_some_and(|(s, e)| s < span_end && span_start < e));
            if overlaps {
                out.push(record.id().clone());
            }
        }
        Ok(out)
    }

    /// The span covering `info` and every overlapping record, expressed in
    /// the outermost container involved.
    fn union_span(
        &self,
        doc: &Document,
        info: &HighlightInfo,
        container: NodeId,
        overlapping: &[HighlightId],
    ) -> Result<SpanCandidate, HighlightError> {
        let mut outer = container;
        for id in overlapping {
            let record = self.record(id)?;
            let located = record.locate(doc, &self.config)?;
            if doc.is_ancestor(located.container, outer) {
                outer = located.container;
            }
        }
        let located = info.locate(doc, &self.config)?;
        let mut start = offset_of(doc, outer, located.start)?;
        let mut end = offset_of(doc, outer, located.end)?;
        for id in overlapping {
            let wrapper = self.live_wrapper(doc, id)?;
            if let Some((s, e)) = wrapper_span(doc, outer, wrapper)? {
                start = start.min(s);
                end = end.max(e);
            }
        }
        Ok(SpanCandidate {
            container: outer,
            start,
            end,
        })
    }

    /// Put a wrapper back for records absorbed by an insert that then failed.
    fn rematerialize(&mut self, doc: &mut Document, records: Vec<HighlightInfo>) {
        for mut record in records {
            let id = record.id().clone();
            match record.materialize(doc, &self.config) {
                Ok(wrapper) => {
                    self.highlights.append(record);
                    self.place_in_document_order(doc, &id, wrapper);
                }
                Err(err) => {
                    log::warn!(target: "highlight.engine", "lost absorbed highlight {id}: {err}");
                }
            }
        }
    }

    /// Move the last-appended record `id` in front of the first wrapper that
    /// follows `wrapper` in the document, re-pointing handles on the way.
    fn place_in_document_order(&mut self, doc: &Document, id: &HighlightId, wrapper: NodeId) {
        let Some(from) = self.highlights.find_idx(id) else {
            return;
        };
        let next = self.repair_wrappers(doc, following(doc, wrapper), true);
        if let Some(to) = next {
            if to < from {
                self.highlights.shift_upward(from, to);
            }
        }
    }

    /// Re-point live handles of records whose wrappers appear in `nodes`.
    ///
    /// With `first_only` the scan stops at the first known wrapper and its
    /// position in `highlights` is returned.
    fn repair_wrappers(
        &mut self,
        doc: &Document,
        nodes: impl Iterator<Item = NodeId>,
        first_only: bool,
    ) -> Option<usize> {
        for node in nodes {
            let Some(raw) = self.config.wrapper_id(doc, node) else {
                continue;
            };
            let key = HighlightId::from(raw);
            let Some(idx) = self.highlights.find_idx(&key) else {
                continue;
            };
            if let Some(record) = self.highlights.find_mut(&key) {
                if record.live_node() != Some(node) {
                    log::trace!(target: "highlight.engine", "re-pointing {key} to {node}");
                    record.set_live_node(Some(node));
                }
            }
            if first_only {
                return Some(idx);
            }
        }
        None
    }

    pub fn delete(
        &mut self,
        doc: &mut Document,
        target: DeleteTarget,
        completion: Completion<'_>,
    ) -> Result<DeleteOutcome, HighlightError> {
        let id = match target {
            DeleteTarget::Id(id) => id,
            DeleteTarget::Node(node) => self
                .highlight_at(doc, node)
                .map(|info| info.id().clone())
                .ok_or_else(|| {
                    HighlightError::InvalidSelection(format!("{node} is not inside a highlight"))
                })?,
        };
        let (removed, conflicts) = self.unwrap_record(doc, &id)?;
        if self.active.as_ref() == Some(&id) {
            self.active = None;
        }
        log::debug!(target: "highlight.engine", "deleted {id}");
        self.debug_check(doc);
        if let Some(callback) = completion {
            callback(&self.highlights);
        }
        Ok(DeleteOutcome { removed, conflicts })
    }

    /// Remove a record and its wrapper, then re-check the handles of any
    /// wrappers the unwrap exposed.
    fn unwrap_record(
        &mut self,
        doc: &mut Document,
        id: &HighlightId,
    ) -> Result<(HighlightInfo, Vec<HighlightError>), HighlightError> {
        let wrapper = self.live_wrapper(doc, id)?;
        let outcome = unwrap_span(doc, wrapper)?;
        let mut removed = self
            .highlights
            .remove_by_key(id)
            .ok_or_else(|| HighlightError::UnknownHighlight(id.clone()))?;
        removed.set_live_node(None);
        for conflict in &outcome.conflicts {
            log::warn!(target: "highlight.engine", "unwrapping {id}: {conflict}");
        }
        let view: &Document = doc;
        let exposed: Vec<NodeId> = outcome
            .nodes
            .iter()
            .flat_map(|n| std::iter::once(*n).chain(descendants(view, *n)))
            .collect();
        self.repair_wrappers(doc, exposed.into_iter(), false);
        let conflicts = outcome
            .conflicts
            .into_iter()
            .map(HighlightError::from)
            .collect();
        Ok((removed, conflicts))
    }

    fn record(&self, id: &HighlightId) -> Result<&HighlightInfo, HighlightError> {
        self.highlights
            .find(id)
            .ok_or_else(|| HighlightError::UnknownHighlight(id.clone()))
    }

    /// The attached wrapper of `id`, searching the tree if the stored handle
    /// went stale.
    fn live_wrapper(&self, doc: &Document, id: &HighlightId) -> Result<NodeId, HighlightError> {
        let record = self.record(id)?;
        let carries_id = |node: NodeId| self.config.wrapper_id(doc, node) == Some(id.as_str());
        if let Some(node) = record.live_node() {
            if doc.is_attached(node) && carries_id(node) {
                return Ok(node);
            }
        }
        doc.find_element(doc.root(), |_, node| carries_id(node))
            .ok_or_else(|| HighlightError::UnresolvableAnchor {
                selector: record.parent_selector().to_string(),
                reason: format!("wrapper of {id} is gone"),
            })
    }

    /// The record whose wrapper contains `node`, looking no further out than
    /// the nearest block element.
    pub fn highlight_at(&self, doc: &Document, node: NodeId) -> Option<&HighlightInfo> {
        for candidate in std::iter::once(node).chain(doc.ancestors(node)) {
            if let Some(raw) = self.config.wrapper_id(doc, candidate) {
                if let Some(info) = self.highlights.find(&HighlightId::from(raw)) {
                    return Some(info);
                }
            }
            if self.config.is_block(doc, candidate) {
                break;
            }
        }
        None
    }

    /// Mark `id` as the highlight the user is interacting with.
    pub fn set_active(&mut self, id: &HighlightId) -> bool {
        if self.highlights.has(id) {
            self.active = Some(id.clone());
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> Option<&HighlightId> {
        self.active.as_ref()
    }

    pub fn clear_active(&mut self) -> Option<HighlightId> {
        self.active.take()
    }

    /// Verify every engine invariant against `doc`.
    pub fn check_invariants(&self, doc: &Document) -> Result<(), InvariantViolation> {
        let mut previous: Option<(&HighlightInfo, NodeId)> = None;
        for record in self.highlights.iter() {
            let id = record.id();
            let wrapper = self
                .live_wrapper(doc, id)
                .map_err(|_| InvariantViolation::MissingWrapper(id.clone()))?;
            if let Some(block) = descendants(doc, wrapper).find(|n| self.config.is_block(doc, *n)) {
                return Err(InvariantViolation::BlockInsideWrapper {
                    id: id.clone(),
                    block,
                });
            }
            if flattened_text(doc, wrapper) != record.text_content()
                || record.locate(doc, &self.config).is_err()
            {
                return Err(InvariantViolation::TextMismatch(id.clone()));
            }
            if let Some(outer) = doc
                .ancestors(wrapper)
                .find_map(|a| self.config.wrapper_id(doc, a))
            {
                return Err(InvariantViolation::NestedWrapper {
                    outer: HighlightId::from(outer),
                    inner: id.clone(),
                });
            }
            if let Some((prev, prev_wrapper)) = previous {
                if compare_document_position(doc, prev_wrapper, wrapper) != Ordering::Less {
                    return Err(InvariantViolation::OutOfOrder {
                        before: prev.id().clone(),
                        after: id.clone(),
                    });
                }
                if prev.parent_selector() == record.parent_selector()
                    && prev.text_end_at() > record.text_start_at()
                {
                    return Err(InvariantViolation::Overlap {
                        left: prev.id().clone(),
                        right: id.clone(),
                    });
                }
            }
            previous = Some((record, wrapper));
        }
        for node in descendants(doc, doc.root()) {
            if let Some(raw) = self.config.wrapper_id(doc, node) {
                if !self.highlights.has(&HighlightId::from(raw)) {
                    return Err(InvariantViolation::StrayWrapper(node));
                }
            }
        }
        Ok(())
    }

    fn debug_check(&self, doc: &Document) {
        if cfg!(debug_assertions) {
            if let Err(violation) = self.check_invariants(doc) {
                debug_assert!(false, "highlight invariant broken: {violation}");
                log::warn!(target: "highlight.engine", "invariant broken: {violation}");
            }
        }
    }
}

impl fmt::Debug for HighlightSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HighlightSeq")
            .field("highlights", &self.highlights)
            .field("active", &self.active)
            .finish()
    }
}

struct Placed {
    id: HighlightId,
    absorbed: Vec<HighlightId>,
    conflicts: Vec<HighlightError>,
}

/// Offsets of `wrapper`'s text inside `container`, `None` if it holds none.
fn wrapper_span(
    doc: &Document,
    container: NodeId,
    wrapper: NodeId,
) -> Result<Option<(usize, usize)>, DomError> {
    let mut leaves =
        text_leaves(doc, wrapper).filter(|l| doc.text(*l).is_some_and(|t| !t.is_empty()));
    let Some(first) = leaves.next() else {
        return Ok(None);
    };
    let last = leaves.last().unwrap_or(first);
    let last_len = doc.text(last).map_or(0, str::len);
    let start = offset_of(doc, container, LeafPosition { leaf: first, offset: 0 })?;
    let end = offset_of(doc, container, LeafPosition { leaf: last, offset: last_len })?;
    Ok(Some((start, end)))
}
