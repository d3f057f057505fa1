use crate::grouping::{Group, Grouping, GroupingMode};
use crate::models::{
    ChunkId, DisplayHint, EvidenceItem, PageId, PageRef, ScoredChunk, DEFAULT_SCORE,
};
use crate::traits::PageCatalog;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceUpdate {
    Added(PageId),
    Removed(PageId),
    Cleared,
    ScoreChanged { chunk_id: ChunkId, score: i32 },
    GroupingChanged(GroupingMode),
    GroupsChanged,
    Restored,
}

/// Pages committed as evidence for the query being annotated, their chunk
/// scores, and how they are grouped.
///
/// Lookups that fail (unknown page, group index out of range) leave the state
/// untouched and are only logged.
#[derive(Debug)]
pub struct EvidenceEngine {
    pub(crate) items: Vec<EvidenceItem>,
    pub(crate) scores: HashMap<ChunkId, i32>,
    pub(crate) grouping: Grouping,
    updates: broadcast::Sender<EvidenceUpdate>,
}

impl Default for EvidenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceEngine {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            items: Vec::new(),
            scores: HashMap::new(),
            grouping: Grouping::AndAll,
            updates,
        }
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<EvidenceUpdate> {
        self.updates.subscribe()
    }

    pub(crate) fn notify(&self, update: EvidenceUpdate) {
        // No receivers is fine.
        let _ = self.updates.send(update);
    }

    pub fn is_in_evidence(&self, page_id: PageId) -> bool {
        self.items.iter().any(|item| item.page_id() == page_id)
    }

    pub fn evidence_items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn evidence_count(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, page_id: PageId) -> Option<&EvidenceItem> {
        self.items.iter().find(|item| item.page_id() == page_id)
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    pub fn grouping_mode(&self) -> GroupingMode {
        self.grouping.mode()
    }

    pub fn add_evidence(&mut self, page_id: PageId, catalog: &impl PageCatalog) {
        if self.is_in_evidence(page_id) {
            return;
        }

        let Some(page) = catalog.find_page(page_id) else {
            warn!(page_id, "page is not in the current catalog view; evidence unchanged");
            return;
        };

        let item = EvidenceItem {
            page: page.clone(),
            document_title: catalog.document_title(),
            display_hint: catalog.thumbnail_for(page_id),
        };
        self.insert_item(item);
    }

    /// Adds a page the caller already holds a snapshot of, for pages that
    /// live in a document other than the one the catalog has open.
    pub fn add_evidence_snapshot(&mut self, page: PageRef, document_title: impl Into<String>) {
        if self.is_in_evidence(page.page_id) {
            return;
        }

        self.insert_item(EvidenceItem {
            page,
            document_title: document_title.into(),
            display_hint: None,
        });
    }

    fn insert_item(&mut self, item: EvidenceItem) {
        let page_id = item.page_id();
        self.items.push(item);
        if let Grouping::Custom(groups) = &mut self.grouping {
            groups.push(Group::singleton(page_id));
        }
        self.notify(EvidenceUpdate::Added(page_id));
    }

    pub fn remove_evidence(&mut self, page_id: PageId) {
        let Some(index) = self.items.iter().position(|item| item.page_id() == page_id) else {
            debug!(page_id, "remove ignored; page is not evidence");
            return;
        };

        let item = self.items.remove(index);
        for chunk_id in &item.page.chunk_ids {
            self.scores.remove(chunk_id);
        }
        self.grouping.detach(page_id);
        self.notify(EvidenceUpdate::Removed(page_id));
    }

    pub fn toggle_evidence(&mut self, page_id: PageId, catalog: &impl PageCatalog) {
        if self.is_in_evidence(page_id) {
            self.remove_evidence(page_id);
        } else {
            self.add_evidence(page_id, catalog);
        }
    }

    /// Drops all evidence, scores and groups and returns to `AndAll`.
    pub fn clear_evidence(&mut self) {
        let was_empty = self.items.is_empty()
            && self.scores.is_empty()
            && self.grouping == Grouping::AndAll;

        self.items.clear();
        self.scores.clear();
        self.grouping = Grouping::AndAll;

        if !was_empty {
            self.notify(EvidenceUpdate::Cleared);
        }
    }

    /// Stores `score` as given; range checks belong to the caller. Chunks of
    /// pages that are not evidence are ignored.
    pub fn set_chunk_score(&mut self, chunk_id: ChunkId, score: i32) {
        if !self.items.iter().any(|item| item.page.owns_chunk(chunk_id)) {
            debug!(chunk_id, "score ignored; chunk does not belong to any evidence page");
            return;
        }

        let previous = self.scores.insert(chunk_id, score);
        if previous != Some(score) {
            self.notify(EvidenceUpdate::ScoreChanged { chunk_id, score });
        }
    }

    pub fn get_chunk_score(&self, chunk_id: ChunkId) -> i32 {
        self.scores.get(&chunk_id).copied().unwrap_or(DEFAULT_SCORE)
    }

    /// Explicitly recorded scores, ordered by chunk id.
    pub fn scored_chunks(&self) -> Vec<ScoredChunk> {
        let mut scored: Vec<_> = self
            .scores
            .iter()
            .map(|(chunk_id, score)| ScoredChunk {
                chunk_id: *chunk_id,
                score: *score,
            })
            .collect();
        scored.sort_by_key(|entry| entry.chunk_id);
        scored
    }

    pub fn set_grouping_mode(&mut self, mode: GroupingMode) {
        if self.grouping.mode() == mode {
            return;
        }

        let order: Vec<PageId> = self.items.iter().map(EvidenceItem::page_id).collect();
        self.grouping = Grouping::seeded(mode, &order);
        self.notify(EvidenceUpdate::GroupingChanged(mode));
    }

    /// Moves `page_id` into the group at `target_group_index`. Indices refer
    /// to the current group order and shift whenever a group disappears.
    pub fn merge_into_group(&mut self, target_group_index: usize, page_id: PageId) {
        let Grouping::Custom(groups) = &mut self.grouping else {
            debug!(page_id, "merge ignored outside custom grouping");
            return;
        };
        if target_group_index >= groups.len() {
            debug!(target_group_index, "merge ignored; group index out of range");
            return;
        }
        let Some(source) = groups.iter().position(|group| group.contains(page_id)) else {
            debug!(page_id, "merge ignored; page is not evidence");
            return;
        };
        if source == target_group_index {
            return;
        }

        groups[target_group_index].insert(page_id);
        groups[source].remove(page_id);
        if groups[source].is_empty() {
            groups.remove(source);
        }
        self.notify(EvidenceUpdate::GroupsChanged);
    }

    pub fn split_to_new_group(&mut self, page_id: PageId) {
        let Grouping::Custom(groups) = &self.grouping else {
            debug!(page_id, "split ignored outside custom grouping");
            return;
        };
        let Some(index) = groups.iter().position(|group| group.contains(page_id)) else {
            debug!(page_id, "split ignored; page has no explicit group");
            return;
        };
        // Already a trailing singleton.
        if groups[index].len() == 1 && index + 1 == groups.len() {
            return;
        }

        self.grouping.detach(page_id);
        if let Grouping::Custom(groups) = &mut self.grouping {
            groups.push(Group::singleton(page_id));
        }
        self.notify(EvidenceUpdate::GroupsChanged);
    }

    /// Removes every page of one explicit group from evidence.
    pub fn remove_group(&mut self, group_index: usize) {
        let Grouping::Custom(groups) = &self.grouping else {
            debug!(group_index, "remove group ignored outside custom grouping");
            return;
        };
        let Some(group) = groups.get(group_index) else {
            debug!(group_index, "remove group ignored; group index out of range");
            return;
        };

        let pages = group.page_ids().to_vec();
        for page_id in pages {
            self.remove_evidence(page_id);
        }
    }

    pub fn move_group(&mut self, from: usize, to: usize) {
        let Grouping::Custom(groups) = &mut self.grouping else {
            return;
        };
        if from >= groups.len() || to >= groups.len() || from == to {
            debug!(from, to, "move group ignored");
            return;
        }

        let group = groups.remove(from);
        groups.insert(to, group);
        self.notify(EvidenceUpdate::GroupsChanged);
    }

    /// Position of the page's group in the current group order; in `AndAll`
    /// every page is its own implicit group.
    pub fn group_index_of(&self, page_id: PageId) -> Option<usize> {
        match &self.grouping {
            Grouping::AndAll => self.items.iter().position(|item| item.page_id() == page_id),
            grouping => grouping.group_index_of(page_id),
        }
    }

    /// Page ids per group, in group order.
    pub fn groups(&self) -> Vec<Vec<PageId>> {
        match &self.grouping {
            Grouping::AndAll => self.items.iter().map(|item| vec![item.page_id()]).collect(),
            Grouping::Custom(groups) => groups
                .iter()
                .map(|group| group.page_ids().to_vec())
                .collect(),
        }
    }

    pub fn selected_chunk_ids(&self) -> Vec<ChunkId> {
        self.items
            .iter()
            .flat_map(|item| item.page.chunk_ids.iter().copied())
            .collect()
    }

    pub fn set_display_hint(&mut self, page_id: PageId, hint: Option<DisplayHint>) {
        if let Some(item) = self.items.iter_mut().find(|item| item.page_id() == page_id) {
            item.display_hint = hint;
        }
    }

    /// Re-reads thumbnails for evidence pages the catalog currently shows.
    pub fn refresh_display_hints(&mut self, catalog: &impl PageCatalog) {
        for item in &mut self.items {
            if catalog.find_page(item.page_id()).is_some() {
                item.display_hint = catalog.thumbnail_for(item.page_id());
            }
        }
    }

    /// Chunk lists per group with current scores, ready for saving. Groups
    /// whose pages carry no chunks are left out.
    pub fn evidence_groups(&self) -> Vec<Vec<ScoredChunk>> {
        self.groups()
            .iter()
            .map(|page_ids| {
                page_ids
                    .iter()
                    .filter_map(|page_id| self.item(*page_id))
                    .flat_map(|item| item.page.chunk_ids.iter())
                    .map(|chunk_id| ScoredChunk {
                        chunk_id: *chunk_id,
                        score: self.get_chunk_score(*chunk_id),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|chunks| !chunks.is_empty())
            .collect()
    }
}
