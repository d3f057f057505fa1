use crate::evidence::{EvidenceEngine, EvidenceUpdate};
use crate::grouping::{Group, Grouping};
use crate::models::{
    EvidenceItem, PageId, PageRef, PersistedGroup, PersistedItem, RetrievalRelation,
};
use crate::traits::PageCatalog;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

impl EvidenceEngine {
    /// Replaces all state with the groups of a saved annotation.
    ///
    /// Pages found in the catalog's current view take their full chunk list
    /// from it; any other page is rebuilt from the saved items alone. A page
    /// listed in more than one group stays in the first. If the result is
    /// nothing but distinct singletons, the implicit `AndAll` form is used so
    /// that saving again yields the same record.
    pub fn restore_from_persisted(
        &mut self,
        groups: &[PersistedGroup],
        catalog: &impl PageCatalog,
    ) {
        self.items.clear();
        self.scores.clear();
        self.grouping = Grouping::AndAll;

        let mut partition: Vec<Group> = Vec::new();
        let mut repeated = false;

        for persisted in groups {
            let mut group = Group::default();

            for page_id in distinct_pages(&persisted.items) {
                if self.is_in_evidence(page_id) {
                    repeated = true;
                    continue;
                }

                let item = match catalog.find_page(page_id) {
                    Some(page) => EvidenceItem {
                        page: page.clone(),
                        document_title: catalog.document_title(),
                        display_hint: catalog.thumbnail_for(page_id),
                    },
                    None => shell_item(page_id, groups),
                };
                self.items.push(item);
                group.insert(page_id);
            }

            for entry in &persisted.items {
                let owned = self
                    .item(entry.page_id)
                    .is_some_and(|item| item.page.owns_chunk(entry.chunk_id));
                if owned {
                    self.scores.insert(entry.chunk_id, entry.score);
                } else {
                    debug!(
                        page_id = entry.page_id,
                        chunk_id = entry.chunk_id,
                        "dropping saved score for a chunk the page no longer has"
                    );
                }
            }

            if !group.is_empty() {
                partition.push(group);
            }
        }

        let canonical = !repeated && partition.iter().all(|group| group.len() == 1);
        if !canonical {
            self.grouping = Grouping::Custom(partition);
        }

        info!(
            mode = ?self.grouping.mode(),
            groups = self.groups().len(),
            pages = self.items.len(),
            "restored evidence"
        );
        self.notify(EvidenceUpdate::Restored);
    }

    /// Wire view: one item per (page, chunk) pair, grouped like
    /// [`EvidenceEngine::evidence_groups`].
    pub fn persisted_groups(&self) -> Vec<PersistedGroup> {
        self.groups()
            .iter()
            .map(|page_ids| PersistedGroup {
                items: page_ids
                    .iter()
                    .filter_map(|page_id| self.item(*page_id))
                    .flat_map(|item| {
                        item.page.chunk_ids.iter().map(|chunk_id| PersistedItem {
                            page_id: item.page_id(),
                            chunk_id: *chunk_id,
                            score: self.get_chunk_score(*chunk_id),
                            document_id: Some(item.page.document_id),
                            page_number: Some(item.page.page_number),
                        })
                    })
                    .collect(),
            })
            .filter(|group| !group.items.is_empty())
            .collect()
    }

    /// Rows for the retrieval_relation table of `query_id`.
    pub fn retrieval_relations(&self, query_id: i64) -> Vec<RetrievalRelation> {
        self.evidence_groups()
            .iter()
            .enumerate()
            .flat_map(|(group_index, chunks)| {
                chunks
                    .iter()
                    .enumerate()
                    .map(move |(group_order, chunk)| RetrievalRelation {
                        query_id,
                        group_index: group_index as i32,
                        group_order: group_order as i32,
                        chunk_id: chunk.chunk_id,
                        score: chunk.score,
                    })
            })
            .collect()
    }

    /// Hex SHA-256 over the saved form. Equal digests mean saving would write
    /// the same evidence.
    pub fn evidence_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (group_index, group) in self.persisted_groups().iter().enumerate() {
            hasher.update((group_index as u64).to_le_bytes());
            for item in &group.items {
                hasher.update(item.page_id.to_le_bytes());
                hasher.update(item.chunk_id.to_le_bytes());
                hasher.update(item.score.to_le_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

fn distinct_pages(items: &[PersistedItem]) -> Vec<PageId> {
    let mut pages = Vec::new();
    for item in items {
        if !pages.contains(&item.page_id) {
            pages.push(item.page_id);
        }
    }
    pages
}

/// Minimal page for evidence outside the open document: chunks are whatever
/// the saved items mention, location is 0 when older records lack it.
fn shell_item(page_id: PageId, groups: &[PersistedGroup]) -> EvidenceItem {
    let mentions = groups
        .iter()
        .flat_map(|group| group.items.iter())
        .filter(|item| item.page_id == page_id);

    let mut page = PageRef {
        page_id,
        document_id: 0,
        page_number: 0,
        chunk_ids: Vec::new(),
    };
    for item in mentions {
        if !page.owns_chunk(item.chunk_id) {
            page.chunk_ids.push(item.chunk_id);
        }
        if let Some(document_id) = item.document_id {
            page.document_id = document_id;
        }
        if let Some(page_number) = item.page_number {
            page.page_number = page_number;
        }
    }

    EvidenceItem {
        document_title: format!("document {}", page.document_id),
        page,
        display_hint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::grouping::GroupingMode;
    use crate::models::{ChunkId, DEFAULT_SCORE};

    fn catalog() -> InMemoryCatalog {
        let pages = [(1, vec![11, 12]), (2, vec![21]), (3, vec![31])]
            .into_iter()
            .map(|(page_id, chunk_ids)| PageRef {
                page_id,
                document_id: 1,
                page_number: page_id as u32,
                chunk_ids,
            })
            .collect();
        InMemoryCatalog::from_pages(1, "Pump manual", pages).expect("catalog should build")
    }

    fn item(page_id: PageId, chunk_id: ChunkId, score: i32) -> PersistedItem {
        PersistedItem {
            page_id,
            chunk_id,
            score,
            document_id: None,
            page_number: None,
        }
    }

    fn group(items: Vec<PersistedItem>) -> PersistedGroup {
        PersistedGroup { items }
    }

    #[test]
    fn distinct_singletons_restore_as_and_all() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.restore_from_persisted(
            &[group(vec![item(1, 11, 2)]), group(vec![item(2, 21, 1)])],
            &catalog,
        );

        assert_eq!(engine.grouping_mode(), GroupingMode::AndAll);
        assert_eq!(engine.groups(), vec![vec![1], vec![2]]);
        assert_eq!(engine.get_chunk_score(11), 2);
        // Catalog supplies the chunk the record did not mention.
        assert_eq!(engine.selected_chunk_ids(), vec![11, 12, 21]);
    }

    #[test]
    fn multi_page_group_restores_as_custom() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.restore_from_persisted(
            &[
                group(vec![item(1, 11, 1), item(2, 21, 0)]),
                group(vec![item(3, 31, 1)]),
            ],
            &catalog,
        );

        assert_eq!(engine.grouping_mode(), GroupingMode::Custom);
        assert_eq!(engine.groups(), vec![vec![1, 2], vec![3]]);
        assert_eq!(engine.get_chunk_score(21), 0);
    }

    #[test]
    fn repeated_page_keeps_first_group_and_forces_custom() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.restore_from_persisted(
            &[
                group(vec![item(1, 11, 1)]),
                group(vec![item(2, 21, 1)]),
                group(vec![item(1, 12, 2)]),
            ],
            &catalog,
        );

        assert_eq!(engine.grouping_mode(), GroupingMode::Custom);
        assert_eq!(engine.groups(), vec![vec![1], vec![2]]);
        assert_eq!(engine.get_chunk_score(12), 2);
    }

    #[test]
    fn pages_outside_the_catalog_become_shells() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        let mut foreign = item(80, 801, 2);
        foreign.document_id = Some(8);
        foreign.page_number = Some(5);

        engine.restore_from_persisted(
            &[group(vec![foreign, item(80, 802, 1)]), group(vec![item(1, 11, 1)])],
            &catalog,
        );

        let shell = engine.item(80).expect("foreign page should be restored");
        assert_eq!(shell.page.chunk_ids, vec![801, 802]);
        assert_eq!(shell.page.document_id, 8);
        assert_eq!(shell.page.page_number, 5);
        assert_eq!(engine.get_chunk_score(801), 2);
        assert_eq!(engine.grouping_mode(), GroupingMode::AndAll);
    }

    #[test]
    fn stale_chunk_scores_are_dropped() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.restore_from_persisted(&[group(vec![item(2, 29, 0)])], &catalog);

        assert!(engine.is_in_evidence(2));
        assert!(engine.scored_chunks().is_empty());
        assert_eq!(engine.get_chunk_score(29), DEFAULT_SCORE);
    }

    #[test]
    fn restore_replaces_previous_state() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.add_evidence(3, &catalog);
        engine.set_grouping_mode(GroupingMode::Custom);
        engine.set_chunk_score(31, 0);

        engine.restore_from_persisted(&[group(vec![item(1, 11, 1)]), group(Vec::new())], &catalog);
        assert!(!engine.is_in_evidence(3));
        assert_eq!(engine.get_chunk_score(31), DEFAULT_SCORE);
        assert_eq!(engine.grouping(), &Grouping::AndAll);
    }

    #[test]
    fn and_all_round_trip_is_byte_identical() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.add_evidence(2, &catalog);
        engine.add_evidence(1, &catalog);
        engine.set_chunk_score(12, 0);
        let saved = engine.persisted_groups();
        let digest = engine.evidence_digest();

        let mut restored = EvidenceEngine::new();
        restored.restore_from_persisted(&saved, &catalog);
        assert_eq!(restored.persisted_groups(), saved);
        assert_eq!(restored.evidence_digest(), digest);
    }

    #[test]
    fn custom_round_trip_keeps_the_partition() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        for page_id in [1, 2, 3] {
            engine.add_evidence(page_id, &catalog);
        }
        engine.set_grouping_mode(GroupingMode::Custom);
        engine.merge_into_group(2, 1);

        let mut restored = EvidenceEngine::new();
        restored.restore_from_persisted(&engine.persisted_groups(), &catalog);
        assert_eq!(restored.grouping_mode(), GroupingMode::Custom);
        assert_eq!(restored.groups(), engine.groups());
    }

    #[test]
    fn relations_number_groups_and_orders_from_zero() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.add_evidence(1, &catalog);
        engine.add_evidence(2, &catalog);
        engine.set_chunk_score(21, 2);

        let rows = engine.retrieval_relations(9);
        let keys: Vec<_> = rows
            .iter()
            .map(|row| (row.group_index, row.group_order, row.chunk_id, row.score))
            .collect();
        assert_eq!(keys, vec![(0, 0, 11, 1), (0, 1, 12, 1), (1, 0, 21, 2)]);
        assert!(rows.iter().all(|row| row.query_id == 9));
    }

    #[test]
    fn digest_tracks_score_changes() {
        let catalog = catalog();
        let mut engine = EvidenceEngine::new();
        engine.add_evidence(1, &catalog);
        let before = engine.evidence_digest();

        engine.set_chunk_score(11, 2);
        assert_ne!(engine.evidence_digest(), before);
        engine.set_chunk_score(11, 1);
        assert_eq!(engine.evidence_digest(), before);
    }

    #[test]
    fn pages_without_chunks_do_not_survive_a_save() {
        let pages = [(1, vec![11, 12]), (2, vec![21]), (4, vec![])]
            .into_iter()
            .map(|(page_id, chunk_ids)| PageRef {
                page_id,
                document_id: 1,
                page_number: page_id as u32,
                chunk_ids,
            })
            .collect();
        let catalog =
            InMemoryCatalog::from_pages(1, "Pump manual", pages).expect("catalog should build");
        let mut engine = EvidenceEngine::new();
        engine.add_evidence(1, &catalog);
        engine.add_evidence(4, &catalog);
        engine.add_evidence(2, &catalog);
        engine.set_grouping_mode(GroupingMode::Custom);
        engine.merge_into_group(0, 4);
        assert_eq!(engine.groups(), vec![vec![1, 4], vec![2]]);

        let saved = engine.persisted_groups();
        assert!(saved.iter().flat_map(|group| &group.items).all(|item| item.page_id != 4));

        let mut restored = EvidenceEngine::new();
        restored.restore_from_persisted(&saved, &catalog);
        assert!(!restored.is_in_evidence(4));
        assert_eq!(restored.grouping_mode(), GroupingMode::AndAll);
        assert_eq!(restored.groups(), vec![vec![1], vec![2]]);
    }
}
