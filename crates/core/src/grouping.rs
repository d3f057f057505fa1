use crate::error::CurationError;
use crate::models::PageId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// Every evidence page is its own group.
    #[default]
    AndAll,
    /// Explicit groups; pages inside a group are alternatives.
    Custom,
}

impl std::str::FromStr for GroupingMode {
    type Err = CurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "and_all" | "andall" | "and-all" => Ok(Self::AndAll),
            "custom" => Ok(Self::Custom),
            other => Err(CurationError::InvalidArgument(format!(
                "unknown grouping mode: {other}"
            ))),
        }
    }
}

/// Pages that can stand in for one another as evidence. Membership is a set;
/// the vector only keeps output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pages: Vec<PageId>,
}

impl Group {
    pub fn singleton(page_id: PageId) -> Self {
        Self {
            pages: vec![page_id],
        }
    }

    pub fn page_ids(&self) -> &[PageId] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.contains(&page_id)
    }

    pub fn insert(&mut self, page_id: PageId) -> bool {
        if self.contains(page_id) {
            return false;
        }
        self.pages.push(page_id);
        true
    }

    pub fn remove(&mut self, page_id: PageId) -> bool {
        let before = self.pages.len();
        self.pages.retain(|id| *id != page_id);
        self.pages.len() != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Grouping {
    #[default]
    AndAll,
    Custom(Vec<Group>),
}

impl Grouping {
    pub fn mode(&self) -> GroupingMode {
        match self {
            Self::AndAll => GroupingMode::AndAll,
            Self::Custom(_) => GroupingMode::Custom,
        }
    }

    pub fn seeded(mode: GroupingMode, evidence_order: &[PageId]) -> Self {
        match mode {
            GroupingMode::AndAll => Self::AndAll,
            GroupingMode::Custom => Self::Custom(
                evidence_order
                    .iter()
                    .copied()
                    .map(Group::singleton)
                    .collect(),
            ),
        }
    }

    /// Removes a page from whichever group holds it and drops the group if
    /// that left it empty. Returns the index the page was found at.
    pub(crate) fn detach(&mut self, page_id: PageId) -> Option<usize> {
        let Self::Custom(groups) = self else {
            return None;
        };
        let index = groups.iter().position(|group| group.contains(page_id))?;
        groups[index].remove(page_id);
        if groups[index].is_empty() {
            groups.remove(index);
        }
        Some(index)
    }

    pub(crate) fn group_index_of(&self, page_id: PageId) -> Option<usize> {
        match self {
            Self::AndAll => None,
            Self::Custom(groups) => groups.iter().position(|group| group.contains(page_id)),
        }
    }
}
