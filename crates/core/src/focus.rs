use crate::models::{PageId, PageRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

/// Browsing cursor over the catalog's pages. Independent of evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusTracker {
    focused: Option<PageId>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<PageId> {
        self.focused
    }

    pub fn is_focused(&self, page_id: PageId) -> bool {
        self.focused == Some(page_id)
    }

    pub fn focus(&mut self, page_id: PageId) {
        self.focused = Some(page_id);
    }

    pub fn clear_focus(&mut self) {
        self.focused = None;
    }

    /// Steps to the neighbouring page in document order. Stops at either end.
    /// A focus that is not part of `pages` counts as no focus.
    pub fn focus_adjacent(&mut self, direction: Direction, pages: &[PageRef]) -> Option<PageId> {
        let current = self
            .focused
            .and_then(|id| pages.iter().position(|page| page.page_id == id));

        let next = match (current, direction) {
            (None, Direction::Forward) => pages.first(),
            (None, Direction::Backward) => pages.last(),
            (Some(index), Direction::Forward) => pages.get(index + 1),
            (Some(index), Direction::Backward) => index
                .checked_sub(1)
                .and_then(|previous| pages.get(previous)),
        };

        if let Some(page) = next {
            self.focused = Some(page.page_id);
        }
        self.focused
    }
}
