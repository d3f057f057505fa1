use crate::models::{DisplayHint, PageId, PageRef};

/// Read-only view of the document currently being browsed.
///
/// Implementations own fetching and caching; by the time the engine asks,
/// the page list is already in memory.
pub trait PageCatalog {
    /// Pages of the open document in page order.
    fn current_pages(&self) -> &[PageRef];

    fn document_title(&self) -> String;

    fn thumbnail_for(&self, page_id: PageId) -> Option<DisplayHint>;

    fn find_page(&self, page_id: PageId) -> Option<&PageRef> {
        self.current_pages()
            .iter()
            .find(|page| page.page_id == page_id)
    }
}
