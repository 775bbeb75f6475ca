use crate::filter::FilterState;
use crate::track::TrackRecord;

/// Cursor over the filtered view.
///
/// The view holds catalog indices, so a record's identity is its position in
/// the catalog and survives re-filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionCursor {
    view: Vec<usize>,
    index: usize,
}

impl SelectionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog indices passing the filter, in catalog order.
    pub fn view(&self) -> &[usize] {
        &self.view
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Catalog index of the selected record, `None` for an empty view.
    pub fn selected(&self) -> Option<usize> {
        self.view.get(self.index).copied()
    }

    /// Step one row.  Stops at either end.
    pub fn move_vertical(&mut self, toward_end: bool) {
        if toward_end {
            if self.index + 1 < self.view.len() {
                self.index += 1;
            }
        } else if self.index > 0 {
            self.index -= 1;
        }
    }

    /// Reserved for paging; does nothing.
    pub fn move_horizontal(&mut self, _toward_end: bool) {}

    /// Rebuild the view from `catalog`.  The selected record keeps the
    /// cursor if it still passes; otherwise the cursor goes back to the top.
    pub fn reapply(&mut self, catalog: &[TrackRecord], filter: &FilterState) {
        let previous = self.selected();

        self.view = catalog
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.includes(record))
            .map(|(ix, _)| ix)
            .collect();

        self.index = previous
            .and_then(|prev| self.view.iter().position(|&ix| ix == prev))
            .unwrap_or(0);
    }
}
