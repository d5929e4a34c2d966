/// What the cursor concluded from a freshly fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    /// The page is new; its entries should be yielded
    Advance,

    /// The page repeats the previous one; the walk is over
    WrappedAround,
}

/// Pagination cursor for a single region walk
///
/// Tracks which result page to request next and the first listing reference of
/// the most recently accepted page. The search backend answers a request past
/// its last page by serving the last page again, so seeing the same first
/// reference twice in a row marks the end of the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    page_index: u32,
    last_seen_marker: Option<String>,
}

impl PageCursor {
    /// Creates a cursor positioned at page 1
    pub fn new() -> Self {
        Self {
            page_index: 1,
            last_seen_marker: None,
        }
    }

    /// The 1-based index of the page to request next
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    /// First reference of the last accepted page, if any
    pub fn last_seen_marker(&self) -> Option<&str> {
        self.last_seen_marker.as_deref()
    }

    /// Records the first reference of the page just fetched
    ///
    /// On `Advance` the marker is replaced and the page index moves forward.
    /// On `WrappedAround` the cursor is left untouched.
    pub fn observe(&mut self, marker: &str) -> CursorStep {
        if self.last_seen_marker.as_deref() == Some(marker) {
            return CursorStep::WrappedAround;
        }

        self.last_seen_marker = Some(marker.to_string());
        self.page_index += 1;
        CursorStep::Advance
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new()
    }
}
