use crate::Attribute;

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: u32 = 10;

/// One entry in a lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub attributes: Vec<Attribute>,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: Vec::new(),
        }
    }
}

/// Paged candidate list shown by the candidate window.
///
/// `cursor` and `page_start` are absolute indices into `candidates`; the
/// page view is derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTable {
    pub page_size: u32,
    pub page_start: u32,
    pub cursor: u32,
    pub cursor_visible: bool,
    pub candidates: Vec<Candidate>,
    pub labels: Vec<String>,
}

impl Default for LookupTable {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl LookupTable {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            page_start: 0,
            cursor: 0,
            cursor_visible: true,
            candidates: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn append(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.page_start = 0;
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
        self.page_start = (self.cursor / self.page_size) * self.page_size;
    }

    /// Candidates on the current page.
    pub fn current_page(&self) -> &[Candidate] {
        let start = (self.page_start as usize).min(self.candidates.len());
        let end = (start + self.page_size as usize).min(self.candidates.len());
        &self.candidates[start..end]
    }

    pub fn page_up(&mut self) -> bool {
        if self.page_start == 0 {
            return false;
        }
        self.page_start = self.page_start.saturating_sub(self.page_size);
        self.cursor = self.page_start;
        true
    }

    pub fn page_down(&mut self) -> bool {
        let next = self.page_start + self.page_size;
        if next as usize >= self.candidates.len() {
            return false;
        }
        self.page_start = next;
        self.cursor = next;
        true
    }

    /// Absolute index of the `index`-th candidate on the current page.
    pub fn index_in_page(&self, index: u32) -> Option<usize> {
        if index >= self.page_size {
            return None;
        }
        let absolute = (self.page_start + index) as usize;
        (absolute < self.candidates.len()).then_some(absolute)
    }
}
