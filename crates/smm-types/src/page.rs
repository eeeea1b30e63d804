use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// One-based pagination window, as sent in `?page=&per_page=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for Page {
    fn default() -> Self {
        Page {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Page {
    pub fn limit(&self) -> usize {
        self.per_page.clamp(1, MAX_PER_PAGE) as usize
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit()
    }

    /// Applies the window to an already ordered iterator.
    pub fn slice<T, I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit())
            .collect()
    }
}
