use std::collections::HashSet;

use crate::Item;

/// Monotonically growing, url-deduplicated set of items for one job.
///
/// Insertion order is kept so exports list posts in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accumulator {
    items: Vec<Item>,
    seen: HashSet<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a batch, keeping the first observation of every url.
    /// Returns how many items were new.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = Item>) -> usize {
        let before = self.items.len();
        for item in batch {
            if self.seen.insert(item.url.clone()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.seen.clear();
    }
}
