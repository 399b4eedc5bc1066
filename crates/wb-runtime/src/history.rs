//! Browser history of committed layouts.
//!
//! Every committed navigation pushes a [`HistoryEntry`] holding the URL and
//! the full layout, navigation states included. Back and forward restore
//! that exact layout; states survive history traversal even though the URL
//! never carries them.
//!
//! ```text
//! push(e3)
//!   back:    [e0, e1, e2, e3]   (current at the back)
//!   forward: []
//!
//! back() x2
//!   back:    [e0, e1]
//!   forward: [e3, e2]           (most recently left at the back)
//!
//! push(e4)  clears forward
//!   back:    [e0, e1, e4]
//!   forward: []
//! ```
//!
//! Entries are `Arc`s over layouts built from persistent maps, so keeping a
//! long history shares most of its memory.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use wb_layout::WorkbenchLayout;

use crate::config::DEFAULT_HISTORY_DEPTH;

/// One browser history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub url: String,
    /// Layout including every element's navigation state.
    pub layout: WorkbenchLayout,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(url: impl Into<String>, layout: WorkbenchLayout) -> Self {
        Self {
            url: url.into(),
            layout,
        }
    }
}

/// Back/forward stacks of history entries.
///
/// # Invariants
///
/// 1. `back` is never empty once the first entry is pushed.
/// 2. `back.len() <= max_depth`.
/// 3. `forward` is cleared on every push.
pub struct BrowserHistory {
    back: VecDeque<Arc<HistoryEntry>>,
    forward: Vec<Arc<HistoryEntry>>,
    max_depth: usize,
}

impl fmt::Debug for BrowserHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserHistory")
            .field("back_depth", &self.back.len())
            .field("forward_depth", &self.forward.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Default for BrowserHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl BrowserHistory {
    /// A `max_depth` of zero is raised to one: the current entry is always kept.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            back: VecDeque::new(),
            forward: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    // ====================================================================
    // Core Operations
    // ====================================================================

    /// Push a new entry, clearing the forward stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.forward.clear();
        self.back.push_back(Arc::new(entry));
        while self.back.len() > self.max_depth {
            let _ = self.back.pop_front();
        }
    }

    /// Replace the current entry in place (no new entry).
    pub fn replace_current(&mut self, entry: HistoryEntry) {
        let _ = self.back.pop_back();
        self.back.push_back(Arc::new(entry));
    }

    /// Step back; returns the entry that became current.
    pub fn back(&mut self) -> Option<Arc<HistoryEntry>> {
        if self.back.len() < 2 {
            return None;
        }
        let left = self.back.pop_back()?;
        self.forward.push(left);
        self.back.back().cloned()
    }

    /// Step forward; returns the entry that became current.
    pub fn forward(&mut self) -> Option<Arc<HistoryEntry>> {
        let entry = self.forward.pop()?;
        self.back.push_back(entry);
        self.back.back().cloned()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Arc<HistoryEntry>> {
        self.back.back()
    }

    // ====================================================================
    // Query
    // ====================================================================

    #[must_use]
    pub fn can_go_back(&self) -> bool {
        self.back.len() >= 2
    }

    #[must_use]
    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Entries on the back stack, current included.
    #[must_use]
    pub fn back_depth(&self) -> usize {
        self.back.len()
    }

    #[must_use]
    pub fn forward_depth(&self) -> usize {
        self.forward.len()
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.back.is_empty()
    }

    // ====================================================================
    // Maintenance
    // ====================================================================

    /// Drop the navigation state of every entry, as a page reload does.
    pub fn discard_states(&mut self) {
        let strip = |entry: &Arc<HistoryEntry>| {
            Arc::new(HistoryEntry::new(
                entry.url.clone(),
                entry.layout.without_states(),
            ))
        };
        self.back = self.back.iter().map(strip).collect();
        self.forward = self.forward.iter().map(strip).collect();
    }

    pub fn clear(&mut self) {
        self.back.clear();
        self.forward.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wb_core::PartId;
    use wb_layout::{PartLocation, PartMetadata};

    fn entry(url: &str) -> HistoryEntry {
        HistoryEntry::new(url, WorkbenchLayout::new())
    }

    #[test]
    fn new_history_is_empty() {
        let history = BrowserHistory::default();
        assert!(history.is_empty());
        assert!(!history.can_go_back());
        assert!(!history.can_go_forward());
        assert!(history.current().is_none());
    }

    #[test]
    fn back_and_forward_walk_the_stacks() {
        let mut history = BrowserHistory::default();
        for url in ["/a", "/b", "/c"] {
            history.push(entry(url));
        }
        assert_eq!(history.back().unwrap().url, "/b");
        assert_eq!(history.back().unwrap().url, "/a");
        assert!(history.back().is_none());
        assert_eq!(history.forward().unwrap().url, "/b");
        assert_eq!(history.forward().unwrap().url, "/c");
        assert!(history.forward().is_none());
        assert_eq!(history.current().unwrap().url, "/c");
    }

    #[test]
    fn push_clears_forward() {
        let mut history = BrowserHistory::default();
        history.push(entry("/a"));
        history.push(entry("/b"));
        let _ = history.back();
        assert!(history.can_go_forward());
        history.push(entry("/c"));
        assert!(!history.can_go_forward());
        assert_eq!(history.back().unwrap().url, "/a");
    }

    #[test]
    fn depth_limit_evicts_oldest() {
        let mut history = BrowserHistory::new(2);
        for url in ["/a", "/b", "/c"] {
            history.push(entry(url));
        }
        assert_eq!(history.back_depth(), 2);
        assert_eq!(history.back().unwrap().url, "/b");
        assert!(history.back().is_none());
    }

    #[test]
    fn replace_current_keeps_depth() {
        let mut history = BrowserHistory::default();
        history.push(entry("/a"));
        history.push(entry("/b"));
        history.replace_current(entry("/b2"));
        assert_eq!(history.back_depth(), 2);
        assert_eq!(history.current().unwrap().url, "/b2");
        assert_eq!(history.back().unwrap().url, "/a");
    }

    #[test]
    fn discard_states_strips_every_entry() {
        let mut state = wb_core::NavigationState::new();
        let _ = state.insert("k".into(), serde_json::json!("v"));
        let layout = WorkbenchLayout::new()
            .add_part(PartId::main_area(), PartLocation::Root, PartMetadata::default())
            .unwrap()
            .navigate_part(
                &PartId::main_area(),
                vec!["home".into()],
                wb_layout::NavigateOptions::default().with_state(state),
            )
            .unwrap();
        let mut history = BrowserHistory::default();
        history.push(HistoryEntry::new("/a", layout.clone()));
        history.push(HistoryEntry::new("/b", layout.clone()));
        let _ = history.back();

        history.discard_states();
        assert_eq!(history.current().unwrap().layout, layout.without_states());
        assert_eq!(history.forward().unwrap().layout, layout.without_states());
    }
}
