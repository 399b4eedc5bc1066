//! Per-element navigation sequencing and cooperative cancellation.
//!
//! Capability resolution can complete after a newer navigation of the same
//! element has started. Each navigation takes a [`NavigationTicket`] carrying
//! a monotonically increasing sequence number; starting a newer navigation
//! cancels the older ticket, and a completion is only accepted from the most
//! recent ticket of its element (last writer wins).
//!
//! ```
//! use wb_core::{NavigableId, ViewId};
//! use wb_runtime::sequencer::NavigationSequencer;
//!
//! let mut sequencer = NavigationSequencer::new();
//! let view = NavigableId::from(ViewId::parse("view.1").unwrap());
//! let first = sequencer.begin(view.clone());
//! let second = sequencer.begin(view);
//! assert!(first.is_cancelled());
//! assert!(!sequencer.complete(&first));
//! assert!(sequencer.complete(&second));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use tracing::debug;
use wb_core::NavigableId;

/// A cloneable cancellation signal.
///
/// Resolvers running off the UI thread poll [`is_cancelled`](Self::is_cancelled)
/// to stop early once their result can no longer be used.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// The control side of a [`CancellationToken`].
///
/// Dropping the source does **not** cancel its tokens.
#[derive(Debug)]
pub struct CancellationSource {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle of one in-flight navigation.
#[derive(Debug, Clone)]
pub struct NavigationTicket {
    element: NavigableId,
    sequence: u64,
    token: CancellationToken,
}

impl NavigationTicket {
    #[must_use]
    pub fn element(&self) -> &NavigableId {
        &self.element
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct InFlight {
    sequence: u64,
    source: CancellationSource,
}

/// Issues tickets and arbitrates completions per element.
///
/// # Invariants
///
/// 1. Sequence numbers never repeat.
/// 2. At most one uncancelled ticket exists per element.
#[derive(Debug, Default)]
pub struct NavigationSequencer {
    next_sequence: u64,
    in_flight: FxHashMap<NavigableId, InFlight>,
}

impl NavigationSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a navigation of `element`, cancelling any older one.
    pub fn begin(&mut self, element: NavigableId) -> NavigationTicket {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        let source = CancellationSource::new();
        let token = source.token();
        if let Some(previous) = self
            .in_flight
            .insert(element.clone(), InFlight { sequence, source })
        {
            previous.source.cancel();
            debug!(
                element = %element,
                superseded = previous.sequence,
                sequence,
                "navigation superseded"
            );
        }
        NavigationTicket {
            element,
            sequence,
            token,
        }
    }

    /// Whether `ticket` is still the latest navigation of its element.
    #[must_use]
    pub fn is_current(&self, ticket: &NavigationTicket) -> bool {
        self.in_flight
            .get(&ticket.element)
            .is_some_and(|flight| flight.sequence == ticket.sequence)
    }

    /// Accept or discard the completion of `ticket`.
    ///
    /// Returns `true` exactly once for the latest ticket of an element.
    pub fn complete(&mut self, ticket: &NavigationTicket) -> bool {
        if !self.is_current(ticket) {
            debug!(
                element = %ticket.element,
                sequence = ticket.sequence,
                "discarding stale navigation result"
            );
            return false;
        }
        let _ = self.in_flight.remove(&ticket.element);
        true
    }

    /// Record a synchronous navigation of `element`; in-flight ones lose.
    pub fn supersede(&mut self, element: &NavigableId) {
        self.next_sequence += 1;
        if let Some(previous) = self.in_flight.remove(element) {
            previous.source.cancel();
        }
    }

    /// Cancel everything, e.g. on reload.
    pub fn reset(&mut self) {
        for (_, flight) in self.in_flight.drain() {
            flight.source.cancel();
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wb_core::{PartId, ViewId};

    fn view(id: &str) -> NavigableId {
        NavigableId::from(ViewId::parse(id).unwrap())
    }

    #[test]
    fn cancellation_source_and_token() {
        let source = CancellationSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
        assert!(source.is_cancelled());
    }

    #[test]
    fn dropping_source_does_not_cancel() {
        let token = CancellationSource::new().token();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn sequences_increase_monotonically() {
        let mut sequencer = NavigationSequencer::new();
        let a = sequencer.begin(view("view.1"));
        let b = sequencer.begin(view("view.2"));
        let c = sequencer.begin(view("view.1"));
        assert!(a.sequence() < b.sequence() && b.sequence() < c.sequence());
    }

    #[test]
    fn newer_ticket_wins_regardless_of_completion_order() {
        let mut sequencer = NavigationSequencer::new();
        let old = sequencer.begin(view("view.1"));
        let new = sequencer.begin(view("view.1"));
        assert!(sequencer.complete(&new));
        assert!(!sequencer.complete(&old));
        assert!(old.is_cancelled());
        assert!(!new.is_cancelled());
    }

    #[test]
    fn elements_are_independent() {
        let mut sequencer = NavigationSequencer::new();
        let v = sequencer.begin(view("view.1"));
        let p = sequencer.begin(NavigableId::from(PartId::parse("part.left").unwrap()));
        assert!(sequencer.complete(&p));
        assert!(sequencer.complete(&v));
        assert_eq!(sequencer.in_flight(), 0);
    }

    #[test]
    fn completion_is_accepted_once() {
        let mut sequencer = NavigationSequencer::new();
        let ticket = sequencer.begin(view("view.1"));
        assert!(sequencer.complete(&ticket));
        assert!(!sequencer.complete(&ticket));
    }

    #[test]
    fn supersede_and_reset_cancel_in_flight() {
        let mut sequencer = NavigationSequencer::new();
        let a = sequencer.begin(view("view.1"));
        sequencer.supersede(&view("view.1"));
        assert!(a.is_cancelled());
        assert!(!sequencer.is_current(&a));

        let b = sequencer.begin(view("view.2"));
        sequencer.reset();
        assert!(b.is_cancelled());
        assert_eq!(sequencer.in_flight(), 0);
    }
}
