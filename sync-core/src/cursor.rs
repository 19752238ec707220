//! Receive side of list synchronization.
//!
//! The receiver keeps a single cursor, the id it expects next, and reports
//! it back to the sender. Elements at or after the cursor are new; older
//! ones are duplicates from a repeated segment. An element with id 0 means
//! the sender restarted its log, so the cursor starts over.
//!
//! Once id `u32::MAX` has been received the cursor sits past the id space:
//! it is reported as `u32::MAX`, and later copies of that element are
//! duplicates until the sender restarts at id 0.

use crate::buffer::Indexed;

/// Result of receiving one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ListUpdate<T> {
    /// Cursor to report back to the sender.
    pub next_expected: u32,
    /// Elements not seen before, in the order received.
    pub new_elements: Vec<T>,
}

/// Tracks the next expected id of a replicated log.
#[derive(Debug, Clone, Default)]
pub struct ListReceiver {
    next_expected: u64,
}

impl ListReceiver {
    /// Create a receiver expecting id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a receiver resuming at a specific cursor.
    pub fn with_cursor(next_expected: u32) -> Self {
        Self {
            next_expected: u64::from(next_expected),
        }
    }

    /// Process the elements of one segment.
    ///
    /// Returns `None` for an empty segment.
    pub fn receive<T: Indexed + Clone>(&mut self, elements: &[T]) -> Option<ListUpdate<T>> {
        if elements.is_empty() {
            return None;
        }

        let mut new_elements = Vec::new();
        for element in elements {
            let id = u64::from(element.id());
            if id == 0 {
                self.next_expected = 0;
            }
            if id >= self.next_expected {
                self.next_expected = id + 1;
                new_elements.push(element.clone());
            }
        }

        Some(ListUpdate {
            next_expected: self.next_expected(),
            new_elements,
        })
    }

    /// The id expected next, saturated at `u32::MAX`.
    pub fn next_expected(&self) -> u32 {
        u32::try_from(self.next_expected).unwrap_or(u32::MAX)
    }

    /// Start over at id 0.
    pub fn reset(&mut self) {
        self.next_expected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Element(u32);

    impl Indexed for Element {
        fn id(&self) -> u32 {
            self.0
        }

        fn set_id(&mut self, id: u32) {
            self.0 = id;
        }
    }

    fn segment(ids: std::ops::Range<u32>) -> Vec<Element> {
        ids.map(Element).collect()
    }

    fn new_ids(update: &ListUpdate<Element>) -> Vec<u32> {
        update.new_elements.iter().map(|e| e.0).collect()
    }

    #[test]
    fn receiver_starts_at_zero() {
        assert_eq!(ListReceiver::new().next_expected(), 0);
        assert_eq!(ListReceiver::with_cursor(12).next_expected(), 12);
    }

    #[test]
    fn empty_segment_yields_nothing() {
        let mut receiver = ListReceiver::new();
        assert!(receiver.receive::<Element>(&[]).is_none());
    }

    #[test]
    fn consecutive_segments_advance_cursor() {
        let mut receiver = ListReceiver::new();

        let update = receiver.receive(&segment(0..5)).unwrap();
        assert_eq!(update.next_expected, 5);
        assert_eq!(new_ids(&update), vec![0, 1, 2, 3, 4]);

        let update = receiver.receive(&segment(5..10)).unwrap();
        assert_eq!(update.next_expected, 10);
        assert_eq!(new_ids(&update), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn overlapping_segment_only_yields_new_elements() {
        let mut receiver = ListReceiver::with_cursor(10);
        let update = receiver.receive(&segment(7..11)).unwrap();
        assert_eq!(update.next_expected, 11);
        assert_eq!(new_ids(&update), vec![10]);
    }

    #[test]
    fn repeated_segment_yields_no_new_elements() {
        let mut receiver = ListReceiver::new();
        receiver.receive(&segment(1..4)).unwrap();

        let update = receiver.receive(&segment(1..4)).unwrap();
        assert_eq!(update.next_expected, 4);
        assert!(update.new_elements.is_empty());
    }

    #[test]
    fn id_zero_restarts_cursor() {
        let mut receiver = ListReceiver::new();
        receiver.receive(&segment(0..11)).unwrap();
        assert_eq!(receiver.next_expected(), 11);

        let update = receiver.receive(&segment(0..1)).unwrap();
        assert_eq!(update.next_expected, 1);
        assert_eq!(new_ids(&update), vec![0]);

        let update = receiver.receive(&segment(0..4)).unwrap();
        assert_eq!(update.next_expected, 4);
        assert_eq!(new_ids(&update), vec![0, 1, 2, 3]);
    }

    #[test]
    fn gap_in_ids_skips_forward() {
        let mut receiver = ListReceiver::new();
        let update = receiver
            .receive(&[Element(3), Element(8), Element(9)])
            .unwrap();
        assert_eq!(update.next_expected, 10);
        assert_eq!(new_ids(&update), vec![3, 8, 9]);
    }

    #[test]
    fn last_id_is_accepted_once() {
        let mut receiver = ListReceiver::with_cursor(u32::MAX - 1);
        let last = [Element(u32::MAX - 1), Element(u32::MAX)];

        let update = receiver.receive(&last).unwrap();
        assert_eq!(new_ids(&update), vec![u32::MAX - 1, u32::MAX]);
        assert_eq!(update.next_expected, u32::MAX);

        let update = receiver.receive(&last).unwrap();
        assert!(update.new_elements.is_empty());
        assert_eq!(update.next_expected, u32::MAX);

        // A restarted sender is still picked up.
        let update = receiver.receive(&segment(0..2)).unwrap();
        assert_eq!(new_ids(&update), vec![0, 1]);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut receiver = ListReceiver::with_cursor(6);
        receiver.reset();
        assert_eq!(receiver.next_expected(), 0);
    }
}
