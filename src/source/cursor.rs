//! Keyset cursor and its persisted checkpoint form.

use crate::types::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a resumable read: the last `(timestamp, id)` seen plus a counter.
///
/// The position is a strict lower bound for the next page, so inserts that
/// land before it never shift what remains to be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_id: Option<i64>,
    pub processed_count: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no page has been read yet.
    pub fn is_start(&self) -> bool {
        self.last_timestamp.is_none() && self.last_id.is_none()
    }

    pub fn position(&self) -> Option<(DateTime<Utc>, i64)> {
        Some((self.last_timestamp?, self.last_id?))
    }

    /// Whether `item` sorts strictly after this cursor.
    pub fn precedes(&self, item: &Item) -> bool {
        match self.position() {
            Some(pos) => item.position() > pos,
            None => true,
        }
    }

    /// Move past `page`, whose last element becomes the new lower bound.
    pub fn advance(&mut self, page: &[Item]) {
        if let Some(last) = page.last() {
            self.last_timestamp = Some(last.timestamp);
            self.last_id = Some(last.id);
            self.processed_count += page.len();
        }
    }
}

/// Serialized cursor as stored between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_id: Option<i64>,
    pub read_count: usize,
}

impl From<&Cursor> for Checkpoint {
    fn from(c: &Cursor) -> Self {
        Self {
            last_timestamp: c.last_timestamp,
            last_id: c.last_id,
            read_count: c.processed_count,
        }
    }
}

impl From<Checkpoint> for Cursor {
    fn from(c: Checkpoint) -> Self {
        Self {
            last_timestamp: c.last_timestamp,
            last_id: c.last_id,
            processed_count: c.read_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: i64, secs: i64) -> Item {
        Item::new(id, "t", "c", Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn test_empty_cursor_precedes_everything() {
        let c = Cursor::new();
        assert!(c.is_start());
        assert!(c.precedes(&item(1, 0)));
    }

    #[test]
    fn test_advance_and_precedes() {
        let mut c = Cursor::new();
        c.advance(&[item(3, 100), item(5, 100)]);
        assert_eq!(c.processed_count, 2);
        assert_eq!(c.last_id, Some(5));
        // same timestamp, smaller or equal id: already seen
        assert!(!c.precedes(&item(5, 100)));
        assert!(!c.precedes(&item(4, 100)));
        // same timestamp, bigger id / later timestamp: still ahead
        assert!(c.precedes(&item(6, 100)));
        assert!(c.precedes(&item(1, 101)));
    }

    #[test]
    fn test_advance_on_empty_page_is_noop() {
        let mut c = Cursor::new();
        c.advance(&[]);
        assert_eq!(c, Cursor::new());
    }

    #[test]
    fn test_checkpoint_json_shape() {
        let mut c = Cursor::new();
        c.advance(&[item(9, 1_700_000_000)]);
        let json = serde_json::to_value(Checkpoint::from(&c)).unwrap();
        assert_eq!(json["last_id"], 9);
        assert_eq!(json["read_count"], 1);
        let back: Checkpoint = serde_json::from_value(json).unwrap();
        assert_eq!(Cursor::from(back), c);
    }
}
