//! Rating frames and item popularity
//!
//! A `RatingFrame` is an ordered table of `RatingRecord`s. Duplicate
//! (user, item) pairs are kept as-is. All grouping helpers follow the
//! order in which keys first appear in the frame.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::RatingRecord;

// ============================================================================
// Rating Frame
// ============================================================================

/// Ordered table of rating records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingFrame {
    records: Vec<RatingRecord>,
}

impl RatingFrame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a frame from existing records
    pub fn from_records(records: Vec<RatingRecord>) -> Self {
        Self { records }
    }

    /// Build a frame from (user, item, rating) triples
    pub fn from_triples<U, I>(triples: impl IntoIterator<Item = (U, I, f64)>) -> Self
    where
        U: Into<String>,
        I: Into<String>,
    {
        Self {
            records: triples
                .into_iter()
                .map(|(user, item, rating)| RatingRecord::new(user, item, rating))
                .collect(),
        }
    }

    /// Append a record
    pub fn push(&mut self, record: RatingRecord) {
        self.records.push(record);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over rows in order
    pub fn iter(&self) -> std::slice::Iter<'_, RatingRecord> {
        self.records.iter()
    }

    /// Borrow the underlying rows
    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    /// Distinct users in first-appearance order
    pub fn users(&self) -> Vec<&str> {
        distinct_in_order(self.records.iter().map(|r| r.user_id.as_str()))
    }

    /// Distinct items in first-appearance order
    pub fn items(&self) -> Vec<&str> {
        distinct_in_order(self.records.iter().map(|r| r.item_id.as_str()))
    }

    /// Set of distinct users
    pub fn user_set(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.user_id.clone()).collect()
    }

    /// Set of distinct items
    pub fn item_set(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.item_id.as_str()).collect()
    }

    /// Group rows by user, users in first-appearance order
    pub fn group_by_user(&self) -> Vec<(&str, Vec<&RatingRecord>)> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(&str, Vec<&RatingRecord>)> = Vec::new();

        for record in &self.records {
            let user = record.user_id.as_str();
            match index.get(user) {
                Some(&pos) => groups[pos].1.push(record),
                None => {
                    index.insert(user, groups.len());
                    groups.push((user, vec![record]));
                }
            }
        }

        groups
    }

    /// Keep only the rows of the given users
    pub fn select_users(&self, users: &BTreeSet<String>) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| users.contains(&r.user_id))
                .cloned()
                .collect(),
        }
    }
}

impl FromIterator<RatingRecord> for RatingFrame {
    fn from_iter<T: IntoIterator<Item = RatingRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RatingFrame {
    type Item = &'a RatingRecord;
    type IntoIter = std::slice::Iter<'a, RatingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn distinct_in_order<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    keys.filter(|k| seen.insert(*k)).collect()
}

// ============================================================================
// Item Popularity
// ============================================================================

/// Occurrence counts of items in a frame.
///
/// Lookups of unknown items return 0.
#[derive(Debug, Clone, Default)]
pub struct ItemPopularity {
    /// Items in first-appearance order, used to break ties
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl ItemPopularity {
    /// Count item occurrences in a frame
    pub fn from_frame(frame: &RatingFrame) -> Self {
        Self::from_items(frame.iter().map(|r| r.item_id.as_str()))
    }

    /// Count occurrences of arbitrary item ids
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        let mut popularity = Self::default();
        for item in items {
            match popularity.counts.get_mut(item) {
                Some(count) => *count += 1,
                None => {
                    popularity.order.push(item.to_string());
                    popularity.counts.insert(item.to_string(), 1);
                }
            }
        }
        popularity
    }

    /// Occurrence count of an item (0 if never seen)
    pub fn get(&self, item: &str) -> usize {
        self.counts.get(item).copied().unwrap_or(0)
    }

    /// Number of distinct items
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no item was counted
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Items sorted by descending count; ties keep first-appearance order
    pub fn most_common(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .order
            .iter()
            .map(|item| (item.as_str(), self.get(item)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// The `n` most common items
    pub fn most_common_n(&self, n: usize) -> Vec<(&str, usize)> {
        let mut ranked = self.most_common();
        ranked.truncate(n);
        ranked
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> RatingFrame {
        RatingFrame::from_triples([
            ("u2", "i1", 3.0),
            ("u1", "i2", 4.0),
            ("u2", "i3", 5.0),
            ("u1", "i1", 1.0),
            ("u1", "i1", 2.0),
        ])
    }

    #[test]
    fn test_users_first_appearance_order() {
        let frame = sample_frame();
        assert_eq!(frame.users(), vec!["u2", "u1"]);
        assert_eq!(frame.items(), vec!["i1", "i2", "i3"]);
    }

    #[test]
    fn test_duplicates_are_retained() {
        let frame = sample_frame();
        assert_eq!(frame.len(), 5);

        let groups = frame.group_by_user();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "u2");
        assert_eq!(groups[1].1.len(), 3);
    }

    #[test]
    fn test_select_users() {
        let frame = sample_frame();
        let users: BTreeSet<String> = ["u2".to_string()].into_iter().collect();
        let selected = frame.select_users(&users);

        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|r| r.user_id == "u2"));
    }

    #[test]
    fn test_empty_frame() {
        let frame = RatingFrame::new();
        assert!(frame.is_empty());
        assert!(frame.group_by_user().is_empty());
        assert!(ItemPopularity::from_frame(&frame).is_empty());
    }

    #[test]
    fn test_item_popularity_counts() {
        let popularity = ItemPopularity::from_frame(&sample_frame());

        assert_eq!(popularity.get("i1"), 3);
        assert_eq!(popularity.get("i2"), 1);
        assert_eq!(popularity.get("unknown"), 0);
        assert_eq!(popularity.len(), 3);
    }

    #[test]
    fn test_most_common_is_stable_on_ties() {
        let popularity = ItemPopularity::from_items(["b", "a", "c", "a", "c", "d"]);
        let ranked = popularity.most_common();

        assert_eq!(ranked, vec![("a", 2), ("c", 2), ("b", 1), ("d", 1)]);
        assert_eq!(popularity.most_common_n(1), vec![("a", 2)]);
    }
}
