// src/core/storage/zset.rs

use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, btree_set};
use std::hash::{Hash, Hasher};

/// Represents a single entry in a Sorted Set, containing a member and its score.
/// This struct implements `Ord`, `PartialEq`, etc., to allow it to be stored
/// in a `BTreeSet`, which keeps the entries sorted by score, then by member.
#[derive(Debug, Clone)]
pub struct ZSetEntry {
    pub score: f64,
    pub member: Bytes,
}

impl Ord for ZSetEntry {
    /// Defines the primary sorting order for entries: first by score, then lexicographically by member.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.member.cmp(&other.member))
    }
}

impl PartialOrd for ZSetEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ZSetEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.member == other.member
    }
}

impl Eq for ZSetEntry {}

impl Hash for ZSetEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Only the member is used for hashing, as it's the unique identifier within the set.
        self.member.hash(state);
    }
}

/// The main Sorted Set data structure.
/// It uses a `HashMap` for fast O(1) lookups of a member's score and a `BTreeSet`
/// to keep the entries sorted by score and member for efficient range queries.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    /// Fast member-to-score lookups.
    members: HashMap<Bytes, f64>,
    /// Entries sorted by score, then member.
    sorted: BTreeSet<ZSetEntry>,
}

impl SortedSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, ZSetEntry> {
        self.sorted.iter()
    }

    /// Adds or updates a member in the sorted set.
    /// Returns `true` if a new member was added, `false` if an existing
    /// member's score was updated (or left unchanged).
    pub fn add(&mut self, score: f64, member: Bytes) -> bool {
        if let Some(old_score) = self.members.insert(member.clone(), score) {
            if old_score != score {
                self.sorted.remove(&ZSetEntry {
                    score: old_score,
                    member: member.clone(),
                });
                self.sorted.insert(ZSetEntry { score, member });
            }
            false
        } else {
            self.sorted.insert(ZSetEntry { score, member });
            true
        }
    }

    /// Removes a member from the set. Returns `true` if the member was present.
    pub fn remove(&mut self, member: &Bytes) -> bool {
        if let Some(score) = self.members.remove(member) {
            self.sorted.remove(&ZSetEntry {
                score,
                member: member.clone(),
            });
            true
        } else {
            false
        }
    }

    pub fn get_score(&self, member: &Bytes) -> Option<f64> {
        self.members.get(member).copied()
    }

    pub fn contains_member(&self, member: &Bytes) -> bool {
        self.members.contains_key(member)
    }

    /// Returns the 0-based rank of a member, sorted from lowest to highest score.
    pub fn get_rank(&self, member: &Bytes) -> Option<usize> {
        self.members
            .get(member)
            .and_then(|_score| self.sorted.iter().position(|entry| entry.member == *member))
    }

    /// Returns a range of entries by rank (0-based index). Negative indices
    /// count from the tail; out-of-range bounds are clamped, not rejected.
    pub fn get_range(&self, start: i64, stop: i64) -> Vec<ZSetEntry> {
        let len = self.len() as i64;
        if len == 0 {
            return vec![];
        }
        let start = if start < 0 { len + start } else { start }.max(0);
        let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
        if start > stop || start >= len {
            return vec![];
        }
        self.sorted
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_score_then_member() {
        let mut zset = SortedSet::new();
        zset.add(2.0, Bytes::from_static(b"b"));
        zset.add(1.0, Bytes::from_static(b"z"));
        zset.add(2.0, Bytes::from_static(b"a"));
        let members: Vec<_> = zset.iter().map(|e| e.member.clone()).collect();
        assert_eq!(
            members,
            vec![
                Bytes::from_static(b"z"),
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b")
            ]
        );
    }

    #[test]
    fn add_existing_member_updates_score_without_growing() {
        let mut zset = SortedSet::new();
        assert!(zset.add(1.0, Bytes::from_static(b"m")));
        assert!(!zset.add(5.0, Bytes::from_static(b"m")));
        assert_eq!(zset.len(), 1);
        assert_eq!(zset.get_score(&Bytes::from_static(b"m")), Some(5.0));
        assert_eq!(zset.get_rank(&Bytes::from_static(b"m")), Some(0));
    }

    #[test]
    fn range_clamps_negative_indices() {
        let mut zset = SortedSet::new();
        for (i, m) in [b"a", b"b", b"c"].iter().enumerate() {
            zset.add(i as f64, Bytes::copy_from_slice(*m));
        }
        let all = zset.get_range(0, -1);
        assert_eq!(all.len(), 3);
        let tail = zset.get_range(-2, -1);
        assert_eq!(tail[0].member, Bytes::from_static(b"b"));
        assert!(zset.get_range(5, 10).is_empty());
    }
}
