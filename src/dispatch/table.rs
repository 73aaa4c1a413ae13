//! Pure subscription bookkeeping
//!
//! Entries are keyed by topic filter. Each filter carries the highest QoS
//! any of its entries asked for and the list of handlers attached to it.
//! The table reports when wire traffic is due; it never performs any.

use crate::engine::topics::qos_level;
use crate::engine::QoS;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Stable identifier of one subscription entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug)]
struct FilterEntry<H> {
    max_qos: QoS,
    handlers: Vec<(SubscriptionId, H)>,
}

/// Result of adding an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub id: SubscriptionId,
    /// QoS to SUBSCRIBE with, when the filter is new or its QoS went up
    pub wire_qos: Option<QoS>,
}

/// Result of removing an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removed {
    /// Unknown id, or already removed
    Absent,
    /// Other entries still use the filter
    Remaining,
    /// That was the filter's last entry; UNSUBSCRIBE is due
    LastForFilter(String),
}

/// Filter-keyed multicast table of subscription entries
#[derive(Debug)]
pub struct SubscriptionTable<H> {
    next_id: u64,
    filters: BTreeMap<String, FilterEntry<H>>,
    index: HashMap<SubscriptionId, String>,
}

impl<H> Default for SubscriptionTable<H> {
    fn default() -> Self {
        Self {
            next_id: 1,
            filters: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<H> SubscriptionTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filter: &str, qos: QoS, handler: H) -> Inserted {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let wire_qos = match self.filters.get_mut(filter) {
            Some(entry) => {
                entry.handlers.push((id, handler));
                if qos_level(qos) > qos_level(entry.max_qos) {
                    entry.max_qos = qos;
                    Some(qos)
                } else {
                    None
                }
            }
            None => {
                self.filters.insert(
                    filter.to_string(),
                    FilterEntry {
                        max_qos: qos,
                        handlers: vec![(id, handler)],
                    },
                );
                Some(qos)
            }
        };

        self.index.insert(id, filter.to_string());
        Inserted { id, wire_qos }
    }

    pub fn remove(&mut self, id: SubscriptionId) -> Removed {
        let Some(filter) = self.index.remove(&id) else {
            return Removed::Absent;
        };

        let Some(entry) = self.filters.get_mut(&filter) else {
            return Removed::Absent;
        };
        entry.handlers.retain(|(entry_id, _)| *entry_id != id);

        if entry.handlers.is_empty() {
            self.filters.remove(&filter);
            Removed::LastForFilter(filter)
        } else {
            Removed::Remaining
        }
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Live entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Distinct live filters
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn max_qos(&self, filter: &str) -> Option<QoS> {
        self.filters.get(filter).map(|entry| entry.max_qos)
    }

    /// The desired-subscription set: every live filter with its max QoS
    pub fn desired(&self) -> Vec<(String, QoS)> {
        self.filters
            .iter()
            .map(|(filter, entry)| (filter.clone(), entry.max_qos))
            .collect()
    }
}

impl<H: Clone> SubscriptionTable<H> {
    /// Handlers of every entry whose filter matches `topic`, in filter order
    /// and then registration order
    pub fn matching<M>(&self, topic: &str, matches: M) -> Vec<(SubscriptionId, H)>
    where
        M: Fn(&str, &str) -> bool,
    {
        self.filters
            .iter()
            .filter(|(filter, _)| matches(filter, topic))
            .flat_map(|(_, entry)| entry.handlers.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::topic_matches;

    fn ids(matched: Vec<(SubscriptionId, &'static str)>) -> Vec<&'static str> {
        matched.into_iter().map(|(_, name)| name).collect()
    }

    #[test]
    fn test_first_entry_requests_subscribe() {
        let mut table = SubscriptionTable::new();

        let first = table.insert("a/b", QoS::AtMostOnce, "first");
        assert_eq!(first.wire_qos, Some(QoS::AtMostOnce));

        let second = table.insert("a/b", QoS::AtMostOnce, "second");
        assert_eq!(second.wire_qos, None);
        assert_ne!(first.id, second.id);

        assert_eq!(table.len(), 2);
        assert_eq!(table.filter_count(), 1);
    }

    #[test]
    fn test_qos_only_upgrades() {
        let mut table = SubscriptionTable::new();
        table.insert("a/b", QoS::AtLeastOnce, "one");

        let lower = table.insert("a/b", QoS::AtMostOnce, "zero");
        assert_eq!(lower.wire_qos, None);
        assert_eq!(table.max_qos("a/b"), Some(QoS::AtLeastOnce));

        let higher = table.insert("a/b", QoS::ExactlyOnce, "two");
        assert_eq!(higher.wire_qos, Some(QoS::ExactlyOnce));

        // Removing the entry that raised the QoS does not lower it
        table.remove(higher.id);
        assert_eq!(table.max_qos("a/b"), Some(QoS::ExactlyOnce));
    }

    #[test]
    fn test_last_removal_requests_unsubscribe() {
        let mut table = SubscriptionTable::new();
        let a = table.insert("x/+", QoS::AtMostOnce, "a");
        let b = table.insert("x/+", QoS::AtMostOnce, "b");

        assert_eq!(table.remove(a.id), Removed::Remaining);
        assert_eq!(table.remove(b.id), Removed::LastForFilter("x/+".to_string()));
        assert!(table.is_empty());
        assert_eq!(table.filter_count(), 0);
    }

    #[test]
    fn test_removing_absent_id_is_noop() {
        let mut table = SubscriptionTable::new();
        let a = table.insert("x", QoS::AtMostOnce, "a");

        assert_eq!(table.remove(a.id), Removed::LastForFilter("x".to_string()));
        assert_eq!(table.remove(a.id), Removed::Absent);
        assert!(!table.contains(a.id));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut table = SubscriptionTable::new();
        let a = table.insert("x", QoS::AtMostOnce, "a");
        table.remove(a.id);
        let b = table.insert("x", QoS::AtMostOnce, "b");
        assert!(b.id > a.id);
    }

    #[test]
    fn test_matching_across_overlapping_filters() {
        let mut table = SubscriptionTable::new();
        table.insert("x/+", QoS::AtMostOnce, "plus");
        table.insert("x/#", QoS::AtMostOnce, "hash");
        table.insert("x/y", QoS::AtMostOnce, "exact");
        table.insert("z/#", QoS::AtMostOnce, "other");

        let mut hits = ids(table.matching("x/y", topic_matches));
        hits.sort();
        assert_eq!(hits, vec!["exact", "hash", "plus"]);

        assert_eq!(ids(table.matching("x/y/z", topic_matches)), vec!["hash"]);
        assert!(table.matching("q", topic_matches).is_empty());
    }

    #[test]
    fn test_desired_set_lists_each_filter_once() {
        let mut table = SubscriptionTable::new();
        table.insert("b", QoS::AtMostOnce, 1);
        table.insert("a", QoS::AtLeastOnce, 2);
        table.insert("b", QoS::ExactlyOnce, 3);

        assert_eq!(
            table.desired(),
            vec![
                ("a".to_string(), QoS::AtLeastOnce),
                ("b".to_string(), QoS::ExactlyOnce),
            ]
        );
    }

    #[test]
    fn test_display_id() {
        let mut table = SubscriptionTable::new();
        let inserted = table.insert("a", QoS::AtMostOnce, ());
        assert_eq!(inserted.id.to_string(), "sub-1");
        assert_eq!(inserted.id.as_u64(), 1);
    }
}
