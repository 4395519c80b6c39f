//! Slot pivot: collapses a variable number of child records per parent group
//! into a fixed number of named slots for flat tabular reports.
//!
//! Within a group children are ranked by ascending rank text (byte-wise,
//! case-sensitive, ties kept in input order). Ranks `1..=N` land in
//! `SLOT_1..SLOT_N`; anything ranked past `N` is dropped. The drop is a
//! capacity limit of the report layout, not an error.

use std::collections::HashMap;

use tracing::debug;

use crate::pipeline::report_spec::PivotSpec;
use crate::types::RawRow;

/// Composite identifier of the parent a child record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub String, pub String);

impl GroupKey {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self(first.into(), second.into())
    }

    /// Read a key from two columns of `row`. `None` when either part is null.
    pub fn from_row(row: &RawRow, columns: &[String; 2]) -> Option<Self> {
        let first = row.text(&columns[0])?;
        let second = row.text(&columns[1])?;
        Some(Self(first, second))
    }
}

/// A child record: the value it is ranked by and the value it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRecord {
    pub key: GroupKey,
    /// `None` ranks before any text.
    pub rank: Option<String>,
    pub payload: Option<String>,
}

impl ChildRecord {
    pub fn new(key: GroupKey, rank: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            key,
            rank: Some(rank.into()),
            payload,
        }
    }

    /// Extract a child record from a raw child row. Rows without a complete
    /// group key cannot belong to any parent and yield `None`.
    pub fn from_row(row: &RawRow, pivot: &PivotSpec) -> Option<Self> {
        let key = GroupKey::from_row(row, &pivot.child_key)?;
        Some(Self {
            key,
            rank: row.text(&pivot.rank_column),
            payload: row.text(&pivot.payload_column),
        })
    }
}

/// Which part of a slotted child a report column shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPart {
    Rank,
    Payload,
}

/// The slotted children of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    slot_count: usize,
    ranked: Vec<ChildRecord>,
    primary: Option<String>,
    dropped: usize,
}

impl SlotAssignment {
    /// All slots null, no primary.
    pub fn empty(slot_count: usize) -> Self {
        Self {
            slot_count,
            ranked: Vec::new(),
            primary: None,
            dropped: 0,
        }
    }

    /// Child in 1-based `position`, if that slot is filled.
    pub fn slot(&self, position: usize) -> Option<&ChildRecord> {
        position.checked_sub(1).and_then(|index| self.ranked.get(index))
    }

    pub fn value(&self, position: usize, part: SlotPart) -> Option<&str> {
        let child = self.slot(position)?;
        match part {
            SlotPart::Rank => child.rank.as_deref(),
            SlotPart::Payload => child.payload.as_deref(),
        }
    }

    /// Payload of the rank-1 child.
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// `SLOT_1..SLOT_N` with the payload of each slot.
    pub fn named_slots(&self) -> Vec<(String, Option<String>)> {
        (1..=self.slot_count)
            .map(|position| {
                (
                    format!("SLOT_{position}"),
                    self.value(position, SlotPart::Payload).map(str::to_string),
                )
            })
            .collect()
    }

    /// Children cut off by the slot capacity.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Slot assignments for every group seen in one batch of children.
#[derive(Debug, Clone)]
pub struct PivotTable {
    groups: HashMap<GroupKey, SlotAssignment>,
    empty: SlotAssignment,
}

impl PivotTable {
    /// Assignment for `key`; unknown or missing keys get all-null slots.
    pub fn assignment(&self, key: Option<&GroupKey>) -> &SlotAssignment {
        key.and_then(|k| self.groups.get(k)).unwrap_or(&self.empty)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Children dropped across all groups.
    pub fn dropped_total(&self) -> usize {
        self.groups.values().map(SlotAssignment::dropped).sum()
    }
}

/// Assembles child records into fixed-size slot assignments.
#[derive(Debug, Clone, Copy)]
pub struct SlotPivot {
    slot_count: usize,
}

impl SlotPivot {
    pub fn new(slot_count: usize) -> Self {
        Self { slot_count }
    }

    pub fn assemble<I>(&self, children: I) -> PivotTable
    where
        I: IntoIterator<Item = ChildRecord>,
    {
        let mut partitions: HashMap<GroupKey, Vec<ChildRecord>> = HashMap::new();
        for child in children {
            partitions.entry(child.key.clone()).or_default().push(child);
        }

        let groups = partitions
            .into_iter()
            .map(|(key, mut members)| {
                // `sort_by` is stable, so equal ranks keep their input order.
                members.sort_by(|a, b| a.rank.cmp(&b.rank));
                let primary = members.first().and_then(|c| c.payload.clone());
                let dropped = members.len().saturating_sub(self.slot_count);
                if dropped > 0 {
                    debug!(
                        group = ?key,
                        dropped,
                        slot_count = self.slot_count,
                        "children beyond slot capacity dropped"
                    );
                }
                members.truncate(self.slot_count);
                let assignment = SlotAssignment {
                    slot_count: self.slot_count,
                    ranked: members,
                    primary,
                    dropped,
                };
                (key, assignment)
            })
            .collect();

        PivotTable {
            groups,
            empty: SlotAssignment::empty(self.slot_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(key: &GroupKey, rank: &str, payload: &str) -> ChildRecord {
        ChildRecord::new(key.clone(), rank, Some(payload.to_string()))
    }

    #[test]
    fn test_eight_children_fill_six_slots_in_rank_order() {
        let key = GroupKey::new("emp-1", "flt-9");
        let names = ["hotel", "bravo", "golf", "alpha", "foxtrot", "echo", "delta", "charlie"];
        let children = names
            .iter()
            .map(|n| child(&key, n, &format!("{n} payload")));

        let table = SlotPivot::new(6).assemble(children);
        let assignment = table.assignment(Some(&key));

        let slots = assignment.named_slots();
        assert_eq!(slots.len(), 6);
        let expected = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];
        for (i, (name, value)) in slots.iter().enumerate() {
            assert_eq!(name, &format!("SLOT_{}", i + 1));
            assert_eq!(value.as_deref(), Some(format!("{} payload", expected[i]).as_str()));
        }
        assert_eq!(assignment.slot(7), None);
        assert_eq!(assignment.dropped(), 2);
        assert_eq!(assignment.primary(), slots[0].1.as_deref());
        assert_eq!(table.dropped_total(), 2);
    }

    #[test]
    fn test_group_without_children_is_all_null() {
        let table = SlotPivot::new(6).assemble(Vec::new());
        let assignment = table.assignment(Some(&GroupKey::new("a", "b")));

        assert_eq!(assignment.named_slots().len(), 6);
        assert!(assignment.named_slots().iter().all(|(_, v)| v.is_none()));
        assert_eq!(assignment.primary(), None);
        assert_eq!(table.assignment(None).primary(), None);
    }

    #[test]
    fn test_ranking_is_case_sensitive_and_stable() {
        let key = GroupKey::new("1", "1");
        let children = vec![
            child(&key, "b", "first b"),
            child(&key, "B", "upper B"),
            child(&key, "b", "second b"),
            child(&key, "a", "a"),
        ];

        let table = SlotPivot::new(6).assemble(children);
        let assignment = table.assignment(Some(&key));

        // Uppercase sorts before lowercase byte-wise.
        assert_eq!(assignment.value(1, SlotPart::Payload), Some("upper B"));
        assert_eq!(assignment.value(2, SlotPart::Payload), Some("a"));
        assert_eq!(assignment.value(3, SlotPart::Payload), Some("first b"));
        assert_eq!(assignment.value(4, SlotPart::Payload), Some("second b"));
        assert_eq!(assignment.value(4, SlotPart::Rank), Some("b"));
        assert_eq!(assignment.value(5, SlotPart::Payload), None);
    }

    #[test]
    fn test_groups_are_independent() {
        let left = GroupKey::new("emp-1", "flt-1");
        let right = GroupKey::new("emp-1", "flt-2");
        let children = vec![
            child(&left, "zulu", "L-z"),
            child(&right, "alpha", "R-a"),
            child(&left, "mike", "L-m"),
        ];

        let table = SlotPivot::new(2).assemble(children);
        assert_eq!(table.group_count(), 2);
        assert_eq!(table.assignment(Some(&left)).primary(), Some("L-m"));
        assert_eq!(table.assignment(Some(&right)).primary(), Some("R-a"));
        assert_eq!(table.assignment(Some(&right)).slot(2), None);
    }

    #[test]
    fn test_null_rank_sorts_first() {
        let key = GroupKey::new("x", "y");
        let children = vec![
            child(&key, "alpha", "named"),
            ChildRecord {
                key: key.clone(),
                rank: None,
                payload: Some("unnamed".to_string()),
            },
        ];
        let table = SlotPivot::new(6).assemble(children);
        assert_eq!(table.assignment(Some(&key)).primary(), Some("unnamed"));
    }

    #[test]
    fn test_primary_survives_zero_capacity() {
        let key = GroupKey::new("x", "y");
        let table = SlotPivot::new(0).assemble(vec![child(&key, "a", "p")]);
        let assignment = table.assignment(Some(&key));
        assert!(assignment.named_slots().is_empty());
        assert_eq!(assignment.primary(), Some("p"));
        assert_eq!(assignment.dropped(), 1);
    }
}
