use chrono::NaiveDate;
use tracing::trace;

use crate::pipeline::processing::normalize::{
    default_ordinal_epoch, normalize_date_with_epoch, normalize_duration, normalize_time_of_day,
};
use crate::pipeline::processing::pivot::{GroupKey, PivotTable, SlotAssignment};
use crate::pipeline::report_spec::{ColumnRule, ReportSpec};
use crate::types::{FieldValue, RawRow, ReportRow};

/// Per-request settings the row builder needs. Passed in explicitly rather
/// than read from process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowContext {
    /// Date that integer ordinal `1` stands for.
    pub ordinal_epoch: NaiveDate,
}

impl Default for RowContext {
    fn default() -> Self {
        Self {
            ordinal_epoch: default_ordinal_epoch(),
        }
    }
}

/// Builds one [`ReportRow`] per parent row from a [`ReportSpec`].
pub struct RowBuilder<'a> {
    spec: &'a ReportSpec,
    context: RowContext,
}

impl<'a> RowBuilder<'a> {
    pub fn new(spec: &'a ReportSpec, context: RowContext) -> Self {
        Self { spec, context }
    }

    /// Build the row for `parent`. Every declared column is present in the
    /// result; a column that cannot be resolved degrades on its own.
    pub fn build(&self, parent: &RawRow, pivot: Option<&PivotTable>) -> ReportRow {
        let slots = pivot.map(|table| {
            let key = self
                .spec
                .pivot
                .as_ref()
                .and_then(|p| GroupKey::from_row(parent, &p.parent_key));
            table.assignment(key.as_ref())
        });

        let mut row = ReportRow::with_capacity(self.spec.columns.len());
        for column in &self.spec.columns {
            let value = self.resolve(&column.rule, parent, slots);
            row.push(column.name.clone(), value);
        }
        row
    }

    fn resolve(
        &self,
        rule: &ColumnRule,
        parent: &RawRow,
        slots: Option<&SlotAssignment>,
    ) -> FieldValue {
        match rule {
            ColumnRule::PassThrough { source } => FieldValue::Verbatim(parent.verbatim(source)),
            ColumnRule::Text { source } => FieldValue::Normalized(parent.text(source)),
            ColumnRule::Date { source } => FieldValue::Normalized(normalize_date_with_epoch(
                parent.get(source),
                self.context.ordinal_epoch,
            )),
            ColumnRule::TimeOfDay { source } => {
                FieldValue::Normalized(normalize_time_of_day(parent.get(source)))
            }
            ColumnRule::Duration { source } => {
                FieldValue::Normalized(normalize_duration(parent.get(source)))
            }
            ColumnRule::Lookup { source, sentinel } => {
                let resolved = parent.text(source).unwrap_or_else(|| {
                    trace!(column = %source, "lookup unresolved, using sentinel");
                    crate::observability::metrics::report::sentinel_substituted();
                    sentinel.clone()
                });
                FieldValue::Normalized(Some(resolved))
            }
            ColumnRule::Blank => FieldValue::Normalized(None),
            ColumnRule::Slot { position, part } => FieldValue::Normalized(
                slots
                    .and_then(|s| s.value(*position, *part))
                    .map(str::to_string),
            ),
            ColumnRule::Primary => {
                FieldValue::Normalized(slots.and_then(|s| s.primary()).map(str::to_string))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UNASSIGNED_SENTINEL;
    use crate::pipeline::processing::pivot::{ChildRecord, SlotPivot};
    use crate::pipeline::report_spec::{ColumnSpec, PivotSpec};
    use crate::types::RawValue;

    fn technician_spec() -> ReportSpec {
        ReportSpec {
            name: "technicians".to_string(),
            description: String::new(),
            columns: vec![
                ColumnSpec::new("ID", ColumnRule::pass_through("id")),
                ColumnSpec::new("TECH", ColumnRule::lookup("tech", UNASSIGNED_SENTINEL)),
                ColumnSpec::new("DAY", ColumnRule::date("day")),
                ColumnSpec::new("START", ColumnRule::time_of_day("start")),
                ColumnSpec::new("SPENT", ColumnRule::duration("spent")),
                ColumnSpec::new("NOTE", ColumnRule::Blank),
            ],
            pivot: None,
        }
    }

    #[test]
    fn test_unresolved_lookup_gets_sentinel() {
        let spec = technician_spec();
        let builder = RowBuilder::new(&spec, RowContext::default());

        let row = builder.build(&RawRow::new().with("id", 7).with("tech", RawValue::Null), None);
        assert_eq!(row.text("TECH").as_deref(), Some(UNASSIGNED_SENTINEL));

        // Absent column is the same as an unresolved lookup.
        let row = builder.build(&RawRow::new().with("id", 8), None);
        assert_eq!(row.text("TECH").as_deref(), Some(UNASSIGNED_SENTINEL));

        let row = builder.build(&RawRow::new().with("tech", "Ruiz"), None);
        assert_eq!(row.text("TECH").as_deref(), Some("Ruiz"));
    }

    #[test]
    fn test_every_declared_column_is_present() {
        let spec = technician_spec();
        let row = RowBuilder::new(&spec, RowContext::default()).build(&RawRow::new(), None);

        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, vec!["ID", "TECH", "DAY", "START", "SPENT", "NOTE"]);
        assert!(row.get("ID").unwrap().is_null());
        assert!(row.get("NOTE").unwrap().is_null());
    }

    #[test]
    fn test_normalizers_are_applied_per_column() {
        let spec = technician_spec();
        let parent = RawRow::new()
            .with("id", 1)
            .with("day", 1)
            .with("start", 0)
            .with("spent", -125);
        let row = RowBuilder::new(&spec, RowContext::default()).build(&parent, None);

        assert_eq!(row.get("ID"), Some(&FieldValue::Verbatim(RawValue::Integer(1))));
        assert_eq!(row.text("DAY").as_deref(), Some("0001-01-01"));
        assert_eq!(row.text("START").as_deref(), Some("00:00:00"));
        assert_eq!(row.text("SPENT").as_deref(), Some("-00:02:05"));
    }

    #[test]
    fn test_context_epoch_is_used() {
        let spec = technician_spec();
        let context = RowContext {
            ordinal_epoch: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        };
        let row = RowBuilder::new(&spec, context).build(&RawRow::new().with("day", 2), None);
        assert_eq!(row.text("DAY").as_deref(), Some("2000-01-02"));
    }

    #[test]
    fn test_slots_follow_parent_group_key() {
        let spec = ReportSpec {
            name: "slotted".to_string(),
            description: String::new(),
            columns: vec![
                ColumnSpec::new("PR", ColumnRule::Primary),
                ColumnSpec::new(
                    "S1",
                    ColumnRule::Slot {
                        position: 1,
                        part: crate::pipeline::processing::pivot::SlotPart::Rank,
                    },
                ),
                ColumnSpec::new(
                    "S2",
                    ColumnRule::Slot {
                        position: 2,
                        part: crate::pipeline::processing::pivot::SlotPart::Rank,
                    },
                ),
            ],
            pivot: Some(PivotSpec {
                parent_key: ["emp".to_string(), "flt".to_string()],
                child_key: ["emp".to_string(), "flt".to_string()],
                rank_column: "name".to_string(),
                payload_column: "desc".to_string(),
                slot_count: 2,
            }),
        };
        let key = GroupKey::new("1", "10");
        let table = SlotPivot::new(2).assemble(vec![
            ChildRecord::new(key.clone(), "WASH", Some("Exterior wash".to_string())),
            ChildRecord::new(key, "FUEL", Some("Refuel".to_string())),
        ]);
        let builder = RowBuilder::new(&spec, RowContext::default());

        let row = builder.build(&RawRow::new().with("emp", 1).with("flt", 10), Some(&table));
        assert_eq!(row.text("PR").as_deref(), Some("Refuel"));
        assert_eq!(row.text("S1").as_deref(), Some("FUEL"));
        assert_eq!(row.text("S2").as_deref(), Some("WASH"));

        let orphan = builder.build(&RawRow::new().with("emp", 2).with("flt", 10), Some(&table));
        assert_eq!(orphan.len(), 3);
        assert!(orphan.iter().all(|(_, v)| v.is_null()));
    }

    #[test]
    fn test_temporal_looking_text_is_copied_verbatim() {
        let spec = ReportSpec::service_executions();
        let builder = RowBuilder::new(&spec, RowContext::default());

        for input in [
            "2024-05-01T07:05:00",
            "2024-05-01 07:05:00.000",
            " 2024-05-01",
            "07:05:00.000",
        ] {
            let parent = RawRow::new()
                .with_text("create_at", input)
                .with_text("work_order", input)
                .with_text("service_name", input);
            let row = builder.build(&parent, None);

            assert_eq!(
                row.get("create_at"),
                Some(&FieldValue::Verbatim(RawValue::String(input.to_string())))
            );
            assert_eq!(row.text("work_order").as_deref(), Some(input));
            assert_eq!(row.text("service_name").as_deref(), Some(input));
        }
    }

    #[test]
    fn test_promoted_text_still_normalizes() {
        let spec = technician_spec();
        let parent = RawRow::new()
            .with_text("day", "2024-05-01T07:05:00")
            .with_text("start", "07:05:00.000");
        let row = RowBuilder::new(&spec, RowContext::default()).build(&parent, None);

        assert_eq!(row.text("DAY").as_deref(), Some("2024-05-01"));
        assert_eq!(row.text("START").as_deref(), Some("07:05:00"));
    }
}
