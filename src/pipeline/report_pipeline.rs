use std::time::Instant;

use tracing::{debug, info};

use crate::pipeline::processing::pivot::{ChildRecord, PivotTable, SlotPivot};
use crate::pipeline::processing::row_builder::{RowBuilder, RowContext};
use crate::pipeline::report_spec::ReportSpec;
use crate::types::{ReportRow, RowBatch};

/// Turns one materialized batch of raw rows into report rows for a spec.
///
/// Pure computation: no I/O, no shared state, output order follows the
/// parent rows.
pub struct ReportPipeline;

impl ReportPipeline {
    pub fn assemble(spec: &ReportSpec, batch: &RowBatch, context: RowContext) -> Vec<ReportRow> {
        let started = Instant::now();

        let pivot = Self::pivot_children(spec, batch);
        let builder = RowBuilder::new(spec, context);
        let rows: Vec<ReportRow> = batch
            .rows
            .iter()
            .map(|parent| builder.build(parent, pivot.as_ref()))
            .collect();

        let elapsed = started.elapsed().as_secs_f64();
        crate::observability::metrics::report::assembled(&spec.name, rows.len(), elapsed);
        info!(
            report = %spec.name,
            rows = rows.len(),
            children = batch.children.len(),
            "report assembled"
        );
        rows
    }

    fn pivot_children(spec: &ReportSpec, batch: &RowBatch) -> Option<PivotTable> {
        let pivot_spec = spec.pivot.as_ref()?;
        let children = batch
            .children
            .iter()
            .filter_map(|row| ChildRecord::from_row(row, pivot_spec));
        let table = SlotPivot::new(pivot_spec.slot_count).assemble(children);

        let dropped = table.dropped_total();
        if dropped > 0 {
            crate::observability::metrics::report::slot_overflow(&spec.name, dropped);
        }
        debug!(
            report = %spec.name,
            groups = table.group_count(),
            dropped,
            "children pivoted into slots"
        );
        Some(table)
    }
}
