use async_trait::async_trait;

use crate::types::{ReportRequest, RowBatch};

/// Executes the queries behind a report. Implementations own connections,
/// credentials and query text; errors come back as plain messages.
#[async_trait]
pub trait QuerySourcePort: Send + Sync {
    /// Fetch the parent rows (and child rows, for pivoted reports) for one
    /// page of a report in a single call.
    async fn fetch(&self, request: &ReportRequest) -> Result<RowBatch, String>;

    /// Total number of parent rows the report has.
    async fn count(&self, report: &str) -> Result<u64, String>;
}
