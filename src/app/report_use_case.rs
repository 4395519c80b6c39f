use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument};

use crate::app::ports::QuerySourcePort;
use crate::config::Config;
use crate::constants::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::error::{ReportError, Result};
use crate::pipeline::processing::row_builder::RowContext;
use crate::pipeline::report_pipeline::ReportPipeline;
use crate::pipeline::report_spec::{ReportRegistry, ReportSpec};
use crate::types::{ReportRequest, ReportRow};

/// Use case for serving one report request: a single upstream fetch followed
/// by pure assembly.
///
/// An upstream failure or timeout fails the whole request; there is no retry
/// and no partial result.
pub struct ReportUseCase {
    source: Arc<dyn QuerySourcePort>,
    registry: ReportRegistry,
    context: RowContext,
    timeout: Duration,
}

impl ReportUseCase {
    pub fn new(source: Arc<dyn QuerySourcePort>, registry: ReportRegistry) -> Self {
        Self {
            source,
            registry,
            context: RowContext::default(),
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Create a use case with the epoch and timeout from `config`
    pub fn from_config(
        source: Arc<dyn QuerySourcePort>,
        registry: ReportRegistry,
        config: &Config,
    ) -> Self {
        Self::new(source, registry)
            .with_context(config.row_context())
            .with_timeout(config.query_timeout())
    }

    pub fn with_context(mut self, context: RowContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ReportRegistry {
        &self.registry
    }

    /// Run one page of a report.
    #[instrument(skip(self), fields(report = %request.report))]
    pub async fn run(&self, request: &ReportRequest) -> Result<Vec<ReportRow>> {
        let spec = self.spec(&request.report)?;

        let started = Instant::now();
        let fetched = tokio::time::timeout(self.timeout, self.source.fetch(request)).await;
        let batch = match fetched {
            Ok(Ok(batch)) => batch,
            Ok(Err(message)) => return Err(self.unavailable(&request.report, message)),
            Err(_) => {
                let message = format!("query timed out after {}s", self.timeout.as_secs_f64());
                return Err(self.unavailable(&request.report, message));
            }
        };
        crate::observability::metrics::source::fetch_success(
            &request.report,
            started.elapsed().as_secs_f64(),
        );
        info!(
            rows = batch.rows.len(),
            children = batch.children.len(),
            offset = request.page.offset,
            limit = request.page.limit,
            "rows fetched"
        );

        Ok(ReportPipeline::assemble(spec, &batch, self.context))
    }

    /// Total parent rows of a report.
    #[instrument(skip(self))]
    pub async fn count(&self, report: &str) -> Result<u64> {
        self.spec(report)?;
        match tokio::time::timeout(self.timeout, self.source.count(report)).await {
            Ok(Ok(total)) => Ok(total),
            Ok(Err(message)) => Err(self.unavailable(report, message)),
            Err(_) => Err(self.unavailable(
                report,
                format!("count timed out after {}s", self.timeout.as_secs_f64()),
            )),
        }
    }

    fn spec(&self, report: &str) -> Result<&ReportSpec> {
        self.registry
            .get(report)
            .ok_or_else(|| ReportError::UnknownReport(report.to_string()))
    }

    fn unavailable(&self, report: &str, message: String) -> ReportError {
        error!(report, %message, "report source unavailable");
        crate::observability::metrics::source::fetch_error(report);
        ReportError::SourceUnavailable {
            report: report.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{OPERATION_REPORTS_REPORT, UNASSIGNED_SENTINEL};
    use crate::types::{Page, RawRow, RawValue, RowBatch};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct MockQuerySource {
        batch: RowBatch,
        requests: Mutex<Vec<ReportRequest>>,
    }

    impl MockQuerySource {
        fn new(batch: RowBatch) -> Self {
            Self {
                batch,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QuerySourcePort for MockQuerySource {
        async fn fetch(&self, request: &ReportRequest) -> std::result::Result<RowBatch, String> {
            self.requests.lock().await.push(request.clone());
            Ok(self.batch.clone())
        }

        async fn count(&self, _report: &str) -> std::result::Result<u64, String> {
            Ok(self.batch.rows.len() as u64)
        }
    }

    struct FailingQuerySource;

    #[async_trait]
    impl QuerySourcePort for FailingQuerySource {
        async fn fetch(&self, _request: &ReportRequest) -> std::result::Result<RowBatch, String> {
            Err("connection reset".to_string())
        }

        async fn count(&self, _report: &str) -> std::result::Result<u64, String> {
            Err("connection reset".to_string())
        }
    }

    struct SlowQuerySource;

    #[async_trait]
    impl QuerySourcePort for SlowQuerySource {
        async fn fetch(&self, _request: &ReportRequest) -> std::result::Result<RowBatch, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RowBatch::default())
        }

        async fn count(&self, _report: &str) -> std::result::Result<u64, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(0)
        }
    }

    fn operation_rows() -> RowBatch {
        RowBatch::new(vec![
            RawRow::new()
                .with("id", 1)
                .with("cliente", "Aeromexico")
                .with("tecnico_asignado", RawValue::Null),
            RawRow::new().with("id", 2),
        ])
    }

    #[tokio::test]
    async fn test_run_assembles_rows_and_forwards_page() {
        let source = Arc::new(MockQuerySource::new(operation_rows()));
        let use_case = ReportUseCase::new(source.clone(), ReportRegistry::new());

        let request = ReportRequest::new(OPERATION_REPORTS_REPORT).with_page(Page::clamped(20, 5));
        let rows = use_case.run(&request).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("cliente").as_deref(), Some("Aeromexico"));
        assert_eq!(rows[0].text("tecnico_asignado").as_deref(), Some(UNASSIGNED_SENTINEL));
        assert_eq!(rows[1].text("servicio_principal").as_deref(), Some("no service"));

        let seen = source.requests.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].page, Page { offset: 20, limit: 5 });
    }

    #[tokio::test]
    async fn test_unknown_report_is_rejected_before_fetching() {
        let source = Arc::new(MockQuerySource::new(RowBatch::default()));
        let use_case = ReportUseCase::new(source.clone(), ReportRegistry::new());

        let result = use_case.run(&ReportRequest::new("nope")).await;
        assert!(matches!(result, Err(ReportError::UnknownReport(name)) if name == "nope"));
        assert!(source.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_fails_the_whole_request() {
        let use_case = ReportUseCase::new(Arc::new(FailingQuerySource), ReportRegistry::new());

        let result = use_case.run(&ReportRequest::new(OPERATION_REPORTS_REPORT)).await;
        match result {
            Err(ReportError::SourceUnavailable { report, message }) => {
                assert_eq!(report, OPERATION_REPORTS_REPORT);
                assert_eq!(message, "connection reset");
            }
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }

        let count = use_case.count(OPERATION_REPORTS_REPORT).await;
        assert!(matches!(count, Err(ReportError::SourceUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_source_unavailable() {
        let use_case = ReportUseCase::new(Arc::new(SlowQuerySource), ReportRegistry::new())
            .with_timeout(Duration::from_millis(20));

        let result = use_case.run(&ReportRequest::new(OPERATION_REPORTS_REPORT)).await;
        assert!(matches!(
            result,
            Err(ReportError::SourceUnavailable { ref message, .. }) if message.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_count_uses_source() {
        let use_case = ReportUseCase::new(
            Arc::new(MockQuerySource::new(operation_rows())),
            ReportRegistry::new(),
        );
        assert_eq!(use_case.count(OPERATION_REPORTS_REPORT).await.unwrap(), 2);
    }
}
