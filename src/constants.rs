/// Report name constants shared by the registry, the CLI and the config file.
pub const SERVICE_EXECUTIONS_REPORT: &str = "service-executions";
pub const OPERATION_REPORTS_REPORT: &str = "operation-reports";
pub const OPERATION_REPORTS_V2_REPORT: &str = "operation-reports-v2";
pub const SERVICES_REPORTS_REPORT: &str = "services-reports";

/// Get all built-in report names
pub fn get_builtin_reports() -> Vec<&'static str> {
    vec![
        SERVICE_EXECUTIONS_REPORT,
        OPERATION_REPORTS_REPORT,
        OPERATION_REPORTS_V2_REPORT,
        SERVICES_REPORTS_REPORT,
    ]
}

// Sentinels for joined lookups that did not resolve
pub const NO_CLIENT_SENTINEL: &str = "no client";
pub const NO_SERVICE_SENTINEL: &str = "no service";
pub const UNASSIGNED_SENTINEL: &str = "unassigned";

/// Number of named service slots in pivoted reports.
pub const DEFAULT_SLOT_COUNT: usize = 6;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Default day 1 of integer-encoded dates (0001-01-01, proleptic Gregorian).
pub const DEFAULT_ORDINAL_EPOCH: (i32, u32, u32) = (1, 1, 1);

/// Largest year with a four-digit ISO-8601 form.
pub const MAX_ISO_YEAR: i32 = 9999;

pub const DEFAULT_PAGE_LIMIT: u64 = 100;
pub const MAX_PAGE_LIMIT: u64 = 1000;

pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
