// Report assembly: per-report column specs, row processing, and the pipeline driver

pub mod processing;
pub mod report_pipeline;
pub mod report_spec;
