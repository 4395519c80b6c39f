// Observability: metrics for report assembly and upstream fetches

pub mod metrics;
