use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use ops_reports::app::ports::QuerySourcePort;
use ops_reports::app::report_use_case::ReportUseCase;
use ops_reports::config::{Config, SourceKind};
use ops_reports::constants::{DEFAULT_PAGE_LIMIT, OPERATION_REPORTS_V2_REPORT};
use ops_reports::infra::sqlite_source::SqliteQuerySource;
use ops_reports::logging;
use ops_reports::observability::metrics;
use ops_reports::pipeline::report_spec::ReportRegistry;
use ops_reports::types::{Page, ReportRequest};

#[derive(Parser)]
#[command(name = "ops_reports")]
#[command(about = "Flight operations report assembly")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $OPS_REPORTS_CONFIG, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the reports that can be run
    List,
    /// Assemble one page of a report and print it as JSON
    Run {
        #[arg(long, default_value = OPERATION_REPORTS_V2_REPORT)]
        report: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Page size, held to 1..=1000
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u64,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the total row count of a report
    Count {
        #[arg(long)]
        report: String,
    },
}

async fn build_source(config: &Config) -> anyhow::Result<Arc<dyn QuerySourcePort>> {
    match config.source.kind {
        SourceKind::Sqlite => {
            let path = config
                .source
                .path
                .as_ref()
                .context("source.path is required for the sqlite source")?;
            let source = SqliteQuerySource::open(path, config.queries.clone())?;
            Ok(Arc::new(source))
        }
        #[cfg(feature = "db")]
        SourceKind::Libsql => {
            let source =
                ops_reports::infra::libsql_source::LibsqlQuerySource::from_env(config.queries.clone())
                    .await?;
            Ok(Arc::new(source))
        }
        #[cfg(not(feature = "db"))]
        SourceKind::Libsql => {
            anyhow::bail!("the libsql source requires building with the `db` feature")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let registry = ReportRegistry::new();

    if cli.print_metrics {
        metrics::init().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    if let Commands::List = cli.command {
        for name in registry.list_reports() {
            let description = registry
                .get(name)
                .map(|spec| spec.description.as_str())
                .unwrap_or_default();
            println!("{name}\t{description}");
        }
        return Ok(());
    }

    let config_path = Config::resolve_path(cli.config.clone());
    let config = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    config.validate(&registry)?;
    info!("Loaded config from {}", config_path.display());

    let source = build_source(&config).await?;
    let use_case = ReportUseCase::from_config(source, registry, &config);

    let outcome = match cli.command {
        Commands::List => Ok(()),
        Commands::Run {
            report,
            offset,
            limit,
            pretty,
        } => {
            let request = ReportRequest::new(report).with_page(Page::clamped(offset, limit));
            match use_case.run(&request).await {
                Ok(rows) => {
                    let body = if pretty {
                        serde_json::to_string_pretty(&rows)?
                    } else {
                        serde_json::to_string(&rows)?
                    };
                    println!("{body}");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Commands::Count { report } => match use_case.count(&report).await {
            Ok(total) => {
                println!("{}", serde_json::json!({ "report": report, "total": total }));
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    if cli.print_metrics {
        if let Some(rendered) = metrics::render() {
            eprintln!("{rendered}");
        }
    }

    if let Err(e) = outcome {
        error!("Report request failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}
