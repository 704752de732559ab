use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use loglens_client::BackendClient;
use loglens_core::config::Config;
use loglens_core::export::{ExportFormat, ExportOptions, Exporter};
use loglens_core::{FilterSpec, Role, SourceSpec};

#[derive(Parser)]
#[command(name = "loglens", about = "loglens — terminal dashboard for a log-analysis backend")]
struct Cli {
    /// Write debug logs to /tmp/loglens-debug.log (tail -f to inspect).
    #[arg(long, global = true)]
    debug: bool,

    /// Backend base URL, overriding `[backend] base_url`.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Session id sent as the `session_id` cookie.
    #[arg(long, global = true)]
    session: Option<String>,

    /// Collector to switch to: `local`, `cloudwatch GROUP [STREAM] [REGION]` or `api URL`.
    #[arg(long, global = true, default_value = "local", value_parser = parse_source)]
    source: SourceSpec,

    /// Caller role; only `admin` may delete records.
    #[arg(long, global = true, default_value = "viewer")]
    role: String,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Export the records matching a filter to a file and print its path.
    Export(ExportArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// `csv` or `json`.
    #[arg(long, default_value = "csv", value_parser = parse_format)]
    format: ExportFormat,
    #[arg(long)]
    level: Option<String>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    service: Option<String>,
    #[arg(long)]
    keyword: Option<String>,
    /// Local date-time, e.g. `2025-08-26T14:30`.
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
    /// Include `/api/ai/patterns` (json only).
    #[arg(long)]
    patterns: bool,
    /// Include `/api/ai/trends` (json only).
    #[arg(long)]
    trends: bool,
    /// Include the raw anomaly snapshot (json only).
    #[arg(long)]
    raw: bool,
    /// Output directory, overriding `[export] directory`.
    #[arg(long)]
    out: Option<PathBuf>,
}

impl ExportArgs {
    fn filter(&self) -> FilterSpec {
        FilterSpec {
            keyword: self.keyword.clone().unwrap_or_default(),
            level: self.level.as_deref().unwrap_or_default().to_uppercase(),
            user: self.user.clone().unwrap_or_default(),
            service: self.service.clone().unwrap_or_default(),
            start_time: self.start.clone(),
            end_time: self.end.clone(),
        }
    }

    fn options(&self) -> ExportOptions {
        ExportOptions {
            include_patterns: self.patterns,
            include_trends: self.trends,
            include_raw_data: self.raw,
        }
    }
}

fn parse_source(s: &str) -> Result<SourceSpec, String> {
    SourceSpec::parse(s)
}

fn parse_format(s: &str) -> Result<ExportFormat, String> {
    ExportFormat::parse(s).ok_or_else(|| format!("unknown export format: {s}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/loglens-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("loglens debug log started — tail -f /tmp/loglens-debug.log");
    }

    let mut config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "config load failed, using defaults");
        eprintln!("loglens: ignoring config: {err:#}");
        Config::defaults()
    });
    if let Some(url) = cli.base_url {
        config.backend.base_url = url;
    }
    if cli.session.is_some() {
        config.backend.session_id = cli.session;
    }

    match cli.command {
        None => loglens_tui::run(config, cli.source, Role::new(cli.role)),
        Some(Cmd::Export(args)) => {
            if let Err(err) = export(&config, cli.source, &args) {
                eprintln!("loglens: export failed: {err:#}");
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn export(config: &Config, source: SourceSpec, args: &ExportArgs) -> anyhow::Result<()> {
    if args.format == ExportFormat::Csv && args.options() != ExportOptions::default() {
        anyhow::bail!("--patterns, --trends and --raw only apply to --format json");
    }
    let client = Arc::new(BackendClient::from_config(&config.backend)?);
    let exporter = Exporter::new(Arc::clone(&client), config.backend.export_limit());
    let dir = args.out.clone().unwrap_or_else(|| config.export.directory.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let path = runtime.block_on(async {
        if source != SourceSpec::local() {
            loglens_core::LogBackend::switch_source(client.as_ref(), &source).await?;
        }
        exporter
            .export(&args.filter(), args.format, args.options(), &dir)
            .await
            .map_err(anyhow::Error::from)
    })?;

    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["loglens", "export", "--source", "cloudwatch app-logs"]).unwrap();
        assert_eq!(cli.source.key(), SourceSpec::parse("cloudwatch app-logs").unwrap().key());
        assert!(matches!(cli.command, Some(Cmd::Export(_))));
    }

    #[test]
    fn source_before_subcommand_still_works() {
        let cli = Cli::try_parse_from(["loglens", "--source", "api http://collector", "--role", "admin", "export"])
            .unwrap();
        assert_eq!(cli.source.api_url.as_deref(), Some("http://collector"));
        assert_eq!(cli.role, "admin");
    }

    #[test]
    fn source_defaults_to_local() {
        let cli = Cli::try_parse_from(["loglens"]).unwrap();
        assert_eq!(cli.source, SourceSpec::local());
        assert!(cli.command.is_none());
    }
}
