use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use feedhub::http::HttpClient;
use feedhub::ingest::scheduler::Scheduler;
use feedhub::source::types::ShortsFilter;
use feedhub::{
    Clock, Config, CreateSourceRequest, Database, FeedFetcher, IngestEngine, ItemStore,
    ReqwestClient, RetentionSweeper, SourceFilters, SourceService, SourceStore, SourceType,
    SqliteItemRepository, SqliteSourceRepository, SystemClock,
};

#[derive(Debug, Parser)]
#[command(name = "feedhub", version, about = "Feed ingestion and normalization engine")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short = 'c', default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler (periodic refresh and daily retention sweep)
    Run,
    /// Refresh sources once
    Refresh {
        /// Refresh a single source
        #[arg(long, conflicts_with_all = ["user", "all"])]
        source: Option<i64>,
        /// Refresh all sources of a user
        #[arg(long, conflicts_with = "all")]
        user: Option<i64>,
        /// Refresh every source
        #[arg(long)]
        all: bool,
    },
    /// Delete items past their source's retention period
    Sweep,
    /// Add a source for a user
    AddSource {
        /// Owning user ID
        #[arg(long)]
        user: i64,
        /// Source type: rss, youtube, reddit or bluesky
        #[arg(long = "type", value_parser = parse_source_type)]
        source_type: SourceType,
        /// URL or handle
        #[arg(long)]
        url: String,
        /// Days to keep items (0 keeps them forever)
        #[arg(long, default_value_t = 0)]
        retention_days: i64,
        /// YouTube shorts policy: all, exclude or only
        #[arg(long, value_parser = parse_shorts_filter)]
        shorts: Option<ShortsFilter>,
        /// Minimum Reddit score to keep a post
        #[arg(long)]
        min_upvotes: Option<i64>,
    },
}

fn parse_source_type(s: &str) -> Result<SourceType, String> {
    SourceType::parse(s).ok_or_else(|| format!("unknown source type: {s}"))
}

fn parse_shorts_filter(s: &str) -> Result<ShortsFilter, String> {
    ShortsFilter::parse(s).ok_or_else(|| format!("unknown shorts policy: {s}"))
}

/// Shared services built from configuration.
struct App {
    config: Config,
    db: Database,
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl App {
    async fn open(config: Config) -> feedhub::Result<Self> {
        let db = Database::open(&config.database.path).await?;
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(&config.fetch)?);
        Ok(Self {
            config,
            db,
            http,
            clock: Arc::new(SystemClock),
        })
    }

    fn items(&self) -> Arc<dyn ItemStore> {
        Arc::new(SqliteItemRepository::new(&self.db))
    }

    fn sources(&self) -> Arc<dyn SourceStore> {
        Arc::new(SqliteSourceRepository::new(&self.db))
    }

    fn engine(&self) -> IngestEngine {
        IngestEngine::new(
            self.sources(),
            self.items(),
            self.http.clone(),
            self.clock.clone(),
        )
        .with_fetch_config(&self.config.fetch)
    }

    fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.items(), self.clock.clone())
    }
}

fn print_summary(summary: &feedhub::RefreshSummary) {
    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(stats) => println!(
                "{:>6}  {:<40}  {} new, {} skipped",
                outcome.source_id, outcome.title, stats.inserted, stats.skipped
            ),
            Err(e) => println!("{:>6}  {:<40}  error: {}", outcome.source_id, outcome.title, e),
        }
    }
    println!(
        "{} source(s): {} ok, {} failed, {} new item(s)",
        summary.outcomes.len(),
        summary.succeeded(),
        summary.failed(),
        summary.total_inserted()
    );
}

async fn execute(app: App, command: Command) -> feedhub::Result<()> {
    match command {
        Command::Run => {
            if !app.config.scheduler.enabled {
                info!("Scheduler disabled in configuration; nothing to do");
                return Ok(());
            }
            let scheduler = Scheduler::new(
                Arc::new(app.engine()),
                Arc::new(app.sweeper()),
                app.clock.clone(),
            )
            .with_config(&app.config.scheduler);
            scheduler
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                })
                .await;
        }
        Command::Refresh { source, user, all } => {
            let engine = app.engine();
            match (source, user, all) {
                (Some(id), _, _) => {
                    let stats = engine.refresh_source_by_id(id).await?;
                    println!(
                        "source {}: {} fetched, {} new, {} skipped",
                        id, stats.fetched, stats.inserted, stats.skipped
                    );
                }
                (None, Some(user_id), _) => {
                    print_summary(&engine.refresh_user_sources(user_id).await?)
                }
                (None, None, true) => print_summary(&engine.refresh_all_sources().await?),
                (None, None, false) => {
                    return Err(feedhub::FeedhubError::Validation(
                        "specify --source, --user or --all".into(),
                    ))
                }
            }
        }
        Command::Sweep => {
            let deleted = app.sweeper().sweep().await?;
            println!("{deleted} item(s) deleted");
        }
        Command::AddSource {
            user,
            source_type,
            url,
            retention_days,
            shorts,
            min_upvotes,
        } => {
            let filters = SourceFilters {
                youtube_shorts: shorts.unwrap_or_default(),
                reddit_min_upvotes: min_upvotes,
                ..Default::default()
            };
            let service = SourceService::new(
                &app.db,
                FeedFetcher::new(app.http.clone()),
                app.clock.clone(),
            );
            let source = service
                .create_source(
                    &CreateSourceRequest::new(user, source_type, url)
                        .with_filters(filters)
                        .with_retention_days(retention_days),
                )
                .await?;
            println!(
                "added source {} ({}): {}",
                source.id,
                source.title,
                source.feed_url()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if matches!(cli.command, Command::Run) {
        if let Err(e) = feedhub::logging::init(&config.logging) {
            eprintln!("Failed to initialize logging: {e}");
            feedhub::logging::init_console_only(&config.logging.level);
        }
    } else {
        feedhub::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let app = match App::open(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match execute(app, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
