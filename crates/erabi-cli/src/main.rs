mod error;
mod fixture;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use erabi_core::config::AppConfig;
use erabi_core::fetch::{FetcherConfig, MediaFetcher};
use erabi_core::models::{EpisodeSort, MediaFetchRequest};
use erabi_core::selector::auto_select::{
    auto_enable_last_selected, await_completed_and_select_default, select_cached,
};
use erabi_core::selector::{MediaSelector, MediaSelectorContext};
use erabi_core::store::{persist_preference_changes, MemoryPreferenceStore, PreferenceStore};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::fixture::Fixture;
use crate::report::{Report, TitleReport};

#[derive(Parser)]
#[command(name = "erabi", version, about = "Find and pick media for an episode")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level for erabi crates, overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write logs to daily rotated files in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query every source of a fixture and select one item
    Fetch(FetchArgs),
    /// Show what is recognized in release titles
    Parse {
        #[arg(required = true)]
        titles: Vec<String>,
    },
    /// Write the effective config to the config file
    InitConfig,
}

#[derive(Args)]
struct FetchArgs {
    /// TOML file describing the sources
    #[arg(short, long)]
    sources: PathBuf,

    #[arg(long)]
    subject: String,

    /// Episode number
    #[arg(short, long)]
    episode: u32,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_level.as_deref(), cli.log_dir.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Option<&str>, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match level {
        Some(level) => EnvFilter::new(format!("erabi={level}")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("erabi=info")),
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "erabi.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder.with_writer(writer).with_ansi(false).init();
            Some(guard)
        }
        None => {
            builder.with_writer(std::io::stderr).init();
            None
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Command::Fetch(args) => fetch(&config, args, cli.json).await,
        Command::Parse { titles } => {
            let reports: Vec<TitleReport> = titles.iter().map(|t| TitleReport::new(t)).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                reports.iter().for_each(|r| print!("{r}"));
            }
            Ok(())
        }
        Command::InitConfig => {
            let path = cli.config.unwrap_or_else(AppConfig::config_path);
            config.save_to(&path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

async fn fetch(config: &AppConfig, args: FetchArgs, json: bool) -> Result<(), CliError> {
    let fixture = Fixture::load(&args.sources)?;
    let fetcher = MediaFetcher::new(fixture.instances(), FetcherConfig::from(config))?;
    let session = fetcher.new_session(MediaFetchRequest {
        subject_id: args.subject.clone(),
        episode_id: args.episode.to_string(),
        subject_primary_name: fixture
            .subject_name
            .clone()
            .unwrap_or_else(|| args.subject.clone()),
        subject_names: Vec::new(),
        episode_sort: EpisodeSort::Normal(args.episode),
        episode_ep: None,
        episode_name: String::new(),
    });

    let store = Arc::new(MemoryPreferenceStore::new(config.preference.clone()));
    let (_settings, settings) = watch::channel(config.selector.clone());
    let (_context, context) = watch::channel(MediaSelectorContext {
        subject_finished: Some(fixture.subject_finished),
        media_source_precedence: Some(fixture.precedence()),
        subtitle_preferences: Some(config.subtitles.preferences()),
    });
    let selector = MediaSelector::for_session(
        &session,
        store.saved_user_preference(&args.subject),
        store.default_preference(),
        settings,
        context,
    );
    let persist = tokio::spawn(persist_preference_changes(
        &selector,
        store.clone(),
        args.subject.clone(),
    ));
    auto_enable_last_selected(&selector, &session);

    let timeout = Duration::from_secs(args.timeout);
    let selected = tokio::time::timeout(timeout, async {
        match select_cached(&selector, &session).await {
            Some(cached) => Some(cached),
            None => {
                await_completed_and_select_default(&selector, &session, config.selector.prefer_kind)
                    .await
            }
        }
    })
    .await
    .map_err(|_| CliError::Timeout(timeout))?;

    match &selected {
        Some(media) => info!(media = %media.media_id, source = %media.media_source_id, "selected"),
        None => info!("nothing matched"),
    }

    let report = Report::new(&session, &selector);
    session.close();
    drop(selector);
    let _ = persist.await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}
