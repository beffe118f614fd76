mod script;

use std::io::Read;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xray_api::MetadataService;
use xray_core::config::{AppConfig, GeneralConfig};
use xray_core::models::{PanelMessage, TitleEvent};
use xray_detect::{ScriptedPage, TitleObserver};
use xray_parse::PatternPriority;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Watch-page title detection and metadata lookup.
#[derive(Parser)]
#[command(name = "xray")]
#[command(version)]
struct Cli {
    /// Config file. Defaults to the platform config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a player title and print the result as JSON.
    Parse {
        title: String,
        /// Try the season and separator patterns before the bare marker.
        #[arg(long)]
        most_specific: bool,
    },
    /// Parse a title, look it up, and print the panel message.
    Lookup { title: String },
    /// Run a scripted page session through the full pipeline.
    Replay {
        /// Script file. Reads stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Config {
        /// Also write it to the config file.
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    init_tracing(&config.general)?;

    match cli.command {
        Commands::Parse {
            title,
            most_specific,
        } => {
            let priority = if most_specific {
                PatternPriority::MostSpecific
            } else {
                config.parser.pattern_priority
            };
            let parsed = xray_parse::parse_with(&title, priority);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Commands::Lookup { title } => lookup(&config, &title).await?,
        Commands::Replay { file } => replay(&config, file).await?,
        Commands::Config { write } => {
            let path = cli.config.unwrap_or_else(AppConfig::config_path);
            if write {
                config.save_to(&path)?;
            }
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

/// Console logging, plus a daily rolling file when `log_dir` is set.
/// `RUST_LOG` overrides the configured level.
fn init_tracing(general: &GeneralConfig) -> CliResult<()> {
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    let console = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let file = match &general.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("xray")
                .filename_suffix("log")
                .max_log_files(14)
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = GUARD.set(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

async fn lookup(config: &AppConfig, title: &str) -> CliResult<()> {
    let event = TitleEvent::from(xray_parse::parse_with(title, config.parser.pattern_priority));
    let request = xray_runtime::lookup_request(&event);
    let client = xray_runtime::metadata_client(config)?;

    info!(title = %request.title(), media_type = event.media_type().as_str(), "looking up");
    let record = client.lookup(&request).await?;
    let message = PanelMessage::new(event.media_type(), record);
    println!("{}", serde_json::to_string_pretty(&message.to_wire())?);
    Ok(())
}

async fn replay(config: &AppConfig, file: Option<PathBuf>) -> CliResult<()> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let steps = script::parse_script(&input)?;

    let (handle, mut panel_rx) = xray_runtime::spawn_from_config(config)?;
    let mut observer = TitleObserver::new(ScriptedPage::new("about:blank"), config.watch_page()?);
    xray_runtime::attach(&mut observer, &handle);
    observer.start();
    script::play(&mut observer, &steps);
    observer.stop();

    let deadline = Duration::from_secs(config.metadata.timeout_secs + 5);
    let stats = match tokio::time::timeout(deadline, handle.wait_idle()).await {
        Ok(stats) => stats,
        Err(_) => {
            warn!("timed out waiting for metadata lookups");
            handle.stats().await
        }
    };

    while let Ok(message) = panel_rx.try_recv() {
        println!("{}", serde_json::to_string(&message.to_wire())?);
    }
    info!(
        dispatched = stats.dispatched,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "replay finished"
    );
    if stats.failed > 0 {
        eprintln!("{} of {} lookups failed", stats.failed, stats.dispatched);
    }
    Ok(())
}
