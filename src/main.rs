//! Scrape Supervisor - runs scraper, transcription and update workers and
//! relays their line protocol.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Password;
use tokio::sync::oneshot;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scrape_supervisor::config::{read_list, AppConfig, ConfigLoader};
use scrape_supervisor::display;
use scrape_supervisor::protocol::{InputKind, LogFilter, LogLevel, LogRecord};
use scrape_supervisor::session::{
    parse_date, DataType, DeclinePrompts, PromptHandler, RunKind, RunOutcome, ScrapeRequest,
    SessionController, ValidationError,
};

/// Interval between progress summary lines during a scrape.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DataTypeArg {
    Images,
    Videos,
    Audios,
    Text,
    Links,
}

impl From<DataTypeArg> for DataType {
    fn from(arg: DataTypeArg) -> Self {
        match arg {
            DataTypeArg::Images => DataType::Images,
            DataTypeArg::Videos => DataType::Videos,
            DataTypeArg::Audios => DataType::Audios,
            DataTypeArg::Text => DataType::Text,
            DataTypeArg::Links => DataType::Links,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "scrape-supervisor",
    about = "Run scraper, transcription and update workers under supervision",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Decline every credential request instead of prompting.
    #[arg(long, global = true)]
    unattended: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scraper.
    Scrape {
        /// Comma-separated group names.
        #[arg(long, value_delimiter = ',')]
        groups: Vec<String>,
        /// Comma-separated data types.
        #[arg(long, value_enum, value_delimiter = ',')]
        data_types: Vec<DataTypeArg>,
        /// Comma-separated dates (YYYY-MM-DD).
        #[arg(long, value_delimiter = ',')]
        dates: Vec<String>,
        /// File with one group name per line.
        #[arg(long)]
        groups_file: Option<PathBuf>,
        /// File with one data type per line.
        #[arg(long)]
        data_types_file: Option<PathBuf>,
        /// File with one date per line.
        #[arg(long)]
        dates_file: Option<PathBuf>,
        /// Folder downloads are written to.
        #[arg(long)]
        target: Option<PathBuf>,
        /// Transcribe downloaded videos after a successful scrape.
        #[arg(long)]
        transcribe: bool,
    },
    /// Transcribe videos in a folder.
    Transcribe {
        /// Folder to process (defaults to the target folder).
        folder: Option<PathBuf>,
    },
    /// Pull application updates.
    Update {
        /// Repository to update (defaults to the current directory).
        repo: Option<PathBuf>,
    },
}

/// Reads credentials from the terminal. Secret kinds are read without echo.
struct StdinPrompter;

#[async_trait]
impl PromptHandler for StdinPrompter {
    async fn collect(&self, kind: &InputKind) -> Option<String> {
        let kind = kind.clone();
        let (tx, rx) = oneshot::channel();
        // A plain thread: a read abandoned by `stop()` must not hold up
        // runtime shutdown.
        std::thread::spawn(move || {
            let _ = tx.send(read_answer(&kind));
        });
        let line = rx.await.ok().flatten()?;

        let value = line.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

fn read_answer(kind: &InputKind) -> Option<String> {
    if kind.is_secret() {
        display::print_prompt_header(kind);
        return Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .report(false)
            .interact()
            .ok();
    }

    display::print_prompt(kind);
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, String> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load().map_err(|e| e.to_string())
}

#[allow(clippy::too_many_arguments)]
fn build_request(
    config: &AppConfig,
    mut groups: Vec<String>,
    data_types: Vec<DataTypeArg>,
    dates: Vec<String>,
    groups_file: Option<PathBuf>,
    data_types_file: Option<PathBuf>,
    dates_file: Option<PathBuf>,
    target: Option<PathBuf>,
    transcribe: bool,
) -> Result<ScrapeRequest, String> {
    if let Some(path) = groups_file {
        groups.extend(read_list(&path).map_err(|e| e.to_string())?);
    }

    let mut types: Vec<DataType> = data_types.into_iter().map(DataType::from).collect();
    if let Some(path) = data_types_file {
        for entry in read_list(&path).map_err(|e| e.to_string())? {
            let data_type: DataType = entry.parse().map_err(|e: ValidationError| e.to_string())?;
            types.push(data_type);
        }
    }

    let mut date_entries = dates;
    if let Some(path) = dates_file {
        date_entries.extend(read_list(&path).map_err(|e| e.to_string())?);
    }
    let dates = date_entries
        .iter()
        .map(|d| parse_date(d))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    let target = target.unwrap_or_else(|| config.resolve_target_folder());
    Ok(ScrapeRequest::new(groups, types, dates, target).transcribe_after(transcribe))
}

/// Poll the controller until no run is left, rendering events and handling
/// Ctrl-C as a stop request.
async fn drive(controller: &mut SessionController, filter: &LogFilter) -> Option<RunOutcome> {
    let mut ticker = tokio::time::interval(controller.config().poll_interval);
    let mut last_progress = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() && controller.stop() {
                    tracing::info!("Ctrl-C received, stopping worker");
                }
            }
        }

        for event in controller.poll().await {
            display::print_event(&event, filter);
        }

        if !controller.is_active() {
            return controller.last_outcome().cloned();
        }

        if controller.current_kind() == Some(RunKind::Scrape)
            && last_progress.elapsed() >= PROGRESS_INTERVAL
        {
            display::print_progress(&controller.progress());
            last_progress = Instant::now();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            display::print_record(&LogRecord::new(e, LogLevel::Error));
            return ExitCode::FAILURE;
        }
    };

    let mut controller = if cli.unattended {
        SessionController::new(config.controller_config(), DeclinePrompts)
    } else {
        SessionController::new(config.controller_config(), StdinPrompter)
    };

    let started = match cli.command {
        Commands::Scrape {
            groups,
            data_types,
            dates,
            groups_file,
            data_types_file,
            dates_file,
            target,
            transcribe,
        } => build_request(
            &config,
            groups,
            data_types,
            dates,
            groups_file,
            data_types_file,
            dates_file,
            target,
            transcribe,
        )
        .and_then(|request| {
            tracing::info!(
                groups = request.groups.len(),
                dates = request.dates.len(),
                transcribe = request.transcribe_after,
                "Starting scrape"
            );
            controller.start(&request).map_err(|e| e.to_string())
        }),
        Commands::Transcribe { folder } => {
            let folder = folder.unwrap_or_else(|| config.resolve_target_folder());
            controller
                .start_transcription(&folder)
                .map_err(|e| e.to_string())
        }
        Commands::Update { repo } => {
            let repo = repo.unwrap_or_else(|| PathBuf::from("."));
            controller.start_update(&repo).map_err(|e| e.to_string())
        }
    };

    let filter = LogFilter::new();
    if let Err(e) = started {
        for event in controller.poll().await {
            display::print_event(&event, &filter);
        }
        display::print_record(&LogRecord::new(e, LogLevel::Error));
        return ExitCode::FAILURE;
    }

    display::print_separator();
    let outcome = drive(&mut controller, &filter).await;
    for settled in controller.history() {
        display::print_outcome(settled);
    }

    if outcome.as_ref().is_some_and(RunOutcome::is_success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
