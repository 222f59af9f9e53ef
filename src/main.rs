use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod config;
mod controller;
mod dates;
mod documents;
mod domain;
mod expiry;
mod export;
mod inputter;
mod model;
mod relay;
mod session;
mod table;
mod ui;

use client::RelayClient;
use config::RelayConfig;
use controller::Controller;
use domain::{BoardConfig, BoardError, DEFAULT_EXPORT_FILE};
use expiry::ExpiryPolicy;
use export::{ExportOptions, TablePdf, build_report, export_to_file};
use model::{Model, Status};
use table::{DocumentTable, SortKey};
use ui::TableUI;

#[derive(Parser)]
#[command(name = "edms-board", version, about)]
struct Cli {
    /// Log file for the dashboard and headless export. The relay logs to stderr.
    #[arg(long, global = true, default_value = "edms-board.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay in front of Mayan EDMS (configured through the environment)
    Serve,
    /// Open the terminal dashboard (default)
    View(ViewArgs),
    /// Log in, fetch and write the PDF without a terminal UI
    Export(ExportArgs),
}

#[derive(Args, Clone)]
struct ViewArgs {
    /// Base URL of the relay
    #[arg(long, env = "EDMS_RELAY_URL", default_value = "http://localhost:5000/")]
    relay: String,

    #[arg(long, default_value_t = 5)]
    page_size: usize,

    /// Where exports are written, `~` and env vars are expanded
    #[arg(long, default_value = DEFAULT_EXPORT_FILE)]
    output: PathBuf,

    /// Metadata label holding the end date, may be repeated
    #[arg(long = "expiry-field")]
    expiry_fields: Vec<String>,
}

impl Default for ViewArgs {
    fn default() -> Self {
        let config = BoardConfig::default();
        Self {
            relay: std::env::var("EDMS_RELAY_URL").unwrap_or(config.relay_url),
            page_size: config.page_size,
            output: config.export_path,
            expiry_fields: Vec::new(),
        }
    }
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    view: ViewArgs,

    #[arg(long, env = "EDMS_USERNAME")]
    username: String,

    #[arg(long, env = "EDMS_PASSWORD", hide_env_values = true)]
    password: String,

    /// Global text filter
    #[arg(long)]
    filter: Option<String>,

    /// Sort by this column (`label`, `created` or a metadata label)
    #[arg(long)]
    sort: Option<String>,

    /// Sort descending
    #[arg(long)]
    desc: bool,

    /// Leave expired documents out of the PDF
    #[arg(long)]
    exclude_expired: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::View(ViewArgs::default()));

    let to_stderr = matches!(command, Command::Serve);
    if let Err(e) = init_tracing(&cli.log_file, to_stderr) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let result = match command {
        Command::Serve => serve(),
        Command::View(args) => view(&args),
        Command::Export(args) => export(&args),
    };

    match result {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_tracing(log_file: &Path, to_stderr: bool) -> Result<(), BoardError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(ErrorLayer::default());

    let initialised = if to_stderr {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()
    } else {
        let file = File::create(log_file)?;
        registry
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .try_init()
    };
    initialised.map_err(|e| BoardError::Config(format!("Cannot install logger: {e}")))
}

fn board_config(args: &ViewArgs) -> BoardConfig {
    let mut config = BoardConfig::default()
        .with_relay_url(args.relay.clone())
        .with_page_size(args.page_size.max(1))
        .with_export_path(args.output.clone());
    if !args.expiry_fields.is_empty() {
        config = config.with_expiry_fields(args.expiry_fields.clone());
    }
    config
}

fn runtime() -> Result<tokio::runtime::Runtime, BoardError> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

fn serve() -> Result<(), BoardError> {
    let config = RelayConfig::load()?;
    runtime()?.block_on(relay::serve(config))
}

fn view(args: &ViewArgs) -> Result<(), BoardError> {
    let config = board_config(args);
    info!("Starting dashboard against {}", config.relay_url);

    let mut model = Model::init(&config)?;
    let ui = TableUI::new(&config);
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), BoardError> {
        while model.status != Status::Quitting {
            terminal.draw(|f| ui.draw(&model, f))?;
            let message = controller.handle_event(&model)?;
            model.update(message)?;
        }
        Ok(())
    })();
    ratatui::restore();
    result
}

fn export(args: &ExportArgs) -> Result<(), BoardError> {
    let config = board_config(&args.view);
    let client = RelayClient::new(config.relay_url.clone());

    let documents = runtime()?.block_on(async {
        let session = client.login(&args.username, &args.password).await?;
        client.fetch_documents(&session).await
    })?;

    let mut table = DocumentTable::from_documents(
        documents,
        config.page_size,
        ExpiryPolicy::new(config.expiry_fields.clone()),
    );
    if let Some(filter) = &args.filter {
        table.set_filter(filter);
    }
    if let Some(column) = &args.sort {
        let key = sort_key(&table, column)?;
        table.sort_by(key.clone());
        if args.desc {
            table.sort_by(key);
        }
    }

    let options = ExportOptions {
        include_expired: !args.exclude_expired,
        today: Local::now().date_naive(),
    };
    let report = build_report(&table, &options);
    let path = export_to_file(&report, &TablePdf, &config.export_path)?;
    println!("{} rows written to {}", report.rows.len(), path.display());
    Ok(())
}

fn sort_key(table: &DocumentTable, column: &str) -> Result<SortKey, BoardError> {
    match column.to_lowercase().as_str() {
        "label" => Ok(SortKey::Label),
        "created" => Ok(SortKey::Created),
        _ => documents::find_column(table.columns(), column)
            .map(|c| SortKey::Column(c.clone()))
            .ok_or_else(|| BoardError::Config(format!("Unknown sort column {column}"))),
    }
}
