//! ==============================================================================
//! main.rs - sensor console entry point
//! ==============================================================================
//!
//! purpose:
//!     command line front end over the console core. each subcommand stands in
//!     for one of the dashboard surfaces:
//!
//!     - login / register / logout: the login surface
//!     - list / stats / export: the dashboard (cards + csv export)
//!     - create / update / delete: the sensor management table and form
//!
//! responsibilities:
//!     - load console.toml and install the tracing subscriber
//!     - restore the persisted session and save it back after auth changes
//!     - run each command on a current-thread runtime (one task, suspension
//!       only at network calls)
//!
//! relationships:
//!     - uses: every module of the library crate
//!
//! ==============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use sensor_console::config::ConsoleConfig;
use sensor_console::{
    AuthGateway, Exporter, ExportSubset, FormCoordinator, HttpTransport, RecordId, Resync, SensorBoard, SensorKind,
    SensorRecord, SensorRepository, Session, Surface, Transport, UidAllocator,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// path to console.toml (default: config/console.toml, then ../config/console.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        username: String,
        #[arg(long, short)]
        password: String,
    },
    Register {
        username: String,
        #[arg(long, short)]
        password: String,
    },
    Logout,
    /// List sensor records, optionally of one type
    List {
        kind: Option<SensorKind>,
    },
    /// Per-type count, average, extrema and standard deviation
    Stats {
        /// print the summary as json
        #[arg(long)]
        json: bool,
    },
    /// Write {subset}_sensors_data.csv (all, temperature, luminosity)
    Export {
        #[arg(default_value = "all")]
        subset: ExportSubset,
    },
    Create {
        kind: SensorKind,
        value: String,
    },
    Update {
        kind: SensorKind,
        id: String,
        value: String,
        /// new reading time, YYYY-MM-DDTHH:MM
        #[arg(long)]
        timestamp: Option<String>,
    },
    Delete {
        kind: SensorKind,
        id: String,
    },
}

struct Console {
    config: ConsoleConfig,
    session: Session,
    gateway: AuthGateway,
    repo: SensorRepository,
    allocator: UidAllocator,
    board: SensorBoard,
}

impl Console {
    fn new(config: ConsoleConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(config.api.base_url.clone()).context("Failed to build http client")?);
        let session = Session::restore(&config.session.token_path).context("Failed to restore session")?;

        Ok(Self {
            gateway: AuthGateway::new(transport.clone()),
            repo: SensorRepository::new(transport.clone()),
            allocator: UidAllocator::new(transport),
            board: SensorBoard::new(),
            session,
            config,
        })
    }

    async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login { username, password } => {
                let surface = self.gateway.login(&mut self.session, &username, &password).await?;
                self.session.persist(&self.config.session.token_path)?;
                println!("Login successful!");
                announce(surface);
            }
            Commands::Register { username, password } => {
                self.gateway.register(&username, &password).await?;
                println!("Registered {}. You can now log in.", username);
            }
            Commands::Logout => {
                let surface = self.session.logout();
                self.session.persist(&self.config.session.token_path)?;
                println!("Logged out successfully");
                announce(surface);
            }
            Commands::List { kind } => {
                self.board.refresh(&self.repo, &self.session).await?;
                let records: Vec<&SensorRecord> = match kind {
                    Some(kind) => self.board.records().iter().filter(|r| r.kind == kind).collect(),
                    None => self.board.records().iter().collect(),
                };
                print_table(&records);
            }
            Commands::Stats { json } => {
                self.board.refresh_by_kind(&self.repo, &self.session).await?;
                let summary = self.board.summary();
                if json {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    return Ok(());
                }
                for card in [summary.temperature, summary.luminosity] {
                    println!("{} Sensors", card.kind.label());
                    for line in card.stats.lines(card.kind.unit()) {
                        println!("  {}", line);
                    }
                }
            }
            Commands::Export { subset } => {
                self.board.refresh_by_kind(&self.repo, &self.session).await?;
                let exporter = Exporter::new(&self.config.export.directory);
                let path = exporter.write(subset, &self.board.subset(subset))?;
                println!("{} data exported to {}", capitalize(subset.name()), path.display());
            }
            Commands::Create { kind, value } => {
                let mut form = FormCoordinator::new();
                form.open_create(&self.allocator, &self.session).await?;
                form.set_kind(kind)?;
                form.set_value(value)?;
                let resync = form.submit(&self.repo, &mut self.board, &self.session).await?;
                println!("Sensor added successfully");
                report(resync);
            }
            Commands::Update { kind, id, value, timestamp } => {
                self.board.refresh(&self.repo, &self.session).await?;
                let id = RecordId::new(id);
                let record = self
                    .board
                    .find(&id, kind)
                    .cloned()
                    .with_context(|| format!("No {} sensor with id {}", kind, id))?;

                let mut form = FormCoordinator::new();
                form.open_edit(&record)?;
                form.set_value(value)?;
                if let Some(timestamp) = timestamp {
                    form.set_timestamp(timestamp)?;
                }
                let resync = form.submit(&self.repo, &mut self.board, &self.session).await?;
                println!("Sensor updated successfully");
                report(resync);
            }
            Commands::Delete { kind, id } => {
                let resync = self
                    .board
                    .delete(&self.repo, &self.session, &RecordId::new(id), kind)
                    .await?;
                println!("Sensor deleted successfully");
                report(resync);
            }
        }
        Ok(())
    }
}

fn announce(surface: Surface) {
    match surface {
        Surface::Login => println!("Next: sensor-console login <username> --password <password>"),
        Surface::Dashboard => println!("Next: sensor-console stats"),
    }
}

fn report(resync: Resync) {
    if let Resync::Stale(e) = resync {
        eprintln!("Warning: the change went through, but the sensor list could not be refreshed: {}", e);
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn print_table(records: &[&SensorRecord]) {
    println!("{:<12} {:<12} {:>12} {:<20} {:>6}", "ID", "Type", "Value", "Timestamp", "UID");
    for record in records {
        println!(
            "{:<12} {:<12} {:>12} {:<20} {:>6}",
            record.id,
            record.kind.label(),
            record.value.to_string(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.uid
        );
    }
    println!("{} record(s)", records.len());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration
    let config = match &cli.config {
        Some(path) => ConsoleConfig::load(path)?,
        None => ConsoleConfig::load_or_default(),
    };

    // step 2: logging (RUST_LOG overrides the configured level)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(config.tracing_level()).into()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    config.log_summary();

    // step 3: run the command
    let mut console = Console::new(config)?;
    console.run(cli.command).await
}
