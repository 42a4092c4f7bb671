//! `nation`: command-line tool for Nation UHF RFID readers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use nation_protocol::{AntennaSet, Command, EpcWrite, ProtocolError, ProtocolSession, SessionEvent};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nation_reader::{
    transport, AutoImport, Catalog, ImportOutcome, NoCatalog, ProductLookup, Reader, ReaderConfig,
    ReaderError, ReaderEvent, ReaderResult, ResyncMode, SerialTransport, TagGroup, TagTable,
};

/// Nation UHF RFID reader tool
#[derive(Parser)]
#[command(name = "nation")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run inventory and print the tags seen
    Scan {
        /// Serial device, or tcp://host:port
        #[arg(short, long)]
        port: Option<String>,

        /// Antennas to use, e.g. 1,3
        #[arg(short, long, value_delimiter = ',')]
        antennas: Vec<u8>,

        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Run a single inventory round instead of continuous inventory
        #[arg(long)]
        single: bool,

        /// Product catalogue (YAML)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Link every new tag to this product id
        #[arg(long, value_name = "PRODUCT_ID")]
        import: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite a tag's EPC
    Write {
        /// Serial device, or tcp://host:port
        #[arg(short, long)]
        port: Option<String>,

        /// Current EPC (hex)
        #[arg(long)]
        old: String,

        /// New EPC (hex)
        #[arg(long)]
        new: String,

        /// Antenna to write with (1-4)
        #[arg(short, long, default_value_t = 1)]
        antenna: u8,

        /// Access password (hex)
        #[arg(long, default_value = "00000000", value_parser = parse_password)]
        password: u32,
    },

    /// Print the encoding of a command
    Frame {
        #[command(subcommand)]
        command: FrameCommand,
    },

    /// Decode hex bytes received from a reader
    Decode {
        /// Hex bytes; spaces are ignored
        #[arg(required = true)]
        hex: Vec<String>,

        /// Drop one byte instead of the whole frame on a checksum error
        #[arg(long)]
        skip_byte: bool,
    },

    /// List serial ports
    Ports,
}

#[derive(Subcommand)]
enum FrameCommand {
    /// Start inventory
    Start {
        #[arg(short, long, value_delimiter = ',', default_value = "1")]
        antennas: Vec<u8>,

        #[arg(long)]
        single: bool,
    },
    /// Stop inventory
    Stop,
    /// Rewrite an EPC
    Write {
        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,

        #[arg(short, long, default_value_t = 1)]
        antenna: u8,

        #[arg(long, default_value = "00000000", value_parser = parse_password)]
        password: u32,
    },
}

fn parse_password(s: &str) -> Result<u32, String> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid password '{}': {}", s, e))
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> ReaderResult<ReaderConfig> {
    match path {
        Some(path) => ReaderConfig::load(path),
        None => Ok(ReaderConfig::default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ReaderResult<()> {
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Scan {
            port,
            antennas,
            duration,
            single,
            catalog,
            import,
            json,
        } => {
            if let Some(port) = port {
                config.port = port;
            }
            if !antennas.is_empty() {
                config.antennas = antennas;
            }
            if single {
                config.continuous = false;
            }
            if catalog.is_some() {
                config.catalog = catalog;
            }
            config.validate()?;
            scan(&config, duration.map(Duration::from_secs), import.as_deref(), json)
        }
        Commands::Write {
            port,
            old,
            new,
            antenna,
            password,
        } => {
            if let Some(port) = port {
                config.port = port;
            }
            config.validate()?;
            let request = EpcWrite::new(&old, &new, antenna, password)?;
            write(&config, request)
        }
        Commands::Frame { command } => {
            let command = match command {
                FrameCommand::Start { antennas, single } => {
                    let antennas = AntennaSet::from_ids(&antennas)?;
                    if antennas.is_empty() {
                        return Err(ProtocolError::NoAntennaSelected.into());
                    }
                    Command::start_inventory(antennas, !single)
                }
                FrameCommand::Stop => Command::stop_inventory(),
                FrameCommand::Write {
                    old,
                    new,
                    antenna,
                    password,
                } => Command::write_epc(&old, &new, antenna, password)?,
            };
            println!("{}", hex::encode(command.encode()));
            Ok(())
        }
        Commands::Decode { hex, skip_byte } => {
            let mode = if skip_byte {
                ResyncMode::SkipByte
            } else {
                config.resync
            };
            decode(&hex.concat(), mode)
        }
        Commands::Ports => {
            for port in SerialTransport::available_ports()? {
                println!("{}", port);
            }
            Ok(())
        }
    }
}

fn scan(
    config: &ReaderConfig,
    duration: Option<Duration>,
    import: Option<&str>,
    json: bool,
) -> ReaderResult<()> {
    let mut catalog = match &config.catalog {
        Some(path) => Some(Catalog::load(path)?),
        None => None,
    };
    let mut auto_import = match (import, &catalog) {
        (Some(product_id), Some(catalog)) => Some(AutoImport::new(catalog, product_id)?),
        (Some(_), None) => {
            return Err(ReaderError::InvalidConfig(
                "--import needs a catalogue".to_string(),
            ))
        }
        (None, _) => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }
    }

    let mut reader = Reader::with_config(transport::open(config)?, config);
    let mut table = TagTable::new();
    let mut corrupt = 0usize;

    reader.start_inventory(config.antenna_set()?, config.continuous)?;
    let started = Instant::now();
    let mut stopping_at: Option<Instant> = None;

    loop {
        if stopping_at.is_none() {
            let expired = duration.map_or(false, |d| started.elapsed() >= d);
            if expired || !running.load(Ordering::SeqCst) {
                reader.stop_inventory()?;
                stopping_at = Some(Instant::now());
            }
        }
        if let Some(at) = stopping_at {
            // Late reports still arrive after STOP.
            if at.elapsed() >= config.settle_delay() {
                break;
            }
        }

        for event in reader.poll()? {
            match event {
                ReaderEvent::TagSeen(report) => {
                    let epc = report.epc_hex();
                    if let (Some(import), Some(catalog)) = (auto_import.as_mut(), catalog.as_mut()) {
                        if let Some(ImportOutcome::Linked) = import.offer(catalog, &epc)? {
                            table.refresh_products(&*catalog);
                        }
                    }
                    let lookup: &dyn ProductLookup = match &catalog {
                        Some(catalog) => catalog,
                        None => &NoCatalog,
                    };
                    let tag = table.record(&report, lookup);
                    if tag.count == 1 {
                        info!("New tag {} on antenna {}", tag.epc, tag.antenna);
                    }
                }
                ReaderEvent::CorruptFrame { .. } => corrupt += 1,
                _ => {}
            }
        }
    }

    if corrupt > 0 {
        warn!("{} corrupt frame(s) dropped", corrupt);
    }
    if let Some(import) = &auto_import {
        info!("Auto-import linked {} tag(s) to {}", import.linked_count(), import.product_id());
    }

    let groups = table.groups();
    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        print_group_table(&groups, table.len());
    }
    Ok(())
}

fn write(config: &ReaderConfig, request: EpcWrite) -> ReaderResult<()> {
    let mut reader = Reader::with_config(transport::open(config)?, config);
    reader.write_epc(request)?;
    let result = reader.wait_for_write(config.write_timeout())?;
    println!("{}", result);
    result.into_result()?;
    Ok(())
}

fn decode(hex_text: &str, mode: ResyncMode) -> ReaderResult<()> {
    let cleaned: String = hex_text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).map_err(|e| ProtocolError::InvalidHex(e.to_string()))?;

    let mut session = ProtocolSession::with_policy(mode.into());
    for event in session.feed(&bytes) {
        match event {
            SessionEvent::Message(message) => println!("{:?}", message),
            SessionEvent::CorruptFrame {
                computed,
                received,
                dropped,
            } => println!(
                "corrupt frame: crc {:04X} != {:04X}, dropped {} byte(s)",
                received, computed, dropped
            ),
            SessionEvent::Malformed { frame, error } => println!("malformed {}: {}", frame, error),
        }
    }
    let stats = session.stats();
    println!(
        "{} frame(s), {} corrupt, {} byte(s) discarded, {} byte(s) incomplete",
        stats.frames,
        stats.corrupt_frames,
        stats.bytes_discarded,
        session.buffered_len()
    );
    Ok(())
}

fn print_group_table(groups: &[TagGroup], unique: usize) {
    eprintln!();
    eprintln!("┌{}┬{}┬{}┬{}┬{}┐",
        "─".repeat(28),
        "─".repeat(18),
        "─".repeat(8),
        "─".repeat(6),
        "─".repeat(10));
    eprintln!("│ {:^26} │ {:^16} │ {:^6} │ {:^4} │ {:^8} │", "Product / EPC", "Category", "Items", "Ant", "Last");
    eprintln!("├{}┼{}┼{}┼{}┼{}┤",
        "─".repeat(28),
        "─".repeat(18),
        "─".repeat(8),
        "─".repeat(6),
        "─".repeat(10));

    for group in groups {
        let (name, category) = match &group.product {
            Some(product) => (product.name.clone(), product.category.clone()),
            None => (group.epcs.join(" "), "unregistered".to_string()),
        };
        eprintln!("│ {:26.26} │ {:16.16} │ {:6} │ {:4} │ {:8} │",
            name,
            category,
            group.total_items,
            group.antenna,
            group.last_seen.format("%H:%M:%S"));
    }

    eprintln!("└{}┴{}┴{}┴{}┴{}┘",
        "─".repeat(28),
        "─".repeat(18),
        "─".repeat(8),
        "─".repeat(6),
        "─".repeat(10));
    eprintln!("{} unique tag(s)", unique);
    eprintln!();
}
