use std::path::{Path, PathBuf};
use std::{fs, io, process};

use clap::{Parser, Subcommand};
use symsync_core::debug_link::{self, DebugLink};
use symsync_core::events::{DebuggerEvent, EventBus, StopReason};
use symsync_core::gdb::GdbCommandWriter;
use symsync_core::intent::join_image_path;
use symsync_core::layout::{LayoutInspector, RecordLayout, DEFAULT_RECORD_SYMBOL};
use symsync_core::snapshot::{find_symbol_address, MemorySnapshot};
use symsync_core::sync::{SyncConfig, SyncController, Transition, DEFAULT_ELF_SEARCH_DIR};
use symsync_core::{Result as SyncResult, SyncError};
use symsync_utils::{error, info, init_logging, init_logging_to_dir, init_logging_with_level, LogFormat, LogLevel};

/// Keeps debugger symbols in sync with dynamically loaded firmware applications.
#[derive(Parser, Debug)]
#[command(name = "symsync")]
#[command(version)]
#[command(about = "Keeps debugger symbols in sync with dynamically loaded firmware applications", long_about = None)]
struct Cli
{
    /// Log level (error, warn, info, debug, trace). Overrides RUST_LOG.
    #[arg(long, global = true, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Write logs to a dated file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the debug link embedded in an application image
    Debuglink
    {
        /// Application image carrying a .gnu_debuglink section
        elf: PathBuf,
        /// Check the referenced debug image in this directory against the checksum
        #[arg(long)]
        verify_dir: Option<String>,
    },
    /// Replay core dumps as consecutive stops and print the GDB commands issued
    Replay
    {
        /// Firmware image defining the loader's record pointer symbol
        #[arg(long)]
        firmware: PathBuf,
        /// Symbol holding the address of the last loaded application record
        #[arg(long, default_value = DEFAULT_RECORD_SYMBOL)]
        symbol: String,
        /// Directory the debugger finds debug images in
        #[arg(long, default_value = DEFAULT_ELF_SEARCH_DIR)]
        elf_dir: String,
        /// Warn when a debug image does not match the recorded checksum
        #[arg(long, default_value_t = false)]
        verify_checksum: bool,
        /// ELF core dumps, in the order the target stopped
        #[arg(required = true)]
        cores: Vec<PathBuf>,
    },
}

fn parse_log_level(s: &str) -> Result<LogLevel, String>
{
    s.parse().map_err(|err: symsync_utils::LoggingError| err.to_string())
}

fn main()
{
    let cli = Cli::parse();

    // Logging goes to stderr or a file; stdout is reserved for GDB commands
    let logging = match (&cli.log_dir, cli.log_level) {
        (Some(dir), level) => init_logging_to_dir(dir, level).map(|_| ()),
        (None, Some(level)) => init_logging_with_level(level, LogFormat::Pretty),
        (None, None) => init_logging(),
    };
    if let Err(e) = logging {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    let result = match cli.command {
        Commands::Debuglink { elf, verify_dir } => show_debug_link(&elf, verify_dir.as_deref()),
        Commands::Replay {
            firmware,
            symbol,
            elf_dir,
            verify_checksum,
            cores,
        } => {
            let config = SyncConfig::default()
                .with_elf_search_dir(elf_dir)
                .with_verify_checksum(verify_checksum);
            replay(&firmware, &symbol, config, &cores)
        }
    };

    match result {
        Ok(0) => {}
        Ok(failures) => {
            eprintln!("{failures} stop(s) could not be synchronized");
            process::exit(1);
        }
        Err(e) => {
            error!(%e, "symsync failed");
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn read_file(path: &Path) -> SyncResult<Vec<u8>>
{
    fs::read(path).map_err(|err| {
        SyncError::Io(io::Error::new(err.kind(), format!("{}: {err}", path.display())))
    })
}

/// Print the debug link of `elf`, optionally checking the debug image it names.
fn show_debug_link(elf: &Path, verify_dir: Option<&str>) -> SyncResult<usize>
{
    let image = read_file(elf)?;
    let Some(link) = debug_link::read_section(&image)? else {
        println!("{}: no {} section", elf.display(), debug_link::DEBUG_LINK_SECTION);
        return Ok(0);
    };

    println!("name:     {}", link.elf_name);
    println!("checksum: {:#010x}", link.checksum);

    match verify_dir {
        Some(dir) => verify_debug_image(&link, dir),
        None => Ok(0),
    }
}

fn verify_debug_image(link: &DebugLink, dir: &str) -> SyncResult<usize>
{
    let path = join_image_path(dir, &link.elf_name);
    if link.matches_file(&path)? {
        println!("{path}: checksum ok");
        Ok(0)
    } else {
        println!("{path}: checksum mismatch");
        Ok(1)
    }
}

/// Treat each core as one stop of the target and write the resulting GDB
/// commands to stdout. Returns the number of stops that failed to sync.
fn replay(firmware: &Path, symbol: &str, config: SyncConfig, cores: &[PathBuf]) -> SyncResult<usize>
{
    let record_pointer = find_symbol_address(&read_file(firmware)?, symbol)?;
    info!(%symbol, address = %record_pointer, "found record pointer");

    let Some((first, rest)) = cores.split_first() else {
        return Ok(0);
    };

    let bus = EventBus::new();
    let inspector = LayoutInspector::new(load_core(first)?, record_pointer, RecordLayout::default());
    let mut controller = SyncController::new(inspector, GdbCommandWriter::new(io::stdout()), bus.clone(), config);

    let mut failures = 0;
    // Attaching reconciles against the first core
    match controller.attach() {
        Ok(transition) => report(first, transition),
        Err(e) => {
            failures += 1;
            report_failure(first, &e);
        }
    }

    for core in rest {
        controller.target_mut().replace_memory(load_core(core)?);
        bus.publish(DebuggerEvent::stopped(StopReason::Interrupt));
        if let Err(e) = controller.pump() {
            failures += 1;
            report_failure(core, &e);
        }
        if let Some(app) = controller.tracked() {
            info!(core = %core.display(), app = app.name(), text = %app.text_address(), "tracking");
        }
    }

    controller.detach();
    Ok(failures)
}

fn load_core(path: &Path) -> SyncResult<MemorySnapshot>
{
    MemorySnapshot::from_core(&read_file(path)?)
}

fn report(core: &Path, transition: Transition)
{
    info!(core = %core.display(), ?transition, "reconciled");
}

fn report_failure(core: &Path, err: &SyncError)
{
    error!(core = %core.display(), %err, "symbol sync failed");
    eprintln!("{}: {err}", core.display());
}
