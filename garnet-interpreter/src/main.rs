//!
//! This is the command-line front-end of the Garnet interpreter.
//!
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use clap::Parser;
#[cfg(feature = "jemalloc")]
use jemallocator::Jemalloc;
use log::{LevelFilter, Log, Metadata, Record};

use garnet_core::LocationDetail;
use garnet_interpreter::{Config, Interpreter, StdConsole};

mod shell;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Debug, Clone, PartialEq, clap::Parser)]
#[clap(about, author)]
struct Options {
    /// File to run (starts an interactive shell when omitted).
    #[clap(name = "FILE")]
    file: Option<PathBuf>,

    /// Arguments made available to the program as `ARGV`.
    #[clap(name = "ARGS")]
    args: Vec<String>,

    /// Leave out the built-ins that touch the filesystem.
    #[clap(long)]
    sandbox: bool,

    /// Run `Thread.new` blocks synchronously instead of on host threads.
    #[clap(long)]
    single_threaded: bool,

    /// How many runtime-created symbols are kept before eviction.
    #[clap(long, value_name = "N")]
    symbol_capacity: Option<usize>,

    /// Include columns in error locations.
    #[clap(long)]
    columns: bool,

    /// Enable verbose output (with timing information and debug logs).
    #[clap(short = 'v')]
    verbose: bool,
}

/// Writes log records to the standard error stream.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() -> anyhow::Result<()> {
    let opts: Options = Options::parse();

    log::set_logger(&LOGGER).map_err(|err| anyhow!("could not install the logger: {}", err))?;
    log::set_max_level(if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    });

    let mut config = Config::new()
        .sandbox(opts.sandbox)
        .thread_safety(!opts.single_threaded)
        .console(Arc::new(StdConsole));
    if let Some(capacity) = opts.symbol_capacity {
        config = config.mortal_symbol_capacity(capacity);
    }
    if opts.columns {
        config = config.location_detail(LocationDetail::LineAndColumn);
    }
    log::debug!("configuration: {:?}", config);

    let interpreter = Interpreter::new(config);

    match opts.file {
        None => shell::interactive(&interpreter, opts.verbose)?,
        Some(file) => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("could not read '{}'", file.display()))?;
            interpreter.set_arguments(&file.to_string_lossy(), &opts.args);

            let program = interpreter.parse(&source)?;
            if let Err(err) = interpreter.interpret(&program) {
                eprintln!("{}: {}", file.display(), err);
                if !err.is_guest_error() {
                    return Err(err.into());
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
