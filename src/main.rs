//! EventsTrace harness - run EventsTrace and print the events you ask for
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use etrace_core::{load_config, load_config_strict, logging, HarnessConfig};
use etrace_harness::{run_trace, TraceOptions};
use etrace_session::CancelSource;

/// EventsTrace harness - wait for readiness, then print matching events
#[derive(Parser, Debug)]
#[command(name = "etrace-harness")]
#[command(about = "Run EventsTrace and print the next matching events", long_about = None)]
struct Args {
    /// Harness config file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// EventsTrace binary to launch
    #[arg(long, value_name = "PATH")]
    binary: Option<PathBuf>,

    /// Event kind to accept (repeatable); defaults to every known kind
    #[arg(long = "kind", value_name = "KIND")]
    kinds: Vec<String>,

    /// Number of matching events to print
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Seconds to wait for the first line of output
    #[arg(long, value_name = "SECS")]
    ready_timeout: Option<u64>,

    /// Seconds to wait for each matching event
    #[arg(long, value_name = "SECS")]
    event_timeout: Option<u64>,

    /// Log to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,

    /// Extra arguments for EventsTrace
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<String>,
}

impl Args {
    fn harness_config(&self) -> etrace_core::Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_strict(path)?,
            None => load_config(&PathBuf::from("etrace.toml")),
        };

        if let Some(binary) = &self.binary {
            config = config.with_binary(binary);
        }
        if let Some(secs) = self.ready_timeout {
            config = config.with_ready_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.event_timeout {
            config = config.with_event_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if args.log_stderr {
        logging::init_stderr();
    } else {
        logging::init()?;
    }

    let mut options = TraceOptions::new(args.harness_config()?);
    options.args = args.args;
    options.kinds = args.kinds;
    options.count = args.count;

    // Ctrl-C cancels the readiness wait and stops the readers
    let shutdown = CancelSource::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    if let Err(e) = run_trace(options, shutdown.signal(), &mut stdout).await {
        if !args.log_stderr {
            if let Ok(path) = logging::get_current_log_file() {
                eprintln!("See {} for details", path.display());
            }
        }
        return Err(e.into());
    }

    Ok(())
}
