use anyhow::{anyhow, Context, Result};
use clap::Parser;
use memscan::command::{dispatch, Command, Flow};
use memscan::config::{validate_config, ConfigLoader, DEFAULT_CONFIG_FILE};
use memscan::{ProcessId, PtraceProcess, Session, SessionOptions, VERSION};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Interactive memory scanner for running Linux processes
#[derive(Debug, Parser)]
#[command(name = "memscan", version, about)]
struct Cli {
    /// Process to scan
    #[arg(short, long)]
    pid: Option<ProcessId>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level, ignoring RUST_LOG and the configuration
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new(&cli.config)
        .load_or_default()
        .with_context(|| format!("loading {}", cli.config.display()))?;
    validate_config(&config)?;

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!("memscan v{}", VERSION);
    info!("Architecture: {}", std::env::consts::ARCH);

    // Ctrl-C interrupts the running command, never the prompt itself
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let signal_slot = Arc::clone(&current);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match signal_slot.lock() {
                Ok(token) => token.cancel(),
                Err(_) => break,
            }
        }
    });

    let options = SessionOptions::from_config(&config);
    tokio::task::spawn_blocking(move || run_prompt(options, cli.pid, current)).await??;

    info!("Shutting down memscan");
    Ok(())
}

fn run_prompt(
    options: SessionOptions,
    pid: Option<ProcessId>,
    current: Arc<Mutex<CancellationToken>>,
) -> Result<()> {
    let mut session = Session::new(PtraceProcess::new(), options);
    if let Some(pid) = pid {
        let regions = session
            .bind(pid)
            .with_context(|| format!("reading regions of process {}", pid))?;
        info!(pid, regions, "ready");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    let mut last: Option<Command> = None;

    loop {
        write!(stdout, "{}> ", session.match_count())?;
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        // a blank line repeats the previous command
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => match &last {
                Some(command) => command.clone(),
                None => continue,
            },
            Err(err) => {
                eprintln!("error: {}", err);
                continue;
            }
        };

        let cancel = CancellationToken::new();
        *current
            .lock()
            .map_err(|_| anyhow!("cancellation slot poisoned"))? = cancel.clone();
        if command.is_long_running() {
            eprintln!("running until interrupted with Ctrl-C");
        }

        debug!(?command, "dispatching");
        match dispatch(&mut session, command.clone(), &cancel, &mut stdout) {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => eprintln!("error: {}", err),
        }
        last = Some(command);
    }

    Ok(())
}
