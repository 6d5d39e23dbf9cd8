use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use lazygrid::error::user_message_from_report;
use lazygrid::protocol::{handle_line, Response};
use lazygrid::{
    scan_with, AppConfig, Args, ConfigManager, FrameRegistry, GridEvent, GridOptions, GridSession,
    ScanOptions, APP_NAME,
};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::channel;
use std::thread;
use tracing_subscriber::EnvFilter;

/// Env var consulted for the log filter when `--log-level` is not given.
const LOG_ENV: &str = "LAZYGRID_LOG";

fn init_logging(args: &Args, config: &AppConfig) {
    let level = args
        .log_level
        .clone()
        .or_else(|| std::env::var(LOG_ENV).ok())
        .or_else(|| config.debug.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Write one protocol line to stdout and flush so the reader sees each phase.
fn emit(line: String) {
    let mut out = io::stdout().lock();
    if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
        tracing::warn!(error = %e, "failed to write to stdout");
    }
}

fn run(path: &Path, args: &Args, config: &AppConfig) -> Result<()> {
    let options = GridOptions::from_args_and_config(args, config);
    if options.chunk_size == 0 {
        return Err(eyre!("chunk size must be greater than 0"));
    }
    let scan_options = ScanOptions::from_args_and_config(args, config);
    let (lf, descriptions) = scan_with(path, &scan_options)?;

    let instance_id = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| APP_NAME.to_string());
    let registry = FrameRegistry::new();
    let mut session = GridSession::new(instance_id, registry, options);
    session.run_event(GridEvent::Initialize(lf, descriptions), |state| {
        emit(Response::State { state }.to_line())
    });

    let (tx, rx) = channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stopped reading stdin");
                    break;
                }
            }
        }
    });

    for line in rx {
        handle_line(&mut session, &line, emit);
    }
    session.close();
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let config_manager = ConfigManager::new(APP_NAME)?;
        match config_manager.write_default_config(args.force) {
            Ok(path) => {
                println!("Configuration file written to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error writing configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let config = AppConfig::load(APP_NAME)?;
    init_logging(&args, &config);

    let Some(path) = args.path.clone() else {
        return Err(eyre!("A data file path is required"));
    };
    if let Err(e) = run(&path, &args, &config) {
        let message = user_message_from_report(&e, Some(&path));
        emit(Response::Error { message: message.clone() }.to_line());
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }
    Ok(())
}
