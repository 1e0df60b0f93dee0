mod cli;
mod commands;
mod error;
mod output;

use std::path::Path;

use clap::{CommandFactory, Parser};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::{CliError, exit_code};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed.
    let guard = init_tracing(&cli.global);

    let code = tokio::select! {
        result = run(cli) => match result {
            Ok(()) => exit_code::SUCCESS,
            Err(err) => {
                let code = err.exit_code();
                eprintln!("{:?}", miette::Report::new(err));
                code
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted");
            exit_code::INTERRUPTED
        }
    };
    drop(guard);
    std::process::exit(code);
}

fn init_tracing(global: &GlobalOpts) -> Option<WorkerGuard> {
    let level = match global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    let (file, guard) = match global.log_file.as_deref() {
        Some(path) => {
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or(std::ffi::OsStr::new("acisync.log"));
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stderr).with(file).init();
    guard
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Sync(args) => commands::sync::handle(args, &cli.global).await,
        Command::Kinds => commands::kinds::handle(&cli.global),
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "acisync", &mut std::io::stdout());
            Ok(())
        }
    }
}
