mod cli;
mod config;
mod launcher;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use libmate::{EncodeContext, Session, SessionError, SessionOptions};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Invocation};
use config::Config;
use launcher::ConnectError;

// sysexits.h
const EX_USAGE: u8 = 64;
const EX_UNAVAILABLE: u8 = 69;
const EX_OSERR: u8 = 71;
const EX_IOERR: u8 = 74;

#[derive(Debug, Error)]
enum AppError {
    #[error("failed to get current working directory: {0}")]
    CurrentDir(io::Error),
    #[error("{0}")]
    Connect(#[from] ConnectError),
    #[error("{0}")]
    Session(#[from] SessionError),
}

impl AppError {
    fn exit_code(&self) -> u8 {
        match self {
            AppError::CurrentDir(_) => EX_OSERR,
            AppError::Connect(_) => EX_UNAVAILABLE,
            AppError::Session(_) => EX_IOERR,
        }
    }
}

/// `--help` and `--version` exit cleanly, anything else is a usage error
fn parse_error_code(e: &clap::Error) -> u8 {
    if e.use_stderr() { EX_USAGE } else { 0 }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_error_code(&e));
        }
    };

    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mate: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flags
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mate={level},libmate={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let invocation = Invocation {
        program: std::env::args_os().next().map(PathBuf::from).unwrap_or_default(),
        stdin_is_pipe: !io::stdin().is_terminal(),
        env_project: std::env::var("TM_PROJECT_UUID").ok(),
    };
    let plan = cli.plan(&invocation, || {
        std::env::current_dir().map_err(AppError::CurrentDir)
    })?;

    let config = Config::load();
    debug!(?config, "Config loaded");

    let ctx = EncodeContext {
        stdin_is_pipe: invocation.stdin_is_pipe,
        stdout_is_pipe: !io::stdout().is_terminal(),
        current_document: std::env::var("TM_DOCUMENT_UUID").ok(),
        default_project: plan.default_project.clone(),
        keep_escapes: plan.keep_escapes,
        ..Default::default()
    };

    let socket = config.socket_path();
    let stream = launcher::connect(&socket, &config)?;

    let mut session = Session::new(
        stream,
        SessionOptions {
            read_greeting: config.greeting,
            ..Default::default()
        },
    );
    session.read_greeting()?;

    if plan.reads_stdin() && !invocation.stdin_is_pipe {
        eprintln!("Reading from stdin, press ^D to stop");
    }

    let summary = session.send_batch(&plan.documents, &mut io::stdin().lock(), &ctx)?;
    if summary.should_warn_about_escapes(plan.keep_escapes) {
        eprintln!("WARNING: Removed ANSI escape codes. Use -e/--[no-]escapes.");
    }

    session.receive(&mut io::stdout().lock())?;
    debug!(report = ?session.report(), "Editor closed the connection");
    Ok(())
}
