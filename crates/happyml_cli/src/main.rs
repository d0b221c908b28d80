//! The `happyml` binary (spec §6): a thin driver over `happyml_cli`'s DSL,
//! in the shape of `bit_llama::main` — `tracing_subscriber` wired to an
//! `EnvFilter`, a panic hook that logs instead of silently aborting, and a
//! `clap`-parsed outer `Cli` whose flags configure the driver itself (not
//! the DSL, which the REPL/script loop tokenizes line by line).

use anyhow::Result;
use clap::Parser;
use happyml_cli::command::{self, Command};
use happyml_cli::executor;
use happyml_cli::lexer;
use happyml_cli::repo::HappyMlRepo;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "happyml", about = "HappyML dataset/task command-line driver")]
struct Cli {
    /// Root directory holding datasets/ and models/, created on first use.
    #[arg(long, default_value = "happyml_repo")]
    repo_root: PathBuf,

    /// Run commands from a script file instead of an interactive REPL.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.parse().expect("default_level is a valid tracing level"))
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    std::panic::set_hook(Box::new(|panic_info| {
        tracing::error!("crash: {panic_info}");
    }));

    tracing::info!("happyml starting, repo root: {}", cli.repo_root.display());
    let repo = HappyMlRepo::new(cli.repo_root.clone());

    let result = match &cli.script {
        Some(path) => run_script(&repo, path),
        None => run_repl(&repo),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(repo: &HappyMlRepo, path: &std::path::Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    for line in content.lines() {
        if run_line(repo, line)? {
            break;
        }
    }
    Ok(())
}

fn run_repl(repo: &HappyMlRepo) -> Result<()> {
    let stdin = io::stdin();
    print!("happyml> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match run_line(repo, &line) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => eprintln!("error: {e}"),
        }
        print!("happyml> ");
        io::stdout().flush()?;
    }
    Ok(())
}

/// Tokenize, parse, and execute one DSL line. Returns `true` if the line
/// was `exit`/`quit` and the caller's loop should stop.
fn run_line(repo: &HappyMlRepo, line: &str) -> Result<bool> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(false);
    }

    let tokens = lexer::tokenize(trimmed).map_err(|e| anyhow::anyhow!(e))?;
    if tokens.is_empty() {
        return Ok(false);
    }
    let command = command::parse(&tokens).map_err(|e| anyhow::anyhow!(e))?;

    if command == Command::Exit {
        return Ok(true);
    }

    match executor::execute(repo, &command) {
        Ok(message) => {
            if !message.is_empty() {
                println!("{message}");
            }
            Ok(false)
        }
        Err(e) => {
            tracing::warn!("command failed: {e}");
            Err(anyhow::anyhow!(e))
        }
    }
}
