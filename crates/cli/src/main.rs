mod console;

use anyhow::{Context, Result};
use clap::Parser;
use linecmd::{CommandManager, Dispatch};
use std::io::{self, BufRead};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

use crate::console::ConsoleCall;

#[derive(Parser)]
#[command(name = "linecmd")]
#[command(version, about = "Line-oriented command console", long_about = None)]
struct Cli {
    /// Prefix accepted in front of command names, e.g. "!"
    #[arg(short, long, default_value = "")]
    prefix: String,

    /// Answer lines that match no command with an error
    #[arg(long)]
    report_unknown: bool,

    /// Print the command catalog as JSON and exit
    #[arg(long)]
    describe: bool,

    /// Run LINE instead of reading standard input (repeatable)
    #[arg(short, long = "exec", value_name = "LINE")]
    exec: Vec<String>,
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let mut manager: CommandManager<ConsoleCall> =
        CommandManager::with_prefix(cli.prefix).report_unknown(cli.report_unknown);
    manager
        .load_commands(console::commands()?)
        .context("failed to register console commands")?;

    if cli.describe {
        println!("{}", manager.catalog().to_json_pretty()?);
        return Ok(ExitCode::SUCCESS);
    }

    let mut session = Session::default();
    if !cli.exec.is_empty() {
        for line in &cli.exec {
            if !session.dispatch(&manager, line)? {
                break;
            }
        }
    } else {
        for line in io::stdin().lock().lines() {
            let line = line.context("failed to read standard input")?;
            if !session.dispatch(&manager, &line)? {
                break;
            }
        }
    }

    tracing::debug!(
        executed = session.executed,
        rejected = session.rejected,
        "session finished"
    );
    if session.rejected > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Default)]
struct Session {
    executed: usize,
    rejected: usize,
}

impl Session {
    /// Dispatch one line. Returns `false` once a command asked to stop.
    fn dispatch(&mut self, manager: &CommandManager<ConsoleCall>, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }

        let mut call = ConsoleCall::new(line);
        let outcome = manager
            .run_command(&mut call)
            .with_context(|| format!("failed to run '{line}'"))?;
        match outcome {
            Dispatch::Executed { .. } => self.executed += 1,
            Dispatch::Rejected { .. } => self.rejected += 1,
            Dispatch::Unmatched => {}
        }
        Ok(!call.quit_requested())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}
