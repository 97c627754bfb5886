//! CLI entry point for the launcher.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use launcher::config::EnvConfig;
use launcher::io::git::Git;
use launcher::io::paths::WorkspacePaths;
use launcher::io::tester::ProcessTester;
use launcher::orchestrate::{begin_or_continue, checkpoint, finalize, BeginOutcome};
use launcher::{exit_codes, logging, maintenance};

#[derive(Parser)]
#[command(
    name = "launcher",
    version,
    about = "CI launcher that schedules recurring host-liveness test cycles"
)]
struct Cli {
    /// Declare the running part as "to be continued" (checkpoint).
    #[arg(short, long, conflicts_with = "end")]
    save: bool,

    /// Declare the test cycle as completely finished and publish the
    /// output artifact.
    #[arg(short, long)]
    end: bool,

    /// Activate verbose logging.
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    if let Err(err) = run(&cli) {
        eprintln!("{err:#}");
        std::process::exit(exit_codes::FATAL);
    }
    std::process::exit(exit_codes::OK);
}

fn run(cli: &Cli) -> Result<()> {
    let config = EnvConfig::from_env();
    let paths = WorkspacePaths::new(&config.workspace_dir);
    let git = Git::new(&config.workspace_dir);

    if let Some(email) = &config.git_email {
        // Hygiene, not a prerequisite: commits only happen later in the CI
        // job, and a bare checkout should not block the phase.
        if let Err(err) = git.configure_author(&config.git_name, email) {
            warn!(error = %format!("{err:#}"), "could not configure commit author");
        }
    }

    if cli.save {
        checkpoint(&paths, &git)?;
    } else if cli.end {
        finalize(&paths, &git)?;
    } else {
        let tester = ProcessTester::new(&config.tester_program);
        let steps = maintenance::default_steps();
        match begin_or_continue(&config, &paths, &git, &tester, &steps)? {
            BeginOutcome::NotAuthorized { .. } => {
                // Normal exit: the next-authorized time was already logged.
            }
            BeginOutcome::Ran { finalized } => {
                info!(finalized, "part completed");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_is_begin_or_continue() {
        let cli = Cli::parse_from(["launcher"]);
        assert!(!cli.save && !cli.end && !cli.debug);
    }

    #[test]
    fn parse_save_flag() {
        let cli = Cli::parse_from(["launcher", "--save"]);
        assert!(cli.save);
    }

    #[test]
    fn save_and_end_conflict() {
        assert!(Cli::try_parse_from(["launcher", "--save", "--end"]).is_err());
    }
}
