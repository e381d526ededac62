mod error;
mod logging;
mod shell;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use hk_engine::{CommandEngine, Config, EngineHandle, Hooke};
use tracing::{debug, error, info};

use crate::error::{CliError, Result};
use crate::shell::{Outcome, Shell};

const DEFAULT_CONFIG: &str = "hooke.yaml";
const UI_NAMES: [&str; 3] = ["command line", "commandline", "cli"];

#[derive(Parser, Debug)]
#[command(name = "hooke")]
#[command(version, about = "Hooke - force spectroscopy analysis", long_about = None)]
struct Cli {
    /// Run commands from this file (one per line) before anything else
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Run this command after the script; may be repeated
    #[arg(short, long = "command")]
    commands: Vec<String>,

    /// Stay interactive after the script and commands
    #[arg(short, long)]
    persist: bool,

    /// User interface to run
    #[arg(short, long, default_value = "command line")]
    ui: String,

    /// Configuration file; later files override earlier ones
    #[arg(long = "config")]
    config: Vec<PathBuf>,

    /// Write the final configuration back on exit
    #[arg(long)]
    save_config: bool,

    /// Log debug messages to stderr
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Merge every config file in order.
fn load_config(paths: &[PathBuf]) -> Result<Config> {
    let mut config = Config::new();
    for path in paths {
        debug!(path = %path.display(), "loading config");
        config.merge(&Config::load(path)?);
    }
    Ok(config)
}

fn read_script(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|source| CliError::Script {
        path: path.to_path_buf(),
        source,
    })?;
    io::BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|source| CliError::Script {
            path: path.to_path_buf(),
            source,
        })
}

fn run(cli: Cli) -> Result<ExitCode> {
    logging::setup_logging(cli.debug)?;
    if !UI_NAMES.contains(&cli.ui.as_str()) {
        return Err(CliError::UnknownUi(cli.ui));
    }

    let mut hooke = Hooke::new(load_config(&cli.config)?)?;
    hooke.config_path = cli.config.last().cloned();
    info!(plugins = ?hooke.plugin_names(), "engine ready");
    let commands = hooke.commands().to_vec();
    let handle = EngineHandle::spawn(CommandEngine::new(hooke));
    let stdin = io::stdin().lock();
    let mut shell = Shell::new(handle, commands, stdin, io::stdout());

    let mut lines = match &cli.script {
        Some(path) => read_script(path)?,
        None => Vec::new(),
    };
    lines.extend(cli.commands.iter().cloned());
    let interactive = cli.persist || lines.is_empty();

    let mut exited = false;
    for line in &lines {
        if shell.execute_line(line)? == Outcome::Exit {
            exited = true;
            break;
        }
    }
    if interactive && !exited {
        shell.interact()?;
    }

    let failures = shell.failures;
    let hooke = shell.close()?;
    if cli.save_config {
        let path = hooke
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
        hooke.config.save(&path, hooke.settings())?;
        info!(path = %path.display(), "config saved");
    }
    Ok(if failures > 0 && !interactive {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
