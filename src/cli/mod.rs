//! Command-line interface for viewstats.
//!
//! `viewstats check` validates a view configuration; `viewstats replay`
//! feeds a JSON-lines measurement log through it and prints the resulting
//! view snapshots.

pub mod replay;

use crate::core::config::Config;
use crate::core::{logging, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

/// Tagged measurement aggregation, checked and replayed offline.
#[derive(Parser, Debug)]
#[command(name = "viewstats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, env = "VIEWSTATS_DEBUG")]
    pub debug: bool,

    /// Log with thread ids, targets and line numbers
    #[arg(long, global = true)]
    pub structured_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a configuration file and list its views
    Check {
        /// Configuration file path
        #[arg(short, long, env = "VIEWSTATS_CONFIG")]
        config: PathBuf,
    },
    /// Replay a JSON-lines measurement log and print every view as JSON
    Replay {
        /// Configuration file path
        #[arg(short, long, env = "VIEWSTATS_CONFIG")]
        config: PathBuf,
        /// Input log, one record per line
        #[arg(short, long)]
        input: PathBuf,
        /// Query time in milliseconds since the epoch (default: last record)
        #[arg(long)]
        at: Option<i64>,
    },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    fn config_path(&self) -> &Path {
        match &self.command {
            Command::Check { config } | Command::Replay { config, .. } => config.as_path(),
        }
    }

    /// Load the configuration file and apply CLI overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::from_file(self.config_path())?;
        config.debug = self.debug;
        if self.structured_logs {
            config.logging.structured = true;
        }
        Ok(config)
    }
}

/// Execute the viewstats command.
pub fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    logging::init(&config.logging, config.debug)?;
    tracing::debug!("Loaded configuration from: {:?}", cli.config_path());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Command::Check { .. } => print_check(&config, &mut out),
        Command::Replay { input, at, .. } => {
            let file = File::open(input)?;
            let records = replay::read_records(BufReader::new(file))?;
            let views = replay::replay(&config, &records, *at)?;
            serde_json::to_writer_pretty(&mut out, &views)?;
            writeln!(out)?;
            Ok(())
        },
    }
}

/// Writes a human-readable summary of a validated configuration.
pub fn print_check<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    writeln!(out, "Configuration is valid!")?;
    writeln!(out, "  Recorder mode: {:?}", config.recorder.mode)?;
    writeln!(out, "  Initial state: {:?}", config.collection.initial_state)?;
    writeln!(out, "  Views: {}", config.views.len())?;
    for view in &config.views {
        let view = view.to_view()?;
        writeln!(
            out,
            "    {} ({} of {}, {:?})",
            view.name(),
            view.aggregation().kind_name(),
            view.measure().name(),
            view.window()
        )?;
    }
    Ok(())
}
