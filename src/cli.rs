//! CLI argument parsing with clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_SETTINGS_FILE;

/// Without options the run is interactive.
#[derive(Parser, Debug)]
#[command(name = "jailsmith")]
#[command(author, version, about = "Provision and verify a fail2ban ban policy")]
pub struct Cli {
    /// Settings file path (defaults apply when it does not exist)
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Take operator answers from a YAML file instead of prompting
    #[arg(short, long)]
    pub answers: Option<PathBuf>,

    /// Print the default settings file and exit
    #[arg(long)]
    pub print_default_settings: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,
}
