//! jailsmith - fail2ban provisioning for a single host.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use jailsmith::cli::Cli;
use jailsmith::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_default_settings {
        print!("{}", Settings::generate_default_yaml());
        return Ok(());
    }

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    jailsmith::commands::provision::run(&cli.settings, cli.answers.as_deref()).await
}
