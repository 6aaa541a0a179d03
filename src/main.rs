use anyhow::Result;
use clap::{Parser, Subcommand};
use solis::{Config, Inverter};
use tracing::error;

/// Solis inverter stats and grid-charge control
#[derive(Debug, Parser)]
#[clap(author, version)]
struct Options {
    /// Config file to read (flags below override it)
    #[clap(short = 'c', long = "config")]
    config_file: Option<String>,

    /// IP address of the Solarman datalogger
    #[clap(long)]
    ip: Option<String>,

    /// Datalogger serial number
    #[clap(long)]
    serial: Option<u32>,

    /// TCP port of the datalogger
    #[clap(long)]
    port: Option<u16>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch and print a telemetry snapshot
    Stats,
    /// Toggle charging the battery from the grid
    Charge {
        /// Enable charging from the grid (the default)
        #[clap(long, conflicts_with = "disable")]
        enable: bool,

        /// Disable charging from the grid
        #[clap(long)]
        disable: bool,
    },
}

impl Options {
    fn build_config(&self) -> Result<Config> {
        let mut config = match &self.config_file {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(ip) = &self.ip {
            config.connection.ip = ip.clone();
        }
        if let Some(serial) = self.serial {
            config.connection.serial = serial;
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse();
    let config = options.build_config()?;
    solis::logging::init_logging(&config.logging)?;

    let mut inverter = Inverter::new(config)?;
    inverter.connect().await?;

    match options.command {
        Command::Stats => {
            if let Err(e) = inverter.refresh().await {
                // Never print telemetry derived from an invalid window
                error!("Failed to update registers: {}", e);
                return Err(anyhow::anyhow!("stats unavailable: {}", e));
            }
            println!("{}", inverter.snapshot()?);
        }
        Command::Charge { enable: _, disable } => {
            let enabled = !disable;
            inverter.set_charge_enabled(enabled).await?;
            println!(
                "Charging from grid {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    Ok(())
}
