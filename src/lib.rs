//! # Solis - telemetry and grid-charge control for Solis hybrid inverters
//!
//! Polls a Solis inverter behind a Solarman datalogger, decodes its
//! information register bank into typed telemetry, and toggles charging
//! from the grid with a single control write.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration, including the register map
//! - `logging`: structured tracing with injected component loggers
//! - `modbus`: the transport seam and the bundled Modbus TCP binding
//! - `registers`: chunked, retried register fetch and the typed decode
//!   primitives over the cached snapshot
//! - `inverter`: named telemetry properties and the charge control command
//!
//! ## Example
//!
//! ```no_run
//! use solis::{Config, Inverter};
//!
//! # async fn example() -> solis::Result<()> {
//! let mut config = Config::default();
//! config.connection.ip = "192.168.1.50".into();
//! config.connection.serial = 1234567890;
//!
//! let mut inverter = Inverter::new(config)?;
//! inverter.connect().await?;
//! inverter.refresh().await?;
//! println!("{}", inverter.snapshot()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod inverter;
pub mod logging;
pub mod modbus;
pub mod registers;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SolisError, TransientKind};
pub use inverter::{Inverter, TelemetrySnapshot};
pub use registers::RegisterCache;
