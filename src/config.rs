//! Configuration management for the Solis driver
//!
//! Loads and validates the YAML configuration: connection parameters for
//! the Solarman datalogger, the register map, and the polling/retry knobs.
//! Register addresses live here rather than in code because Solis firmware
//! revisions disagree on a few of them; a deviating device gets a config
//! override, not a code change.

use crate::error::{Result, SolisError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Inverter connection parameters
    pub connection: ConnectionConfig,

    /// Register address mappings
    pub registers: RegisterMapConfig,

    /// Polling and retry behaviour
    pub polling: PollingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Solarman datalogger connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// IP address of the datalogger stick
    pub ip: String,

    /// Datalogger serial number (printed on the stick)
    pub serial: u32,

    /// TCP port (Solarman sticks listen on 8899)
    pub port: u16,
}

/// Register address mappings for the information bank and control register.
///
/// All addresses except `energy_control` must fall inside
/// `[info_start, info_end)`; `energy_control` is a holding register outside
/// the information bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterMapConfig {
    /// First address of the information register bank
    pub info_start: u16,

    /// One past the last address of the information register bank
    pub info_end: u16,

    /// Energy-storage control register (grid-charge bitmask target)
    pub energy_control: u16,

    /// Raw battery "discharging" flag (nonzero = discharging)
    pub discharging_flag: u16,

    /// Battery power, s32
    pub battery_power: u16,

    /// Battery state of charge, percent
    pub battery_level: u16,

    /// Battery state of health, percent
    pub battery_health: u16,

    /// Inverter serial number, packed ASCII
    pub serial_number: u16,

    /// Serial number length in registers (2 chars each)
    pub serial_number_count: u16,

    /// DSP software version
    pub dsp_version: u16,

    /// DC string voltages, 0.1 V units
    pub dc_voltage_1: u16,
    pub dc_voltage_2: u16,

    /// Inverter temperature, 0.1 C units
    pub temperature: u16,

    /// Daily energy counters, 100 Wh units
    pub generation_today: u16,
    pub battery_charge_today: u16,
    pub battery_discharge_today: u16,
    pub house_load_today: u16,
    pub grid_import_today: u16,
    pub grid_export_today: u16,

    /// Instantaneous power, s32, W
    pub power_generation: u16,
    pub house_load: u16,
    pub backup_load: u16,
    pub grid_usage: u16,
}

/// Polling and retry behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Max registers per transport read call
    pub read_chunk_size: u16,

    /// Update attempts before giving up
    pub update_attempts: u32,

    /// Linear backoff unit between attempts, in milliseconds
    pub backoff_unit_ms: u64,

    /// Transport connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-operation timeout in milliseconds
    pub operation_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ip: "192.168.1.100".to_string(),
            serial: 0,
            port: 8899,
        }
    }
}

impl Default for RegisterMapConfig {
    fn default() -> Self {
        Self {
            info_start: 33000,
            info_end: 33286,
            energy_control: 43110,
            discharging_flag: 33135,
            battery_power: 33149,
            battery_level: 33139,
            battery_health: 33140,
            serial_number: 33004,
            serial_number_count: 15,
            dsp_version: 33001,
            dc_voltage_1: 33049,
            dc_voltage_2: 33051,
            temperature: 33093,
            generation_today: 33035,
            battery_charge_today: 33163,
            battery_discharge_today: 33167,
            house_load_today: 33179,
            grid_import_today: 33171,
            grid_export_today: 33175,
            power_generation: 33057,
            house_load: 33147,
            backup_load: 33148,
            grid_usage: 33130,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 100,
            update_attempts: 10,
            backoff_unit_ms: 1000,
            connect_timeout_ms: 5000,
            operation_timeout_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.ip.is_empty() {
            return Err(SolisError::config("connection.ip: cannot be empty"));
        }
        if self.connection.port == 0 {
            return Err(SolisError::config("connection.port: must be greater than 0"));
        }
        if self.connection.serial == 0 {
            return Err(SolisError::config(
                "connection.serial: datalogger serial is required",
            ));
        }

        let regs = &self.registers;
        if regs.info_end <= regs.info_start {
            return Err(SolisError::config(
                "registers.info_end: must be greater than registers.info_start",
            ));
        }

        self.check_info_range("registers.discharging_flag", regs.discharging_flag, 1)?;
        self.check_info_range("registers.battery_power", regs.battery_power, 2)?;
        self.check_info_range("registers.battery_level", regs.battery_level, 1)?;
        self.check_info_range("registers.battery_health", regs.battery_health, 1)?;
        self.check_info_range(
            "registers.serial_number",
            regs.serial_number,
            regs.serial_number_count,
        )?;
        self.check_info_range("registers.dsp_version", regs.dsp_version, 1)?;
        self.check_info_range("registers.dc_voltage_1", regs.dc_voltage_1, 1)?;
        self.check_info_range("registers.dc_voltage_2", regs.dc_voltage_2, 1)?;
        self.check_info_range("registers.temperature", regs.temperature, 1)?;
        self.check_info_range("registers.generation_today", regs.generation_today, 1)?;
        self.check_info_range(
            "registers.battery_charge_today",
            regs.battery_charge_today,
            1,
        )?;
        self.check_info_range(
            "registers.battery_discharge_today",
            regs.battery_discharge_today,
            1,
        )?;
        self.check_info_range("registers.house_load_today", regs.house_load_today, 1)?;
        self.check_info_range("registers.grid_import_today", regs.grid_import_today, 1)?;
        self.check_info_range("registers.grid_export_today", regs.grid_export_today, 1)?;
        self.check_info_range("registers.power_generation", regs.power_generation, 2)?;
        self.check_info_range("registers.house_load", regs.house_load, 2)?;
        self.check_info_range("registers.backup_load", regs.backup_load, 2)?;
        self.check_info_range("registers.grid_usage", regs.grid_usage, 2)?;

        if self.polling.read_chunk_size == 0 {
            return Err(SolisError::config(
                "polling.read_chunk_size: must be greater than 0",
            ));
        }
        if self.polling.update_attempts == 0 {
            return Err(SolisError::config(
                "polling.update_attempts: must be greater than 0",
            ));
        }

        Ok(())
    }

    fn check_info_range(&self, field: &str, addr: u16, count: u16) -> Result<()> {
        let regs = &self.registers;
        if addr < regs.info_start || u32::from(addr) + u32::from(count) > u32::from(regs.info_end) {
            return Err(SolisError::config(format!(
                "{}: {} (+{} words) is outside the information bank {}..{}",
                field, addr, count, regs.info_start, regs.info_end
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.connection.serial = 1234567890;
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.port, 8899);
        assert_eq!(config.registers.info_start, 33000);
        assert_eq!(config.registers.info_end, 33286);
        assert_eq!(config.polling.read_chunk_size, 100);
        assert_eq!(config.polling.update_attempts, 10);
    }

    #[test]
    fn test_config_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());

        // Missing serial is fatal, not retried
        let mut config = valid_config();
        config.connection.serial = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.connection.ip = String::new();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.registers.info_end = config.registers.info_start;
        assert!(config.validate().is_err());

        // An s32 register needs two words inside the bank
        let mut config = valid_config();
        config.registers.battery_power = config.registers.info_end - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.connection.serial, deserialized.connection.serial);
        assert_eq!(
            config.registers.energy_control,
            deserialized.registers.energy_control
        );
    }
}
