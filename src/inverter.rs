//! Inverter facade: typed telemetry and grid-charge control
//!
//! [`Inverter`] composes one transport and one [`RegisterCache`] into
//! named, unit-scaled telemetry properties plus the single control write
//! that toggles charging from the grid. All derived reads are pure
//! functions over the current snapshot; the only I/O paths are
//! [`Inverter::refresh`] and [`Inverter::set_charge_enabled`].

use crate::config::Config;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger};
use crate::modbus::{default_transport, SolarmanTransport};
use crate::registers::RegisterCache;
use serde::Serialize;

/// Energy-storage control bitmask, bit 0: self-use (spontaneous) mode.
/// Always set in every control write.
const SELF_USE_MODE: u16 = 0b000001;

/// Bits 1 and 5 together enable charging from the grid. Observed on the
/// wire; the vendor docs only call them "optimized revenue" and
/// "reserved".
const GRID_CHARGE_BITS: u16 = 0b100010;

/// One Solis hybrid inverter behind a Solarman datalogger.
pub struct Inverter {
    config: Config,
    transport: Box<dyn SolarmanTransport>,
    info_regs: RegisterCache,
    logger: StructuredLogger,
}

impl Inverter {
    /// Create an inverter using the default transport for the configured
    /// connection. Fails fast on invalid configuration; no I/O happens
    /// until [`Inverter::connect`].
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = default_transport(&config.connection, &config.polling)?;
        Self::with_transport(config, transport)
    }

    /// Create an inverter over an externally supplied transport.
    pub fn with_transport(config: Config, transport: Box<dyn SolarmanTransport>) -> Result<Self> {
        let serial = config.connection.serial;
        let info_regs = RegisterCache::new(
            config.registers.info_start,
            config.registers.info_end,
            &config.polling,
            StructuredLogger::new(LogContext::new("registers").with_device_serial(serial)),
        )?;
        let logger = StructuredLogger::new(LogContext::new("inverter").with_device_serial(serial));
        Ok(Self {
            config,
            transport,
            info_regs,
            logger,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether at least one refresh has succeeded
    pub fn has_snapshot(&self) -> bool {
        self.info_regs.has_snapshot()
    }

    /// Establish the transport session
    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    /// Refetch the information register bank.
    ///
    /// On failure the previous snapshot (if any) remains readable; callers
    /// must treat derived values as stale, not gone.
    pub async fn refresh(&mut self) -> Result<()> {
        self.info_regs.update(self.transport.as_mut()).await
    }

    /// Enable or disable charging the battery from the grid.
    ///
    /// One holding-register write, no retry: repeating a failed write
    /// without confirmation could double-apply the toggle.
    pub async fn set_charge_enabled(&mut self, enabled: bool) -> Result<()> {
        let mut value = SELF_USE_MODE;
        if enabled {
            value |= GRID_CHARGE_BITS;
        }
        self.logger.info(&format!(
            "{} charging from grid",
            if enabled { "Enabling" } else { "Disabling" }
        ));
        self.transport
            .write_holding_register(self.config.registers.energy_control, value)
            .await
    }

    /// Raw "discharging" flag exactly as the device reports it: nonzero
    /// means the battery is discharging. The register name is inverted
    /// relative to its semantic meaning; every charge-direction decision
    /// goes through here so the inversion lives in one place.
    fn is_discharging_raw(&self) -> Result<bool> {
        Ok(self
            .info_regs
            .u16_at(self.config.registers.discharging_flag)?
            != 0)
    }

    /// Whether the battery is currently charging
    pub fn is_charging(&self) -> Result<bool> {
        Ok(!self.is_discharging_raw()?)
    }

    /// Battery charge(+) / discharge(-) rate in W.
    ///
    /// The sign is normalized here: positive always means charging,
    /// whatever sign convention the raw register uses.
    pub fn battery_flow_rate_w(&self) -> Result<i32> {
        let raw = self.info_regs.s32_at(self.config.registers.battery_power)?;
        if self.is_charging()? {
            Ok(raw)
        } else {
            Ok(-raw)
        }
    }

    /// Battery state of charge in percent
    pub fn battery_level_pct(&self) -> Result<u16> {
        self.info_regs.u16_at(self.config.registers.battery_level)
    }

    /// Battery state of health in percent
    pub fn battery_health_pct(&self) -> Result<u16> {
        self.info_regs.u16_at(self.config.registers.battery_health)
    }

    /// DC string 1 voltage in V
    pub fn dc_voltage_1(&self) -> Result<f64> {
        Ok(f64::from(self.info_regs.u16_at(self.config.registers.dc_voltage_1)?) / 10.0)
    }

    /// DC string 2 voltage in V
    pub fn dc_voltage_2(&self) -> Result<f64> {
        Ok(f64::from(self.info_regs.u16_at(self.config.registers.dc_voltage_2)?) / 10.0)
    }

    /// Inverter temperature in degrees C
    pub fn temperature_c(&self) -> Result<f64> {
        Ok(f64::from(self.info_regs.u16_at(self.config.registers.temperature)?) / 10.0)
    }

    /// Power generated today in Wh
    pub fn generation_today_wh(&self) -> Result<u32> {
        self.daily_counter(self.config.registers.generation_today)
    }

    /// Battery charge today in Wh
    pub fn battery_charge_today_wh(&self) -> Result<u32> {
        self.daily_counter(self.config.registers.battery_charge_today)
    }

    /// Battery discharge today in Wh
    pub fn battery_discharge_today_wh(&self) -> Result<u32> {
        self.daily_counter(self.config.registers.battery_discharge_today)
    }

    /// House load today in Wh
    pub fn house_load_today_wh(&self) -> Result<u32> {
        self.daily_counter(self.config.registers.house_load_today)
    }

    /// Energy imported from the grid today in Wh
    pub fn grid_imported_today_wh(&self) -> Result<u32> {
        self.daily_counter(self.config.registers.grid_import_today)
    }

    /// Energy exported to the grid today in Wh
    pub fn grid_exported_today_wh(&self) -> Result<u32> {
        self.daily_counter(self.config.registers.grid_export_today)
    }

    // Daily counters store 100 Wh units
    fn daily_counter(&self, addr: u16) -> Result<u32> {
        Ok(u32::from(self.info_regs.u16_at(addr)?) * 100)
    }

    /// Instantaneous generation in W
    pub fn power_generation_w(&self) -> Result<i32> {
        self.info_regs.s32_at(self.config.registers.power_generation)
    }

    /// Instantaneous house load in W
    pub fn house_load_w(&self) -> Result<i32> {
        self.info_regs.s32_at(self.config.registers.house_load)
    }

    /// Instantaneous load on the backup (emergency) supply in W
    pub fn backup_load_w(&self) -> Result<i32> {
        self.info_regs.s32_at(self.config.registers.backup_load)
    }

    /// Instantaneous grid flow in W, positive = import, negative = export
    pub fn grid_usage_w(&self) -> Result<i32> {
        self.info_regs.s32_at(self.config.registers.grid_usage)
    }

    /// Inverter serial number
    pub fn serial_number(&self) -> Result<String> {
        self.info_regs.ascii_at(
            self.config.registers.serial_number,
            self.config.registers.serial_number_count,
        )
    }

    /// DSP software version
    pub fn dsp_software_version(&self) -> Result<u16> {
        self.info_regs.u16_at(self.config.registers.dsp_version)
    }

    /// Gather all derived properties into one snapshot.
    ///
    /// Fails as a whole before the first successful refresh; it never
    /// yields a partially valid snapshot.
    pub fn snapshot(&self) -> Result<TelemetrySnapshot> {
        Ok(TelemetrySnapshot {
            serial_number: self.serial_number()?,
            dsp_software_version: self.dsp_software_version()?,
            charging: self.is_charging()?,
            battery_flow_rate_w: self.battery_flow_rate_w()?,
            battery_level_pct: self.battery_level_pct()?,
            battery_health_pct: self.battery_health_pct()?,
            dc_voltage_1: self.dc_voltage_1()?,
            dc_voltage_2: self.dc_voltage_2()?,
            temperature_c: self.temperature_c()?,
            generation_today_wh: self.generation_today_wh()?,
            battery_charge_today_wh: self.battery_charge_today_wh()?,
            battery_discharge_today_wh: self.battery_discharge_today_wh()?,
            house_load_today_wh: self.house_load_today_wh()?,
            grid_imported_today_wh: self.grid_imported_today_wh()?,
            grid_exported_today_wh: self.grid_exported_today_wh()?,
            power_generation_w: self.power_generation_w()?,
            house_load_w: self.house_load_w()?,
            backup_load_w: self.backup_load_w()?,
            grid_usage_w: self.grid_usage_w()?,
        })
    }
}

/// All derived telemetry, gathered from one register snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub serial_number: String,
    pub dsp_software_version: u16,
    pub charging: bool,
    pub battery_flow_rate_w: i32,
    pub battery_level_pct: u16,
    pub battery_health_pct: u16,
    pub dc_voltage_1: f64,
    pub dc_voltage_2: f64,
    pub temperature_c: f64,
    pub generation_today_wh: u32,
    pub battery_charge_today_wh: u32,
    pub battery_discharge_today_wh: u32,
    pub house_load_today_wh: u32,
    pub grid_imported_today_wh: u32,
    pub grid_exported_today_wh: u32,
    pub power_generation_w: i32,
    pub house_load_w: i32,
    pub backup_load_w: i32,
    pub grid_usage_w: i32,
}

impl std::fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Serial: {}", self.serial_number)?;
        writeln!(f, "DSP version: {}", self.dsp_software_version)?;
        if self.charging {
            writeln!(f, "Battery charging: {} W", self.battery_flow_rate_w)?;
        } else {
            writeln!(f, "Battery discharging: {} W", -self.battery_flow_rate_w)?;
        }
        writeln!(f, "Battery level: {}%", self.battery_level_pct)?;
        writeln!(f, "Battery health: {}%", self.battery_health_pct)?;
        writeln!(f, "DC voltage 1: {:.1} V", self.dc_voltage_1)?;
        writeln!(f, "DC voltage 2: {:.1} V", self.dc_voltage_2)?;
        writeln!(f, "Temperature: {:.1} C", self.temperature_c)?;
        writeln!(f, "Generation: {} W", self.power_generation_w)?;
        writeln!(f, "House load: {} W", self.house_load_w)?;
        writeln!(f, "Backup load: {} W", self.backup_load_w)?;
        writeln!(f, "Grid usage: {} W", self.grid_usage_w)?;
        writeln!(f, "Generated today: {} Wh", self.generation_today_wh)?;
        writeln!(f, "Battery charged today: {} Wh", self.battery_charge_today_wh)?;
        writeln!(
            f,
            "Battery discharged today: {} Wh",
            self.battery_discharge_today_wh
        )?;
        writeln!(f, "House load today: {} Wh", self.house_load_today_wh)?;
        writeln!(f, "Grid imported today: {} Wh", self.grid_imported_today_wh)?;
        write!(f, "Grid exported today: {} Wh", self.grid_exported_today_wh)
    }
}
