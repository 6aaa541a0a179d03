//! Transport seam for the Solarman-connected Modbus register space
//!
//! The register cache and facade only ever talk to [`SolarmanTransport`];
//! the wire protocol (Solarman V5 framing, CRC, Modbus encapsulation) is
//! the transport's problem. The bundled [`ModbusTcpTransport`] speaks plain
//! Modbus TCP via tokio-modbus, which covers dataloggers running in
//! transparent mode; a true V5 transport plugs into the same trait.

use crate::config::{ConnectionConfig, PollingConfig};
use crate::error::{Result, SolisError};
use crate::logging::{get_logger, StructuredLogger};
use std::any::Any;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::client::tcp;
use tokio_modbus::prelude::*;

/// Async register transport for one inverter connection.
#[async_trait::async_trait]
pub trait SolarmanTransport: Send {
    /// Downcast hook for tests
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Establish (or re-establish) the underlying session
    async fn connect(&mut self) -> Result<()>;

    /// Read exactly `count` consecutive input registers starting at `addr`
    async fn read_input_registers(&mut self, addr: u16, count: u16) -> Result<Vec<u16>>;

    /// Write a single holding register
    async fn write_holding_register(&mut self, addr: u16, value: u16) -> Result<()>;
}

/// Modbus TCP binding of [`SolarmanTransport`]
#[derive(Debug)]
pub struct ModbusTcpTransport {
    /// Modbus TCP client connection
    client: Option<tokio_modbus::client::Context>,

    /// Connection parameters
    config: ConnectionConfig,

    /// Connection timeout
    connect_timeout: Duration,

    /// Per-operation timeout
    operation_timeout: Duration,

    /// Logger
    logger: StructuredLogger,
}

impl ModbusTcpTransport {
    /// Create a new transport. Fails with a configuration error when the
    /// datalogger serial is missing, before any socket is opened.
    pub fn new(config: &ConnectionConfig, polling: &PollingConfig) -> Result<Self> {
        if config.serial == 0 {
            return Err(SolisError::config("datalogger serial is required"));
        }
        let logger = StructuredLogger::new(
            crate::logging::LogContext::new("transport").with_device_serial(config.serial),
        );
        Ok(Self {
            client: None,
            config: config.clone(),
            connect_timeout: Duration::from_millis(polling.connect_timeout_ms),
            operation_timeout: Duration::from_millis(polling.operation_timeout_ms),
            logger,
        })
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Get client reference or error if not connected
    fn get_client(&mut self) -> Result<&mut tokio_modbus::client::Context> {
        self.client
            .as_mut()
            .ok_or_else(|| SolisError::transport_unavailable("not connected to inverter"))
    }

    fn classify_transport_error(err: tokio_modbus::Error) -> SolisError {
        match err {
            tokio_modbus::Error::Transport(io_err) => SolisError::from(io_err),
            tokio_modbus::Error::Protocol(proto_err) => SolisError::framing(proto_err.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl SolarmanTransport for ModbusTcpTransport {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    async fn connect(&mut self) -> Result<()> {
        let address = format!("{}:{}", self.config.ip, self.config.port);

        self.logger.info(&format!("Connecting to {}", address));

        let socket_addr: std::net::SocketAddr = address
            .parse()
            .map_err(|e| SolisError::config(format!("Invalid socket address: {}", e)))?;

        // Drop any half-dead session before dialing again
        self.client = None;

        // Solarman sticks expose the inverter as Modbus unit 1
        match timeout(self.connect_timeout, tcp::connect_slave(socket_addr, Slave(1))).await {
            Ok(Ok(client)) => {
                self.client = Some(client);
                self.logger.info("Connected");
                Ok(())
            }
            Ok(Err(e)) => {
                let error_msg = format!("Failed to connect: {}", e);
                self.logger.error(&error_msg);
                Err(SolisError::transport_unavailable(error_msg))
            }
            Err(_) => {
                let error_msg = "Connection timeout".to_string();
                self.logger.error(&error_msg);
                Err(SolisError::transport_unavailable(error_msg))
            }
        }
    }

    async fn read_input_registers(&mut self, addr: u16, count: u16) -> Result<Vec<u16>> {
        let timeout_duration = self.operation_timeout;

        self.logger
            .trace(&format!("Reading {} registers from {}", count, addr));

        let client = self.get_client()?;
        let request = client.read_input_registers(addr, count);

        match timeout(timeout_duration, request).await {
            Ok(Ok(Ok(words))) => {
                if words.len() != count as usize {
                    return Err(SolisError::decode(format!(
                        "short read at {}: expected {} registers, got {}",
                        addr,
                        count,
                        words.len()
                    )));
                }
                Ok(words)
            }
            Ok(Ok(Err(exception))) => Err(SolisError::framing(format!(
                "Modbus exception reading {}: {}",
                addr, exception
            ))),
            Ok(Err(e)) => {
                let err = Self::classify_transport_error(e);
                self.logger.debug(&format!("Read failed: {}", err));
                Err(err)
            }
            Err(_) => Err(SolisError::timeout(format!(
                "read of {} registers at {} timed out",
                count, addr
            ))),
        }
    }

    async fn write_holding_register(&mut self, addr: u16, value: u16) -> Result<()> {
        let timeout_duration = self.operation_timeout;

        self.logger
            .debug(&format!("Writing value {:#06x} to register {}", value, addr));

        let client = self.get_client()?;
        let request = client.write_single_register(addr, value);

        match timeout(timeout_duration, request).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(exception))) => Err(SolisError::framing(format!(
                "Modbus exception writing {}: {}",
                addr, exception
            ))),
            Ok(Err(e)) => {
                let err = Self::classify_transport_error(e);
                self.logger.error(&format!("Write failed: {}", err));
                Err(err)
            }
            Err(_) => Err(SolisError::timeout(format!("write to {} timed out", addr))),
        }
    }
}

/// Build the default transport for a connection, logging the choice once.
pub fn default_transport(
    config: &ConnectionConfig,
    polling: &PollingConfig,
) -> Result<Box<dyn SolarmanTransport>> {
    let transport = ModbusTcpTransport::new(config, polling)?;
    get_logger("transport").debug(&format!(
        "Using Modbus TCP transport for {}:{}",
        config.ip, config.port
    ));
    Ok(Box::new(transport))
}
