//! Register cache for the inverter information bank
//!
//! [`RegisterCache`] owns the most recent complete snapshot of one
//! contiguous register range and rebuilds it with a chunked, retried fetch.
//! The window is only ever replaced wholesale: after a failed update the
//! previous snapshot stays readable (stale, not gone), and before the first
//! successful update every read fails with an addressing error.

use crate::config::PollingConfig;
use crate::error::{Result, SolisError};
use crate::logging::StructuredLogger;
use crate::modbus::SolarmanTransport;
use std::time::Duration;
use tokio::time::sleep;

/// What the update loop does about a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Back off and try again on the existing session
    Retry,
    /// Reconnect the transport, then back off and try again
    Reconnect,
}

impl RecoveryAction {
    /// Recovery table for fetch failures. `None` means the error is not a
    /// fetch-loop concern and aborts the update immediately.
    pub fn for_error(err: &SolisError) -> Option<Self> {
        match err {
            SolisError::Transient { .. } => Some(Self::Retry),
            SolisError::TransportUnavailable { .. } => Some(Self::Reconnect),
            _ => None,
        }
    }
}

/// Decode two consecutive registers (most-significant word first) as a
/// two's-complement signed 32-bit integer.
pub fn s32_from_words(hi: u16, lo: u16) -> i32 {
    (((u32::from(hi)) << 16) | u32::from(lo)) as i32
}

/// Decode packed-ASCII registers: each word holds two characters, high
/// byte first.
pub fn ascii_from_words(words: &[u16]) -> String {
    let mut out = String::with_capacity(words.len() * 2);
    for &word in words {
        out.push(char::from((word >> 8) as u8));
        out.push(char::from((word & 0xFF) as u8));
    }
    out
}

/// Cache of one contiguous range of the device's information registers.
pub struct RegisterCache {
    /// First device address of the range
    start: u16,

    /// One past the last device address
    end: u16,

    /// Max registers per transport read
    chunk_size: u16,

    /// Update attempts before giving up
    attempts: u32,

    /// Linear backoff unit between attempts
    backoff_unit: Duration,

    /// Last complete snapshot, None until the first successful update
    window: Option<Vec<u16>>,

    /// Logger
    logger: StructuredLogger,
}

impl RegisterCache {
    /// Create a cache for the address range `[start, end)`.
    pub fn new(
        start: u16,
        end: u16,
        polling: &PollingConfig,
        logger: StructuredLogger,
    ) -> Result<Self> {
        if end <= start {
            return Err(SolisError::config(format!(
                "empty register range {}..{}",
                start, end
            )));
        }
        if polling.read_chunk_size == 0 {
            return Err(SolisError::config("read chunk size must be greater than 0"));
        }
        if polling.update_attempts == 0 {
            return Err(SolisError::config("update attempts must be greater than 0"));
        }
        Ok(Self {
            start,
            end,
            chunk_size: polling.read_chunk_size,
            attempts: polling.update_attempts,
            backoff_unit: Duration::from_millis(polling.backoff_unit_ms),
            window: None,
            logger,
        })
    }

    /// First device address of the range
    pub fn start(&self) -> u16 {
        self.start
    }

    /// One past the last device address
    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of registers in the range
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Whether at least one update has succeeded
    pub fn has_snapshot(&self) -> bool {
        self.window.is_some()
    }

    /// Refetch the whole range and replace the snapshot.
    ///
    /// Retries transient failures with linear backoff: before attempt `i`
    /// (1-indexed) it sleeps `(i - 1)` backoff units. A transport-unavailable
    /// failure reconnects the transport before the next attempt. Exhaustion
    /// surfaces an update error and leaves the previous snapshot in place.
    pub async fn update(&mut self, transport: &mut dyn SolarmanTransport) -> Result<()> {
        self.logger.debug("Starting update");

        for attempt in 1..=self.attempts {
            if attempt > 1 {
                sleep(self.backoff_unit * (attempt - 1)).await;
            }

            let err = match self.fetch_window(transport).await {
                Ok(window) => {
                    self.window = Some(window);
                    self.logger.debug("Finished update");
                    return Ok(());
                }
                Err(err) => err,
            };

            match RecoveryAction::for_error(&err) {
                Some(RecoveryAction::Retry) => {
                    self.logger
                        .info(&format!("[{}/{}] Error updating: {}", attempt, self.attempts, err));
                }
                Some(RecoveryAction::Reconnect) => {
                    self.logger
                        .info(&format!("[{}/{}] Error updating: {}", attempt, self.attempts, err));
                    if let Err(reconnect_err) = transport.connect().await {
                        self.logger
                            .debug(&format!("Reconnect failed: {}", reconnect_err));
                    }
                }
                None => return Err(err),
            }
        }

        Err(SolisError::update(format!(
            "failed to update registers {}..{} after {} attempts",
            self.start, self.end, self.attempts
        )))
    }

    /// Fetch the full range in address order, bounded by the chunk size.
    async fn fetch_window(&self, transport: &mut dyn SolarmanTransport) -> Result<Vec<u16>> {
        let mut window = Vec::with_capacity(self.len());
        let mut addr = self.start;
        while addr < self.end {
            let count = (self.end - addr).min(self.chunk_size);
            let words = transport.read_input_registers(addr, count).await?;
            if words.len() != usize::from(count) {
                return Err(SolisError::decode(format!(
                    "chunk at {}: expected {} registers, got {}",
                    addr,
                    count,
                    words.len()
                )));
            }
            window.extend_from_slice(&words);
            addr += count;
        }
        Ok(window)
    }

    /// Raw registers: `count` consecutive values starting at device
    /// address `addr`. All typed accessors read through here.
    pub fn get(&self, addr: u16, count: u16) -> Result<&[u16]> {
        let window = self.window.as_ref().ok_or_else(|| {
            SolisError::addressing("no register snapshot yet; update() has never succeeded")
        })?;
        if addr < self.start || u32::from(addr) + u32::from(count) > u32::from(self.end) {
            return Err(SolisError::addressing(format!(
                "read of {} registers at {} is outside {}..{}",
                count, addr, self.start, self.end
            )));
        }
        let offset = usize::from(addr - self.start);
        Ok(&window[offset..offset + usize::from(count)])
    }

    /// One register as an unsigned 16-bit value
    pub fn u16_at(&self, addr: u16) -> Result<u16> {
        Ok(self.get(addr, 1)?[0])
    }

    /// Two registers as a signed 32-bit value, most-significant word first
    pub fn s32_at(&self, addr: u16) -> Result<i32> {
        let words = self.get(addr, 2)?;
        Ok(s32_from_words(words[0], words[1]))
    }

    /// `count` registers as packed ASCII, two characters per word
    pub fn ascii_at(&self, addr: u16, count: u16) -> Result<String> {
        Ok(ascii_from_words(self.get(addr, count)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s32_round_trips_sign() {
        assert_eq!(s32_from_words(0x0000, 0x0001), 1);
        assert_eq!(s32_from_words(0xFFFF, 0xFFFF), -1);
        assert_eq!(s32_from_words(0x8000, 0x0000), i32::MIN);
        assert_eq!(s32_from_words(0x7FFF, 0xFFFF), i32::MAX);
        assert_eq!(s32_from_words(0x0000, 0x01F4), 500);
    }

    #[test]
    fn ascii_emits_high_byte_first() {
        assert_eq!(ascii_from_words(&[0x4142]), "AB");
        assert_eq!(ascii_from_words(&[0x3136, 0x3046]), "160F");
        assert_eq!(ascii_from_words(&[]), "");
    }

    #[test]
    fn recovery_table_covers_the_taxonomy() {
        assert_eq!(
            RecoveryAction::for_error(&SolisError::timeout("t")),
            Some(RecoveryAction::Retry)
        );
        assert_eq!(
            RecoveryAction::for_error(&SolisError::framing("f")),
            Some(RecoveryAction::Retry)
        );
        assert_eq!(
            RecoveryAction::for_error(&SolisError::decode("d")),
            Some(RecoveryAction::Retry)
        );
        assert_eq!(
            RecoveryAction::for_error(&SolisError::connection_reset("r")),
            Some(RecoveryAction::Retry)
        );
        assert_eq!(
            RecoveryAction::for_error(&SolisError::transport_unavailable("s")),
            Some(RecoveryAction::Reconnect)
        );
        assert_eq!(
            RecoveryAction::for_error(&SolisError::addressing("a")),
            None
        );
        assert_eq!(RecoveryAction::for_error(&SolisError::config("c")), None);
    }

    #[test]
    fn rejects_degenerate_configuration() {
        let logger = crate::logging::get_logger("test");
        assert!(RegisterCache::new(100, 100, &PollingConfig::default(), logger.clone()).is_err());
        let mut polling = PollingConfig::default();
        polling.read_chunk_size = 0;
        assert!(RegisterCache::new(0, 10, &polling, logger).is_err());
    }
}
