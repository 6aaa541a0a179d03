use solis::config::PollingConfig;
use solis::error::{Result, SolisError};
use solis::logging::get_logger;
use solis::modbus::SolarmanTransport;
use solis::registers::RegisterCache;
use std::collections::VecDeque;

/// Scripted transport: fails the next read for every queued error, then
/// serves identity data (register value == its own address).
struct ScriptedTransport {
    failures: VecDeque<SolisError>,
    reads: Vec<(u16, u16)>,
    connects: u32,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            failures: VecDeque::new(),
            reads: Vec::new(),
            connects: 0,
        }
    }

    fn with_failures(mut self, failures: Vec<SolisError>) -> Self {
        self.failures = failures.into();
        self
    }
}

#[async_trait::async_trait]
impl SolarmanTransport for ScriptedTransport {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    async fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        Ok(())
    }

    async fn read_input_registers(&mut self, addr: u16, count: u16) -> Result<Vec<u16>> {
        self.reads.push((addr, count));
        if let Some(err) = self.failures.pop_front() {
            return Err(err);
        }
        Ok((addr..addr + count).collect())
    }

    async fn write_holding_register(&mut self, _addr: u16, _value: u16) -> Result<()> {
        Ok(())
    }
}

fn fast_polling() -> PollingConfig {
    PollingConfig {
        backoff_unit_ms: 0,
        ..Default::default()
    }
}

fn cache(start: u16, end: u16) -> RegisterCache {
    RegisterCache::new(start, end, &fast_polling(), get_logger("test")).unwrap()
}

#[tokio::test]
async fn update_splits_range_into_bounded_chunks() {
    let mut transport = ScriptedTransport::new();
    let mut cache = cache(33000, 33286);

    cache.update(&mut transport).await.unwrap();

    // 286 registers with a 100-register limit: 100 + 100 + 86, in order
    assert_eq!(
        transport.reads,
        vec![(33000, 100), (33100, 100), (33200, 86)]
    );

    // The window is the concatenation of the chunks in address order
    assert_eq!(cache.get(33000, 1).unwrap(), &[33000]);
    assert_eq!(cache.get(33099, 2).unwrap(), &[33099, 33100]);
    assert_eq!(cache.get(33285, 1).unwrap(), &[33285]);
}

#[tokio::test]
async fn get_is_exact_within_bounds() {
    let mut transport = ScriptedTransport::new();
    let mut cache = cache(33000, 33286);
    cache.update(&mut transport).await.unwrap();

    let values = cache.get(33135, 3).unwrap();
    assert_eq!(values, &[33135, 33136, 33137]);
    assert_eq!(cache.get(33000, 286).unwrap().len(), 286);
}

#[tokio::test]
async fn get_rejects_out_of_range_reads() {
    let mut transport = ScriptedTransport::new();
    let mut cache = cache(33000, 33286);
    cache.update(&mut transport).await.unwrap();

    assert!(matches!(
        cache.get(32999, 1),
        Err(SolisError::Addressing { .. })
    ));
    assert!(matches!(
        cache.get(33285, 2),
        Err(SolisError::Addressing { .. })
    ));
    assert!(matches!(
        cache.get(33286, 1),
        Err(SolisError::Addressing { .. })
    ));
}

#[tokio::test]
async fn reads_before_first_update_fail() {
    let cache = cache(33000, 33286);
    assert!(matches!(
        cache.get(33000, 1),
        Err(SolisError::Addressing { .. })
    ));
    assert!(matches!(
        cache.u16_at(33001),
        Err(SolisError::Addressing { .. })
    ));
    assert!(!cache.has_snapshot());
}

#[tokio::test]
async fn update_retries_transient_failures_until_success() {
    // 9 failing attempts, success on the 10th
    let failures: Vec<SolisError> = (0..9).map(|_| SolisError::timeout("no response")).collect();
    let mut transport = ScriptedTransport::new().with_failures(failures);
    let mut cache = cache(33000, 33286);

    cache.update(&mut transport).await.unwrap();
    assert!(cache.has_snapshot());
    assert_eq!(cache.u16_at(33000).unwrap(), 33000);
    // 9 aborted attempts (one read each) plus 3 chunk reads on the last
    assert_eq!(transport.reads.len(), 12);
}

#[tokio::test]
async fn update_exhaustion_keeps_previous_snapshot() {
    let mut transport = ScriptedTransport::new();
    let mut cache = cache(33000, 33286);

    // Seed a good snapshot, then make every following attempt fail
    cache.update(&mut transport).await.unwrap();
    transport.failures = (0..10)
        .map(|_| SolisError::framing("bad frame"))
        .collect::<Vec<_>>()
        .into();

    let err = cache.update(&mut transport).await.unwrap_err();
    assert!(matches!(err, SolisError::Update { .. }));

    // The stale window is still fully readable
    assert!(cache.has_snapshot());
    assert_eq!(cache.get(33100, 2).unwrap(), &[33100, 33101]);
}

#[tokio::test]
async fn transport_unavailable_triggers_reconnect() {
    let failures = vec![
        SolisError::transport_unavailable("socket gone"),
        SolisError::timeout("still warming up"),
    ];
    let mut transport = ScriptedTransport::new().with_failures(failures);
    let mut cache = cache(33000, 33286);

    cache.update(&mut transport).await.unwrap();

    // Exactly the socket-unavailable failure reconnected; the timeout did not
    assert_eq!(transport.connects, 1);
    assert!(cache.has_snapshot());
}

#[tokio::test]
async fn short_chunk_is_a_decode_failure_and_retried() {
    struct ShortReadOnce {
        served_short: bool,
    }

    #[async_trait::async_trait]
    impl SolarmanTransport for ShortReadOnce {
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }
        async fn read_input_registers(&mut self, addr: u16, count: u16) -> Result<Vec<u16>> {
            if !self.served_short {
                self.served_short = true;
                return Ok(vec![0; usize::from(count) - 1]);
            }
            Ok((addr..addr + count).collect())
        }
        async fn write_holding_register(&mut self, _addr: u16, _value: u16) -> Result<()> {
            Ok(())
        }
    }

    let mut transport = ShortReadOnce { served_short: false };
    let mut cache = cache(33000, 33286);
    cache.update(&mut transport).await.unwrap();
    assert_eq!(cache.u16_at(33285).unwrap(), 33285);
}

#[tokio::test]
async fn typed_accessors_decode_through_get() {
    struct FixedBank;

    #[async_trait::async_trait]
    impl SolarmanTransport for FixedBank {
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }
        async fn read_input_registers(&mut self, addr: u16, count: u16) -> Result<Vec<u16>> {
            Ok((addr..addr + count)
                .map(|a| match a {
                    10 => 0x0000,
                    11 => 0x0001,
                    12 => 0xFFFF,
                    13 => 0xFFFF,
                    14 => 0x4142,
                    _ => 0,
                })
                .collect())
        }
        async fn write_holding_register(&mut self, _addr: u16, _value: u16) -> Result<()> {
            Ok(())
        }
    }

    let mut cache = RegisterCache::new(0, 20, &fast_polling(), get_logger("test")).unwrap();
    cache.update(&mut FixedBank).await.unwrap();

    assert_eq!(cache.s32_at(10).unwrap(), 1);
    assert_eq!(cache.s32_at(12).unwrap(), -1);
    assert_eq!(cache.ascii_at(14, 1).unwrap(), "AB");
    assert_eq!(cache.u16_at(14).unwrap(), 0x4142);
}
