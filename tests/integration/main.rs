//! xwitch integration test harness.
//!
//! Tests run whole chains of units in-process, wired together with
//! crossed in-memory serial pairs. The harness keeps hold of the far
//! ends the hardware would own: the host side of the root's upstream
//! link and the dangling connector past the terminal unit, so tests can
//! inject host traffic and observe exactly what leaves the chain.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use xwitch_core::config::UnitConfig;
use xwitch_core::wire::{decode, Message};
use xwitchd::link::FrameAccumulator;
use xwitchd::{mem_pair, MemSerial, RawSerial, Unit, UnitParts};

use xwitch_hw::{MaskJournal, SimAdc, SimButton, SimButtonHandle, SimHub, SimLed, SimMux};

mod control;
mod discovery;
mod failures;
mod relay;

// ── Harness ──────────────────────────────────────────────────────────────────

/// Timings scaled down so a scan's end-of-chain wait costs tens of
/// milliseconds instead of a full second. Ratios match production.
pub fn test_config() -> UnitConfig {
    let mut cfg = UnitConfig::default();
    cfg.timing.poll_interval_ms = 2;
    cfg.timing.end_chain_timeout_ms = 150;
    cfg.timing.broadcast_timeout_ms = 800;
    cfg
}

/// One spawned unit plus the simulated peripherals the test can poke.
pub struct TestUnit {
    pub unit: Unit,
    pub hub: Arc<SimHub>,
    pub mux: Arc<SimMux>,
    pub led: Arc<SimLed>,
    pub adc: Arc<SimAdc>,
    pub button: SimButtonHandle,
}

pub struct TestChain {
    pub units: Vec<TestUnit>,
    /// Host side of the root's upstream link.
    pub host: MemSerial,
    /// Unplugged connector past the terminal unit's downstream link.
    pub tail: MemSerial,
    /// Cross-unit record of applied hub masks, in application order.
    pub journal: MaskJournal,
    host_acc: FrameAccumulator,
}

/// Wire up `n` units with the default test config.
pub fn chain(n: usize) -> TestChain {
    chain_with(n, test_config())
}

pub fn chain_with(n: usize, cfg: UnitConfig) -> TestChain {
    assert!(n >= 1, "a chain needs at least a root");
    let journal: MaskJournal = Arc::new(Mutex::new(Vec::new()));
    let (host, mut upstream) = mem_pair();
    let mut units = Vec::new();
    let mut tail = host.clone();
    for index in 0..n {
        let (downstream, next_upstream) = mem_pair();
        let hub = Arc::new(SimHub::with_journal(index, journal.clone()));
        let mux = Arc::new(SimMux::new());
        let led = Arc::new(SimLed::new());
        let adc = Arc::new(SimAdc::new());
        let (button, button_handle) = SimButton::new();
        let unit = Unit::spawn(
            cfg.clone(),
            UnitParts {
                upstream: Box::new(upstream),
                downstream: Box::new(downstream),
                hub: hub.clone(),
                mux: mux.clone(),
                led: led.clone(),
                adc: adc.clone(),
                button: Box::new(button),
            },
        );
        units.push(TestUnit {
            unit,
            hub,
            mux,
            led,
            adc,
            button: button_handle,
        });
        tail = next_upstream.clone();
        upstream = next_upstream;
    }
    TestChain {
        units,
        host,
        tail,
        journal,
        host_acc: FrameAccumulator::new(),
    }
}

impl TestChain {
    pub fn root(&self) -> &Unit {
        &self.units[0].unit
    }

    /// Write one frame into the root's upstream link, as the host would.
    pub fn host_send(&mut self, msg: Message) {
        self.host
            .write_frame(&msg.frame().to_bytes())
            .expect("host link should accept writes");
    }

    /// Poll the host side of the root's upstream link for the next
    /// decoded frame.
    pub async fn host_recv(&mut self, within: Duration) -> Option<Message> {
        let deadline = Instant::now() + within;
        let mut buf = [0u8; 64];
        loop {
            let n = self.host.poll_read(&mut buf).expect("host link read");
            if n > 0 {
                self.host_acc.feed(&buf[..n]);
            }
            while let Some(raw) = self.host_acc.next_frame() {
                if let Ok(msg) = decode(&raw) {
                    return Some(msg);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Throw away everything buffered on the tail connector.
    pub fn drain_tail(&mut self) {
        let mut buf = [0u8; 64];
        while self.tail.poll_read(&mut buf).expect("tail link read") > 0 {}
    }

    /// Bytes sitting on the tail connector right now.
    pub fn tail_bytes(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = self.tail.poll_read(&mut buf).expect("tail link read");
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

/// Let the background tasks make a few rounds.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
