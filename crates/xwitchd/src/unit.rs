//! One chain unit: shared state, background tasks, and the public API.
//!
//! [`Unit::spawn`] wires the peripherals and the two serial endpoints to
//! the receive dispatcher, the control loop, and the button watcher.
//! The handle then exposes the foreground operations: discovery and the
//! addressed hub get/set, plus direct frame sends and peripheral reads.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use xwitch_core::chain::ChainState;
use xwitch_core::config::UnitConfig;
use xwitch_core::wire::{Frame, Message};
use xwitch_hw::{
    AdcError, BusVoltage, ButtonEvents, HubChannels, MuxPosition, MuxSwitch, StatusLed, VbusSensor,
};

use crate::control::ControlLoop;
use crate::dispatch::Dispatcher;
use crate::error::ChainError;
use crate::link::{Direction, FrameAccumulator, LinkError, RawFrame, RawSerial};
use crate::queue::Mailbox;
use crate::switch::{Actuation, ButtonWatcher, SwitchAuthority};
use crate::{discovery, relay};

/// Everything a unit needs plugged in before it can run.
pub struct UnitParts {
    pub upstream: Box<dyn RawSerial>,
    pub downstream: Box<dyn RawSerial>,
    pub hub: Arc<dyn HubChannels>,
    pub mux: Arc<dyn MuxSwitch>,
    pub led: Arc<dyn StatusLed>,
    pub adc: Arc<dyn BusVoltage>,
    pub button: Box<dyn ButtonEvents>,
}

struct Endpoint {
    serial: Box<dyn RawSerial>,
    acc: FrameAccumulator,
}

struct Links {
    up: Endpoint,
    down: Endpoint,
}

impl Links {
    fn endpoint_mut(&mut self, dir: Direction) -> &mut Endpoint {
        match dir {
            Direction::Upstream => &mut self.up,
            Direction::Downstream => &mut self.down,
        }
    }
}

/// State shared by the background tasks and the foreground API.
///
/// Two locks with strict roles: `mailbox` (async) guards the queues and
/// chain state and may be held across waits; `links` (sync) guards the
/// serial endpoints and is only ever held for one read or write, never
/// across an await or while taking `mailbox`.
pub(crate) struct Shared {
    pub cfg: UnitConfig,
    links: StdMutex<Links>,
    pub mailbox: Mutex<Mailbox>,
    pub hub: Arc<dyn HubChannels>,
    pub led: Arc<dyn StatusLed>,
    pub adc: Arc<dyn BusVoltage>,
    pub switch: SwitchAuthority,
}

impl Shared {
    /// Pull one bounded chunk from each serial endpoint and return every
    /// completed frame, tagged with its direction.
    pub fn poll_links(&self) -> Vec<(Direction, RawFrame)> {
        let mut links = self.links.lock().unwrap();
        let chunk = self.cfg.timing.read_chunk;
        let mut buf = vec![0u8; chunk.max(1)];
        let mut out = Vec::new();
        for dir in [Direction::Upstream, Direction::Downstream] {
            let endpoint = links.endpoint_mut(dir);
            match endpoint.serial.poll_read(&mut buf) {
                Ok(0) => {}
                Ok(n) => endpoint.acc.feed(&buf[..n]),
                Err(e) => tracing::debug!(?dir, error = %e, "serial read failed"),
            }
            while let Some(frame) = endpoint.acc.next_frame() {
                out.push((dir, frame));
            }
        }
        out
    }

    /// Write one frame to the given endpoint.
    pub fn send(&self, dir: Direction, frame: Frame) -> Result<(), LinkError> {
        let bytes = frame.to_bytes();
        tracing::trace!(?dir, frame = %hex::encode(bytes), "tx");
        self.links
            .lock()
            .unwrap()
            .endpoint_mut(dir)
            .serial
            .write_frame(&bytes)
    }

    /// Forward raw bytes exactly as received.
    pub fn relay_raw(&self, dir: Direction, raw: &RawFrame) -> Result<(), LinkError> {
        self.links
            .lock()
            .unwrap()
            .endpoint_mut(dir)
            .serial
            .write_frame(raw)
    }
}

/// A running unit. Dropping the handle stops its tasks.
pub struct Unit {
    shared: Arc<Shared>,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Unit {
    /// Bring a unit up: start the dispatcher, control loop, and button
    /// watcher against the given peripherals.
    pub fn spawn(cfg: UnitConfig, parts: UnitParts) -> Self {
        let shared = Arc::new(Shared {
            links: StdMutex::new(Links {
                up: Endpoint {
                    serial: parts.upstream,
                    acc: FrameAccumulator::new(),
                },
                down: Endpoint {
                    serial: parts.downstream,
                    acc: FrameAccumulator::new(),
                },
            }),
            mailbox: Mutex::new(Mailbox::new(&cfg.queues)),
            hub: parts.hub,
            led: parts.led,
            adc: parts.adc,
            switch: SwitchAuthority::new(parts.mux, cfg.queues.audit_capacity),
            cfg,
        });

        let (shutdown, _) = broadcast::channel(1);
        let tasks = vec![
            tokio::spawn(Dispatcher::new(shared.clone(), shutdown.subscribe()).run()),
            tokio::spawn(ControlLoop::new(shared.clone(), shutdown.subscribe()).run()),
            tokio::spawn(
                ButtonWatcher::new(shared.clone(), parts.button, shutdown.subscribe()).run(),
            ),
        ];

        Self {
            shared,
            shutdown,
            tasks,
        }
    }

    /// Scan the chain. Root only — the unit whose upstream is the host.
    pub async fn dc_broadcast(&self) -> Result<i16, ChainError> {
        discovery::dc_broadcast(&self.shared).await
    }

    /// Channel status of the unit at chain position `id`.
    pub async fn get_hub_chain(&self, id: i16) -> Result<Vec<bool>, ChainError> {
        relay::get_hub_chain(&self.shared, id).await
    }

    /// Apply per-unit channel vectors across the chain, tail first.
    pub async fn set_hub_chain(&self, vectors: &[Option<Vec<bool>>]) -> Result<(), ChainError> {
        relay::set_hub_chain(&self.shared, vectors).await
    }

    pub fn send_upstream(&self, msg: Message) -> Result<(), LinkError> {
        self.shared.send(Direction::Upstream, msg.frame())
    }

    pub fn send_downstream(&self, msg: Message) -> Result<(), LinkError> {
        self.shared.send(Direction::Downstream, msg.frame())
    }

    /// Snapshot of this unit's chain knowledge.
    pub async fn chain(&self) -> ChainState {
        self.shared.mailbox.lock().await.chain
    }

    pub fn mux_position(&self) -> MuxPosition {
        self.shared.switch.position()
    }

    /// The switch actuation audit trail, oldest first.
    pub fn switch_audit(&self) -> Vec<Actuation> {
        self.shared.switch.audit()
    }

    pub fn bus_voltage(&self, sensor: VbusSensor) -> Result<f32, AdcError> {
        self.shared.adc.read_volts(sensor)
    }

    /// Stop the background tasks. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

impl Drop for Unit {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        for task in &self.tasks {
            task.abort();
        }
    }
}
