//! xwitchd — chain unit daemon.

use std::sync::Arc;

use anyhow::{Context, Result};

use xwitch_core::config::UnitConfig;
use xwitch_hw::{SimAdc, SimButton, SimHub, SimLed, SimMux};
use xwitchd::{SerialDevice, Unit, UnitParts};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = UnitConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = UnitConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        UnitConfig::default()
    });

    let mut args = std::env::args().skip(1);
    let mut scan_on_boot = false;
    let mut upstream_path = config.link.upstream_device.clone();
    let mut downstream_path = config.link.downstream_device.clone();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--scan" => scan_on_boot = true,
            "--upstream" => {
                upstream_path = args.next().context("--upstream needs a device path")?;
            }
            "--downstream" => {
                downstream_path = args.next().context("--downstream needs a device path")?;
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    tracing::info!(
        upstream = %upstream_path,
        downstream = %downstream_path,
        baud = config.link.baud,
        "xwitchd starting"
    );

    let upstream = SerialDevice::open(&upstream_path, config.link.baud)
        .context("failed to open upstream serial device")?;
    let downstream = SerialDevice::open(&downstream_path, config.link.baud)
        .context("failed to open downstream serial device")?;

    // Simulated peripheral adapters; hardware bindings implement the
    // same ports.
    let (button, _button_handle) = SimButton::new();
    let unit = Unit::spawn(
        config,
        UnitParts {
            upstream: Box::new(upstream),
            downstream: Box::new(downstream),
            hub: Arc::new(SimHub::new()),
            mux: Arc::new(SimMux::new()),
            led: Arc::new(SimLed::new()),
            adc: Arc::new(SimAdc::new()),
            button: Box::new(button),
        },
    );

    if scan_on_boot {
        let total = unit.dc_broadcast().await.context("chain scan failed")?;
        tracing::info!(total_hubs = total, "boot chain scan complete");
    }

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");
    unit.shutdown();

    Ok(())
}
