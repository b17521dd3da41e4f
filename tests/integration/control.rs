//! Host-facing control commands and the manual override button.

use crate::*;

use std::time::Duration;

use xwitch_core::wire::{CommandCode, Message, STATUS_ACK, STATUS_ERROR};
use xwitch_hw::{MuxPosition, MuxSwitch};
use xwitchd::ActuationSource;

const REPLY_WINDOW: Duration = Duration::from_millis(500);

#[tokio::test]
async fn host_sets_and_reads_the_switch() {
    let mut chain = chain(1);

    chain.host_send(Message::new(CommandCode::SetSwitch, 1, 0));
    let reply = chain.host_recv(REPLY_WINDOW).await.expect("set reply");
    assert_eq!(reply.command, CommandCode::SetSwitch);
    assert_eq!(reply.arg1, 1);
    assert_eq!(reply.arg2, STATUS_ACK);
    assert_eq!(chain.units[0].mux.position(), MuxPosition::Two);

    chain.host_send(Message::new(CommandCode::GetSwitch, 0, 0));
    let reply = chain.host_recv(REPLY_WINDOW).await.expect("get reply");
    assert_eq!(reply.command, CommandCode::GetSwitch);
    assert_eq!(reply.arg1, 1);
    assert_eq!(reply.arg2, STATUS_ACK);
}

#[tokio::test]
async fn total_hubs_query_tracks_discovery() {
    let mut chain = chain(2);

    chain.host_send(Message::new(CommandCode::GetTotalHubs, 0, 0));
    let reply = chain.host_recv(REPLY_WINDOW).await.expect("pre-scan reply");
    assert_eq!(reply.command, CommandCode::GetTotalHubs);
    assert_eq!(reply.arg2, STATUS_ERROR);

    chain.root().dc_broadcast().await.unwrap();

    chain.host_send(Message::new(CommandCode::GetTotalHubs, 0, 0));
    let reply = chain.host_recv(REPLY_WINDOW).await.expect("post-scan reply");
    assert_eq!(reply.arg1, 2);
    assert_eq!(reply.arg2, STATUS_ACK);
}

#[tokio::test]
async fn button_and_host_share_one_authority() {
    let mut chain = chain(1);

    // Button toggles away from the boot position.
    chain.units[0].button.press();
    settle().await;
    assert_eq!(chain.units[0].mux.position(), MuxPosition::Two);

    // The host writes afterwards, so the host wins.
    chain.host_send(Message::new(CommandCode::SetSwitch, 0, 0));
    chain.host_recv(REPLY_WINDOW).await.expect("set reply");
    assert_eq!(chain.units[0].mux.position(), MuxPosition::One);

    let audit = chain.units[0].unit.switch_audit();
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].source, ActuationSource::Button);
    assert_eq!(audit[0].position, MuxPosition::Two);
    assert_eq!(audit[1].source, ActuationSource::Host);
    assert_eq!(audit[1].position, MuxPosition::One);
}

#[tokio::test]
async fn bus_voltage_reads_through_the_unit() {
    use xwitch_hw::adc::{ADC_DIVIDER_RATIO, ADC_FULL_SCALE, ADC_REF_VOLTS};
    use xwitch_hw::VbusSensor;

    let chain = chain(1);
    let raw = (5.0 * ADC_DIVIDER_RATIO / ADC_REF_VOLTS * ADC_FULL_SCALE) as u16;
    chain.units[0].adc.set_raw(VbusSensor::MuxLegTwo, raw);

    let volts = chain.units[0]
        .unit
        .bus_voltage(VbusSensor::MuxLegTwo)
        .expect("adc read");
    assert!((volts - 5.0).abs() < 0.01, "got {volts}");
    let idle = chain.units[0]
        .unit
        .bus_voltage(VbusSensor::MuxLegOne)
        .expect("adc read");
    assert_eq!(idle, 0.0);
}

#[tokio::test]
async fn rapid_presses_each_land_in_the_audit() {
    let chain = chain(1);

    chain.units[0].button.press();
    chain.units[0].button.press();
    chain.units[0].button.press();
    settle().await;

    // Odd number of toggles from boot position One.
    assert_eq!(chain.units[0].mux.position(), MuxPosition::Two);
    assert_eq!(chain.units[0].unit.switch_audit().len(), 3);
}
