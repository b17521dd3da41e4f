//! Peer failures: silent units, unconfigured hub ICs, dead links.

use crate::*;

use std::time::Duration;

use xwitch_core::wire::{encode, CommandCode, Message};
use xwitchd::{ChainError, LinkError};

#[tokio::test]
async fn silent_unit_times_out_a_get() {
    let mut chain = chain(2);
    chain.root().dc_broadcast().await.unwrap();

    // Kill unit 1. Its links stay plugged in, it just stops answering.
    chain.units.remove(1);

    let err = chain.root().get_hub_chain(1).await.unwrap_err();
    assert!(
        matches!(err, ChainError::Timeout { index: 1, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn silent_unit_fails_a_chain_update() {
    let mut chain = chain(2);
    chain.root().dc_broadcast().await.unwrap();
    chain.units.remove(1);

    let err = chain
        .root()
        .set_hub_chain(&[None, Some(vec![true, false, false, false])])
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Failure { index: 1 }), "got {err:?}");
}

#[tokio::test]
async fn unconfigured_peer_hub_reports_not_ready() {
    let chain = chain(2);
    chain.root().dc_broadcast().await.unwrap();

    chain.units[1].hub.power_cycle();

    let err = chain.root().get_hub_chain(1).await.unwrap_err();
    assert!(
        matches!(err, ChainError::HubNotReady { index: 1 }),
        "got {err:?}"
    );

    let err = chain
        .root()
        .set_hub_chain(&[None, Some(vec![true, false, false, false])])
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Failure { index: 1 }), "got {err:?}");
}

#[tokio::test]
async fn dead_upstream_link_surfaces_as_link_error() {
    let chain = chain(1);
    chain.host.disconnect();

    let err = chain
        .root()
        .send_upstream(Message::new(CommandCode::GetSwitch, 0, 0))
        .unwrap_err();
    assert!(matches!(err, LinkError::Write(_)), "got {err:?}");
}

#[tokio::test]
async fn line_noise_does_not_wedge_the_chain() {
    let mut chain = chain(1);

    // Garbage, a frame with a corrupted checksum, then a valid request.
    chain.host.inject(&[0x00, 0x13, 0x37, 0xFF]);
    let mut corrupted = encode(CommandCode::GetSwitch, 0, 0).to_bytes();
    corrupted[5] ^= 0x07;
    chain.host.inject(&corrupted);

    chain.host_send(Message::new(CommandCode::GetSwitch, 0, 0));

    let reply = chain
        .host_recv(Duration::from_millis(500))
        .await
        .expect("unit must still answer after noise");
    assert_eq!(reply.command, CommandCode::GetSwitch);
}
