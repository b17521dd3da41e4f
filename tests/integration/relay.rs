//! Addressed hub operations across the chain.

use crate::*;

use std::time::Duration;

use xwitch_core::wire::{encode, CommandCode};
use xwitch_hw::HubChannels;
use xwitchd::ChainError;

#[tokio::test]
async fn root_answers_for_itself_before_any_scan() {
    let mut chain = chain(1);

    let status = chain.root().get_hub_chain(0).await.expect("local status");
    assert_eq!(status, vec![true, true, true, true]);

    // Straight off the hub IC: nothing may have left on the wire.
    settle().await;
    assert!(chain.tail_bytes().is_empty(), "local read must not touch the link");
}

#[tokio::test]
async fn remote_status_is_fetched_hop_by_hop() {
    let chain = chain(3);
    chain.root().dc_broadcast().await.unwrap();

    chain.units[2].hub.set_hub_channels(0b1010).unwrap();
    let status = chain.root().get_hub_chain(2).await.expect("remote status");
    // Terminal unit: all four channels visible.
    assert_eq!(status, vec![false, true, false, true]);

    // Mid-chain unit: the reserved channel is hidden.
    let status = chain.root().get_hub_chain(1).await.expect("remote status");
    assert_eq!(status, vec![true, true, true]);
}

#[tokio::test]
async fn out_of_range_index_fails_before_any_io() {
    let mut chain = chain(3);
    chain.root().dc_broadcast().await.unwrap();
    settle().await;
    chain.drain_tail();

    let err = chain.root().get_hub_chain(3).await.unwrap_err();
    assert!(matches!(err, ChainError::Configuration(_)), "got {err:?}");
    let err = chain.root().get_hub_chain(-2).await.unwrap_err();
    assert!(matches!(err, ChainError::Configuration(_)), "got {err:?}");

    settle().await;
    assert!(chain.tail_bytes().is_empty(), "no frame may be sent for a bad index");
}

#[tokio::test]
async fn undiscovered_chain_rejects_remote_indices() {
    let chain = chain(2);
    let err = chain.root().get_hub_chain(1).await.unwrap_err();
    assert!(matches!(err, ChainError::Configuration(_)), "got {err:?}");
}

#[tokio::test]
async fn set_hub_chain_applies_tail_first_and_keeps_the_chain_alive() {
    let chain = chain(3);
    chain.root().dc_broadcast().await.unwrap();
    chain.journal.lock().unwrap().clear();

    chain
        .root()
        .set_hub_chain(&[
            None,
            Some(vec![true, false, false]),
            Some(vec![false, true, false, true]),
        ])
        .await
        .expect("chain-wide update");

    // Tail before mid, root untouched; the mid unit keeps its reserved
    // channel on top of the requested three bits.
    assert_eq!(
        *chain.journal.lock().unwrap(),
        vec![(2, 0b1010), (1, 0b1001)]
    );

    // Unit 0 was skipped and its reserved channel is still enabled.
    let root_mask = chain.units[0].hub.get_hub_channels().unwrap();
    assert_ne!(root_mask & 0b1000, 0, "root reserved channel must stay up");

    // The applied state reads back with the reserved channel hidden.
    let status = chain.root().get_hub_chain(1).await.unwrap();
    assert_eq!(status, vec![true, false, false]);
}

#[tokio::test]
async fn root_vector_gets_the_reserved_channel_forced_on() {
    let chain = chain(2);
    chain.root().dc_broadcast().await.unwrap();

    chain
        .root()
        .set_hub_chain(&[Some(vec![true, false, false]), None])
        .await
        .expect("root update");

    let mask = chain.units[0].hub.get_hub_channels().unwrap();
    assert_eq!(mask, 0b1001, "requested bits plus the reserved channel");
}

#[tokio::test]
async fn oversized_vector_for_a_mid_chain_unit_fails_before_any_io() {
    let chain = chain(3);
    chain.root().dc_broadcast().await.unwrap();
    chain.journal.lock().unwrap().clear();

    let err = chain
        .root()
        .set_hub_chain(&[None, Some(vec![true, true, true, true]), None])
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Configuration(_)), "got {err:?}");
    assert!(chain.journal.lock().unwrap().is_empty(), "nothing may be applied");
}

#[tokio::test]
async fn more_vectors_than_units_fails() {
    let chain = chain(2);
    chain.root().dc_broadcast().await.unwrap();

    let err = chain
        .root()
        .set_hub_chain(&[None, None, Some(vec![true])])
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Configuration(_)), "got {err:?}");
}

#[tokio::test]
async fn direct_sends_hit_the_right_endpoints() {
    let mut chain = chain(1);

    let msg = xwitch_core::wire::Message::new(CommandCode::SetHub, 3, 0b0110);
    chain.root().send_downstream(msg).unwrap();
    settle().await;
    assert_eq!(chain.tail_bytes(), msg.frame().to_bytes());
}

#[tokio::test]
async fn unaddressed_requests_relay_bit_for_bit() {
    let mut chain = chain(1);

    // Addressed to a unit this chain does not have: the root passes it
    // on untouched.
    let msg = xwitch_core::wire::Message::new(CommandCode::GetHub, 5, 0);
    let frame = encode(CommandCode::GetHub, 5, 0).to_bytes();
    chain.host_send(msg);

    let mut relayed = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_millis(500);
    while relayed.len() < frame.len() && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
        relayed.extend(chain.tail_bytes());
    }
    assert_eq!(relayed, frame, "relay must be byte-identical");
}
