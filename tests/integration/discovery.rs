//! Chain discovery end to end.

use crate::*;

use xwitch_core::chain::UNDISCOVERED;
use xwitch_core::config::LoneRootPolicy;
use xwitch_hw::StatusLed;

#[tokio::test]
async fn three_unit_scan_numbers_every_unit() {
    let chain = chain(3);

    let total = chain.root().dc_broadcast().await.expect("scan should succeed");
    assert_eq!(total, 3);

    for (index, member) in chain.units.iter().enumerate() {
        let state = member.unit.chain().await;
        assert_eq!(state.own_index, index as i16, "unit {index} position");
        assert_eq!(state.total_hubs, 3, "unit {index} chain length");
        assert!(member.led.is_on(), "unit {index} led should be lit");
    }
}

#[tokio::test]
async fn two_unit_scan_finds_the_end() {
    let chain = chain(2);
    let total = chain.root().dc_broadcast().await.expect("scan should succeed");
    assert_eq!(total, 2);
    assert!(chain.units[1].unit.chain().await.is_terminal());
    assert!(!chain.units[0].unit.chain().await.is_terminal());
}

#[tokio::test]
async fn rescan_reaches_the_same_result() {
    let chain = chain(3);
    assert_eq!(chain.root().dc_broadcast().await.unwrap(), 3);
    assert_eq!(chain.root().dc_broadcast().await.unwrap(), 3);
    for (index, member) in chain.units.iter().enumerate() {
        assert_eq!(member.unit.chain().await.own_index, index as i16);
    }
}

#[tokio::test]
async fn lone_root_resolves_within_the_ack_timeout() {
    let chain = chain(1);
    let cfg = test_config();

    let started = std::time::Instant::now();
    let total = chain.root().dc_broadcast().await.expect("scan should succeed");
    let elapsed = started.elapsed();

    assert_eq!(total, 1);
    assert!(
        elapsed >= cfg.timing.end_chain_timeout(),
        "lone root must wait out the ack window, returned after {elapsed:?}"
    );
    assert!(
        elapsed < cfg.timing.broadcast_timeout(),
        "lone root must not wait the whole broadcast window, took {elapsed:?}"
    );

    let state = chain.root().chain().await;
    assert_eq!(state.own_index, 0);
    assert_eq!(state.total_hubs, 1);
}

#[tokio::test]
async fn lone_root_undiscovered_policy_reports_sentinel() {
    let mut cfg = test_config();
    cfg.discovery.lone_root = LoneRootPolicy::Undiscovered;
    let chain = chain_with(1, cfg);

    let total = chain.root().dc_broadcast().await.expect("scan should succeed");
    assert_eq!(total, UNDISCOVERED);
    assert!(!chain.root().chain().await.is_discovered());
}
