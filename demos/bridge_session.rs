//! Bridge session example
//!
//! Walks a bridge through a gateway appearing, sensors reporting, a failed
//! delivery and the gateway going silent.
//!
//! Run with: `cargo run --example bridge_session`

use rfbridge::{
    Bridge, BridgeConfig, ConfigStorage, ConfirmOutcome, GatewayMessage, MemoryConfigStore,
    MemoryMesh, MemoryRadio, NodeAddress, SensorFrame, SensorType, SentUnicast,
};

const GATEWAY: NodeAddress = NodeAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

fn print_sent(at_ms: u64, sent: &[SentUnicast]) {
    for s in sent {
        let Some(frame) = s.frame() else { continue };
        println!(
            "{:>7} ms  #{:<4} {:<10} {:?}",
            at_ms,
            s.id,
            frame.kind.to_string(),
            String::from_utf8_lossy(&frame.message)
        );
    }
}

fn main() {
    println!("=== rfbridge Session Example ===\n");

    let mut bridge = match Bridge::new(
        BridgeConfig::default(),
        ConfigStorage::new(MemoryConfigStore::new()),
        MemoryMesh::default(),
        MemoryRadio::new(),
        0,
    ) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("failed to start: {}", e);
            return;
        }
    };
    println!("Device: {}", bridge.device_config().device_name);
    println!("{}", "-".repeat(72));

    let online = GatewayMessage::KeepAlive {
        upstream_online: true,
    }
    .encode()
    .unwrap_or_default();

    // Gateway shows up with its upstream online: full resync
    bridge.on_broadcast(GATEWAY, &online, 1_000);
    let sent = bridge.transport_mut().take_sent();
    print_sent(1_000, &sent);
    for s in &sent {
        bridge.on_delivery_confirm(GATEWAY, s.id, true);
    }

    // Two sensors report
    bridge
        .radio_mut()
        .push_frame(SensorFrame::new(SensorType::Bme280, 17, [312, 45, 21, 748, 0]));
    bridge
        .radio_mut()
        .push_frame(SensorFrame::new(SensorType::OpenClose, 42, [287, 1, 0, 0, 0]));
    bridge.poll(2_000);
    bridge.poll(2_001);
    let sent = bridge.transport_mut().take_sent();
    print_sent(2_000, &sent);

    // The last record fails once, then goes through
    if let Some(last) = sent.last() {
        if let ConfirmOutcome::Resent { new_id } =
            bridge.on_delivery_confirm(GATEWAY, last.id, false)
        {
            println!("          #{} failed, resent as #{}", last.id, new_id);
            bridge.on_delivery_confirm(GATEWAY, new_id, true);
        }
    }
    println!("In flight: {}", bridge.queue().len());

    // Silence: the gateway is dropped after the timeout
    for t in (3_000..=20_000).step_by(1_000) {
        bridge.poll(t);
    }
    println!("{}", "-".repeat(72));
    println!(
        "Reachable: {}  in flight: {}  known sensors: {}",
        bridge.link().reachable,
        bridge.queue().len(),
        bridge.registry().len()
    );

    let stats = bridge.queue().stats();
    println!(
        "Sent: {}  retried: {}  confirmed: {}",
        stats.sent, stats.retried, stats.confirmed
    );
}
