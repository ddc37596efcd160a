//! Performance benchmarks for the step function and its hot paths

use speedball_server::client_manager::ClientManager;
use speedball_server::clock::ManualClock;
use speedball_server::config::ServerConfig;
use speedball_server::server::GameServer;
use speedball_server::transport::MemoryTransport;
use speedball_shared::{encode, Packet, PlayerInput};
use std::net::SocketAddr;
use std::time::Instant;

fn playing_server() -> (GameServer<MemoryTransport, ManualClock>, MemoryTransport, ManualClock) {
    let transport = MemoryTransport::new();
    let clock = ManualClock::new();
    // Nobody answers probes here, so keep the silent clients connected
    let config = ServerConfig {
        heartbeat_timeout_intervals: None,
        ..ServerConfig::default()
    };
    let mut server = GameServer::new(transport.clone(), clock.clone(), config).unwrap();

    for port in [40001, 40002] {
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        transport.client_enqueue(addr, encode(&Packet::Join).unwrap());
    }
    server.single_step();
    transport.drain_sent();

    (server, transport, clock)
}

/// Benchmarks full steps of a running match without inputs
#[test]
fn benchmark_idle_steps() {
    let (mut server, transport, clock) = playing_server();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        clock.advance(1.0 / 30.0);
        server.single_step();
        transport.drain_sent();
    }

    let duration = start.elapsed();
    println!(
        "Idle steps: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks steps that decode and dispatch a burst of inputs
#[test]
fn benchmark_input_dispatch() {
    let (mut server, transport, clock) = playing_server();
    let addr: SocketAddr = "127.0.0.1:40001".parse().unwrap();
    let movement = encode(&Packet::Input {
        input: PlayerInput::Movement { x: 0.5, y: 0.5 },
    })
    .unwrap();

    let iterations = 2_000;
    let inputs_per_step = 16;
    let start = Instant::now();

    for _ in 0..iterations {
        for _ in 0..inputs_per_step {
            transport.client_enqueue(addr, movement.clone());
        }
        clock.advance(1.0 / 30.0);
        server.single_step();
        transport.drain_sent();
    }

    let duration = start.elapsed();
    println!(
        "Input dispatch: {} inputs in {:?} ({:.2} μs/input)",
        iterations * inputs_per_step,
        duration,
        duration.as_micros() as f64 / (iterations * inputs_per_step) as f64
    );

    assert_eq!(server.client_malus(addr), Some(0));
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks heartbeat polling for a large session table
#[test]
fn benchmark_heartbeat_polling() {
    let client_count = 1_000;
    let mut clients = ClientManager::new(client_count);
    for i in 0..client_count {
        let addr: SocketAddr = format!("10.0.{}.{}:5000", i / 250, i % 250).parse().unwrap();
        clients.add_client(addr, 0.0);
    }

    let iterations = 1_000;
    let start = Instant::now();

    let mut probes = 0;
    for i in 0..iterations {
        probes += clients.poll_heartbeats(i as f64 * 0.25, 1.0).len();
    }

    let duration = start.elapsed();
    println!(
        "Heartbeat polling: {} polls of {} clients in {:?}",
        iterations, client_count, duration
    );

    // One resend per client every four polls
    assert_eq!(probes, client_count * 249);
    assert!(duration.as_millis() < 2000);
}
