//! Headless bot for exercising a running server by hand.
//!
//! Joins, answers heartbeat probes, logs what the server announces and sends
//! random movement (plus the occasional shot) until the duration runs out,
//! then leaves.

use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};
use rand::Rng;
use speedball_shared::{decode, encode, Packet, PlayerInput};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Seconds to play before leaving
    #[clap(short, long, default_value = "10")]
    duration: u64,
    /// Inputs sent per second
    #[clap(short, long, default_value = "5")]
    rate: u32,
}

async fn send(socket: &UdpSocket, server: SocketAddr, packet: &Packet) -> anyhow::Result<()> {
    let data = encode(packet).context("failed to encode packet")?;
    socket.send_to(&data, server).await?;
    Ok(())
}

fn random_input(rng: &mut impl Rng) -> PlayerInput {
    let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);

    if rng.gen_bool(0.1) {
        PlayerInput::Shot {
            dir_x: angle.cos(),
            dir_y: angle.sin(),
            force: rng.gen_range(5.0..15.0),
        }
    } else {
        PlayerInput::Movement {
            x: angle.cos(),
            y: angle.sin(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    info!("Joining {}", args.server);
    send(&socket, args.server, &Packet::Join).await?;

    let mut rng = rand::thread_rng();
    let mut input_timer = interval(Duration::from_secs_f32(1.0 / args.rate.max(1) as f32));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut playing = false;
    let mut buf = [0u8; 2048];

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = input_timer.tick(), if playing => {
                let input = random_input(&mut rng);
                debug!("Sending {:?}", input);
                send(&socket, args.server, &Packet::Input { input }).await?;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match decode(&buf[..len]) {
                    Ok(Packet::Ping { probe_id }) => {
                        send(&socket, args.server, &Packet::Pong { probe_id }).await?;
                    }
                    Ok(Packet::Welcome { team_id, controlled_player_id }) => {
                        info!("Playing for team {} with player {}", team_id, controlled_player_id);
                        playing = true;
                    }
                    Ok(Packet::Spawn { entity_id, kind, x, y, owned, .. }) => {
                        info!("Spawn {} {:?} at ({:.1}, {:.1}){}", entity_id, kind, x, y,
                              if owned { " [ours]" } else { "" });
                    }
                    Ok(Packet::GameInfo { scores, controlled_players, state }) => {
                        debug!("{:?} scores {:?} controlled {:?}", state, scores, controlled_players);
                    }
                    Ok(other) => debug!("Received {}", other.command_name()),
                    Err(e) => warn!("Failed to decode packet: {}", e),
                }
            }
        }
    }

    send(&socket, args.server, &Packet::Leave).await?;
    info!("Test client finished");
    Ok(())
}
