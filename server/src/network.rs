//! Server network layer: UDP socket tasks and the fixed-rate step loop

use crate::clock::SystemClock;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::level::LevelDescription;
use crate::server::GameServer;
use crate::transport::{ChannelEnds, ChannelTransport, Datagram};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Largest datagram the receiver accepts.
const RECV_BUFFER_SIZE: usize = 2048;
/// Ticks between two statistics log lines.
const STATS_INTERVAL_TICKS: u64 = 60;

/// Binds the socket and drives a [`GameServer`] at the configured tick rate
pub struct Server {
    socket: Arc<UdpSocket>,
    game_server: GameServer<ChannelTransport, SystemClock>,
    ends: ChannelEnds,
    tick_duration: Duration,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: ServerConfig,
        level: &LevelDescription,
    ) -> Result<Self, ServerError> {
        let (transport, ends) = ChannelTransport::new();
        let game_server = GameServer::with_level(transport, SystemClock::new(), config, level)?;
        let tick_duration = Duration::from_secs_f32(game_server.config().update_delta());

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            game_server,
            ends,
            tick_duration,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawns task that forwards every received datagram to the step loop
    fn spawn_network_receiver(socket: Arc<UdpSocket>, inbound_tx: mpsc::UnboundedSender<Datagram>) {
        tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if inbound_tx.send((addr, buffer[..len].to_vec())).is_err() {
                            debug!("Step loop gone, stopping receiver");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that writes the step loop's outgoing datagrams to the socket
    fn spawn_network_sender(
        socket: Arc<UdpSocket>,
        mut outbound_rx: mpsc::UnboundedReceiver<Datagram>,
    ) {
        tokio::spawn(async move {
            while let Some((addr, data)) = outbound_rx.recv().await {
                if let Err(e) = socket.send_to(&data, addr).await {
                    error!("Failed to send datagram to {}: {}", addr, e);
                }
            }
        });
    }

    /// Main server loop, one step per tick. Only returns through cancellation.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            socket,
            mut game_server,
            ends,
            tick_duration,
        } = self;

        Self::spawn_network_receiver(Arc::clone(&socket), ends.inbound_tx);
        Self::spawn_network_sender(Arc::clone(&socket), ends.outbound_rx);

        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started at {}Hz",
            game_server.config().tick_rate
        );

        loop {
            tick_interval.tick().await;
            game_server.single_step();

            if game_server.tick() % STATS_INTERVAL_TICKS == 0 && game_server.client_count() > 0 {
                debug!(
                    "Tick {}: {} clients, match {:?}, scores {:?}",
                    game_server.tick(),
                    game_server.client_count(),
                    game_server.match_state(),
                    game_server.game().scores()
                );
            }
        }
    }
}
