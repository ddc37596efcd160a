//! Tick orchestration for the authoritative server
//!
//! [`GameServer::single_step`] is the only entry point that mutates match or
//! session state. One call runs a complete fixed-size step:
//! 1. Finish a position reset requested by a goal in the previous step
//! 2. Drain and dispatch every buffered datagram in receipt order
//! 3. Step physics, resolve contacts and update dynamic entities
//! 4. Broadcast the snapshot, then per-entity updates while in play
//! 5. Advance heartbeats and apply the timeout policy
//!
//! Time comes from the injected [`Clock`] and datagrams from the injected
//! [`Transport`], so a step never blocks and is fully reproducible in tests.

use crate::client_manager::ClientManager;
use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::entity::EntityId;
use crate::error::ServerError;
use crate::game::Match;
use crate::level::LevelDescription;
use crate::transport::Transport;
use log::{debug, error, info, warn};
use speedball_shared::{decode, encode, MatchState, Packet, UNKNOWN_RTT};
use std::net::SocketAddr;

pub struct GameServer<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    config: ServerConfig,
    clients: ClientManager,
    game: Match,
    tick: u64,
}

impl<T: Transport, C: Clock> GameServer<T, C> {
    /// Server hosting a match on the built-in testing level.
    pub fn new(transport: T, clock: C, config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_level(transport, clock, config, &LevelDescription::testing())
    }

    pub fn with_level(
        transport: T,
        clock: C,
        config: ServerConfig,
        level: &LevelDescription,
    ) -> Result<Self, ServerError> {
        config.validate(level)?;
        let game = Match::new(level)?;
        Ok(Self::from_parts(transport, clock, config, game))
    }

    /// Wraps an already built match, e.g. one with a custom physics engine.
    pub fn from_parts(transport: T, clock: C, config: ServerConfig, mut game: Match) -> Self {
        game.set_score_limit(config.score_limit);

        Self {
            transport,
            clock,
            clients: ClientManager::new(config.max_players),
            config,
            game,
            tick: 0,
        }
    }

    pub fn single_step(&mut self) {
        let now = self.clock.now();

        self.game.finish_pending_reset();

        while let Some((addr, data)) = self.transport.receive() {
            match decode(&data) {
                Ok(packet) => self.handle_packet(addr, packet, now),
                Err(e) => debug!("Dropping undecodable datagram from {}: {}", addr, e),
            }
        }

        self.game.update(self.config.update_delta());

        let snapshot = self.game.game_info_packet();
        self.broadcast(&snapshot);
        if self.game.state().is_in_play() {
            for packet in self.game.entity_update_packets() {
                self.broadcast(&packet);
            }
        }

        for (addr, probe_id) in self
            .clients
            .poll_heartbeats(now, self.config.heartbeat_interval)
        {
            self.send(addr, &Packet::Ping { probe_id });
        }

        if let Some(max_missed) = self.config.heartbeat_timeout_intervals {
            for addr in self.clients.stale_clients(max_missed) {
                warn!(
                    "Client {} missed {} heartbeats, disconnecting",
                    addr, max_missed
                );
                self.remove_client(addr);
            }
        }

        self.tick += 1;
    }

    fn handle_packet(&mut self, addr: SocketAddr, packet: Packet, now: f64) {
        if let Packet::Join = packet {
            self.handle_join(addr, now);
            return;
        }

        let Some(client) = self.clients.get_mut(addr) else {
            debug!(
                "Ignoring {} from unknown address {}",
                packet.command_name(),
                addr
            );
            return;
        };

        match packet {
            Packet::Leave => {
                info!("Client {} left", addr);
                self.remove_client(addr);
            }
            Packet::Ping { probe_id } => self.send(addr, &Packet::Pong { probe_id }),
            Packet::Pong { probe_id } => {
                self.clients.acknowledge(addr, probe_id, now);
            }
            Packet::Input { input } => self.game.apply_input(client, input),
            Packet::ClientUpdate { entity_id, x, y } => {
                self.game.client_update(client, entity_id, x, y)
            }
            other => debug!(
                "Ignoring server-only packet {} from {}",
                other.command_name(),
                addr
            ),
        }
    }

    fn handle_join(&mut self, addr: SocketAddr, now: f64) {
        if self.clients.contains(addr) {
            debug!("Client {} already joined", addr);
            return;
        }
        if self.game.state() != MatchState::WaitingForPlayers {
            warn!("Rejecting join from {}: match is {:?}", addr, self.game.state());
            return;
        }
        if self.game.roster().is_full() {
            warn!("Rejecting join from {}: roster is full", addr);
            return;
        }

        let Some(probe_id) = self.clients.add_client(addr, now) else {
            warn!("Rejecting join from {}: server is full", addr);
            return;
        };
        self.send(addr, &Packet::Ping { probe_id });

        if let Err(e) = self.game.add_client(addr, now) {
            error!("Failed to place client {}: {}", addr, e);
            self.clients.remove_client(addr);
            return;
        }

        if self.game.state() == MatchState::Playing {
            self.announce_match();
        }
    }

    /// Welcome and the full entity list for every client, sent once when play starts.
    fn announce_match(&mut self) {
        info!("Match started with {} clients", self.clients.len());

        for addr in self.clients.addrs() {
            if let Some(welcome) = self.game.welcome_packet(addr) {
                self.send(addr, &welcome);
            }
            for spawn in self.game.spawn_packets(addr) {
                self.send(addr, &spawn);
            }
        }
    }

    fn remove_client(&mut self, addr: SocketAddr) {
        self.clients.remove_client(addr);
        self.game.remove_player(addr);
    }

    fn send(&mut self, addr: SocketAddr, packet: &Packet) {
        match encode(packet) {
            Ok(data) => {
                if let Err(e) = self.transport.send(addr, data) {
                    error!("Failed to send {} to {}: {}", packet.command_name(), addr, e);
                }
            }
            Err(e) => error!("Failed to encode {}: {}", packet.command_name(), e),
        }
    }

    fn broadcast(&mut self, packet: &Packet) {
        let data = match encode(packet) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode {}: {}", packet.command_name(), e);
                return;
            }
        };

        for addr in self.clients.addrs() {
            if let Err(e) = self.transport.send(addr, data.clone()) {
                error!("Failed to send {} to {}: {}", packet.command_name(), addr, e);
            }
        }
    }

    /// Last RTT sample of `addr`, [`UNKNOWN_RTT`] if unknown or never measured.
    pub fn client_last_ping(&self, addr: SocketAddr) -> f64 {
        self.clients.last_rtt(addr).unwrap_or(UNKNOWN_RTT)
    }

    pub fn client_ping_average(&self, addr: SocketAddr) -> f64 {
        self.clients.mean_rtt(addr).unwrap_or(UNKNOWN_RTT)
    }

    /// Cheat-score of a connected client.
    pub fn client_malus(&self, addr: SocketAddr) -> Option<u32> {
        self.clients.malus(addr)
    }

    pub fn controlled_player_id(&self, addr: SocketAddr) -> EntityId {
        self.game.controlled_player_id(addr)
    }

    pub fn match_state(&self) -> MatchState {
        self.game.state()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn game(&self) -> &Match {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Match {
        &mut self.game
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entity::World;
    use crate::physics::{Contact, Physics};
    use crate::transport::MemoryTransport;
    use assert_approx_eq::assert_approx_eq;
    use speedball_shared::PlayerInput;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn test_addr() -> SocketAddr {
        "192.168.1.1:5001".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "192.168.1.2:5002".parse().unwrap()
    }

    /// Physics stub logging every call it receives.
    #[derive(Clone, Default)]
    struct RecordingPhysics {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Physics for RecordingPhysics {
        fn add_body(&mut self, id: EntityId) {
            self.calls.borrow_mut().push(format!("add {}", id));
        }

        fn step(&mut self, _world: &mut World, dt: f32) {
            self.calls.borrow_mut().push(format!("step {:.4}", dt));
        }

        fn resolve_collisions(&mut self, _world: &mut World) -> Vec<Contact> {
            self.calls.borrow_mut().push("resolve".to_string());
            Vec::new()
        }
    }

    fn server() -> (GameServer<MemoryTransport, ManualClock>, MemoryTransport, ManualClock) {
        let transport = MemoryTransport::new();
        let clock = ManualClock::new();
        let server =
            GameServer::new(transport.clone(), clock.clone(), ServerConfig::default()).unwrap();
        (server, transport, clock)
    }

    fn send(transport: &MemoryTransport, from: SocketAddr, packet: Packet) {
        transport.client_enqueue(from, encode(&packet).unwrap());
    }

    fn sent_to(transport: &MemoryTransport, addr: SocketAddr) -> Vec<Packet> {
        transport
            .drain_sent()
            .into_iter()
            .filter(|(to, _)| *to == addr)
            .map(|(_, data)| decode(&data).unwrap())
            .collect()
    }

    fn start_match(
        server: &mut GameServer<MemoryTransport, ManualClock>,
        transport: &MemoryTransport,
    ) {
        send(transport, test_addr(), Packet::Join);
        send(transport, test_addr2(), Packet::Join);
        server.single_step();
        transport.drain_sent();
    }

    #[test]
    fn test_physics_runs_once_per_step_with_fixed_delta() {
        let physics = RecordingPhysics::default();
        let calls = Rc::clone(&physics.calls);
        let level = LevelDescription::testing();
        let game = Match::with_physics(&level, Box::new(physics)).unwrap();
        let mut server = GameServer::from_parts(
            MemoryTransport::new(),
            ManualClock::new(),
            ServerConfig::default(),
            game,
        );

        let adds = calls.borrow().len();
        assert_eq!(adds, level.entity_count());

        server.single_step();
        server.single_step();

        let steps: Vec<String> = calls.borrow()[adds..].to_vec();
        assert_eq!(steps, vec!["step 0.0333", "resolve", "step 0.0333", "resolve"]);
        assert_eq!(server.tick(), 2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ServerConfig {
            max_players: 4,
            ..ServerConfig::default()
        };

        let result = GameServer::new(MemoryTransport::new(), ManualClock::new(), config);
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_snapshot_reaches_every_client() {
        let (mut server, transport, _) = server();
        send(&transport, test_addr(), Packet::Join);
        server.single_step();
        transport.drain_sent();

        server.single_step();

        let packets = sent_to(&transport, test_addr());
        assert_eq!(
            packets,
            vec![Packet::GameInfo {
                scores: vec![0, 0],
                controlled_players: vec![2, 0],
                state: MatchState::WaitingForPlayers,
            }]
        );
    }

    #[test]
    fn test_entity_updates_follow_snapshot_in_play() {
        let (mut server, transport, _) = server();
        start_match(&mut server, &transport);

        server.single_step();

        let packets = sent_to(&transport, test_addr2());
        assert!(matches!(packets[0], Packet::GameInfo { .. }));
        let ids: Vec<u32> = packets[1..]
            .iter()
            .map(|p| match p {
                Packet::EntityUpdate { entity_id, .. } => *entity_id,
                other => panic!("Unexpected packet {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_join_is_rejected_once_roster_is_full() {
        let (mut server, transport, _) = server();
        start_match(&mut server, &transport);
        let late: SocketAddr = "192.168.1.3:5003".parse().unwrap();

        send(&transport, late, Packet::Join);
        server.single_step();

        assert_eq!(server.client_count(), 2);
        assert!(sent_to(&transport, late).is_empty());
    }

    #[test]
    fn test_repeated_join_is_ignored() {
        let (mut server, transport, _) = server();
        send(&transport, test_addr(), Packet::Join);
        send(&transport, test_addr(), Packet::Join);

        server.single_step();

        let pings = sent_to(&transport, test_addr())
            .into_iter()
            .filter(|p| matches!(p, Packet::Ping { .. }))
            .count();
        assert_eq!(pings, 1);
        assert_eq!(server.match_state(), MatchState::WaitingForPlayers);
    }

    #[test]
    fn test_client_ping_is_echoed() {
        let (mut server, transport, _) = server();
        send(&transport, test_addr(), Packet::Join);
        server.single_step();
        transport.drain_sent();

        send(&transport, test_addr(), Packet::Ping { probe_id: 77 });
        server.single_step();

        let packets = sent_to(&transport, test_addr());
        assert_eq!(packets[0], Packet::Pong { probe_id: 77 });
    }

    #[test]
    fn test_pong_updates_rtt() {
        let (mut server, transport, clock) = server();
        send(&transport, test_addr(), Packet::Join);
        server.single_step();
        assert_eq!(server.client_last_ping(test_addr()), UNKNOWN_RTT);

        clock.advance(0.25);
        send(&transport, test_addr(), Packet::Pong { probe_id: 1 });
        server.single_step();

        assert_approx_eq!(server.client_last_ping(test_addr()), 0.25);
        assert_approx_eq!(server.client_ping_average(test_addr()), 0.25);
    }

    #[test]
    fn test_leave_ends_match_in_play() {
        let (mut server, transport, _) = server();
        start_match(&mut server, &transport);

        send(&transport, test_addr(), Packet::Leave);
        server.single_step();

        assert_eq!(server.match_state(), MatchState::Ended);
        assert_eq!(server.client_count(), 1);
        assert_eq!(server.controlled_player_id(test_addr()), 0);
        assert!(sent_to(&transport, test_addr()).is_empty());
    }

    #[test]
    fn test_inputs_are_applied_in_receipt_order() {
        let (mut server, transport, _) = server();
        start_match(&mut server, &transport);

        send(
            &transport,
            test_addr(),
            Packet::Input {
                input: PlayerInput::Movement { x: 1.0, y: 0.0 },
            },
        );
        send(
            &transport,
            test_addr(),
            Packet::Input {
                input: PlayerInput::SelectPlayer { target: 3 },
            },
        );
        send(
            &transport,
            test_addr(),
            Packet::Input {
                input: PlayerInput::Movement { x: 0.0, y: -1.0 },
            },
        );
        server.single_step();

        let world = server.game().world();
        assert_eq!(server.controlled_player_id(test_addr()), 3);
        // Player 2 was stopped when control moved away from it
        assert_eq!(world.get(2).unwrap().body.velocity.x, 0.0);
        assert_eq!(world.get(3).unwrap().body.velocity.y, -5.0);
        assert_eq!(server.client_malus(test_addr()), Some(0));
    }

    #[test]
    fn test_input_before_match_is_penalized() {
        let (mut server, transport, _) = server();
        send(&transport, test_addr(), Packet::Join);
        send(
            &transport,
            test_addr(),
            Packet::Input {
                input: PlayerInput::Tackle,
            },
        );

        server.single_step();

        assert_eq!(server.client_malus(test_addr()), Some(1));
    }

    #[test]
    fn test_strangers_and_garbage_are_dropped() {
        let (mut server, transport, _) = server();
        start_match(&mut server, &transport);
        let stranger: SocketAddr = "10.0.0.9:9999".parse().unwrap();

        send(
            &transport,
            stranger,
            Packet::Input {
                input: PlayerInput::SelectPlayer { target: 1 },
            },
        );
        transport.client_enqueue(test_addr(), vec![0xFF, 0xFF, 0xFF]);
        send(
            &transport,
            test_addr(),
            Packet::GameInfo {
                scores: vec![9, 9],
                controlled_players: vec![0, 0],
                state: MatchState::Ended,
            },
        );
        server.single_step();

        assert_eq!(server.client_malus(stranger), None);
        assert_eq!(server.client_malus(test_addr()), Some(0));
        assert_eq!(server.match_state(), MatchState::Playing);
        assert!(sent_to(&transport, stranger).is_empty());
    }

    #[test]
    fn test_forged_client_update_is_severe() {
        let (mut server, transport, _) = server();
        start_match(&mut server, &transport);

        send(
            &transport,
            test_addr2(),
            Packet::ClientUpdate {
                entity_id: 2,
                x: 0.0,
                y: 0.0,
            },
        );
        server.single_step();

        assert_eq!(server.client_malus(test_addr2()), Some(10));
    }

    #[test]
    fn test_silent_client_times_out() {
        let transport = MemoryTransport::new();
        let clock = ManualClock::new();
        let config = ServerConfig {
            heartbeat_timeout_intervals: Some(2),
            ..ServerConfig::default()
        };
        let mut server = GameServer::new(transport.clone(), clock.clone(), config).unwrap();

        send(&transport, test_addr(), Packet::Join);
        server.single_step();

        clock.advance(1.0);
        server.single_step();
        assert_eq!(server.client_count(), 1);

        clock.advance(1.0);
        server.single_step();
        assert_eq!(server.client_count(), 0);
        assert!(server.game().roster().is_empty());
    }

    #[test]
    fn test_goal_reset_happens_on_next_step() {
        let (mut server, transport, _) = server();
        start_match(&mut server, &transport);
        server.game_mut().award_goal(1);
        assert_eq!(server.match_state(), MatchState::ResettingPlayersPositions);

        server.single_step();

        assert_eq!(server.match_state(), MatchState::Playing);
        let packets = sent_to(&transport, test_addr());
        assert_eq!(
            packets[0],
            Packet::GameInfo {
                scores: vec![0, 1],
                controlled_players: vec![2, 4],
                state: MatchState::Playing,
            }
        );
    }
}
