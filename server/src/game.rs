//! The match: state machine, roster, world and scoring.

use crate::entity::{EntityId, EntityKind, World};
use crate::error::{LevelError, MatchError};
use crate::level::LevelDescription;
use crate::physics::{ArcadePhysics, Contact, Physics, RigidBody};
use crate::roster::{Assignment, Roster, TeamId};
use log::{debug, info};
use speedball_shared::{MatchState, Packet};
use std::net::SocketAddr;

/// Decides who scores when the free ball touches a net.
pub trait ScoringPolicy {
    /// `net_team` owns the net that was hit. Returns the scoring team, if any.
    fn on_ball_in_net(&mut self, net_team: TeamId, team_count: usize) -> Option<TeamId>;
}

/// Awards the goal to the team after the net's owner.
#[derive(Debug, Default)]
pub struct NetScoring;

impl ScoringPolicy for NetScoring {
    fn on_ball_in_net(&mut self, net_team: TeamId, team_count: usize) -> Option<TeamId> {
        if team_count < 2 {
            return None;
        }
        Some((net_team + 1) % team_count as TeamId)
    }
}

pub struct Match {
    pub(crate) state: MatchState,
    pub(crate) roster: Roster,
    pub(crate) world: World,
    physics: Box<dyn Physics>,
    scoring: Box<dyn ScoringPolicy>,
    scores: Vec<u32>,
    /// Entities updated every step, in registration order.
    dynamic_entities: Vec<EntityId>,
    start_timestamp: Option<f64>,
    score_limit: Option<u32>,
}

impl Match {
    pub fn new(level: &LevelDescription) -> Result<Self, LevelError> {
        Self::with_physics(level, Box::new(ArcadePhysics::new()))
    }

    pub fn with_physics(
        level: &LevelDescription,
        physics: Box<dyn Physics>,
    ) -> Result<Self, LevelError> {
        level.validate()?;

        let mut game = Self {
            state: MatchState::WaitingForPlayers,
            roster: Roster::new(level.teams.len()),
            world: World::new(),
            physics,
            scoring: Box::new(NetScoring),
            scores: vec![0; level.teams.len()],
            dynamic_entities: Vec::new(),
            start_timestamp: None,
            score_limit: None,
        };
        game.spawn_level(level);
        info!("Loaded level with {} entities", game.world.len());

        Ok(game)
    }

    pub fn set_scoring(&mut self, scoring: Box<dyn ScoringPolicy>) {
        self.scoring = scoring;
    }

    pub fn set_score_limit(&mut self, limit: Option<u32>) {
        self.score_limit = limit;
    }

    fn spawn_level(&mut self, level: &LevelDescription) {
        for wall in &level.walls {
            let id = self.world.spawn(
                EntityKind::Obstacle,
                &wall.name,
                RigidBody::solid(wall.position, wall.width, wall.height),
                None,
            );
            self.physics.add_body(id);
        }

        let info = &level.player_info;
        for (team_index, layout) in level.teams.iter().enumerate() {
            let team_id = team_index as TeamId;
            for (index, spawn) in layout.spawns.iter().enumerate() {
                let id = self.world.spawn(
                    EntityKind::player(info.speed),
                    &spawn.name,
                    RigidBody::dynamic(spawn.position, info.width, info.height),
                    Some(team_id),
                );
                self.physics.add_body(id);

                if let Some(team) = self.roster.team_mut(team_id) {
                    team.add_player(id);
                    if index == info.default_player_index {
                        team.default_controlled_player_id = id;
                    }
                }
            }
        }

        for (team_index, layout) in level.teams.iter().enumerate() {
            if let Some(net) = &layout.net {
                let id = self.world.spawn(
                    EntityKind::Net,
                    &net.name,
                    RigidBody::trigger(net.position, net.width, net.height),
                    Some(team_index as TeamId),
                );
                self.physics.add_body(id);
            }
        }

        let ball = &level.ball;
        let id = self.world.spawn(
            EntityKind::ball(),
            &ball.name,
            RigidBody::dynamic(ball.position, ball.width, ball.height),
            None,
        );
        self.physics.add_body(id);

        self.dynamic_entities = self
            .world
            .iter()
            .filter(|entity| entity.is_dynamic())
            .map(|entity| entity.id)
            .collect();
    }

    fn set_state(&mut self, state: MatchState) {
        if self.state != state {
            info!("Match state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn scores(&self) -> &[u32] {
        &self.scores
    }

    pub fn start_timestamp(&self) -> Option<f64> {
        self.start_timestamp
    }

    pub fn controlled_player_id(&self, addr: SocketAddr) -> EntityId {
        self.roster.controlled_player_id(addr)
    }

    /// Puts `addr` on the first free team
    ///
    /// When the roster becomes full the match starts and `now` is recorded
    /// as its start time. Fails only when no team is free.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        now: f64,
    ) -> Result<Option<Assignment>, MatchError> {
        let assignment = self.roster.add_client(addr)?;

        if let Some(assignment) = assignment {
            self.world.set_team_owner(assignment.team_id, Some(addr));

            if self.state == MatchState::WaitingForPlayers && self.roster.is_full() {
                self.start_timestamp = Some(now);
                self.set_state(MatchState::Playing);
            }
        }
        Ok(assignment)
    }

    /// Takes `addr` off the roster. A match in play cannot continue and ends.
    pub fn remove_player(&mut self, addr: SocketAddr) -> bool {
        let Some(team_id) = self.roster.remove_client(addr) else {
            return false;
        };

        let players = self
            .roster
            .team(team_id)
            .map(|team| team.players().to_vec())
            .unwrap_or_default();
        for id in players {
            self.world.stop_player(id);
        }
        self.world.set_team_owner(team_id, None);

        if let Some(ball) = self.world.ball_id().and_then(|id| self.world.get_mut(id)) {
            if ball.is_owned_by(addr) {
                ball.owner = None;
            }
        }

        if self.state.is_in_play() {
            self.set_state(MatchState::Ended);
        }
        true
    }

    /// Snaps every dynamic entity back to its spawn configuration.
    pub fn reset_positions(&mut self) {
        for &id in &self.dynamic_entities {
            if let Some(entity) = self.world.get_mut(id) {
                entity.reset();
            }
        }
    }

    /// Completes a reset requested by a goal during the previous step.
    pub fn finish_pending_reset(&mut self) {
        if self.state == MatchState::ResettingPlayersPositions {
            self.reset_positions();
            self.set_state(MatchState::Playing);
        }
    }

    /// Simulates one step: physics, contacts, then entity updates.
    pub fn update(&mut self, dt: f32) {
        self.physics.step(&mut self.world, dt);
        let contacts = self.physics.resolve_collisions(&mut self.world);

        for contact in contacts {
            self.handle_contact(contact);
        }

        for &id in &self.dynamic_entities {
            self.world.update_entity(id, dt);
        }
    }

    fn handle_contact(&mut self, contact: Contact) {
        if self.state != MatchState::Playing {
            return;
        }
        let Some(ball_id) = self.world.ball_id() else {
            return;
        };
        let Some(other_id) = contact.other(ball_id) else {
            return;
        };
        if self.world.get(ball_id).and_then(|b| b.carrier()).is_some() {
            return;
        }
        let Some(other) = self.world.get(other_id) else {
            return;
        };

        let is_player = other.is_player();
        let net_team = match other.kind {
            EntityKind::Net => other.team,
            _ => None,
        };

        if is_player {
            self.on_ball_taken(other_id);
        } else if let Some(net_team) = net_team {
            let team_count = self.roster.capacity();
            if let Some(team) = self.scoring.on_ball_in_net(net_team, team_count) {
                self.award_goal(team);
            }
        }
    }

    /// Makes `player_id` the ball carrier and hands its team's control to it.
    pub fn on_ball_taken(&mut self, player_id: EntityId) {
        let Some(team_id) = self.world.take_ball(player_id) else {
            return;
        };
        debug!("Player {} took the ball for team {}", player_id, team_id);

        let Some(team) = self.roster.team_mut(team_id) else {
            return;
        };
        let previous = team.controlled_player_id;
        team.controlled_player_id = player_id;
        // The carrier stops too when it already was the controlled player
        self.world.stop_player(previous);
    }

    /// Counts a goal for `team`, then resets the field or ends the match.
    pub fn award_goal(&mut self, team: TeamId) {
        if self.state != MatchState::Playing {
            return;
        }
        let Some(score) = self.scores.get_mut(team as usize) else {
            return;
        };
        *score += 1;
        let score = *score;
        info!("Team {} scored, scores {:?}", team, self.scores);

        match self.score_limit {
            Some(limit) if score >= limit => self.set_state(MatchState::Ended),
            _ => self.set_state(MatchState::ResettingPlayersPositions),
        }
    }

    /// Per-step snapshot broadcast to every client.
    pub fn game_info_packet(&self) -> Packet {
        Packet::GameInfo {
            scores: self.scores.clone(),
            controlled_players: self
                .roster
                .teams()
                .iter()
                .map(|team| team.controlled_player_id)
                .collect(),
            state: self.state,
        }
    }

    pub fn welcome_packet(&self, addr: SocketAddr) -> Option<Packet> {
        self.roster.team_of(addr).map(|team| Packet::Welcome {
            team_id: team.id,
            controlled_player_id: team.controlled_player_id,
        })
    }

    /// One `Spawn` per entity in creation order, as seen by `recipient`.
    pub fn spawn_packets(&self, recipient: SocketAddr) -> Vec<Packet> {
        self.world
            .iter()
            .map(|entity| Packet::Spawn {
                entity_id: entity.id,
                kind: entity.kind.wire_kind(),
                x: entity.body.position.x,
                y: entity.body.position.y,
                width: entity.body.width,
                height: entity.body.height,
                team_id: entity.team,
                owned: entity.is_owned_by(recipient),
            })
            .collect()
    }

    /// Position updates of the dynamic entities, in registration order.
    pub fn entity_update_packets(&self) -> Vec<Packet> {
        self.dynamic_entities
            .iter()
            .filter_map(|&id| self.world.get(id))
            .map(|entity| Packet::EntityUpdate {
                entity_id: entity.id,
                x: entity.body.position.x,
                y: entity.body.position.y,
            })
            .collect()
    }
}
