//! Validation and application of client gameplay commands.
//!
//! Commands are checked against the roster and entity ownership before they
//! touch the world. A rejected command never fails the step: it only raises
//! the sender's cheat-score.

use crate::client_manager::Client;
use crate::entity::EntityId;
use crate::game::Match;
use crate::physics::Vector2;
use log::{trace, warn};
use speedball_shared::{MatchState, PlayerInput, MALUS_MINOR, MALUS_SEVERE};

impl Match {
    /// Dispatches one decoded input from `client`.
    pub fn apply_input(&mut self, client: &mut Client, input: PlayerInput) {
        if self.state != MatchState::Playing {
            trace!("Input from {} while {:?}", client.addr, self.state);
            client.penalize(MALUS_MINOR);
            return;
        }

        match input {
            PlayerInput::SelectPlayer { target } => self.select_player(client, target),
            PlayerInput::Movement { x, y } => self.movement(client, Vector2::new(x, y)),
            PlayerInput::Shot {
                dir_x,
                dir_y,
                force,
            } => self.shot(client, Vector2::new(dir_x, dir_y), force),
            PlayerInput::Tackle => self.tackle(client),
        }
    }

    fn select_player(&mut self, client: &mut Client, target: EntityId) {
        let Some(entity) = self.world.get(target).filter(|e| e.is_player()) else {
            warn!("Client {} selected non-player entity {}", client.addr, target);
            client.penalize(MALUS_SEVERE);
            return;
        };

        if !entity.is_owned_by(client.addr) {
            warn!("Client {} selected foreign player {}", client.addr, target);
            client.penalize(MALUS_MINOR);
            return;
        }

        let Some(team) = self.roster.team_of_mut(client.addr) else {
            client.penalize(MALUS_MINOR);
            return;
        };
        let previous = team.controlled_player_id;
        team.controlled_player_id = target;

        self.world.stop_player(previous);
        trace!("Client {} now controls {}", client.addr, target);
    }

    fn movement(&mut self, client: &mut Client, direction: Vector2) {
        let controlled = self.roster.controlled_player_id(client.addr);

        match self.world.get_mut(controlled) {
            Some(player) if player.is_player() && player.is_owned_by(client.addr) => {
                player.set_moving_direction(direction);
            }
            _ => {
                warn!(
                    "Client {} moved player {} it does not own",
                    client.addr, controlled
                );
                client.penalize(MALUS_MINOR);
            }
        }
    }

    /// Only the controlled player carrying the ball can shoot; otherwise a no-op.
    ///
    /// Inputs are applied before the step's physics, so the ball leaves from
    /// where the carrier stood at the end of the previous step.
    fn shot(&mut self, client: &mut Client, direction: Vector2, force: f32) {
        let controlled = self.roster.controlled_player_id(client.addr);

        if self.world.release_ball(controlled, direction, force) {
            trace!(
                "Client {} shot with {:?} x {}",
                client.addr,
                direction,
                force
            );
        }
    }

    /// Extension point: tackling has no gameplay effect yet.
    fn tackle(&mut self, client: &mut Client) {
        trace!("Client {} tackled", client.addr);
    }

    /// Authoritative position report for the client's controlled player
    ///
    /// Accepted only from the entity's owner while that entity is the team's
    /// controlled player.
    pub fn client_update(&mut self, client: &mut Client, entity_id: EntityId, x: f32, y: f32) {
        if self.state != MatchState::Playing {
            client.penalize(MALUS_MINOR);
            return;
        }

        let controlled = self.roster.controlled_player_id(client.addr);
        match self.world.get_mut(entity_id) {
            Some(entity) if entity.is_owned_by(client.addr) && controlled == entity_id => {
                entity.set_position(x, y);
            }
            _ => {
                warn!(
                    "Client {} reported position of entity {} it does not control",
                    client.addr, entity_id
                );
                client.penalize(MALUS_SEVERE);
            }
        }
    }
}
