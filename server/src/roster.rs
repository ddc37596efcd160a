//! Team assignment for the clients taking part in the match.

use crate::entity::EntityId;
use crate::error::MatchError;
use log::info;
use speedball_shared::NO_ENTITY;
use std::collections::HashMap;
use std::net::SocketAddr;

pub type TeamId = u32;

#[derive(Debug, Clone)]
pub struct Team {
    pub id: TeamId,
    owner: Option<SocketAddr>,
    players: Vec<EntityId>,
    /// The player the owner currently directs, [`NO_ENTITY`] when unowned.
    pub controlled_player_id: EntityId,
    /// Player handed to a new owner.
    pub default_controlled_player_id: EntityId,
}

impl Team {
    pub fn new(id: TeamId) -> Self {
        Self {
            id,
            owner: None,
            players: Vec::new(),
            controlled_player_id: NO_ENTITY,
            default_controlled_player_id: NO_ENTITY,
        }
    }

    pub fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owner(&self) -> Option<SocketAddr> {
        self.owner
    }

    pub fn players(&self) -> &[EntityId] {
        &self.players
    }

    pub fn add_player(&mut self, id: EntityId) {
        self.players.push(id);
    }

    /// Claims the team for `owner`. A claimed team keeps its owner until reset.
    pub fn set_owner(&mut self, owner: SocketAddr) -> bool {
        if self.owner.is_some() {
            return false;
        }
        self.owner = Some(owner);
        self.controlled_player_id = self.default_controlled_player_id;
        true
    }

    /// Drops the owner and everything it controlled.
    pub fn reset(&mut self) {
        self.owner = None;
        self.controlled_player_id = NO_ENTITY;
    }
}

/// Result of a successful [`Roster::add_client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub team_id: TeamId,
    pub controlled_player_id: EntityId,
}

/// Fixed set of teams, one per roster slot.
#[derive(Debug)]
pub struct Roster {
    teams: Vec<Team>,
    assignments: HashMap<SocketAddr, TeamId>,
}

impl Roster {
    pub fn new(team_count: usize) -> Self {
        Self {
            teams: (0..team_count as TeamId).map(Team::new).collect(),
            assignments: HashMap::new(),
        }
    }

    /// Assigns `addr` to the first team without an owner
    ///
    /// Returns `Ok(None)` if the client is already on the roster and
    /// [`MatchError::RosterFull`] if every team is taken.
    pub fn add_client(&mut self, addr: SocketAddr) -> Result<Option<Assignment>, MatchError> {
        if self.assignments.contains_key(&addr) {
            return Ok(None);
        }

        let team = self
            .teams
            .iter_mut()
            .find(|team| !team.has_owner())
            .ok_or(MatchError::RosterFull(addr))?;

        team.set_owner(addr);
        self.assignments.insert(addr, team.id);
        info!("Client {} assigned to team {}", addr, team.id);

        Ok(Some(Assignment {
            team_id: team.id,
            controlled_player_id: team.controlled_player_id,
        }))
    }

    /// Resets the client's team and forgets the assignment.
    pub fn remove_client(&mut self, addr: SocketAddr) -> Option<TeamId> {
        let team_id = self.assignments.remove(&addr)?;
        if let Some(team) = self.team_mut(team_id) {
            team.reset();
        }
        Some(team_id)
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(id as usize)
    }

    pub fn team_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.get_mut(id as usize)
    }

    pub fn team_of(&self, addr: SocketAddr) -> Option<&Team> {
        self.assignments.get(&addr).and_then(|&id| self.team(id))
    }

    pub fn team_of_mut(&mut self, addr: SocketAddr) -> Option<&mut Team> {
        let id = *self.assignments.get(&addr)?;
        self.team_mut(id)
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Entity controlled by the client's team, [`NO_ENTITY`] for unknown clients.
    pub fn controlled_player_id(&self, addr: SocketAddr) -> EntityId {
        self.team_of(addr)
            .map(|team| team.controlled_player_id)
            .unwrap_or(NO_ENTITY)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.teams.len()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}
