//! World entities and ball possession.
//!
//! Every object in the arena is a [`WorldEntity`]: a shared identity and body
//! record plus a closed [`EntityKind`] carrying the variant-specific state.
//! Capabilities (ownable, networked, dynamic) are derived from the kind.

use crate::physics::{RigidBody, Vector2};
use crate::roster::TeamId;
use speedball_shared::{EntityKind as WireKind, SHOT_OFFSET};
use std::net::SocketAddr;

/// Replication key of an entity, unique for the whole world. Never 0.
pub type EntityId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Direction and magnitude requested by the owning client.
    pub moving_direction: Vector2,
    pub speed: f32,
    /// The ball this player is carrying.
    pub carrying: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallState {
    pub carrier: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player(PlayerState),
    Ball(BallState),
    Obstacle,
    Net,
}

impl EntityKind {
    pub fn player(speed: f32) -> Self {
        EntityKind::Player(PlayerState {
            moving_direction: Vector2::ZERO,
            speed,
            carrying: None,
        })
    }

    pub fn ball() -> Self {
        EntityKind::Ball(BallState { carrier: None })
    }

    pub fn wire_kind(&self) -> WireKind {
        match self {
            EntityKind::Player(_) => WireKind::Player,
            EntityKind::Ball(_) => WireKind::Ball,
            EntityKind::Obstacle => WireKind::Obstacle,
            EntityKind::Net => WireKind::Net,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorldEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub body: RigidBody,
    /// Where [`WorldEntity::reset`] puts the entity back.
    pub start_position: Vector2,
    /// Owning client. Only players and the ball are ever owned.
    pub owner: Option<SocketAddr>,
    /// Fixed at spawn. Obstacles and the ball have none.
    pub team: Option<TeamId>,
}

impl WorldEntity {
    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    pub fn is_ownable(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_) | EntityKind::Ball(_))
    }

    /// Dynamic entities are updated every step, reset after goals and
    /// replicated through per-entity updates.
    pub fn is_dynamic(&self) -> bool {
        self.is_ownable()
    }

    pub fn is_owned_by(&self, addr: SocketAddr) -> bool {
        self.owner == Some(addr)
    }

    pub fn position(&self) -> Vector2 {
        self.body.position
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.body.position = Vector2::new(x, y);
    }

    pub fn carrying(&self) -> Option<EntityId> {
        match &self.kind {
            EntityKind::Player(player) => player.carrying,
            _ => None,
        }
    }

    pub fn carrier(&self) -> Option<EntityId> {
        match &self.kind {
            EntityKind::Ball(ball) => ball.carrier,
            _ => None,
        }
    }

    /// Sets the motion a player will follow from its next update.
    pub fn set_moving_direction(&mut self, direction: Vector2) {
        if let EntityKind::Player(player) = &mut self.kind {
            player.moving_direction = direction;
        }
    }

    pub fn moving_direction(&self) -> Option<Vector2> {
        match &self.kind {
            EntityKind::Player(player) => Some(player.moving_direction),
            _ => None,
        }
    }

    /// Restores the spawn configuration.
    pub fn reset(&mut self) {
        self.body.position = self.start_position;
        self.body.velocity = Vector2::ZERO;

        match &mut self.kind {
            EntityKind::Player(player) => {
                player.moving_direction = Vector2::ZERO;
                player.carrying = None;
            }
            EntityKind::Ball(ball) => {
                ball.carrier = None;
                self.body.collision_affected = true;
                self.owner = None;
            }
            EntityKind::Obstacle | EntityKind::Net => {}
        }
    }
}

/// Entity table in creation order.
#[derive(Debug, Default)]
pub struct World {
    entities: Vec<WorldEntity>,
    ball: Option<EntityId>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity and returns its id. Ids start at 1 and follow creation order.
    pub fn spawn(
        &mut self,
        kind: EntityKind,
        name: &str,
        body: RigidBody,
        team: Option<TeamId>,
    ) -> EntityId {
        let id = self.entities.len() as EntityId + 1;
        if matches!(kind, EntityKind::Ball(_)) {
            self.ball = Some(id);
        }

        self.entities.push(WorldEntity {
            id,
            name: name.to_string(),
            kind,
            start_position: body.position,
            body,
            owner: None,
            team,
        });
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&WorldEntity> {
        self.entities.get(id.checked_sub(1)? as usize)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut WorldEntity> {
        self.entities.get_mut(id.checked_sub(1)? as usize)
    }

    pub fn body(&self, id: EntityId) -> Option<&RigidBody> {
        self.get(id).map(|e| &e.body)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody> {
        self.get_mut(id).map(|e| &mut e.body)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ball_id(&self) -> Option<EntityId> {
        self.ball
    }

    /// Zeroes a player's requested motion. Ignores anything that is not a player.
    pub fn stop_player(&mut self, id: EntityId) {
        if let Some(entity) = self.get_mut(id) {
            entity.set_moving_direction(Vector2::ZERO);
        }
    }

    /// Per-step behaviour not covered by the physics engine.
    pub fn update_entity(&mut self, id: EntityId, _dt: f32) {
        let Some(entity) = self.get(id) else {
            return;
        };

        match &entity.kind {
            EntityKind::Player(player) => {
                let velocity = player.moving_direction.scale(player.speed);
                if let Some(body) = self.body_mut(id) {
                    body.velocity = velocity;
                }
            }
            EntityKind::Ball(ball) => {
                let Some(carrier) = ball.carrier else {
                    return;
                };
                let Some(carrier_position) = self.get(carrier).map(|c| c.position()) else {
                    return;
                };
                if let Some(body) = self.body_mut(id) {
                    body.position = carrier_position;
                    body.velocity = Vector2::ZERO;
                }
            }
            EntityKind::Obstacle | EntityKind::Net => {}
        }
    }

    /// Hands the free ball to `player_id`
    ///
    /// Returns the taker's team, or None if the ball is already carried or
    /// `player_id` is not a player.
    pub fn take_ball(&mut self, player_id: EntityId) -> Option<TeamId> {
        let ball_id = self.ball?;
        if self.get(ball_id)?.carrier().is_some() {
            return None;
        }

        let taker = self.get_mut(player_id)?;
        let EntityKind::Player(player) = &mut taker.kind else {
            return None;
        };
        player.carrying = Some(ball_id);
        let owner = taker.owner;
        let team = taker.team;

        let ball = self.get_mut(ball_id)?;
        if let EntityKind::Ball(state) = &mut ball.kind {
            state.carrier = Some(player_id);
        }
        ball.owner = owner;
        ball.body.collision_affected = false;
        ball.body.velocity = Vector2::ZERO;

        team
    }

    /// Shoots the ball carried by `player_id`
    ///
    /// The ball is moved [`SHOT_OFFSET`] along the direction to clear the
    /// kicker and given `direction * force` as velocity. Returns false, with
    /// nothing changed, when the player carries nothing.
    pub fn release_ball(&mut self, player_id: EntityId, direction: Vector2, force: f32) -> bool {
        let Some(ball_id) = self.get(player_id).and_then(|p| p.carrying()) else {
            return false;
        };

        if let Some(EntityKind::Player(player)) = self.get_mut(player_id).map(|p| &mut p.kind) {
            player.carrying = None;
        }

        if let Some(ball) = self.get_mut(ball_id) {
            if let EntityKind::Ball(state) = &mut ball.kind {
                state.carrier = None;
            }
            ball.owner = None;
            ball.body.position = ball.body.position.add(&direction.scale(SHOT_OFFSET));
            ball.body.collision_affected = true;
            ball.body.velocity = direction.scale(force);
        }
        true
    }

    /// Sets the owner of every ownable entity of `team`.
    pub fn set_team_owner(&mut self, team: TeamId, owner: Option<SocketAddr>) {
        for entity in self.entities.iter_mut() {
            if entity.is_ownable() && entity.team == Some(team) {
                entity.owner = owner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "192.168.1.1:5001".parse().unwrap()
    }

    fn world_with_ball() -> (World, EntityId, EntityId, EntityId) {
        let mut world = World::new();
        let kicker = world.spawn(
            EntityKind::player(4.0),
            "kicker",
            RigidBody::dynamic(Vector2::new(1.0, 1.0), 1.0, 1.0),
            Some(0),
        );
        let other = world.spawn(
            EntityKind::player(4.0),
            "other",
            RigidBody::dynamic(Vector2::new(5.0, 1.0), 1.0, 1.0),
            Some(1),
        );
        let ball = world.spawn(
            EntityKind::ball(),
            "ball",
            RigidBody::dynamic(Vector2::new(2.0, 2.0), 0.5, 0.5),
            None,
        );
        (world, kicker, other, ball)
    }

    #[test]
    fn test_ids_follow_creation_order() {
        let (world, kicker, other, ball) = world_with_ball();
        assert_eq!((kicker, other, ball), (1, 2, 3));
        assert_eq!(world.ball_id(), Some(3));
        assert!(world.get(0).is_none());
        assert!(world.get(4).is_none());
        let ids: Vec<EntityId> = world.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_take_ball_sets_carrier() {
        let (mut world, kicker, other, ball) = world_with_ball();
        world.set_team_owner(0, Some(test_addr()));

        assert_eq!(world.take_ball(kicker), Some(0));

        let ball_entity = world.get(ball).unwrap();
        assert_eq!(ball_entity.carrier(), Some(kicker));
        assert!(!ball_entity.body.collision_affected);
        assert!(ball_entity.is_owned_by(test_addr()));
        assert_eq!(world.get(kicker).unwrap().carrying(), Some(ball));

        // Only one carrier at a time
        assert_eq!(world.take_ball(other), None);
        assert_eq!(world.get(ball).unwrap().carrier(), Some(kicker));
    }

    #[test]
    fn test_carried_ball_follows_carrier() {
        let (mut world, kicker, _, ball) = world_with_ball();
        world.take_ball(kicker);
        world.get_mut(kicker).unwrap().set_position(7.0, -2.0);

        world.update_entity(ball, 0.1);

        assert_eq!(world.get(ball).unwrap().position(), Vector2::new(7.0, -2.0));
    }

    #[test]
    fn test_release_ball_shoots() {
        let (mut world, kicker, _, ball) = world_with_ball();
        world.take_ball(kicker);
        world.update_entity(ball, 0.1);

        assert!(world.release_ball(kicker, Vector2::new(1.0, 0.0), 8.0));

        let ball_entity = world.get(ball).unwrap();
        assert_eq!(ball_entity.carrier(), None);
        assert!(ball_entity.body.collision_affected);
        assert_eq!(ball_entity.owner, None);
        assert_eq!(ball_entity.position(), Vector2::new(1.0 + SHOT_OFFSET, 1.0));
        assert_eq!(ball_entity.body.velocity, Vector2::new(8.0, 0.0));
        assert_eq!(world.get(kicker).unwrap().carrying(), None);
    }

    #[test]
    fn test_release_without_ball_changes_nothing() {
        let (mut world, kicker, _, ball) = world_with_ball();
        let before = world.get(ball).unwrap().body;

        assert!(!world.release_ball(kicker, Vector2::new(0.0, 1.0), 5.0));
        assert_eq!(world.get(ball).unwrap().body, before);
    }

    #[test]
    fn test_player_update_applies_moving_direction() {
        let (mut world, kicker, _, _) = world_with_ball();
        world
            .get_mut(kicker)
            .unwrap()
            .set_moving_direction(Vector2::new(0.5, -1.0));

        world.update_entity(kicker, 0.1);
        assert_eq!(world.body(kicker).unwrap().velocity, Vector2::new(2.0, -4.0));

        world.stop_player(kicker);
        world.update_entity(kicker, 0.1);
        assert_eq!(world.body(kicker).unwrap().velocity, Vector2::ZERO);
    }

    #[test]
    fn test_reset_restores_spawn_configuration() {
        let (mut world, kicker, _, ball) = world_with_ball();
        world.take_ball(kicker);
        world.get_mut(kicker).unwrap().set_position(9.0, 9.0);
        world
            .get_mut(kicker)
            .unwrap()
            .set_moving_direction(Vector2::new(1.0, 0.0));

        world.get_mut(kicker).unwrap().reset();
        world.get_mut(ball).unwrap().reset();

        let player = world.get(kicker).unwrap();
        assert_eq!(player.position(), Vector2::new(1.0, 1.0));
        assert_eq!(player.moving_direction(), Some(Vector2::ZERO));
        assert_eq!(player.carrying(), None);

        let ball_entity = world.get(ball).unwrap();
        assert_eq!(ball_entity.position(), Vector2::new(2.0, 2.0));
        assert_eq!(ball_entity.carrier(), None);
        assert!(ball_entity.body.collision_affected);
    }

    #[test]
    fn test_set_team_owner_only_touches_team_players() {
        let (mut world, kicker, other, ball) = world_with_ball();
        world.set_team_owner(0, Some(test_addr()));

        assert!(world.get(kicker).unwrap().is_owned_by(test_addr()));
        assert_eq!(world.get(other).unwrap().owner, None);
        assert_eq!(world.get(ball).unwrap().owner, None);

        world.set_team_owner(0, None);
        assert_eq!(world.get(kicker).unwrap().owner, None);
    }
}
