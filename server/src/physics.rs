use crate::entity::{EntityId, World};
use serde::{Deserialize, Serialize};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector2 {
    ///Value along the x-axis.
    pub x: f32,
    ///Value along the y-axis.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

///Axis-aligned box body simulated by the physics engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    ///The positional center of the body.
    pub position: Vector2,
    pub velocity: Vector2,
    pub width: f32,
    pub height: f32,
    ///Static bodies never move and push dynamic bodies out of them.
    pub is_static: bool,
    ///Triggers report contacts but never push anything.
    pub is_trigger: bool,
    ///Bodies that are not collision affected neither collide nor report contacts.
    pub collision_affected: bool,
}

impl RigidBody {
    pub fn dynamic(position: Vector2, width: f32, height: f32) -> Self {
        Self {
            position,
            velocity: Vector2::ZERO,
            width,
            height,
            is_static: false,
            is_trigger: false,
            collision_affected: true,
        }
    }

    pub fn solid(position: Vector2, width: f32, height: f32) -> Self {
        Self {
            is_static: true,
            ..Self::dynamic(position, width, height)
        }
    }

    pub fn trigger(position: Vector2, width: f32, height: f32) -> Self {
        Self {
            is_trigger: true,
            ..Self::solid(position, width, height)
        }
    }

    fn bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.position.x - self.width / 2.0,
            self.position.x + self.width / 2.0,
            self.position.y - self.height / 2.0,
            self.position.y + self.height / 2.0,
        )
    }

    ///AABB intersection test. Touching edges do not overlap.
    pub fn overlaps(&self, other: &RigidBody) -> bool {
        let (left, right, bottom, top) = self.bounds();
        let (other_left, other_right, other_bottom, other_top) = other.bounds();

        !(right <= other_left || left >= other_right || bottom >= other_top || top <= other_bottom)
    }

    ///Moves this body out of `other` along the axis of shallowest penetration
    ///and cancels its velocity on that axis. Returns true if they overlapped.
    pub fn push_out_of(&mut self, other: &RigidBody) -> bool {
        if !self.overlaps(other) {
            return false;
        }

        let (left, right, bottom, top) = self.bounds();
        let (other_left, other_right, other_bottom, other_top) = other.bounds();

        let overlap_x = (right.min(other_right) - left.max(other_left)).abs();
        let overlap_y = (top.min(other_top) - bottom.max(other_bottom)).abs();

        if overlap_x < overlap_y {
            if self.position.x < other.position.x {
                self.position.x = other_left - self.width / 2.0;
            } else {
                self.position.x = other_right + self.width / 2.0;
            }
            self.velocity.x = 0.0;
        } else {
            if self.position.y < other.position.y {
                self.position.y = other_bottom - self.height / 2.0;
            } else {
                self.position.y = other_top + self.height / 2.0;
            }
            self.velocity.y = 0.0;
        }
        true
    }
}

///Two overlapping, collision affected bodies found by a collision pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub a: EntityId,
    pub b: EntityId,
}

impl Contact {
    ///The other side of the contact, if `id` is part of it.
    pub fn other(&self, id: EntityId) -> Option<EntityId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

///Collision engine used by the match. Bodies live on the world's entities;
///the engine only keeps track of which entities it simulates.
pub trait Physics {
    fn add_body(&mut self, id: EntityId);

    ///Advances every registered body by `dt` seconds.
    fn step(&mut self, world: &mut World, dt: f32);

    ///Resolves penetrations and reports contacts, in registration order.
    fn resolve_collisions(&mut self, world: &mut World) -> Vec<Contact>;
}

///Velocity integration with AABB contacts.
#[derive(Debug, Default)]
pub struct ArcadePhysics {
    bodies: Vec<EntityId>,
}

impl ArcadePhysics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Physics for ArcadePhysics {
    fn add_body(&mut self, id: EntityId) {
        if !self.bodies.contains(&id) {
            self.bodies.push(id);
        }
    }

    fn step(&mut self, world: &mut World, dt: f32) {
        for &id in &self.bodies {
            if let Some(body) = world.body_mut(id) {
                if !body.is_static {
                    body.position = body.position.add(&body.velocity.scale(dt));
                }
            }
        }
    }

    fn resolve_collisions(&mut self, world: &mut World) -> Vec<Contact> {
        let mut contacts = Vec::new();

        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let (id_a, id_b) = (self.bodies[i], self.bodies[j]);
                let (Some(a), Some(b)) = (world.body(id_a).copied(), world.body(id_b).copied())
                else {
                    continue;
                };

                if !a.collision_affected || !b.collision_affected || !a.overlaps(&b) {
                    continue;
                }
                contacts.push(Contact { a: id_a, b: id_b });

                // Dynamic bodies are pushed out of solid static geometry.
                match (a.is_static, b.is_static) {
                    (false, true) if !b.is_trigger => {
                        if let Some(body) = world.body_mut(id_a) {
                            body.push_out_of(&b);
                        }
                    }
                    (true, false) if !a.is_trigger => {
                        if let Some(body) = world.body_mut(id_b) {
                            body.push_out_of(&a);
                        }
                    }
                    _ => {}
                }
            }
        }

        contacts
    }
}
