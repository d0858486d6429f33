use crate::config::PhysicsConfig;
use crate::gameplay::track::{Obstacle, ObstacleBehavior};
use crate::gameplay::vehicle::{horizontal_direction, Bike};
use bevy::prelude::*;

const GROUNDED_TOLERANCE: f32 = 0.1;
const REST_SPEED: f32 = 0.1;
const MIN_CONTACT_DISTANCE: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObstacleContact {
    Pushed,
    Slowed,
    Boosted,
    Launched,
}

#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(&PhysicsConfig::default())
    }
}

impl PhysicsEngine {
    pub fn new(config: &PhysicsConfig) -> Self {
        Self { config: *config }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn apply_physics(&self, bike: &mut Bike, dt: f32) -> bool {
        let ground = self.config.ground_height;

        bike.grounded = bike.position.y <= ground + GROUNDED_TOLERANCE;
        if bike.grounded {
            bike.position.y = ground;
            bike.velocity.y = 0.0;
        } else {
            bike.velocity.y -= self.config.gravity * dt;
        }

        if bike.grounded {
            bike.velocity.x *= self.config.ground_friction;
            bike.velocity.z *= self.config.ground_friction;
            if Vec2::new(bike.velocity.x, bike.velocity.z).length() < REST_SPEED {
                bike.velocity.x = 0.0;
                bike.velocity.z = 0.0;
            }
        }

        bike.velocity.x *= self.config.air_drag;
        bike.velocity.z *= self.config.air_drag;

        let bound = self.config.world_bound;
        if bike.position.x.abs() > bound || bike.position.z.abs() > bound {
            warn!(
                "Bike left the world at ({:.1}, {:.1}); resetting to origin.",
                bike.position.x, bike.position.z
            );
            bike.position = Vec3::new(0.0, ground, 0.0);
            bike.velocity = Vec3::ZERO;
            bike.grounded = true;
            return true;
        }

        false
    }

    pub fn resolve_vehicle_collision(&self, a: &mut Bike, b: &mut Bike) -> bool {
        let radius = self.config.vehicle_radius;
        let delta = b.position - a.position;
        let distance = delta.length();
        let min_distance = radius * 2.0;

        if distance >= min_distance || distance <= MIN_CONTACT_DISTANCE {
            return false;
        }

        let normal = delta / distance;
        let half_overlap = (min_distance - distance) * 0.5;
        a.position -= normal * half_overlap;
        b.position += normal * half_overlap;

        let separating_velocity = (b.velocity - a.velocity).dot(normal);
        if separating_velocity < 0.0 {
            let impulse = -(1.0 + self.config.restitution) * separating_velocity * 0.5;
            a.velocity -= normal * impulse;
            b.velocity += normal * impulse;
        }

        true
    }

    pub fn resolve_all_vehicle_collisions<'a, I>(&self, bikes: I) -> usize
    where
        I: IntoIterator<Item = &'a mut Bike>,
    {
        let mut bikes: Vec<&mut Bike> = bikes.into_iter().collect();
        let mut contacts = 0;

        for i in 0..bikes.len() {
            let (head, tail) = bikes.split_at_mut(i + 1);
            let a = &mut *head[i];
            for b in tail.iter_mut() {
                if self.resolve_vehicle_collision(a, b) {
                    contacts += 1;
                }
            }
        }

        contacts
    }

    /// Applies the obstacle's effect, then pushes the bike away from the obstacle center and
    /// damps its velocity. Every behavior collides.
    pub fn resolve_obstacle_collision(
        &self,
        bike: &mut Bike,
        obstacle: &Obstacle,
    ) -> Option<ObstacleContact> {
        if !obstacle.intersects_sphere(bike.position, self.config.vehicle_radius) {
            return None;
        }

        let contact = match *obstacle.behavior() {
            ObstacleBehavior::Solid | ObstacleBehavior::MovingPlatform { .. } => {
                ObstacleContact::Pushed
            }
            ObstacleBehavior::SlowZone { factor } => {
                bike.velocity *= factor;
                ObstacleContact::Slowed
            }
            ObstacleBehavior::SpeedBoost {
                multiplier,
                duration_s,
            } => {
                bike.apply_speed_boost(multiplier, duration_s);
                ObstacleContact::Boosted
            }
            ObstacleBehavior::Ramp { launch_speed } => {
                if bike.launch(launch_speed) {
                    ObstacleContact::Launched
                } else {
                    ObstacleContact::Pushed
                }
            }
        };

        let push = horizontal_direction(bike.position - obstacle.position()).unwrap_or(Vec3::ZERO);
        bike.apply_force(push * self.config.obstacle_push_force);
        bike.velocity *= self.config.obstacle_impact_damping;
        Some(contact)
    }
}
