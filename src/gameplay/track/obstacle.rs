use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObstacleBehavior {
    Solid,
    /// Solid box sliding along `direction` as `sin(phase) * amplitude` around its anchor.
    MovingPlatform {
        direction: Vec3,
        speed: f32,
        amplitude: f32,
    },
    SlowZone { factor: f32 },
    SpeedBoost { multiplier: f32, duration_s: f32 },
    Ramp { launch_speed: f32 },
}

impl ObstacleBehavior {
    pub fn is_solid(&self) -> bool {
        matches!(self, Self::Solid | Self::MovingPlatform { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Solid => "barrier",
            Self::MovingPlatform { .. } => "moving platform",
            Self::SlowZone { .. } => "slow zone",
            Self::SpeedBoost { .. } => "speed boost",
            Self::Ramp { .. } => "ramp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone)]
pub struct Obstacle {
    position: Vec3,
    anchor: Vec3,
    half_extents: Vec3,
    behavior: ObstacleBehavior,
    phase: f32,
    bounds: Aabb,
}

impl Obstacle {
    pub fn new(position: Vec3, size: Vec3, behavior: ObstacleBehavior) -> Self {
        let half_extents = size.abs() * 0.5;
        let behavior = match behavior {
            ObstacleBehavior::MovingPlatform {
                direction,
                speed,
                amplitude,
            } => ObstacleBehavior::MovingPlatform {
                direction: direction.normalize_or_zero(),
                speed,
                amplitude,
            },
            other => other,
        };

        Self {
            position,
            anchor: position,
            half_extents,
            behavior,
            phase: 0.0,
            bounds: Aabb::from_center(position, half_extents),
        }
    }

    pub fn barrier(position: Vec3, size: f32) -> Self {
        Self::new(position, Vec3::splat(size), ObstacleBehavior::Solid)
    }

    pub fn update(&mut self, dt: f32) {
        let ObstacleBehavior::MovingPlatform {
            direction,
            speed,
            amplitude,
        } = self.behavior
        else {
            return;
        };

        self.phase += speed * dt;
        self.set_position(self.anchor + direction * self.phase.sin() * amplitude);
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.bounds = Aabb::from_center(position, self.half_extents);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn size(&self) -> Vec3 {
        self.half_extents * 2.0
    }

    pub fn behavior(&self) -> &ObstacleBehavior {
        &self.behavior
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = self.bounds.closest_point(center);
        closest.distance_squared(center) < radius * radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_barrier_never_moves() {
        let mut barrier = Obstacle::barrier(Vec3::new(15.0, 1.0, -30.0), 3.0);
        barrier.update(1.0);

        assert_eq!(barrier.position(), Vec3::new(15.0, 1.0, -30.0));
        assert_eq!(barrier.bounds().min, Vec3::new(13.5, -0.5, -31.5));
    }

    #[test]
    fn moving_platform_oscillates_and_tracks_bounds() {
        let mut platform = Obstacle::new(
            Vec3::new(18.0, 1.0, 0.0),
            Vec3::new(3.0, 1.0, 3.0),
            ObstacleBehavior::MovingPlatform {
                direction: Vec3::X * 4.0,
                speed: 2.0,
                amplitude: 5.0,
            },
        );

        platform.update(std::f32::consts::FRAC_PI_4);
        let position = platform.position();
        assert!((position.x - 23.0).abs() < 1e-4);
        assert_eq!(position.z, 0.0);
        assert!((platform.bounds().min.x - 21.5).abs() < 1e-4);
        assert!((platform.bounds().max.x - 24.5).abs() < 1e-4);

        platform.update(std::f32::consts::FRAC_PI_2);
        assert!((platform.position().x - 13.0).abs() < 1e-4);
    }

    #[test]
    fn sphere_overlap_uses_closest_point() {
        let barrier = Obstacle::barrier(Vec3::ZERO, 2.0);

        assert!(barrier.intersects_sphere(Vec3::new(2.5, 0.0, 0.0), 2.0));
        assert!(!barrier.intersects_sphere(Vec3::new(3.5, 0.0, 0.0), 2.0));
        assert!(!barrier.intersects_sphere(Vec3::new(2.5, 0.0, 2.5), 2.0));
        assert!(barrier.intersects_sphere(Vec3::new(0.2, 0.0, 0.0), 2.0));
    }

    #[test]
    fn only_barriers_and_platforms_are_solid() {
        assert!(ObstacleBehavior::Solid.is_solid());
        assert!(ObstacleBehavior::MovingPlatform {
            direction: Vec3::X,
            speed: 1.0,
            amplitude: 1.0
        }
        .is_solid());
        assert!(!ObstacleBehavior::SlowZone { factor: 0.9 }.is_solid());
        assert!(!ObstacleBehavior::SpeedBoost {
            multiplier: 1.5,
            duration_s: 2.0
        }
        .is_solid());
        assert!(!ObstacleBehavior::Ramp { launch_speed: 8.0 }.is_solid());
    }
}
