mod stats;

pub use stats::{BikeStats, UpgradeKind};

use bevy::prelude::*;

const MIN_THROTTLE: f32 = 0.0;
const MIN_BRAKE_SPEED: f32 = 0.1;
const MIN_TURN_INPUT: f32 = 0.01;
const MIN_TURN_SPEED: f32 = 1.0;
const HEADING_SMOOTHING: f32 = 0.1;
const HEADING_ALIGN_MIN_SPEED: f32 = 0.1;
const MIN_DIRECTION_LENGTH: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub heading: Vec3,
    pub rotation_deg: f32,
    pub speed: f32,
    pub max_speed: f32,
    pub grounded: bool,
    pub boosted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BoostState {
    active: bool,
    multiplier: f32,
    remaining_s: f32,
}

impl Default for BoostState {
    fn default() -> Self {
        Self {
            active: false,
            multiplier: 1.0,
            remaining_s: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bike {
    pub position: Vec3,
    pub velocity: Vec3,
    pub grounded: bool,
    heading: Vec3,
    rotation_deg: f32,
    pending_force: Vec3,
    stats: BikeStats,
    base_stats: BikeStats,
    boost: BoostState,
    color: Color,
}

impl Default for Bike {
    fn default() -> Self {
        Self::new(BikeStats::default())
    }
}

impl Bike {
    pub fn new(base_stats: BikeStats) -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            grounded: true,
            heading: Vec3::Z,
            rotation_deg: 0.0,
            pending_force: Vec3::ZERO,
            stats: base_stats,
            base_stats,
            boost: BoostState::default(),
            color: Color::WHITE,
        }
    }

    pub fn initialize(&mut self, position: Vec3, heading: Vec3, color: Color) {
        self.position = position;
        self.velocity = Vec3::ZERO;
        self.pending_force = Vec3::ZERO;
        self.grounded = true;
        self.boost = BoostState::default();
        self.color = color;
        self.heading = horizontal_direction(heading).unwrap_or(Vec3::Z);
        self.rotation_deg = yaw_degrees(self.heading);
    }

    pub fn accelerate(&mut self, amount: f32) {
        if amount <= MIN_THROTTLE {
            return;
        }
        self.pending_force += self.heading * amount.min(1.0) * self.stats.acceleration;
    }

    pub fn brake(&mut self, amount: f32) {
        let speed = self.speed();
        if amount <= 0.0 || speed <= MIN_BRAKE_SPEED {
            return;
        }
        let against_motion = -self.velocity / speed;
        self.pending_force += against_motion * amount.min(1.0) * self.stats.brake_force;
    }

    /// Rotates heading and velocity together about +Y. Positive `direction` turns toward +X
    /// when heading along +Z.
    pub fn turn(&mut self, direction: f32, tick_seconds: f32) {
        let speed = self.speed();
        if direction.abs() < MIN_TURN_INPUT || speed < MIN_TURN_SPEED {
            return;
        }

        let speed_factor = (speed / self.stats.max_speed).min(1.0);
        let turn_amount_deg = direction.clamp(-1.0, 1.0)
            * self.stats.turn_rate
            * speed_factor
            * self.stats.handling
            * tick_seconds;
        let angle = turn_amount_deg.to_radians();

        self.heading = rotate_about_y(self.heading, angle);
        self.velocity = rotate_about_y(self.velocity, angle);
        self.rotation_deg = yaw_degrees(self.heading);
    }

    pub fn apply_force(&mut self, force: Vec3) {
        self.pending_force += force;
    }

    pub fn apply_upgrade(&mut self, kind: UpgradeKind, level: u32) {
        self.stats = self.stats.with_upgrade(&self.base_stats, kind, level);
        info!("Applied {} upgrade level {level}.", kind.label());
    }

    pub fn apply_speed_boost(&mut self, multiplier: f32, duration_s: f32) {
        if duration_s <= 0.0 {
            return;
        }
        self.boost = BoostState {
            active: true,
            multiplier: multiplier.max(1.0),
            remaining_s: duration_s,
        };
    }

    pub fn launch(&mut self, vertical_speed: f32) -> bool {
        if !self.grounded || vertical_speed <= 0.0 {
            return false;
        }
        self.velocity.y = vertical_speed;
        self.grounded = false;
        true
    }

    pub fn update(&mut self, dt: f32) {
        self.velocity += self.pending_force * dt;

        let limit = self.effective_max_speed();
        let speed = self.velocity.length();
        if speed > limit && speed > 0.0 {
            self.velocity *= limit / speed;
        }

        self.position += self.velocity * dt;
        self.pending_force = Vec3::ZERO;

        if self.speed() > HEADING_ALIGN_MIN_SPEED {
            if let Some(travel) = horizontal_direction(self.velocity) {
                let blended = self.heading.lerp(travel, HEADING_SMOOTHING);
                self.heading = horizontal_direction(blended).unwrap_or(self.heading);
                self.rotation_deg = yaw_degrees(self.heading);
            }
        }

        if self.boost.active {
            self.boost.remaining_s -= dt;
            if self.boost.remaining_s <= 0.0 {
                self.boost = BoostState::default();
            }
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn heading(&self) -> Vec3 {
        self.heading
    }

    pub fn rotation_deg(&self) -> f32 {
        self.rotation_deg
    }

    #[cfg(test)]
    pub fn pending_force(&self) -> Vec3 {
        self.pending_force
    }

    pub fn stats(&self) -> &BikeStats {
        &self.stats
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_boosted(&self) -> bool {
        self.boost.active
    }

    pub fn boost_remaining(&self) -> f32 {
        self.boost.remaining_s
    }

    pub fn effective_max_speed(&self) -> f32 {
        self.stats.max_speed * self.boost.multiplier
    }

    pub fn snapshot(&self) -> VehicleState {
        VehicleState {
            position: self.position,
            velocity: self.velocity,
            heading: self.heading,
            rotation_deg: self.rotation_deg,
            speed: self.speed(),
            max_speed: self.effective_max_speed(),
            grounded: self.grounded,
            boosted: self.boost.active,
        }
    }
}

pub fn horizontal_direction(v: Vec3) -> Option<Vec3> {
    let flat = Vec3::new(v.x, 0.0, v.z);
    let length = flat.length();
    (length > MIN_DIRECTION_LENGTH).then(|| flat / length)
}

fn rotate_about_y(v: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(v.x * cos + v.z * sin, v.y, -v.x * sin + v.z * cos)
}

fn yaw_degrees(heading: Vec3) -> f32 {
    heading.x.atan2(heading.z).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn moving_bike(velocity: Vec3) -> Bike {
        let mut bike = Bike::default();
        bike.initialize(Vec3::new(0.0, 0.5, 0.0), Vec3::Z, Color::WHITE);
        bike.velocity = velocity;
        bike
    }

    #[test]
    fn accelerate_adds_force_along_heading() {
        let mut bike = moving_bike(Vec3::ZERO);
        bike.accelerate(0.5);

        let expected = Vec3::Z * 0.5 * bike.stats().acceleration;
        assert!((bike.pending_force() - expected).length() < 1e-5);
    }

    #[test]
    fn non_positive_throttle_is_ignored() {
        let mut bike = moving_bike(Vec3::ZERO);
        bike.accelerate(0.0);
        bike.accelerate(-1.0);

        assert_eq!(bike.pending_force(), Vec3::ZERO);
    }

    #[test]
    fn brake_opposes_velocity_and_needs_motion() {
        let mut idle = moving_bike(Vec3::new(0.0, 0.0, 0.05));
        idle.brake(1.0);
        assert_eq!(idle.pending_force(), Vec3::ZERO);

        let mut rolling = moving_bike(Vec3::new(10.0, 0.0, 0.0));
        rolling.brake(1.0);
        let force = rolling.pending_force();
        assert!(force.x < 0.0);
        assert!((force.length() - rolling.stats().brake_force).abs() < 1e-4);
    }

    #[test]
    fn speed_never_exceeds_max_after_update() {
        let mut bike = moving_bike(Vec3::ZERO);
        for _ in 0..600 {
            bike.accelerate(1.0);
            bike.apply_force(Vec3::Z * 500.0);
            bike.update(DT);
            assert!(bike.speed() <= bike.stats().max_speed + 1e-3);
        }
        assert!((bike.speed() - bike.stats().max_speed).abs() < 1e-3);
    }

    #[test]
    fn boost_raises_cap_and_expires() {
        let mut bike = moving_bike(Vec3::Z * 50.0);
        bike.apply_speed_boost(1.5, 0.5);

        for _ in 0..20 {
            bike.apply_force(Vec3::Z * 5_000.0);
            bike.update(DT);
            assert!(bike.speed() <= 75.0 + 1e-3);
        }
        assert!(bike.speed() > 50.0);
        assert!(bike.is_boosted());

        for _ in 0..20 {
            bike.update(DT);
        }
        assert!(!bike.is_boosted());
        assert!((bike.effective_max_speed() - bike.stats().max_speed).abs() < 1e-5);

        bike.update(DT);
        assert!(bike.speed() <= bike.stats().max_speed + 1e-3);
    }

    #[test]
    fn turn_is_noop_for_tiny_input() {
        let mut bike = moving_bike(Vec3::Z * 20.0);
        bike.turn(0.005, DT);

        assert_eq!(bike.heading(), Vec3::Z);
        assert_eq!(bike.velocity, Vec3::Z * 20.0);
    }

    #[test]
    fn turn_is_noop_when_nearly_stationary() {
        let mut bike = moving_bike(Vec3::Z * 0.5);
        bike.turn(1.0, DT);

        assert_eq!(bike.heading(), Vec3::Z);
        assert_eq!(bike.velocity, Vec3::Z * 0.5);
    }

    #[test]
    fn turn_rotates_heading_and_velocity_together() {
        let mut bike = moving_bike(Vec3::Z * 50.0);
        bike.turn(1.0, 0.1);

        let expected_deg = bike.stats().turn_rate * 0.1;
        assert!((bike.rotation_deg() - expected_deg).abs() < 1e-3);
        assert!(bike.heading().x > 0.0);
        assert!((bike.velocity.normalize() - bike.heading()).length() < 1e-5);
        assert!((bike.speed() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn turn_scales_with_speed_fraction() {
        let mut slow = moving_bike(Vec3::Z * 10.0);
        let mut fast = moving_bike(Vec3::Z * 40.0);
        slow.turn(-1.0, 0.1);
        fast.turn(-1.0, 0.1);

        assert!(slow.rotation_deg() < 0.0);
        assert!((fast.rotation_deg() / slow.rotation_deg() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn update_resets_force_and_moves_position() {
        let mut bike = moving_bike(Vec3::ZERO);
        bike.accelerate(1.0);
        bike.update(0.5);

        assert_eq!(bike.pending_force(), Vec3::ZERO);
        assert!(bike.position.z > 0.5 - 1e-6);
        assert!(bike.velocity.z > 0.0);
    }

    #[test]
    fn heading_drifts_toward_velocity() {
        let mut bike = moving_bike(Vec3::X * 10.0);
        bike.update(DT);

        assert!(bike.heading().x > 0.0);
        assert!(bike.heading().z > 0.0);
        assert!((bike.heading().length() - 1.0).abs() < 1e-5);
        assert!(bike.rotation_deg() > 0.0 && bike.rotation_deg() < 90.0);
    }

    #[test]
    fn initialize_keeps_upgrades_but_resets_motion() {
        let mut bike = moving_bike(Vec3::Z * 30.0);
        bike.apply_upgrade(UpgradeKind::Speed, 1);
        bike.apply_speed_boost(1.5, 2.0);
        bike.initialize(Vec3::new(5.0, 0.5, 5.0), Vec3::new(-3.0, 0.0, 0.0), Color::BLACK);

        assert_eq!(bike.velocity, Vec3::ZERO);
        assert!(!bike.is_boosted());
        assert_eq!(bike.heading(), Vec3::NEG_X);
        assert!((bike.stats().max_speed - 55.0).abs() < 1e-4);
    }

    #[test]
    fn launch_only_from_ground() {
        let mut bike = moving_bike(Vec3::Z * 10.0);
        assert!(bike.launch(8.0));
        assert!(!bike.grounded);
        assert!(!bike.launch(8.0));
        assert_eq!(bike.velocity.y, 8.0);
    }
}
