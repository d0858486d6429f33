mod obstacle;

pub use obstacle::{Obstacle, ObstacleBehavior};

use bevy::prelude::*;
use std::f32::consts::TAU;

pub const GRID_SLOT_COUNT: usize = 5;
pub const LEVEL_COUNT: u32 = 4;
const SPAWN_HEIGHT: f32 = 0.5;
const CHECKPOINT_HEIGHT: f32 = 0.5;
const GRID_OFFSETS: [(f32, f32); GRID_SLOT_COUNT] =
    [(-5.0, 0.0), (0.0, 0.0), (5.0, 0.0), (-2.5, -5.0), (2.5, -5.0)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub position: Vec3,
    pub radius: f32,
    pub index: usize,
    pub active: bool,
}

impl Checkpoint {
    pub fn is_passed_by(&self, vehicle_position: Vec3, vehicle_radius: f32) -> bool {
        self.active && vehicle_position.distance(self.position) < self.radius + vehicle_radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnSlot {
    pub position: Vec3,
    pub heading: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLayout {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl TrackLayout {
    pub const ALL: [TrackLayout; 4] = [
        TrackLayout::Beginner,
        TrackLayout::Intermediate,
        TrackLayout::Advanced,
        TrackLayout::Expert,
    ];

    pub fn from_level_id(level_id: u32) -> Option<Self> {
        match level_id {
            1 => Some(Self::Beginner),
            2 => Some(Self::Intermediate),
            3 => Some(Self::Advanced),
            4 => Some(Self::Expert),
            _ => None,
        }
    }

    pub fn level_id(self) -> u32 {
        match self {
            Self::Beginner => 1,
            Self::Intermediate => 2,
            Self::Advanced => 3,
            Self::Expert => 4,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Beginner => "Beginner Circuit",
            Self::Intermediate => "Intermediate Track",
            Self::Advanced => "Advanced Track",
            Self::Expert => "Expert Octagon",
        }
    }

    pub fn build(self) -> Track {
        let track = match self {
            Self::Beginner => beginner_track(),
            Self::Intermediate => intermediate_track(),
            Self::Advanced => advanced_track(),
            Self::Expert => expert_track(),
        };
        info!(
            "Built track `{}` with {} checkpoints and {} obstacles.",
            track.name(),
            track.checkpoint_count(),
            track.obstacles().len()
        );
        track
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    difficulty_tier: u8,
    required_laps: u32,
    spawn_slots: Vec<SpawnSlot>,
    checkpoints: Vec<Checkpoint>,
    obstacles: Vec<Obstacle>,
}

impl Track {
    pub fn new(name: impl Into<String>, difficulty_tier: u8, required_laps: u32) -> Self {
        let mut track = Self {
            name: name.into(),
            difficulty_tier: difficulty_tier.clamp(1, LEVEL_COUNT as u8),
            required_laps: required_laps.max(1),
            spawn_slots: Vec::new(),
            checkpoints: Vec::new(),
            obstacles: Vec::new(),
        };
        track.set_spawn(Vec3::new(0.0, SPAWN_HEIGHT, 0.0), Vec3::Z);
        track
    }

    pub fn set_spawn(&mut self, position: Vec3, heading: Vec3) -> &mut Self {
        let forward = Vec3::new(heading.x, 0.0, heading.z).normalize_or(Vec3::Z);
        let lateral = Vec3::new(forward.z, 0.0, -forward.x);

        self.spawn_slots = GRID_OFFSETS
            .iter()
            .map(|(side, back)| SpawnSlot {
                position: position + lateral * *side + forward * *back,
                heading: forward,
            })
            .collect();
        self
    }

    pub fn add_checkpoint(&mut self, x: f32, z: f32, radius: f32) -> &mut Self {
        let index = self.checkpoints.len();
        self.checkpoints.push(Checkpoint {
            position: Vec3::new(x, CHECKPOINT_HEIGHT, z),
            radius,
            index,
            active: true,
        });
        self
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> &mut Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn update(&mut self, dt: f32) {
        for obstacle in &mut self.obstacles {
            obstacle.update(dt);
        }
    }

    pub fn check_checkpoint(&self, index: usize, position: Vec3, vehicle_radius: f32) -> bool {
        self.checkpoints
            .get(index)
            .is_some_and(|checkpoint| checkpoint.is_passed_by(position, vehicle_radius))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn difficulty_tier(&self) -> u8 {
        self.difficulty_tier
    }

    pub fn required_laps(&self) -> u32 {
        self.required_laps
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn checkpoint(&self, index: usize) -> Option<&Checkpoint> {
        self.checkpoints.get(index)
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn spawn_slots(&self) -> &[SpawnSlot] {
        &self.spawn_slots
    }

    /// Grid slots wrap when more racers than slots are requested.
    pub fn spawn_slot(&self, slot: usize) -> SpawnSlot {
        self.spawn_slots[slot % self.spawn_slots.len()]
    }
}

fn beginner_track() -> Track {
    let mut track = Track::new(TrackLayout::Beginner.display_name(), 1, 1);
    track.set_spawn(Vec3::new(0.0, SPAWN_HEIGHT, -80.0), Vec3::Z);

    for step in 0..7 {
        track.add_checkpoint(0.0, -60.0 + step as f32 * 20.0, 15.0);
    }
    track.add_checkpoint(0.0, 80.0, 20.0);

    for (x, z) in [(15.0, -30.0), (-15.0, -10.0), (12.0, 10.0), (-12.0, 30.0)] {
        track.add_obstacle(Obstacle::barrier(Vec3::new(x, 1.0, z), 3.0));
    }
    track
        .add_obstacle(Obstacle::barrier(Vec3::new(18.0, 1.0, 55.0), 4.0))
        .add_obstacle(Obstacle::barrier(Vec3::new(-18.0, 1.0, 55.0), 4.0))
        .add_obstacle(Obstacle::new(
            Vec3::new(22.0, 0.5, 30.0),
            Vec3::new(6.0, 1.0, 4.0),
            ObstacleBehavior::SpeedBoost {
                multiplier: 1.3,
                duration_s: 1.5,
            },
        ));
    track
}

fn intermediate_track() -> Track {
    let mut track = Track::new(TrackLayout::Intermediate.display_name(), 2, 3);
    track.set_spawn(Vec3::new(0.0, SPAWN_HEIGHT, -25.0), Vec3::Z);

    for (x, z) in [
        (0.0, 25.0),
        (25.0, 15.0),
        (25.0, -15.0),
        (0.0, -25.0),
        (-25.0, -15.0),
        (-25.0, 15.0),
    ] {
        track.add_checkpoint(x, z, 7.0);
    }

    track
        .add_obstacle(Obstacle::barrier(Vec3::new(12.0, 1.0, 8.0), 2.0))
        .add_obstacle(Obstacle::barrier(Vec3::new(-12.0, 1.0, -8.0), 2.0))
        .add_obstacle(Obstacle::new(
            Vec3::new(13.0, 1.0, 0.0),
            Vec3::new(3.0, 1.0, 3.0),
            ObstacleBehavior::MovingPlatform {
                direction: Vec3::X,
                speed: 2.0,
                amplitude: 5.0,
            },
        ))
        .add_obstacle(Obstacle::new(
            Vec3::new(-13.0, 0.5, 6.0),
            Vec3::new(6.0, 1.0, 6.0),
            ObstacleBehavior::SlowZone { factor: 0.97 },
        ));
    track
}

fn advanced_track() -> Track {
    let mut track = Track::new(TrackLayout::Advanced.display_name(), 3, 3);
    track.set_spawn(Vec3::new(0.0, SPAWN_HEIGHT, -30.0), Vec3::Z);

    for (x, z) in [
        (0.0, 30.0),
        (30.0, 20.0),
        (30.0, 0.0),
        (0.0, -10.0),
        (-30.0, 0.0),
        (-30.0, 20.0),
        (0.0, 10.0),
    ] {
        track.add_checkpoint(x, z, 6.0);
    }

    // Ring is offset half a step so no barrier sits on the x = 0 straights.
    for i in 0..8 {
        let angle = (i as f32 + 0.5) / 8.0 * TAU;
        track.add_obstacle(Obstacle::barrier(
            Vec3::new(angle.cos() * 20.0, 1.0, angle.sin() * 20.0),
            2.0,
        ));
    }

    track
        .add_obstacle(Obstacle::new(
            Vec3::new(40.0, 0.5, 10.0),
            Vec3::new(5.0, 1.0, 3.0),
            ObstacleBehavior::Ramp { launch_speed: 8.0 },
        ))
        .add_obstacle(Obstacle::new(
            Vec3::new(-40.0, 0.5, 10.0),
            Vec3::new(5.0, 1.0, 3.0),
            ObstacleBehavior::SpeedBoost {
                multiplier: 1.4,
                duration_s: 1.5,
            },
        ));
    track
}

fn expert_track() -> Track {
    let mut track = Track::new(TrackLayout::Expert.display_name(), 4, 3);

    let corners: Vec<Vec2> = (0..8)
        .map(|i| {
            let angle = i as f32 / 8.0 * TAU;
            Vec2::new(angle.sin() * 40.0, angle.cos() * 40.0)
        })
        .collect();
    for corner in &corners {
        track.add_checkpoint(corner.x, corner.y, 5.0);
    }

    let finish = corners[7];
    let first = corners[0];
    let heading = Vec3::new(first.x - finish.x, 0.0, first.y - finish.y);
    track.set_spawn(Vec3::new(finish.x, SPAWN_HEIGHT, finish.y), heading);

    track
        .add_obstacle(Obstacle::barrier(Vec3::new(0.0, 1.0, 0.0), 6.0))
        .add_obstacle(Obstacle::new(
            Vec3::new(41.6, 1.0, -17.2),
            Vec3::new(3.0, 1.0, 3.0),
            ObstacleBehavior::MovingPlatform {
                direction: Vec3::Z,
                speed: 1.5,
                amplitude: 4.0,
            },
        ))
        .add_obstacle(Obstacle::new(
            Vec3::new(-25.9, 0.5, -10.7),
            Vec3::new(5.0, 1.0, 5.0),
            ObstacleBehavior::SlowZone { factor: 0.985 },
        ))
        .add_obstacle(Obstacle::new(
            Vec3::new(10.7, 0.5, 25.9),
            Vec3::new(5.0, 1.0, 5.0),
            ObstacleBehavior::SpeedBoost {
                multiplier: 1.4,
                duration_s: 2.0,
            },
        ));
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;

    #[test]
    fn every_layout_has_contiguous_checkpoints_and_in_bounds_grid() {
        for layout in TrackLayout::ALL {
            let track = layout.build();

            assert!(track.checkpoint_count() > 0, "{}", track.name());
            for (index, checkpoint) in track.checkpoints().iter().enumerate() {
                assert_eq!(checkpoint.index, index);
            }
            assert_eq!(track.spawn_slots().len(), GRID_SLOT_COUNT);
            for slot in track.spawn_slots() {
                assert!(slot.position.x.abs() < 100.0 && slot.position.z.abs() < 100.0);
                assert!((slot.heading.length() - 1.0).abs() < 1e-5);
            }
            assert_eq!(track.difficulty_tier() as u32, layout.level_id());
        }
    }

    #[test]
    fn level_ids_map_to_layouts() {
        assert_eq!(TrackLayout::from_level_id(2), Some(TrackLayout::Intermediate));
        assert_eq!(TrackLayout::from_level_id(0), None);
        assert_eq!(TrackLayout::from_level_id(5), None);
    }

    #[test]
    fn checkpoint_passage_includes_vehicle_radius() {
        let mut track = Track::new("test", 1, 1);
        track.add_checkpoint(0.0, 10.0, 5.0);

        assert!(track.check_checkpoint(0, Vec3::new(0.0, 0.5, 3.5), 2.0));
        assert!(!track.check_checkpoint(0, Vec3::new(0.0, 0.5, 2.5), 2.0));
        assert!(!track.check_checkpoint(1, Vec3::new(0.0, 0.5, 10.0), 2.0));
    }

    #[test]
    fn inactive_checkpoint_is_never_passed() {
        let checkpoint = Checkpoint {
            position: Vec3::ZERO,
            radius: 5.0,
            index: 0,
            active: false,
        };

        assert!(!checkpoint.is_passed_by(Vec3::ZERO, 2.0));
    }

    #[test]
    fn grid_slots_follow_spawn_heading() {
        let mut track = Track::new("test", 1, 1);
        track.set_spawn(Vec3::new(0.0, 0.5, 0.0), Vec3::X);

        let back_row = track.spawn_slot(3);
        assert!((back_row.position.x + 5.0).abs() < 1e-5);
        assert_eq!(track.spawn_slot(6), track.spawn_slot(1));
    }

    #[test]
    fn update_only_moves_platforms() {
        let mut track = TrackLayout::Intermediate.build();
        let before: Vec<Vec3> = track.obstacles().iter().map(Obstacle::position).collect();
        track.update(0.25);

        let moved = track
            .obstacles()
            .iter()
            .zip(&before)
            .filter(|(obstacle, start)| obstacle.position() != **start)
            .count();
        assert_eq!(moved, 1);
    }

    fn racing_line(track: &Track) -> Vec<(Vec3, Vec3)> {
        let checkpoints: Vec<Vec3> = track.checkpoints().iter().map(|cp| cp.position).collect();
        let mut segments: Vec<(Vec3, Vec3)> = track
            .spawn_slots()
            .iter()
            .map(|slot| (slot.position, checkpoints[0]))
            .collect();
        segments.extend(checkpoints.windows(2).map(|pair| (pair[0], pair[1])));
        if track.required_laps() > 1 {
            segments.push((checkpoints[checkpoints.len() - 1], checkpoints[0]));
        }
        segments
    }

    #[test]
    fn racing_lines_stay_clear_of_obstacles() {
        let radius = PhysicsConfig::default().vehicle_radius;

        for layout in TrackLayout::ALL {
            let track = layout.build();
            let segments = racing_line(&track);

            for obstacle in track.obstacles() {
                let mut swept = obstacle.clone();
                for _ in 0..160 {
                    for (start, end) in &segments {
                        for step in 0..=80 {
                            let point = start.lerp(*end, step as f32 / 80.0);
                            assert!(
                                !swept.intersects_sphere(point, radius),
                                "{}: {} at {:?} blocks {point:?}",
                                track.name(),
                                swept.behavior().label(),
                                swept.position()
                            );
                        }
                    }
                    swept.update(0.05);
                }
            }
        }
    }
}
