use crate::config::DifficultyConfig;
use crate::gameplay::vehicle::{horizontal_direction, VehicleState};
use bevy::prelude::*;

const FULL_THROTTLE_ALIGNMENT: f32 = 0.9;
const PARTIAL_THROTTLE_SCALE: f32 = 0.5;
const CORNER_BRAKE: f32 = 0.6;
const CORNER_CREEP_THROTTLE: f32 = 0.3;
const AI_RNG_SEED: u64 = 0xD94A_4B53_9E13_BC87;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlInput {
    pub throttle: f32,
    pub brake: f32,
    /// -1..1, positive turns toward +X when heading along +Z.
    pub turn: f32,
    pub nitro: bool,
}

impl ControlInput {
    pub const NEUTRAL: ControlInput = ControlInput {
        throttle: 0.0,
        brake: 0.0,
        turn: 0.0,
        nitro: false,
    };

    pub fn clamped(self) -> Self {
        Self {
            throttle: finite_or_zero(self.throttle).clamp(0.0, 1.0),
            brake: finite_or_zero(self.brake).clamp(0.0, 1.0),
            turn: finite_or_zero(self.turn).clamp(-1.0, 1.0),
            nitro: self.nitro,
        }
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldContext {
    pub next_checkpoint: Option<Vec3>,
    pub external: ControlInput,
    pub tick_seconds: f32,
}

pub trait Controller: Send + Sync {
    fn decide(&mut self, vehicle: &VehicleState, world: &WorldContext) -> ControlInput;

    fn label(&self) -> &str;

    fn prepare_for_track(&mut self, _difficulty: &DifficultyConfig) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HumanController;

impl Controller for HumanController {
    fn decide(&mut self, _vehicle: &VehicleState, world: &WorldContext) -> ControlInput {
        world.external.clamped()
    }

    fn label(&self) -> &str {
        "human"
    }
}

#[derive(Debug, Clone)]
pub struct AiController {
    difficulty: DifficultyConfig,
    pinned: bool,
    rng_state: u64,
}

impl AiController {
    pub fn new(difficulty: DifficultyConfig, seed: u64) -> Self {
        Self {
            difficulty,
            pinned: false,
            rng_state: AI_RNG_SEED ^ seed,
        }
    }

    pub fn pinned(difficulty: DifficultyConfig, seed: u64) -> Self {
        Self {
            pinned: true,
            ..Self::new(difficulty, seed)
        }
    }

    #[cfg(test)]
    pub fn difficulty(&self) -> &DifficultyConfig {
        &self.difficulty
    }

    fn steer(&self, heading: Vec3, to_target: Vec3, alignment: f32) -> f32 {
        let cross_y = heading.cross(to_target).y;
        if cross_y.abs() > self.difficulty.steer_precision {
            cross_y.signum()
        } else if alignment < 0.0 {
            1.0
        } else {
            0.0
        }
    }

    fn roll_nitro(&mut self) -> bool {
        next_unit_random(&mut self.rng_state) < self.difficulty.nitro_chance
    }
}

impl Controller for AiController {
    fn decide(&mut self, vehicle: &VehicleState, world: &WorldContext) -> ControlInput {
        let Some(target) = world.next_checkpoint else {
            return ControlInput::NEUTRAL;
        };
        let Some(to_target) = horizontal_direction(target - vehicle.position) else {
            return ControlInput::NEUTRAL;
        };

        let heading = vehicle.heading;
        let alignment = heading.dot(to_target);
        let turn = self.steer(heading, to_target, alignment);
        let tuning = &self.difficulty;

        let mut input = ControlInput {
            turn,
            ..ControlInput::NEUTRAL
        };
        if alignment > FULL_THROTTLE_ALIGNMENT {
            input.throttle = tuning.accel_multiplier;
            input.nitro = self.roll_nitro();
        } else if alignment >= tuning.brake_alignment {
            input.throttle = PARTIAL_THROTTLE_SCALE * tuning.accel_multiplier;
        } else if vehicle.speed > tuning.brake_speed {
            input.brake = CORNER_BRAKE;
        } else {
            input.throttle = CORNER_CREEP_THROTTLE;
        }

        input
    }

    fn label(&self) -> &str {
        &self.difficulty.id
    }

    fn prepare_for_track(&mut self, difficulty: &DifficultyConfig) {
        if !self.pinned {
            self.difficulty = difficulty.clone();
        }
    }
}

fn next_unit_random(seed: &mut u64) -> f32 {
    *seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1);
    ((*seed >> 32) as u32) as f32 / u32::MAX as f32
}
