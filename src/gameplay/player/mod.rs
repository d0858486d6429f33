use crate::config::{DifficultyConfig, NitroConfig};
use crate::gameplay::controller::{Controller, WorldContext};
use crate::gameplay::vehicle::{Bike, UpgradeKind};
use bevy::prelude::*;

pub const BEST_LAP_SENTINEL: f32 = 999_999.0;
pub const WIN_POINTS: u32 = 100;
pub const FINISH_POINTS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceProgress {
    pub current_lap: u32,
    /// Index of the next checkpoint to reach in the current lap.
    pub checkpoints_passed: usize,
    pub current_lap_time: f32,
    pub total_race_time: f32,
    pub rank: usize,
    pub race_finished: bool,
}

impl Default for RaceProgress {
    fn default() -> Self {
        Self {
            current_lap: 1,
            checkpoints_passed: 0,
            current_lap_time: 0.0,
            total_race_time: 0.0,
            rank: 1,
            race_finished: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerStats {
    pub races_won: u32,
    pub races_played: u32,
    pub best_lap_time: f32,
    pub points: u32,
    pub upgrades_unlocked: u32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            races_won: 0,
            races_played: 0,
            best_lap_time: BEST_LAP_SENTINEL,
            points: 0,
            upgrades_unlocked: 0,
        }
    }
}

impl PlayerStats {
    pub fn has_best_lap(&self) -> bool {
        self.best_lap_time < BEST_LAP_SENTINEL
    }
}

pub struct Player {
    id: u32,
    name: String,
    bike: Bike,
    controller: Box<dyn Controller>,
    progress: RaceProgress,
    stats: PlayerStats,
    nitro: NitroConfig,
    nitro_cooldown_s: f32,
    upgrade_levels: [u32; 3],
    grid_slot: usize,
}

impl Player {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        bike: Bike,
        controller: Box<dyn Controller>,
        nitro: NitroConfig,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bike,
            controller,
            progress: RaceProgress::default(),
            stats: PlayerStats::default(),
            nitro,
            nitro_cooldown_s: 0.0,
            upgrade_levels: [0; 3],
            grid_slot: 0,
        }
    }

    pub fn update(&mut self, dt: f32, world: &WorldContext) {
        let input = self.controller.decide(&self.bike.snapshot(), world).clamped();

        self.bike.accelerate(input.throttle);
        self.bike.brake(input.brake);
        self.bike.turn(input.turn, dt);

        self.nitro_cooldown_s = (self.nitro_cooldown_s - dt).max(0.0);
        if input.nitro && self.nitro_ready() {
            self.bike
                .apply_speed_boost(self.nitro.multiplier, self.nitro.duration_seconds);
            self.nitro_cooldown_s = self.nitro.duration_seconds + self.nitro.cooldown_seconds;
        }

        self.bike.update(dt);

        self.progress.current_lap_time += dt;
        self.progress.total_race_time += dt;
    }

    /// Marks the expected checkpoint as passed. Returns the lap time when that completed a lap.
    pub fn advance_checkpoint(&mut self, checkpoint_count: usize) -> Option<f32> {
        if checkpoint_count == 0 {
            return None;
        }

        self.progress.checkpoints_passed += 1;
        if self.progress.checkpoints_passed < checkpoint_count {
            return None;
        }

        let lap_time = self.progress.current_lap_time;
        if lap_time < self.stats.best_lap_time {
            self.stats.best_lap_time = lap_time;
        }
        self.progress.current_lap_time = 0.0;
        self.progress.checkpoints_passed = 0;
        self.progress.current_lap += 1;
        Some(lap_time)
    }

    pub fn reset_race(&mut self) {
        self.progress = RaceProgress::default();
        self.nitro_cooldown_s = 0.0;
    }

    pub fn finish_race(&mut self, rank: usize) {
        self.progress.rank = rank;
        self.progress.race_finished = true;
        self.stats.races_played += 1;

        if rank == 1 {
            self.stats.races_won += 1;
            self.stats.points += WIN_POINTS;
            self.stats.upgrades_unlocked += 1;
        } else {
            self.stats.points += FINISH_POINTS;
        }
    }

    pub fn apply_upgrade(&mut self, kind: UpgradeKind) -> Option<u32> {
        let spent: u32 = self.upgrade_levels.iter().sum();
        if spent >= self.stats.upgrades_unlocked {
            return None;
        }

        let slot = &mut self.upgrade_levels[upgrade_slot(kind)];
        *slot += 1;
        let level = *slot;
        self.bike.apply_upgrade(kind, level);
        Some(level)
    }

    pub fn prepare_for_track(&mut self, difficulty: &DifficultyConfig) {
        self.controller.prepare_for_track(difficulty);
    }

    pub fn place_on_grid(&mut self, slot: usize, position: Vec3, heading: Vec3, color: Color) {
        self.grid_slot = slot;
        self.bike.initialize(position, heading, color);
    }

    pub fn nitro_ready(&self) -> bool {
        self.nitro_cooldown_s <= 0.0
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controller_label(&self) -> &str {
        self.controller.label()
    }

    pub fn bike(&self) -> &Bike {
        &self.bike
    }

    pub fn bike_mut(&mut self) -> &mut Bike {
        &mut self.bike
    }

    pub fn progress(&self) -> &RaceProgress {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut RaceProgress {
        &mut self.progress
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn upgrade_level(&self, kind: UpgradeKind) -> u32 {
        self.upgrade_levels[upgrade_slot(kind)]
    }

    pub fn grid_slot(&self) -> usize {
        self.grid_slot
    }

    pub fn nitro_cooldown(&self) -> f32 {
        self.nitro_cooldown_s
    }
}

fn upgrade_slot(kind: UpgradeKind) -> usize {
    match kind {
        UpgradeKind::Speed => 0,
        UpgradeKind::Acceleration => 1,
        UpgradeKind::Handling => 2,
    }
}
