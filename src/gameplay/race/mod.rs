pub mod runtime;

use crate::config::{DifficultyConfig, GameConfig, NitroConfig, PhysicsConfig};
use crate::gameplay::controller::{
    AiController, ControlInput, Controller, HumanController, WorldContext,
};
use crate::gameplay::physics::PhysicsEngine;
use crate::gameplay::player::Player;
use crate::gameplay::track::{Track, TrackLayout, LEVEL_COUNT};
use crate::gameplay::vehicle::{Bike, BikeStats, UpgradeKind};
use bevy::prelude::*;
use std::collections::HashMap;

pub const MIN_AI_OPPONENTS: usize = 1;
pub const MAX_AI_OPPONENTS: usize = 4;
const DEFAULT_LEVEL_ID: u32 = 1;
const GRID_SHUFFLE_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RaceState {
    #[default]
    NotStarted,
    Countdown,
    Racing,
    Finished,
}

impl RaceState {
    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Countdown => "countdown",
            Self::Racing => "racing",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputFrame {
    inputs: HashMap<u32, ControlInput>,
}

impl InputFrame {
    pub fn set(&mut self, player_id: u32, input: ControlInput) {
        self.inputs.insert(player_id, input);
    }

    pub fn get(&self, player_id: u32) -> ControlInput {
        self.inputs
            .get(&player_id)
            .copied()
            .unwrap_or(ControlInput::NEUTRAL)
    }

}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub laps_completed: Vec<(u32, u32, f32)>,
    pub vehicle_contacts: usize,
    pub out_of_bounds_resets: usize,
    pub race_complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerHud {
    pub player_id: u32,
    pub name: String,
    pub speed: f32,
    pub current_lap: u32,
    pub required_laps: u32,
    pub current_lap_time: f32,
    pub best_lap_time: Option<f32>,
    pub rank: usize,
    pub racer_count: usize,
    pub boosted: bool,
    pub nitro_ready: bool,
}

#[derive(Debug, Clone)]
pub struct RaceSettings {
    pub starting_level: u32,
    pub countdown_seconds: f32,
    pub ai_opponents: usize,
    pub ai_difficulty: Option<u8>,
    pub randomize_grid: bool,
    pub grid_seed: u64,
    pub human_name: String,
    pub base_stats: BikeStats,
    pub nitro: NitroConfig,
    pub palette: Vec<Color>,
    pub physics: PhysicsConfig,
    difficulty_tiers: Vec<DifficultyConfig>,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

impl RaceSettings {
    pub fn from_config(config: &GameConfig) -> Self {
        let race = &config.game.race;
        let mut palette: Vec<Color> = config
            .bikes
            .palette
            .iter()
            .map(|[r, g, b]| Color::srgb(*r, *g, *b))
            .collect();
        if palette.is_empty() {
            palette.push(Color::WHITE);
        }

        Self {
            starting_level: race.starting_level,
            countdown_seconds: race.countdown_seconds.max(0.0),
            ai_opponents: race.ai_opponents as usize,
            ai_difficulty: race.ai_difficulty,
            randomize_grid: race.randomize_grid,
            grid_seed: race.grid_seed,
            human_name: race.human_name.clone(),
            base_stats: BikeStats::from(&config.bikes.base_stats),
            nitro: config.bikes.nitro,
            palette,
            physics: config.physics.physics,
            difficulty_tiers: (1..=LEVEL_COUNT as u8)
                .map(|tier| config.difficulty_for_tier(tier))
                .collect(),
        }
    }

    pub fn difficulty_for_tier(&self, tier: u8) -> DifficultyConfig {
        self.difficulty_tiers
            .iter()
            .find(|row| row.tier == tier)
            .cloned()
            .unwrap_or_else(|| DifficultyConfig::builtin(tier))
    }
}

/// One simulation step over a running race. Order: obstacle animation, per-player control and
/// integration, checkpoint passage, collisions, standings, completion.
pub fn simulate_tick(
    track: &mut Track,
    players: &mut [Player],
    physics: &PhysicsEngine,
    inputs: &InputFrame,
    dt: f32,
) -> TickReport {
    let mut report = TickReport::default();

    track.update(dt);

    for player in players.iter_mut() {
        let world = WorldContext {
            next_checkpoint: track
                .checkpoint(player.progress().checkpoints_passed)
                .map(|checkpoint| checkpoint.position),
            external: inputs.get(player.id()),
            tick_seconds: dt,
        };
        player.update(dt, &world);
        if physics.apply_physics(player.bike_mut(), dt) {
            report.out_of_bounds_resets += 1;
        }
    }

    let checkpoint_count = track.checkpoint_count();
    let radius = physics.config().vehicle_radius;
    for player in players.iter_mut() {
        let next = player.progress().checkpoints_passed;
        if !track.check_checkpoint(next, player.bike().position, radius) {
            continue;
        }

        debug!("{} passed checkpoint {next}.", player.name());
        if let Some(lap_time) = player.advance_checkpoint(checkpoint_count) {
            let finished_lap = player.progress().current_lap - 1;
            info!(
                "{} completed lap {finished_lap} in {lap_time:.2}s.",
                player.name()
            );
            report
                .laps_completed
                .push((player.id(), finished_lap, lap_time));
        }
    }

    report.vehicle_contacts =
        physics.resolve_all_vehicle_collisions(players.iter_mut().map(Player::bike_mut));
    for player in players.iter_mut() {
        for obstacle in track.obstacles() {
            let contact = physics.resolve_obstacle_collision(player.bike_mut(), obstacle);
            if let Some(contact) = contact {
                debug!(
                    "{} touched a {} ({contact:?}).",
                    player.name(),
                    obstacle.behavior().label()
                );
            }
        }
    }

    update_standings(players);

    let required_laps = track.required_laps();
    report.race_complete = players
        .iter()
        .any(|player| player.progress().current_lap > required_laps);
    report
}

/// Player indices ordered by lap, then checkpoints in the current lap. Ties keep slot order.
pub fn compute_standings(players: &[Player]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..players.len()).collect();
    order.sort_by(|a, b| {
        let a = players[*a].progress();
        let b = players[*b].progress();
        b.current_lap
            .cmp(&a.current_lap)
            .then(b.checkpoints_passed.cmp(&a.checkpoints_passed))
    });
    order
}

pub fn update_standings(players: &mut [Player]) {
    for (position, index) in compute_standings(players).into_iter().enumerate() {
        players[index].progress_mut().rank = position + 1;
    }
}

#[derive(Resource)]
pub struct LevelManager {
    settings: RaceSettings,
    physics: PhysicsEngine,
    track: Option<Track>,
    players: Vec<Player>,
    state: RaceState,
    paused: bool,
    countdown_remaining: f32,
    race_time: f32,
    current_level: u32,
    unlocked_levels: [bool; LEVEL_COUNT as usize],
    human_id: Option<u32>,
    winner_id: Option<u32>,
    grid_rng_state: u64,
    next_player_id: u32,
}

impl Default for LevelManager {
    fn default() -> Self {
        Self::new(RaceSettings::default())
    }
}

impl LevelManager {
    pub fn new(settings: RaceSettings) -> Self {
        let mut unlocked_levels = [false; LEVEL_COUNT as usize];
        unlocked_levels[0] = true;

        Self {
            physics: PhysicsEngine::new(&settings.physics),
            grid_rng_state: settings.grid_seed ^ GRID_SHUFFLE_SALT,
            current_level: DEFAULT_LEVEL_ID,
            settings,
            track: None,
            players: Vec::new(),
            state: RaceState::NotStarted,
            paused: false,
            countdown_remaining: 0.0,
            race_time: 0.0,
            unlocked_levels,
            human_id: None,
            winner_id: None,
            next_player_id: 0,
        }
    }

    pub fn initialize(&mut self, human_name: &str, ai_count: usize) {
        self.players.clear();
        self.human_id = None;
        self.winner_id = None;
        self.next_player_id = 0;

        self.add_human(human_name);
        let ai_count = ai_count.clamp(MIN_AI_OPPONENTS, MAX_AI_OPPONENTS);
        for index in 0..ai_count {
            let id = self.next_player_id;
            let controller: Box<dyn Controller> = match self.settings.ai_difficulty {
                Some(tier) => Box::new(AiController::pinned(
                    self.settings.difficulty_for_tier(tier),
                    u64::from(id),
                )),
                None => Box::new(AiController::new(
                    self.settings.difficulty_for_tier(1),
                    u64::from(id),
                )),
            };
            self.add_player(format!("AI {}", index + 1), controller);
        }

        info!(
            "Initialized race with {} racers ({} AI).",
            self.players.len(),
            ai_count
        );
        self.load_level(self.settings.starting_level);
    }

    pub fn add_human(&mut self, name: &str) -> u32 {
        let id = self.add_player(name, Box::new(HumanController));
        self.human_id = Some(id);
        id
    }

    pub fn add_player(&mut self, name: impl Into<String>, controller: Box<dyn Controller>) -> u32 {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let mut player = Player::new(
            id,
            name,
            Bike::new(self.settings.base_stats),
            controller,
            self.settings.nitro,
        );
        let index = self.players.len();
        if let Some(track) = &self.track {
            let difficulty = self.settings.difficulty_for_tier(track.difficulty_tier());
            player.prepare_for_track(&difficulty);
            let slot = track.spawn_slot(index);
            player.place_on_grid(index, slot.position, slot.heading, self.color_for(index));
        }
        self.players.push(player);
        id
    }

    /// Loads a built-in level. Unknown ids fall back to level 1. Returns the level loaded.
    pub fn load_level(&mut self, level_id: u32) -> u32 {
        let layout = match TrackLayout::from_level_id(level_id) {
            Some(layout) => layout,
            None => {
                warn!("Unknown level id {level_id}; loading level {DEFAULT_LEVEL_ID} instead.");
                TrackLayout::Beginner
            }
        };
        self.load_track(layout.build(), layout.level_id());
        layout.level_id()
    }

    pub fn load_track(&mut self, track: Track, level_id: u32) {
        let difficulty = self.settings.difficulty_for_tier(track.difficulty_tier());
        let slots = self.grid_order();

        for (index, (player, slot)) in self.players.iter_mut().zip(slots).enumerate() {
            let spawn = track.spawn_slot(slot);
            let color = self.settings.palette[index % self.settings.palette.len()];
            player.prepare_for_track(&difficulty);
            player.place_on_grid(slot, spawn.position, spawn.heading, color);
            player.reset_race();
        }

        info!(
            "Loaded level {level_id}: `{}` ({} laps, tier {}).",
            track.name(),
            track.required_laps(),
            track.difficulty_tier()
        );
        self.track = Some(track);
        self.current_level = level_id;
        self.state = RaceState::NotStarted;
        self.paused = false;
        self.countdown_remaining = 0.0;
        self.race_time = 0.0;
        self.winner_id = None;
    }

    pub fn start_race(&mut self) {
        if self.track.is_none() || self.players.is_empty() {
            warn!("Cannot start a race without a loaded track and at least one racer.");
            return;
        }
        if self.state != RaceState::NotStarted {
            warn!(
                "Ignoring race start while {}; reload the level first.",
                self.state.label()
            );
            return;
        }

        for player in &mut self.players {
            player.reset_race();
        }
        self.countdown_remaining = self.settings.countdown_seconds;
        self.race_time = 0.0;
        self.winner_id = None;
        self.paused = false;
        self.state = RaceState::Countdown;
        info!(
            "Race countdown started ({:.1}s).",
            self.settings.countdown_seconds
        );
    }

    pub fn restart_race(&mut self) {
        self.load_level(self.current_level);
        self.start_race();
    }

    pub fn update(&mut self, dt: f32, inputs: &InputFrame) -> Option<TickReport> {
        if self.paused || dt <= 0.0 {
            return None;
        }

        match self.state {
            RaceState::Countdown => {
                self.countdown_remaining -= dt;
                if self.countdown_remaining <= 0.0 {
                    self.countdown_remaining = 0.0;
                    self.state = RaceState::Racing;
                    info!("Race started.");
                }
                None
            }
            RaceState::Racing => {
                let track = self.track.as_mut()?;
                self.race_time += dt;
                let report = simulate_tick(track, &mut self.players, &self.physics, inputs, dt);
                if report.race_complete {
                    self.finish_race();
                }
                Some(report)
            }
            RaceState::NotStarted | RaceState::Finished => None,
        }
    }

    fn finish_race(&mut self) {
        let order = compute_standings(&self.players);
        for (position, index) in order.iter().enumerate() {
            self.players[*index].finish_race(position + 1);
        }

        self.state = RaceState::Finished;
        self.winner_id = order.first().map(|index| self.players[*index].id());

        if let Some(winner) = self.winner() {
            info!(
                "Race finished in {:.2}s. Winner: {} ({} points).",
                self.race_time,
                winner.name(),
                winner.stats().points
            );
        }

        if self.winner_id.is_some() && self.winner_id == self.human_id {
            self.unlock_level(self.current_level + 1);
        }
    }

    pub fn pause_race(&mut self) {
        if matches!(self.state, RaceState::Countdown | RaceState::Racing) && !self.paused {
            self.paused = true;
            info!("Race paused.");
        }
    }

    pub fn resume_race(&mut self) {
        if self.paused {
            self.paused = false;
            info!("Race resumed.");
        }
    }

    /// Swaps in new tuning. Physics applies immediately; roster and grid settings apply on the
    /// next level load.
    pub fn apply_settings(&mut self, settings: RaceSettings) {
        self.physics = PhysicsEngine::new(&settings.physics);
        self.settings = settings;
        info!("Race settings updated.");
    }

    pub fn unlock_level(&mut self, level_id: u32) {
        let Some(slot) = level_slot(level_id) else {
            return;
        };
        if !self.unlocked_levels[slot] {
            self.unlocked_levels[slot] = true;
            info!("Unlocked level {level_id}.");
        }
    }

    pub fn is_level_unlocked(&self, level_id: u32) -> bool {
        level_slot(level_id).is_some_and(|slot| self.unlocked_levels[slot])
    }

    pub fn apply_upgrade(&mut self, player_id: u32, kind: UpgradeKind) -> Option<u32> {
        self.player_mut(player_id)?.apply_upgrade(kind)
    }

    pub fn hud(&self, player_id: u32) -> Option<PlayerHud> {
        let player = self.player(player_id)?;
        let required_laps = self.track.as_ref()?.required_laps();
        let progress = player.progress();

        Some(PlayerHud {
            player_id,
            name: player.name().to_string(),
            speed: player.bike().speed(),
            current_lap: progress.current_lap.min(required_laps),
            required_laps,
            current_lap_time: progress.current_lap_time,
            best_lap_time: player
                .stats()
                .has_best_lap()
                .then_some(player.stats().best_lap_time),
            rank: progress.rank,
            racer_count: self.players.len(),
            boosted: player.bike().is_boosted(),
            nitro_ready: player.nitro_ready(),
        })
    }

    pub fn standings(&self) -> Vec<&Player> {
        compute_standings(&self.players)
            .into_iter()
            .map(|index| &self.players[index])
            .collect()
    }

    pub fn player(&self, player_id: u32) -> Option<&Player> {
        self.players.iter().find(|player| player.id() == player_id)
    }

    pub fn player_mut(&mut self, player_id: u32) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|player| player.id() == player_id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn physics(&self) -> &PhysicsEngine {
        &self.physics
    }

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn countdown_remaining(&self) -> f32 {
        self.countdown_remaining
    }

    pub fn race_time(&self) -> f32 {
        self.race_time
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    pub fn human_id(&self) -> Option<u32> {
        self.human_id
    }

    pub fn winner(&self) -> Option<&Player> {
        self.player(self.winner_id?)
    }

    fn color_for(&self, index: usize) -> Color {
        self.settings.palette[index % self.settings.palette.len()]
    }

    fn grid_order(&mut self) -> Vec<usize> {
        let mut slots: Vec<usize> = (0..self.players.len()).collect();
        if self.settings.randomize_grid {
            for i in (1..slots.len()).rev() {
                let j = (next_random_u64(&mut self.grid_rng_state) % (i as u64 + 1)) as usize;
                slots.swap(i, j);
            }
        }
        slots
    }
}

fn level_slot(level_id: u32) -> Option<usize> {
    (1..=LEVEL_COUNT)
        .contains(&level_id)
        .then(|| (level_id - 1) as usize)
}

fn next_random_u64(seed: &mut u64) -> u64 {
    *seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1);
    *seed >> 33
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::track::{Obstacle, ObstacleBehavior};
    use crate::gameplay::vehicle::VehicleState;

    const DT: f32 = 1.0 / 60.0;

    struct Parked;

    impl Controller for Parked {
        fn decide(&mut self, _vehicle: &VehicleState, _world: &WorldContext) -> ControlInput {
            ControlInput::NEUTRAL
        }

        fn label(&self) -> &str {
            "parked"
        }
    }

    fn settings() -> RaceSettings {
        RaceSettings {
            countdown_seconds: 0.0,
            randomize_grid: false,
            ..RaceSettings::default()
        }
    }

    fn square_track(required_laps: u32) -> Track {
        let mut track = Track::new("Square", 2, required_laps);
        track.set_spawn(Vec3::new(0.0, 0.5, -10.0), Vec3::Z);
        track
            .add_checkpoint(0.0, 40.0, 6.0)
            .add_checkpoint(40.0, 40.0, 6.0)
            .add_checkpoint(40.0, 0.0, 6.0)
            .add_checkpoint(0.0, 0.0, 6.0);
        track
    }

    fn start_racing(manager: &mut LevelManager) {
        manager.start_race();
        manager.update(DT, &InputFrame::default());
        assert_eq!(manager.state(), RaceState::Racing);
    }

    #[test]
    fn initialize_clamps_ai_count_and_loads_starting_level() {
        let mut manager = LevelManager::new(settings());
        manager.initialize("Rider", 9);

        assert_eq!(manager.players().len(), 1 + MAX_AI_OPPONENTS);
        assert_eq!(manager.current_level(), 1);
        assert_eq!(manager.state(), RaceState::NotStarted);
        assert_eq!(manager.human_id(), Some(0));

        manager.initialize("Rider", 0);
        assert_eq!(manager.players().len(), 2);
    }

    #[test]
    fn unknown_level_falls_back_to_first_track() {
        let mut manager = LevelManager::new(settings());
        manager.initialize("Rider", 1);

        assert_eq!(manager.load_level(99), 1);
        let track = manager.track().expect("track should be loaded");
        assert_eq!(track.name(), TrackLayout::Beginner.display_name());
    }

    #[test]
    fn state_machine_runs_countdown_then_racing() {
        let mut manager = LevelManager::new(RaceSettings {
            countdown_seconds: 0.5,
            ..settings()
        });
        manager.initialize("Rider", 1);
        let inputs = InputFrame::default();

        assert_eq!(manager.update(DT, &inputs), None);
        manager.start_race();
        assert_eq!(manager.state(), RaceState::Countdown);

        for _ in 0..29 {
            manager.update(DT, &inputs);
        }
        assert_eq!(manager.state(), RaceState::Countdown);
        assert_eq!(manager.race_time(), 0.0);

        for _ in 0..3 {
            manager.update(DT, &inputs);
        }
        assert_eq!(manager.state(), RaceState::Racing);
        assert!(manager.race_time() > 0.0);
    }

    #[test]
    fn pause_freezes_the_race() {
        let mut manager = LevelManager::new(settings());
        manager.initialize("Rider", 1);
        start_racing(&mut manager);

        manager.pause_race();
        let clock = manager.race_time();
        assert_eq!(manager.update(DT, &InputFrame::default()), None);
        assert_eq!(manager.race_time(), clock);

        manager.resume_race();
        manager.update(DT, &InputFrame::default());
        assert!(manager.race_time() > clock);
    }

    #[test]
    fn final_checkpoint_finishes_race_and_awards_points() {
        let mut manager = LevelManager::new(settings());
        let rider = manager.add_human("Rider");
        let rival = manager.add_player("Rival", Box::new(Parked));
        manager.load_track(square_track(1), 1);
        start_racing(&mut manager);

        let finish = manager
            .track()
            .and_then(|track| track.checkpoint(3))
            .map(|checkpoint| checkpoint.position)
            .expect("square track has four checkpoints");
        let player = manager.player_mut(rider).expect("rider exists");
        player.progress_mut().checkpoints_passed = 3;
        player.bike_mut().position = finish;

        let report = manager
            .update(DT, &InputFrame::default())
            .expect("racing tick");

        assert!(report.race_complete);
        assert_eq!(report.laps_completed.len(), 1);
        assert_eq!(manager.state(), RaceState::Finished);
        assert_eq!(manager.winner().map(Player::id), Some(rider));

        let winner = manager.player(rider).expect("rider exists");
        assert_eq!(winner.progress().current_lap, 2);
        assert_eq!(winner.stats().points, 100);
        assert_eq!(winner.stats().races_won, 1);
        let loser = manager.player(rival).expect("rival exists");
        assert_eq!(loser.stats().points, 50);
        assert_eq!(loser.progress().rank, 2);
        assert!(manager.is_level_unlocked(2));
        assert!(!manager.is_level_unlocked(3));

        assert_eq!(manager.update(DT, &InputFrame::default()), None);
    }

    #[test]
    fn ai_win_does_not_unlock_levels() {
        let mut manager = LevelManager::new(settings());
        manager.add_human("Rider");
        let rival = manager.add_player("Rival", Box::new(Parked));
        manager.load_track(square_track(1), 1);
        start_racing(&mut manager);

        let finish = manager
            .track()
            .and_then(|track| track.checkpoint(3))
            .map(|checkpoint| checkpoint.position)
            .expect("square track has four checkpoints");
        let player = manager.player_mut(rival).expect("rival exists");
        player.progress_mut().checkpoints_passed = 3;
        player.bike_mut().position = finish;
        manager.update(DT, &InputFrame::default());

        assert_eq!(manager.winner().map(Player::id), Some(rival));
        assert!(!manager.is_level_unlocked(2));
    }

    #[test]
    fn checkpoint_progress_advances_one_step_per_tick() {
        let mut track = Track::new("Stacked", 1, 3);
        track
            .add_checkpoint(0.0, 0.0, 10.0)
            .add_checkpoint(0.0, 1.0, 10.0)
            .add_checkpoint(0.0, 2.0, 10.0);
        let mut manager = LevelManager::new(settings());
        let id = manager.add_player("Solo", Box::new(Parked));
        manager.load_track(track, 1);
        start_racing(&mut manager);

        let mut seen = Vec::new();
        for _ in 0..4 {
            manager.update(DT, &InputFrame::default());
            let progress = manager.player(id).expect("solo exists").progress();
            seen.push((progress.current_lap, progress.checkpoints_passed));
        }

        assert_eq!(seen, vec![(1, 1), (1, 2), (2, 0), (2, 1)]);
    }

    #[test]
    fn standings_rank_lap_before_checkpoints() {
        let mut manager = LevelManager::new(settings());
        let behind = manager.add_player("Behind", Box::new(Parked));
        let ahead = manager.add_player("Ahead", Box::new(Parked));
        manager.load_track(square_track(3), 1);

        let progress = manager.player_mut(behind).expect("exists").progress_mut();
        progress.current_lap = 1;
        progress.checkpoints_passed = 5;
        let progress = manager.player_mut(ahead).expect("exists").progress_mut();
        progress.current_lap = 2;
        progress.checkpoints_passed = 0;

        let order: Vec<u32> = manager.standings().iter().map(|player| player.id()).collect();
        assert_eq!(order, vec![ahead, behind]);
    }

    #[test]
    fn human_input_is_routed_by_player_id() {
        let mut manager = LevelManager::new(settings());
        let rider = manager.add_human("Rider");
        let rival = manager.add_player("Rival", Box::new(Parked));
        manager.load_track(square_track(1), 1);
        start_racing(&mut manager);

        let mut inputs = InputFrame::default();
        inputs.set(
            rider,
            ControlInput {
                throttle: 1.0,
                ..ControlInput::NEUTRAL
            },
        );
        for _ in 0..30 {
            manager.update(DT, &inputs);
        }

        assert!(manager.player(rider).expect("rider").bike().speed() > 5.0);
        assert_eq!(manager.player(rival).expect("rival").bike().speed(), 0.0);
        let hud = manager.hud(rider).expect("hud for rider");
        assert_eq!(hud.required_laps, 1);
        assert_eq!(hud.racer_count, 2);
        assert_eq!(hud.best_lap_time, None);
        assert!(manager.hud(42).is_none());
    }

    #[test]
    fn ai_completes_a_lap_of_an_open_square() {
        let mut manager = LevelManager::new(settings());
        let ai = manager.add_player(
            "AI",
            Box::new(AiController::new(DifficultyConfig::builtin(2), 3)),
        );
        manager.load_track(square_track(1), 1);
        start_racing(&mut manager);

        for _ in 0..3_600 {
            manager.update(DT, &InputFrame::default());
            if manager.state() == RaceState::Finished {
                break;
            }
        }

        assert_eq!(manager.state(), RaceState::Finished);
        assert_eq!(manager.winner().map(Player::id), Some(ai));
    }

    #[test]
    fn ai_reaches_first_beginner_checkpoint() {
        let mut manager = LevelManager::new(settings());
        let ai = manager.add_player(
            "AI",
            Box::new(AiController::new(DifficultyConfig::builtin(1), 3)),
        );
        manager.load_level(1);
        start_racing(&mut manager);

        for _ in 0..600 {
            manager.update(DT, &InputFrame::default());
        }

        let progress = manager.player(ai).expect("ai exists").progress();
        assert!(progress.checkpoints_passed > 0 || progress.current_lap > 1);
    }

    #[test]
    fn randomized_grid_is_a_seeded_permutation() {
        let randomized = RaceSettings {
            randomize_grid: true,
            grid_seed: 11,
            ..settings()
        };
        let mut first = LevelManager::new(randomized.clone());
        let mut second = LevelManager::new(randomized);
        first.initialize("Rider", 4);
        second.initialize("Rider", 4);

        let slots: Vec<usize> = first.players().iter().map(Player::grid_slot).collect();
        let replay: Vec<usize> = second.players().iter().map(Player::grid_slot).collect();
        assert_eq!(slots, replay);

        let mut sorted = slots.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn restart_reloads_current_level_and_counts_down() {
        let mut manager = LevelManager::new(RaceSettings {
            countdown_seconds: 3.0,
            ..settings()
        });
        manager.initialize("Rider", 2);
        manager.load_level(3);
        manager.start_race();
        manager.restart_race();

        assert_eq!(manager.current_level(), 3);
        assert_eq!(manager.state(), RaceState::Countdown);
        assert_eq!(manager.countdown_remaining(), 3.0);
    }

    #[test]
    fn unlocks_ignore_unknown_levels() {
        let mut manager = LevelManager::default();
        assert!(manager.is_level_unlocked(1));
        assert!(!manager.is_level_unlocked(4));

        manager.unlock_level(4);
        manager.unlock_level(5);
        assert!(manager.is_level_unlocked(4));
        assert!(!manager.is_level_unlocked(5));
        assert!(!manager.is_level_unlocked(0));
    }

    fn tick_inside(behavior: ObstacleBehavior) -> (Vec3, Vec3) {
        let mut track = Track::new("Contact", 1, 1);
        track.set_spawn(Vec3::new(0.0, 0.5, -60.0), Vec3::Z);
        track.add_checkpoint(0.0, 60.0, 5.0);
        track.add_obstacle(Obstacle::new(
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(6.0, 1.0, 6.0),
            behavior,
        ));

        let mut player = Player::new(
            0,
            "Parked",
            Bike::default(),
            Box::new(Parked),
            NitroConfig::default(),
        );
        player.place_on_grid(0, Vec3::new(1.0, 0.5, -1.0), Vec3::Z, Color::WHITE);
        player.bike_mut().velocity = Vec3::Z * 20.0;
        let mut players = vec![player];

        simulate_tick(
            &mut track,
            &mut players,
            &PhysicsEngine::default(),
            &InputFrame::default(),
            DT,
        );
        let bike = players[0].bike();
        (bike.pending_force(), bike.velocity)
    }

    #[test]
    fn tick_inside_barrier_pushes_out_and_damps() {
        let (force, velocity) = tick_inside(ObstacleBehavior::Solid);
        let physics = PhysicsConfig::default();
        let expected = 20.0 * physics.ground_friction * physics.air_drag * 0.6;

        assert!(force.x > 0.0 && force.z < 0.0, "force {force:?}");
        assert!((velocity.z - expected).abs() < 1e-3);
    }

    #[test]
    fn tick_inside_slow_zone_applies_effect_then_pushes_and_damps() {
        let (force, velocity) = tick_inside(ObstacleBehavior::SlowZone { factor: 0.5 });
        let physics = PhysicsConfig::default();
        let expected = 20.0 * physics.ground_friction * physics.air_drag * 0.5 * 0.6;

        assert!(force.x > 0.0 && force.z < 0.0, "force {force:?}");
        assert!((velocity.z - expected).abs() < 1e-3);
    }
}
