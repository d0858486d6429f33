use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";
pub const DIFFICULTY_TIER_COUNT: u8 = 4;
pub const MAX_AI_OPPONENTS: u32 = 4;

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    let config = match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(config) => {
            log_config_summary("Loaded", &config);
            config
        }
        Err(error) => {
            error!("Failed to load configuration from `{CONFIG_DIR}`, using built-in defaults: {error}");
            GameConfig::default()
        }
    };

    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");
    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: level {}, {} AI opponents, {} difficulty tiers, {} bike colors.",
        config.game.race.starting_level,
        config.game.race.ai_opponents,
        config.difficulty_by_id.len(),
        config.bikes.palette.len()
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub physics: PhysicsFile,
    pub bikes: BikesFile,
    pub ai: AiFile,
    pub difficulty_by_id: HashMap<String, DifficultyConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let ai = AiFile::default();
        let difficulty_by_id = ai
            .difficulty
            .iter()
            .map(|tier| (tier.id.clone(), tier.clone()))
            .collect();

        Self {
            game: GameFile::default(),
            physics: PhysicsFile::default(),
            bikes: BikesFile::default(),
            ai,
            difficulty_by_id,
        }
    }
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let physics: PhysicsFile = read_toml(&config_dir.join("physics.toml"))?;
        let bikes: BikesFile = read_toml(&config_dir.join("bikes.toml"))?;
        let ai: AiFile = read_toml(&config_dir.join("ai.toml"))?;

        let config = Self {
            difficulty_by_id: to_index("ai.toml::difficulty", &ai.difficulty)?,
            game,
            physics,
            bikes,
            ai,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn difficulty_for_tier(&self, tier: u8) -> DifficultyConfig {
        let tier = tier.clamp(1, DIFFICULTY_TIER_COUNT);
        self.ai
            .difficulty
            .iter()
            .find(|row| row.tier == tier)
            .cloned()
            .unwrap_or_else(|| DifficultyConfig::builtin(tier))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let app = &self.game.app;
        if app.fixed_timestep_hz <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::app.fixed_timestep_hz must be > 0".to_string(),
            ));
        }

        let race = &self.game.race;
        if race.countdown_seconds < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::race.countdown_seconds must be >= 0".to_string(),
            ));
        }
        if !(1..=MAX_AI_OPPONENTS).contains(&race.ai_opponents) {
            return Err(ConfigError::Validation(format!(
                "game.toml::race.ai_opponents must be in [1, {MAX_AI_OPPONENTS}], got {}",
                race.ai_opponents
            )));
        }
        if let Some(tier) = race.ai_difficulty {
            if !(1..=DIFFICULTY_TIER_COUNT).contains(&tier) {
                return Err(ConfigError::Validation(format!(
                    "game.toml::race.ai_difficulty `{tier}` is out of range (expected 1-{DIFFICULTY_TIER_COUNT})"
                )));
            }
        }
        if race.human_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "game.toml::race.human_name cannot be empty".to_string(),
            ));
        }

        let physics = &self.physics.physics;
        if physics.gravity < 0.0 {
            return Err(ConfigError::Validation(
                "physics.toml::physics.gravity must be >= 0".to_string(),
            ));
        }
        for (label, value) in [
            ("ground_friction", physics.ground_friction),
            ("air_drag", physics.air_drag),
            ("obstacle_impact_damping", physics.obstacle_impact_damping),
        ] {
            if !(0.0 < value && value <= 1.0) {
                return Err(ConfigError::Validation(format!(
                    "physics.toml::physics.{label} must be in (0, 1]"
                )));
            }
        }
        if !(0.0..=1.0).contains(&physics.restitution) {
            return Err(ConfigError::Validation(
                "physics.toml::physics.restitution must be in [0, 1]".to_string(),
            ));
        }
        if physics.vehicle_radius <= 0.0 {
            return Err(ConfigError::Validation(
                "physics.toml::physics.vehicle_radius must be > 0".to_string(),
            ));
        }
        if physics.world_bound <= 0.0 {
            return Err(ConfigError::Validation(
                "physics.toml::physics.world_bound must be > 0".to_string(),
            ));
        }
        if physics.obstacle_push_force < 0.0 {
            return Err(ConfigError::Validation(
                "physics.toml::physics.obstacle_push_force must be >= 0".to_string(),
            ));
        }

        let stats = &self.bikes.base_stats;
        for (label, value) in [
            ("max_speed", stats.max_speed),
            ("acceleration", stats.acceleration),
            ("turn_rate", stats.turn_rate),
            ("brake_force", stats.brake_force),
            ("handling", stats.handling),
            ("weight", stats.weight),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::base_stats.{label} must be > 0"
                )));
            }
        }
        if self.bikes.nitro.multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "bikes.toml::nitro.multiplier must be >= 1".to_string(),
            ));
        }
        if self.bikes.nitro.duration_seconds <= 0.0 || self.bikes.nitro.cooldown_seconds < 0.0 {
            return Err(ConfigError::Validation(
                "bikes.toml::nitro duration must be > 0 and cooldown >= 0".to_string(),
            ));
        }
        if self.bikes.palette.is_empty() {
            return Err(ConfigError::Validation(
                "bikes.toml::palette must contain at least one color".to_string(),
            ));
        }

        for tier in 1..=DIFFICULTY_TIER_COUNT {
            if !self.ai.difficulty.iter().any(|row| row.tier == tier) {
                return Err(ConfigError::Validation(format!(
                    "ai.toml::difficulty is missing tier {tier}"
                )));
            }
        }
        for (index, row) in self.ai.difficulty.iter().enumerate() {
            if !(1..=DIFFICULTY_TIER_COUNT).contains(&row.tier) {
                return Err(ConfigError::Validation(format!(
                    "ai.toml::difficulty[{index}].tier `{}` is out of range",
                    row.tier
                )));
            }
            if !(0.0..1.0).contains(&row.steer_precision) {
                return Err(ConfigError::Validation(format!(
                    "ai.toml::difficulty[{index}].steer_precision must be in [0, 1)"
                )));
            }
            if !(0.0 < row.accel_multiplier && row.accel_multiplier <= 1.0) {
                return Err(ConfigError::Validation(format!(
                    "ai.toml::difficulty[{index}].accel_multiplier must be in (0, 1]"
                )));
            }
            if !(-1.0..0.9).contains(&row.brake_alignment) {
                return Err(ConfigError::Validation(format!(
                    "ai.toml::difficulty[{index}].brake_alignment must be in [-1, 0.9)"
                )));
            }
            if !(0.0..=1.0).contains(&row.nitro_chance) {
                return Err(ConfigError::Validation(format!(
                    "ai.toml::difficulty[{index}].nitro_chance must be in [0, 1]"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(path, &raw)
}

fn parse_toml<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub race: RaceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub fixed_timestep_hz: f64,
    pub debug_overlay: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fixed_timestep_hz: 60.0,
            debug_overlay: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceConfig {
    pub starting_level: u32,
    pub countdown_seconds: f32,
    pub ai_opponents: u32,
    #[serde(default)]
    pub ai_difficulty: Option<u8>,
    #[serde(default)]
    pub randomize_grid: bool,
    #[serde(default = "default_grid_seed")]
    pub grid_seed: u64,
    #[serde(default = "default_human_name")]
    pub human_name: String,
}

fn default_grid_seed() -> u64 {
    0x5EED_B1CE_0000_0001
}

fn default_human_name() -> String {
    "Player 1".to_string()
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            starting_level: 1,
            countdown_seconds: 3.0,
            ai_opponents: 4,
            ai_difficulty: None,
            randomize_grid: true,
            grid_seed: default_grid_seed(),
            human_name: default_human_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhysicsFile {
    pub physics: PhysicsConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub ground_height: f32,
    pub ground_friction: f32,
    pub air_drag: f32,
    pub world_bound: f32,
    pub vehicle_radius: f32,
    pub restitution: f32,
    pub obstacle_push_force: f32,
    pub obstacle_impact_damping: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            ground_height: 0.5,
            ground_friction: 0.995,
            air_drag: 0.998,
            world_bound: 100.0,
            vehicle_radius: 2.0,
            restitution: 0.5,
            obstacle_push_force: 400.0,
            obstacle_impact_damping: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BikesFile {
    pub base_stats: BaseStatsConfig,
    pub nitro: NitroConfig,
    pub palette: Vec<[f32; 3]>,
}

impl Default for BikesFile {
    fn default() -> Self {
        Self {
            base_stats: BaseStatsConfig::default(),
            nitro: NitroConfig::default(),
            palette: vec![
                [0.90, 0.16, 0.22],
                [0.00, 0.47, 0.95],
                [0.99, 0.78, 0.05],
                [0.30, 0.85, 0.39],
                [0.78, 0.48, 1.00],
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BaseStatsConfig {
    pub max_speed: f32,
    pub acceleration: f32,
    pub turn_rate: f32,
    pub brake_force: f32,
    pub handling: f32,
    pub weight: f32,
}

impl Default for BaseStatsConfig {
    fn default() -> Self {
        Self {
            max_speed: 50.0,
            acceleration: 22.0,
            turn_rate: 150.0,
            brake_force: 32.0,
            handling: 1.0,
            weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NitroConfig {
    pub multiplier: f32,
    pub duration_seconds: f32,
    pub cooldown_seconds: f32,
}

impl Default for NitroConfig {
    fn default() -> Self {
        Self {
            multiplier: 1.5,
            duration_seconds: 2.0,
            cooldown_seconds: 4.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiFile {
    pub difficulty: Vec<DifficultyConfig>,
}

impl Default for AiFile {
    fn default() -> Self {
        Self {
            difficulty: (1..=DIFFICULTY_TIER_COUNT)
                .map(DifficultyConfig::builtin)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DifficultyConfig {
    pub id: String,
    pub tier: u8,
    pub steer_precision: f32,
    pub accel_multiplier: f32,
    pub brake_alignment: f32,
    pub brake_speed: f32,
    pub nitro_chance: f32,
}

impl DifficultyConfig {
    pub fn builtin(tier: u8) -> Self {
        match tier.clamp(1, DIFFICULTY_TIER_COUNT) {
            1 => Self {
                id: "easy".to_string(),
                tier: 1,
                steer_precision: 0.15,
                accel_multiplier: 0.8,
                brake_alignment: 0.30,
                brake_speed: 18.0,
                nitro_chance: 0.002,
            },
            2 => Self {
                id: "medium".to_string(),
                tier: 2,
                steer_precision: 0.08,
                accel_multiplier: 0.9,
                brake_alignment: 0.33,
                brake_speed: 22.0,
                nitro_chance: 0.005,
            },
            3 => Self {
                id: "hard".to_string(),
                tier: 3,
                steer_precision: 0.04,
                accel_multiplier: 0.95,
                brake_alignment: 0.37,
                brake_speed: 26.0,
                nitro_chance: 0.01,
            },
            _ => Self {
                id: "expert".to_string(),
                tier: 4,
                steer_precision: 0.02,
                accel_multiplier: 1.0,
                brake_alignment: 0.40,
                brake_speed: 30.0,
                nitro_chance: 0.02,
            },
        }
    }
}

impl HasId for DifficultyConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
