use super::{InputFrame, LevelManager, RaceSettings, RaceState};
use crate::config::GameConfig;
use crate::gameplay::controller::ControlInput;
use crate::gameplay::track::ObstacleBehavior;
use crate::states::GameState;
use bevy::prelude::*;

const GROUND_GRID_HALF_EXTENT: f32 = 100.0;
const GROUND_GRID_STEP: f32 = 20.0;
const HEADING_MARKER_LENGTH: f32 = 4.0;
const GROUND_GRID_COLOR: Color = Color::srgba(0.35, 0.38, 0.42, 0.35);
const BARRIER_COLOR: Color = Color::srgb(0.62, 0.64, 0.68);
const PLATFORM_COLOR: Color = Color::srgb(1.0, 0.63, 0.0);
const SLOW_ZONE_COLOR: Color = Color::srgb(0.55, 0.35, 0.17);
const BOOST_COLOR: Color = Color::srgb(0.0, 0.89, 0.99);
const RAMP_COLOR: Color = Color::srgb(0.91, 0.91, 0.30);
const BOOSTED_RING_COLOR: Color = Color::srgb(1.0, 0.95, 0.4);

pub struct RaceRuntimePlugin;

impl Plugin for RaceRuntimePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RaceInputBindings>()
            .init_resource::<RaceInputs>()
            .add_systems(Startup, setup_level_manager)
            .add_systems(
                Update,
                apply_config_reload
                    .run_if(resource_exists::<LevelManager>)
                    .run_if(resource_exists_and_changed::<GameConfig>),
            )
            .add_systems(OnEnter(GameState::InRace), begin_or_resume_race)
            .add_systems(OnEnter(GameState::Pause), pause_race)
            .add_systems(
                Update,
                (read_race_input, draw_race_world)
                    .chain()
                    .run_if(in_state(GameState::InRace))
                    .run_if(resource_exists::<LevelManager>),
            )
            .add_systems(
                FixedUpdate,
                step_race
                    .run_if(in_state(GameState::InRace))
                    .run_if(resource_exists::<LevelManager>),
            );
    }
}

/// Keyboard layout for the human racer. The camera looks down with +Z up the screen, so a
/// positive turn (toward +X) reads as a left turn.
#[derive(Resource, Debug, Clone)]
struct RaceInputBindings {
    throttle: Vec<KeyCode>,
    brake: Vec<KeyCode>,
    turn_left: Vec<KeyCode>,
    turn_right: Vec<KeyCode>,
    nitro: Vec<KeyCode>,
}

impl Default for RaceInputBindings {
    fn default() -> Self {
        Self {
            throttle: vec![KeyCode::KeyW, KeyCode::ArrowUp],
            brake: vec![KeyCode::KeyS, KeyCode::ArrowDown],
            turn_left: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
            turn_right: vec![KeyCode::KeyD, KeyCode::ArrowRight],
            nitro: vec![KeyCode::Space],
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct RaceInputs(pub InputFrame);

fn setup_level_manager(mut commands: Commands, config: Option<Res<GameConfig>>) {
    let config = config.map(|config| (*config).clone()).unwrap_or_default();
    let settings = RaceSettings::from_config(&config);
    let human_name = settings.human_name.clone();
    let ai_opponents = settings.ai_opponents;

    let mut manager = LevelManager::new(settings);
    manager.initialize(&human_name, ai_opponents);

    commands.insert_resource(Time::<Fixed>::from_hz(config.game.app.fixed_timestep_hz));
    commands.insert_resource(manager);
}

fn apply_config_reload(
    config: Res<GameConfig>,
    mut manager: ResMut<LevelManager>,
    mut fixed_time: ResMut<Time<Fixed>>,
) {
    if config.is_added() {
        return;
    }

    manager.apply_settings(RaceSettings::from_config(&config));
    fixed_time.set_timestep_hz(config.game.app.fixed_timestep_hz);
}

fn begin_or_resume_race(mut manager: ResMut<LevelManager>) {
    if manager.is_paused() {
        manager.resume_race();
    } else if manager.state() == RaceState::NotStarted {
        manager.start_race();
    }
}

fn pause_race(mut manager: ResMut<LevelManager>) {
    manager.pause_race();
}

fn read_race_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<RaceInputBindings>,
    manager: Res<LevelManager>,
    mut inputs: ResMut<RaceInputs>,
) {
    let Some(human_id) = manager.human_id() else {
        return;
    };

    let input = ControlInput {
        throttle: key_axis(&keyboard, &bindings.throttle),
        brake: key_axis(&keyboard, &bindings.brake),
        turn: key_axis(&keyboard, &bindings.turn_left) - key_axis(&keyboard, &bindings.turn_right),
        nitro: bindings.nitro.iter().any(|key| keyboard.pressed(*key)),
    };
    inputs.0.set(human_id, input);
}

fn key_axis(keyboard: &ButtonInput<KeyCode>, keys: &[KeyCode]) -> f32 {
    if keys.iter().any(|key| keyboard.pressed(*key)) {
        1.0
    } else {
        0.0
    }
}

fn step_race(
    time: Res<Time>,
    inputs: Res<RaceInputs>,
    mut manager: ResMut<LevelManager>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    manager.update(time.delta_secs(), &inputs.0);

    if manager.state() == RaceState::Finished {
        next_state.set(GameState::Results);
    }
}

fn draw_race_world(manager: Res<LevelManager>, mut gizmos: Gizmos) {
    let Some(track) = manager.track() else {
        return;
    };

    let mut offset = -GROUND_GRID_HALF_EXTENT;
    while offset <= GROUND_GRID_HALF_EXTENT {
        gizmos.line(
            Vec3::new(offset, 0.0, -GROUND_GRID_HALF_EXTENT),
            Vec3::new(offset, 0.0, GROUND_GRID_HALF_EXTENT),
            GROUND_GRID_COLOR,
        );
        gizmos.line(
            Vec3::new(-GROUND_GRID_HALF_EXTENT, 0.0, offset),
            Vec3::new(GROUND_GRID_HALF_EXTENT, 0.0, offset),
            GROUND_GRID_COLOR,
        );
        offset += GROUND_GRID_STEP;
    }

    for obstacle in track.obstacles() {
        let color = match obstacle.behavior() {
            ObstacleBehavior::Solid => BARRIER_COLOR,
            ObstacleBehavior::MovingPlatform { .. } => PLATFORM_COLOR,
            ObstacleBehavior::SlowZone { .. } => SLOW_ZONE_COLOR,
            ObstacleBehavior::SpeedBoost { .. } => BOOST_COLOR,
            ObstacleBehavior::Ramp { .. } => RAMP_COLOR,
        };
        gizmos.cuboid(
            Transform::from_translation(obstacle.position()).with_scale(obstacle.size()),
            color,
        );
    }

    let radius = manager.physics().config().vehicle_radius;
    for player in manager.players() {
        let bike = player.bike();
        gizmos.sphere(
            Isometry3d::from_translation(bike.position),
            radius,
            bike.color(),
        );
        gizmos.arrow(
            bike.position,
            bike.position + bike.heading() * HEADING_MARKER_LENGTH,
            bike.color(),
        );
        if bike.is_boosted() {
            gizmos.sphere(
                Isometry3d::from_translation(bike.position),
                radius * 1.3,
                BOOSTED_RING_COLOR,
            );
        }
    }
}
