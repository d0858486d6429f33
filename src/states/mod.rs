use crate::gameplay::race::LevelManager;
use crate::gameplay::track::LEVEL_COUNT;
use bevy::app::AppExit;
use bevy::prelude::*;

const CAMERA_HEIGHT: f32 = 260.0;
const LEVEL_SELECT_KEYS: [(KeyCode, u32); LEVEL_COUNT as usize] = [
    (KeyCode::Digit1, 1),
    (KeyCode::Digit2, 2),
    (KeyCode::Digit3, 3),
    (KeyCode::Digit4, 4),
];

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    InRace,
    Pause,
    Results,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(
                Update,
                boot_to_in_race
                    .run_if(in_state(GameState::Boot))
                    .run_if(resource_exists::<LevelManager>),
            )
            .add_systems(OnEnter(GameState::InRace), enter_in_race)
            .add_systems(Update, in_race_controls.run_if(in_state(GameState::InRace)))
            .add_systems(OnEnter(GameState::Pause), enter_pause)
            .add_systems(
                Update,
                pause_controls
                    .run_if(in_state(GameState::Pause))
                    .run_if(resource_exists::<LevelManager>),
            )
            .add_systems(OnEnter(GameState::Results), enter_results)
            .add_systems(OnExit(GameState::Results), cleanup_results_screen)
            .add_systems(
                Update,
                results_controls
                    .run_if(in_state(GameState::Results))
                    .run_if(resource_exists::<LevelManager>),
            );
    }
}

#[derive(Component)]
struct ResultsScreenRoot;

/// Top-down view with +Z pointing up the screen.
fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, CAMERA_HEIGHT, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
    ));
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_in_race(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::InRace);
}

fn enter_in_race() {
    info!("Entered state: InRace");
}

fn in_race_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Pause);
    }
}

fn enter_pause() {
    info!("Entered state: Pause");
}

fn pause_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut manager: ResMut<LevelManager>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::InRace);
    }

    if keyboard.just_pressed(KeyCode::KeyR) {
        manager.restart_race();
        next_state.set(GameState::InRace);
    }
}

fn enter_results(mut commands: Commands, manager: Res<LevelManager>) {
    let human_won = manager.winner().map(|winner| winner.id()) == manager.human_id();
    let title = if human_won { "VICTORY" } else { "RESULTS" };

    let mut summary_text = format!(
        "Level {} finished in {:.2}s\n\n",
        manager.current_level(),
        manager.race_time()
    );
    for player in manager.standings() {
        let stats = player.stats();
        let best_lap = if stats.has_best_lap() {
            format!("{:.2}s", stats.best_lap_time)
        } else {
            "--".to_string()
        };
        summary_text.push_str(&format!(
            "{rank}. {name:<12} best lap {best_lap:>8} | {points:>4} pts | {wins} wins / {played} races\n",
            rank = player.progress().rank,
            name = player.name(),
            points = stats.points,
            wins = stats.races_won,
            played = stats.races_played,
        ));
    }

    let next_level = manager.current_level() + 1;
    if human_won && manager.is_level_unlocked(next_level) {
        summary_text.push_str(&format!("\nLevel {next_level} unlocked!\n"));
    }
    let unlocked: Vec<String> = (1..=LEVEL_COUNT)
        .filter(|level| manager.is_level_unlocked(*level))
        .map(|level| level.to_string())
        .collect();
    summary_text.push_str(&format!(
        "\nSpace - Race Again\n\
N - Next Level\n\
1-{LEVEL_COUNT} - Select Level (unlocked: {})\n\
Q - Quit",
        unlocked.join(", ")
    ));

    commands
        .spawn((
            Name::new("ResultsOverlay"),
            ResultsScreenRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.01, 0.02, 0.03, 0.90)),
            ZIndex(300),
        ))
        .with_children(|parent| {
            parent
                .spawn((
                    Node {
                        width: Val::Percent(64.0),
                        max_width: Val::Px(860.0),
                        min_width: Val::Px(480.0),
                        flex_direction: FlexDirection::Column,
                        row_gap: Val::Px(10.0),
                        padding: UiRect::all(Val::Px(16.0)),
                        border: UiRect::all(Val::Px(1.0)),
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.08, 0.10, 0.13, 0.96)),
                    BorderColor::all(Color::srgba(0.56, 0.62, 0.68, 0.92)),
                ))
                .with_children(|panel| {
                    panel.spawn((
                        Text::new(title),
                        TextFont {
                            font_size: 52.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.94, 0.97, 1.00)),
                    ));
                    panel.spawn((
                        Text::new(summary_text),
                        TextFont {
                            font_size: 20.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.90, 0.94, 0.98)),
                    ));
                });
        });

    info!("Entered state: Results");
}

fn cleanup_results_screen(
    mut commands: Commands,
    results_screen_query: Query<Entity, With<ResultsScreenRoot>>,
) {
    for entity in &results_screen_query {
        commands.entity(entity).try_despawn();
    }
}

fn results_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut manager: ResMut<LevelManager>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: MessageWriter<AppExit>,
) {
    let requested_level = if keyboard.just_pressed(KeyCode::Space) {
        Some(manager.current_level())
    } else if keyboard.just_pressed(KeyCode::KeyN) {
        Some(manager.current_level() + 1)
    } else {
        LEVEL_SELECT_KEYS
            .iter()
            .find(|(key, _)| keyboard.just_pressed(*key))
            .map(|(_, level)| *level)
    };

    if let Some(level) = requested_level {
        if manager.is_level_unlocked(level) {
            manager.load_level(level);
            next_state.set(GameState::InRace);
        } else {
            warn!("Level {level} is locked; win level {} first.", level.saturating_sub(1));
        }
    }

    if keyboard.just_pressed(KeyCode::KeyQ) {
        exit.write(AppExit::Success);
    }
}
