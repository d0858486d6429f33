use crate::config::{GameConfig, PhysicsConfig};
use crate::gameplay::race::runtime::RaceInputs;
use crate::gameplay::race::LevelManager;
use crate::gameplay::track::TrackLayout;
use crate::gameplay::vehicle::UpgradeKind;
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::f32::consts::FRAC_PI_2;
use std::fs;
use std::path::Path;

const CHECKPOINT_COLOR: Color = Color::srgb(0.2, 0.85, 0.35);
const FINISH_COLOR: Color = Color::srgb(0.95, 0.2, 0.2);
const INACTIVE_CHECKPOINT_COLOR: Color = Color::srgba(0.5, 0.5, 0.5, 0.5);
const SOLID_BOUNDS_COLOR: Color = Color::srgba(1.0, 1.0, 1.0, 0.4);
const TRIGGER_BOUNDS_COLOR: Color = Color::srgba(0.4, 0.8, 1.0, 0.4);
const TARGET_LINE_ALPHA: f32 = 0.6;
const GRID_SLOT_COLOR: Color = Color::srgba(0.95, 0.85, 0.3, 0.7);
const GRID_SLOT_RADIUS: f32 = 1.5;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeybindOverlayState>()
            .init_resource::<DebugGizmoState>()
            .init_resource::<RaceInspectorState>()
            .init_resource::<PhysicsTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_debug_panels)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(
                Update,
                (update_debug_overlay_text, draw_debug_gizmos)
                    .run_if(in_state(GameState::InRace))
                    .run_if(resource_exists::<LevelManager>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                (race_inspector_ui, physics_tuning_panel_ui)
                    .run_if(resource_exists::<LevelManager>)
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

#[derive(Resource, Debug, Clone, Default)]
struct KeybindOverlayState {
    visible: bool,
}

#[derive(Resource, Debug, Clone)]
struct DebugGizmoState {
    visible: bool,
}

impl Default for DebugGizmoState {
    fn default() -> Self {
        Self { visible: true }
    }
}

#[derive(Resource, Debug, Clone, Default)]
struct RaceInspectorState {
    visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct PhysicsTuningParams {
    gravity: f32,
    ground_friction: f32,
    air_drag: f32,
    restitution: f32,
    vehicle_radius: f32,
    obstacle_push_force: f32,
    obstacle_impact_damping: f32,
}

impl PhysicsTuningParams {
    fn from_physics(physics: &PhysicsConfig) -> Self {
        Self {
            gravity: physics.gravity,
            ground_friction: physics.ground_friction,
            air_drag: physics.air_drag,
            restitution: physics.restitution,
            vehicle_radius: physics.vehicle_radius,
            obstacle_push_force: physics.obstacle_push_force,
            obstacle_impact_damping: physics.obstacle_impact_damping,
        }
    }

    fn apply_to_physics(&self, physics: &mut PhysicsConfig) {
        physics.gravity = self.gravity;
        physics.ground_friction = self.ground_friction;
        physics.air_drag = self.air_drag;
        physics.restitution = self.restitution;
        physics.vehicle_radius = self.vehicle_radius;
        physics.obstacle_push_force = self.obstacle_push_force;
        physics.obstacle_impact_damping = self.obstacle_impact_damping;
    }
}

#[derive(Resource, Debug, Default)]
struct PhysicsTuningPanelState {
    visible: bool,
    params: Option<PhysicsTuningParams>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    keybind_overlay: Res<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            bottom: Val::Px(12.0),
            ..default()
        },
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            bottom: Val::Px(12.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        if keybind_overlay.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    manager: Res<LevelManager>,
    inputs: Res<RaceInputs>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let human = manager.human_id().and_then(|id| manager.player(id));
    let (position, yaw, speed, grounded, nitro_cooldown, boost_remaining) = human
        .map(|player| {
            let bike = player.bike();
            (
                bike.position,
                bike.rotation_deg(),
                bike.speed(),
                bike.grounded,
                player.nitro_cooldown(),
                bike.boost_remaining(),
            )
        })
        .unwrap_or((Vec3::ZERO, 0.0, 0.0, true, 0.0, 0.0));
    let input = manager
        .human_id()
        .map(|id| inputs.0.get(id))
        .unwrap_or_default();

    *text = Text::new(format!(
        "FPS: {fps:>5.1}\nState: {state}{paused} | Level {level} | Clock {clock:>6.2}s\nPos: ({x:>6.1}, {y:>4.1}, {z:>6.1}) | Yaw {yaw:>6.1} | Speed {speed:>5.1}\nInput: throttle={throttle:.1} brake={brake:.1} turn={turn:+.1} nitro={nitro}\nGrounded: {grounded} | Boost {boost_remaining:.1}s | Nitro cooldown {nitro_cooldown:.1}s",
        state = manager.state().label(),
        paused = if manager.is_paused() { " (paused)" } else { "" },
        level = manager.current_level(),
        clock = manager.race_time(),
        x = position.x,
        y = position.y,
        z = position.z,
        throttle = input.throttle,
        brake = input.brake,
        turn = input.turn,
        nitro = if input.nitro { "yes" } else { "no" },
        grounded = if grounded { "yes" } else { "no" },
    ));
}

fn draw_debug_gizmos(
    manager: Res<LevelManager>,
    state: Res<DebugGizmoState>,
    mut gizmos: Gizmos,
) {
    if !state.visible {
        return;
    }
    let Some(track) = manager.track() else {
        return;
    };

    let flat = Quat::from_rotation_x(FRAC_PI_2);
    let finish_index = track.checkpoint_count().saturating_sub(1);
    for checkpoint in track.checkpoints() {
        let color = if !checkpoint.active {
            INACTIVE_CHECKPOINT_COLOR
        } else if checkpoint.index == finish_index {
            FINISH_COLOR
        } else {
            CHECKPOINT_COLOR
        };
        gizmos.circle(
            Isometry3d::new(checkpoint.position, flat),
            checkpoint.radius,
            color,
        );
    }

    for slot in track.spawn_slots() {
        gizmos.circle(
            Isometry3d::new(slot.position, flat),
            GRID_SLOT_RADIUS,
            GRID_SLOT_COLOR,
        );
        gizmos.line(
            slot.position,
            slot.position + slot.heading * GRID_SLOT_RADIUS * 2.0,
            GRID_SLOT_COLOR,
        );
    }

    for obstacle in track.obstacles() {
        let bounds = obstacle.bounds();
        let color = if obstacle.behavior().is_solid() {
            SOLID_BOUNDS_COLOR
        } else {
            TRIGGER_BOUNDS_COLOR
        };
        gizmos.cuboid(
            Transform::from_translation((bounds.min + bounds.max) * 0.5)
                .with_scale(bounds.max - bounds.min),
            color,
        );
    }

    for player in manager.players() {
        let Some(target) = track.checkpoint(player.progress().checkpoints_passed) else {
            continue;
        };
        gizmos.line(
            player.bike().position,
            target.position,
            player.bike().color().with_alpha(TARGET_LINE_ALPHA),
        );
    }
}

fn toggle_keybind_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyH) {
        state.visible = !state.visible;
        info!(
            "Debug keybind panel {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_keybind_overlay_visibility(
    state: Res<KeybindOverlayState>,
    mut query: Query<&mut Visibility, With<KeybindOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn toggle_debug_panels(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut inspector: ResMut<RaceInspectorState>,
    mut gizmo_state: ResMut<DebugGizmoState>,
    mut tuning: ResMut<PhysicsTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if keyboard.just_pressed(KeyCode::KeyI) {
        inspector.visible = !inspector.visible;
        info!(
            "Race inspector {}.",
            if inspector.visible { "shown" } else { "hidden" }
        );
    }

    if keyboard.just_pressed(KeyCode::KeyG) {
        gizmo_state.visible = !gizmo_state.visible;
        info!(
            "Debug gizmos {}.",
            if gizmo_state.visible { "shown" } else { "hidden" }
        );
    }

    if keyboard.just_pressed(KeyCode::KeyT) {
        tuning.visible = !tuning.visible;
        if tuning.visible {
            if let Some(config) = config {
                tuning.params = Some(PhysicsTuningParams::from_physics(&config.physics.physics));
            }
            info!("Physics tuning panel shown.");
        } else {
            info!("Physics tuning panel hidden.");
        }
    }
}

fn race_inspector_ui(
    mut egui_contexts: EguiContexts,
    mut inspector: ResMut<RaceInspectorState>,
    mut manager: ResMut<LevelManager>,
) {
    if !inspector.visible {
        return;
    }

    let mut window_open = inspector.visible;
    let mut upgrade_clicked = None;

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Race Inspector")
        .open(&mut window_open)
        .resizable(true)
        .default_width(560.0)
        .show(ctx, |ui| {
            let track_name = manager
                .track()
                .map(|track| track.name().to_string())
                .unwrap_or_else(|| "n/a".to_string());
            ui.label(format!(
                "Level {} `{}` | {} | clock {:.2}s | countdown {:.2}s",
                manager.current_level(),
                track_name,
                manager.state().label(),
                manager.race_time(),
                manager.countdown_remaining()
            ));
            let levels: Vec<String> = TrackLayout::ALL
                .iter()
                .map(|layout| {
                    let lock = if manager.is_level_unlocked(layout.level_id()) {
                        ""
                    } else {
                        " (locked)"
                    };
                    format!("{} {}{lock}", layout.level_id(), layout.display_name())
                })
                .collect();
            ui.label(format!("Levels: {}", levels.join(", ")));
            ui.separator();

            egui::Grid::new("race_inspector_standings")
                .striped(true)
                .show(ui, |ui| {
                    for header in [
                        "Rank", "Grid", "Racer", "Driver", "Lap", "CP", "Speed", "Yaw",
                        "Best lap", "Points", "Wins",
                    ] {
                        ui.strong(header);
                    }
                    ui.end_row();

                    for player in manager.standings() {
                        let progress = player.progress();
                        let stats = player.stats();
                        ui.label(progress.rank.to_string());
                        ui.label((player.grid_slot() + 1).to_string());
                        ui.label(player.name());
                        ui.label(player.controller_label());
                        ui.label(progress.current_lap.to_string());
                        ui.label(progress.checkpoints_passed.to_string());
                        ui.label(format!("{:.1}", player.bike().speed()));
                        ui.label(format!("{:.0}", player.bike().rotation_deg()));
                        ui.label(if stats.has_best_lap() {
                            format!("{:.2}s", stats.best_lap_time)
                        } else {
                            "-".to_string()
                        });
                        ui.label(stats.points.to_string());
                        ui.label(stats.races_won.to_string());
                        ui.end_row();
                    }
                });

            let Some(human) = manager.human_id().and_then(|id| manager.player(id)) else {
                return;
            };
            ui.separator();
            let spent: u32 = UpgradeKind::ALL
                .iter()
                .map(|kind| human.upgrade_level(*kind))
                .sum();
            let bike_stats = human.bike().stats();
            ui.label(format!(
                "Bike: max speed {:.1} | accel {:.1} | turn {:.0} deg/s | brake {:.1}",
                bike_stats.max_speed,
                bike_stats.acceleration,
                bike_stats.turn_rate,
                bike_stats.brake_force
            ));
            ui.label(format!(
                "Upgrades earned {} | spent {spent}",
                human.stats().upgrades_unlocked
            ));
            ui.horizontal(|ui| {
                for kind in UpgradeKind::ALL {
                    let label = format!("{} (lv {})", kind.label(), human.upgrade_level(kind));
                    if ui.button(label).clicked() {
                        upgrade_clicked = Some((human.id(), kind));
                    }
                }
            });
        });

    if let Some((player_id, kind)) = upgrade_clicked {
        if manager.apply_upgrade(player_id, kind).is_none() {
            warn!("No earned upgrade levels left to spend on {}.", kind.label());
        }
    }
    inspector.visible = window_open;
}

fn physics_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<PhysicsTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    if panel_state.params.is_none() {
        panel_state.params = Some(PhysicsTuningParams::from_physics(&config.physics.physics));
    }
    let Some(mut params) = panel_state.params.clone() else {
        return;
    };

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut reload_clicked = false;
    let mut save_clicked = false;
    let status = panel_state.status.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Physics Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(520.0)
        .show(ctx, |ui| {
            ui.label("Changes apply to the running race immediately.");
            ui.separator();

            params_changed |= tuning_slider_row(ui, "gravity", &mut params.gravity, 0.0..=40.0, 0.1);
            params_changed |= tuning_slider_row(
                ui,
                "ground_friction",
                &mut params.ground_friction,
                0.9..=1.0,
                0.0005,
            );
            params_changed |=
                tuning_slider_row(ui, "air_drag", &mut params.air_drag, 0.9..=1.0, 0.0005);
            params_changed |= tuning_slider_row(
                ui,
                "restitution",
                &mut params.restitution,
                0.0..=1.0,
                0.01,
            );
            params_changed |= tuning_slider_row(
                ui,
                "vehicle_radius",
                &mut params.vehicle_radius,
                0.5..=5.0,
                0.05,
            );
            params_changed |= tuning_slider_row(
                ui,
                "obstacle_push_force",
                &mut params.obstacle_push_force,
                0.0..=2_000.0,
                1.0,
            );
            params_changed |= tuning_slider_row(
                ui,
                "obstacle_impact_damping",
                &mut params.obstacle_impact_damping,
                0.05..=1.0,
                0.01,
            );

            ui.separator();
            ui.horizontal(|ui| {
                save_clicked = ui.button("Save to physics.toml").clicked();
                reload_clicked = ui.button("Reset from config").clicked();
            });
            if !status.is_empty() {
                ui.label(status);
            }
        });

    panel_state.visible = window_open;

    if reload_clicked {
        panel_state.params = Some(PhysicsTuningParams::from_physics(&config.physics.physics));
        panel_state.status = "Reloaded tuning values from runtime config.".to_string();
        return;
    }

    if params_changed {
        params.apply_to_physics(&mut config.physics.physics);
        panel_state.params = Some(params.clone());
    }

    if save_clicked {
        match persist_physics_tuning_and_reload(&mut config, &params) {
            Ok(message) => {
                panel_state.status = message;
                panel_state.params =
                    Some(PhysicsTuningParams::from_physics(&config.physics.physics));
            }
            Err(error) => panel_state.status = error,
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(value).speed(drag_speed as f64))
            .changed();
    });
    changed
}

fn persist_physics_tuning_and_reload(
    config: &mut GameConfig,
    params: &PhysicsTuningParams,
) -> Result<String, String> {
    let path = Path::new("config").join("physics.toml");
    let original_raw = fs::read_to_string(&path)
        .map_err(|error| format!("Failed reading `{}`: {error}", path.display()))?;
    let mut root: toml::Value = toml::from_str(&original_raw)
        .map_err(|error| format!("Failed parsing `{}`: {error}", path.display()))?;

    write_params_to_toml_value(&mut root, params)?;

    let updated_raw = toml::to_string_pretty(&root)
        .map_err(|error| format!("Failed serializing physics TOML: {error}"))?;
    fs::write(&path, updated_raw)
        .map_err(|error| format!("Failed writing `{}`: {error}", path.display()))?;

    match GameConfig::load_from_dir(Path::new("config")) {
        Ok(new_config) => {
            *config = new_config;
            Ok(format!("Saved tuning to {}.", path.to_string_lossy()))
        }
        Err(error) => {
            let _ = fs::write(&path, original_raw);
            if let Ok(restored) = GameConfig::load_from_dir(Path::new("config")) {
                *config = restored;
            }
            Err(format!(
                "Save failed validation: {error}. Reverted `{}`.",
                path.display()
            ))
        }
    }
}

fn write_params_to_toml_value(
    root: &mut toml::Value,
    params: &PhysicsTuningParams,
) -> Result<(), String> {
    let Some(physics_table) = root.get_mut("physics").and_then(toml::Value::as_table_mut) else {
        return Err("physics.toml: missing or invalid `physics` table".to_string());
    };

    set_toml_float(physics_table, "gravity", params.gravity)?;
    set_toml_float(physics_table, "ground_friction", params.ground_friction)?;
    set_toml_float(physics_table, "air_drag", params.air_drag)?;
    set_toml_float(physics_table, "restitution", params.restitution)?;
    set_toml_float(physics_table, "vehicle_radius", params.vehicle_radius)?;
    set_toml_float(
        physics_table,
        "obstacle_push_force",
        params.obstacle_push_force,
    )?;
    set_toml_float(
        physics_table,
        "obstacle_impact_damping",
        params.obstacle_impact_damping,
    )?;

    Ok(())
}

fn set_toml_float(
    table: &mut toml::map::Map<String, toml::Value>,
    key: &str,
    value: f32,
) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("`{key}` is not a finite number"));
    }

    table.insert(key.to_string(), toml::Value::Float(value as f64));
    Ok(())
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
I - Toggle race inspector\n\
T - Toggle physics tuning\n\
G - Toggle checkpoint gizmos\n\
F5 - Hot-reload config\n\
W / Up - Throttle\n\
S / Down - Brake\n\
A D / Left Right - Steer\n\
Space - Nitro\n\
Esc - Pause / resume\n\
R - Restart (paused)\n\
Space - Results -> race again\n\
N - Results -> next level\n\
1-4 - Results -> pick unlocked level\n\
Q - Quit from results"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_params_round_trip_through_physics_config() {
        let mut physics = PhysicsConfig::default();
        let mut params = PhysicsTuningParams::from_physics(&physics);
        params.restitution = 0.8;
        params.apply_to_physics(&mut physics);

        assert_eq!(physics.restitution, 0.8);
        assert_eq!(PhysicsTuningParams::from_physics(&physics), params);
    }

    #[test]
    fn write_params_updates_physics_table() {
        let mut root: toml::Value =
            toml::from_str("[physics]\ngravity = 9.8\nworld_bound = 100.0\n").expect("valid toml");
        let mut params = PhysicsTuningParams::from_physics(&PhysicsConfig::default());
        params.gravity = 12.5;

        write_params_to_toml_value(&mut root, &params).expect("physics table exists");

        let table = root
            .get("physics")
            .and_then(toml::Value::as_table)
            .expect("physics table");
        assert_eq!(table.get("gravity").and_then(toml::Value::as_float), Some(12.5));
        assert_eq!(
            table.get("world_bound").and_then(toml::Value::as_float),
            Some(100.0)
        );
    }

    #[test]
    fn write_params_requires_physics_table() {
        let mut root: toml::Value = toml::from_str("[other]\nvalue = 1\n").expect("valid toml");
        let params = PhysicsTuningParams::from_physics(&PhysicsConfig::default());

        let error = write_params_to_toml_value(&mut root, &params).expect_err("missing table");
        assert!(error.contains("physics"));
    }

    #[test]
    fn non_finite_tuning_values_are_rejected() {
        let mut table = toml::map::Map::new();

        assert!(set_toml_float(&mut table, "gravity", f32::NAN).is_err());
        assert!(table.is_empty());
    }
}
