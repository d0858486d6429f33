use crate::gameplay::race::{LevelManager, PlayerHud, RaceState};
use crate::states::GameState;
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const HUD_PANEL_BG: Color = Color::srgba(0.06, 0.09, 0.12, 0.86);
const HUD_PANEL_BORDER: Color = Color::srgba(0.58, 0.68, 0.76, 0.92);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);
const HUD_SPEED_BAR_WIDTH_PX: f32 = 260.0;

pub struct GameHudPlugin;

impl Plugin for GameHudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::InRace), spawn_game_hud)
            .add_systems(OnEnter(GameState::Results), cleanup_game_hud)
            .add_systems(
                Update,
                update_game_hud
                    .run_if(in_state(GameState::InRace).or(in_state(GameState::Pause)))
                    .run_if(resource_exists::<LevelManager>),
            );
    }
}

#[derive(Component)]
struct GameHudRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudTextKind {
    Position,
    Lap,
    Speed,
    Nitro,
    Status,
    Standings,
}

#[derive(Component)]
struct HudSpeedFill;

fn spawn_game_hud(mut commands: Commands, existing_hud: Query<Entity, With<GameHudRoot>>) {
    if !existing_hud.is_empty() {
        return;
    }

    commands
        .spawn((
            Name::new("GameHudRoot"),
            GameHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                right: Val::Px(12.0),
                top: Val::Px(10.0),
                justify_content: JustifyContent::SpaceBetween,
                align_items: AlignItems::FlexStart,
                ..default()
            },
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|root| {
            root.spawn((
                Name::new("GameHudMainPanel"),
                Node {
                    width: Val::Px(400.0),
                    max_width: Val::Percent(60.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(12.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
                BorderColor::all(HUD_PANEL_BORDER),
            ))
            .with_children(|panel| {
                panel.spawn((
                    HudTextKind::Position,
                    Text::new("POS -/-"),
                    TextFont {
                        font_size: 30.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
                panel.spawn((
                    HudTextKind::Lap,
                    Text::new("Lap -/- | 0:00.00 | Best --"),
                    TextFont {
                        font_size: 18.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
                panel.spawn((
                    HudTextKind::Speed,
                    Text::new("Speed 0.0"),
                    TextFont {
                        font_size: 18.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
                panel
                    .spawn((
                        Name::new("HudSpeedBar"),
                        Node {
                            width: Val::Px(HUD_SPEED_BAR_WIDTH_PX),
                            height: Val::Px(14.0),
                            border: UiRect::all(Val::Px(1.0)),
                            ..default()
                        },
                        BackgroundColor(Color::srgba(0.02, 0.03, 0.04, 0.84)),
                        BorderColor::all(Color::srgba(0.56, 0.64, 0.70, 0.9)),
                    ))
                    .with_children(|bar| {
                        bar.spawn((
                            HudSpeedFill,
                            Node {
                                width: Val::Px(0.0),
                                height: Val::Percent(100.0),
                                ..default()
                            },
                            BackgroundColor(Color::srgb(0.38, 0.90, 0.34)),
                        ));
                    });
                panel.spawn((
                    HudTextKind::Nitro,
                    Text::new("Nitro ready"),
                    TextFont {
                        font_size: 16.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
                panel.spawn((
                    HudTextKind::Status,
                    Text::new(""),
                    TextFont {
                        font_size: 26.0,
                        ..default()
                    },
                    TextColor(Color::srgb(1.0, 0.86, 0.35)),
                ));
            });

            root.spawn((
                Name::new("GameHudStandingsPanel"),
                Node {
                    width: Val::Px(300.0),
                    max_width: Val::Percent(40.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(10.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(Color::srgba(0.06, 0.08, 0.1, 0.8)),
                BorderColor::all(Color::srgba(0.45, 0.56, 0.64, 0.85)),
            ))
            .with_children(|panel| {
                panel.spawn((
                    Text::new("STANDINGS"),
                    TextFont {
                        font_size: 18.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
                panel.spawn((
                    HudTextKind::Standings,
                    Text::new(""),
                    TextFont {
                        font_size: 15.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
            });
        });
}

fn cleanup_game_hud(mut commands: Commands, hud_query: Query<Entity, With<GameHudRoot>>) {
    for entity in &hud_query {
        commands.entity(entity).try_despawn();
    }
}

fn update_game_hud(
    manager: Res<LevelManager>,
    mut text_query: Query<(&HudTextKind, &mut Text)>,
    mut speed_fill_query: Query<(&mut Node, &mut BackgroundColor), With<HudSpeedFill>>,
) {
    let Some(human_id) = manager.human_id() else {
        return;
    };
    let Some(hud) = manager.hud(human_id) else {
        return;
    };
    let max_speed = manager
        .player(human_id)
        .map(|player| player.bike().effective_max_speed())
        .unwrap_or(1.0)
        .max(1.0);

    if let Ok((mut bar_node, mut bar_color)) = speed_fill_query.single_mut() {
        let fraction = (hud.speed / max_speed).clamp(0.0, 1.0);
        bar_node.width = Val::Px(HUD_SPEED_BAR_WIDTH_PX * fraction);
        *bar_color = BackgroundColor(if hud.boosted {
            Color::srgb(0.0, 0.89, 0.99)
        } else {
            Color::srgb(0.38, 0.90, 0.34)
        });
    }

    let standings_text = manager
        .standings()
        .iter()
        .map(|player| {
            let marker = if player.id() == human_id { ">" } else { " " };
            format!(
                "{marker}{}. {} (lap {})",
                player.progress().rank,
                player.name(),
                player.progress().current_lap.min(hud.required_laps)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let status = status_line(
        manager.state(),
        manager.countdown_remaining(),
        manager.is_paused(),
    );

    for (kind, mut text) in &mut text_query {
        match kind {
            HudTextKind::Position => {
                *text = Text::new(format!("POS {}/{}", hud.rank, hud.racer_count));
            }
            HudTextKind::Lap => {
                *text = Text::new(lap_line(&hud));
            }
            HudTextKind::Speed => {
                *text = Text::new(format!("Speed {:.1}", hud.speed));
            }
            HudTextKind::Nitro => {
                *text = Text::new(if hud.boosted {
                    "NITRO!"
                } else if hud.nitro_ready {
                    "Nitro ready (Space)"
                } else {
                    "Nitro recharging"
                });
            }
            HudTextKind::Status => {
                *text = Text::new(status.clone());
            }
            HudTextKind::Standings => {
                *text = Text::new(standings_text.clone());
            }
        }
    }
}

fn lap_line(hud: &PlayerHud) -> String {
    let best = hud
        .best_lap_time
        .map(format_lap_time)
        .unwrap_or_else(|| "--".to_string());
    format!(
        "Lap {}/{} | {} | Best {best}",
        hud.current_lap,
        hud.required_laps,
        format_lap_time(hud.current_lap_time)
    )
}

fn status_line(state: RaceState, countdown_remaining: f32, paused: bool) -> String {
    if paused {
        return "PAUSED (Esc resume, R restart)".to_string();
    }
    match state {
        RaceState::Countdown => format!("{}", countdown_remaining.ceil().max(1.0) as u32),
        RaceState::Racing => String::new(),
        RaceState::NotStarted => "Get ready".to_string(),
        RaceState::Finished => "FINISH".to_string(),
    }
}

/// `m:ss.cc`
fn format_lap_time(seconds: f32) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u32;
    format!(
        "{}:{:02}.{:02}",
        centis / 6_000,
        (centis / 100) % 60,
        centis % 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lap_times_format_as_minutes_seconds_centis() {
        assert_eq!(format_lap_time(0.0), "0:00.00");
        assert_eq!(format_lap_time(61.5), "1:01.50");
        assert_eq!(format_lap_time(-3.0), "0:00.00");
    }

    #[test]
    fn countdown_status_rounds_up_to_whole_seconds() {
        assert_eq!(status_line(RaceState::Countdown, 2.4, false), "3");
        assert_eq!(status_line(RaceState::Countdown, 0.01, false), "1");
        assert_eq!(status_line(RaceState::Racing, 0.0, false), "");
        assert!(status_line(RaceState::Racing, 0.0, true).starts_with("PAUSED"));
    }

    #[test]
    fn lap_line_shows_best_lap_when_set() {
        let mut hud = PlayerHud {
            player_id: 0,
            name: "Player 1".to_string(),
            speed: 0.0,
            current_lap: 2,
            required_laps: 3,
            current_lap_time: 12.25,
            best_lap_time: None,
            rank: 1,
            racer_count: 5,
            boosted: false,
            nitro_ready: true,
        };
        assert_eq!(lap_line(&hud), "Lap 2/3 | 0:12.25 | Best --");

        hud.best_lap_time = Some(40.0);
        assert_eq!(lap_line(&hud), "Lap 2/3 | 0:12.25 | Best 0:40.00");
    }
}
