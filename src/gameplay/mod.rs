pub mod controller;
pub mod physics;
pub mod player;
pub mod race;
pub mod track;
pub mod vehicle;

use bevy::prelude::*;
use race::runtime::RaceRuntimePlugin;

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RaceRuntimePlugin);
    }
}
