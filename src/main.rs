mod config;
mod debug;
mod gameplay;
mod simulation;
mod states;
mod ui;

use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use config::ConfigPlugin;
use debug::DebugOverlayPlugin;
use gameplay::SimulationPlugin;
use states::{GameState, GameStatePlugin};
use ui::results::ResultsScreenPlugin;
use ui::TelemetryHudPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Slope Sprint".to_string(),
                resolution: (1280, 720).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(ConfigPlugin)
        .add_plugins(DebugOverlayPlugin)
        .add_plugins(SimulationPlugin)
        .add_plugins(TelemetryHudPlugin)
        .add_plugins(ResultsScreenPlugin)
        .init_state::<GameState>()
        .add_plugins(GameStatePlugin)
        .run();
}
