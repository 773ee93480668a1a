use crate::config::GameConfig;
use crate::gameplay::{DriverInputState, TrackSimulation};
use crate::simulation::history::{RunResults, WorstSurfaceMetric};
use crate::simulation::integrator::{BrakeMode, KinematicState};
use crate::simulation::TelemetrySnapshot;
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use serde::Serialize;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeybindOverlayState>()
            .init_resource::<PhysicsTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_physics_tuning_panel)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(
                Update,
                dump_telemetry_json_hotkey.run_if(resource_exists::<TrackSimulation>),
            )
            .add_systems(
                Update,
                update_debug_overlay_text
                    .run_if(in_state(GameState::InRun).or(in_state(GameState::Pause)))
                    .run_if(resource_exists::<TrackSimulation>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                physics_tuning_panel_ui
                    .run_if(in_state(GameState::InRun).or(in_state(GameState::Pause)))
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

/// Editable copy of the tunable config values; nothing is applied until the user asks.
#[derive(Debug, Clone, PartialEq)]
struct PhysicsTuningParams {
    gravity: f32,
    engine_acceleration: f32,
    brake_deceleration: f32,
    mass: f32,
    max_velocity: f32,
    max_step_s: f32,
    oppose_motion_brake: bool,
    /// Only tunable for the `equal_split` layout.
    total_length: Option<f32>,
    sample_interval_s: f32,
    slowdown_threshold: f32,
    surface_friction: Vec<(String, f32)>,
}

impl PhysicsTuningParams {
    fn from_config(config: &GameConfig) -> Self {
        let physics = &config.game.physics;
        Self {
            gravity: physics.gravity,
            engine_acceleration: physics.engine_acceleration,
            brake_deceleration: physics.brake_deceleration,
            mass: physics.mass,
            max_velocity: physics.max_velocity,
            max_step_s: physics.max_step_s,
            oppose_motion_brake: physics.brake_mode == "oppose_motion",
            total_length: (config.game.track.layout == "equal_split")
                .then_some(config.game.track.total_length),
            sample_interval_s: config.game.history.sample_interval_s,
            slowdown_threshold: config.game.history.slowdown_threshold,
            surface_friction: config
                .surfaces
                .surfaces
                .iter()
                .map(|surface| (surface.id.clone(), surface.friction))
                .collect(),
        }
    }

    fn apply_to_config(&self, config: &mut GameConfig) {
        let physics = &mut config.game.physics;
        physics.gravity = self.gravity;
        physics.engine_acceleration = self.engine_acceleration;
        physics.brake_deceleration = self.brake_deceleration;
        physics.mass = self.mass;
        physics.max_velocity = self.max_velocity;
        physics.max_step_s = self.max_step_s;
        physics.brake_mode = if self.oppose_motion_brake {
            "oppose_motion".to_string()
        } else {
            "fixed".to_string()
        };
        if let Some(total_length) = self.total_length {
            config.game.track.total_length = total_length;
        }
        config.game.history.sample_interval_s = self.sample_interval_s;
        config.game.history.slowdown_threshold = self.slowdown_threshold;

        for (surface_id, friction) in &self.surface_friction {
            if let Some(surface) = config
                .surfaces
                .surfaces
                .iter_mut()
                .find(|surface| &surface.id == surface_id)
            {
                surface.friction = *friction;
            }
            if let Some(surface) = config.surfaces_by_id.get_mut(surface_id) {
                surface.friction = *friction;
            }
        }
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
            right: Val::Px(12.0),
            top: Val::Px(12.0),
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
            top: Val::Px(190.0),
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
    track: Res<TrackSimulation>,
    input_state: Res<DriverInputState>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let simulation = &track.simulation;
    let telemetry = simulation.telemetry();
    let statistics = simulation.statistics();
    let surface_index = simulation.terrain().surface_index_at(telemetry.position);
    let surface_length = simulation
        .terrain()
        .surfaces()
        .get(surface_index)
        .map(|surface| surface.length())
        .unwrap_or(0.0);
    let brake_mode = simulation.config().physics.brake_mode;
    let (surface_time, surface_slowdown) = statistics
        .per_surface()
        .get(surface_index)
        .map(|stats| (stats.time_on_surface_s, stats.slowdown_accumulated_mps))
        .unwrap_or((0.0, 0.0));

    *text = Text::new(format!(
        "FPS: {fps:>5.1}\nPhase: {phase:?}\nPosition: {position:>7.2} / {track_length:.1} m\nVelocity: {velocity:>6.2} m/s (max seen {max_seen:.2})\nInput: accel={accel} brake={brake}\nSurface #{surface_index}: {surface} ({surface_length:.1} m, {surface_time:.2}s, slowdown {surface_slowdown:.2} m/s)\nBrake mode: {brake_mode:?}\nHistory samples: {samples}\nHotkeys: H help | V tuning | J dump json | F5 reload",
        phase = telemetry.phase,
        position = telemetry.position,
        track_length = telemetry.track_length,
        velocity = telemetry.velocity,
        max_seen = statistics.max_velocity_observed(),
        accel = if input_state.accelerate { "yes" } else { "no" },
        brake = if input_state.brake { "yes" } else { "no" },
        surface = telemetry.surface_name,
        samples = simulation.history().len(),
    ));
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

#[derive(Serialize)]
struct DebugDump<'a> {
    telemetry: TelemetrySnapshot,
    state: &'a KinematicState,
    brake_mode: BrakeMode,
    worst_surface_metric: WorstSurfaceMetric,
    results: Option<&'a RunResults>,
}

fn debug_dump_json(track: &TrackSimulation) -> Result<String, serde_json::Error> {
    let config = track.simulation.config();
    serde_json::to_string_pretty(&DebugDump {
        telemetry: track.simulation.telemetry(),
        state: track.simulation.state(),
        brake_mode: config.physics.brake_mode,
        worst_surface_metric: config.history.worst_surface_metric,
        results: track.simulation.results(),
    })
}

fn dump_telemetry_json_hotkey(keyboard: Res<ButtonInput<KeyCode>>, track: Res<TrackSimulation>) {
    if !keyboard.just_pressed(KeyCode::KeyJ) {
        return;
    }

    match debug_dump_json(&track) {
        Ok(json) => info!("Telemetry dump:\n{json}"),
        Err(error) => error!("Failed to serialize telemetry dump: {error}"),
    }
}

fn toggle_physics_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<PhysicsTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyV) {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Some(config) = config {
            panel_state.params = Some(PhysicsTuningParams::from_config(&config));
            panel_state.status.clear();
        }
        info!("Physics tuning panel shown.");
    } else {
        info!("Physics tuning panel hidden.");
    }
}

fn physics_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<PhysicsTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    let mut params = panel_state
        .params
        .clone()
        .unwrap_or_else(|| PhysicsTuningParams::from_config(&config));

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut reload_clicked = false;
    let mut apply_clicked = false;
    let mut preset_clicked: Option<String> = None;
    let status = panel_state.status.clone();
    let active_preset = config
        .game
        .app
        .default_preset
        .clone()
        .unwrap_or_else(|| "custom".to_string());
    let presets: Vec<(String, String)> = config
        .game
        .presets
        .iter()
        .map(|preset| (preset.id.clone(), preset.label.clone()))
        .collect();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Physics Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(520.0)
        .show(ctx, |ui| {
            ui.label(format!("Active preset: {active_preset}"));
            ui.horizontal(|ui| {
                for (id, label) in &presets {
                    if ui.button(label).clicked() {
                        preset_clicked = Some(id.clone());
                    }
                }
            });
            ui.label("Edits take effect on Apply, which restarts the run.");
            ui.separator();

            ui.collapsing("Vehicle + Gravity", |ui| {
                params_changed |=
                    tuning_slider_row(ui, "gravity", &mut params.gravity, 0.1..=30.0, 0.05);
                params_changed |= tuning_slider_row(
                    ui,
                    "engine_acceleration",
                    &mut params.engine_acceleration,
                    0.1..=30.0,
                    0.05,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "brake_deceleration",
                    &mut params.brake_deceleration,
                    -40.0..=-0.1,
                    0.05,
                );
                params_changed |=
                    tuning_slider_row(ui, "mass", &mut params.mass, 1.0..=5000.0, 1.0);
                params_changed |= tuning_slider_row(
                    ui,
                    "max_velocity",
                    &mut params.max_velocity,
                    1.0..=120.0,
                    0.1,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "max_step_s",
                    &mut params.max_step_s,
                    0.001..=0.5,
                    0.001,
                );
                params_changed |= ui
                    .checkbox(&mut params.oppose_motion_brake, "brake opposes motion")
                    .changed();
            });

            ui.collapsing("Track + History", |ui| {
                match params.total_length.as_mut() {
                    Some(total_length) => {
                        params_changed |= tuning_slider_row(
                            ui,
                            "total_length",
                            total_length,
                            50.0..=5000.0,
                            1.0,
                        );
                    }
                    None => {
                        ui.weak("per_surface layout: lengths come from surfaces.toml");
                    }
                }
                params_changed |= tuning_slider_row(
                    ui,
                    "sample_interval_s",
                    &mut params.sample_interval_s,
                    0.0..=2.0,
                    0.01,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "slowdown_threshold",
                    &mut params.slowdown_threshold,
                    0.0..=20.0,
                    0.05,
                );
            });

            ui.collapsing("Surface Friction", |ui| {
                for (surface_id, friction) in &mut params.surface_friction {
                    params_changed |=
                        tuning_slider_row(ui, surface_id.as_str(), friction, 0.0..=2.0, 0.005);
                }
            });

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Reload From Config").clicked() {
                    reload_clicked = true;
                }
                if ui.button("Apply + Restart").clicked() {
                    apply_clicked = true;
                }
            });

            if !status.is_empty() {
                ui.separator();
                ui.label(status);
            }
        });

    panel_state.visible = window_open;

    if let Some(preset_id) = preset_clicked {
        match config.apply_preset(&preset_id) {
            Ok(()) => {
                info!("Applied physics preset `{preset_id}`.");
                panel_state.params = Some(PhysicsTuningParams::from_config(&config));
                panel_state.status = format!("Preset `{preset_id}` applied; run restarted.");
            }
            Err(error) => panel_state.status = error.to_string(),
        }
        return;
    }

    if reload_clicked {
        panel_state.params = Some(PhysicsTuningParams::from_config(&config));
        panel_state.status = "Reloaded values from current config.".to_string();
        return;
    }

    if apply_clicked {
        params.apply_to_config(&mut config);
        config.game.app.default_preset = None;
        info!("Applied physics tuning from panel (in-memory only).");
        panel_state.status = "Tuning applied; run restarted.".to_string();
    } else if params_changed {
        panel_state.status = "Unapplied edits.".to_string();
    }
    panel_state.params = Some(params);
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

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
V - Toggle physics tuning panel\n\
J - Dump telemetry JSON to log\n\
F5 - Hot-reload config\n\
D / Right - Accelerate\n\
A / Left - Brake\n\
Esc - Pause / resume\n\
R - Restart run\n\
Space - Results -> new run\n\
Q - Quit from results"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures::sample_game_config;
    use crate::simulation::integrator::ControlInputs;
    use crate::simulation::Simulation;

    #[test]
    fn tuning_params_round_trip_through_config() {
        let mut config = sample_game_config();
        let mut params = PhysicsTuningParams::from_config(&config);
        assert_eq!(params.surface_friction.len(), 2);

        params.gravity = 3.71;
        params.oppose_motion_brake = true;
        params.surface_friction[1].1 = 0.9;
        params.apply_to_config(&mut config);

        assert_eq!(config.game.physics.gravity, 3.71);
        assert_eq!(config.game.physics.brake_mode, "oppose_motion");
        assert_eq!(config.surfaces.surfaces[1].friction, 0.9);
        assert_eq!(config.surfaces_by_id["SAND"].friction, 0.9);
        assert_eq!(PhysicsTuningParams::from_config(&config), params);
    }

    #[test]
    fn total_length_is_only_tuned_for_equal_split() {
        let mut config = sample_game_config();
        let params = PhysicsTuningParams::from_config(&config);
        assert_eq!(params.total_length, Some(300.0));

        config.game.track.layout = "per_surface".to_string();
        let mut params = PhysicsTuningParams::from_config(&config);
        assert_eq!(params.total_length, None);

        params.gravity = 5.0;
        params.apply_to_config(&mut config);
        assert_eq!(config.game.track.total_length, 300.0);
        assert_eq!(config.game.physics.gravity, 5.0);
    }

    #[test]
    fn debug_dump_includes_results_after_finish() {
        let config = sample_game_config();
        let mut track = TrackSimulation {
            simulation: Simulation::new(config.simulation_config()).expect("simulation builds"),
            terrain_generation: 0,
        };

        let idle_dump = debug_dump_json(&track).expect("dump serializes");
        assert!(idle_dump.contains("\"telemetry\""));
        assert!(idle_dump.contains("\"results\": null"));
        assert!(idle_dump.contains("\"brake_mode\": \"Fixed\""));
        assert!(idle_dump.contains("\"worst_surface_metric\": \"Slowdown\""));
        assert!(idle_dump.contains("\"paused\": false"));

        track.simulation.start().expect("starts from idle");
        let controls = ControlInputs {
            accelerating: true,
            braking: false,
        };
        for _ in 0..20_000 {
            track.simulation.tick(0.05, controls);
            if track.simulation.results().is_some() {
                break;
            }
        }

        let finished_dump = debug_dump_json(&track).expect("dump serializes");
        assert!(finished_dump.contains("\"final_time\""));
        assert!(finished_dump.contains("\"worst_surface_name\""));
    }
}
