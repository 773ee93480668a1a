pub mod results;

use crate::gameplay::{DriverInputState, TrackSimulation};
use crate::simulation::{SimulationPhase, TelemetrySnapshot};
use crate::states::GameState;
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const HUD_PANEL_BG: Color = Color::srgba(0.06, 0.09, 0.12, 0.86);
const HUD_PANEL_BORDER: Color = Color::srgba(0.58, 0.68, 0.76, 0.92);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);
const HUD_BAR_WIDTH_PX: f32 = 300.0;
const MPS_TO_KMH: f32 = 3.6;

pub struct TelemetryHudPlugin;

impl Plugin for TelemetryHudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::InRun), spawn_telemetry_hud)
            .add_systems(OnEnter(GameState::Results), cleanup_telemetry_hud)
            .add_systems(OnEnter(GameState::Boot), cleanup_telemetry_hud)
            .add_systems(
                Update,
                update_telemetry_hud
                    .run_if(in_state(GameState::InRun).or(in_state(GameState::Pause)))
                    .run_if(resource_exists::<TrackSimulation>),
            );
    }
}

#[derive(Component)]
struct TelemetryHudRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudTextKind {
    Speed,
    Progress,
    Surface,
    Forces,
    Status,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudBarFill {
    Speed,
    Progress,
}

fn hud_text(kind: HudTextKind, initial: &str, font_size: f32, color: Color) -> impl Bundle {
    (
        kind,
        Text::new(initial),
        TextFont {
            font_size,
            ..default()
        },
        TextColor(color),
    )
}

fn spawn_hud_bar(
    panel: &mut ChildSpawnerCommands,
    name: &'static str,
    fill: HudBarFill,
    color: Color,
) {
    panel
        .spawn((
            Name::new(name),
            Node {
                width: Val::Px(HUD_BAR_WIDTH_PX),
                height: Val::Px(12.0),
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
            BackgroundColor(Color::srgba(0.02, 0.03, 0.04, 0.84)),
            BorderColor::all(Color::srgba(0.56, 0.64, 0.70, 0.9)),
        ))
        .with_children(|bar| {
            bar.spawn((
                fill,
                Node {
                    width: Val::Px(0.0),
                    height: Val::Percent(100.0),
                    ..default()
                },
                BackgroundColor(color),
            ));
        });
}

fn spawn_telemetry_hud(
    mut commands: Commands,
    existing_hud: Query<Entity, With<TelemetryHudRoot>>,
) {
    if !existing_hud.is_empty() {
        return;
    }

    commands
        .spawn((
            Name::new("TelemetryHudRoot"),
            TelemetryHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                top: Val::Px(10.0),
                width: Val::Px(420.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(6.0),
                padding: UiRect::all(Val::Px(12.0)),
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
            BackgroundColor(HUD_PANEL_BG),
            BorderColor::all(HUD_PANEL_BORDER),
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|panel| {
            panel.spawn(hud_text(HudTextKind::Speed, "0.0 km/h", 30.0, HUD_TEXT_PRIMARY));
            spawn_hud_bar(panel, "HudSpeedBar", HudBarFill::Speed, Color::srgb(0.98, 0.62, 0.24));
            panel.spawn(hud_text(
                HudTextKind::Progress,
                "0.0 / 0.0 m",
                18.0,
                HUD_TEXT_PRIMARY,
            ));
            spawn_hud_bar(
                panel,
                "HudProgressBar",
                HudBarFill::Progress,
                Color::srgb(0.38, 0.90, 0.34),
            );
            panel.spawn(hud_text(HudTextKind::Surface, "Surface: n/a", 16.0, HUD_TEXT_MUTED));
            panel.spawn(hud_text(HudTextKind::Forces, "", 16.0, HUD_TEXT_MUTED));
            panel.spawn(hud_text(HudTextKind::Status, "", 16.0, HUD_TEXT_PRIMARY));
        });
}

fn cleanup_telemetry_hud(
    mut commands: Commands,
    hud_query: Query<Entity, With<TelemetryHudRoot>>,
) {
    for entity in &hud_query {
        commands.entity(entity).try_despawn();
    }
}

fn update_telemetry_hud(
    track: Res<TrackSimulation>,
    input_state: Res<DriverInputState>,
    mut text_query: Query<(&HudTextKind, &mut Text)>,
    mut bar_query: Query<(&HudBarFill, &mut Node)>,
) {
    let telemetry = track.simulation.telemetry();

    for (fill, mut node) in &mut bar_query {
        let fraction = match fill {
            HudBarFill::Speed => bar_fraction(telemetry.velocity, telemetry.max_velocity),
            HudBarFill::Progress => bar_fraction(telemetry.position, telemetry.track_length),
        };
        node.width = Val::Px(HUD_BAR_WIDTH_PX * fraction);
    }

    for (kind, mut text) in &mut text_query {
        *text = Text::new(hud_line(*kind, &telemetry, &input_state));
    }
}

/// `value / max` clamped to `[0, 1]`; zero when `max` is not positive.
fn bar_fraction(value: f32, max: f32) -> f32 {
    if max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

fn hud_line(kind: HudTextKind, telemetry: &TelemetrySnapshot, input: &DriverInputState) -> String {
    match kind {
        HudTextKind::Speed => format!(
            "{:.1} km/h ({:.2} m/s)",
            telemetry.velocity * MPS_TO_KMH,
            telemetry.velocity
        ),
        HudTextKind::Progress => format!(
            "{:.1} / {:.1} m | {:.2}s | elevation {:+.1} m",
            telemetry.position, telemetry.track_length, telemetry.elapsed_time, telemetry.elevation
        ),
        HudTextKind::Surface => format!(
            "Surface: {} (mu {:.2}) | slope {:+.1} deg",
            telemetry.surface_name, telemetry.friction_coefficient, telemetry.slope_angle_degrees
        ),
        // Friction and gravity are shown as their contribution to the net acceleration.
        HudTextKind::Forces => format!(
            "accel {:+.2} | friction {:+.2} | gravity {:+.2} m/s^2",
            telemetry.acceleration,
            -telemetry.friction_acceleration,
            -telemetry.gravity_component
        ),
        HudTextKind::Status => match telemetry.phase {
            SimulationPhase::Paused => "PAUSED (Esc resume, R restart)".to_string(),
            SimulationPhase::Finished => "FINISHED".to_string(),
            SimulationPhase::Idle => "READY".to_string(),
            SimulationPhase::Running => match (input.accelerate, input.brake) {
                (true, true) => "THROTTLE + BRAKE".to_string(),
                (true, false) => "THROTTLE".to_string(),
                (false, true) => "BRAKE".to_string(),
                (false, false) => "COASTING".to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            position: 150.0,
            velocity: 10.0,
            acceleration: -1.5,
            elapsed_time: 12.5,
            surface_name: "SAND".to_string(),
            slope_angle_degrees: 3.0,
            friction_coefficient: 0.6,
            friction_acceleration: 5.87,
            gravity_component: 0.51,
            elevation: 2.4,
            track_length: 300.0,
            max_velocity: 40.0,
            phase: SimulationPhase::Running,
            finished: false,
        }
    }

    #[test]
    fn bar_fraction_is_clamped() {
        assert_eq!(bar_fraction(10.0, 40.0), 0.25);
        assert_eq!(bar_fraction(80.0, 40.0), 1.0);
        assert_eq!(bar_fraction(-1.0, 40.0), 0.0);
        assert_eq!(bar_fraction(10.0, 0.0), 0.0);
        assert_eq!(bar_fraction(f32::NAN, 40.0), 0.0);
    }

    #[test]
    fn hud_lines_show_telemetry() {
        let telemetry = snapshot();
        let input = DriverInputState {
            accelerate: true,
            brake: false,
        };

        assert_eq!(
            hud_line(HudTextKind::Speed, &telemetry, &input),
            "36.0 km/h (10.00 m/s)"
        );
        let surface = hud_line(HudTextKind::Surface, &telemetry, &input);
        assert!(surface.contains("SAND"));
        assert!(surface.contains("mu 0.60"));
        assert_eq!(hud_line(HudTextKind::Status, &telemetry, &input), "THROTTLE");
    }

    #[test]
    fn uphill_drag_terms_read_as_slowing_down() {
        let telemetry = snapshot();
        let forces = hud_line(HudTextKind::Forces, &telemetry, &DriverInputState::default());
        assert_eq!(forces, "accel -1.50 | friction -5.87 | gravity -0.51 m/s^2");

        let downhill = TelemetrySnapshot {
            slope_angle_degrees: -3.0,
            gravity_component: -0.51,
            ..snapshot()
        };
        let forces = hud_line(HudTextKind::Forces, &downhill, &DriverInputState::default());
        assert!(forces.ends_with("gravity +0.51 m/s^2"));
    }

    #[test]
    fn paused_status_mentions_resume() {
        let telemetry = TelemetrySnapshot {
            phase: SimulationPhase::Paused,
            ..snapshot()
        };
        let status = hud_line(HudTextKind::Status, &telemetry, &DriverInputState::default());
        assert!(status.starts_with("PAUSED"));
    }
}
