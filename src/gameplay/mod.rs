pub mod vehicle;

use crate::config::GameConfig;
use crate::simulation::integrator::ControlInputs;
use crate::simulation::{Simulation, SimulationPhase, TickOutcome};
use crate::states::GameState;
use bevy::prelude::*;
use vehicle::TrackScenePlugin;

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DriverInputState>()
            .init_resource::<DriverInputBindings>()
            .add_systems(
                Update,
                sync_simulation_with_config.run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                Update,
                (read_driver_input, tick_track_simulation)
                    .chain()
                    .after(sync_simulation_with_config)
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<TrackSimulation>),
            )
            .add_plugins(TrackScenePlugin);
    }
}

/// The one simulation instance driven by the frame loop.
#[derive(Resource, Debug)]
pub struct TrackSimulation {
    pub simulation: Simulation,
    /// Bumped whenever the terrain is rebuilt so the scene can respawn ground tiles.
    pub terrain_generation: u32,
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DriverInputState {
    pub accelerate: bool,
    pub brake: bool,
}

impl DriverInputState {
    pub fn controls(&self) -> ControlInputs {
        ControlInputs {
            accelerating: self.accelerate,
            braking: self.brake,
        }
    }
}

#[derive(Resource, Debug, Clone)]
struct DriverInputBindings {
    accelerate: Vec<KeyCode>,
    brake: Vec<KeyCode>,
}

impl Default for DriverInputBindings {
    fn default() -> Self {
        Self {
            accelerate: vec![KeyCode::KeyD, KeyCode::ArrowRight],
            brake: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
        }
    }
}

fn sync_simulation_with_config(
    mut commands: Commands,
    config: Res<GameConfig>,
    state: Res<State<GameState>>,
    track: Option<ResMut<TrackSimulation>>,
    mut rebuild_pending: Local<bool>,
) {
    if !rebuild_due(config.is_changed(), &mut rebuild_pending, *state.get()) {
        return;
    }

    let simulation_config = config.simulation_config();
    match track {
        None => match Simulation::new(simulation_config) {
            Ok(simulation) => {
                info!(
                    "Built track: {} surfaces, {:.1} m.",
                    simulation.terrain().surfaces().len(),
                    simulation.terrain().track_length()
                );
                commands.insert_resource(TrackSimulation {
                    simulation,
                    terrain_generation: 0,
                });
            }
            Err(error) => {
                error!("Failed to build track from config: {error}");
            }
        },
        Some(mut track) => {
            let was_active = matches!(
                track.simulation.phase(),
                SimulationPhase::Running | SimulationPhase::Paused
            );
            if let Err(error) = track.simulation.reconfigure(simulation_config) {
                error!("Failed to rebuild track; keeping previous simulation: {error}");
                return;
            }
            track.terrain_generation = track.terrain_generation.wrapping_add(1);
            info!(
                "Rebuilt track: {} surfaces, {:.1} m. Run restarted.",
                track.simulation.terrain().surfaces().len(),
                track.simulation.terrain().track_length()
            );

            if was_active && *state.get() == GameState::InRun {
                if let Err(error) = track.simulation.start() {
                    warn!("{error}");
                }
            }
        }
    }
}

/// Config changes made on the results screen wait for the next run so the finished
/// results stay visible.
fn rebuild_due(config_changed: bool, pending: &mut bool, state: GameState) -> bool {
    if state == GameState::Results {
        if config_changed && !*pending {
            info!("Config changed; track rebuild deferred until the next run.");
        }
        *pending |= config_changed;
        return false;
    }
    let due = config_changed || *pending;
    *pending = false;
    due
}

fn read_driver_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<DriverInputBindings>,
    mut input_state: ResMut<DriverInputState>,
) {
    input_state.accelerate = bindings.accelerate.iter().any(|key| keyboard.pressed(*key));
    input_state.brake = bindings.brake.iter().any(|key| keyboard.pressed(*key));
}

fn tick_track_simulation(
    time: Res<Time>,
    input_state: Res<DriverInputState>,
    mut track: ResMut<TrackSimulation>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let outcome = track
        .simulation
        .tick(time.delta_secs(), input_state.controls());
    if outcome != TickOutcome::Finished {
        return;
    }

    if let Some(results) = track.simulation.results() {
        info!(
            "Run finished: {:.1} m in {:.2}s, avg {:.2} m/s, max {:.2} m/s, worst surface {}.",
            results.final_distance,
            results.final_time,
            results.average_speed,
            results.max_speed,
            results.worst_surface_name.as_deref().unwrap_or("none")
        );
    }
    next_state.set(GameState::Results);
}
