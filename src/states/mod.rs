use crate::gameplay::TrackSimulation;
use crate::simulation::SimulationPhase;
use bevy::app::AppExit;
use bevy::prelude::*;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    InRun,
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
                boot_to_in_run
                    .run_if(in_state(GameState::Boot))
                    .run_if(resource_exists::<TrackSimulation>),
            )
            .add_systems(OnEnter(GameState::InRun), enter_in_run)
            .add_systems(Update, in_run_controls.run_if(in_state(GameState::InRun)))
            .add_systems(OnEnter(GameState::Pause), enter_pause)
            .add_systems(Update, pause_controls.run_if(in_state(GameState::Pause)))
            .add_systems(OnEnter(GameState::Results), enter_results)
            .add_systems(
                Update,
                results_controls.run_if(in_state(GameState::Results)),
            );
    }
}

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

fn enter_boot(track: Option<ResMut<TrackSimulation>>) {
    info!("Entered state: Boot");
    if let Some(mut track) = track {
        track.simulation.reset();
    }
}

fn boot_to_in_run(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::InRun);
}

/// Starts a fresh run, or resumes one coming back from Pause.
fn enter_in_run(track: Option<ResMut<TrackSimulation>>) {
    info!("Entered state: InRun");
    let Some(mut track) = track else {
        return;
    };

    let simulation = &mut track.simulation;
    let outcome = match simulation.phase() {
        SimulationPhase::Paused => simulation.resume(),
        SimulationPhase::Idle => simulation.start(),
        SimulationPhase::Finished => {
            simulation.reset();
            simulation.start()
        }
        SimulationPhase::Running => Ok(()),
    };
    if let Err(error) = outcome {
        warn!("{error}");
    }
}

fn restart_run(track: &mut TrackSimulation) {
    track.simulation.reset();
    if let Err(error) = track.simulation.start() {
        warn!("{error}");
        return;
    }
    info!("Run restarted.");
}

fn in_run_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    track: Option<ResMut<TrackSimulation>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Pause);
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyR) {
        if let Some(mut track) = track {
            restart_run(&mut track);
        }
    }
}

fn enter_pause(track: Option<ResMut<TrackSimulation>>) {
    info!("Entered state: Pause");
    let Some(mut track) = track else {
        return;
    };
    if let Err(error) = track.simulation.pause() {
        warn!("{error}");
    }
}

fn pause_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    track: Option<ResMut<TrackSimulation>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::InRun);
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyR) {
        if let Some(mut track) = track {
            track.simulation.reset();
        }
        next_state.set(GameState::InRun);
    }
}

fn enter_results() {
    info!("Entered state: Results");
}

fn results_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: MessageWriter<AppExit>,
) {
    if keyboard.just_pressed(KeyCode::Space) {
        next_state.set(GameState::Boot);
    }

    if keyboard.just_pressed(KeyCode::KeyQ) {
        exit.write(AppExit::Success);
    }
}
