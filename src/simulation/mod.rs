//! Point-mass driving model on a 1-D track of friction/slope segments.
//!
//! `Simulation` owns the terrain, kinematic state, sample history and run
//! statistics. Presentation code only reads [`Simulation::telemetry`] and
//! [`Simulation::results`].

pub mod history;
pub mod integrator;
pub mod terrain;

use history::{
    HistorySample, RunHistory, RunResults, RunStatistics, WorstSurfaceMetric,
    DEFAULT_SAMPLE_INTERVAL_S, DEFAULT_SLOWDOWN_THRESHOLD_MPS2,
};
use integrator::{ControlInputs, KinematicState, PhysicsParams, StepReport};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use terrain::{SurfaceDefinition, TerrainError, TerrainModel, TrackLayout, MIN_SURFACE_LENGTH_M};

const MIN_GRAVITY: f32 = 0.1;
const MIN_ENGINE_ACCELERATION: f32 = 0.1;
const MIN_BRAKE_DECELERATION: f32 = 0.1;
const MIN_MASS_KG: f32 = 1.0;
const MIN_MAX_VELOCITY: f32 = 1.0;
const MIN_STEP_S: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySettings {
    pub sample_interval_s: f32,
    pub slowdown_threshold: f32,
    pub worst_surface_metric: WorstSurfaceMetric,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            sample_interval_s: DEFAULT_SAMPLE_INTERVAL_S,
            slowdown_threshold: DEFAULT_SLOWDOWN_THRESHOLD_MPS2,
            worst_surface_metric: WorstSurfaceMetric::Slowdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub physics: PhysicsParams,
    pub surfaces: Vec<SurfaceDefinition>,
    pub layout: TrackLayout,
    pub history: HistorySettings,
}

impl SimulationConfig {
    /// Clamps physical constants and lengths into safe ranges; NaN falls back to defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = PhysicsParams::default();
        let physics = &mut self.physics;
        physics.gravity = finite_or(physics.gravity, defaults.gravity).max(MIN_GRAVITY);
        physics.engine_acceleration = finite_or(
            physics.engine_acceleration,
            defaults.engine_acceleration,
        )
        .max(MIN_ENGINE_ACCELERATION);
        let brake = finite_or(physics.brake_deceleration, defaults.brake_deceleration);
        physics.brake_deceleration = -brake.abs().max(MIN_BRAKE_DECELERATION);
        physics.mass = finite_or(physics.mass, defaults.mass).max(MIN_MASS_KG);
        physics.max_velocity =
            finite_or(physics.max_velocity, defaults.max_velocity).max(MIN_MAX_VELOCITY);
        physics.max_step_s = finite_or(physics.max_step_s, defaults.max_step_s).max(MIN_STEP_S);

        for surface in &mut self.surfaces {
            surface.friction_coefficient = finite_or(surface.friction_coefficient, 0.0).max(0.0);
            surface.base_length =
                finite_or(surface.base_length, MIN_SURFACE_LENGTH_M).max(MIN_SURFACE_LENGTH_M);
        }
        match &mut self.layout {
            TrackLayout::EqualSplit { total_length } => {
                let floor = MIN_SURFACE_LENGTH_M * self.surfaces.len().max(1) as f32;
                *total_length = finite_or(*total_length, floor).max(floor);
            }
            TrackLayout::PerSurface(lengths) => {
                for length in lengths.values_mut() {
                    *length = finite_or(*length, MIN_SURFACE_LENGTH_M).max(MIN_SURFACE_LENGTH_M);
                }
            }
        }

        self.history.sample_interval_s = finite_or(
            self.history.sample_interval_s,
            DEFAULT_SAMPLE_INTERVAL_S,
        )
        .max(0.0);
        self.history.slowdown_threshold = finite_or(
            self.history.slowdown_threshold,
            DEFAULT_SLOWDOWN_THRESHOLD_MPS2,
        )
        .abs();
        self
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SimulationPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Pause,
    Resume,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleError {
    InvalidTransition {
        from: SimulationPhase,
        action: LifecycleAction,
    },
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, action } => {
                write!(f, "cannot {action:?} a simulation that is {from:?}")
            }
        }
    }
}

impl Error for LifecycleError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Nothing advanced; the phase gates integration.
    Skipped(SimulationPhase),
    Advanced,
    Finished,
}

/// Read-only view for HUDs and graphs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub position: f32,
    pub velocity: f32,
    pub acceleration: f32,
    pub elapsed_time: f32,
    pub surface_name: String,
    pub slope_angle_degrees: f32,
    pub friction_coefficient: f32,
    pub friction_acceleration: f32,
    pub gravity_component: f32,
    pub elevation: f32,
    pub track_length: f32,
    pub max_velocity: f32,
    pub phase: SimulationPhase,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    terrain: TerrainModel,
    state: KinematicState,
    history: RunHistory,
    statistics: RunStatistics,
    phase: SimulationPhase,
    last_report: Option<StepReport>,
    results: Option<RunResults>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, TerrainError> {
        let config = config.sanitized();
        let terrain = TerrainModel::build(&config.surfaces, &config.layout)?;
        let history = RunHistory::new(config.history.sample_interval_s);
        let statistics = RunStatistics::new(&terrain, config.history.slowdown_threshold);
        Ok(Self {
            config,
            terrain,
            state: KinematicState::default(),
            history,
            statistics,
            phase: SimulationPhase::Idle,
            last_report: None,
            results: None,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn terrain(&self) -> &TerrainModel {
        &self.terrain
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    /// Set once, on the step that reaches the end of the track.
    pub fn results(&self) -> Option<&RunResults> {
        self.results.as_ref()
    }

    pub fn start(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            SimulationPhase::Idle,
            LifecycleAction::Start,
            SimulationPhase::Running,
        )
    }

    pub fn pause(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            SimulationPhase::Running,
            LifecycleAction::Pause,
            SimulationPhase::Paused,
        )?;
        self.state.paused = true;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            SimulationPhase::Paused,
            LifecycleAction::Resume,
            SimulationPhase::Running,
        )?;
        self.state.paused = false;
        Ok(())
    }

    /// Back to `Idle` with fresh state, empty history and zeroed statistics.
    pub fn reset(&mut self) {
        self.state = KinematicState::default();
        self.history.clear();
        self.statistics =
            RunStatistics::new(&self.terrain, self.config.history.slowdown_threshold);
        self.phase = SimulationPhase::Idle;
        self.last_report = None;
        self.results = None;
    }

    /// Rebuilds the track from `config` and resets the run.
    pub fn reconfigure(&mut self, config: SimulationConfig) -> Result<(), TerrainError> {
        *self = Self::new(config)?;
        Ok(())
    }

    pub fn tick(&mut self, dt: f32, controls: ControlInputs) -> TickOutcome {
        if self.phase != SimulationPhase::Running {
            return TickOutcome::Skipped(self.phase);
        }

        let Some(report) = integrator::step(
            &mut self.state,
            &self.config.physics,
            &self.terrain,
            controls,
            dt,
        ) else {
            return TickOutcome::Skipped(self.phase);
        };

        self.statistics
            .accumulate(report.surface_index, report.dt, report.net_acceleration);
        self.statistics.observe_velocity(self.state.velocity);
        let sample = HistorySample {
            time: self.state.elapsed_time,
            position: self.state.position,
            velocity: self.state.velocity,
            friction_coefficient: report.friction_coefficient,
            slope_angle_degrees: report.slope_angle_degrees,
        };
        self.last_report = Some(report);

        if report.just_finished {
            self.history.record_final(sample);
            self.phase = SimulationPhase::Finished;
            self.results = Some(self.statistics.finalize(
                &self.state,
                self.terrain.track_length(),
                self.config.history.worst_surface_metric,
                &self.history,
            ));
            return TickOutcome::Finished;
        }
        self.history.record(sample);
        TickOutcome::Advanced
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        let position = self.state.position;
        let surface = self.terrain.surface_at(position);
        let (slope_angle_degrees, friction_acceleration, gravity_component) =
            match self.last_report {
                Some(report) => (
                    report.slope_angle_degrees,
                    report.friction_acceleration,
                    report.gravity_component,
                ),
                None => {
                    let angle = TerrainModel::slope_at(surface, position).angle_degrees;
                    let gravity = self.config.physics.gravity * angle.to_radians().sin();
                    (angle, 0.0, gravity)
                }
            };

        TelemetrySnapshot {
            position,
            velocity: self.state.velocity,
            acceleration: self.state.acceleration,
            elapsed_time: self.state.elapsed_time,
            surface_name: surface.name.clone(),
            slope_angle_degrees,
            friction_coefficient: surface.friction_coefficient,
            friction_acceleration,
            gravity_component,
            elevation: self.terrain.elevation_at(position),
            track_length: self.terrain.track_length(),
            max_velocity: self.config.physics.max_velocity,
            phase: self.phase,
            finished: self.state.finished,
        }
    }

    fn transition(
        &mut self,
        from: SimulationPhase,
        action: LifecycleAction,
        to: SimulationPhase,
    ) -> Result<(), LifecycleError> {
        if self.phase != from {
            return Err(LifecycleError::InvalidTransition {
                from: self.phase,
                action,
            });
        }
        self.phase = to;
        Ok(())
    }
}
