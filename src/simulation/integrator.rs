use super::terrain::TerrainModel;
use serde::Serialize;

/// Speeds at or below this count as standing still for friction.
pub const VELOCITY_EPSILON_MPS: f32 = 1e-3;
pub const DEFAULT_MAX_STEP_S: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BrakeMode {
    /// Brake deceleration is added as-is whenever the brake is held.
    #[default]
    Fixed,
    /// Brake opposes the current motion and does nothing at rest.
    OpposeMotion,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    pub gravity: f32,
    pub engine_acceleration: f32,
    /// Signed; negative values slow the vehicle down.
    pub brake_deceleration: f32,
    /// Carried for force-based tuning; the acceleration model does not read it.
    pub mass: f32,
    pub max_velocity: f32,
    pub max_step_s: f32,
    pub brake_mode: BrakeMode,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            engine_acceleration: 6.0,
            brake_deceleration: -8.0,
            mass: 1_000.0,
            max_velocity: 40.0,
            max_step_s: DEFAULT_MAX_STEP_S,
            brake_mode: BrakeMode::Fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlInputs {
    pub accelerating: bool,
    pub braking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct KinematicState {
    pub position: f32,
    pub velocity: f32,
    pub acceleration: f32,
    pub elapsed_time: f32,
    pub paused: bool,
    pub finished: bool,
}

/// Forces resolved for one step, kept for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub surface_index: usize,
    pub slope_angle_degrees: f32,
    pub friction_coefficient: f32,
    pub friction_acceleration: f32,
    pub gravity_component: f32,
    pub net_acceleration: f32,
    pub dt: f32,
    pub just_finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceBreakdown {
    pub friction_acceleration: f32,
    pub gravity_component: f32,
    pub net_acceleration: f32,
}

pub fn clamp_step(dt: f32, max_step_s: f32) -> f32 {
    if !dt.is_finite() {
        return 0.0;
    }
    dt.clamp(0.0, max_step_s.max(0.0))
}

/// Net acceleration along the track for the given slope and friction.
pub fn resolve_forces(
    params: &PhysicsParams,
    controls: ControlInputs,
    velocity: f32,
    friction_coefficient: f32,
    slope_angle_degrees: f32,
) -> ForceBreakdown {
    let theta = slope_angle_degrees.to_radians();
    let moving = velocity.abs() > VELOCITY_EPSILON_MPS;

    let engine = if controls.accelerating {
        params.engine_acceleration
    } else {
        0.0
    };
    let brake = match (controls.braking, params.brake_mode) {
        (false, _) => 0.0,
        (true, BrakeMode::Fixed) => params.brake_deceleration,
        (true, BrakeMode::OpposeMotion) if moving => {
            -params.brake_deceleration.abs() * velocity.signum()
        }
        (true, BrakeMode::OpposeMotion) => 0.0,
    };
    // Sign-based kinetic friction; overshoot past zero is left to the velocity clamp.
    let friction = if moving {
        friction_coefficient * params.gravity * theta.cos() * velocity.signum()
    } else {
        0.0
    };
    let gravity_component = params.gravity * theta.sin();

    ForceBreakdown {
        friction_acceleration: friction,
        gravity_component,
        net_acceleration: engine + brake - friction - gravity_component,
    }
}

/// Advances `state` by one explicit Euler step. Returns `None` while paused or finished.
pub fn step(
    state: &mut KinematicState,
    params: &PhysicsParams,
    terrain: &TerrainModel,
    controls: ControlInputs,
    dt: f32,
) -> Option<StepReport> {
    if state.paused || state.finished {
        return None;
    }
    let dt = clamp_step(dt, params.max_step_s);

    let surface_index = terrain.surface_index_at(state.position);
    let surface = &terrain.surfaces()[surface_index];
    let slope_angle_degrees = TerrainModel::slope_at(surface, state.position).angle_degrees;
    let forces = resolve_forces(
        params,
        controls,
        state.velocity,
        surface.friction_coefficient,
        slope_angle_degrees,
    );

    state.acceleration = forces.net_acceleration;
    state.velocity =
        (state.velocity + forces.net_acceleration * dt).clamp(0.0, params.max_velocity);
    state.position += state.velocity * dt;
    state.elapsed_time += dt;

    let mut just_finished = false;
    if state.position >= terrain.track_length() {
        state.position = terrain.track_length();
        state.velocity = 0.0;
        state.finished = true;
        just_finished = true;
    }

    Some(StepReport {
        surface_index,
        slope_angle_degrees,
        friction_coefficient: surface.friction_coefficient,
        friction_acceleration: forces.friction_acceleration,
        gravity_component: forces.gravity_component,
        net_acceleration: forces.net_acceleration,
        dt,
        just_finished,
    })
}
