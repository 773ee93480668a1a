mod terrain;

use super::TrackSimulation;
use crate::config::GameConfig;
use crate::simulation::SimulationPhase;
use crate::states::GameState;
use bevy::math::primitives::RegularPolygon;
use bevy::prelude::*;
use terrain::build_ground_tile_samples;

const CAMERA_ORTHO_SCALE_METERS: f32 = 0.05;
const CAMERA_Y_OFFSET_M: f32 = 4.0;
const CAMERA_Z: f32 = 999.9;
const CAMERA_LOOK_AHEAD_FACTOR: f32 = 0.35;
const CAMERA_LOOK_AHEAD_MAX_M: f32 = 10.0;
const GROUND_TILE_WIDTH_M: f32 = 2.0;
const GROUND_RUN_OFF_M: f32 = 60.0;
const TERRAIN_EXTRUSION_DEPTH: f32 = 40.0;
const TERRAIN_RIDGE_HEIGHT: f32 = 0.5;
const MARKER_SIZE: Vec2 = Vec2::new(0.3, 6.0);
const CAR_BODY_SIZE: Vec2 = Vec2::new(3.4, 1.0);
const CAR_CABIN_SIZE: Vec2 = Vec2::new(1.6, 0.6);
const CAR_WHEEL_RADIUS_M: f32 = 0.5;
const CAR_WHEEL_OFFSET_X_M: f32 = 1.1;
const CAR_RIDE_HEIGHT_M: f32 = 1.0;
const FALLBACK_SURFACE_COLORS: [[f32; 3]; 4] = [
    [0.60, 0.66, 0.73],
    [0.42, 0.52, 0.38],
    [0.58, 0.48, 0.36],
    [0.40, 0.44, 0.58],
];

pub struct TrackScenePlugin;

impl Plugin for TrackScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpawnedTerrainGeneration>()
            .add_systems(
                OnEnter(GameState::InRun),
                (configure_camera_units, spawn_car),
            )
            .add_systems(
                Update,
                (refresh_ground_visual, sync_car_to_simulation, camera_follow_car)
                    .chain()
                    .after(super::tick_track_simulation)
                    .run_if(resource_exists::<TrackSimulation>)
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
pub struct PlayerCar;

#[derive(Component)]
struct GroundVisual;

#[derive(Component, Debug, Clone, Copy)]
struct CarWheelVisual {
    radius_m: f32,
}

#[derive(Resource, Debug, Clone, Copy, Default)]
struct SpawnedTerrainGeneration(Option<u32>);

fn configure_camera_units(mut camera_query: Query<&mut Projection, With<Camera2d>>) {
    let Ok(mut projection) = camera_query.single_mut() else {
        return;
    };

    if let Projection::Orthographic(ortho) = &mut *projection {
        ortho.scale = CAMERA_ORTHO_SCALE_METERS;
    }
}

fn spawn_car(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    existing_car: Query<Entity, With<PlayerCar>>,
) {
    if !existing_car.is_empty() {
        return;
    }

    let wheel_mesh = meshes.add(RegularPolygon::new(CAR_WHEEL_RADIUS_M, 6));
    let wheel_material = materials.add(ColorMaterial::from(Color::srgb(0.16, 0.18, 0.21)));

    commands
        .spawn((
            Name::new("PlayerCar"),
            PlayerCar,
            Transform::from_xyz(0.0, CAR_RIDE_HEIGHT_M, 10.0),
            Visibility::Inherited,
        ))
        .with_children(|parent| {
            parent.spawn((
                Name::new("CarBody"),
                Sprite::from_color(Color::srgb(0.93, 0.34, 0.24), CAR_BODY_SIZE),
                Transform::from_xyz(0.0, 0.0, 0.2),
            ));
            parent.spawn((
                Name::new("CarCabin"),
                Sprite::from_color(Color::srgb(0.98, 0.62, 0.30), CAR_CABIN_SIZE),
                Transform::from_xyz(-0.2, 0.75, 0.2),
            ));

            for (name, offset_x) in [
                ("CarWheelFront", CAR_WHEEL_OFFSET_X_M),
                ("CarWheelRear", -CAR_WHEEL_OFFSET_X_M),
            ] {
                parent.spawn((
                    Name::new(name),
                    CarWheelVisual {
                        radius_m: CAR_WHEEL_RADIUS_M,
                    },
                    Mesh2d(wheel_mesh.clone()),
                    MeshMaterial2d(wheel_material.clone()),
                    Transform::from_xyz(offset_x, -0.5, 0.3),
                ));
            }
        });
}

fn surface_color(config: &GameConfig, name: &str, index: usize) -> Color {
    let [r, g, b] = config
        .surfaces_by_id
        .get(name)
        .and_then(|surface| surface.color)
        .unwrap_or(FALLBACK_SURFACE_COLORS[index % FALLBACK_SURFACE_COLORS.len()]);
    Color::srgb(r, g, b)
}

fn refresh_ground_visual(
    mut commands: Commands,
    config: Res<GameConfig>,
    track: Res<TrackSimulation>,
    mut spawned: ResMut<SpawnedTerrainGeneration>,
    existing_ground: Query<Entity, With<GroundVisual>>,
) {
    if spawned.0 == Some(track.terrain_generation) {
        return;
    }

    for entity in &existing_ground {
        commands.entity(entity).despawn();
    }

    let terrain = track.simulation.terrain();
    let samples = build_ground_tile_samples(terrain, GROUND_TILE_WIDTH_M, GROUND_RUN_OFF_M);
    let surfaces = terrain.surfaces();
    let finish_y = terrain.elevation_at(terrain.track_length());
    let track_length = terrain.track_length();

    commands
        .spawn((
            Name::new("GroundVisual"),
            GroundVisual,
            Transform::default(),
            Visibility::Inherited,
        ))
        .with_children(|parent| {
            for (index, sample) in samples.iter().enumerate() {
                let surface_name = surfaces
                    .get(sample.surface_index)
                    .map(|surface| surface.name.as_str())
                    .unwrap_or_default();
                let ridge_color = surface_color(&config, surface_name, sample.surface_index);
                let body_color = if index % 2 == 0 {
                    Color::srgb(0.24, 0.27, 0.31)
                } else {
                    Color::srgb(0.18, 0.21, 0.25)
                };

                parent.spawn((
                    Name::new("GroundBodyTile"),
                    Sprite::from_color(
                        body_color,
                        Vec2::new(GROUND_TILE_WIDTH_M + 0.1, TERRAIN_EXTRUSION_DEPTH),
                    ),
                    Transform::from_xyz(
                        sample.x,
                        sample.top_y - (TERRAIN_EXTRUSION_DEPTH * 0.5),
                        0.1,
                    ),
                ));

                parent.spawn((
                    Name::new("GroundSurfaceTile"),
                    Sprite::from_color(
                        ridge_color,
                        Vec2::new(GROUND_TILE_WIDTH_M + 0.2, TERRAIN_RIDGE_HEIGHT),
                    ),
                    Transform::from_xyz(sample.x, sample.top_y - (TERRAIN_RIDGE_HEIGHT * 0.5), 0.2)
                        .with_rotation(Quat::from_rotation_z(sample.angle_radians)),
                ));
            }

            for (name, x, y) in [
                ("StartMarker", 0.0, 0.0),
                ("FinishMarker", track_length, finish_y),
            ] {
                parent.spawn((
                    Name::new(name),
                    Sprite::from_color(Color::srgb(0.95, 0.95, 0.95), MARKER_SIZE),
                    Transform::from_xyz(x, y + (MARKER_SIZE.y * 0.5), 0.3),
                ));
            }
        });

    info!(
        "Spawned ground visual with {} tiles for {:.1} m track.",
        samples.len(),
        track_length
    );
    spawned.0 = Some(track.terrain_generation);
}

fn sync_car_to_simulation(
    time: Res<Time>,
    track: Res<TrackSimulation>,
    mut car_query: Query<&mut Transform, With<PlayerCar>>,
    mut wheel_query: Query<(&CarWheelVisual, &mut Transform), Without<PlayerCar>>,
) {
    let Ok(mut car_transform) = car_query.single_mut() else {
        return;
    };

    let telemetry = track.simulation.telemetry();
    let angle_radians = telemetry.slope_angle_degrees.to_radians();
    let ground_normal = Vec2::new(-angle_radians.sin(), angle_radians.cos());
    let contact = Vec2::new(telemetry.position, telemetry.elevation);
    let center = contact + (ground_normal * CAR_RIDE_HEIGHT_M);

    car_transform.translation.x = center.x;
    car_transform.translation.y = center.y;
    car_transform.rotation = Quat::from_rotation_z(angle_radians);

    if telemetry.phase != SimulationPhase::Running {
        return;
    }
    let dt = time.delta_secs();
    for (wheel, mut transform) in &mut wheel_query {
        let spin = telemetry.velocity * dt / wheel.radius_m.max(0.01);
        transform.rotate_z(-spin);
    }
}

fn camera_follow_car(
    track: Res<TrackSimulation>,
    car_query: Query<&Transform, With<PlayerCar>>,
    mut camera_query: Query<&mut Transform, (With<Camera2d>, Without<PlayerCar>)>,
) {
    let Ok(car_transform) = car_query.single() else {
        return;
    };
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    let velocity = track.simulation.state().velocity;
    camera_transform.translation.x = car_transform.translation.x
        + (velocity * CAMERA_LOOK_AHEAD_FACTOR).clamp(0.0, CAMERA_LOOK_AHEAD_MAX_M);
    camera_transform.translation.y = car_transform.translation.y + CAMERA_Y_OFFSET_M;
    camera_transform.translation.z = CAMERA_Z;
}
