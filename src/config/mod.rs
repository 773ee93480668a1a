use crate::simulation::history::WorstSurfaceMetric;
use crate::simulation::integrator::{BrakeMode, PhysicsParams};
use crate::simulation::terrain::{SlopeProfileStep, SurfaceDefinition, TrackLayout};
use crate::simulation::{HistorySettings, SimulationConfig};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_game_config)
            .add_systems(Update, (reload_game_config_hotkey, sync_window_title).chain());
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn sync_window_title(
    config: Option<Res<GameConfig>>,
    mut window_query: Query<&mut Window, With<PrimaryWindow>>,
) {
    let Some(config) = config else {
        return;
    };
    if !config.is_changed() {
        return;
    }
    let Ok(mut window) = window_query.single_mut() else {
        return;
    };
    if window.title != config.game.app.window_title {
        window.title = config.game.app.window_title.clone();
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} surfaces, {} presets, {} layout, gravity {:.2} m/s^2.",
        config.surfaces.surfaces.len(),
        config.presets_by_id.len(),
        config.game.track.layout,
        config.game.physics.gravity
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub surfaces: SurfacesFile,
    pub surfaces_by_id: HashMap<String, SurfaceConfig>,
    pub presets_by_id: HashMap<String, PresetConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let surfaces: SurfacesFile = read_toml(&config_dir.join("surfaces.toml"))?;
        Self::from_files(game, surfaces)
    }

    pub fn from_files(game: GameFile, surfaces: SurfacesFile) -> Result<Self, ConfigError> {
        let mut config = Self {
            surfaces_by_id: to_index("surfaces.toml::surfaces", &surfaces.surfaces)?,
            presets_by_id: to_index("game.toml::presets", &game.presets)?,
            game,
            surfaces,
        };

        config.validate_references()?;
        if let Some(preset_id) = config.game.app.default_preset.clone() {
            config.apply_preset(&preset_id)?;
        }
        Ok(config)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if let Some(preset_id) = self.game.app.default_preset.as_deref() {
            if !self.presets_by_id.contains_key(preset_id) {
                return Err(ConfigError::Validation(format!(
                    "game.toml::app.default_preset references unknown preset id `{preset_id}`"
                )));
            }
        }

        if self.surfaces.surfaces.is_empty() {
            return Err(ConfigError::Validation(
                "surfaces.toml::surfaces must contain at least one surface".to_string(),
            ));
        }

        let physics = &self.game.physics;
        if physics.gravity <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics.gravity must be > 0".to_string(),
            ));
        }
        if physics.engine_acceleration <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics.engine_acceleration must be > 0".to_string(),
            ));
        }
        if physics.brake_deceleration >= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics.brake_deceleration must be < 0".to_string(),
            ));
        }
        if physics.mass <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics.mass must be > 0".to_string(),
            ));
        }
        if physics.max_velocity <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics.max_velocity must be > 0".to_string(),
            ));
        }
        if physics.max_step_s <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics.max_step_s must be > 0".to_string(),
            ));
        }
        if !matches!(physics.brake_mode.as_str(), "fixed" | "oppose_motion") {
            return Err(ConfigError::Validation(format!(
                "game.toml::physics.brake_mode `{}` is unsupported (expected fixed/oppose_motion)",
                physics.brake_mode
            )));
        }

        if !matches!(self.game.track.layout.as_str(), "equal_split" | "per_surface") {
            return Err(ConfigError::Validation(format!(
                "game.toml::track.layout `{}` is unsupported (expected equal_split/per_surface)",
                self.game.track.layout
            )));
        }
        if self.game.track.total_length <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::track.total_length must be > 0".to_string(),
            ));
        }

        if self.game.history.sample_interval_s < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::history.sample_interval_s must be >= 0".to_string(),
            ));
        }
        if !matches!(
            self.game.history.worst_surface_metric.as_str(),
            "slowdown" | "time_spent"
        ) {
            return Err(ConfigError::Validation(format!(
                "game.toml::history.worst_surface_metric `{}` is unsupported (expected slowdown/time_spent)",
                self.game.history.worst_surface_metric
            )));
        }

        for (index, surface) in self.surfaces.surfaces.iter().enumerate() {
            if surface.friction < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "surfaces.toml::surfaces[{index}].friction must be >= 0"
                )));
            }
            if surface.length <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "surfaces.toml::surfaces[{index}].length must be > 0"
                )));
            }
            for (slope_index, slope) in surface.slopes.iter().enumerate() {
                if slope.length <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "surfaces.toml::surfaces[{index}].slopes[{slope_index}].length must be > 0"
                    )));
                }
                if slope.angle_degrees.abs() >= 90.0 {
                    return Err(ConfigError::Validation(format!(
                        "surfaces.toml::surfaces[{index}].slopes[{slope_index}].angle_degrees must be within (-90, 90)"
                    )));
                }
            }
        }

        for (index, preset) in self.game.presets.iter().enumerate() {
            if preset.gravity.is_some_and(|gravity| gravity <= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "game.toml::presets[{index}].gravity must be > 0"
                )));
            }
            if preset.max_velocity.is_some_and(|speed| speed <= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "game.toml::presets[{index}].max_velocity must be > 0"
                )));
            }
        }

        Ok(())
    }

    /// Overlays a named preset onto `[physics]`.
    pub fn apply_preset(&mut self, preset_id: &str) -> Result<(), ConfigError> {
        let Some(preset) = self.presets_by_id.get(preset_id) else {
            return Err(ConfigError::Validation(format!(
                "unknown physics preset `{preset_id}`"
            )));
        };
        preset.apply_to(&mut self.game.physics);
        self.game.app.default_preset = Some(preset_id.to_string());
        Ok(())
    }

    /// Core configuration in track order, clamped to safe minimums.
    pub fn simulation_config(&self) -> SimulationConfig {
        let physics = &self.game.physics;
        let layout = match self.game.track.layout.as_str() {
            "per_surface" => TrackLayout::PerSurface(
                self.surfaces
                    .surfaces
                    .iter()
                    .map(|surface| (surface.id.clone(), surface.length))
                    .collect(),
            ),
            _ => TrackLayout::EqualSplit {
                total_length: self.game.track.total_length,
            },
        };

        SimulationConfig {
            physics: PhysicsParams {
                gravity: physics.gravity,
                engine_acceleration: physics.engine_acceleration,
                brake_deceleration: physics.brake_deceleration,
                mass: physics.mass,
                max_velocity: physics.max_velocity,
                max_step_s: physics.max_step_s,
                brake_mode: match physics.brake_mode.as_str() {
                    "oppose_motion" => BrakeMode::OpposeMotion,
                    _ => BrakeMode::Fixed,
                },
            },
            surfaces: self
                .surfaces
                .surfaces
                .iter()
                .map(SurfaceConfig::to_definition)
                .collect(),
            layout,
            history: HistorySettings {
                sample_interval_s: self.game.history.sample_interval_s,
                slowdown_threshold: self.game.history.slowdown_threshold,
                worst_surface_metric: match self.game.history.worst_surface_metric.as_str() {
                    "time_spent" => WorstSurfaceMetric::TimeSpent,
                    _ => WorstSurfaceMetric::Slowdown,
                },
            },
        }
        .sanitized()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub physics: PhysicsConfig,
    pub track: TrackConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub presets: Vec<PresetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default)]
    pub default_preset: Option<String>,
    pub debug_overlay: bool,
}

fn default_window_title() -> String {
    "Slope Sprint".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub engine_acceleration: f32,
    pub brake_deceleration: f32,
    pub mass: f32,
    pub max_velocity: f32,
    #[serde(default = "default_max_step_s")]
    pub max_step_s: f32,
    #[serde(default = "default_brake_mode")]
    pub brake_mode: String,
}

fn default_max_step_s() -> f32 {
    0.1
}

fn default_brake_mode() -> String {
    "fixed".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    pub layout: String,
    pub total_length: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_sample_interval_s")]
    pub sample_interval_s: f32,
    #[serde(default = "default_slowdown_threshold")]
    pub slowdown_threshold: f32,
    #[serde(default = "default_worst_surface_metric")]
    pub worst_surface_metric: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            sample_interval_s: default_sample_interval_s(),
            slowdown_threshold: default_slowdown_threshold(),
            worst_surface_metric: default_worst_surface_metric(),
        }
    }
}

fn default_sample_interval_s() -> f32 {
    0.1
}

fn default_slowdown_threshold() -> f32 {
    0.5
}

fn default_worst_surface_metric() -> String {
    "slowdown".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub gravity: Option<f32>,
    #[serde(default)]
    pub engine_acceleration: Option<f32>,
    #[serde(default)]
    pub brake_deceleration: Option<f32>,
    #[serde(default)]
    pub mass: Option<f32>,
    #[serde(default)]
    pub max_velocity: Option<f32>,
}

impl PresetConfig {
    pub fn apply_to(&self, physics: &mut PhysicsConfig) {
        if let Some(gravity) = self.gravity {
            physics.gravity = gravity;
        }
        if let Some(engine_acceleration) = self.engine_acceleration {
            physics.engine_acceleration = engine_acceleration;
        }
        if let Some(brake_deceleration) = self.brake_deceleration {
            physics.brake_deceleration = brake_deceleration;
        }
        if let Some(mass) = self.mass {
            physics.mass = mass;
        }
        if let Some(max_velocity) = self.max_velocity {
            physics.max_velocity = max_velocity;
        }
    }
}

impl HasId for PresetConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurfacesFile {
    pub surfaces: Vec<SurfaceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceConfig {
    pub id: String,
    pub friction: f32,
    pub length: f32,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub slopes: Vec<SlopeStepConfig>,
}

impl SurfaceConfig {
    fn to_definition(&self) -> SurfaceDefinition {
        SurfaceDefinition {
            name: self.id.clone(),
            friction_coefficient: self.friction,
            base_length: self.length,
            slope_profile: self
                .slopes
                .iter()
                .map(|slope| SlopeProfileStep {
                    angle_degrees: slope.angle_degrees,
                    base_length: slope.length,
                })
                .collect(),
        }
    }
}

impl HasId for SurfaceConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlopeStepConfig {
    pub angle_degrees: f32,
    pub length: f32,
}


#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::parse_files;

    #[test]
    fn defaults_fill_optional_sections() {
        let (game, _) = parse_files();
        assert_eq!(game.app.window_title, "Slope Sprint");
        assert_eq!(game.physics.brake_mode, "fixed");
        assert_eq!(game.physics.max_step_s, 0.1);
        assert_eq!(game.history.worst_surface_metric, "slowdown");
    }

    #[test]
    fn default_preset_overlays_physics() {
        let (game, surfaces) = parse_files();
        let config = GameConfig::from_files(game, surfaces).expect("config validates");

        assert_eq!(config.game.physics.gravity, 1.62);
        assert_eq!(config.game.physics.max_velocity, 25.0);
        assert_eq!(config.game.physics.engine_acceleration, 6.0);
    }

    #[test]
    fn simulation_config_keeps_track_order_and_profiles() {
        let (mut game, surfaces) = parse_files();
        game.track.layout = "per_surface".to_string();
        let config = GameConfig::from_files(game, surfaces).expect("config validates");
        let simulation_config = config.simulation_config();

        assert_eq!(simulation_config.surfaces[0].name, "ICE");
        assert_eq!(simulation_config.surfaces[1].slope_profile.len(), 2);
        assert_eq!(simulation_config.physics.brake_mode, BrakeMode::Fixed);
        let TrackLayout::PerSurface(lengths) = &simulation_config.layout else {
            panic!("per_surface layout expected");
        };
        assert_eq!(lengths["SAND"], 120.0);
    }

    #[test]
    fn validation_fails_for_missing_preset_reference() {
        let (mut game, surfaces) = parse_files();
        game.app.default_preset = Some("jupiter".to_string());

        let error = GameConfig::from_files(game, surfaces).expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("default_preset"));
        assert!(message.contains("jupiter"));
    }

    #[test]
    fn validation_fails_for_duplicate_surface_ids() {
        let (game, mut surfaces) = parse_files();
        surfaces.surfaces[1].id = "ICE".to_string();

        let error = GameConfig::from_files(game, surfaces).expect_err("validation should fail");
        assert!(error.to_string().contains("duplicate id `ICE`"));
    }

    #[test]
    fn validation_fails_for_positive_brake() {
        let (mut game, surfaces) = parse_files();
        game.physics.brake_deceleration = 3.0;

        let error = GameConfig::from_files(game, surfaces).expect_err("validation should fail");
        assert!(error.to_string().contains("brake_deceleration"));
    }

    #[test]
    fn validation_fails_for_unknown_layout() {
        let (mut game, surfaces) = parse_files();
        game.track.layout = "spiral".to_string();

        let error = GameConfig::from_files(game, surfaces).expect_err("validation should fail");
        assert!(error.to_string().contains("spiral"));
    }
}
