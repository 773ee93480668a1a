use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Shortest length a surface may be stretched or split down to.
pub const MIN_SURFACE_LENGTH_M: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeProfileStep {
    pub angle_degrees: f32,
    pub base_length: f32,
}

/// A named surface before it is laid out on a concrete track.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDefinition {
    pub name: String,
    pub friction_coefficient: f32,
    pub base_length: f32,
    pub slope_profile: Vec<SlopeProfileStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackLayout {
    /// Explicit length per surface name; surfaces not listed keep their base length.
    PerSurface(HashMap<String, f32>),
    /// One total length split evenly, each share floored at [`MIN_SURFACE_LENGTH_M`].
    EqualSplit { total_length: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeSegment {
    pub start: f32,
    pub end: f32,
    pub angle_degrees: f32,
}

impl SlopeSegment {
    const FLAT: SlopeSegment = SlopeSegment {
        start: 0.0,
        end: 0.0,
        angle_degrees: 0.0,
    };

    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    pub fn angle_radians(&self) -> f32 {
        self.angle_degrees.to_radians()
    }

    pub fn contains(&self, position: f32) -> bool {
        self.start <= position && position < self.end
    }

    /// Height gained over the whole segment.
    pub fn rise(&self) -> f32 {
        self.length() * self.angle_radians().tan()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSegment {
    pub name: String,
    pub friction_coefficient: f32,
    pub start: f32,
    pub end: f32,
    pub slopes: Vec<SlopeSegment>,
}

impl SurfaceSegment {
    pub fn length(&self) -> f32 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerrainError {
    NoSurfaces,
    EmptyName { index: usize },
    DuplicateName(String),
    InvalidFriction { name: String, value: f32 },
    InvalidLength { name: String, value: f32 },
    InvalidSlopeStep { name: String, step: usize },
}

impl Display for TerrainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSurfaces => write!(f, "track needs at least one surface"),
            Self::EmptyName { index } => write!(f, "surface[{index}] has an empty name"),
            Self::DuplicateName(name) => write!(f, "surface name `{name}` is used twice"),
            Self::InvalidFriction { name, value } => write!(
                f,
                "surface `{name}` friction coefficient must be finite and >= 0 (got {value})"
            ),
            Self::InvalidLength { name, value } => write!(
                f,
                "surface `{name}` length must be finite and > 0 (got {value})"
            ),
            Self::InvalidSlopeStep { name, step } => write!(
                f,
                "surface `{name}` slope step {step} needs a finite angle and a length > 0"
            ),
        }
    }
}

impl Error for TerrainError {}

/// Concrete track: ordered, contiguous surfaces covering `[0, track_length)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainModel {
    surfaces: Vec<SurfaceSegment>,
    track_length: f32,
}

impl TerrainModel {
    pub fn build(
        definitions: &[SurfaceDefinition],
        layout: &TrackLayout,
    ) -> Result<Self, TerrainError> {
        if definitions.is_empty() {
            return Err(TerrainError::NoSurfaces);
        }
        validate_definitions(definitions)?;

        let surface_count = definitions.len() as f32;
        let mut surfaces = Vec::with_capacity(definitions.len());
        let mut cursor = 0.0_f32;
        for definition in definitions {
            let length = match layout {
                TrackLayout::EqualSplit { total_length } => {
                    (total_length / surface_count).max(MIN_SURFACE_LENGTH_M)
                }
                TrackLayout::PerSurface(lengths) => lengths
                    .get(&definition.name)
                    .copied()
                    .unwrap_or(definition.base_length),
            };
            if !length.is_finite() || length <= 0.0 {
                return Err(TerrainError::InvalidLength {
                    name: definition.name.clone(),
                    value: length,
                });
            }

            let start = cursor;
            let end = start + length;
            surfaces.push(SurfaceSegment {
                name: definition.name.clone(),
                friction_coefficient: definition.friction_coefficient,
                start,
                end,
                slopes: scale_slope_profile(&definition.slope_profile, start, end),
            });
            cursor = end;
        }

        Ok(Self {
            surfaces,
            track_length: cursor,
        })
    }

    pub fn track_length(&self) -> f32 {
        self.track_length
    }

    pub fn surfaces(&self) -> &[SurfaceSegment] {
        &self.surfaces
    }

    /// Index of the surface under `position`; out-of-range positions clamp to the ends.
    pub fn surface_index_at(&self, position: f32) -> usize {
        let last = self.surfaces.len() - 1;
        if position >= self.track_length {
            return last;
        }
        // First surface whose end lies past the position; boundaries go to the next one.
        self.surfaces
            .partition_point(|surface| surface.end <= position)
            .min(last)
    }

    pub fn surface_at(&self, position: f32) -> &SurfaceSegment {
        &self.surfaces[self.surface_index_at(position)]
    }

    /// Slope under `position` inside `surface`, flat when nothing matches.
    pub fn slope_at(surface: &SurfaceSegment, position: f32) -> SlopeSegment {
        surface
            .slopes
            .iter()
            .find(|slope| slope.contains(position))
            .copied()
            .unwrap_or(SlopeSegment::FLAT)
    }

    pub fn slope_angle_at(&self, position: f32) -> f32 {
        Self::slope_at(self.surface_at(position), position).angle_degrees
    }

    pub fn elevation_at(&self, position: f32) -> f32 {
        let position = position.clamp(0.0, self.track_length);
        let mut elevation = 0.0_f32;
        for slope in self.surfaces.iter().flat_map(|surface| &surface.slopes) {
            if slope.end <= position {
                elevation += slope.rise();
            } else {
                if slope.start <= position {
                    elevation += (position - slope.start) * slope.angle_radians().tan();
                }
                break;
            }
        }
        elevation
    }
}

fn validate_definitions(definitions: &[SurfaceDefinition]) -> Result<(), TerrainError> {
    for (index, definition) in definitions.iter().enumerate() {
        if definition.name.trim().is_empty() {
            return Err(TerrainError::EmptyName { index });
        }
        if definitions[..index]
            .iter()
            .any(|earlier| earlier.name == definition.name)
        {
            return Err(TerrainError::DuplicateName(definition.name.clone()));
        }
        if !definition.friction_coefficient.is_finite() || definition.friction_coefficient < 0.0 {
            return Err(TerrainError::InvalidFriction {
                name: definition.name.clone(),
                value: definition.friction_coefficient,
            });
        }
        for (step_index, step) in definition.slope_profile.iter().enumerate() {
            if !step.angle_degrees.is_finite()
                || !step.base_length.is_finite()
                || step.base_length <= 0.0
            {
                return Err(TerrainError::InvalidSlopeStep {
                    name: definition.name.clone(),
                    step: step_index,
                });
            }
        }
    }
    Ok(())
}

fn scale_slope_profile(profile: &[SlopeProfileStep], start: f32, end: f32) -> Vec<SlopeSegment> {
    let reference_length: f32 = profile.iter().map(|step| step.base_length).sum();
    if profile.is_empty() || reference_length <= f32::EPSILON {
        return vec![SlopeSegment {
            start,
            end,
            angle_degrees: 0.0,
        }];
    }

    let scale = (end - start) / reference_length;
    let mut slopes = Vec::with_capacity(profile.len());
    let mut cursor = start;
    for (index, step) in profile.iter().enumerate() {
        let slope_end = if index + 1 == profile.len() {
            end
        } else {
            cursor + step.base_length * scale
        };
        slopes.push(SlopeSegment {
            start: cursor,
            end: slope_end,
            angle_degrees: step.angle_degrees,
        });
        cursor = slope_end;
    }
    slopes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(name: &str, friction: f32) -> SurfaceDefinition {
        SurfaceDefinition {
            name: name.to_string(),
            friction_coefficient: friction,
            base_length: 100.0,
            slope_profile: Vec::new(),
        }
    }

    fn hilly(name: &str) -> SurfaceDefinition {
        SurfaceDefinition {
            name: name.to_string(),
            friction_coefficient: 0.4,
            base_length: 100.0,
            slope_profile: vec![
                SlopeProfileStep {
                    angle_degrees: 0.0,
                    base_length: 30.0,
                },
                SlopeProfileStep {
                    angle_degrees: 8.0,
                    base_length: 40.0,
                },
                SlopeProfileStep {
                    angle_degrees: -5.0,
                    base_length: 30.0,
                },
            ],
        }
    }

    fn assert_covers_track(terrain: &TerrainModel) {
        let surfaces = terrain.surfaces();
        assert_eq!(surfaces[0].start, 0.0);
        assert_eq!(surfaces[surfaces.len() - 1].end, terrain.track_length());
        for pair in surfaces.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for surface in surfaces {
            assert!(surface.start < surface.end);
            assert_eq!(surface.slopes[0].start, surface.start);
            assert_eq!(surface.slopes[surface.slopes.len() - 1].end, surface.end);
            for pair in surface.slopes.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
    }

    #[test]
    fn equal_thirds_cover_track_without_gaps() {
        let definitions = vec![flat("ICE", 0.1), hilly("SAND"), flat("WOOD", 0.3)];
        let terrain = TerrainModel::build(
            &definitions,
            &TrackLayout::EqualSplit {
                total_length: 300.0,
            },
        )
        .expect("terrain builds");

        assert_covers_track(&terrain);
        assert_eq!(terrain.track_length(), 300.0);
        assert_eq!(terrain.surfaces()[1].start, 100.0);
        assert_eq!(terrain.surfaces()[2].start, 200.0);
    }

    #[test]
    fn custom_asymmetric_lengths_cover_track() {
        let definitions = vec![hilly("ICE"), hilly("SAND"), hilly("WOOD")];
        let lengths = HashMap::from([
            ("ICE".to_string(), 73.3),
            ("SAND".to_string(), 211.7),
            ("WOOD".to_string(), 58.9),
        ]);
        let terrain = TerrainModel::build(&definitions, &TrackLayout::PerSurface(lengths))
            .expect("terrain builds");

        assert_covers_track(&terrain);
        assert!((terrain.track_length() - 343.9).abs() < 1e-3);
        assert!((terrain.surfaces()[1].length() - 211.7).abs() < 1e-3);
    }

    #[test]
    fn equal_split_respects_minimum_floor() {
        let definitions = vec![flat("ICE", 0.1), flat("SAND", 0.6), flat("WOOD", 0.3)];
        let terrain = TerrainModel::build(
            &definitions,
            &TrackLayout::EqualSplit { total_length: 60.0 },
        )
        .expect("terrain builds");

        assert_covers_track(&terrain);
        for surface in terrain.surfaces() {
            assert_eq!(surface.length(), MIN_SURFACE_LENGTH_M);
        }
        assert_eq!(terrain.track_length(), 150.0);
    }

    #[test]
    fn slope_profile_scales_lengths_and_keeps_angles() {
        let lengths = HashMap::from([("SAND".to_string(), 200.0)]);
        let terrain = TerrainModel::build(&[hilly("SAND")], &TrackLayout::PerSurface(lengths))
            .expect("terrain builds");
        let slopes = &terrain.surfaces()[0].slopes;

        assert_eq!(slopes.len(), 3);
        assert!((slopes[0].length() - 60.0).abs() < 1e-4);
        assert!((slopes[1].length() - 80.0).abs() < 1e-4);
        assert!((slopes[2].length() - 60.0).abs() < 1e-4);
        assert_eq!(slopes[1].angle_degrees, 8.0);
        assert_eq!(slopes[2].angle_degrees, -5.0);
    }

    #[test]
    fn surface_lookup_uses_half_open_ranges_and_clamps_at_end() {
        let definitions = vec![flat("ICE", 0.1), flat("SAND", 0.6), flat("WOOD", 0.3)];
        let terrain = TerrainModel::build(
            &definitions,
            &TrackLayout::EqualSplit {
                total_length: 300.0,
            },
        )
        .expect("terrain builds");

        assert_eq!(terrain.surface_at(150.0).name, "SAND");
        assert_eq!(terrain.surface_at(100.0).name, "SAND");
        assert_eq!(terrain.surface_at(99.999).name, "ICE");
        assert_eq!(terrain.surface_at(300.0).name, "WOOD");
        assert_eq!(terrain.surface_at(1_000.0).name, "WOOD");
        assert_eq!(terrain.surface_at(-4.0).name, "ICE");
    }

    #[test]
    fn slope_lookup_falls_back_to_flat_outside_surface() {
        let terrain = TerrainModel::build(
            &[hilly("SAND")],
            &TrackLayout::EqualSplit {
                total_length: 100.0,
            },
        )
        .expect("terrain builds");
        let surface = terrain.surface_at(50.0);

        assert_eq!(TerrainModel::slope_at(surface, 50.0).angle_degrees, 8.0);
        assert_eq!(TerrainModel::slope_at(surface, 30.0).angle_degrees, 8.0);
        assert_eq!(TerrainModel::slope_at(surface, 100.0).angle_degrees, 0.0);
    }

    #[test]
    fn elevation_matches_slope_within_segment() {
        let terrain = TerrainModel::build(
            &[hilly("SAND")],
            &TrackLayout::EqualSplit {
                total_length: 100.0,
            },
        )
        .expect("terrain builds");
        let tan = 8.0_f32.to_radians().tan();

        let delta = terrain.elevation_at(60.0) - terrain.elevation_at(40.0);
        assert!((delta - 20.0 * tan).abs() < 1e-4);
        assert_eq!(terrain.elevation_at(10.0), 0.0);
    }

    #[test]
    fn elevation_is_continuous_across_boundaries() {
        let definitions = vec![hilly("ICE"), hilly("SAND"), hilly("WOOD")];
        let terrain = TerrainModel::build(
            &definitions,
            &TrackLayout::EqualSplit {
                total_length: 450.0,
            },
        )
        .expect("terrain builds");

        for slope in terrain.surfaces().iter().flat_map(|surface| &surface.slopes) {
            let before = terrain.elevation_at(slope.start - 1e-3);
            let at = terrain.elevation_at(slope.start);
            assert!((at - before).abs() < 1e-3, "jump at {}", slope.start);
        }

        let expected_total: f32 = terrain
            .surfaces()
            .iter()
            .flat_map(|surface| &surface.slopes)
            .map(SlopeSegment::rise)
            .sum();
        assert!((terrain.elevation_at(terrain.track_length()) - expected_total).abs() < 1e-3);
        assert_eq!(
            terrain.elevation_at(terrain.track_length() + 25.0),
            terrain.elevation_at(terrain.track_length())
        );
    }

    #[test]
    fn build_rejects_invalid_definitions() {
        let error = TerrainModel::build(&[], &TrackLayout::EqualSplit { total_length: 10.0 })
            .expect_err("empty track should fail");
        assert_eq!(error, TerrainError::NoSurfaces);

        let error = TerrainModel::build(
            &[flat("ICE", 0.1), flat("ICE", 0.2)],
            &TrackLayout::EqualSplit {
                total_length: 200.0,
            },
        )
        .expect_err("duplicate names should fail");
        assert!(error.to_string().contains("ICE"));

        let error = TerrainModel::build(
            &[flat("MUD", -0.5)],
            &TrackLayout::EqualSplit {
                total_length: 200.0,
            },
        )
        .expect_err("negative friction should fail");
        assert!(matches!(error, TerrainError::InvalidFriction { .. }));

        let lengths = HashMap::from([("ICE".to_string(), 0.0)]);
        let error = TerrainModel::build(&[flat("ICE", 0.1)], &TrackLayout::PerSurface(lengths))
            .expect_err("zero length should fail");
        assert!(matches!(error, TerrainError::InvalidLength { .. }));
    }
}
