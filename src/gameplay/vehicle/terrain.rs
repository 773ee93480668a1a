use crate::simulation::terrain::TerrainModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct GroundTileSample {
    pub(super) x: f32,
    pub(super) top_y: f32,
    pub(super) angle_radians: f32,
    pub(super) surface_index: usize,
}

/// Tile centres from `-margin` to `track_length + margin`; the run-off beyond both ends stays flat.
pub(super) fn build_ground_tile_samples(
    terrain: &TerrainModel,
    tile_width_m: f32,
    margin_m: f32,
) -> Vec<GroundTileSample> {
    let tile_width_m = tile_width_m.max(0.1);
    let margin_m = margin_m.max(0.0);
    let span = terrain.track_length() + (margin_m * 2.0);
    let tile_count = (span / tile_width_m).ceil() as usize;

    let mut samples = Vec::with_capacity(tile_count);
    for index in 0..tile_count {
        let x = -margin_m + ((index as f32 + 0.5) * tile_width_m);
        let on_track = (0.0..terrain.track_length()).contains(&x);
        let angle_radians = if on_track {
            terrain.slope_angle_at(x).to_radians()
        } else {
            0.0
        };

        samples.push(GroundTileSample {
            x,
            top_y: terrain.elevation_at(x),
            angle_radians,
            surface_index: terrain.surface_index_at(x),
        });
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::terrain::{SlopeProfileStep, SurfaceDefinition, TrackLayout};

    fn hill_terrain() -> TerrainModel {
        let definitions = vec![
            SurfaceDefinition {
                name: "ICE".to_string(),
                friction_coefficient: 0.1,
                base_length: 100.0,
                slope_profile: Vec::new(),
            },
            SurfaceDefinition {
                name: "SAND".to_string(),
                friction_coefficient: 0.6,
                base_length: 100.0,
                slope_profile: vec![SlopeProfileStep {
                    angle_degrees: 10.0,
                    base_length: 100.0,
                }],
            },
        ];
        TerrainModel::build(
            &definitions,
            &TrackLayout::EqualSplit {
                total_length: 200.0,
            },
        )
        .expect("terrain builds")
    }

    #[test]
    fn tiles_cover_track_and_margins() {
        let terrain = hill_terrain();
        let samples = build_ground_tile_samples(&terrain, 2.0, 10.0);

        assert_eq!(samples.len(), 110);
        assert!(samples[0].x < 0.0);
        assert!(samples[samples.len() - 1].x > terrain.track_length());
    }

    #[test]
    fn tiles_follow_elevation_and_surfaces() {
        let terrain = hill_terrain();
        let samples = build_ground_tile_samples(&terrain, 2.0, 0.0);

        let flat = samples[10];
        assert_eq!(flat.surface_index, 0);
        assert_eq!(flat.top_y, 0.0);
        assert_eq!(flat.angle_radians, 0.0);

        let climbing = samples[75];
        assert_eq!(climbing.surface_index, 1);
        assert!(climbing.top_y > 0.0);
        assert!((climbing.angle_radians - 10.0_f32.to_radians()).abs() < 1e-5);
        assert!((climbing.top_y - terrain.elevation_at(climbing.x)).abs() < 1e-5);
    }

    #[test]
    fn run_off_past_finish_is_flat() {
        let terrain = hill_terrain();
        let samples = build_ground_tile_samples(&terrain, 2.0, 10.0);
        let last = samples[samples.len() - 1];

        assert_eq!(last.angle_radians, 0.0);
        assert_eq!(last.surface_index, 1);
        assert!((last.top_y - terrain.elevation_at(terrain.track_length())).abs() < 1e-5);
    }
}
