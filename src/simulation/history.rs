use super::integrator::KinematicState;
use super::terrain::TerrainModel;
use serde::Serialize;

pub const DEFAULT_SAMPLE_INTERVAL_S: f32 = 0.1;
pub const DEFAULT_SLOWDOWN_THRESHOLD_MPS2: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistorySample {
    pub time: f32,
    pub position: f32,
    pub velocity: f32,
    pub friction_coefficient: f32,
    pub slope_angle_degrees: f32,
}

/// Throttled sample buffer used for the post-run graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunHistory {
    sample_interval_s: f32,
    samples: Vec<HistorySample>,
}

impl RunHistory {
    pub fn new(sample_interval_s: f32) -> Self {
        Self {
            sample_interval_s: sample_interval_s.max(0.0),
            samples: Vec::new(),
        }
    }

    /// Appends `sample` when the buffer is empty or the gap since the last one exceeds
    /// the interval.
    pub fn record(&mut self, sample: HistorySample) -> bool {
        let due = match self.samples.last() {
            None => true,
            Some(last) => sample.time - last.time > self.sample_interval_s,
        };
        if due {
            self.samples.push(sample);
        }
        due
    }

    /// Appends `sample` regardless of the interval unless it repeats the last timestamp.
    pub fn record_final(&mut self, sample: HistorySample) {
        if self.samples.last().is_some_and(|last| last.time >= sample.time) {
            return;
        }
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[HistorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WorstSurfaceMetric {
    #[default]
    Slowdown,
    TimeSpent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceStats {
    pub name: String,
    pub time_on_surface_s: f32,
    /// Velocity lost while decelerating harder than the slowdown threshold.
    pub slowdown_accumulated_mps: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    slowdown_threshold: f32,
    max_velocity_observed: f32,
    per_surface: Vec<SurfaceStats>,
}

impl RunStatistics {
    /// One entry per surface, in track order.
    pub fn new(terrain: &TerrainModel, slowdown_threshold: f32) -> Self {
        Self {
            slowdown_threshold: slowdown_threshold.max(0.0),
            max_velocity_observed: 0.0,
            per_surface: terrain
                .surfaces()
                .iter()
                .map(|surface| SurfaceStats {
                    name: surface.name.clone(),
                    time_on_surface_s: 0.0,
                    slowdown_accumulated_mps: 0.0,
                })
                .collect(),
        }
    }

    pub fn accumulate(&mut self, surface_index: usize, dt: f32, acceleration: f32) {
        let Some(stats) = self.per_surface.get_mut(surface_index) else {
            return;
        };
        stats.time_on_surface_s += dt;
        if acceleration < -self.slowdown_threshold {
            stats.slowdown_accumulated_mps += acceleration.abs() * dt;
        }
    }

    pub fn observe_velocity(&mut self, velocity: f32) {
        self.max_velocity_observed = self.max_velocity_observed.max(velocity);
    }

    pub fn max_velocity_observed(&self) -> f32 {
        self.max_velocity_observed
    }

    pub fn per_surface(&self) -> &[SurfaceStats] {
        &self.per_surface
    }

    /// Surface with the highest metric; ties keep the earliest surface on the track, so a
    /// run with no slowdown at all reports the first surface. `None` only for an empty track.
    pub fn worst_surface(&self, metric: WorstSurfaceMetric) -> Option<&SurfaceStats> {
        let value = |stats: &SurfaceStats| match metric {
            WorstSurfaceMetric::Slowdown => stats.slowdown_accumulated_mps,
            WorstSurfaceMetric::TimeSpent => stats.time_on_surface_s,
        };

        let mut worst: Option<&SurfaceStats> = None;
        for stats in &self.per_surface {
            if worst.is_none_or(|current| value(stats) > value(current)) {
                worst = Some(stats);
            }
        }
        worst
    }

    pub fn finalize(
        &self,
        state: &KinematicState,
        track_length: f32,
        metric: WorstSurfaceMetric,
        history: &RunHistory,
    ) -> RunResults {
        RunResults {
            final_distance: state.position.min(track_length),
            final_time: state.elapsed_time,
            average_speed: average_speed(track_length, state.elapsed_time),
            max_speed: self.max_velocity_observed,
            worst_surface_name: self
                .worst_surface(metric)
                .map(|stats| stats.name.clone()),
            surface_stats: self.per_surface.clone(),
            history_samples: history.samples().to_vec(),
        }
    }
}

/// `track_length / elapsed`, or zero before any time has passed.
pub fn average_speed(track_length: f32, elapsed_time_s: f32) -> f32 {
    if elapsed_time_s <= f32::EPSILON || !elapsed_time_s.is_finite() {
        return 0.0;
    }
    track_length / elapsed_time_s
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResults {
    pub final_distance: f32,
    pub final_time: f32,
    pub average_speed: f32,
    pub max_speed: f32,
    pub worst_surface_name: Option<String>,
    pub surface_stats: Vec<SurfaceStats>,
    pub history_samples: Vec<HistorySample>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::terrain::{SurfaceDefinition, TrackLayout};

    fn sample_at(time: f32) -> HistorySample {
        HistorySample {
            time,
            position: time * 2.0,
            velocity: 2.0,
            friction_coefficient: 0.1,
            slope_angle_degrees: 0.0,
        }
    }

    fn three_surface_terrain() -> TerrainModel {
        let definitions: Vec<SurfaceDefinition> = ["ICE", "SAND", "WOOD"]
            .iter()
            .map(|name| SurfaceDefinition {
                name: name.to_string(),
                friction_coefficient: 0.2,
                base_length: 100.0,
                slope_profile: Vec::new(),
            })
            .collect();
        TerrainModel::build(
            &definitions,
            &TrackLayout::EqualSplit {
                total_length: 300.0,
            },
        )
        .expect("terrain builds")
    }

    #[test]
    fn history_is_throttled_by_sample_interval() {
        let mut history = RunHistory::new(0.1);
        let mut time = 0.0_f32;
        for _ in 0..100 {
            time += 0.01;
            history.record(sample_at(time));
        }

        assert!(
            (8..=11).contains(&history.len()),
            "expected about 10 samples, got {}",
            history.len()
        );
        for pair in history.samples().windows(2) {
            assert!(pair[1].time - pair[0].time > 0.1);
        }
    }

    #[test]
    fn history_clear_restarts_sampling() {
        let mut history = RunHistory::new(0.5);
        assert!(history.record(sample_at(0.0)));
        assert!(!history.record(sample_at(0.2)));
        history.clear();
        assert!(history.is_empty());
        assert!(history.record(sample_at(0.2)));
    }

    #[test]
    fn slowdown_only_counts_hard_deceleration() {
        let terrain = three_surface_terrain();
        let mut stats = RunStatistics::new(&terrain, 0.5);

        stats.accumulate(0, 0.1, -0.4);
        stats.accumulate(1, 0.1, -3.0);
        stats.accumulate(2, 0.2, 2.0);

        let per_surface = stats.per_surface();
        assert_eq!(per_surface[0].slowdown_accumulated_mps, 0.0);
        assert!((per_surface[0].time_on_surface_s - 0.1).abs() < 1e-6);
        assert!((per_surface[1].slowdown_accumulated_mps - 0.3).abs() < 1e-6);
        assert!((per_surface[2].time_on_surface_s - 0.2).abs() < 1e-6);
    }

    #[test]
    fn worst_surface_prefers_first_on_ties() {
        let terrain = three_surface_terrain();
        let mut stats = RunStatistics::new(&terrain, 0.5);

        stats.accumulate(1, 0.5, -2.0);
        stats.accumulate(2, 0.5, -2.0);
        stats.accumulate(0, 2.0, 1.0);

        let worst = stats
            .worst_surface(WorstSurfaceMetric::Slowdown)
            .expect("slowdown recorded");
        assert_eq!(worst.name, "SAND");

        let longest = stats
            .worst_surface(WorstSurfaceMetric::TimeSpent)
            .expect("time recorded");
        assert_eq!(longest.name, "ICE");
    }

    #[test]
    fn finalize_guards_zero_elapsed_time() {
        let terrain = three_surface_terrain();
        let stats = RunStatistics::new(&terrain, 0.5);
        let history = RunHistory::new(0.1);

        let results = stats.finalize(
            &KinematicState::default(),
            terrain.track_length(),
            WorstSurfaceMetric::Slowdown,
            &history,
        );
        assert_eq!(results.average_speed, 0.0);
        assert_eq!(results.final_distance, 0.0);
    }

    #[test]
    fn worst_surface_without_slowdown_is_first_surface() {
        let terrain = three_surface_terrain();
        let mut stats = RunStatistics::new(&terrain, 0.5);
        for index in 0..3 {
            stats.accumulate(index, 10.0, 2.0);
            stats.accumulate(index, 1.0, -0.2);
        }
        assert!(stats
            .per_surface()
            .iter()
            .all(|surface| surface.slowdown_accumulated_mps == 0.0));

        let worst = stats
            .worst_surface(WorstSurfaceMetric::Slowdown)
            .expect("non-empty track always has a worst surface");
        assert_eq!(worst.name, "ICE");

        let history = RunHistory::new(0.1);
        let state = KinematicState {
            position: 300.0,
            elapsed_time: 33.0,
            finished: true,
            ..KinematicState::default()
        };
        let results = stats.finalize(&state, 300.0, WorstSurfaceMetric::Slowdown, &history);
        assert_eq!(results.worst_surface_name.as_deref(), Some("ICE"));
    }

    #[test]
    fn final_sample_bypasses_throttle() {
        let mut history = RunHistory::new(0.5);
        assert!(history.record(sample_at(0.0)));
        assert!(!history.record(sample_at(0.2)));

        history.record_final(sample_at(0.2));
        history.record_final(sample_at(0.2));

        assert_eq!(history.len(), 2);
        assert_eq!(history.samples()[1].time, 0.2);
    }

    #[test]
    fn finalize_reports_run_summary() {
        let terrain = three_surface_terrain();
        let mut stats = RunStatistics::new(&terrain, 0.5);
        let mut history = RunHistory::new(0.1);
        stats.observe_velocity(12.0);
        stats.observe_velocity(9.0);
        stats.accumulate(2, 1.0, -1.5);
        history.record(sample_at(0.0));

        let state = KinematicState {
            position: 300.0,
            elapsed_time: 30.0,
            finished: true,
            ..KinematicState::default()
        };
        let results = stats.finalize(&state, 300.0, WorstSurfaceMetric::Slowdown, &history);

        assert_eq!(results.final_distance, 300.0);
        assert_eq!(results.average_speed, 10.0);
        assert_eq!(results.max_speed, 12.0);
        assert_eq!(results.worst_surface_name.as_deref(), Some("WOOD"));
        assert_eq!(results.history_samples.len(), 1);
    }
}
