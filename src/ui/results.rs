use crate::gameplay::TrackSimulation;
use crate::simulation::history::{HistorySample, RunResults};
use crate::states::GameState;
use bevy::app::AppExit;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use egui_plot::{Line, Plot, PlotPoints};

const GRAPH_WIDTH: f32 = 520.0;
const GRAPH_HEIGHT: f32 = 150.0;

pub struct ResultsScreenPlugin;

impl Plugin for ResultsScreenPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            EguiPrimaryContextPass,
            results_screen_ui
                .run_if(in_state(GameState::Results))
                .run_if(resource_exists::<TrackSimulation>),
        );
    }
}

fn results_screen_ui(
    mut egui_contexts: EguiContexts,
    track: Res<TrackSimulation>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: MessageWriter<AppExit>,
) {
    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };

    let mut new_run_clicked = false;
    let mut quit_clicked = false;
    egui::Window::new("Run Results")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            match track.simulation.results() {
                Some(results) => draw_results(ui, results),
                None => {
                    ui.label("No completed run to summarize.");
                }
            }

            ui.separator();
            ui.horizontal(|ui| {
                new_run_clicked = ui.button("New Run (Space)").clicked();
                quit_clicked = ui.button("Quit (Q)").clicked();
            });
        });

    if new_run_clicked {
        next_state.set(GameState::Boot);
    }
    if quit_clicked {
        exit.write(AppExit::Success);
    }
}

fn draw_results(ui: &mut egui::Ui, results: &RunResults) {
    egui::Grid::new("results_summary")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            ui.label("Distance");
            ui.label(format!("{:.1} m", results.final_distance));
            ui.end_row();
            ui.label("Time");
            ui.label(format!("{:.2} s", results.final_time));
            ui.end_row();
            ui.label("Average speed");
            ui.label(format!("{:.2} m/s", results.average_speed));
            ui.end_row();
            ui.label("Max speed");
            ui.label(format!("{:.2} m/s", results.max_speed));
            ui.end_row();
            ui.label("Worst surface");
            ui.label(results.worst_surface_name.as_deref().unwrap_or("none"));
            ui.end_row();
        });

    ui.add_space(6.0);
    ui.collapsing("Per surface", |ui| {
        egui::Grid::new("results_surfaces")
            .num_columns(3)
            .striped(true)
            .show(ui, |ui| {
                ui.strong("Surface");
                ui.strong("Time");
                ui.strong("Slowdown");
                ui.end_row();
                for stats in &results.surface_stats {
                    ui.label(&stats.name);
                    ui.label(format!("{:.2} s", stats.time_on_surface_s));
                    ui.label(format!("{:.2} m/s", stats.slowdown_accumulated_mps));
                    ui.end_row();
                }
            });
    });

    ui.add_space(6.0);
    ui.label("Speed over time");
    draw_series_graph(
        ui,
        "results_speed_plot",
        &results.history_samples,
        |sample| sample.velocity,
        egui::Color32::from_rgb(250, 158, 61),
        "m/s",
    );
    ui.label("Position over time");
    draw_series_graph(
        ui,
        "results_position_plot",
        &results.history_samples,
        |sample| sample.position,
        egui::Color32::from_rgb(97, 230, 87),
        "m",
    );
}

fn draw_series_graph(
    ui: &mut egui::Ui,
    id: &str,
    samples: &[HistorySample],
    value: impl Fn(&HistorySample) -> f32,
    color: egui::Color32,
    unit: &str,
) {
    if samples.len() < 2 {
        ui.weak("not enough samples");
        return;
    }

    Plot::new(id)
        .width(GRAPH_WIDTH)
        .height(GRAPH_HEIGHT)
        .allow_scroll(false)
        .include_x(0.0)
        .include_y(0.0)
        .x_axis_label("time (s)")
        .y_axis_label(unit)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(unit, series_points(samples, value)).color(color));
        });
}

/// `(time, value)` pairs for one sampled quantity.
fn series_points(
    samples: &[HistorySample],
    value: impl Fn(&HistorySample) -> f32,
) -> PlotPoints<'static> {
    samples
        .iter()
        .map(|sample| [f64::from(sample.time), f64::from(value(sample))])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(time: f32, velocity: f32) -> HistorySample {
        HistorySample {
            time,
            position: time * velocity,
            velocity,
            friction_coefficient: 0.1,
            slope_angle_degrees: 0.0,
        }
    }

    #[test]
    fn series_points_follow_run_time() {
        let samples = vec![sample(1.0, 0.0), sample(2.0, 5.0), sample(3.0, 10.0)];
        let speed = series_points(&samples, |sample| sample.velocity);
        let position = series_points(&samples, |sample| sample.position);

        let speed: Vec<[f64; 2]> = speed
            .points()
            .iter()
            .map(|point| [point.x, point.y])
            .collect();
        assert_eq!(speed, vec![[1.0, 0.0], [2.0, 5.0], [3.0, 10.0]]);
        assert_eq!(position.points()[2].y, 30.0);
    }

    #[test]
    fn series_points_are_empty_without_samples() {
        assert!(series_points(&[], |sample| sample.velocity).points().is_empty());
    }
}
