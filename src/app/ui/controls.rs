use std::collections::BTreeSet;

use eframe::egui::{self, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::engine::config::{CATEGORY_COLOR_FIELD, NodeShape, SizeScale};

use super::super::{SearchMatches, ViewModel};

const SEARCH_RESULT_ROWS: usize = 12;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

fn slider(
    ui: &mut Ui,
    value: &mut f32,
    range: std::ops::RangeInclusive<f32>,
    text: &str,
    hover: &str,
) {
    ui.add(
        egui::Slider::new(value, range)
            .text(text)
            .clamping(egui::SliderClamping::Always),
    )
    .on_hover_text(hover);
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        self.draw_search(ui);
        ui.separator();

        ui.horizontal_wrapped(|ui| {
            if ui
                .button("Reheat")
                .on_hover_text("Restart the layout from alpha 1.")
                .clicked()
            {
                self.engine.restart();
            }
            if ui
                .button("Pin all")
                .on_hover_text("Freeze every node where it stands.")
                .clicked()
            {
                self.engine.pin_all();
            }
            if ui
                .button("Unpin all")
                .on_hover_text("Release every pin and let the layout settle again.")
                .clicked()
            {
                self.engine.unpin_all();
            }
            if ui
                .button("Copy layout")
                .on_hover_text("Copy the current positions as a pinned JSON snapshot.")
                .clicked()
                && let Some(snapshot) = self.engine.to_snapshot(true)
            {
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(json) => ui.ctx().copy_text(json),
                    Err(error) => log::warn!("failed to serialize layout: {error}"),
                }
            }
        });

        ui.checkbox(&mut self.show_quadtree_overlay, "Show quadtree overlay")
            .on_hover_text("Draw the spatial index partitions over the graph canvas.");
        ui.checkbox(&mut self.show_fps_bar, "FPS Display")
            .on_hover_text("Show a live FPS readout in the header.");

        ui.collapsing("FPS Display tuning", |ui| {
            ui.add_enabled_ui(self.show_fps_bar, |ui| {
                ui.checkbox(&mut self.fps_show_current, "Show current FPS");
                ui.checkbox(&mut self.fps_show_average, "Show average FPS");
                ui.checkbox(&mut self.fps_show_low, "Show low FPS");
                ui.checkbox(&mut self.fps_show_high, "Show high FPS");
                ui.checkbox(&mut self.fps_show_frame_time, "Show render time");
            });
        });

        ui.separator();
        self.draw_appearance_controls(ui);
        ui.separator();
        self.draw_force_controls(ui);

        if *self.engine.config() != self.draft {
            self.apply_draft();
        }

        if let Some(error) = &self.config_error {
            ui.colored_label(egui::Color32::from_rgb(236, 112, 130), error.as_str());
        }
    }

    fn apply_draft(&mut self) {
        let patch = match serde_json::to_value(&self.draft) {
            Ok(patch) => patch,
            Err(error) => {
                self.config_error = Some(error.to_string());
                return;
            }
        };

        match self.engine.update_config(&patch) {
            Ok(()) => {
                self.config_error = None;
                self.draft = self.engine.config().clone();
            }
            Err(error) => {
                log::warn!("config update rejected: {error}");
                self.config_error = Some(error.to_string());
                self.draft = self.engine.config().clone();
            }
        }
    }

    fn metric_names(&self) -> BTreeSet<String> {
        self.engine
            .model()
            .map(|model| {
                model
                    .nodes()
                    .iter()
                    .take(512)
                    .flat_map(|node| node.metrics.keys().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn draw_appearance_controls(&mut self, ui: &mut Ui) {
        let metrics = self.metric_names();

        ui.label(RichText::new("Appearance").strong());
        egui::ComboBox::from_label("Size metric")
            .selected_text(self.draft.size_field.as_str())
            .show_ui(ui, |ui| {
                for name in &metrics {
                    ui.selectable_value(&mut self.draft.size_field, name.clone(), name.as_str());
                }
            });

        ui.horizontal_wrapped(|ui| {
            for scale in [SizeScale::Linear, SizeScale::Sqrt, SizeScale::Log] {
                ui.selectable_value(&mut self.draft.size_scale, scale, scale.label())
                    .on_hover_text("Scale applied to the size metric before mapping to radius.");
            }
        });

        egui::ComboBox::from_label("Color by")
            .selected_text(self.draft.color_field.as_str())
            .show_ui(ui, |ui| {
                ui.selectable_value(
                    &mut self.draft.color_field,
                    CATEGORY_COLOR_FIELD.to_owned(),
                    CATEGORY_COLOR_FIELD,
                );
                for name in &metrics {
                    ui.selectable_value(&mut self.draft.color_field, name.clone(), name.as_str());
                }
            });

        slider(
            ui,
            &mut self.draft.min_radius,
            1.0..=20.0,
            "Min radius",
            "Radius for the smallest metric value.",
        );
        slider(
            ui,
            &mut self.draft.max_radius,
            2.0..=60.0,
            "Max radius",
            "Radius for the largest metric value.",
        );
        slider(
            ui,
            &mut self.draft.label_zoom_threshold,
            0.1..=4.0,
            "Label zoom",
            "Node titles are drawn only at or above this zoom.",
        );

        ui.horizontal(|ui| {
            ui.radio_value(&mut self.draft.node_shape, NodeShape::Circle, "Circles");
            ui.radio_value(&mut self.draft.node_shape, NodeShape::Rectangle, "Rectangles");
        });

        ui.collapsing("Fidelity thresholds", |ui| {
            slider(
                ui,
                &mut self.draft.low_fps_threshold,
                5.0..=60.0,
                "Low FPS",
                "Two slower windows in a row switch to simplified rendering.",
            );
            slider(
                ui,
                &mut self.draft.high_fps_threshold,
                10.0..=120.0,
                "High FPS",
                "Three faster windows in a row restore full rendering.",
            );
        });
    }

    fn draw_force_controls(&mut self, ui: &mut Ui) {
        ui.collapsing("Physics tuning", |ui| {
            let draft = &mut self.draft;
            slider(
                ui,
                &mut draft.link.distance,
                5.0..=200.0,
                "Link distance",
                "Rest length of every link.",
            );
            slider(
                ui,
                &mut draft.link.strength,
                0.0..=2.0,
                "Link strength",
                "Multiplier on each link's own strength.",
            );
            slider(
                ui,
                &mut draft.charge.strength,
                -300.0..=0.0,
                "Repulsion",
                "Many-body charge; more negative pushes nodes further apart.",
            );
            slider(
                ui,
                &mut draft.charge.theta,
                0.3..=1.5,
                "Barnes-Hut theta",
                "Higher is faster and less exact.",
            );
            slider(
                ui,
                &mut draft.collision.strength,
                0.0..=1.0,
                "Collision",
                "How much of an overlap is resolved per pass.",
            );
            ui.add(
                egui::Slider::new(&mut draft.collision.iterations, 1..=6).text("Collision passes"),
            );
            slider(
                ui,
                &mut draft.center.strength,
                0.0..=0.3,
                "Centering",
                "Pull toward the layout center.",
            );
            slider(
                ui,
                &mut draft.simulation.velocity_decay,
                0.05..=0.9,
                "Velocity decay",
                "Fraction of velocity lost every tick.",
            );
            slider(
                ui,
                &mut draft.simulation.alpha_decay,
                0.001..=0.1,
                "Cooling rate",
                "How fast alpha falls toward zero.",
            );
        });
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.label("Search (title or id)")
            .on_hover_text("Fuzzy-match node titles, then select one or all matches.");
        let response = ui.text_edit_singleline(&mut self.search);
        if response.changed() {
            self.search_matches = None;
        }

        let query = self.search.trim().to_owned();
        if query.is_empty() {
            return;
        }

        let stale = self
            .search_matches
            .as_ref()
            .is_none_or(|matches| matches.query != query);
        if stale {
            self.search_matches = Some(SearchMatches {
                indices: self.fuzzy_matches(&query),
                query: query.clone(),
            });
        }

        let Some(matches) = &self.search_matches else {
            return;
        };
        let indices = matches.indices.clone();

        ui.horizontal(|ui| {
            ui.label(format!("{} match(es)", indices.len()));
            if ui
                .add_enabled(!indices.is_empty(), egui::Button::new("Select all"))
                .clicked()
            {
                self.engine.select_nodes(indices.iter().copied(), false);
            }
        });

        for &index in indices.iter().take(SEARCH_RESULT_ROWS) {
            let Some(node) = self.engine.model().and_then(|model| model.node(index)) else {
                continue;
            };
            let label = format!("{}  ({})", node.title, node.id);
            if ui.link(label).clicked() {
                self.engine.select_nodes([index], false);
            }
        }
    }

    fn fuzzy_matches(&self, query: &str) -> Vec<usize> {
        let Some(model) = self.engine.model() else {
            return Vec::new();
        };

        let matcher = SkimMatcherV2::default();
        let mut scored = model
            .nodes()
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                let score = fuzzy_match_score(&matcher, &node.title, query)
                    .max(fuzzy_match_score(&matcher, &node.id, query))?;
                Some((score, index))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, index)| index).collect()
    }
}
