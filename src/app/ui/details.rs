use eframe::egui::{self, RichText, Ui};

use crate::util::format_metric;

use super::super::{NodeSummary, ViewModel};

const SELECTION_ROWS: usize = 64;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let categories = self
            .engine
            .model()
            .map(|model| model.categories().to_vec())
            .unwrap_or_default();
        let category_name = |summary: &NodeSummary| {
            categories
                .get(summary.category)
                .map_or("uncategorized", String::as_str)
                .to_owned()
        };

        let feed = self.details.borrow();

        ui.label(RichText::new("Hovered").strong());
        match &feed.hovered {
            Some(summary) => draw_summary(ui, summary, &category_name(summary)),
            None => {
                ui.label("Move the pointer over a node.");
            }
        }

        ui.separator();
        ui.label(RichText::new("Last clicked").strong());
        match &feed.clicked {
            Some(summary) => draw_summary(ui, summary, &category_name(summary)),
            None => {
                ui.label("Click a node to inspect it. Shift-click extends the selection.");
            }
        }

        ui.separator();
        ui.label(RichText::new(format!("Selection ({})", feed.selected.len())).strong());
        let mut focus = None;
        if feed.selected.is_empty() {
            ui.label("Nothing selected.");
        } else {
            egui::ScrollArea::vertical()
                .id_salt("selection_scroll")
                .max_height(260.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for summary in feed.selected.iter().take(SELECTION_ROWS) {
                        let metric = summary
                            .metrics
                            .get(&self.draft.size_field)
                            .map(|value| format_metric(*value))
                            .unwrap_or_else(|| "-".to_owned());
                        let label = format!(
                            "{}  [{}]  {}",
                            summary.title,
                            category_name(summary),
                            metric
                        );
                        if ui.link(label).on_hover_text(summary.id.as_str()).clicked() {
                            focus = Some(summary.id.clone());
                        }
                    }
                    if feed.selected.len() > SELECTION_ROWS {
                        ui.small(format!("... and {} more", feed.selected.len() - SELECTION_ROWS));
                    }
                });
        }
        drop(feed);

        if let Some(id) = focus
            && let Some(index) = self.engine.model().and_then(|model| model.index_of(&id))
        {
            self.engine.select_nodes([index], false);
        }

        self.draw_warnings(ui);
    }

    fn draw_warnings(&self, ui: &mut Ui) {
        let Some(model) = self.engine.model() else {
            return;
        };
        if model.warnings().is_empty() {
            return;
        }

        ui.separator();
        ui.collapsing(format!("Dataset warnings ({})", model.warnings().len()), |ui| {
            egui::ScrollArea::vertical()
                .id_salt("warnings_scroll")
                .max_height(200.0)
                .show(ui, |ui| {
                    for warning in model.warnings() {
                        ui.small(warning.to_string());
                    }
                });
        });
    }
}

fn draw_summary(ui: &mut Ui, summary: &NodeSummary, category: &str) {
    ui.label(RichText::new(summary.title.as_str()).strong());
    ui.small(summary.id.as_str());
    ui.label(format!("Category: {category}"));
    for (name, value) in &summary.metrics {
        ui.label(format!("{name}: {}", format_metric(*value)));
    }
    ui.label(format!(
        "Position: ({:.1}, {:.1}){}",
        summary.position.x,
        summary.position.y,
        if summary.pinned { ", pinned" } else { "" }
    ));
}
