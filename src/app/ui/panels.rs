use std::cell::RefCell;
use std::rc::Rc;

use eframe::egui::{self, Align, Context, Layout};

use crate::engine::Engine;
use crate::engine::config::EngineConfig;
use crate::engine::physics::SimulationState;
use crate::engine::snapshot::Snapshot;

use super::super::{CanvasInput, DetailsFeed, NodeSummary, ViewModel};

impl ViewModel {
    pub(in crate::app) fn new(
        snapshot: &Snapshot,
        config: EngineConfig,
        source_label: String,
    ) -> Self {
        let mut engine = Engine::new(snapshot, config);
        let details = Rc::new(RefCell::new(DetailsFeed::default()));

        let feed = Rc::clone(&details);
        engine.on_node_hover(move |node| {
            feed.borrow_mut().hovered = node.map(NodeSummary::from);
        });
        let feed = Rc::clone(&details);
        engine.on_node_click(move |node| {
            feed.borrow_mut().clicked = Some(NodeSummary::from(node));
        });
        let feed = Rc::clone(&details);
        engine.on_tick(move |info| {
            let mut feed = feed.borrow_mut();
            match info.state {
                SimulationState::Settled => feed.settled_at = Some(info.tick),
                _ => feed.settled_at = None,
            }
        });
        let feed = Rc::clone(&details);
        engine.on_selection_change(move |nodes| {
            feed.borrow_mut().selected =
                nodes.iter().map(|node| NodeSummary::from(*node)).collect();
        });

        Self {
            draft: engine.config().clone(),
            engine,
            source_label,
            config_error: None,
            search: String::new(),
            search_matches: None,
            details,
            texture: None,
            last_report: None,
            canvas: CanvasInput::default(),
            show_quadtree_overlay: false,
            quadtree_cells: Vec::new(),
            show_fps_bar: true,
            fps_show_current: true,
            fps_show_average: true,
            fps_show_low: false,
            fps_show_high: false,
            fps_show_frame_time: true,
        }
    }

    pub(in crate::app) fn replace_dataset(&mut self, snapshot: &Snapshot) {
        self.engine.replace_dataset(snapshot);
        self.search_matches = None;
        *self.details.borrow_mut() = DetailsFeed::default();
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("taxograph");
                    ui.separator();
                    ui.label(format!("dataset: {}", self.source_label));
                    if let Some(model) = self.engine.model() {
                        ui.label(format!("nodes: {}", model.len()));
                        ui.label(format!("links: {}", model.links().len()));
                        let warnings = model.warnings().len();
                        if warnings > 0 {
                            ui.label(format!("warnings: {warnings}"))
                                .on_hover_text("Dropped or floored input, see the details panel.");
                        }
                    }
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload dataset"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.simulation_status_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| self.draw_controls(ui));
            });

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));
    }
}
