use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context, Pos2, TextureHandle};

use crate::engine::config::EngineConfig;
use crate::engine::model::Node;
use crate::engine::snapshot::Snapshot;
use crate::engine::spatial::QuadtreeCell;
use crate::engine::{Engine, FrameReport};
use crate::taxonomy::{DatasetSource, load_config};

mod graph;
mod ui;

type LoadResult = Result<(Snapshot, EngineConfig), String>;

pub struct TaxographApp {
    source: DatasetSource,
    config_path: Option<std::path::PathBuf>,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
}

enum AppState {
    Loading { rx: Receiver<LoadResult> },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    engine: Engine,
    source_label: String,
    draft: EngineConfig,
    config_error: Option<String>,
    search: String,
    search_matches: Option<SearchMatches>,
    details: Rc<RefCell<DetailsFeed>>,
    texture: Option<TextureHandle>,
    last_report: Option<FrameReport>,
    canvas: CanvasInput,
    show_quadtree_overlay: bool,
    quadtree_cells: Vec<QuadtreeCell>,
    show_fps_bar: bool,
    fps_show_current: bool,
    fps_show_average: bool,
    fps_show_low: bool,
    fps_show_high: bool,
    fps_show_frame_time: bool,
}

struct SearchMatches {
    query: String,
    indices: Vec<usize>,
}

/// Pointer bookkeeping for forwarding egui input to the engine.
#[derive(Default)]
struct CanvasInput {
    pressed_buttons: usize,
    pointer_inside: bool,
}

/// What the engine callbacks last reported, read by the details panel.
#[derive(Default)]
struct DetailsFeed {
    hovered: Option<NodeSummary>,
    clicked: Option<NodeSummary>,
    selected: Vec<NodeSummary>,
    /// Tick on which the layout last came to rest.
    settled_at: Option<u64>,
}

#[derive(Clone)]
struct NodeSummary {
    id: String,
    title: String,
    category: usize,
    metrics: BTreeMap<String, f64>,
    position: Pos2,
    pinned: bool,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            title: node.title.clone(),
            category: node.category,
            metrics: node.metrics.clone(),
            position: node.position.to_pos2(),
            pinned: node.is_pinned(),
        }
    }
}

impl TaxographApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        source: DatasetSource,
        config_path: Option<std::path::PathBuf>,
    ) -> Self {
        let state = Self::start_load(source.clone(), config_path.clone());
        Self {
            source,
            config_path,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(
        source: DatasetSource,
        config_path: Option<std::path::PathBuf>,
    ) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = (|| -> anyhow::Result<(Snapshot, EngineConfig)> {
                let config = match &config_path {
                    Some(path) => load_config(path)?,
                    None => EngineConfig::default(),
                };
                Ok((source.load()?, config))
            })()
            .map_err(|error| format!("{error:#}"));

            if let Err(error) = &result {
                log::error!("dataset load failed: {error}");
            }
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(source: DatasetSource, config_path: Option<std::path::PathBuf>) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(source, config_path),
        }
    }
}

impl eframe::App for TaxographApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok((snapshot, config))) => {
                        transition = Some(AppState::Ready(Box::new(ViewModel::new(
                            &snapshot,
                            config,
                            self.source.to_string(),
                        ))));
                    }
                    Ok(Err(error)) => transition = Some(AppState::Error(error)),
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Error(
                            "Background load worker disconnected".to_owned(),
                        ));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(format!("Loading {}...", self.source));
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the taxonomy graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(
                            self.source.clone(),
                            self.config_path.clone(),
                        ));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(
                        self.source.clone(),
                        self.config_path.clone(),
                    ));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok((snapshot, _config))) => {
                            model.replace_dataset(&snapshot);
                        }
                        Ok(Err(error)) => transition = Some(AppState::Error(error)),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition = Some(AppState::Error(
                                "Background load worker disconnected".to_owned(),
                            ));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}
