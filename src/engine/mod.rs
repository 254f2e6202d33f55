//! Force-directed graph engine: simulation, spatial index, software renderer,
//! performance governor and input handling, driven one frame at a time.

pub mod config;
pub mod error;
pub mod governor;
pub mod interaction;
pub mod model;
pub mod physics;
pub mod render;
pub mod snapshot;
pub mod spatial;
pub mod style;
pub mod transform;

use eframe::egui::Pos2;
use serde_json::Value;

use config::EngineConfig;
use error::ConfigError;
use governor::{Fidelity, FpsReadout, PerformanceGovernor};
use interaction::{InputEvent, InteractionController, InteractionEvent};
use model::{GraphModel, Node};
use physics::{ForceConfig, ForceSimulator, SimulationState, TickInfo};
use render::{FrameStats, Label, Renderer, viewport_of};
use snapshot::Snapshot;
use spatial::{QuadtreeCell, SpatialIndex};
use transform::ViewTransform;

type ClickCallback = Box<dyn FnMut(&Node)>;
type HoverCallback = Box<dyn FnMut(Option<&Node>)>;
type SelectionCallback = Box<dyn FnMut(&[&Node])>;

#[derive(Default)]
struct Callbacks {
    click: Vec<ClickCallback>,
    hover: Vec<HoverCallback>,
    selection: Vec<SelectionCallback>,
}

impl Callbacks {
    fn clear(&mut self) {
        self.click.clear();
        self.hover.clear();
        self.selection.clear();
    }
}

/// What one call to [`Engine::frame`] did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub stats: FrameStats,
    pub ticked: bool,
    pub state: SimulationState,
    pub alpha: f32,
    pub fidelity: Fidelity,
    /// Set on the frame whose measurement changed the fidelity level.
    pub fidelity_changed: Option<Fidelity>,
}

pub struct Engine {
    config: EngineConfig,
    simulator: ForceSimulator,
    index: SpatialIndex,
    renderer: Renderer,
    governor: PerformanceGovernor,
    controller: InteractionController,
    pending: Vec<InputEvent>,
    events: Vec<InteractionEvent>,
    callbacks: Callbacks,
    /// Whether the last frame left motion behind (a running layout or a
    /// gesture in progress), so the host is expected to repaint promptly.
    animating: bool,
    stopped: bool,
}

impl Engine {
    pub fn new(snapshot: &Snapshot, config: EngineConfig) -> Self {
        let mut config = config;
        config.sanitize();

        let mut engine = Self {
            simulator: ForceSimulator::new(ForceConfig::from(&config)),
            index: SpatialIndex::new(),
            renderer: Renderer::new(config.node_shape, config.label_zoom_threshold),
            governor: PerformanceGovernor::new(config.low_fps_threshold, config.high_fps_threshold),
            controller: InteractionController::new(),
            pending: Vec::new(),
            events: Vec::new(),
            callbacks: Callbacks::default(),
            animating: false,
            stopped: false,
            config,
        };
        engine.load(snapshot);
        engine
    }

    /// Swaps in a new dataset. The old model and index are dropped together
    /// before the next frame; callbacks, view and config survive.
    pub fn replace_dataset(&mut self, snapshot: &Snapshot) {
        if self.stopped {
            log::warn!("ignoring dataset replacement on a stopped engine");
            return;
        }
        self.load(snapshot);
    }

    fn load(&mut self, snapshot: &Snapshot) {
        let model = GraphModel::from_snapshot(snapshot, &self.config);
        self.index.rebuild(model.nodes());
        self.renderer.set_palette(model.color_groups());
        self.simulator
            .initialize(model, ForceConfig::from(&self.config));
        self.controller.reset();
        self.pending.clear();
        self.events.clear();
    }

    /// Physical pixels per point for the render surface.
    pub fn set_pixels_per_point(&mut self, scale: f32) {
        self.renderer.set_pixels_per_point(scale);
    }

    pub fn push_input(&mut self, event: InputEvent) {
        if !self.stopped {
            self.pending.push(event);
        }
    }

    /// Runs one frame: input, tick, index rebuild, render, governor, then
    /// callbacks. `dt` is the interval since the previous frame in seconds and
    /// `size` the canvas size in points.
    pub fn frame(&mut self, dt: f32, size: [f32; 2]) -> FrameReport {
        if self.stopped {
            return FrameReport {
                stats: FrameStats {
                    skipped: true,
                    ..FrameStats::default()
                },
                ticked: false,
                state: SimulationState::Idle,
                alpha: 0.0,
                fidelity: self.governor.fidelity(),
                fidelity_changed: None,
            };
        }

        self.controller.transform_mut().viewport = viewport_of(size);
        for event in self.pending.drain(..) {
            self.controller
                .apply(event, &mut self.simulator, &self.index, &mut self.events);
        }
        self.controller.refresh_hover(&self.index, &mut self.events);

        let ticked = self.simulator.tick();
        if cfg!(debug_assertions)
            && ticked
            && let Some(model) = self.simulator.model()
            && let Err(error) = model.check_invariants()
        {
            log::error!("{error}");
        }

        let stats = match self.simulator.model() {
            Some(model) => {
                self.index.rebuild(model.nodes());
                self.renderer.set_transform(*self.controller.transform());
                self.renderer
                    .set_highlight(self.controller.hovered(), self.controller.selection());
                self.renderer.render(model.nodes(), model.links())
            }
            None => FrameStats {
                skipped: true,
                ..FrameStats::default()
            },
        };

        let fidelity_changed = self.governor.record_frame(dt, !self.animating);
        self.animating = self.simulator.state() == SimulationState::Running
            || self.controller.is_gesturing();
        if let Some(fidelity) = fidelity_changed {
            self.renderer.set_quality(fidelity);
            self.simulator.set_quality(fidelity.simulation_quality());
        }

        self.dispatch_events();

        FrameReport {
            stats,
            ticked,
            state: self.simulator.state(),
            alpha: self.simulator.alpha(),
            fidelity: self.governor.fidelity(),
            fidelity_changed,
        }
    }

    fn dispatch_events(&mut self) {
        let Some(model) = self.simulator.model() else {
            self.events.clear();
            return;
        };

        for event in self.events.drain(..) {
            match event {
                InteractionEvent::NodeClicked(index) => {
                    if let Some(node) = model.node(index) {
                        for callback in &mut self.callbacks.click {
                            callback(node);
                        }
                    }
                }
                InteractionEvent::HoverChanged(index) => {
                    let node = index.and_then(|index| model.node(index));
                    for callback in &mut self.callbacks.hover {
                        callback(node);
                    }
                }
                InteractionEvent::SelectionChanged => {
                    let selected = self
                        .controller
                        .selection()
                        .iter()
                        .filter_map(|&index| model.node(index))
                        .collect::<Vec<_>>();
                    for callback in &mut self.callbacks.selection {
                        callback(&selected);
                    }
                }
            }
        }
    }

    pub fn on_node_click(&mut self, callback: impl FnMut(&Node) + 'static) {
        self.callbacks.click.push(Box::new(callback));
    }

    pub fn on_node_hover(&mut self, callback: impl FnMut(Option<&Node>) + 'static) {
        self.callbacks.hover.push(Box::new(callback));
    }

    pub fn on_selection_change(&mut self, callback: impl FnMut(&[&Node]) + 'static) {
        self.callbacks.selection.push(Box::new(callback));
    }

    pub fn on_tick(&mut self, callback: impl FnMut(&TickInfo) + 'static) {
        self.simulator.on_tick(callback);
    }

    /// Merges a JSON patch over the current config and applies it in place.
    /// Node positions and velocities are kept.
    pub fn update_config(&mut self, patch: &Value) -> Result<(), ConfigError> {
        let next = self.config.patched(patch)?;
        if next == self.config {
            return Ok(());
        }

        let appearance_changed = next.size_field != self.config.size_field
            || next.size_scale != self.config.size_scale
            || next.min_radius != self.config.min_radius
            || next.max_radius != self.config.max_radius
            || next.color_field != self.config.color_field;

        let forces = ForceConfig::from(&next);
        self.simulator.update_config(|config| *config = forces);
        if appearance_changed && let Some(model) = self.simulator.model_mut() {
            model.apply_appearance(&next);
            self.renderer.set_palette(model.color_groups());
        }
        self.renderer.set_shape(next.node_shape);
        self.renderer.set_label_threshold(next.label_zoom_threshold);
        self.governor
            .set_thresholds(next.low_fps_threshold, next.high_fps_threshold);

        log::info!("engine config updated");
        self.config = next;
        Ok(())
    }

    pub fn select_nodes(&mut self, indices: impl IntoIterator<Item = usize>, extend: bool) {
        if self.stopped {
            return;
        }
        let len = self.simulator.model().map_or(0, GraphModel::len);
        self.controller.select_nodes(
            indices.into_iter().filter(|&index| index < len),
            extend,
            &mut self.events,
        );
    }

    pub fn restart(&mut self) {
        self.simulator.restart();
    }

    pub fn pin_all(&mut self) {
        self.simulator.pin_all();
    }

    pub fn unpin_all(&mut self) {
        self.simulator.unpin_all();
    }

    /// Detaches callbacks, stops the simulator and frees the render surface.
    /// Calling it again does nothing.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }

        self.stopped = true;
        self.callbacks.clear();
        self.pending.clear();
        self.events.clear();
        self.simulator.stop();
        self.renderer.release();
        self.index = SpatialIndex::new();
        log::info!("engine stopped");
    }

    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&GraphModel> {
        self.simulator.model()
    }

    pub fn simulator(&self) -> &ForceSimulator {
        &self.simulator
    }

    pub fn to_snapshot(&self, pin_all: bool) -> Option<Snapshot> {
        self.simulator
            .model()
            .map(|model| model.to_snapshot(pin_all))
    }

    /// Premultiplied RGBA pixels of the last presented frame.
    pub fn frame_pixels(&self) -> (&[u8], [usize; 2]) {
        let surface = self.renderer.surface();
        (surface.front(), surface.size())
    }

    pub fn labels(&self) -> &[Label] {
        self.renderer.labels()
    }

    pub fn quadtree_cells(&self, cells: &mut Vec<QuadtreeCell>) {
        self.index.cells(cells);
    }

    #[cfg(test)]
    pub fn node_at(&self, screen: Pos2) -> Option<usize> {
        self.controller.hit_test(&self.index, screen)
    }

    pub fn transform(&self) -> &ViewTransform {
        self.controller.transform()
    }

    pub fn hovered(&self) -> Option<usize> {
        self.controller.hovered()
    }

    pub fn selection(&self) -> impl Iterator<Item = usize> + '_ {
        self.controller.selection().iter().copied()
    }

    pub fn fidelity(&self) -> Fidelity {
        self.governor.fidelity()
    }

    pub fn fps(&self) -> FpsReadout {
        self.governor.readout()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use eframe::egui::{Modifiers, PointerButton};
    use serde_json::json;

    use super::*;
    use crate::engine::physics::SimulationQuality;
    use crate::engine::snapshot::{LinkRecord, NodeRecord};

    const SIZE: [f32; 2] = [800.0, 600.0];
    const DT: f32 = 1.0 / 60.0;

    fn star(count: usize) -> Snapshot {
        let nodes = (0..count)
            .map(|index| {
                NodeRecord::new(format!("n{index}"))
                    .with_category(if index == 0 { "hub" } else { "leaf" })
                    .with_metric("revenue", 10.0 + index as f64)
            })
            .collect();
        let links = (1..count)
            .map(|index| LinkRecord::new("n0", format!("n{index}")))
            .collect();
        Snapshot { nodes, links }
    }

    fn screen_of(engine: &Engine, index: usize) -> Pos2 {
        let position = engine.model().unwrap().nodes()[index].position;
        engine.transform().world_to_screen(position)
    }

    fn click(engine: &mut Engine, position: Pos2) {
        for pressed in [true, false] {
            let event = if pressed {
                InputEvent::PointerPressed {
                    position,
                    button: PointerButton::Primary,
                    modifiers: Modifiers::NONE,
                }
            } else {
                InputEvent::PointerReleased {
                    position,
                    button: PointerButton::Primary,
                    modifiers: Modifiers::NONE,
                }
            };
            engine.push_input(event);
        }
    }

    #[test]
    fn frame_ticks_indexes_and_renders_the_same_positions() {
        let mut engine = Engine::new(&star(12), EngineConfig::default());
        let report = engine.frame(DT, SIZE);

        assert!(report.ticked);
        assert_eq!(report.state, SimulationState::Running);
        assert_eq!(report.stats.draw_call_count, 3);
        assert_eq!(engine.frame_pixels().1, [800, 600]);

        for index in 0..12 {
            assert_eq!(engine.node_at(screen_of(&engine, index)), Some(index));
        }
    }

    #[test]
    fn clicks_and_selection_reach_callbacks() {
        let mut engine = Engine::new(&star(6), EngineConfig::default());
        engine.frame(DT, SIZE);

        let clicked = Rc::new(RefCell::new(Vec::new()));
        let selected = Rc::new(RefCell::new(Vec::new()));
        let clicked_sink = clicked.clone();
        let selected_sink = selected.clone();
        engine.on_node_click(move |node| clicked_sink.borrow_mut().push(node.id.clone()));
        engine.on_selection_change(move |nodes| {
            *selected_sink.borrow_mut() = nodes.iter().map(|node| node.id.clone()).collect();
        });

        let target = screen_of(&engine, 3);
        click(&mut engine, target);
        engine.frame(DT, SIZE);

        assert_eq!(*clicked.borrow(), vec!["n3".to_owned()]);
        assert_eq!(*selected.borrow(), vec!["n3".to_owned()]);

        engine.select_nodes([1, 2, 99], true);
        engine.frame(DT, SIZE);
        assert_eq!(
            *selected.borrow(),
            vec!["n1".to_owned(), "n2".to_owned(), "n3".to_owned()]
        );
    }

    #[test]
    fn config_patch_hot_swaps_without_moving_nodes() {
        let mut engine = Engine::new(&star(8), EngineConfig::default());
        for _ in 0..5 {
            engine.frame(DT, SIZE);
        }
        let before = engine
            .model()
            .unwrap()
            .nodes()
            .iter()
            .map(|node| node.position)
            .collect::<Vec<_>>();

        engine
            .update_config(&json!({
                "link": { "distance": 60.0 },
                "colorField": "revenue",
                "nodeShape": "rectangle"
            }))
            .unwrap();

        let model = engine.model().unwrap();
        let after = model.nodes().iter().map(|node| node.position).collect::<Vec<_>>();
        assert_eq!(before, after);
        assert_eq!(engine.simulator().config().link.distance, 60.0);
        assert_eq!(model.color_groups().len(), style::METRIC_BUCKETS);
        assert!(engine.update_config(&json!("nope")).is_err());
        assert_eq!(engine.config().link.distance, 60.0);
    }

    #[test]
    fn replacing_the_dataset_resets_model_and_selection() {
        let mut engine = Engine::new(&star(5), EngineConfig::default());
        engine.select_nodes([1], false);
        engine.frame(DT, SIZE);
        assert_eq!(engine.selection().count(), 1);

        engine.replace_dataset(&star(40));
        assert_eq!(engine.model().unwrap().len(), 40);
        assert_eq!(engine.selection().count(), 0);
        assert_eq!(engine.simulator().ticks(), 0);

        let report = engine.frame(DT, SIZE);
        assert!(report.ticked);
        assert!(engine.model().unwrap().check_invariants().is_ok());
    }

    #[test]
    fn sustained_low_frame_rate_simplifies_both_renderer_and_simulation() {
        let mut engine = Engine::new(&star(10), EngineConfig::default());
        let mut changed = None;
        for _ in 0..60 {
            let report = engine.frame(1.0 / 20.0, SIZE);
            changed = changed.or(report.fidelity_changed);
        }

        assert_eq!(changed, Some(Fidelity::Simplified));
        assert_eq!(engine.fidelity(), Fidelity::Simplified);
        assert_eq!(engine.simulator().quality(), SimulationQuality::Reduced);
        assert_eq!(engine.frame(1.0 / 20.0, SIZE).stats.label_count, 0);
    }

    #[test]
    fn frames_slower_than_the_idle_gap_still_count_while_the_layout_runs() {
        let mut engine = Engine::new(&star(10), EngineConfig::default());
        let mut changed = None;
        for _ in 0..6 {
            let report = engine.frame(1.0 / 1.5, SIZE);
            assert_eq!(report.state, SimulationState::Running);
            changed = changed.or(report.fidelity_changed);
        }

        assert_eq!(changed, Some(Fidelity::Simplified));
    }

    #[test]
    fn tick_callbacks_see_the_layout_come_to_rest() {
        let mut config = EngineConfig::default();
        config.simulation.alpha_decay = 0.2;
        let mut engine = Engine::new(&star(6), config);
        let last = Rc::new(RefCell::new(None));
        let sink = last.clone();
        engine.on_tick(move |info| *sink.borrow_mut() = Some(*info));

        for _ in 0..200 {
            if engine.frame(DT, SIZE).state != SimulationState::Running {
                break;
            }
        }

        let info = last.borrow().expect("ticked at least once");
        assert_eq!(info.state, SimulationState::Settled);
        assert_eq!(info.tick, engine.simulator().ticks());
    }

    #[test]
    fn stop_is_idempotent_and_detaches_everything() {
        let mut engine = Engine::new(&star(6), EngineConfig::default());
        let hovered = Rc::new(RefCell::new(0));
        let sink = hovered.clone();
        engine.on_node_hover(move |_| *sink.borrow_mut() += 1);

        engine.stop();
        engine.stop();
        assert!(engine.is_stopped());
        assert!(engine.model().is_none());
        assert!(engine.frame_pixels().0.is_empty());

        engine.push_input(InputEvent::PointerMoved {
            position: Pos2::ZERO,
        });
        let report = engine.frame(DT, SIZE);
        assert!(report.stats.skipped);
        assert_eq!(report.state, SimulationState::Idle);
        assert_eq!(*hovered.borrow(), 0);
    }

    #[test]
    fn zero_sized_canvas_skips_rendering_but_keeps_simulating() {
        let mut engine = Engine::new(&star(6), EngineConfig::default());
        let report = engine.frame(DT, [0.0, 0.0]);
        assert!(report.stats.skipped);
        assert!(report.ticked);

        let report = engine.frame(DT, SIZE);
        assert!(!report.stats.skipped);
    }
}
