mod forces;

use eframe::egui::{Vec2, vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::{
    CenterConfig, ChargeConfig, CollisionConfig, EngineConfig, LinkConfig, SimulationConfig,
};
use super::error::EngineWarning;
use super::model::{GraphModel, Node, Pin};
use super::spatial::SpatialIndex;
use forces::{
    ChargeParams, CollisionParams, accumulate_charge_exact, accumulate_charge_for_node,
    accumulate_collision_pairs, apply_center_force, apply_link_force,
};

/// Alpha kept alive while a node is being dragged.
const DRAG_ALPHA: f32 = 0.3;
/// Alpha given back to a settled layout when a dragged node is let go.
const RELEASE_ALPHA: f32 = 0.1;
const RESEED_JITTER: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Idle,
    Running,
    Settled,
}

impl SimulationState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Settled => "settled",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimulationQuality {
    #[default]
    Full,
    /// Coarser Barnes-Hut and a single collision pass.
    Reduced,
}

/// The force parameters of [`EngineConfig`], hot-swappable on a running
/// simulator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceConfig {
    pub link: LinkConfig,
    pub charge: ChargeConfig,
    pub collision: CollisionConfig,
    pub center: CenterConfig,
    pub simulation: SimulationConfig,
}

impl From<&EngineConfig> for ForceConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            link: config.link,
            charge: config.charge,
            collision: config.collision,
            center: config.center,
            simulation: config.simulation,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickInfo {
    pub tick: u64,
    pub alpha: f32,
    pub state: SimulationState,
}

type TickCallback = Box<dyn FnMut(&TickInfo)>;

#[derive(Default)]
struct PhysicsScratch {
    deltas: Vec<Vec2>,
    positions: Vec<Vec2>,
    charge_index: SpatialIndex,
    collision_index: SpatialIndex,
}

pub struct ForceSimulator {
    model: Option<GraphModel>,
    config: ForceConfig,
    quality: SimulationQuality,
    alpha: f32,
    state: SimulationState,
    ticks: u64,
    rng: StdRng,
    scratch: PhysicsScratch,
    tick_callbacks: Vec<TickCallback>,
}

impl ForceSimulator {
    pub fn new(config: ForceConfig) -> Self {
        Self {
            model: None,
            rng: StdRng::seed_from_u64(config.simulation.seed),
            config,
            quality: SimulationQuality::Full,
            alpha: 0.0,
            state: SimulationState::Idle,
            ticks: 0,
            scratch: PhysicsScratch::default(),
            tick_callbacks: Vec::new(),
        }
    }

    /// Takes ownership of `model` and starts cooling from alpha 1. A model in
    /// which nothing can move starts out settled.
    pub fn initialize(&mut self, model: GraphModel, config: ForceConfig) {
        self.config = config;
        self.rng = StdRng::seed_from_u64(config.simulation.seed);
        self.ticks = 0;

        if model.is_empty() || model.all_pinned() {
            self.alpha = 0.0;
            self.state = SimulationState::Settled;
        } else {
            self.alpha = 1.0;
            self.state = SimulationState::Running;
        }
        log::debug!(
            "simulator initialized with {} nodes ({})",
            model.len(),
            self.state.label()
        );
        self.model = Some(model);
    }

    /// Advances one step. Returns `false` without touching anything when the
    /// simulator is idle or settled.
    pub fn tick(&mut self) -> bool {
        if self.state != SimulationState::Running {
            return false;
        }
        let Some(model) = self.model.as_mut() else {
            self.state = SimulationState::Idle;
            return false;
        };

        let simulation = self.config.simulation;
        self.alpha += (0.0 - self.alpha) * simulation.alpha_decay;

        step_forces(
            model,
            &self.config,
            self.quality,
            self.alpha,
            &mut self.scratch,
        );
        integrate(model, simulation.velocity_decay);
        reseed_non_finite(model, self.config.center, &mut self.rng);

        self.ticks += 1;
        if self.alpha <= simulation.alpha_min {
            self.state = SimulationState::Settled;
            log::debug!("simulation settled after {} ticks", self.ticks);
        }

        let info = TickInfo {
            tick: self.ticks,
            alpha: self.alpha,
            state: self.state,
        };
        for callback in &mut self.tick_callbacks {
            callback(&info);
        }
        true
    }

    /// Reheats to alpha 1.
    pub fn restart(&mut self) {
        self.reheat_to(1.0, true);
    }

    /// Raises alpha to at least `alpha`, waking a settled simulation.
    pub fn nudge(&mut self, alpha: f32) {
        self.reheat_to(alpha, false);
    }

    fn reheat_to(&mut self, alpha: f32, reset: bool) {
        if self.model.is_none() {
            return;
        }

        self.alpha = if reset { alpha } else { self.alpha.max(alpha) };
        if self.alpha > self.config.simulation.alpha_min {
            self.state = SimulationState::Running;
        }
    }

    /// Drops the model and every tick callback. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.state != SimulationState::Idle {
            log::debug!("simulator stopped after {} ticks", self.ticks);
        }
        self.model = None;
        self.tick_callbacks.clear();
        self.alpha = 0.0;
        self.state = SimulationState::Idle;
    }

    pub fn on_tick(&mut self, callback: impl FnMut(&TickInfo) + 'static) {
        self.tick_callbacks.push(Box::new(callback));
    }

    pub fn drag_start(&mut self, index: usize) -> bool {
        let Some(node) = self.node_mut(index) else {
            return false;
        };
        node.pin = Some(Pin::at(node.position));
        node.velocity = Vec2::ZERO;
        self.nudge(DRAG_ALPHA);
        true
    }

    pub fn drag(&mut self, index: usize, position: Vec2) -> bool {
        if !position.x.is_finite() || !position.y.is_finite() {
            return false;
        }
        let Some(node) = self.node_mut(index) else {
            return false;
        };
        node.pin = Some(Pin::at(position));
        node.position = position;
        node.velocity = Vec2::ZERO;
        self.nudge(DRAG_ALPHA);
        true
    }

    pub fn drag_end(&mut self, index: usize) -> bool {
        let Some(node) = self.node_mut(index) else {
            return false;
        };
        node.pin = None;
        if self.state == SimulationState::Settled {
            self.nudge(RELEASE_ALPHA);
        }
        true
    }

    pub fn pin(&mut self, index: usize, position: Vec2) -> bool {
        if !position.x.is_finite() || !position.y.is_finite() {
            return false;
        }
        let Some(node) = self.node_mut(index) else {
            return false;
        };
        node.pin = Some(Pin::at(position));
        node.position = position;
        node.velocity = Vec2::ZERO;
        true
    }

    pub fn unpin(&mut self, index: usize) -> bool {
        let Some(node) = self.node_mut(index) else {
            return false;
        };
        let was_pinned = node.pin.take().is_some();
        if was_pinned && self.state == SimulationState::Settled {
            self.nudge(RELEASE_ALPHA);
        }
        was_pinned
    }

    pub fn pin_all(&mut self) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        for node in model.nodes_mut() {
            node.pin = Some(Pin::at(node.position));
            node.velocity = Vec2::ZERO;
        }
    }

    pub fn unpin_all(&mut self) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        for node in model.nodes_mut() {
            node.pin = None;
        }
        self.nudge(DRAG_ALPHA);
    }

    /// Changes force parameters in place; nodes, velocities and alpha are kept.
    pub fn update_config(&mut self, update: impl FnOnce(&mut ForceConfig)) {
        update(&mut self.config);
    }

    pub fn set_quality(&mut self, quality: SimulationQuality) {
        self.quality = quality;
    }

    #[cfg(test)]
    pub fn quality(&self) -> SimulationQuality {
        self.quality
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn model(&self) -> Option<&GraphModel> {
        self.model.as_ref()
    }

    pub(in crate::engine) fn model_mut(&mut self) -> Option<&mut GraphModel> {
        self.model.as_mut()
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.model
            .as_mut()
            .and_then(|model| model.nodes_mut().get_mut(index))
    }
}

fn step_forces(
    model: &mut GraphModel,
    config: &ForceConfig,
    quality: SimulationQuality,
    alpha: f32,
    scratch: &mut PhysicsScratch,
) {
    let (nodes, links, degrees) = model.parts_mut();
    let node_count = nodes.len();
    if node_count == 0 {
        return;
    }

    let link_iterations = config.link.iterations.clamp(1, 8);
    for _ in 0..link_iterations {
        apply_link_force(
            nodes,
            links,
            degrees,
            config.link.distance,
            config.link.strength,
            alpha,
        );
    }

    scratch.deltas.clear();
    scratch.deltas.resize(node_count, Vec2::ZERO);

    if config.charge.strength != 0.0 && node_count > 1 {
        let reduced = quality == SimulationQuality::Reduced;
        let max_distance = config.charge.max_distance.max(1.0);
        let params = ChargeParams {
            weight: config.charge.strength * alpha,
            max_distance_sq: max_distance * max_distance,
            theta: config.charge.theta * if reduced { 1.5 } else { 1.0 },
        };

        if reduced || node_count >= config.charge.barnes_hut_threshold {
            scratch
                .charge_index
                .rebuild_from(nodes.iter().map(|node| (node.position, 0.0)));
            if let Some(root) = scratch.charge_index.root() {
                let positions = scratch.charge_index.points();
                for (index, delta) in scratch.deltas.iter_mut().enumerate() {
                    accumulate_charge_for_node(root, index, positions, params, delta);
                }
            }
        } else {
            scratch.positions.clear();
            scratch.positions.extend(nodes.iter().map(|node| node.position));
            accumulate_charge_exact(&scratch.positions, params, &mut scratch.deltas);
        }

        for (node, delta) in nodes.iter_mut().zip(&scratch.deltas) {
            node.velocity += *delta;
        }
    }

    let center = vec2(config.center.x, config.center.y);
    apply_center_force(nodes, center, config.center.strength, alpha);

    let collision_iterations = match quality {
        SimulationQuality::Full => config.collision.iterations.min(8),
        SimulationQuality::Reduced => config.collision.iterations.min(1),
    };
    let params = CollisionParams {
        strength: config.collision.strength.clamp(0.0, 1.0),
    };
    for _ in 0..collision_iterations {
        let radius_fn = config.collision.radius;
        scratch.collision_index.rebuild_from(
            nodes
                .iter()
                .map(|node| (node.position + node.velocity, radius_fn.radius_for(node.radius))),
        );
        let Some(root) = scratch.collision_index.root() else {
            break;
        };

        scratch.deltas.fill(Vec2::ZERO);
        accumulate_collision_pairs(
            root,
            root,
            true,
            scratch.collision_index.points(),
            scratch.collision_index.radii(),
            params,
            &mut scratch.deltas,
        );
        for (node, delta) in nodes.iter_mut().zip(&scratch.deltas) {
            node.velocity += *delta;
        }
    }
}

fn integrate(model: &mut GraphModel, velocity_decay: f32) {
    let keep = 1.0 - velocity_decay.clamp(0.0, 1.0);
    for node in model.nodes_mut() {
        match node.pin {
            Some(pin) => {
                node.position = pin.position();
                node.velocity = Vec2::ZERO;
            }
            None => {
                node.velocity *= keep;
                node.position += node.velocity;
            }
        }
    }
}

/// Puts diverged nodes back near the centroid with zero velocity instead of
/// letting NaN spread through later ticks.
fn reseed_non_finite(model: &mut GraphModel, center: CenterConfig, rng: &mut StdRng) {
    let finite = |position: Vec2, velocity: Vec2| {
        position.x.is_finite()
            && position.y.is_finite()
            && velocity.x.is_finite()
            && velocity.y.is_finite()
    };

    let mut centroid = Vec2::ZERO;
    let mut count = 0usize;
    let mut diverged = 0usize;
    for node in model.nodes() {
        if finite(node.position, node.velocity) {
            centroid += node.position;
            count += 1;
        } else {
            diverged += 1;
        }
    }
    if diverged == 0 {
        return;
    }

    let centroid = if count > 0 {
        centroid / count as f32
    } else {
        vec2(center.x, center.y)
    };

    for node in model.nodes_mut() {
        if finite(node.position, node.velocity) {
            continue;
        }

        node.velocity = Vec2::ZERO;
        node.position = match node.pin {
            Some(pin) => pin.position(),
            None => {
                let jitter = vec2(
                    rng.gen_range(-RESEED_JITTER..RESEED_JITTER),
                    rng.gen_range(-RESEED_JITTER..RESEED_JITTER),
                );
                centroid + jitter
            }
        };
        log::warn!(
            "{}",
            EngineWarning::NonFiniteReset {
                id: node.id.clone()
            }
        );
    }
}
