use std::collections::BTreeSet;

use eframe::egui::{Key, Modifiers, PointerButton, Pos2, Vec2};

use super::physics::ForceSimulator;
use super::spatial::SpatialIndex;
use super::transform::ViewTransform;

/// Pointer travel, in screen pixels, below which a press and release count as
/// a click rather than a drag.
const CLICK_THRESHOLD_PX: f32 = 3.0;
/// Extra hit slop around node circles, in screen pixels.
const HIT_SLOP_PX: f32 = 2.0;
const KEY_ZOOM_STEP: f32 = 1.15;

/// Raw input in canvas-local screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerPressed {
        position: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerMoved {
        position: Pos2,
    },
    PointerReleased {
        position: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerLeft,
    Scroll {
        position: Pos2,
        delta: f32,
    },
    DoubleClick {
        position: Pos2,
    },
    Key {
        key: Key,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    NodeClicked(usize),
    HoverChanged(Option<usize>),
    SelectionChanged,
}

#[derive(Clone, Copy, Debug)]
enum Gesture {
    Idle,
    Node {
        index: usize,
        press: Pos2,
        dragging: bool,
        sticky: bool,
    },
    Pan {
        press: Pos2,
        last: Pos2,
        moved: bool,
        button: PointerButton,
    },
}

pub struct InteractionController {
    transform: ViewTransform,
    hovered: Option<usize>,
    selection: BTreeSet<usize>,
    pointer: Option<Pos2>,
    gesture: Gesture,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self {
            transform: ViewTransform::default(),
            hovered: None,
            selection: BTreeSet::new(),
            pointer: None,
            gesture: Gesture::Idle,
        }
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut ViewTransform {
        &mut self.transform
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn selection(&self) -> &BTreeSet<usize> {
        &self.selection
    }

    /// A pointer button went down on the canvas and has not been released.
    pub fn is_gesturing(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    #[cfg(test)]
    pub fn dragged(&self) -> Option<usize> {
        match self.gesture {
            Gesture::Node {
                index,
                dragging: true,
                ..
            } => Some(index),
            _ => None,
        }
    }

    /// Forgets per-dataset state; the view itself is kept.
    pub fn reset(&mut self) {
        self.hovered = None;
        self.selection.clear();
        self.gesture = Gesture::Idle;
    }

    pub fn hit_test(&self, index: &SpatialIndex, screen: Pos2) -> Option<usize> {
        if self.transform.is_degenerate() {
            return None;
        }
        let world = self.transform.screen_to_world(screen);
        index.query(world, HIT_SLOP_PX / self.transform.zoom)
    }

    pub fn apply(
        &mut self,
        event: InputEvent,
        simulator: &mut ForceSimulator,
        index: &SpatialIndex,
        out: &mut Vec<InteractionEvent>,
    ) {
        match event {
            InputEvent::PointerPressed {
                position,
                button,
                modifiers: _,
            } => {
                self.pointer = Some(position);
                self.press(position, button, simulator, index);
            }
            InputEvent::PointerMoved { position } => {
                self.pointer = Some(position);
                self.motion(position, simulator, index, out);
            }
            InputEvent::PointerReleased {
                position,
                button,
                modifiers,
            } => {
                self.pointer = Some(position);
                self.release(position, button, modifiers, simulator, index, out);
            }
            InputEvent::PointerLeft => {
                self.pointer = None;
                self.cancel_gesture(simulator);
                self.set_hovered(None, out);
            }
            InputEvent::Scroll { position, delta } => {
                if delta.abs() > f32::EPSILON && delta.is_finite() {
                    let factor = (1.0 + (delta * 0.0018)).clamp(0.85, 1.15);
                    self.transform.zoom_about(position, factor);
                }
            }
            InputEvent::DoubleClick { position } => {
                if let Some(hit) = self.hit_test(index, position) {
                    toggle_pin(simulator, hit);
                }
            }
            InputEvent::Key { key } => self.key(key, out),
        }
    }

    /// Re-evaluates hover under a still pointer after nodes moved.
    pub fn refresh_hover(&mut self, index: &SpatialIndex, out: &mut Vec<InteractionEvent>) {
        if matches!(self.gesture, Gesture::Node { .. }) {
            return;
        }
        let hit = self.pointer.and_then(|pointer| self.hit_test(index, pointer));
        self.set_hovered(hit, out);
    }

    pub fn select_nodes(
        &mut self,
        indices: impl IntoIterator<Item = usize>,
        extend: bool,
        out: &mut Vec<InteractionEvent>,
    ) {
        let mut next = if extend {
            self.selection.clone()
        } else {
            BTreeSet::new()
        };
        next.extend(indices);
        self.replace_selection(next, out);
    }

    pub fn clear_selection(&mut self, out: &mut Vec<InteractionEvent>) {
        self.replace_selection(BTreeSet::new(), out);
    }

    fn press(
        &mut self,
        position: Pos2,
        button: PointerButton,
        simulator: &ForceSimulator,
        index: &SpatialIndex,
    ) {
        let hit = match button {
            PointerButton::Primary => self.hit_test(index, position),
            _ => None,
        };

        self.gesture = match hit {
            Some(hit) => Gesture::Node {
                index: hit,
                press: position,
                dragging: false,
                sticky: simulator
                    .model()
                    .and_then(|model| model.node(hit))
                    .is_some_and(|node| node.is_pinned()),
            },
            None => Gesture::Pan {
                press: position,
                last: position,
                moved: false,
                button,
            },
        };
    }

    fn motion(
        &mut self,
        position: Pos2,
        simulator: &mut ForceSimulator,
        index: &SpatialIndex,
        out: &mut Vec<InteractionEvent>,
    ) {
        match &mut self.gesture {
            Gesture::Idle => {
                let hit = self.hit_test(index, position);
                self.set_hovered(hit, out);
            }
            Gesture::Node {
                index: dragged,
                press,
                dragging,
                ..
            } => {
                if !*dragging && position.distance(*press) > CLICK_THRESHOLD_PX {
                    *dragging = simulator.drag_start(*dragged);
                }
                if *dragging {
                    let world = self.transform.screen_to_world(position);
                    simulator.drag(*dragged, world);
                }
            }
            Gesture::Pan {
                press, last, moved, ..
            } => {
                let delta: Vec2 = position - *last;
                *last = position;
                if position.distance(*press) > CLICK_THRESHOLD_PX {
                    *moved = true;
                }
                self.transform.pan += delta;
            }
        }
    }

    fn release(
        &mut self,
        position: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
        simulator: &mut ForceSimulator,
        index: &SpatialIndex,
        out: &mut Vec<InteractionEvent>,
    ) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let toggle = modifiers.shift || modifiers.command || modifiers.ctrl;

        match gesture {
            Gesture::Idle => {}
            Gesture::Node {
                index: node,
                dragging: true,
                sticky,
                ..
            } => {
                simulator.drag_end(node);
                if sticky {
                    simulator.pin(node, self.transform.screen_to_world(position));
                }
            }
            Gesture::Node { index: node, .. } => {
                out.push(InteractionEvent::NodeClicked(node));
                let mut next = if toggle {
                    self.selection.clone()
                } else {
                    BTreeSet::new()
                };
                if toggle && next.contains(&node) {
                    next.remove(&node);
                } else {
                    next.insert(node);
                }
                self.replace_selection(next, out);
            }
            Gesture::Pan {
                moved,
                button: pressed_with,
                ..
            } => {
                let plain_click = !moved
                    && pressed_with == PointerButton::Primary
                    && button == PointerButton::Primary
                    && !toggle;
                if plain_click {
                    self.clear_selection(out);
                }
            }
        }

        let hit = self.hit_test(index, position);
        self.set_hovered(hit, out);
    }

    fn cancel_gesture(&mut self, simulator: &mut ForceSimulator) {
        if let Gesture::Node {
            index,
            dragging: true,
            sticky,
            ..
        } = self.gesture
        {
            let pinned_at = simulator
                .model()
                .and_then(|model| model.node(index))
                .map(|node| node.position);
            simulator.drag_end(index);
            if let (true, Some(position)) = (sticky, pinned_at) {
                simulator.pin(index, position);
            }
        }
        self.gesture = Gesture::Idle;
    }

    fn key(&mut self, key: Key, out: &mut Vec<InteractionEvent>) {
        let center = self.transform.viewport.center();
        match key {
            Key::Escape => self.clear_selection(out),
            Key::Num0 => self.transform.reset(),
            Key::Plus | Key::Equals => self.transform.zoom_about(center, KEY_ZOOM_STEP),
            Key::Minus => self.transform.zoom_about(center, 1.0 / KEY_ZOOM_STEP),
            _ => {}
        }
    }

    fn set_hovered(&mut self, hovered: Option<usize>, out: &mut Vec<InteractionEvent>) {
        if self.hovered != hovered {
            self.hovered = hovered;
            out.push(InteractionEvent::HoverChanged(hovered));
        }
    }

    fn replace_selection(&mut self, next: BTreeSet<usize>, out: &mut Vec<InteractionEvent>) {
        if self.selection != next {
            self.selection = next;
            out.push(InteractionEvent::SelectionChanged);
        }
    }
}

fn toggle_pin(simulator: &mut ForceSimulator, index: usize) {
    let Some(node) = simulator.model().and_then(|model| model.node(index)) else {
        return;
    };

    if node.is_pinned() {
        simulator.unpin(index);
    } else {
        let position = node.position;
        simulator.pin(index, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::engine::model::GraphModel;
    use crate::engine::physics::ForceConfig;
    use crate::engine::render::viewport_of;
    use crate::engine::snapshot::{NodeRecord, Snapshot};
    use eframe::egui::{pos2, vec2};

    struct Fixture {
        controller: InteractionController,
        simulator: ForceSimulator,
        index: SpatialIndex,
        events: Vec<InteractionEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let config = EngineConfig::default();
            let snapshot = Snapshot {
                nodes: vec![
                    NodeRecord::new("a").with_position(0.0, 0.0),
                    NodeRecord::new("b").with_position(100.0, 0.0),
                    NodeRecord::new("c").with_position(0.0, 100.0),
                ],
                links: Vec::new(),
            };
            let model = GraphModel::from_snapshot(&snapshot, &config);
            let mut index = SpatialIndex::new();
            index.rebuild(model.nodes());

            let mut simulator = ForceSimulator::new(ForceConfig::from(&config));
            simulator.initialize(model, ForceConfig::from(&config));

            let mut controller = InteractionController::new();
            *controller.transform_mut() = ViewTransform {
                viewport: viewport_of([400.0, 400.0]),
                pan: vec2(-50.0, 20.0),
                zoom: 2.0,
            };

            Self {
                controller,
                simulator,
                index,
                events: Vec::new(),
            }
        }

        fn send(&mut self, event: InputEvent) {
            self.controller
                .apply(event, &mut self.simulator, &self.index, &mut self.events);
        }

        fn screen_of(&self, node: usize) -> Pos2 {
            let position = self.simulator.model().unwrap().nodes()[node].position;
            self.controller.transform().world_to_screen(position)
        }

        fn click(&mut self, position: Pos2, modifiers: Modifiers) {
            self.send(InputEvent::PointerPressed {
                position,
                button: PointerButton::Primary,
                modifiers,
            });
            self.send(InputEvent::PointerReleased {
                position: position + vec2(1.0, 1.0),
                button: PointerButton::Primary,
                modifiers,
            });
        }
    }

    #[test]
    fn hit_testing_respects_pan_and_zoom() {
        let fixture = Fixture::new();
        let b = fixture.screen_of(1);
        assert_eq!(b, pos2(200.0 - 50.0 + 200.0, 200.0 + 20.0));

        assert_eq!(fixture.controller.hit_test(&fixture.index, b), Some(1));
        assert_eq!(
            fixture.controller.hit_test(&fixture.index, b + vec2(7.0, 0.0)),
            Some(1)
        );
        assert_eq!(
            fixture.controller.hit_test(&fixture.index, b + vec2(40.0, 0.0)),
            None
        );
    }

    #[test]
    fn dragging_pins_under_the_pointer_and_release_frees() {
        let mut fixture = Fixture::new();
        let start = fixture.screen_of(2);
        let target = start + vec2(60.0, -30.0);

        fixture.send(InputEvent::PointerPressed {
            position: start,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        });
        fixture.send(InputEvent::PointerMoved { position: target });
        assert_eq!(fixture.controller.dragged(), Some(2));

        let world = fixture.controller.transform().screen_to_world(target);
        let node = &fixture.simulator.model().unwrap().nodes()[2];
        assert_eq!(node.pin.map(|pin| pin.position()), Some(world));

        fixture.send(InputEvent::PointerReleased {
            position: target,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        });
        assert_eq!(fixture.controller.dragged(), None);
        assert!(!fixture.simulator.model().unwrap().nodes()[2].is_pinned());
        assert!(fixture.controller.selection().is_empty());
        assert!(!fixture.events.contains(&InteractionEvent::NodeClicked(2)));
    }

    #[test]
    fn a_press_only_starts_dragging_after_the_pointer_moves() {
        let mut fixture = Fixture::new();
        let start = fixture.screen_of(1);
        let alpha = fixture.simulator.alpha();

        fixture.send(InputEvent::PointerPressed {
            position: start,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        });
        assert!(fixture.controller.is_gesturing());
        assert_eq!(fixture.controller.dragged(), None);
        assert!(!fixture.simulator.model().unwrap().nodes()[1].is_pinned());

        fixture.send(InputEvent::PointerMoved {
            position: start + vec2(2.0, 0.0),
        });
        assert_eq!(fixture.controller.dragged(), None);

        fixture.send(InputEvent::PointerReleased {
            position: start + vec2(2.0, 0.0),
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        });
        assert!(!fixture.controller.is_gesturing());
        assert!(!fixture.simulator.model().unwrap().nodes()[1].is_pinned());
        assert_eq!(fixture.simulator.alpha(), alpha);
        assert!(fixture.events.contains(&InteractionEvent::NodeClicked(1)));
    }

    #[test]
    fn clicks_replace_or_toggle_the_selection() {
        let mut fixture = Fixture::new();
        let a = fixture.screen_of(0);
        let b = fixture.screen_of(1);

        fixture.click(a, Modifiers::NONE);
        assert_eq!(fixture.controller.selection(), &BTreeSet::from([0]));
        assert!(fixture.events.contains(&InteractionEvent::NodeClicked(0)));

        fixture.click(b, Modifiers::SHIFT);
        assert_eq!(fixture.controller.selection(), &BTreeSet::from([0, 1]));

        fixture.click(a, Modifiers::SHIFT);
        assert_eq!(fixture.controller.selection(), &BTreeSet::from([1]));

        fixture.events.clear();
        fixture.click(pos2(20.0, 380.0), Modifiers::NONE);
        assert!(fixture.controller.selection().is_empty());
        assert!(fixture.events.contains(&InteractionEvent::SelectionChanged));

        fixture.controller.select_nodes([0, 2], false, &mut fixture.events);
        fixture.send(InputEvent::Key { key: Key::Escape });
        assert!(fixture.controller.selection().is_empty());
    }

    #[test]
    fn hover_follows_the_pointer() {
        let mut fixture = Fixture::new();
        let c = fixture.screen_of(2);

        fixture.send(InputEvent::PointerMoved { position: c });
        assert_eq!(fixture.controller.hovered(), Some(2));
        fixture.send(InputEvent::PointerMoved { position: c });
        fixture.send(InputEvent::PointerLeft);
        assert_eq!(fixture.controller.hovered(), None);
        assert_eq!(
            fixture.events,
            vec![
                InteractionEvent::HoverChanged(Some(2)),
                InteractionEvent::HoverChanged(None)
            ]
        );
    }

    #[test]
    fn scrolling_zooms_around_the_pointer_and_panning_moves_the_view() {
        let mut fixture = Fixture::new();
        let anchor = pos2(123.0, 77.0);
        let world = fixture.controller.transform().screen_to_world(anchor);

        fixture.send(InputEvent::Scroll {
            position: anchor,
            delta: 50.0,
        });
        let transform = *fixture.controller.transform();
        assert!(transform.zoom > 2.0);
        assert!((transform.world_to_screen(world) - anchor).length() < 1.0e-3);

        fixture.send(InputEvent::PointerPressed {
            position: anchor,
            button: PointerButton::Secondary,
            modifiers: Modifiers::NONE,
        });
        fixture.send(InputEvent::PointerMoved {
            position: anchor + vec2(25.0, -5.0),
        });
        assert_eq!(fixture.controller.transform().pan, transform.pan + vec2(25.0, -5.0));

        fixture.send(InputEvent::Key { key: Key::Num0 });
        assert_eq!(fixture.controller.transform().zoom, 1.0);
        assert_eq!(fixture.controller.transform().pan, Vec2::ZERO);
    }

    #[test]
    fn double_click_toggles_a_sticky_pin() {
        let mut fixture = Fixture::new();
        let a = fixture.screen_of(0);

        fixture.send(InputEvent::DoubleClick { position: a });
        let node = &fixture.simulator.model().unwrap().nodes()[0];
        assert_eq!(node.pin.map(|pin| pin.position()), Some(node.position));

        fixture.click(a, Modifiers::NONE);
        assert!(fixture.simulator.model().unwrap().nodes()[0].is_pinned());

        fixture.send(InputEvent::DoubleClick { position: a });
        assert!(!fixture.simulator.model().unwrap().nodes()[0].is_pinned());
    }
}
