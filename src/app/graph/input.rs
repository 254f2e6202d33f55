use eframe::egui::{self, Event, Rect, Ui};

use crate::engine::interaction::InputEvent;

use super::super::ViewModel;

impl ViewModel {
    /// Translates this frame's egui input into canvas-local engine events.
    /// Presses that start outside the canvas are ignored; a gesture that
    /// started inside keeps receiving motion until its release.
    pub(in crate::app) fn forward_graph_input(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        let origin = rect.min.to_vec2();
        let keyboard_free = !ui.ctx().wants_keyboard_input();
        let (events, scroll, hover_pos) = ui.input(|input| {
            (
                input.events.clone(),
                input.raw_scroll_delta.y,
                input.pointer.hover_pos(),
            )
        });

        for event in events {
            match event {
                Event::PointerButton {
                    pos,
                    button,
                    pressed: true,
                    modifiers,
                } => {
                    if !rect.contains(pos) || !response.hovered() {
                        continue;
                    }
                    self.canvas.pressed_buttons += 1;
                    self.engine.push_input(InputEvent::PointerPressed {
                        position: pos - origin,
                        button,
                        modifiers,
                    });
                }
                Event::PointerButton {
                    pos,
                    button,
                    pressed: false,
                    modifiers,
                } => {
                    if self.canvas.pressed_buttons == 0 {
                        continue;
                    }
                    self.canvas.pressed_buttons -= 1;
                    self.engine.push_input(InputEvent::PointerReleased {
                        position: pos - origin,
                        button,
                        modifiers,
                    });
                }
                Event::PointerMoved(pos) => {
                    let inside = rect.contains(pos);
                    if inside || self.canvas.pressed_buttons > 0 {
                        self.engine.push_input(InputEvent::PointerMoved {
                            position: pos - origin,
                        });
                    } else if self.canvas.pointer_inside {
                        self.engine.push_input(InputEvent::PointerLeft);
                    }
                    self.canvas.pointer_inside = inside;
                }
                Event::PointerGone => {
                    self.canvas.pointer_inside = false;
                    self.canvas.pressed_buttons = 0;
                    self.engine.push_input(InputEvent::PointerLeft);
                }
                Event::Key {
                    key, pressed: true, ..
                } if keyboard_free && response.hovered() => {
                    self.engine.push_input(InputEvent::Key { key });
                }
                _ => {}
            }
        }

        if response.hovered()
            && scroll.abs() > f32::EPSILON
            && let Some(pointer) = hover_pos
        {
            self.engine.push_input(InputEvent::Scroll {
                position: pointer - origin,
                delta: scroll,
            });
        }

        if response.double_clicked()
            && let Some(pointer) = response.interact_pointer_pos()
        {
            self.engine.push_input(InputEvent::DoubleClick {
                position: pointer - origin,
            });
        }
    }
}
