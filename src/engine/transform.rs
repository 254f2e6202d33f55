use eframe::egui::{Pos2, Rect, Vec2};

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 6.0;

/// Model to screen mapping: `screen = viewport.center() + pan + world * zoom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub viewport: Rect,
    pub pan: Vec2,
    pub zoom: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            viewport: Rect::NOTHING,
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn world_to_screen(&self, world: Vec2) -> Pos2 {
        self.viewport.center() + self.pan + world * self.zoom
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Vec2 {
        (screen - self.viewport.center() - self.pan) / self.zoom
    }

    /// Scales by `factor` while keeping the model point under `anchor` fixed.
    pub fn zoom_about(&mut self, anchor: Pos2, factor: f32) {
        let world_before = self.screen_to_world(anchor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = anchor - self.viewport.center() - (world_before * self.zoom);
    }

    pub fn reset(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// A viewport with no area (or a broken zoom) cannot be drawn into.
    pub fn is_degenerate(&self) -> bool {
        !(self.viewport.width() >= 1.0 && self.viewport.height() >= 1.0)
            || !self.zoom.is_finite()
            || self.zoom <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};

    fn transform() -> ViewTransform {
        ViewTransform {
            viewport: Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0)),
            pan: vec2(30.0, -12.0),
            zoom: 1.75,
        }
    }

    #[test]
    fn screen_and_world_are_inverse() {
        let view = transform();
        let world = vec2(-42.5, 17.0);
        let back = view.screen_to_world(view.world_to_screen(world));
        assert!((back - world).length() < 1.0e-4);
    }

    #[test]
    fn zoom_keeps_the_anchor_in_place() {
        let mut view = transform();
        let anchor = pos2(610.0, 95.0);
        let world = view.screen_to_world(anchor);

        view.zoom_about(anchor, 1.15);
        assert!((view.world_to_screen(world) - anchor).length() < 1.0e-3);

        for _ in 0..200 {
            view.zoom_about(anchor, 1.15);
        }
        assert_eq!(view.zoom, MAX_ZOOM);
    }

    #[test]
    fn empty_viewport_is_degenerate() {
        let mut view = transform();
        assert!(!view.is_degenerate());
        view.viewport = Rect::from_min_size(pos2(0.0, 0.0), vec2(0.0, 600.0));
        assert!(view.is_degenerate());
        assert!(ViewTransform::default().is_degenerate());
    }
}
