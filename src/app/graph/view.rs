use eframe::egui::{
    self, Align2, Color32, ColorImage, FontId, Rect, Sense, Stroke, TextureOptions, Ui, pos2, vec2,
};

use crate::engine::physics::SimulationState;
use crate::engine::style::LABEL_COLOR;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());

        self.forward_graph_input(ui, rect, &response);

        let dt = ui.input(|input| input.unstable_dt);
        self.engine.set_pixels_per_point(ui.ctx().pixels_per_point());
        let report = self.engine.frame(dt, [rect.width(), rect.height()]);
        self.last_report = Some(report);

        self.upload_frame(ui.ctx());
        let painter = ui.painter_at(rect);
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        let offset = rect.min.to_vec2();
        if self.show_quadtree_overlay {
            self.engine.quadtree_cells(&mut self.quadtree_cells);
            let transform = self.engine.transform();
            for cell in &self.quadtree_cells {
                let min = cell.center - vec2(cell.half_extent, cell.half_extent);
                let max = cell.center + vec2(cell.half_extent, cell.half_extent);
                let top_left = transform.world_to_screen(vec2(min.x, min.y)) + offset;
                let top_right = transform.world_to_screen(vec2(max.x, min.y)) + offset;
                let bottom_right = transform.world_to_screen(vec2(max.x, max.y)) + offset;
                let bottom_left = transform.world_to_screen(vec2(min.x, max.y)) + offset;

                let alpha = if cell.is_leaf { 110 } else { 55 };
                let line_width: f32 =
                    (1.4_f32 - (cell.depth as f32 * 0.09_f32)).clamp(0.45_f32, 1.4_f32);
                let stroke = Stroke::new(
                    line_width,
                    Color32::from_rgba_unmultiplied(106, 198, 255, alpha),
                );

                painter.line_segment([top_left, top_right], stroke);
                painter.line_segment([top_right, bottom_right], stroke);
                painter.line_segment([bottom_right, bottom_left], stroke);
                painter.line_segment([bottom_left, top_left], stroke);
            }
        }

        if let Some(model) = self.engine.model() {
            for label in self.engine.labels() {
                let Some(node) = model.node(label.node) else {
                    continue;
                };
                painter.text(
                    label.position + offset + vec2(label.radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    node.title.as_str(),
                    FontId::proportional(12.0),
                    LABEL_COLOR,
                );
            }
        }

        if self.engine.hovered().is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        if report.state == SimulationState::Running || self.canvas.pressed_buttons > 0 {
            ui.ctx().request_repaint();
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let (pixels, [width, height]) = self.engine.frame_pixels();
        if width == 0 || height == 0 || pixels.len() != width * height * 4 {
            return;
        }

        let image = ColorImage::from_rgba_premultiplied([width, height], pixels);
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => {
                let texture = ctx.load_texture("graph-frame", image, TextureOptions::LINEAR);
                self.texture = Some(texture);
            }
        }
    }
}
