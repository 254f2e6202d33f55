use eframe::egui::{Color32, Pos2, Rect};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

/// Geometry collected for one draw call. Coordinates are surface pixels.
pub struct Batch {
    builder: PathBuilder,
}

impl Default for Batch {
    fn default() -> Self {
        Self {
            builder: PathBuilder::new(),
        }
    }
}

impl Batch {
    pub fn line(&mut self, from: Pos2, to: Pos2) {
        self.builder.move_to(from.x, from.y);
        self.builder.line_to(to.x, to.y);
    }

    pub fn circle(&mut self, center: Pos2, radius: f32) {
        self.builder.push_circle(center.x, center.y, radius);
    }

    pub fn rect(&mut self, rect: Rect) {
        if let Some(rect) =
            tiny_skia::Rect::from_ltrb(rect.min.x, rect.min.y, rect.max.x, rect.max.y)
        {
            self.builder.push_rect(rect);
        }
    }

    /// Hands the collected path to `draw` and leaves the batch empty, keeping
    /// its allocation. Empty batches produce no path.
    fn drain(&mut self, draw: impl FnOnce(&tiny_skia::Path)) {
        let builder = std::mem::replace(&mut self.builder, PathBuilder::new());
        if let Some(path) = builder.finish() {
            draw(&path);
            self.builder = path.clear();
        }
    }
}

/// Two pixmaps of premultiplied RGBA. Drawing goes to the back one;
/// [`FrameSurface::present`] swaps it to the front.
#[derive(Default)]
pub struct FrameSurface {
    back: Option<Pixmap>,
    front: Option<Pixmap>,
    draw_calls: usize,
}

impl FrameSurface {
    /// Reallocates both pixmaps when the size changes. A zero-sized surface
    /// holds no pixmaps.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.size() == [width as usize, height as usize] && self.back.is_some() {
            return;
        }

        self.back = Pixmap::new(width, height);
        self.front = Pixmap::new(width, height);
        log::debug!("render surface resized to {width}x{height}");
    }

    pub fn begin_frame(&mut self, background: Color32) {
        self.draw_calls = 0;
        if let Some(back) = &mut self.back {
            back.fill(skia_color(background));
        }
    }

    /// One stroke call for the whole batch. Counted even when the batch is
    /// empty.
    pub fn stroke(&mut self, batch: &mut Batch, color: Color32, width: f32) {
        self.draw_calls += 1;
        let paint = paint(color);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        batch.drain(|path| {
            if let Some(back) = &mut self.back {
                back.stroke_path(path, &paint, &stroke, Transform::identity(), None);
            }
        });
    }

    pub fn fill(&mut self, batch: &mut Batch, color: Color32) {
        self.draw_calls += 1;
        let paint = paint(color);
        batch.drain(|path| {
            if let Some(back) = &mut self.back {
                back.fill_path(path, &paint, FillRule::Winding, Transform::identity(), None);
            }
        });
    }

    pub fn present(&mut self) {
        std::mem::swap(&mut self.back, &mut self.front);
    }

    pub fn release(&mut self) {
        self.back = None;
        self.front = None;
        self.draw_calls = 0;
    }

    pub fn front(&self) -> &[u8] {
        match &self.front {
            Some(pixmap) => pixmap.data(),
            None => &[],
        }
    }

    pub fn size(&self) -> [usize; 2] {
        self.front
            .as_ref()
            .map_or([0, 0], |pixmap| [pixmap.width() as usize, pixmap.height() as usize])
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    #[cfg(test)]
    pub fn front_pixel(&self, x: usize, y: usize) -> Option<Color32> {
        let pixel = self.front.as_ref()?.pixel(x as u32, y as u32)?;
        Some(Color32::from_rgba_premultiplied(
            pixel.red(),
            pixel.green(),
            pixel.blue(),
            pixel.alpha(),
        ))
    }
}

fn skia_color(color: Color32) -> tiny_skia::Color {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn paint(color: Color32) -> Paint<'static> {
    let mut paint = Paint {
        anti_alias: true,
        ..Paint::default()
    };
    paint.set_color(skia_color(color));
    paint
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};

    #[test]
    fn present_swaps_the_drawn_frame_to_the_front() {
        let mut surface = FrameSurface::default();
        surface.resize(32, 16);
        surface.begin_frame(Color32::BLACK);

        let mut batch = Batch::default();
        batch.rect(Rect::from_min_size(pos2(4.0, 4.0), vec2(4.0, 4.0)));
        surface.fill(&mut batch, Color32::RED);
        assert_eq!(surface.front_pixel(5, 5), Some(Color32::TRANSPARENT));

        surface.present();
        assert_eq!(surface.front_pixel(5, 5), Some(Color32::RED));
        assert_eq!(surface.front_pixel(20, 5), Some(Color32::BLACK));
        assert_eq!(surface.draw_calls(), 1);
    }

    #[test]
    fn lines_running_off_the_surface_still_draw_the_visible_part() {
        let mut surface = FrameSurface::default();
        surface.resize(10, 10);
        surface.begin_frame(Color32::BLACK);

        let mut batch = Batch::default();
        batch.line(pos2(-500.0, 5.5), pos2(500.0, 5.5));
        surface.stroke(&mut batch, Color32::WHITE, 1.0);
        surface.present();

        for x in 0..10 {
            assert_ne!(surface.front_pixel(x, 5), Some(Color32::BLACK), "x = {x}");
        }
        assert_eq!(surface.front_pixel(0, 0), Some(Color32::BLACK));
    }

    #[test]
    fn empty_batches_still_count_as_a_draw_call() {
        let mut surface = FrameSurface::default();
        surface.resize(8, 8);
        surface.begin_frame(Color32::BLACK);

        let mut batch = Batch::default();
        surface.stroke(&mut batch, Color32::WHITE, 1.0);
        surface.present();

        assert_eq!(surface.draw_calls(), 1);
        assert_eq!(surface.front_pixel(4, 4), Some(Color32::BLACK));
    }

    #[test]
    fn release_frees_the_pixmaps() {
        let mut surface = FrameSurface::default();
        surface.resize(8, 8);
        surface.release();
        assert!(surface.front().is_empty());
        assert_eq!(surface.size(), [0, 0]);
    }
}
