mod surface;

use std::collections::BTreeSet;
use std::time::Instant;

use eframe::egui::{Color32, Pos2, Rect, Vec2, pos2, vec2};

pub use surface::FrameSurface;
use surface::Batch;

use super::config::NodeShape;
use super::governor::Fidelity;
use super::model::{ColorGroup, Link, Node};
use super::style::{BACKGROUND, HOVER_COLOR, LINK_COLOR, SELECTED_COLOR, blend_color};
use super::transform::ViewTransform;

/// Culling margin in pixels, so strokes and antialiased edges are not clipped
/// early.
const CULL_PADDING: f32 = 2.0;
const LINK_WIDTH: f32 = 1.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub frame_time_ms: f32,
    /// Link stroke plus one fill per visible color group.
    pub draw_call_count: usize,
    pub label_count: usize,
    pub skipped: bool,
}

/// A node title to be painted over the presented frame, in screen space.
#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub node: usize,
    pub position: Pos2,
    pub radius: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bucket {
    Group(usize),
    Selected,
    Hovered,
}

pub struct Renderer {
    surface: FrameSurface,
    transform: ViewTransform,
    fidelity: Fidelity,
    shape: NodeShape,
    label_threshold: f32,
    palette: Vec<Color32>,
    hovered: Option<usize>,
    selected: BTreeSet<usize>,
    pixels_per_point: f32,
    link_batch: Batch,
    node_batch: Batch,
    buckets: Vec<Vec<usize>>,
    labels: Vec<Label>,
    degenerate_logged: bool,
    last_stats: FrameStats,
}

impl Renderer {
    pub fn new(shape: NodeShape, label_threshold: f32) -> Self {
        Self {
            surface: FrameSurface::default(),
            transform: ViewTransform::default(),
            fidelity: Fidelity::Full,
            shape,
            label_threshold,
            palette: Vec::new(),
            hovered: None,
            selected: BTreeSet::new(),
            pixels_per_point: 1.0,
            link_batch: Batch::default(),
            node_batch: Batch::default(),
            buckets: Vec::new(),
            labels: Vec::new(),
            degenerate_logged: false,
            last_stats: FrameStats::default(),
        }
    }

    pub fn set_transform(&mut self, transform: ViewTransform) {
        self.transform = transform;
    }

    pub fn set_quality(&mut self, fidelity: Fidelity) {
        self.fidelity = fidelity;
    }

    /// Physical pixels per logical point. The surface is allocated at this
    /// density; labels stay in points.
    pub fn set_pixels_per_point(&mut self, scale: f32) {
        self.pixels_per_point = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
    }

    pub fn set_shape(&mut self, shape: NodeShape) {
        self.shape = shape;
    }

    pub fn set_label_threshold(&mut self, threshold: f32) {
        self.label_threshold = threshold;
    }

    pub fn set_palette(&mut self, groups: &[ColorGroup]) {
        self.palette.clear();
        self.palette.extend(groups.iter().map(|group| group.color));
    }

    pub fn set_highlight(&mut self, hovered: Option<usize>, selected: &BTreeSet<usize>) {
        self.hovered = hovered;
        self.selected.clone_from(selected);
    }

    pub fn render(&mut self, nodes: &[Node], links: &[Link]) -> FrameStats {
        let started = Instant::now();

        if self.transform.is_degenerate() {
            if !self.degenerate_logged {
                log::warn!(
                    "skipping render: viewport {:?} at zoom {} has no drawable area",
                    self.transform.viewport.size(),
                    self.transform.zoom
                );
                self.degenerate_logged = true;
            }
            self.labels.clear();
            self.last_stats = FrameStats {
                skipped: true,
                ..FrameStats::default()
            };
            return self.last_stats;
        }
        if self.degenerate_logged {
            log::info!("viewport is drawable again, rendering resumed");
            self.degenerate_logged = false;
        }

        let viewport = self.transform.viewport;
        let scale = self.pixels_per_point;
        let local = Rect::from_min_size(Pos2::ZERO, viewport.size() * scale);
        self.surface
            .resize(local.width().round() as u32, local.height().round() as u32);
        self.surface.begin_frame(BACKGROUND);

        let origin = viewport.min.to_vec2();
        let to_local = |world: Vec2| {
            ((self.transform.world_to_screen(world) - origin).to_vec2() * scale).to_pos2()
        };

        for link in links {
            let (Some(source), Some(target)) = (nodes.get(link.source), nodes.get(link.target))
            else {
                continue;
            };
            let start = to_local(source.position);
            let end = to_local(target.position);
            if edge_visible(local, start, end, CULL_PADDING)
                && let Some((start, end)) = clip_segment(local.expand(CULL_PADDING), start, end)
            {
                self.link_batch.line(start, end);
            }
        }
        self.surface
            .stroke(&mut self.link_batch, LINK_COLOR, LINK_WIDTH * scale);

        let bucket_count = self.palette.len().max(1) + 2;
        self.buckets.resize_with(bucket_count, Vec::new);
        for bucket in &mut self.buckets {
            bucket.clear();
        }

        let zoom = self.transform.zoom;
        for (index, node) in nodes.iter().enumerate() {
            let center = to_local(node.position);
            let radius = node.radius * zoom * scale;
            if !circle_visible(local, center, radius + CULL_PADDING) {
                continue;
            }
            let slot = match self.bucket_for(index, node) {
                Bucket::Group(group) => group.min(bucket_count - 3),
                Bucket::Selected => bucket_count - 2,
                Bucket::Hovered => bucket_count - 1,
            };
            self.buckets[slot].push(index);
        }

        let shape = match self.fidelity {
            Fidelity::Full => self.shape,
            Fidelity::Simplified => NodeShape::Rectangle,
        };
        for slot in 0..bucket_count {
            if self.buckets[slot].is_empty() {
                continue;
            }

            for &index in &self.buckets[slot] {
                let node = &nodes[index];
                let center = to_local(node.position);
                let radius = node.radius * zoom * scale;
                match shape {
                    NodeShape::Circle => self.node_batch.circle(center, radius),
                    NodeShape::Rectangle => self
                        .node_batch
                        .rect(Rect::from_center_size(center, vec2(radius, radius) * 2.0)),
                }
            }
            let color = self.slot_color(slot, bucket_count);
            self.surface.fill(&mut self.node_batch, color);
        }

        self.labels.clear();
        if self.labels_enabled() {
            for bucket in &self.buckets {
                for &index in bucket {
                    self.labels.push(Label {
                        node: index,
                        position: self.transform.world_to_screen(nodes[index].position),
                        radius: nodes[index].radius * zoom,
                    });
                }
            }
            self.labels.sort_unstable_by_key(|label| label.node);
        }

        self.surface.present();

        self.last_stats = FrameStats {
            frame_time_ms: started.elapsed().as_secs_f32() * 1000.0,
            draw_call_count: self.surface.draw_calls(),
            label_count: self.labels.len(),
            skipped: false,
        };
        self.last_stats
    }

    fn bucket_for(&self, index: usize, node: &Node) -> Bucket {
        if self.hovered == Some(index) {
            Bucket::Hovered
        } else if self.selected.contains(&index) {
            Bucket::Selected
        } else {
            Bucket::Group(node.color_group)
        }
    }

    fn slot_color(&self, slot: usize, bucket_count: usize) -> Color32 {
        if slot == bucket_count - 1 {
            HOVER_COLOR
        } else if slot == bucket_count - 2 {
            SELECTED_COLOR
        } else {
            let base = self.palette.get(slot).copied().unwrap_or(Color32::GRAY);
            blend_color(base, Color32::WHITE, 0.08)
        }
    }

    fn labels_enabled(&self) -> bool {
        self.fidelity == Fidelity::Full && self.transform.zoom >= self.label_threshold
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn surface(&self) -> &FrameSurface {
        &self.surface
    }

    #[cfg(test)]
    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn release(&mut self) {
        self.surface.release();
        self.labels = Vec::new();
        self.buckets = Vec::new();
        self.link_batch = Batch::default();
        self.node_batch = Batch::default();
    }
}

fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    if max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom() {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    segments_intersect(start, end, rect.left_top(), rect.right_top())
        || segments_intersect(start, end, rect.right_top(), rect.right_bottom())
        || segments_intersect(start, end, rect.right_bottom(), rect.left_bottom())
        || segments_intersect(start, end, rect.left_bottom(), rect.left_top())
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

/// Trims a segment to `rect` so far-away endpoints never reach the rasterizer.
fn clip_segment(rect: Rect, start: Pos2, end: Pos2) -> Option<(Pos2, Pos2)> {
    let delta = end - start;
    let mut enter = 0.0_f32;
    let mut exit = 1.0_f32;
    for (p, q) in [
        (-delta.x, start.x - rect.min.x),
        (delta.x, rect.max.x - start.x),
        (-delta.y, start.y - rect.min.y),
        (delta.y, rect.max.y - start.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            enter = enter.max(q / p);
        } else {
            exit = exit.min(q / p);
        }
    }

    (enter <= exit).then(|| (start + delta * enter, start + delta * exit))
}

/// Canvas-local viewport for a surface of `size` points.
pub fn viewport_of(size: [f32; 2]) -> Rect {
    Rect::from_min_size(pos2(0.0, 0.0), vec2(size[0], size[1]))
}
