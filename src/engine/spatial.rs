use std::collections::HashSet;

use eframe::egui::{Vec2, vec2};

use super::model::Node;

const QUADTREE_LEAF_CAPACITY: usize = 12;
const QUADTREE_MAX_DEPTH: usize = 16;
const COINCIDENT_JITTER: f32 = 1.0e-3;
const COINCIDENT_ATTEMPTS: u32 = 64;

#[derive(Clone, Copy, Debug)]
pub(in crate::engine) struct QuadBounds {
    pub(in crate::engine) center: Vec2,
    pub(in crate::engine) half_extent: f32,
}

impl QuadBounds {
    fn from_points(points: &[Vec2], indices: &[usize]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for &index in indices {
            let point = points[index];
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let center = min * 0.5 + max * 0.5;
        let span_x = (max.x - min.x).max(1.0);
        let span_y = (max.y - min.y).max(1.0);
        let half_extent = (span_x.max(span_y) * 0.5) + 1.0;

        Some(Self {
            center,
            half_extent,
        })
    }

    pub(in crate::engine) fn contains(self, point: Vec2) -> bool {
        let min = self.center - vec2(self.half_extent, self.half_extent);
        let max = self.center + vec2(self.half_extent, self.half_extent);
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => vec2(-quarter, -quarter),
            1 => vec2(quarter, -quarter),
            2 => vec2(-quarter, quarter),
            _ => vec2(quarter, quarter),
        };

        Self {
            center: self.center + offset,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        let right = point.x >= self.center.x;
        let upper = point.y >= self.center.y;
        match (right, upper) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    pub(in crate::engine) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }

    /// Squared gap between two boxes, zero when they overlap.
    pub(in crate::engine) fn distance_sq_to(self, other: Self) -> f32 {
        let dx = (self.center.x - other.center.x).abs() - (self.half_extent + other.half_extent);
        let dy = (self.center.y - other.center.y).abs() - (self.half_extent + other.half_extent);
        let clamped_dx = dx.max(0.0);
        let clamped_dy = dy.max(0.0);
        (clamped_dx * clamped_dx) + (clamped_dy * clamped_dy)
    }

    pub(in crate::engine) fn distance_sq_to_point(self, point: Vec2) -> f32 {
        let dx = ((self.center.x - point.x).abs() - self.half_extent).max(0.0);
        let dy = ((self.center.y - point.y).abs() - self.half_extent).max(0.0);
        (dx * dx) + (dy * dy)
    }
}

pub(in crate::engine) struct QuadNode {
    pub(in crate::engine) bounds: QuadBounds,
    pub(in crate::engine) center_of_mass: Vec2,
    pub(in crate::engine) mass: f32,
    pub(in crate::engine) max_radius: f32,
    pub(in crate::engine) indices: Vec<usize>,
    pub(in crate::engine) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    fn build(
        bounds: QuadBounds,
        indices: Vec<usize>,
        points: &[Vec2],
        radii: &[f32],
        depth: usize,
    ) -> Self {
        let mut center_of_mass = Vec2::ZERO;
        let mut max_radius = 0.0_f32;
        for &index in &indices {
            center_of_mass += points[index];
            max_radius = max_radius.max(radii[index]);
        }

        let mass = indices.len() as f32;
        if mass > 0.0 {
            center_of_mass /= mass;
        }

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            max_radius,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= QUADTREE_MAX_DEPTH || node.indices.len() <= QUADTREE_LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            let quadrant = bounds.quadrant_for(points[index]);
            buckets[quadrant].push(index);
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }

            node.children[quadrant] = Some(Box::new(Self::build(
                bounds.child(quadrant),
                bucket,
                points,
                radii,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(in crate::engine) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}

/// One quadtree cell, flattened for the debugging overlay.
#[derive(Clone, Copy, Debug)]
pub struct QuadtreeCell {
    pub center: Vec2,
    pub half_extent: f32,
    pub depth: usize,
    pub is_leaf: bool,
}

/// Quadtree over node centers, rebuilt from scratch whenever positions change.
/// Indices handed out are the node indices of the slice it was built from.
#[derive(Default)]
pub struct SpatialIndex {
    root: Option<QuadNode>,
    points: Vec<Vec2>,
    radii: Vec<f32>,
    occupied: HashSet<(u32, u32)>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(&mut self, nodes: &[Node]) {
        self.rebuild_from(nodes.iter().map(|node| (node.position, node.radius)));
    }

    pub(in crate::engine) fn rebuild_from(&mut self, items: impl Iterator<Item = (Vec2, f32)>) {
        self.points.clear();
        self.radii.clear();
        self.occupied.clear();

        let mut indices = Vec::new();
        for (index, (position, radius)) in items.enumerate() {
            let finite = position.x.is_finite() && position.y.is_finite();
            let point = if finite {
                self.separate_coincident(index, position)
            } else {
                position
            };
            self.points.push(point);
            self.radii.push(if radius.is_finite() { radius.max(0.0) } else { 0.0 });
            if finite {
                indices.push(index);
            }
        }

        self.root = QuadBounds::from_points(&self.points, &indices)
            .map(|bounds| QuadNode::build(bounds, indices, &self.points, &self.radii, 0));
    }

    /// Nudges `position` off any point already inserted at the exact same
    /// coordinates, so the tree rarely has to split an unsplittable cell. The
    /// step never drops below a few ulps of the coordinate, otherwise it would
    /// round away at large magnitudes. Points that still collide after
    /// [`COINCIDENT_ATTEMPTS`] stay put and share a max-depth leaf.
    fn separate_coincident(&mut self, index: usize, position: Vec2) -> Vec2 {
        if self.occupied.insert((position.x.to_bits(), position.y.to_bits())) {
            return position;
        }

        let base_step = (COINCIDENT_JITTER * position.length().max(1.0).sqrt())
            .max(position.abs().max_elem() * f32::EPSILON * 4.0);
        for attempt in 1..=COINCIDENT_ATTEMPTS {
            let angle = ((index as f32) * 0.618_034 + (attempt as f32) * 0.414_214)
                * std::f32::consts::TAU;
            let point = position + vec2(angle.cos(), angle.sin()) * (base_step * attempt as f32);
            if point.x.is_finite()
                && point.y.is_finite()
                && self.occupied.insert((point.x.to_bits(), point.y.to_bits()))
            {
                return point;
            }
        }
        position
    }

    /// Finds the node whose circle, grown by `radius`, contains `point`. When
    /// several do, the one with the closest center wins.
    pub fn query(&self, point: Vec2, radius: f32) -> Option<usize> {
        let root = self.root.as_ref()?;
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }

        let mut best = None;
        self.query_node(root, point, radius.max(0.0), &mut best);
        best.map(|(index, _distance)| index)
    }

    fn query_node(
        &self,
        node: &QuadNode,
        point: Vec2,
        radius: f32,
        best: &mut Option<(usize, f32)>,
    ) {
        let gap_sq = node.bounds.distance_sq_to_point(point);
        let reach = radius + node.max_radius;
        if gap_sq > reach * reach {
            return;
        }
        if let Some((_, best_distance)) = *best
            && gap_sq > best_distance * best_distance
        {
            return;
        }

        if node.is_leaf() {
            for &index in &node.indices {
                let distance = (self.points[index] - point).length();
                if distance > self.radii[index] + radius {
                    continue;
                }
                let closer = match *best {
                    None => true,
                    Some((best_index, best_distance)) => {
                        distance < best_distance
                            || (distance == best_distance && index < best_index)
                    }
                };
                if closer {
                    *best = Some((index, distance));
                }
            }
            return;
        }

        for child in node.children.iter().flatten() {
            self.query_node(child, point, radius, best);
        }
    }

    pub fn cells(&self, cells: &mut Vec<QuadtreeCell>) {
        cells.clear();
        if let Some(root) = &self.root {
            collect_quadtree_cells(root, 0, cells);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub(in crate::engine) fn root(&self) -> Option<&QuadNode> {
        self.root.as_ref()
    }

    pub(in crate::engine) fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub(in crate::engine) fn radii(&self) -> &[f32] {
        &self.radii
    }
}

fn collect_quadtree_cells(node: &QuadNode, depth: usize, cells: &mut Vec<QuadtreeCell>) {
    cells.push(QuadtreeCell {
        center: node.bounds.center,
        half_extent: node.bounds.half_extent,
        depth,
        is_leaf: node.is_leaf(),
    });

    for child in node.children.iter().flatten() {
        collect_quadtree_cells(child, depth + 1, cells);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(items: &[(Vec2, f32)]) -> SpatialIndex {
        let mut index = SpatialIndex::new();
        index.rebuild_from(items.iter().copied());
        index
    }

    #[test]
    fn query_prefers_the_closest_overlapping_center() {
        let index = index_of(&[
            (vec2(0.0, 0.0), 10.0),
            (vec2(6.0, 0.0), 10.0),
            (vec2(50.0, 50.0), 4.0),
        ]);

        assert_eq!(index.query(vec2(4.0, 0.0), 0.0), Some(1));
        assert_eq!(index.query(vec2(2.0, 0.0), 0.0), Some(0));
        assert_eq!(index.query(vec2(52.0, 50.0), 0.0), Some(2));
        assert_eq!(index.query(vec2(30.0, 30.0), 0.0), None);
        assert_eq!(index.query(vec2(30.0, 30.0), 30.0), Some(2));
    }

    #[test]
    fn query_finds_nodes_across_many_cells() {
        let mut items = Vec::new();
        for row in 0..40 {
            for column in 0..40 {
                items.push((vec2(column as f32 * 20.0, row as f32 * 20.0), 5.0));
            }
        }
        let index = index_of(&items);

        assert!(index.cells_len() > 1);
        for sample in [0usize, 41, 799, 1599] {
            let (center, _) = items[sample];
            assert_eq!(index.query(center + vec2(1.0, -1.0), 0.0), Some(sample));
        }
        assert_eq!(index.query(vec2(10.0, 10.0), 0.0), None);
    }

    #[test]
    fn coincident_points_do_not_recurse_forever() {
        let items = vec![(vec2(3.0, 3.0), 2.0); 500];
        let index = index_of(&items);

        assert_eq!(index.len(), 500);
        let mut seen = HashSet::new();
        for point in index.points() {
            assert!(seen.insert((point.x.to_bits(), point.y.to_bits())));
            assert!((*point - vec2(3.0, 3.0)).length() < 1.0);
        }
        assert!(index.query(vec2(3.0, 3.0), 0.0).is_some());
    }

    #[test]
    fn coincident_points_at_huge_coordinates_are_still_separated() {
        let index = index_of(&[(vec2(1.0e30, 1.0e30), 5.0); 2]);

        let points = index.points();
        assert_ne!(
            (points[0].x.to_bits(), points[0].y.to_bits()),
            (points[1].x.to_bits(), points[1].y.to_bits())
        );
        assert!(points.iter().all(|point| point.x.is_finite() && point.y.is_finite()));
        assert!(index.root().is_some());

        let edge = index_of(&[(vec2(f32::MAX, f32::MAX), 1.0); 3]);
        assert_eq!(edge.len(), 3);
        assert!(edge.root().is_some());
    }

    #[test]
    fn non_finite_points_are_left_out() {
        let index = index_of(&[
            (vec2(f32::NAN, 0.0), 5.0),
            (vec2(1.0, 1.0), 5.0),
        ]);
        assert_eq!(index.query(vec2(1.0, 1.0), 0.0), Some(1));
        assert_eq!(index.root().map(|root| root.mass), Some(1.0));
    }

    impl SpatialIndex {
        fn cells_len(&self) -> usize {
            let mut cells = Vec::new();
            self.cells(&mut cells);
            cells.len()
        }
    }
}
