use eframe::egui::{Vec2, vec2};

use crate::engine::model::{Link, Node};
use crate::engine::spatial::QuadNode;

const MIN_DISTANCE_SQ: f32 = 1.0;
const COINCIDENT_OFFSET: f32 = 1.0e-6;

/// Deterministic stand-in direction for two nodes sitting on the same spot.
fn coincident_direction(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

fn is_finite(value: Vec2) -> bool {
    value.x.is_finite() && value.y.is_finite()
}

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    /// Charge strength already scaled by alpha; negative repels.
    pub(super) weight: f32,
    pub(super) max_distance_sq: f32,
    pub(super) theta: f32,
}

/// Velocity change for a node whose neighbour (or cell) sits at `offset`.
fn charge_between(offset: Vec2, weight: f32, from: usize, to: usize) -> Vec2 {
    let mut offset = offset;
    let mut distance_sq = offset.length_sq();
    if distance_sq <= 0.0 {
        offset = coincident_direction(from, to) * COINCIDENT_OFFSET;
        distance_sq = offset.length_sq();
    }
    if distance_sq < MIN_DISTANCE_SQ {
        distance_sq = (MIN_DISTANCE_SQ * distance_sq).sqrt();
    }
    offset * (weight / distance_sq)
}

pub(super) fn accumulate_charge_exact(
    positions: &[Vec2],
    params: ChargeParams,
    deltas: &mut [Vec2],
) {
    for from in 0..positions.len() {
        if !is_finite(positions[from]) {
            continue;
        }
        for to in (from + 1)..positions.len() {
            if !is_finite(positions[to]) {
                continue;
            }
            let offset = positions[to] - positions[from];
            if offset.length_sq() >= params.max_distance_sq {
                continue;
            }

            let push = charge_between(offset, params.weight, from, to);
            deltas[from] += push;
            deltas[to] -= push;
        }
    }
}

/// Barnes-Hut: distant cells act as a single charge at their center of mass.
pub(super) fn accumulate_charge_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    params: ChargeParams,
    delta: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];
    if !is_finite(point) || node.bounds.distance_sq_to_point(point) >= params.max_distance_sq {
        return;
    }

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            let offset = positions[other_index] - point;
            if offset.length_sq() >= params.max_distance_sq {
                continue;
            }
            *delta += charge_between(offset, params.weight, index, other_index);
        }
        return;
    }

    let offset = node.center_of_mass - point;
    let distance_sq = offset.length_sq().max(0.0001);
    let side = node.bounds.side_length();
    let can_approximate = !node.bounds.contains(point)
        && (side * side) < (params.theta * params.theta * distance_sq)
        && node.mass > 1.0;

    if can_approximate {
        if distance_sq < params.max_distance_sq {
            *delta += charge_between(offset, params.weight * node.mass, index, usize::MAX);
        }
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_charge_for_node(child, index, positions, params, delta);
    }
}

/// Displacement spring on predicted positions. Corrections are split by
/// degree so that hubs move less than leaves.
pub(super) fn apply_link_force(
    nodes: &mut [Node],
    links: &[Link],
    degrees: &[usize],
    distance: f32,
    strength_scale: f32,
    alpha: f32,
) {
    for link in links {
        let (source, target) = (link.source, link.target);
        let source_degree = degrees[source].max(1) as f32;
        let target_degree = degrees[target].max(1) as f32;
        let strength = strength_scale * link.strength / source_degree.min(target_degree);
        let bias = source_degree / (source_degree + target_degree);

        let mut delta = (nodes[target].position + nodes[target].velocity)
            - (nodes[source].position + nodes[source].velocity);
        if !is_finite(delta) {
            continue;
        }
        if delta.length_sq() <= 0.0 {
            delta = coincident_direction(source, target) * COINCIDENT_OFFSET;
        }

        let length = delta.length();
        let correction = delta * ((length - distance) / length * alpha * strength);
        nodes[target].velocity -= correction * bias;
        nodes[source].velocity += correction * (1.0 - bias);
    }
}

pub(super) fn apply_center_force(nodes: &mut [Node], center: Vec2, strength: f32, alpha: f32) {
    let pull = strength * alpha;
    if pull <= 0.0 {
        return;
    }

    for node in nodes {
        node.velocity += (center - node.position) * pull;
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
}

fn collide_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    deltas: &mut [Vec2],
) {
    let min_distance = radii[from] + radii[to];
    let delta = positions[from] - positions[to];
    let distance_sq = delta.length_sq();
    if distance_sq >= min_distance * min_distance {
        return;
    }

    let distance = distance_sq.sqrt();
    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        coincident_direction(from, to)
    };

    let overlap_push = (min_distance - distance) * params.strength;
    let from_sq = radii[from] * radii[from];
    let to_sq = radii[to] * radii[to];
    let from_share = if from_sq + to_sq > 0.0 {
        to_sq / (from_sq + to_sq)
    } else {
        0.5
    };

    deltas[from] += direction * (overlap_push * from_share);
    deltas[to] -= direction * (overlap_push * (1.0 - from_share));
}

/// Dual-tree traversal: only cell pairs close enough to touch are descended.
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    deltas: &mut [Vec2],
) {
    let reach = node_a.max_radius + node_b.max_radius;
    if node_a.bounds.distance_sq_to(node_b.bounds) > reach * reach {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for i in 0..node_a.indices.len() {
                for j in (i + 1)..node_a.indices.len() {
                    collide_pair(
                        node_a.indices[i],
                        node_a.indices[j],
                        positions,
                        radii,
                        params,
                        deltas,
                    );
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    collide_pair(from, to, positions, radii, params, deltas);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_collision_pairs(child_a, child_a, true, positions, radii, params, deltas);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_collision_pairs(
                    child_a, child_b, false, positions, radii, params, deltas,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(child, node_b, false, positions, radii, params, deltas);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(node_a, child, false, positions, radii, params, deltas);
        }
    }
}
