use std::collections::{BTreeMap, HashMap, HashSet};

use eframe::egui::{Color32, Vec2, vec2};

use super::config::{CATEGORY_COLOR_FIELD, EngineConfig, SizeScale};
use super::error::{EngineWarning, InvariantError};
use super::snapshot::{LinkRecord, NodeRecord, Snapshot};
use super::style::{METRIC_BUCKETS, category_color, metric_bucket, metric_bucket_color};

const INITIAL_RADIUS: f32 = 10.0;
const UNCATEGORIZED: &str = "uncategorized";

/// A fixed coordinate that overrides simulated motion until released.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pin {
    pub x: f32,
    pub y: f32,
}

impl Pin {
    pub fn at(position: Vec2) -> Self {
        Self {
            x: position.x,
            y: position.y,
        }
    }

    pub fn position(self) -> Vec2 {
        vec2(self.x, self.y)
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub metrics: BTreeMap<String, f64>,
    /// Index into [`GraphModel::categories`].
    pub category: usize,
    /// Index into [`GraphModel::color_groups`].
    pub color_group: usize,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub pin: Option<Pin>,
}

impl Node {
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }

    fn is_finite(&self) -> bool {
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && self.velocity.x.is_finite()
            && self.velocity.y.is_finite()
    }
}

/// An edge between two dense node indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub source: usize,
    pub target: usize,
    pub strength: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorGroup {
    pub label: String,
    pub color: Color32,
}

/// Node and link arena. Links refer to nodes by index; ids are only resolved
/// once, while the model is built.
#[derive(Debug, Default)]
pub struct GraphModel {
    nodes: Vec<Node>,
    links: Vec<Link>,
    index_by_id: HashMap<String, usize>,
    degrees: Vec<usize>,
    categories: Vec<String>,
    color_groups: Vec<ColorGroup>,
    warnings: Vec<EngineWarning>,
}

impl GraphModel {
    pub fn from_snapshot(snapshot: &Snapshot, config: &EngineConfig) -> Self {
        let mut model = Self::default();
        let mut category_index: HashMap<String, usize> = HashMap::new();

        for record in &snapshot.nodes {
            if model.index_by_id.contains_key(&record.id) {
                model.warnings.push(EngineWarning::DuplicateNode {
                    id: record.id.clone(),
                });
                continue;
            }

            let tag = record
                .category
                .as_deref()
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .unwrap_or(UNCATEGORIZED);
            let category = match category_index.get(tag) {
                Some(&index) => index,
                None => {
                    let index = model.categories.len();
                    model.categories.push(tag.to_owned());
                    category_index.insert(tag.to_owned(), index);
                    index
                }
            };

            let index = model.nodes.len();
            model.index_by_id.insert(record.id.clone(), index);
            model.nodes.push(Self::make_node(record, index, category, config));
        }

        model.degrees = vec![0; model.nodes.len()];
        for record in &snapshot.links {
            if let Some(link) = model.resolve_link(record) {
                model.degrees[link.source] += 1;
                model.degrees[link.target] += 1;
                model.links.push(link);
            }
        }

        model.apply_appearance(config);
        model.log_warnings();
        model
    }

    fn make_node(
        record: &NodeRecord,
        index: usize,
        category: usize,
        config: &EngineConfig,
    ) -> Node {
        let pin = record
            .pin
            .map(|[x, y]| Pin { x, y })
            .filter(|pin| pin.is_finite());

        let position = match (pin, record.x, record.y) {
            (Some(pin), _, _) => pin.position(),
            (None, Some(x), Some(y)) if x.is_finite() && y.is_finite() => vec2(x, y),
            _ => phyllotaxis(index) + vec2(config.center.x, config.center.y),
        };

        Node {
            id: record.id.clone(),
            title: if record.title.is_empty() {
                record.id.clone()
            } else {
                record.title.clone()
            },
            metrics: record.metrics.clone(),
            category,
            color_group: 0,
            position,
            velocity: Vec2::ZERO,
            radius: config.min_radius,
            pin,
        }
    }

    fn resolve_link(&mut self, record: &LinkRecord) -> Option<Link> {
        let source = self.index_by_id.get(&record.source).copied();
        let target = self.index_by_id.get(&record.target).copied();

        let (source, target) = match (source, target) {
            (Some(source), Some(target)) => (source, target),
            (None, _) | (_, None) => {
                let missing = if source.is_none() {
                    &record.source
                } else {
                    &record.target
                };
                self.warnings.push(EngineWarning::DanglingLink {
                    source_id: record.source.clone(),
                    target_id: record.target.clone(),
                    missing: missing.clone(),
                });
                return None;
            }
        };

        if source == target {
            self.warnings.push(EngineWarning::SelfLink {
                id: record.source.clone(),
            });
            return None;
        }

        let strength = if record.strength.is_finite() {
            record.strength
        } else {
            0.0
        };
        if !(0.0..=1.0).contains(&record.strength) {
            self.warnings.push(EngineWarning::LinkStrengthClamped {
                source_id: record.source.clone(),
                target_id: record.target.clone(),
                strength: record.strength,
            });
        }

        Some(Link {
            source,
            target,
            strength: strength.clamp(0.0, 1.0),
        })
    }

    /// Recomputes radii and color groups from the size/color settings in
    /// `config`. Positions and pins are left alone.
    pub fn apply_appearance(&mut self, config: &EngineConfig) {
        self.warnings
            .retain(|warning| !matches!(warning, EngineWarning::RadiusFloored { .. }));

        let mut min_value = f64::INFINITY;
        let mut max_value = 0.0_f64;
        for node in &self.nodes {
            if let Some(value) = usable_metric(node, &config.size_field) {
                min_value = min_value.min(value);
                max_value = max_value.max(value);
            }
        }

        for node in &mut self.nodes {
            match usable_metric(node, &config.size_field) {
                Some(value) => {
                    let t = config.size_scale.normalize(value, min_value, max_value);
                    node.radius = config.min_radius + (config.max_radius - config.min_radius) * t;
                }
                None => {
                    node.radius = config.min_radius;
                    self.warnings.push(EngineWarning::RadiusFloored {
                        id: node.id.clone(),
                        field: config.size_field.clone(),
                    });
                }
            }
        }

        self.assign_color_groups(&config.color_field);
    }

    fn assign_color_groups(&mut self, color_field: &str) {
        if color_field == CATEGORY_COLOR_FIELD {
            self.color_groups = self
                .categories
                .iter()
                .enumerate()
                .map(|(index, label)| ColorGroup {
                    label: label.clone(),
                    color: category_color(index),
                })
                .collect();
            for node in &mut self.nodes {
                node.color_group = node.category;
            }
            return;
        }

        let mut min_value = f64::INFINITY;
        let mut max_value = 0.0_f64;
        for node in &self.nodes {
            if let Some(value) = usable_metric(node, color_field) {
                min_value = min_value.min(value);
                max_value = max_value.max(value);
            }
        }

        self.color_groups = (0..METRIC_BUCKETS)
            .map(|bucket| ColorGroup {
                label: format!("{color_field} {}/{METRIC_BUCKETS}", bucket + 1),
                color: metric_bucket_color(bucket),
            })
            .collect();
        for node in &mut self.nodes {
            node.color_group = usable_metric(node, color_field)
                .map(|value| metric_bucket(SizeScale::Log.normalize(value, min_value, max_value)))
                .unwrap_or(0);
        }
    }

    fn log_warnings(&self) {
        if self.warnings.is_empty() {
            log::info!(
                "graph model ready: {} nodes, {} links",
                self.nodes.len(),
                self.links.len()
            );
            return;
        }

        for warning in &self.warnings {
            log::debug!("{warning}");
        }
        let dropped_links = self
            .warnings
            .iter()
            .filter(|warning| {
                matches!(
                    warning,
                    EngineWarning::DanglingLink { .. } | EngineWarning::SelfLink { .. }
                )
            })
            .count();
        log::warn!(
            "graph model ready: {} nodes, {} links, {} warning(s) ({} link(s) dropped)",
            self.nodes.len(),
            self.links.len(),
            self.warnings.len(),
            dropped_links
        );
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(super) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    #[cfg(test)]
    pub fn degree(&self, index: usize) -> usize {
        self.degrees.get(index).copied().unwrap_or(0)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn color_groups(&self) -> &[ColorGroup] {
        &self.color_groups
    }

    pub fn warnings(&self) -> &[EngineWarning] {
        &self.warnings
    }

    /// Split borrow for the force passes: nodes move, topology stays put.
    pub(super) fn parts_mut(&mut self) -> (&mut [Node], &[Link], &[usize]) {
        (&mut self.nodes, &self.links, &self.degrees)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn all_pinned(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.iter().all(Node::is_pinned)
    }

    /// Writes the current layout back into the input contract. With `pin_all`
    /// every node is pinned where it stands.
    pub fn to_snapshot(&self, pin_all: bool) -> Snapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                let pin = if pin_all {
                    Some([node.position.x, node.position.y])
                } else {
                    node.pin.map(|pin| [pin.x, pin.y])
                };
                NodeRecord {
                    id: node.id.clone(),
                    title: node.title.clone(),
                    category: self.categories.get(node.category).cloned(),
                    metrics: node.metrics.clone(),
                    x: Some(node.position.x),
                    y: Some(node.position.y),
                    pin,
                }
            })
            .collect();

        let links = self
            .links
            .iter()
            .map(|link| LinkRecord {
                source: self.nodes[link.source].id.clone(),
                target: self.nodes[link.target].id.clone(),
                strength: link.strength,
            })
            .collect();

        Snapshot { nodes, links }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(InvariantError::DuplicateId(node.id.clone()));
            }
            if !node.is_finite() {
                return Err(InvariantError::NonFinite(node.id.clone()));
            }
            if node.radius.is_nan() || node.radius <= 0.0 {
                return Err(InvariantError::NonPositiveRadius(node.id.clone()));
            }
        }

        for (link_index, link) in self.links.iter().enumerate() {
            for index in [link.source, link.target] {
                if index >= self.nodes.len() {
                    return Err(InvariantError::UnresolvedLink {
                        link: link_index,
                        index,
                    });
                }
            }
        }

        Ok(())
    }
}

fn usable_metric(node: &Node, field: &str) -> Option<f64> {
    node.metrics
        .get(field)
        .copied()
        .filter(|value| value.is_finite() && *value > 0.0)
}

/// Sunflower spiral placement so unplaced nodes start spread out.
pub(super) fn phyllotaxis(index: usize) -> Vec2 {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
    let angle = index as f32 * golden_angle;
    vec2(radius * angle.cos(), radius * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot {
            nodes: vec![
                NodeRecord::new("root")
                    .with_category("department")
                    .with_metric("revenue", 100.0),
                NodeRecord::new("a")
                    .with_category("category")
                    .with_metric("revenue", 25.0),
                NodeRecord::new("b")
                    .with_category("category")
                    .with_metric("revenue", 0.0),
                NodeRecord::new("c").with_category("category"),
                NodeRecord::new("d")
                    .with_category("product")
                    .with_metric("revenue", 1.0),
                NodeRecord::new("a").with_category("duplicate"),
            ],
            links: vec![
                LinkRecord::new("root", "a"),
                LinkRecord::new("root", "b"),
                LinkRecord::new("root", "missing"),
                LinkRecord::new("c", "c"),
                LinkRecord {
                    strength: 3.0,
                    ..LinkRecord::new("a", "c")
                },
            ],
        }
    }

    #[test]
    fn resolves_links_and_records_warnings() {
        let model = GraphModel::from_snapshot(&snapshot(), &EngineConfig::default());

        assert_eq!(model.len(), 5);
        assert_eq!(model.links().len(), 3);
        assert_eq!(model.links()[2].strength, 1.0);
        assert_eq!(model.degree(0), 2);
        assert_eq!(model.degree(1), 2);
        assert!(model.check_invariants().is_ok());

        let warnings = model.warnings();
        assert!(warnings.contains(&EngineWarning::DuplicateNode { id: "a".into() }));
        assert!(warnings.contains(&EngineWarning::SelfLink { id: "c".into() }));
        assert!(warnings.iter().any(|warning| matches!(
            warning,
            EngineWarning::DanglingLink { missing, .. } if missing == "missing"
        )));
    }

    #[test]
    fn floors_radius_for_missing_or_non_positive_metrics() {
        let config = EngineConfig::default();
        let model = GraphModel::from_snapshot(&snapshot(), &config);

        let b = model.node(model.index_of("b").unwrap()).unwrap();
        let c = model.node(model.index_of("c").unwrap()).unwrap();
        assert_eq!(b.radius, config.min_radius);
        assert_eq!(c.radius, config.min_radius);
        assert_eq!(model.nodes()[0].radius, config.max_radius);
        assert!(model.nodes().iter().all(|node| node.radius > 0.0));

        let floored = model
            .warnings()
            .iter()
            .filter(|warning| matches!(warning, EngineWarning::RadiusFloored { .. }))
            .count();
        assert_eq!(floored, 2);
    }

    #[test]
    fn appearance_recompute_follows_scale_and_color_field() {
        let mut config = EngineConfig::default();
        let mut model = GraphModel::from_snapshot(&snapshot(), &config);
        let sqrt_radius = model.nodes()[1].radius;
        assert_eq!(model.color_groups().len(), model.categories().len());

        config.size_scale = SizeScale::Linear;
        config.color_field = "revenue".to_owned();
        model.apply_appearance(&config);

        assert!(model.nodes()[1].radius < sqrt_radius);
        assert_eq!(model.color_groups().len(), METRIC_BUCKETS);
        assert_eq!(model.nodes()[0].color_group, METRIC_BUCKETS - 1);
        assert_eq!(model.nodes()[3].color_group, 0);
    }

    #[test]
    fn unplaced_nodes_start_spread_out_and_pins_win() {
        let mut records = vec![NodeRecord::new("pinned")];
        records[0].pin = Some([40.0, -8.0]);
        records.push(NodeRecord::new("placed").with_position(5.0, 6.0));
        for index in 0..10 {
            records.push(NodeRecord::new(format!("n{index}")));
        }
        let model = GraphModel::from_snapshot(
            &Snapshot {
                nodes: records,
                links: Vec::new(),
            },
            &EngineConfig::default(),
        );

        assert_eq!(model.nodes()[0].position, vec2(40.0, -8.0));
        assert_eq!(model.nodes()[0].pin, Some(Pin { x: 40.0, y: -8.0 }));
        assert_eq!(model.nodes()[1].position, vec2(5.0, 6.0));
        for pair in model.nodes()[2..].windows(2) {
            assert!((pair[0].position - pair[1].position).length() > 1.0);
        }
        assert!(model.nodes()[2..].iter().all(|node| node.position != Vec2::ZERO));
    }

    #[test]
    fn snapshot_round_trip_can_pin_everything() {
        let model = GraphModel::from_snapshot(&snapshot(), &EngineConfig::default());
        let captured = model.to_snapshot(true);
        let rebuilt = GraphModel::from_snapshot(&captured, &EngineConfig::default());

        assert!(rebuilt.all_pinned());
        assert_eq!(rebuilt.links().len(), model.links().len());
        for (before, after) in model.nodes().iter().zip(rebuilt.nodes()) {
            assert_eq!(before.position, after.position);
            assert_eq!(before.category, after.category);
        }
    }
}
