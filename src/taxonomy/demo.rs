use crate::engine::snapshot::{LinkRecord, NodeRecord, Snapshot};
use crate::util::stable_pair;

const LEVELS: [&str; 5] = ["catalog", "department", "category", "subcategory", "product"];
const DANGLING_TARGET: &str = "sku-discontinued";

/// A balanced product taxonomy: one catalog root, then departments,
/// categories, subcategories and products, `branching` children per node.
/// Metrics are derived from the node id, so the same arguments always give
/// the same dataset. One link points at a product that no longer exists.
pub fn demo_snapshot(node_count: usize, branching: usize) -> Snapshot {
    let node_count = node_count.max(1);
    let branching = branching.max(1);

    let mut nodes = Vec::with_capacity(node_count);
    let mut links = Vec::with_capacity(node_count);
    let mut depths = Vec::with_capacity(node_count);
    let mut ordinals = vec![0usize; LEVELS.len()];

    for index in 0..node_count {
        let parent = index.checked_sub(1).map(|value| value / branching);
        let depth = parent.map_or(0, |parent| depths[parent] + 1);
        depths.push(depth);

        let level = LEVELS[depth.min(LEVELS.len() - 1)];
        let ordinal = &mut ordinals[depth.min(LEVELS.len() - 1)];
        *ordinal += 1;

        let id = format!("{level}-{index}");
        let (a, b) = stable_pair(&id);
        let weight = (LEVELS.len() - depth.min(LEVELS.len() - 1)) as f64;
        let revenue = (1.0 + f64::from(a).abs() * 9.0) * 10f64.powf(weight);
        let margin = 0.05 + f64::from(b + 1.0) * 0.2;

        let mut title = level.to_owned();
        if let Some(first) = title.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        nodes.push(
            NodeRecord {
                title: format!("{title} {ordinal}"),
                ..NodeRecord::new(id.as_str())
            }
            .with_category(level)
            .with_metric("revenue", revenue.round())
            .with_metric("margin", (margin * 1000.0).round() / 1000.0)
            .with_metric("units", (revenue / (12.0 + f64::from(b.abs()) * 40.0)).round()),
        );

        if let Some(parent) = parent {
            links.push(LinkRecord {
                strength: 1.0 - 0.1 * depth.min(5) as f32,
                ..LinkRecord::new(nodes[parent].id.as_str(), id.as_str())
            });
        }
    }

    if let Some(last) = nodes.last() {
        links.push(LinkRecord::new(last.id.as_str(), DANGLING_TARGET));
    }

    log::info!(
        "generated demo taxonomy: {} nodes, {} links, depth {}",
        nodes.len(),
        links.len(),
        depths.iter().copied().max().unwrap_or(0)
    );
    Snapshot { nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::engine::error::EngineWarning;
    use crate::engine::model::GraphModel;

    #[test]
    fn builds_a_balanced_tree_with_one_dangling_link() {
        let snapshot = demo_snapshot(156, 5);
        assert_eq!(snapshot.nodes.len(), 156);
        assert_eq!(snapshot.links.len(), 156);

        let model = GraphModel::from_snapshot(&snapshot, &EngineConfig::default());
        assert_eq!(model.links().len(), 155);
        assert_eq!(model.categories(), &LEVELS[..4]);
        assert!(model.warnings().iter().any(|warning| matches!(
            warning,
            EngineWarning::DanglingLink { missing, .. } if missing == DANGLING_TARGET
        )));
        assert!(model.check_invariants().is_ok());
    }

    #[test]
    fn same_arguments_give_the_same_dataset() {
        assert_eq!(demo_snapshot(300, 4), demo_snapshot(300, 4));
        assert_eq!(demo_snapshot(0, 0).nodes.len(), 1);
    }
}
