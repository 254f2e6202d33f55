use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The dataset handed to the engine at startup: plain records, ids not yet
/// resolved or validated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(default, alias = "displayTitle")]
    pub title: String,
    #[serde(default, alias = "categoryTag")]
    pub category: Option<String>,
    #[serde(default, alias = "metricValues")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<[f32; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(alias = "sourceId")]
    pub source: String,
    #[serde(alias = "targetId")]
    pub target: String,
    #[serde(default = "default_link_strength")]
    pub strength: f32,
}

fn default_link_strength() -> f32 {
    1.0
}

impl NodeRecord {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    #[cfg(test)]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }
}

impl LinkRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            strength: default_link_strength(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_field_spellings() {
        let raw = r#"{
            "nodes": [
                { "id": "a", "displayTitle": "Apparel", "categoryTag": "department",
                  "metricValues": { "revenue": 12.5 } },
                { "id": "b", "title": "Boots", "category": "product", "pin": [3.0, 4.0] }
            ],
            "links": [
                { "sourceId": "a", "targetId": "b", "strength": 0.5 },
                { "source": "b", "target": "a" }
            ]
        }"#;

        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.nodes[0].title, "Apparel");
        assert_eq!(snapshot.nodes[0].category.as_deref(), Some("department"));
        assert_eq!(snapshot.nodes[0].metrics.get("revenue"), Some(&12.5));
        assert_eq!(snapshot.nodes[1].pin, Some([3.0, 4.0]));
        assert_eq!(snapshot.links[0].strength, 0.5);
        assert_eq!(snapshot.links[1].strength, 1.0);
        assert_eq!(snapshot.links[1].source, "b");
    }
}
