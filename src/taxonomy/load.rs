use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::engine::config::EngineConfig;
use crate::engine::snapshot::Snapshot;

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse dataset {}", path.display()))?;

    if snapshot.nodes.is_empty() {
        bail!("dataset {} contains no nodes", path.display());
    }

    log::info!(
        "loaded {} nodes and {} links from {}",
        snapshot.nodes.len(),
        snapshot.links.len(),
        path.display()
    );
    Ok(snapshot)
}

/// Reads a partial config document and merges it over the defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let patch: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;

    EngineConfig::default()
        .patched(&patch)
        .with_context(|| format!("invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("taxograph-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_snapshot_with_either_field_spelling() {
        let path = temp_file(
            "snapshot.json",
            r#"{
                "nodes": [
                    { "id": "a", "displayTitle": "Garden", "categoryTag": "department" },
                    { "id": "b", "title": "Tools", "category": "category",
                      "metrics": { "revenue": 12.5 } }
                ],
                "links": [{ "sourceId": "a", "target": "b" }]
            }"#,
        );

        let snapshot = load_snapshot(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.nodes[0].title, "Garden");
        assert_eq!(snapshot.nodes[1].metrics["revenue"], 12.5);
        assert_eq!(snapshot.links[0].strength, 1.0);
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let missing = std::env::temp_dir().join("taxograph-does-not-exist.json");
        let error = load_snapshot(&missing).unwrap_err();
        assert!(format!("{error:#}").contains("failed to read dataset"));

        let path = temp_file("broken.json", "{ \"nodes\": [ ");
        let error = load_snapshot(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(format!("{error:#}").contains("failed to parse dataset"));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let path = temp_file("config.json", r#"{ "charge": { "strength": -80 } }"#);
        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.charge.strength, -80.0);
        assert_eq!(config.link, EngineConfig::default().link);
    }
}
