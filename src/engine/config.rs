use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ConfigError;

/// Runtime configuration for the whole engine. Every field has a default, so a
/// JSON document only needs to carry the values it wants to change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub link: LinkConfig,
    pub charge: ChargeConfig,
    pub collision: CollisionConfig,
    pub center: CenterConfig,
    pub simulation: SimulationConfig,
    pub size_field: String,
    pub size_scale: SizeScale,
    pub min_radius: f32,
    pub max_radius: f32,
    pub color_field: String,
    pub low_fps_threshold: f32,
    pub high_fps_threshold: f32,
    pub label_zoom_threshold: f32,
    pub node_shape: NodeShape,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            charge: ChargeConfig::default(),
            collision: CollisionConfig::default(),
            center: CenterConfig::default(),
            simulation: SimulationConfig::default(),
            size_field: "revenue".to_owned(),
            size_scale: SizeScale::Sqrt,
            min_radius: 4.0,
            max_radius: 22.0,
            color_field: CATEGORY_COLOR_FIELD.to_owned(),
            low_fps_threshold: 30.0,
            high_fps_threshold: 45.0,
            label_zoom_threshold: 1.2,
            node_shape: NodeShape::Circle,
        }
    }
}

/// `colorField` value that colors nodes by their category tag.
pub const CATEGORY_COLOR_FIELD: &str = "category";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkConfig {
    pub distance: f32,
    pub strength: f32,
    pub iterations: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            distance: 30.0,
            strength: 1.0,
            iterations: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChargeConfig {
    /// Negative values repel.
    pub strength: f32,
    pub max_distance: f32,
    pub theta: f32,
    pub barnes_hut_threshold: usize,
}

impl Default for ChargeConfig {
    fn default() -> Self {
        Self {
            strength: -30.0,
            max_distance: 400.0,
            theta: 0.9,
            barnes_hut_threshold: 256,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollisionConfig {
    pub radius: RadiusFn,
    pub strength: f32,
    pub iterations: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            radius: RadiusFn::Node { margin: 2.0 },
            strength: 0.7,
            iterations: 2,
        }
    }
}

/// How the collision force derives a node's circle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RadiusFn {
    /// The node's own radius plus a fixed margin.
    Node { margin: f32 },
    /// The same radius for every node.
    Uniform { radius: f32 },
}

impl RadiusFn {
    pub fn radius_for(self, node_radius: f32) -> f32 {
        match self {
            Self::Node { margin } => node_radius + margin.max(0.0),
            Self::Uniform { radius } => radius.max(0.0),
        }
    }

    pub fn margin(self) -> f32 {
        match self {
            Self::Node { margin } => margin.max(0.0),
            Self::Uniform { .. } => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CenterConfig {
    pub x: f32,
    pub y: f32,
    pub strength: f32,
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            strength: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub alpha_min: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha_min: 0.001,
            // 300 ticks from 1.0 down to alpha_min.
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            velocity_decay: 0.4,
            seed: 0x7a78_6f67,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeScale {
    Linear,
    #[default]
    Sqrt,
    Log,
}

impl SizeScale {
    pub fn label(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
        }
    }

    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Linear => value,
            Self::Sqrt => value.sqrt(),
            Self::Log => value.ln_1p(),
        }
    }

    /// Maps a positive `value` into [0, 1] relative to the positive range
    /// `[min, max]` after applying the scale.
    pub fn normalize(self, value: f64, min: f64, max: f64) -> f32 {
        let low = self.apply(min);
        let high = self.apply(max);
        let denominator = high - low;
        if !denominator.is_finite() || denominator.abs() < f64::EPSILON {
            return 0.5;
        }

        ((self.apply(value) - low) / denominator).clamp(0.0, 1.0) as f32
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    #[default]
    Circle,
    Rectangle,
}

impl EngineConfig {
    /// Returns a copy of `self` with `patch` deep-merged over it.
    pub fn patched(&self, patch: &Value) -> Result<Self, ConfigError> {
        if !patch.is_object() {
            return Err(ConfigError::NotAnObject);
        }

        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, patch);
        let mut config: Self = serde_json::from_value(merged)?;
        config.sanitize();
        Ok(config)
    }

    /// Clamps values that would break the simulation or the governor.
    pub fn sanitize(&mut self) {
        self.min_radius = if self.min_radius.is_finite() {
            self.min_radius.max(0.5)
        } else {
            4.0
        };
        if !self.max_radius.is_finite() || self.max_radius < self.min_radius {
            self.max_radius = self.min_radius;
        }

        let simulation = &mut self.simulation;
        simulation.alpha_min = simulation.alpha_min.clamp(0.0, 1.0);
        simulation.alpha_decay = simulation.alpha_decay.clamp(0.0, 1.0);
        simulation.velocity_decay = simulation.velocity_decay.clamp(0.0, 1.0);

        self.link.strength = self.link.strength.max(0.0);
        self.link.iterations = self.link.iterations.max(1);
        self.charge.max_distance = self.charge.max_distance.max(1.0);
        self.charge.theta = self.charge.theta.max(0.0);
        self.collision.strength = self.collision.strength.clamp(0.0, 1.0);
        self.center.strength = self.center.strength.max(0.0);
    }
}

fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge_json(base.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn patch_overrides_only_named_fields() {
        let config = EngineConfig::default()
            .patched(&json!({
                "link": { "distance": 55.0 },
                "sizeScale": "log",
                "collision": { "radius": { "kind": "uniform", "radius": 9.0 } }
            }))
            .unwrap();

        assert_eq!(config.link.distance, 55.0);
        assert_eq!(config.link.strength, LinkConfig::default().strength);
        assert_eq!(config.size_scale, SizeScale::Log);
        assert_eq!(config.collision.radius, RadiusFn::Uniform { radius: 9.0 });
        assert_eq!(config.charge, ChargeConfig::default());
    }

    #[test]
    fn patch_rejects_non_objects_and_bad_types() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.patched(&json!([1, 2])),
            Err(ConfigError::NotAnObject)
        ));
        assert!(matches!(
            config.patched(&json!({ "sizeScale": "cubic" })),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn sanitize_keeps_radius_range_ordered() {
        let config = EngineConfig::default()
            .patched(&json!({ "minRadius": 10.0, "maxRadius": 2.0 }))
            .unwrap();
        assert_eq!(config.min_radius, 10.0);
        assert_eq!(config.max_radius, 10.0);
    }

    #[test]
    fn scales_normalize_into_unit_range() {
        for scale in [SizeScale::Linear, SizeScale::Sqrt, SizeScale::Log] {
            assert_eq!(scale.normalize(1.0, 1.0, 100.0), 0.0);
            assert_eq!(scale.normalize(100.0, 1.0, 100.0), 1.0);
            let mid = scale.normalize(25.0, 1.0, 100.0);
            assert!(mid > 0.0 && mid < 1.0);
            assert_eq!(scale.normalize(7.0, 7.0, 7.0), 0.5);
        }
        assert!(
            SizeScale::Sqrt.normalize(25.0, 1.0, 100.0)
                > SizeScale::Linear.normalize(25.0, 1.0, 100.0)
        );
    }
}
