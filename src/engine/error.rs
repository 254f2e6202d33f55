use thiserror::Error;

/// Non-fatal problems found while building or running the graph. The offending
/// element is dropped or floored and the engine keeps going.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineWarning {
    #[error("duplicate node id `{id}` ignored")]
    DuplicateNode { id: String },
    #[error("link {source_id} -> {target_id} dropped: unknown endpoint `{missing}`")]
    DanglingLink {
        source_id: String,
        target_id: String,
        missing: String,
    },
    #[error("self link on `{id}` dropped")]
    SelfLink { id: String },
    #[error("link {source_id} -> {target_id} strength {strength} clamped to [0, 1]")]
    LinkStrengthClamped {
        source_id: String,
        target_id: String,
        strength: f32,
    },
    #[error("node `{id}` has no usable `{field}` value, radius floored")]
    RadiusFloored { id: String, field: String },
    #[error("node `{id}` diverged, velocity reset and position re-seeded")]
    NonFiniteReset { id: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("configuration patch must be a JSON object")]
    NotAnObject,
}

#[derive(Debug, Error, PartialEq)]
pub enum InvariantError {
    #[error("node id `{0}` appears more than once")]
    DuplicateId(String),
    #[error("link {link} points at missing node index {index}")]
    UnresolvedLink { link: usize, index: usize },
    #[error("node `{0}` has a non-finite position or velocity")]
    NonFinite(String),
    #[error("node `{0}` has a non-positive radius")]
    NonPositiveRadius(String),
}
