mod demo;
mod load;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

use crate::engine::snapshot::Snapshot;

pub use demo::demo_snapshot;
pub use load::{load_config, load_snapshot};

/// Where the window gets its graph from.
#[derive(Clone, Debug)]
pub enum DatasetSource {
    File(PathBuf),
    Demo { nodes: usize, branching: usize },
}

impl DatasetSource {
    pub fn load(&self) -> Result<Snapshot> {
        match self {
            Self::File(path) => load_snapshot(path),
            Self::Demo { nodes, branching } => Ok(demo_snapshot(*nodes, *branching)),
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Demo { nodes, branching } => {
                write!(f, "demo taxonomy ({nodes} nodes, branching {branching})")
            }
        }
    }
}
