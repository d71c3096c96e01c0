//! The canonical identifier shape (§3.1). Parsing/formatting lives in `depot-layout`;
//! this crate only owns the data shape so every subsystem can share it without
//! depending on the layout crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Short registry tag, e.g. `hf` (Hugging Face) or `local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    Hf,
    Local,
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Registry::Hf => write!(f, "hf"),
            Registry::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for Registry {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hf" => Ok(Registry::Hf),
            "local" => Ok(Registry::Local),
            _ => Err(()),
        }
    }
}

/// Canonical model identifier: `{registry}:{publisher}/{modelName}/{artifactName}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub registry: Registry,
    pub publisher: String,
    pub model_name: String,
    pub artifact_name: String,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}/{}",
            self.registry, self.publisher, self.model_name, self.artifact_name
        )
    }
}
