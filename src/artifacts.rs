//! Deterministic artifact names.
//!
//! Every file is prefixed with the application name, so runs against
//! different services can share an output directory. Two concurrent runs
//! against the same service in the same directory overwrite each other.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Trace,
    AllocSpaceGraph,
    InuseSpaceGraph,
    AllocSpaceFlame,
    InuseSpaceFlame,
    CpuFlame,
    Workbook,
}

impl ArtifactKind {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Trace => "_trace.out",
            Self::AllocSpaceGraph => "_alloc_space.svg",
            Self::InuseSpaceGraph => "_inuse_space.svg",
            Self::AllocSpaceFlame => "_alloc_space_fire.svg",
            Self::InuseSpaceFlame => "_inuse_space_fire.svg",
            Self::CpuFlame => "_profile.svg",
            Self::Workbook => ".xlsx",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactNaming {
    dir: PathBuf,
    app_name: String,
}

impl ArtifactNaming {
    pub fn new(dir: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            app_name: app_name.into(),
        }
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}{}", self.app_name, kind.suffix()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: String,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, path: &Path) -> Self {
        Self {
            kind,
            path: path.display().to_string(),
        }
    }
}
