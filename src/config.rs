//! Filesystem layout shared by the supervisor, run storage and scene builder.

use crate::error::{DashError, DashResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardPaths {
    /// Working directory of the engine process.
    pub project_dir: PathBuf,
    /// Geometry descriptions, referenced by file name.
    pub config_dir: PathBuf,
    /// One sub-directory per run.
    pub runs_dir: PathBuf,
    pub engine_bin: PathBuf,
}

impl DashboardPaths {
    /// Standard layout under `project_dir`: `config/`, `runs/` and `build/G4sim`.
    pub fn from_project(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            config_dir: project_dir.join("config"),
            runs_dir: project_dir.join("runs"),
            engine_bin: project_dir.join("build").join("G4sim"),
            project_dir,
        }
    }

    pub fn with_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.config_dir = dir;
        }
        self
    }

    pub fn with_runs_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.runs_dir = dir;
        }
        self
    }

    pub fn with_engine(mut self, bin: Option<PathBuf>) -> Self {
        if let Some(bin) = bin {
            self.engine_bin = bin;
        }
        self
    }

    pub fn geometry_path(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    /// Create the runs directory if it does not exist yet.
    pub fn ensure_dirs(&self) -> DashResult<()> {
        create_dir(&self.runs_dir)
    }
}

fn create_dir(dir: &Path) -> DashResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| DashError::io(format!("create {}", dir.display()), e))
}
