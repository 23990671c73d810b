//! `pprof-report.toml` config loading.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ToolSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory receiving the workbook, trace and rendered graphs.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Executable used for top-N tables, snapshot capture, diffs and call graphs.
    #[serde(default = "default_analysis_tool")]
    pub analysis_tool: ToolSpec,

    /// Flame graph renderer.
    #[serde(default = "default_flame_tool")]
    pub flame_tool: ToolSpec,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Pause between the two comparison snapshots.
    #[serde(default = "default_compare_interval_secs")]
    pub compare_interval_secs: u64,

    /// Upper bound for a single external tool invocation. Derived from the
    /// sample duration when unset.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,

    /// Upper bound for the whole fan-out join. Derived from the sample
    /// duration when unset.
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_analysis_tool() -> ToolSpec {
    ToolSpec::new("go", ["tool", "pprof"])
}

fn default_flame_tool() -> ToolSpec {
    ToolSpec::new("go-torch", [] as [&str; 0])
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_compare_interval_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            analysis_tool: default_analysis_tool(),
            flame_tool: default_flame_tool(),
            probe_timeout_ms: default_probe_timeout_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            compare_interval_secs: default_compare_interval_secs(),
            tool_timeout_secs: None,
            task_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn compare_interval(&self) -> Duration {
        Duration::from_secs(self.compare_interval_secs)
    }

    /// A CPU sample blocks the tool for the full sample duration.
    pub fn tool_timeout(&self, sample_seconds: u64) -> Duration {
        Duration::from_secs(
            self.tool_timeout_secs
                .unwrap_or_else(|| sample_seconds.saturating_add(60)),
        )
    }

    /// The CPU task is the longest: top-N sample, two snapshots, the interval
    /// and the flame graph sample run back to back.
    pub fn task_timeout(&self, sample_seconds: u64) -> Duration {
        Duration::from_secs(self.task_timeout_secs.unwrap_or_else(|| {
            sample_seconds
                .saturating_mul(4)
                .saturating_add(self.compare_interval_secs)
                .saturating_add(120)
        }))
    }
}
