//! CLI commands (`pprof-report report ...`, `pprof-report env`).

use clap::Args;
use serde::{Deserialize, Serialize};

use std::path::PathBuf;

use crate::{Config, ProfileType, ReportRequest, ReportResult, RunSummary, generate_report};

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Service address (`host:port`) or full profiling mount URL.
    #[arg(value_name = "ADDRESS")]
    pub address: String,
    /// Sample duration in seconds for CPU profiles, traces and flame graphs.
    #[arg(long, default_value_t = 30)]
    pub seconds: u64,
    /// Rows per top-N table.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    /// Profile types to collect.
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    pub types: Vec<ProfileType>,
    /// Seconds between the two comparison snapshots.
    #[arg(long)]
    pub interval: Option<u64>,
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

impl ReportArgs {
    pub fn request(&self) -> ReportRequest {
        ReportRequest {
            address: self.address.clone(),
            seconds: self.seconds,
            top: self.top,
            types: self.types.clone(),
        }
    }

    /// Flags win over `pprof-report.toml`.
    pub fn apply(&self, config: &Config) -> Config {
        let mut config = config.clone();
        if let Some(interval) = self.interval {
            config.compare_interval_secs = interval;
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir = out_dir.clone();
        }
        config
    }
}

pub fn report_command(config: &Config, args: &ReportArgs) -> ReportResult<RunSummary> {
    let config = args.apply(config);
    generate_report(&config, &args.request())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatus {
    pub role: String,
    pub command: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvReport {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "outDir")]
    pub out_dir: String,
    #[serde(rename = "probeTimeoutMs")]
    pub probe_timeout_ms: u64,
    #[serde(rename = "compareIntervalSecs")]
    pub compare_interval_secs: u64,
    pub tools: Vec<ToolStatus>,
}

/// Which external executables a report run would find.
pub fn env_command(config: &Config) -> EnvReport {
    let tools = [
        ("analysis", &config.analysis_tool),
        ("flame", &config.flame_tool),
    ]
    .into_iter()
    .map(|(role, spec)| {
        let resolved = spec.locate();
        ToolStatus {
            role: role.to_string(),
            command: spec.display_name(),
            available: resolved.is_some(),
            resolved: resolved.map(|p| p.display().to_string()),
        }
    })
    .collect();
    EnvReport {
        schema_version: "pprof_report.env.v1".to_string(),
        out_dir: config.out_dir.display().to_string(),
        probe_timeout_ms: config.probe_timeout_ms,
        compare_interval_secs: config.compare_interval_secs,
        tools,
    }
}
