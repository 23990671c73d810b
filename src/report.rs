//! Per-run aggregate and the summary printed when a run completes.

use serde::{Deserialize, Serialize};

use crate::{Artifact, FlatCumRow, GoroutineCount, GoroutineWaitRecord, ProfileType};

/// Everything one profile-type task produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileResult {
    pub top: Vec<FlatCumRow>,
    pub comparison: Vec<FlatCumRow>,
    #[serde(rename = "goroutineTotal", skip_serializing_if = "Option::is_none")]
    pub goroutine_total: Option<GoroutineCount>,
    #[serde(rename = "goroutineWaits", default, skip_serializing_if = "Vec::is_empty")]
    pub goroutine_waits: Vec<GoroutineWaitRecord>,
}

/// Results of one run, one write-once slot per profile type.
#[derive(Debug, Clone)]
pub struct Report {
    app_name: String,
    slots: [Option<ProfileResult>; 3],
}

impl Report {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            slots: [None, None, None],
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Stores `result` in the slot for `ty`. A slot is written at most once;
    /// a second write is rejected and reported as `false`.
    pub fn record(&mut self, ty: ProfileType, result: ProfileResult) -> bool {
        let slot = &mut self.slots[ty.index()];
        if slot.is_some() {
            tracing::warn!("{ty} result already recorded, ignoring duplicate");
            return false;
        }
        *slot = Some(result);
        true
    }

    pub fn get(&self, ty: ProfileType) -> Option<&ProfileResult> {
        self.slots[ty.index()].as_ref()
    }

    pub fn rows(&self, section: Section) -> usize {
        let Some(result) = self.get(section.profile_type()) else {
            return 0;
        };
        match section {
            Section::GoroutineTotal => usize::from(result.goroutine_total.is_some()),
            Section::GoroutineWaits => result.goroutine_waits.len(),
            Section::HeapTop | Section::GoroutineTop | Section::CpuTop => result.top.len(),
            Section::HeapComparison | Section::GoroutineComparison | Section::CpuComparison => {
                result.comparison.len()
            }
        }
    }

    /// Sections with at least one row, in schema order.
    pub fn present_sections(&self) -> Vec<Section> {
        Section::ALL
            .into_iter()
            .filter(|section| self.rows(*section) > 0)
            .collect()
    }
}

/// Workbook sheets, in the order they are emitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    GoroutineTotal,
    GoroutineWaits,
    HeapTop,
    GoroutineTop,
    CpuTop,
    HeapComparison,
    GoroutineComparison,
    CpuComparison,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Self::GoroutineTotal,
        Self::GoroutineWaits,
        Self::HeapTop,
        Self::GoroutineTop,
        Self::CpuTop,
        Self::HeapComparison,
        Self::GoroutineComparison,
        Self::CpuComparison,
    ];

    pub fn profile_type(self) -> ProfileType {
        match self {
            Self::GoroutineTotal
            | Self::GoroutineWaits
            | Self::GoroutineTop
            | Self::GoroutineComparison => ProfileType::Goroutine,
            Self::HeapTop | Self::HeapComparison => ProfileType::Heap,
            Self::CpuTop | Self::CpuComparison => ProfileType::Cpu,
        }
    }

    pub fn sheet_name(self) -> &'static str {
        match self {
            Self::GoroutineTotal => "Goroutine Total",
            Self::GoroutineWaits => "Goroutine Waits",
            Self::HeapTop => "Heap Top",
            Self::GoroutineTop => "Goroutine Top",
            Self::CpuTop => "CPU Top",
            Self::HeapComparison => "Heap Comparison",
            Self::GoroutineComparison => "Goroutine Comparison",
            Self::CpuComparison => "CPU Comparison",
        }
    }
}

/// A failure that degraded the report without aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub task: String,
    pub step: String,
    pub kind: String,
    pub message: String,
}

impl Issue {
    pub fn new(task: &str, step: &str, err: &crate::ReportError) -> Self {
        Self {
            task: task.to_string(),
            step: step.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub sheet: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    pub target: String,
    #[serde(rename = "appName")]
    pub app_name: String,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "profileTypes")]
    pub profile_types: Vec<ProfileType>,
    #[serde(rename = "reportPath")]
    pub report_path: String,
    pub sections: Vec<SectionSummary>,
    pub artifacts: Vec<Artifact>,
    pub issues: Vec<Issue>,
}
