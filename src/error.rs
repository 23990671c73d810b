//! Crate-wide error types.

use std::time::Duration;

use thiserror::Error;

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot reach {address}: {reason}")]
    Connectivity { address: String, reason: String },

    #[error("profiling endpoints are not exposed by {address}")]
    ProfilingDisabled { address: String },

    #[error("required tool is not installed: {0}")]
    ToolMissing(String),

    #[error("unexpected output: {0}")]
    ParseFailure(String),

    #[error("{tool} exited unsuccessfully: {detail}")]
    ToolFailed { tool: String, detail: String },

    #[error("{what} did not finish within {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("workbook error: {0}")]
    Workbook(String),
}

impl ReportError {
    /// Only a failed reachability gate halts a run; everything else degrades
    /// into a partial report.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::ProfilingDisabled { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => "connectivity",
            Self::ProfilingDisabled { .. } => "profiling_disabled",
            Self::ToolMissing(_) => "tool_missing",
            Self::ParseFailure(_) => "parse_failure",
            Self::ToolFailed { .. } => "tool_failed",
            Self::Timeout { .. } => "timeout",
            Self::TaskPanicked(_) => "task_panicked",
            Self::Config(_) => "config",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
            Self::Http(_) => "http",
            Self::Workbook(_) => "workbook",
        }
    }
}

impl From<ureq::Error> for ReportError {
    fn from(value: ureq::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(value: rust_xlsxwriter::XlsxError) -> Self {
        Self::Workbook(value.to_string())
    }
}
