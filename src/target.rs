//! Reachability probe and endpoint addressing for the profiled service.

use serde::{Deserialize, Serialize};

use crate::{Config, ReportError, ReportResult};

const DEFAULT_APP_NAME: &str = "app";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "appName")]
    pub app_name: String,
}

impl Target {
    pub fn new(address: &str, app_name: impl Into<String>) -> Self {
        Self {
            address: address.to_string(),
            base_url: base_url(address),
            app_name: app_name.into(),
        }
    }

    /// `path` is relative to `/debug/pprof/` and may carry a query string.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// `host:port` gets the conventional scheme and mount point; anything that
/// already names a scheme is used as the mount point itself.
pub fn base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}/debug/pprof")
    }
}

/// Resolves the application name from `/cmdline`, which doubles as the check
/// that the target is reachable and has profiling enabled.
pub fn probe_target(config: &Config, address: &str) -> ReportResult<Target> {
    if address.trim().is_empty() {
        return Err(ReportError::InvalidArgument(
            "target address must not be empty".to_string(),
        ));
    }
    let url = format!("{}/cmdline", base_url(address));
    let agent = ureq::AgentBuilder::new()
        .timeout(config.probe_timeout())
        .build();

    tracing::info!("probing {url}");
    let body = match agent.get(&url).call() {
        Ok(resp) => resp.into_string().map_err(|err| ReportError::Connectivity {
            address: address.to_string(),
            reason: err.to_string(),
        })?,
        Err(ureq::Error::Status(404, _)) => {
            return Err(ReportError::ProfilingDisabled {
                address: address.to_string(),
            });
        }
        Err(ureq::Error::Status(code, _)) => {
            return Err(ReportError::Connectivity {
                address: address.to_string(),
                reason: format!("probe answered with status {code}"),
            });
        }
        Err(ureq::Error::Transport(transport)) => {
            return Err(ReportError::Connectivity {
                address: address.to_string(),
                reason: transport.to_string(),
            });
        }
    };

    let app_name = app_name_from_cmdline(&body);
    tracing::info!("target {address} runs {app_name}");
    Ok(Target::new(address, app_name))
}

/// `/cmdline` is argv joined by NUL bytes; the binary's file name becomes the
/// artifact prefix.
pub fn app_name_from_cmdline(body: &str) -> String {
    let argv0 = body
        .split(['\0', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    let file_name = argv0.rsplit(['/', '\\']).next().unwrap_or_default();
    let sanitized = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    let sanitized = sanitized.trim_matches('.');
    if sanitized.is_empty() {
        DEFAULT_APP_NAME.to_string()
    } else {
        sanitized.to_string()
    }
}
