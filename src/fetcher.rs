//! Top-N tables from a live profiling endpoint.

use std::time::Duration;

use crate::{FlatCumRow, ReportError, ReportResult, ToolSpec, parse_flat_cum};

pub fn fetch_top_n(
    tool: &ToolSpec,
    url: &str,
    n: usize,
    timeout: Duration,
) -> ReportResult<Vec<FlatCumRow>> {
    tracing::info!("fetching top {n} from {url}");
    let directive = format!("top {n}\n");
    let output = tool.run(&[url], Some(&directive), None, timeout)?;
    if !output.success {
        return Err(ReportError::ToolFailed {
            tool: tool.display_name(),
            detail: output.stderr_tail(),
        });
    }
    let rows = parse_flat_cum(&output.combined(), n);
    if rows.len() < n {
        tracing::debug!("{url}: tool listed {} of {n} requested rows", rows.len());
    }
    Ok(rows)
}
