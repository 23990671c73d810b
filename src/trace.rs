//! Execution trace capture.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::{ReportResult, Target};

/// Streams a `seconds`-long execution trace into `dest`. The agent's timeout
/// has to cover the sampling window.
pub fn download_trace(
    agent: &ureq::Agent,
    target: &Target,
    seconds: u64,
    dest: &Path,
) -> ReportResult<u64> {
    let url = target.endpoint(&format!("trace?seconds={seconds}"));
    tracing::info!("downloading {seconds}s execution trace to {}", dest.display());
    let resp = agent.get(&url).call()?;
    let mut reader = resp.into_reader();
    let mut out = BufWriter::new(File::create(dest)?);
    let written = std::io::copy(&mut reader, &mut out)?;
    out.flush()?;
    Ok(written)
}
