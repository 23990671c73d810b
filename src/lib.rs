//! pprof-report core library: collects runtime profiles from a service's
//! profiling endpoints and assembles them into a workbook report.

mod artifacts;
mod collector;
mod comparator;
mod config;
mod error;
mod exporter;
mod fetcher;
mod fsutil;
mod goroutine;
mod parser;
mod profile;
mod report;
mod report_cmd;
mod reporting;
mod target;
mod tool;
mod trace;
mod xlsx;

#[cfg(test)]
mod testutil;

pub use artifacts::*;
pub use collector::*;
pub use comparator::*;
pub use config::*;
pub use error::*;
pub use exporter::*;
pub use fetcher::*;
pub use fsutil::*;
pub use goroutine::*;
pub use parser::*;
pub use profile::*;
pub use report::*;
pub use report_cmd::*;
pub use reporting::*;
pub use target::*;
pub use tool::*;
pub use trace::*;
pub use xlsx::*;
