//! Workbook assembly from a collected [`Report`].

use rust_xlsxwriter::Workbook;

use std::path::{Path, PathBuf};

use crate::xlsx::write_sheet;
use crate::{ArtifactKind, ArtifactNaming, ProfileResult, Report, ReportResult, Section};

/// Sheet names the workbook for `report` will contain, in order.
pub fn planned_sheets(report: &Report) -> Vec<&'static str> {
    report
        .present_sections()
        .into_iter()
        .map(Section::sheet_name)
        .collect()
}

/// Writes `<app>.xlsx` into `out_dir`. Sections without rows get no sheet;
/// when no section has rows the writer falls back to its default blank
/// sheet, so the document still opens.
pub fn build_workbook(report: &Report, out_dir: &Path) -> ReportResult<PathBuf> {
    let mut workbook = Workbook::new();
    for section in report.present_sections() {
        let Some(result) = report.get(section.profile_type()) else {
            continue;
        };
        write_section(&mut workbook, section, result)?;
    }

    let path = ArtifactNaming::new(out_dir, report.app_name()).path(ArtifactKind::Workbook);
    workbook.save(&path)?;
    tracing::info!("report written to {}", path.display());
    Ok(path)
}

fn write_section(
    workbook: &mut Workbook,
    section: Section,
    result: &ProfileResult,
) -> ReportResult<()> {
    let name = section.sheet_name();
    match section {
        Section::GoroutineTotal => {
            let totals = result.goroutine_total.iter().copied().collect::<Vec<_>>();
            write_sheet(workbook, name, &totals)
        }
        Section::GoroutineWaits => write_sheet(workbook, name, &result.goroutine_waits),
        Section::HeapTop | Section::GoroutineTop | Section::CpuTop => {
            write_sheet(workbook, name, &result.top)
        }
        Section::HeapComparison | Section::GoroutineComparison | Section::CpuComparison => {
            write_sheet(workbook, name, &result.comparison)
        }
    }
}
