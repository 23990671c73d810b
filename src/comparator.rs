//! Before/after comparison of one profile type.
//!
//! Two snapshots are captured `interval` apart and diffed with the analysis
//! tool's `-base` mode. The steps are strictly sequential: the delta is only
//! meaningful if the second capture starts after the interval has elapsed.

use regex::Regex;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::fsutil::{move_file, remove_if_exists};
use crate::{
    CallBudget, FlatCumRow, ProfileType, ReportError, ReportResult, ToolSpec, parse_flat_cum,
};

pub const COMPARISON_ROWS: usize = 10;

/// A saved profile owned by the comparator. The file is removed when the
/// value is dropped.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if let Err(err) = remove_if_exists(&self.path) {
            tracing::warn!("failed to remove snapshot {}: {err}", self.path.display());
        }
    }
}

/// Every tool call is bounded by `budget`, so snapshots are released before
/// its deadline even when the tool hangs.
pub fn compare(
    tool: &ToolSpec,
    url: &str,
    kind: ProfileType,
    interval: Duration,
    snapshot_dir: &Path,
    budget: CallBudget,
) -> ReportResult<Vec<FlatCumRow>> {
    tracing::info!("comparing {kind} snapshots {}s apart", interval.as_secs());
    let first = capture_snapshot(tool, url, kind, "001", snapshot_dir, budget.call_timeout())?;
    std::thread::sleep(interval.min(budget.remaining()));
    let second = capture_snapshot(tool, url, kind, "002", snapshot_dir, budget.call_timeout())?;

    let base = first.path().to_string_lossy().into_owned();
    let current = second.path().to_string_lossy().into_owned();
    let directive = format!("top {COMPARISON_ROWS}\n");
    let output = tool.run(
        &["-base", &base, &current],
        Some(&directive),
        None,
        budget.call_timeout(),
    )?;
    if !output.success {
        tracing::warn!(
            "{kind} diff exited unsuccessfully: {}",
            output.stderr_tail()
        );
    }
    Ok(parse_flat_cum(&output.combined(), COMPARISON_ROWS))
}

/// Captures one profile and moves the file the tool reports into
/// `snapshot_dir` under a name tagged with `tag`.
pub fn capture_snapshot(
    tool: &ToolSpec,
    url: &str,
    kind: ProfileType,
    tag: &str,
    snapshot_dir: &Path,
    timeout: Duration,
) -> ReportResult<Snapshot> {
    let output = tool.run(&[url], None, None, timeout)?;
    let combined = output.combined();
    let saved = saved_profile_path(&combined).ok_or_else(|| {
        ReportError::ParseFailure(format!(
            "no saved profile reported for {kind} snapshot {tag}: {}",
            output.stderr_tail()
        ))
    })?;

    let file_name = saved
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{kind}.pb.gz"));
    let dest = snapshot_dir.join(format!("{kind}.{}", tagged_snapshot_name(&file_name, tag)));
    match move_file(&saved, &dest) {
        Ok(()) => Ok(Snapshot { path: dest }),
        Err(err) => {
            tracing::warn!("keeping snapshot at {}: {err}", saved.display());
            Ok(Snapshot { path: saved })
        }
    }
}

fn saved_profile_path(output: &str) -> Option<PathBuf> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?m)^Saved profile in\s+(.+?)\s*$").expect("valid saved-profile regex")
    });
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str()))
}

/// Replaces the tool's own sequence number (the last all-digit segment) with
/// `tag`; names without one get the tag appended.
pub fn tagged_snapshot_name(file_name: &str, tag: &str) -> String {
    let mut segments = file_name.split('.').collect::<Vec<_>>();
    let sequence = segments
        .iter()
        .rposition(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()));
    match sequence {
        Some(idx) => {
            segments[idx] = tag;
            segments.join(".")
        }
        None => format!("{file_name}.{tag}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_segment_is_retagged() {
        assert_eq!(
            tagged_snapshot_name("pprof.samples.cpu.007.pb.gz", "001"),
            "pprof.samples.cpu.001.pb.gz"
        );
        assert_eq!(
            tagged_snapshot_name(
                "pprof.orders.alloc_objects.alloc_space.inuse_objects.inuse_space.012.pb.gz",
                "002"
            ),
            "pprof.orders.alloc_objects.alloc_space.inuse_objects.inuse_space.002.pb.gz"
        );
        assert_eq!(tagged_snapshot_name("heap.prof", "001"), "heap.prof.001");
    }

    #[test]
    fn saved_path_is_read_from_tool_notice() {
        let out = "Fetching profile over HTTP from http://h/debug/pprof/heap\nSaved profile in /home/u/pprof/pprof.heap.003.pb.gz\nType: inuse_space\n";
        assert_eq!(
            saved_profile_path(out),
            Some(PathBuf::from("/home/u/pprof/pprof.heap.003.pb.gz"))
        );
        assert_eq!(saved_profile_path("nothing saved"), None);
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::super::*;
        use crate::testutil::{Diff, fake_pprof, temp_dir};

        fn budget() -> CallBudget {
            CallBudget::new(Duration::from_secs(10), Duration::from_secs(60))
        }

        fn leftover_snapshots(dir: &Path) -> Vec<PathBuf> {
            std::fs::read_dir(dir)
                .expect("read dir")
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.to_string_lossy().ends_with(".pb.gz"))
                .collect()
        }

        #[test]
        fn successful_diff_cleans_up_snapshots() {
            let root = temp_dir("compare-ok");
            let snapshots = root.join("snapshots");
            std::fs::create_dir_all(&snapshots).expect("mkdir");
            let tool = fake_pprof(&root, Diff::Succeeds);
            let rows = compare(
                &tool,
                "http://127.0.0.1:1/debug/pprof/goroutine",
                ProfileType::Goroutine,
                Duration::ZERO,
                &snapshots,
                budget(),
            )
            .expect("compare");
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].code, "main.leaky");
            assert!(leftover_snapshots(&snapshots).is_empty());
            assert!(leftover_snapshots(&root.join("saved")).is_empty());
        }

        #[test]
        fn failed_diff_still_cleans_up_snapshots() {
            let root = temp_dir("compare-fail");
            let snapshots = root.join("snapshots");
            std::fs::create_dir_all(&snapshots).expect("mkdir");
            let tool = fake_pprof(&root, Diff::Fails);
            let rows = compare(
                &tool,
                "http://127.0.0.1:1/debug/pprof/goroutine",
                ProfileType::Goroutine,
                Duration::ZERO,
                &snapshots,
                budget(),
            )
            .expect("diff failure degrades to an empty table");
            assert!(rows.is_empty());
            assert!(leftover_snapshots(&snapshots).is_empty());
        }

        #[test]
        fn second_capture_failure_releases_first_snapshot() {
            let root = temp_dir("compare-second-fails");
            let save = root.join("saved");
            std::fs::create_dir_all(&save).expect("mkdir");
            // First call saves a profile, every later call prints nothing.
            let script = format!(
                "if [ -f '{s}/done' ]; then exit 1; fi; touch '{s}/done'; echo x > '{s}/pprof.heap.001.pb.gz'; echo 'Saved profile in {s}/pprof.heap.001.pb.gz' >&2",
                s = save.display()
            );
            let tool = ToolSpec::new("/bin/sh", ["-c".to_string(), script]);
            let err = compare(
                &tool,
                "http://127.0.0.1:1/debug/pprof/heap",
                ProfileType::Heap,
                Duration::ZERO,
                &root,
                budget(),
            )
            .expect_err("second capture fails");
            assert!(matches!(err, ReportError::ParseFailure(_)));
            assert!(leftover_snapshots(&root).is_empty());
            assert!(leftover_snapshots(&save).is_empty());
        }

        #[test]
        fn expired_budget_releases_snapshots_of_a_hung_diff() {
            let root = temp_dir("compare-hung-diff");
            let snapshots = root.join("snapshots");
            std::fs::create_dir_all(&snapshots).expect("mkdir");
            let tool = fake_pprof(&root, Diff::Hangs);
            let started = std::time::Instant::now();
            let err = compare(
                &tool,
                "http://127.0.0.1:1/debug/pprof/goroutine",
                ProfileType::Goroutine,
                Duration::ZERO,
                &snapshots,
                CallBudget::new(Duration::from_secs(30), Duration::from_secs(2)),
            )
            .expect_err("diff outlives the budget");
            assert!(matches!(err, ReportError::Timeout { .. }));
            assert!(started.elapsed() < Duration::from_secs(6));
            assert!(leftover_snapshots(&snapshots).is_empty());
        }
    }
}
