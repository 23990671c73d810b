//! Visual artifacts: heap call graphs and flame graphs.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::fsutil::move_file;
use crate::{ArtifactKind, ArtifactNaming, ReportError, ReportResult, ToolSpec};

/// File name the flame renderer always writes into its working directory.
const FLAME_OUTPUT: &str = "torch.svg";

const HEAP_VIEWS: [(&str, ArtifactKind); 2] = [
    ("-alloc_space", ArtifactKind::AllocSpaceGraph),
    ("-inuse_space", ArtifactKind::InuseSpaceGraph),
];

pub type Rendered = (ArtifactKind, ReportResult<PathBuf>);

/// Renders the accumulated-allocation and in-use call graphs side by side.
/// Each render succeeds or fails on its own; both are awaited.
pub fn export_heap_graphs(
    tool: &ToolSpec,
    heap_url: &str,
    naming: &ArtifactNaming,
    timeout: Duration,
) -> Vec<Rendered> {
    thread::scope(|scope| {
        let handles = HEAP_VIEWS
            .iter()
            .map(|&(flag, kind)| {
                let dest = naming.path(kind);
                let handle = scope.spawn(move || render_heap_graph(tool, heap_url, flag, &dest, timeout));
                (kind, handle)
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|(kind, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(ReportError::TaskPanicked(format!("{kind:?} render")))
                });
                if let Err(err) = &result {
                    tracing::warn!("{kind:?} render failed: {err}");
                }
                (kind, result)
            })
            .collect()
    })
}

fn render_heap_graph(
    tool: &ToolSpec,
    heap_url: &str,
    flag: &str,
    dest: &Path,
    timeout: Duration,
) -> ReportResult<PathBuf> {
    tracing::info!("rendering heap {} graph", flag.trim_start_matches('-'));
    let output = tool.run(&[flag, "-cum", "-svg", heap_url], None, None, timeout)?;
    if !output.success || output.stdout.is_empty() {
        return Err(ReportError::ToolFailed {
            tool: tool.display_name(),
            detail: output.stderr_tail(),
        });
    }
    std::fs::write(dest, &output.stdout)?;
    Ok(dest.to_path_buf())
}

/// Allocation and in-use flame graphs. Fails up front with `ToolMissing`
/// when the renderer is not installed.
pub fn export_heap_flames(
    flame: &ToolSpec,
    heap_url: &str,
    naming: &ArtifactNaming,
    timeout: Duration,
) -> ReportResult<Vec<Rendered>> {
    let flame = resolved(flame)?;
    Ok([
        ("-alloc_space", ArtifactKind::AllocSpaceFlame),
        ("-inuse_space", ArtifactKind::InuseSpaceFlame),
    ]
    .into_iter()
    .map(|(flag, kind)| {
        let result = render_flame(&flame, &[flag, heap_url, "--colors=mem"], naming, kind, timeout);
        if let Err(err) = &result {
            tracing::warn!("{kind:?} render failed: {err}");
        }
        (kind, result)
    })
    .collect())
}

pub fn export_cpu_flame(
    flame: &ToolSpec,
    cpu_url: &str,
    seconds: u64,
    naming: &ArtifactNaming,
    timeout: Duration,
) -> ReportResult<PathBuf> {
    let flame = resolved(flame)?;
    let seconds = seconds.to_string();
    render_flame(
        &flame,
        &["--seconds", &seconds, cpu_url],
        naming,
        ArtifactKind::CpuFlame,
        timeout,
    )
}

/// The renderer runs from a scratch directory, so its program is pinned to
/// an absolute path first.
fn resolved(flame: &ToolSpec) -> ReportResult<ToolSpec> {
    let located = flame.ensure_available()?;
    let program = std::fs::canonicalize(&located).unwrap_or(located);
    Ok(ToolSpec {
        program: program.to_string_lossy().into_owned(),
        args: flame.args.clone(),
    })
}

/// Each render gets its own working directory so concurrent renders of the
/// fixed-name output cannot clobber each other.
fn render_flame(
    flame: &ToolSpec,
    args: &[&str],
    naming: &ArtifactNaming,
    kind: ArtifactKind,
    timeout: Duration,
) -> ReportResult<PathBuf> {
    let dest = naming.path(kind);
    let scratch = dest.with_extension("render");
    std::fs::create_dir_all(&scratch)?;
    tracing::info!("rendering flame graph {}", dest.display());

    let result = flame
        .run(args, None, Some(&scratch), timeout)
        .and_then(|output| {
            if !output.success {
                return Err(ReportError::ToolFailed {
                    tool: flame.display_name(),
                    detail: output.stderr_tail(),
                });
            }
            move_file(&scratch.join(FLAME_OUTPUT), &dest)
        });
    if let Err(err) = std::fs::remove_dir_all(&scratch) {
        tracing::debug!("failed to remove {}: {err}", scratch.display());
    }
    result.map(|()| dest)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::{Diff, fake_pprof, temp_dir};

    fn fake_go_torch(dir: &Path) -> ToolSpec {
        let script = dir.join("go-torch.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '<svg>%s</svg>' \"$*\" > torch.svg\n",
        )
        .expect("write script");
        ToolSpec::new("/bin/sh", [script.to_string_lossy().into_owned()])
    }

    #[test]
    fn heap_graphs_are_written_under_fixed_names() {
        let root = temp_dir("heap-graphs");
        let tool = fake_pprof(&root, Diff::Succeeds);
        let naming = ArtifactNaming::new(&root, "svc");
        let rendered = export_heap_graphs(
            &tool,
            "http://127.0.0.1:1/debug/pprof/heap",
            &naming,
            Duration::from_secs(10),
        );
        assert_eq!(rendered.len(), 2);
        assert!(rendered.iter().all(|(_, r)| r.is_ok()));
        assert!(root.join("svc_alloc_space.svg").is_file());
        assert!(root.join("svc_inuse_space.svg").is_file());
    }

    #[test]
    fn one_failed_heap_graph_does_not_block_the_other() {
        let root = temp_dir("heap-graphs-partial");
        let tool = ToolSpec::new(
            "/bin/sh",
            [
                "-c",
                "if [ \"$0\" = -inuse_space ]; then exit 2; fi; printf '<svg/>'",
            ],
        );
        let naming = ArtifactNaming::new(&root, "svc");
        let rendered = export_heap_graphs(&tool, "http://h/heap", &naming, Duration::from_secs(10));
        let alloc = rendered
            .iter()
            .find(|(k, _)| *k == ArtifactKind::AllocSpaceGraph)
            .expect("alloc result");
        let inuse = rendered
            .iter()
            .find(|(k, _)| *k == ArtifactKind::InuseSpaceGraph)
            .expect("inuse result");
        assert!(alloc.1.is_ok());
        assert!(inuse.1.is_err());
        assert!(root.join("svc_alloc_space.svg").is_file());
        assert!(!root.join("svc_inuse_space.svg").exists());
    }

    #[test]
    fn missing_flame_renderer_is_reported_up_front() {
        let root = temp_dir("flame-missing");
        let naming = ArtifactNaming::new(&root, "svc");
        let flame = ToolSpec::new("pprof-report-missing-go-torch", [] as [&str; 0]);
        let err = export_heap_flames(&flame, "http://h/heap", &naming, Duration::from_secs(5))
            .expect_err("missing");
        assert!(matches!(err, ReportError::ToolMissing(_)));
        let err = export_cpu_flame(&flame, "http://h/profile", 30, &naming, Duration::from_secs(5))
            .expect_err("missing");
        assert!(matches!(err, ReportError::ToolMissing(_)));
    }

    #[test]
    fn flame_output_is_renamed_per_kind() {
        let root = temp_dir("flame-rename");
        let naming = ArtifactNaming::new(&root, "svc");
        let flame = fake_go_torch(&root);

        let heap = export_heap_flames(&flame, "http://h/heap", &naming, Duration::from_secs(10))
            .expect("renderer present");
        assert!(heap.iter().all(|(_, r)| r.is_ok()));
        let alloc = std::fs::read_to_string(root.join("svc_alloc_space_fire.svg")).expect("alloc");
        assert!(alloc.contains("-alloc_space"));
        let inuse = std::fs::read_to_string(root.join("svc_inuse_space_fire.svg")).expect("inuse");
        assert!(inuse.contains("-inuse_space"));

        let cpu = export_cpu_flame(&flame, "http://h/profile", 5, &naming, Duration::from_secs(10))
            .expect("cpu flame");
        assert_eq!(cpu, root.join("svc_profile.svg"));
        assert!(std::fs::read_to_string(&cpu).expect("cpu").contains("--seconds 5"));
        assert!(!root.join("torch.svg").exists());
        assert!(!root.join("svc_profile.render").exists());
    }
}
