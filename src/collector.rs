//! Collection fan-out: one thread per profile type plus the trace capture,
//! joined by a single aggregating owner.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::{
    Artifact, ArtifactKind, ArtifactNaming, CallBudget, Config, Issue, ProfileResult, ProfileType,
    Report, ReportError, ReportResult, RunSummary, SectionSummary, Target, build_workbook,
    compare, download_trace, export_cpu_flame, export_heap_flames, export_heap_graphs,
    fetch_top_n, goroutine_count, goroutine_waits, normalize_types, probe_target,
};

pub const DEFAULT_SECONDS: u64 = 30;
pub const DEFAULT_TOP: usize = 10;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long the join keeps waiting past the task deadline for tasks that
/// are unwinding their last, already cut-short call.
const JOIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub address: String,
    /// Sample duration for CPU profiles, the trace and the CPU flame graph.
    pub seconds: u64,
    pub top: usize,
    pub types: Vec<ProfileType>,
}

impl ReportRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            seconds: 0,
            top: 0,
            types: Vec::new(),
        }
    }

    /// Zero durations and counts fall back to the defaults; an empty type
    /// list selects every type.
    pub fn normalized(&self) -> Self {
        Self {
            address: self.address.trim().to_string(),
            seconds: if self.seconds == 0 {
                DEFAULT_SECONDS
            } else {
                self.seconds
            },
            top: if self.top == 0 { DEFAULT_TOP } else { self.top },
            types: normalize_types(&self.types),
        }
    }
}

#[derive(Debug)]
pub struct Collection {
    pub target: Target,
    pub profile_types: Vec<ProfileType>,
    pub report: Report,
    pub artifacts: Vec<Artifact>,
    pub issues: Vec<Issue>,
}

struct TaskContext {
    config: Config,
    target: Target,
    seconds: u64,
    top: usize,
    naming: ArtifactNaming,
    /// Shared by every call a task makes.
    deadline: Instant,
}

impl TaskContext {
    fn budget(&self) -> CallBudget {
        CallBudget::until(self.config.tool_timeout(self.seconds), self.deadline)
    }

    fn http_timeout(&self, nominal: Duration) -> Duration {
        nominal.min(self.budget().remaining())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Trace,
    Profile(ProfileType),
}

impl TaskKind {
    fn label(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Profile(ty) => ty.as_str(),
        }
    }
}

#[derive(Debug, Default)]
struct TaskOutput {
    result: Option<ProfileResult>,
    artifacts: Vec<Artifact>,
    issues: Vec<Issue>,
}

impl TaskOutput {
    /// Logs and records a failed step; the caller substitutes an empty value.
    fn step<T>(&mut self, task: &str, step: &str, result: ReportResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("{task}: {step} failed: {err}");
                self.issues.push(Issue::new(task, step, &err));
                None
            }
        }
    }
}

struct TaskMessage {
    task: TaskKind,
    outcome: ReportResult<TaskOutput>,
}

/// Probes the target, runs every collection task and returns the aggregate.
/// Only an unreachable target or disabled profiling is an error; any other
/// failure is an [`Issue`] on the returned collection.
pub fn collect(config: &Config, request: &ReportRequest) -> ReportResult<Collection> {
    let request = request.normalized();
    let target = probe_target(config, &request.address)?;
    std::fs::create_dir_all(&config.out_dir)?;

    let budget = config.task_timeout(request.seconds);
    let deadline = Instant::now() + budget;
    let ctx = Arc::new(TaskContext {
        config: config.clone(),
        naming: ArtifactNaming::new(&config.out_dir, &target.app_name),
        target: target.clone(),
        seconds: request.seconds,
        top: request.top,
        deadline,
    });

    let mut report = Report::new(&target.app_name);
    let mut artifacts = Vec::new();
    let mut issues = Vec::new();
    let mut pending = Vec::new();

    let (tx, rx) = mpsc::channel::<TaskMessage>();
    let tasks = std::iter::once(TaskKind::Trace)
        .chain(request.types.iter().copied().map(TaskKind::Profile));
    for task in tasks {
        match spawn_task(&ctx, task, tx.clone()) {
            Ok(()) => pending.push(task),
            Err(err) => issues.push(Issue::new(task.label(), "spawn", &err)),
        }
    }
    drop(tx);

    let join_deadline = deadline + JOIN_GRACE;
    while !pending.is_empty() {
        let remaining = join_deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(TaskMessage { task, outcome }) => {
                pending.retain(|t| *t != task);
                match outcome {
                    Ok(output) => {
                        if let (TaskKind::Profile(ty), Some(result)) = (task, output.result) {
                            report.record(ty, result);
                        }
                        artifacts.extend(output.artifacts);
                        issues.extend(output.issues);
                    }
                    Err(err) => {
                        tracing::warn!("{} task failed: {err}", task.label());
                        issues.push(Issue::new(task.label(), "task", &err));
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                for task in pending.drain(..) {
                    let err = ReportError::Timeout {
                        what: format!("{} task", task.label()),
                        after: budget,
                    };
                    tracing::warn!("{err}; continuing without it");
                    issues.push(Issue::new(task.label(), "task", &err));
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                for task in pending.drain(..) {
                    let err = ReportError::TaskPanicked("task exited without reporting".to_string());
                    issues.push(Issue::new(task.label(), "task", &err));
                }
            }
        }
    }

    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    issues.sort_by(|a, b| (&a.task, &a.step).cmp(&(&b.task, &b.step)));
    Ok(Collection {
        target,
        profile_types: request.types,
        report,
        artifacts,
        issues,
    })
}

/// [`collect`] followed by the workbook build.
pub fn generate_report(config: &Config, request: &ReportRequest) -> ReportResult<RunSummary> {
    let started = Instant::now();
    let started_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    let collection = collect(config, request)?;
    let report_path = build_workbook(&collection.report, &config.out_dir)?;

    let sections = collection
        .report
        .present_sections()
        .into_iter()
        .map(|section| SectionSummary {
            sheet: section.sheet_name().to_string(),
            rows: collection.report.rows(section),
        })
        .collect();
    let mut artifacts = collection.artifacts;
    artifacts.push(Artifact::new(ArtifactKind::Workbook, &report_path));

    Ok(RunSummary {
        schema_version: "pprof_report.run_summary.v1".to_string(),
        target: collection.target.address,
        app_name: collection.target.app_name,
        started_at,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        profile_types: collection.profile_types,
        report_path: report_path.display().to_string(),
        sections,
        artifacts,
        issues: collection.issues,
    })
}

fn spawn_task(
    ctx: &Arc<TaskContext>,
    task: TaskKind,
    tx: Sender<TaskMessage>,
) -> ReportResult<()> {
    let ctx = Arc::clone(ctx);
    thread::Builder::new()
        .name(format!("collect-{}", task.label()))
        .spawn(move || {
            let outcome = isolate(|| run_task(&ctx, task));
            // The receiver is gone once the join deadline has passed.
            let _ = tx.send(TaskMessage { task, outcome });
        })?;
    Ok(())
}

/// Turns a panic inside `f` into a `TaskPanicked` error.
fn isolate<T>(f: impl FnOnce() -> ReportResult<T>) -> ReportResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(ReportError::TaskPanicked(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run_task(ctx: &TaskContext, task: TaskKind) -> ReportResult<TaskOutput> {
    match task {
        TaskKind::Trace => run_trace_task(ctx),
        TaskKind::Profile(ty) => Ok(run_profile_task(ctx, ty)),
    }
}

fn run_trace_task(ctx: &TaskContext) -> ReportResult<TaskOutput> {
    let agent = http_agent(
        ctx.http_timeout(ctx.config.http_timeout() + Duration::from_secs(ctx.seconds)),
    );
    let dest = ctx.naming.path(ArtifactKind::Trace);
    download_trace(&agent, &ctx.target, ctx.seconds, &dest)?;
    Ok(TaskOutput {
        artifacts: vec![Artifact::new(ArtifactKind::Trace, &dest)],
        ..TaskOutput::default()
    })
}

fn run_profile_task(ctx: &TaskContext, ty: ProfileType) -> TaskOutput {
    let task = ty.as_str();
    let config = &ctx.config;
    let budget = ctx.budget();
    let url = ctx.target.endpoint(&ty.endpoint(ctx.seconds));
    let mut out = TaskOutput::default();
    let mut result = ProfileResult::default();

    result.top = out
        .step(
            task,
            "top",
            fetch_top_n(&config.analysis_tool, &url, ctx.top, budget.call_timeout()),
        )
        .unwrap_or_default();
    result.comparison = out
        .step(
            task,
            "comparison",
            compare(
                &config.analysis_tool,
                &url,
                ty,
                config.compare_interval(),
                &config.out_dir,
                budget,
            ),
        )
        .unwrap_or_default();

    match ty {
        ProfileType::Cpu => {
            let cpu_url = ctx.target.endpoint("profile");
            let flame = export_cpu_flame(
                &config.flame_tool,
                &cpu_url,
                ctx.seconds,
                &ctx.naming,
                budget.call_timeout(),
            );
            if let Some(path) = out.step(task, "cpu_flame", flame) {
                out.artifacts.push(Artifact::new(ArtifactKind::CpuFlame, &path));
            }
        }
        ProfileType::Heap => {
            for (kind, rendered) in
                export_heap_graphs(&config.analysis_tool, &url, &ctx.naming, budget.call_timeout())
            {
                if let Some(path) = out.step(task, "heap_graph", rendered) {
                    out.artifacts.push(Artifact::new(kind, &path));
                }
            }
            let flames = export_heap_flames(
                &config.flame_tool,
                &url,
                &ctx.naming,
                budget.call_timeout(),
            );
            for (kind, rendered) in out.step(task, "heap_flame", flames).unwrap_or_default() {
                if let Some(path) = out.step(task, "heap_flame", rendered) {
                    out.artifacts.push(Artifact::new(kind, &path));
                }
            }
        }
        ProfileType::Goroutine => {
            let agent = http_agent(ctx.http_timeout(config.http_timeout()));
            result.goroutine_waits = out
                .step(task, "goroutine_waits", goroutine_waits(&agent, &ctx.target))
                .unwrap_or_default();
            result.goroutine_total =
                out.step(task, "goroutine_total", goroutine_count(&agent, &ctx.target));
        }
    }

    out.result = Some(result);
    out
}

fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
}
