use anyhow::Result;
use pprof_report::RunSummary;
use serde::Serialize;
use serde_json::Value;

pub struct CliLogger {
    json: bool,
    no_color: bool,
}

impl CliLogger {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self { json, no_color }
    }

    pub fn print_serialized<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(value)?);
            return Ok(());
        }

        let rendered = render_value(&serde_json::to_value(value)?, 0);
        println!("{rendered}");
        Ok(())
    }

    pub fn print_run_summary(&self, summary: &RunSummary) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(summary)?);
            return Ok(());
        }

        let status = if summary.issues.is_empty() {
            self.style("COMPLETE", "32;1")
        } else {
            self.style("PARTIAL", "33;1")
        };

        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {}\n",
            self.style("pprof-report", "36;1"),
            self.style(&summary.app_name, "37;1"),
            status
        ));
        out.push_str(&format!("{} {}\n", self.style("target", "90"), summary.target));
        out.push_str(&format!(
            "{} {}\n",
            self.style("started", "90"),
            summary.started_at
        ));
        out.push_str(&format!(
            "{} {}ms\n",
            self.style("duration", "90"),
            summary.duration_ms
        ));
        out.push_str(&format!(
            "{} {}\n",
            self.style("report", "90"),
            summary.report_path
        ));

        if !summary.sections.is_empty() {
            out.push_str(&format!("{}\n", self.style("sheets", "90")));
            for section in &summary.sections {
                out.push_str(&format!("  - {} ({} rows)\n", section.sheet, section.rows));
            }
        }

        if !summary.artifacts.is_empty() {
            out.push_str(&format!("{}\n", self.style("artifacts", "90")));
            for artifact in &summary.artifacts {
                out.push_str(&format!("  - {}\n", artifact.path));
            }
        }

        if !summary.issues.is_empty() {
            out.push_str(&format!("{}\n", self.style("issues", "33;1")));
            for issue in &summary.issues {
                out.push_str(&format!(
                    "  - [{}] {}/{}: {}\n",
                    issue.kind, issue.task, issue.step, issue.message
                ));
            }
        }

        println!("{}", out.trim_end());
        Ok(())
    }

    pub fn print_error(&self, msg: &str) {
        if self.json {
            let out = serde_json::json!({
                "status": "error",
                "code": "error",
                "message": msg,
            });
            println!("{out}");
            return;
        }
        eprintln!("{} {msg}", self.style("error", "31;1"));
    }

    fn style(&self, text: &str, ansi: &str) -> String {
        if self.no_color {
            return text.to_string();
        }
        format!("\x1b[{ansi}m{text}\x1b[0m")
    }
}

fn render_value(value: &Value, indent: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Array(items) => render_array(items, indent),
        Value::Object(map) => render_object(map, indent),
    }
}

fn render_array(items: &[Value], indent: usize) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }

    let pad = " ".repeat(indent);
    let mut out = String::new();
    for item in items {
        match item {
            Value::Object(_) | Value::Array(_) => {
                out.push_str(&format!("{pad}-\n{}\n", render_value(item, indent + 2)));
            }
            _ => out.push_str(&format!("{pad}- {}\n", render_value(item, indent + 2))),
        }
    }
    out.trim_end().to_string()
}

fn render_object(map: &serde_json::Map<String, Value>, indent: usize) -> String {
    if map.is_empty() {
        return "{}".to_string();
    }

    let pad = " ".repeat(indent);
    let mut out = String::new();
    for (key, value) in map {
        match value {
            Value::Object(_) | Value::Array(_) => {
                out.push_str(&format!(
                    "{pad}{key}:\n{}\n",
                    render_value(value, indent + 2)
                ));
            }
            _ => out.push_str(&format!(
                "{pad}{key}: {}\n",
                render_value(value, indent + 2)
            )),
        }
    }
    out.trim_end().to_string()
}
