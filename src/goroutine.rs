//! Goroutine dump analysis: total count and longest-blocked goroutines.

use regex::Regex;
use serde::{Deserialize, Serialize};

use std::io::Read;
use std::sync::OnceLock;

use crate::{ReportError, ReportResult, Target};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoroutineCount {
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoroutineWaitRecord {
    pub id: u64,
    #[serde(rename = "waitMinutes")]
    pub wait_minutes: u64,
    pub reason: String,
    /// The goroutine's full block from the dump, header included.
    pub stack: String,
}

pub fn goroutine_count(agent: &ureq::Agent, target: &Target) -> ReportResult<GoroutineCount> {
    let body = fetch_text(agent, &target.endpoint("goroutine?debug=1"))?;
    parse_goroutine_count(&body)
}

pub fn goroutine_waits(
    agent: &ureq::Agent,
    target: &Target,
) -> ReportResult<Vec<GoroutineWaitRecord>> {
    let body = fetch_text(agent, &target.endpoint("goroutine?debug=2"))?;
    Ok(parse_goroutine_waits(&body))
}

/// Full dumps of busy services exceed `into_string`'s size cap, so the body
/// is read without one.
fn fetch_text(agent: &ureq::Agent, url: &str) -> ReportResult<String> {
    tracing::info!("fetching {url}");
    let mut body = String::new();
    agent.get(url).call()?.into_reader().read_to_string(&mut body)?;
    Ok(body)
}

pub fn parse_goroutine_count(dump: &str) -> ReportResult<GoroutineCount> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"goroutine profile: total (\d+)").expect("valid goroutine total regex")
    });
    let total = re
        .captures(dump)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(|| {
            ReportError::ParseFailure("no `goroutine profile: total` line in dump".to_string())
        })?;
    Ok(GoroutineCount { total })
}

/// Goroutines reported as blocked for at least a minute, longest first and
/// by ascending id among equals. Goroutines without a wait duration are left
/// out rather than ranked as zero.
pub fn parse_goroutine_waits(dump: &str) -> Vec<GoroutineWaitRecord> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?m)^goroutine (\d+)(?: [^\[\n]*)? \[([^\]\n]*?), (\d+) minutes(?:, [^\]\n]*)?\]")
            .expect("valid goroutine header regex")
    });

    let normalized = dump.replace("\r\n", "\n");
    let mut records = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter_map(|block| {
            let caps = re.captures(block)?;
            Some(GoroutineWaitRecord {
                id: caps.get(1)?.as_str().parse().ok()?,
                reason: caps.get(2)?.as_str().to_string(),
                wait_minutes: caps.get(3)?.as_str().parse().ok()?,
                stack: block.to_string(),
            })
        })
        .collect::<Vec<_>>();
    records.sort_by(|a, b| {
        b.wait_minutes
            .cmp(&a.wait_minutes)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeServer;

    fn block(id: u64, state: &str) -> String {
        format!(
            "goroutine {id} [{state}]:\nmain.worker(0xc000010000)\n\t/src/main.go:{id}2 +0x45\ncreated by main.main in goroutine 1\n\t/src/main.go:20 +0x6d"
        )
    }

    #[test]
    fn waits_rank_by_minutes_then_id() {
        let dump = [
            block(1, "chan receive, 5 minutes"),
            block(2, "select, 20 minutes"),
            block(3, "IO wait, 3 minutes"),
            block(4, "semacquire, 20 minutes"),
        ]
        .join("\n\n");
        let records = parse_goroutine_waits(&dump);
        assert_eq!(
            records
                .iter()
                .map(|r| (r.id, r.wait_minutes))
                .collect::<Vec<_>>(),
            vec![(2, 20), (4, 20), (1, 5), (3, 3)]
        );
        assert_eq!(records[0].reason, "select");
        assert!(records[0].stack.starts_with("goroutine 2 [select, 20 minutes]:"));
        assert!(records[0].stack.ends_with("+0x6d"));
    }

    #[test]
    fn goroutines_without_duration_are_excluded() {
        let dump = [
            block(1, "running"),
            block(7, "chan send"),
            block(9, "select, 2 minutes, locked to thread"),
            block(11, "chan receive (nil chan), 1 minutes"),
        ]
        .join("\n\n");
        let records = parse_goroutine_waits(&dump);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 9);
        assert_eq!(records[0].reason, "select");
        assert_eq!(records[1].reason, "chan receive (nil chan)");
    }

    #[test]
    fn headers_with_scheduler_details_still_match() {
        let dump = "goroutine 42 gp=0xc000007a40 m=nil [sync.Cond.Wait, 15 minutes]:\nsync.runtime_notifyListWait()";
        let records = parse_goroutine_waits(dump);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 42);
        assert_eq!(records[0].wait_minutes, 15);
    }

    #[test]
    fn total_is_read_from_summary_line() {
        let dump = "goroutine profile: total 42\n7 @ 0x43a1c6 0x4064ab\n#\t0x43a1c5\truntime.gopark+0xe5\n";
        assert_eq!(parse_goroutine_count(dump).expect("total").total, 42);
        let err = parse_goroutine_count("heap profile: 1: 2 [3: 4] @ heap/1048576").expect_err("no total");
        assert!(matches!(err, ReportError::ParseFailure(_)));
    }

    #[test]
    fn endpoints_are_fetched_over_http() {
        let server = FakeServer::start(vec![
            (
                "/debug/pprof/goroutine?debug=1",
                200,
                b"goroutine profile: total 3\n".to_vec(),
            ),
            (
                "/debug/pprof/goroutine?debug=2",
                200,
                format!("{}\n\n{}\n", block(5, "select, 4 minutes"), block(6, "running")).into_bytes(),
            ),
        ]);
        let agent = ureq::AgentBuilder::new().build();
        let target = Target::new(&server.address, "svc");
        assert_eq!(goroutine_count(&agent, &target).expect("count").total, 3);
        let waits = goroutine_waits(&agent, &target).expect("waits");
        assert_eq!(waits.len(), 1);
        assert_eq!(waits[0].id, 5);
    }
}
