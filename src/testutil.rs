//! Test doubles: a canned pprof HTTP server and a scripted analysis tool.

use tiny_http::{Response, Server, StatusCode};

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

use crate::ToolSpec;

pub struct FakeServer {
    pub address: String,
}

impl FakeServer {
    /// Serves each `(path_and_query, status, body)` exactly; everything else
    /// is a 404 like a service without the profiling handlers.
    pub fn start(routes: Vec<(&str, u16, Vec<u8>)>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(path, status, body)| (path.to_string(), status, body))
            .collect::<Vec<_>>();
        let server = Server::http("127.0.0.1:0").expect("bind");
        let address = server.server_addr().to_string();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let (status, body) = routes
                    .iter()
                    .find(|(path, _, _)| path == request.url())
                    .map(|(_, status, body)| (*status, body.clone()))
                    .unwrap_or((404, b"404 page not found\n".to_vec()));
                let response = Response::from_data(body).with_status_code(StatusCode(status));
                let _ = request.respond(response);
            }
        });
        Self { address }
    }
}

/// An address nothing listens on.
pub fn unused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("local addr").to_string();
    drop(listener);
    address
}

pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pprof-report-{name}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("mkdir");
    dir
}

pub const TOP_OUTPUT: &str = "Type: goroutine\n\
Showing nodes accounting for 9, 100% of 9 total\n\
      flat  flat%   sum%        cum   cum%\n\
         5 55.56% 55.56%          5 55.56%  runtime.gopark\n\
         3 33.33% 88.89%          3 33.33%  main.worker\n\
         1 11.11%   100%          1 11.11%  runtime.goexit\n";

pub const DIFF_OUTPUT: &str = "Showing nodes accounting for 2, 22.22% of 9 total\n\
      flat  flat%   sum%        cum   cum%\n\
         2 22.22% 22.22%          2 22.22%  main.leaky\n";

/// How the scripted tool answers a `-base` diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diff {
    Succeeds,
    Fails,
    /// Sleeps well past any test timeout.
    Hangs,
}

/// Writes a POSIX shell script standing in for `go tool pprof`:
/// - `-base a b` answers per `diff` ([`DIFF_OUTPUT`] on success),
/// - other flags render a tiny SVG to stdout,
/// - a bare URL with a stdin directive prints [`TOP_OUTPUT`],
/// - a bare URL without one saves a numbered profile under `save_dir` and
///   announces it on stderr.
pub fn fake_pprof(dir: &Path, diff: Diff) -> ToolSpec {
    let save_dir = dir.join("saved");
    std::fs::create_dir_all(&save_dir).expect("save dir");
    let diff = match diff {
        Diff::Succeeds => format!("cat <<'EOF'\n{DIFF_OUTPUT}EOF"),
        Diff::Fails => "echo 'failed to merge profiles' >&2\n    exit 1".to_string(),
        Diff::Hangs => "sleep 30".to_string(),
    };
    let script = format!(
        r#"#!/bin/sh
case "$1" in
  -base)
    cat >/dev/null
    {diff}
    ;;
  -*)
    printf '<svg xmlns="http://www.w3.org/2000/svg"/>'
    ;;
  *)
    input=$(cat)
    if [ -n "$input" ]; then
      cat <<'EOF'
{TOP_OUTPUT}EOF
    else
      counter="{save}/counter"
      n=$(( $(cat "$counter" 2>/dev/null || echo 0) + 1 ))
      echo "$n" > "$counter"
      file="{save}/pprof.goroutine.$(printf '%03d' "$n").pb.gz"
      echo profile > "$file"
      echo "Fetching profile over HTTP from $1" >&2
      echo "Saved profile in $file" >&2
    fi
    ;;
esac
"#,
        save = save_dir.display(),
    );
    let path = dir.join("fake-pprof.sh");
    std::fs::write(&path, script).expect("write script");
    ToolSpec::new("/bin/sh", [path.to_string_lossy().into_owned()])
}
