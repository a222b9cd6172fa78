mod api;
mod dom;
mod enroll;
mod filter;
mod grid;
mod ipc;
mod matrix;
mod modal;
mod model;
mod profile;
mod sched;
mod toast;

use std::io::{self, BufRead, Write};

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let mut state = ipc::AppState::new();

    // Optional: --base-url <url> wires the HTTP backend at startup so the
    // host shell can skip the backend.http handshake.
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--base-url" => {
                let url = args.next().context("--base-url requires a value")?;
                state
                    .install_http_backend(&url)
                    .with_context(|| format!("failed to install HTTP backend at {}", url))?;
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    Ok(())
}
