//! Launching the engine and following it until exit.

use crate::error::{DashError, DashResult};
use std::io::{BufRead, BufReader, PipeReader};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Reported by the monitor task back to the controller.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Line { run_id: String, line: String },
    Exited { run_id: String, code: i32 },
}

/// A spawned engine process and the read end of its combined stdout/stderr pipe.
pub(crate) struct Launched {
    pub child: Child,
    pub output: PipeReader,
}

/// Start `engine <script>` in `workdir` with stdout and stderr sharing one pipe.
pub(crate) fn launch(engine: &Path, script: &Path, workdir: &Path) -> DashResult<Launched> {
    let (output, writer) =
        std::io::pipe().map_err(|e| DashError::io("create engine output pipe", e))?;
    let stderr = writer
        .try_clone()
        .map_err(|e| DashError::io("clone engine output pipe", e))?;

    // The Command holds the write ends; it is dropped at the end of this statement so the
    // reader sees end-of-stream once the child closes its copies.
    let child = Command::new(engine)
        .arg(script)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr)
        .spawn()
        .map_err(|e| DashError::Spawn {
            program: engine.to_path_buf(),
            source: e,
        })?;

    tracing::debug!(pid = ?child.id(), engine = %engine.display(), "engine spawned");
    Ok(Launched { child, output })
}

/// Follow one run: forward output lines, honour kill requests, then report the exit code.
///
/// Exactly one [`SessionEvent::Exited`] is sent, after every line of output.
pub(crate) async fn monitor(
    launched: Launched,
    run_id: String,
    events: UnboundedSender<SessionEvent>,
    mut kill_rx: UnboundedReceiver<()>,
) {
    let Launched { mut child, output } = launched;

    let line_events = events.clone();
    let line_run_id = run_id.clone();
    let mut pump =
        tokio::task::spawn_blocking(move || pump_lines(output, &line_run_id, &line_events));

    loop {
        tokio::select! {
            res = &mut pump => {
                if let Err(e) = res {
                    tracing::warn!(run_id = %run_id, error = %e, "output reader task failed");
                }
                break;
            }
            Some(()) = kill_rx.recv() => kill(&mut child, &run_id),
        }
    }

    let code = loop {
        tokio::select! {
            status = child.wait() => break exit_code(status, &run_id),
            Some(()) = kill_rx.recv() => kill(&mut child, &run_id),
        }
    };

    let _ = events.send(SessionEvent::Exited { run_id, code });
}

// Blocking read of the pipe; a read error is treated like end of stream.
fn pump_lines(output: PipeReader, run_id: &str, events: &UnboundedSender<SessionEvent>) {
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                let sent = events.send(SessionEvent::Line {
                    run_id: run_id.to_string(),
                    line,
                });
                if sent.is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(run_id = %run_id, error = %e, "engine output stream ended");
                break;
            }
        }
    }
}

fn kill(child: &mut Child, run_id: &str) {
    match child.start_kill() {
        Ok(()) => tracing::info!(run_id = %run_id, "kill signal sent to engine"),
        // Already exited or reaped.
        Err(e) => tracing::debug!(run_id = %run_id, error = %e, "engine kill ignored"),
    }
}

fn exit_code(status: std::io::Result<ExitStatus>, run_id: &str) -> i32 {
    match status {
        Ok(status) => status.code().unwrap_or_else(|| signal_code(&status)),
        Err(e) => {
            tracing::warn!(run_id = %run_id, error = %e, "failed to wait for engine");
            -1
        }
    }
}

#[cfg(unix)]
fn signal_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map_or(-1, |sig| -sig)
}

#[cfg(not(unix))]
fn signal_code(_status: &ExitStatus) -> i32 {
    -1
}
