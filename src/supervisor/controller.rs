//! Run controller task.
//!
//! Owns the single run session slot. Commands from [`super::Supervisor`] handles and events
//! from the monitor task are processed one at a time, so session state is never shared.

use super::monitor::{self, SessionEvent};
use super::{Command, LogSubscription};
use crate::config::DashboardPaths;
use crate::error::{DashError, DashResult};
use crate::model::{
    timestamp_now, LogEvent, RunParams, RunRecord, RunStatus, SessionSnapshot, StatusSnapshot,
    StopOutcome, STATUS_LOG_TAIL,
};
use crate::storage::RunStore;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// The live run. Cleared only by finalization.
struct RunSession {
    run_id: String,
    run_dir: PathBuf,
    record: RunRecord,
    log: Vec<String>,
    kill_tx: UnboundedSender<()>,
    followers: Vec<UnboundedSender<LogEvent>>,
}

struct ControllerState {
    paths: DashboardPaths,
    store: RunStore,
    session: Option<RunSession>,
    /// Followers that subscribed while idle; they join the next run.
    waiting: Vec<UnboundedSender<LogEvent>>,
    event_tx: UnboundedSender<SessionEvent>,
}

/// Process commands and monitor events until every handle is gone and no run is live.
pub(crate) async fn run_supervisor(
    paths: DashboardPaths,
    mut cmd_rx: UnboundedReceiver<Command>,
) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let mut state = ControllerState {
        store: RunStore::new(paths.runs_dir.clone()),
        paths,
        session: None,
        waiting: Vec::new(),
        event_tx,
    };
    // Once the handles are dropped, a live run is still followed to completion so its
    // record and log get written.
    let mut closing = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !closing => {
                match cmd {
                    Some(cmd) => state.handle_command(cmd),
                    None => {
                        if state.session.is_none() {
                            break;
                        }
                        tracing::info!("supervisor handles dropped, waiting for live run to finish");
                        closing = true;
                    }
                }
            }
            Some(event) = event_rx.recv() => {
                state.handle_event(event);
                if closing && state.session.is_none() {
                    break;
                }
            }
        }
    }
    tracing::debug!("run supervisor stopped");
}

impl ControllerState {
    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { params, reply } => {
                let _ = reply.send(self.start(params));
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(self.subscribe());
            }
        }
    }

    fn start(&mut self, params: RunParams) -> DashResult<String> {
        if let Some(session) = &self.session {
            tracing::warn!(run_id = %session.run_id, "start rejected, run already live");
            return Err(DashError::Conflict {
                run_id: session.run_id.clone(),
            });
        }

        let started = timestamp_now();
        let (run_id, run_dir) = self.store.create_run_dir(&started)?;
        let script = self
            .store
            .write_script(&run_dir, &params.command_script(&run_dir))?;
        let mut record = params.record(&run_id, &started);
        self.store.write_record(&run_dir, &record)?;

        let paths = &self.paths;
        let launched = match monitor::launch(&paths.engine_bin, &script, &paths.project_dir) {
            Ok(launched) => launched,
            Err(e) => {
                // Leave a terminal record behind rather than a run that looks live forever.
                record.status = RunStatus::Failed { code: -1 };
                record.finished = Some(timestamp_now());
                if let Err(write_err) = self.store.write_record(&run_dir, &record) {
                    tracing::warn!(
                        run_id = %run_id,
                        error = %write_err,
                        "failed to record launch failure"
                    );
                }
                tracing::error!(run_id = %run_id, error = %e, "engine launch failed");
                return Err(e);
            }
        };

        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        tokio::spawn(monitor::monitor(
            launched,
            run_id.clone(),
            self.event_tx.clone(),
            kill_rx,
        ));

        let mut followers = std::mem::take(&mut self.waiting);
        followers.retain(|tx| !tx.is_closed());

        tracing::info!(
            run_id = %run_id,
            geometry = %record.geometry,
            particle = %record.particle,
            events = record.n_events,
            "run started"
        );
        self.session = Some(RunSession {
            run_id: run_id.clone(),
            run_dir,
            record,
            log: Vec::new(),
            kill_tx,
            followers,
        });
        Ok(run_id)
    }

    fn stop(&mut self) -> StopOutcome {
        match &self.session {
            None => StopOutcome::NotRunning,
            Some(session) => {
                tracing::info!(run_id = %session.run_id, "stop requested");
                let _ = session.kill_tx.send(());
                StopOutcome::Killed
            }
        }
    }

    fn status(&self) -> StatusSnapshot {
        let Some(session) = &self.session else {
            return StatusSnapshot::idle();
        };
        let tail_start = session.log.len().saturating_sub(STATUS_LOG_TAIL);
        StatusSnapshot {
            running: true,
            session: Some(SessionSnapshot {
                run_id: session.run_id.clone(),
                run_dir: session.run_dir.clone(),
                meta: session.record.clone(),
                log_tail: session.log[tail_start..].to_vec(),
                log_length: session.log.len(),
            }),
        }
    }

    fn subscribe(&mut self) -> LogSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        match &mut self.session {
            Some(session) => {
                for line in &session.log {
                    let _ = tx.send(LogEvent::Line(line.clone()));
                }
                session.followers.push(tx);
            }
            None => {
                self.waiting.retain(|tx| !tx.is_closed());
                self.waiting.push(tx);
            }
        }
        LogSubscription::new(rx)
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Line { run_id, line } => {
                let Some(session) = self.session.as_mut().filter(|s| s.run_id == run_id) else {
                    tracing::debug!(run_id = %run_id, "dropping output line for finished run");
                    return;
                };
                session
                    .followers
                    .retain(|tx| tx.send(LogEvent::Line(line.clone())).is_ok());
                session.log.push(line);
            }
            SessionEvent::Exited { run_id, code } => {
                match self.session.take() {
                    Some(session) if session.run_id == run_id => self.finalize(session, code),
                    other => {
                        tracing::warn!(run_id = %run_id, "exit reported for unknown run");
                        self.session = other;
                    }
                }
            }
        }
    }

    // The session has already been removed from the slot, so the supervisor reads as idle
    // from here on.
    fn finalize(&mut self, session: RunSession, code: i32) {
        let RunSession {
            run_id,
            run_dir,
            mut record,
            log,
            followers,
            ..
        } = session;

        record.status = RunStatus::from_exit_code(code);
        record.finished = Some(timestamp_now());
        if let Err(e) = self.store.write_record(&run_dir, &record) {
            tracing::error!(run_id = %run_id, error = %e, "failed to write final run record");
        }
        if let Err(e) = self.store.write_log(&run_dir, &log) {
            tracing::error!(run_id = %run_id, error = %e, "failed to write run log");
        }

        for tx in followers {
            let _ = tx.send(LogEvent::Done);
        }
        tracing::info!(
            run_id = %run_id,
            status = %record.status,
            lines = log.len(),
            "run finished"
        );
    }
}
