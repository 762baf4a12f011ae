//! Lifecycle of the external simulation process.
//!
//! A single controller task owns the run session; [`Supervisor`] handles talk to it over a
//! command channel, so start/stop/status/subscribe are the only ways state changes. At most one
//! run is live at a time.

mod controller;
mod monitor;

use crate::config::DashboardPaths;
use crate::error::{DashError, DashResult};
use crate::model::{LogEvent, RunParams, StatusSnapshot, StopOutcome};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Requests handled by the controller task.
pub(crate) enum Command {
    Start {
        params: RunParams,
        reply: oneshot::Sender<DashResult<String>>,
    },
    Stop {
        reply: oneshot::Sender<StopOutcome>,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<LogSubscription>,
    },
}

/// Cloneable handle to the run controller.
#[derive(Debug, Clone)]
pub struct Supervisor {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Supervisor {
    /// Spawn the controller task on the current runtime.
    ///
    /// The task exits once every handle is dropped and any live run has been finalized.
    pub fn spawn(paths: DashboardPaths) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(controller::run_supervisor(paths, cmd_rx));
        Self { cmd_tx }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> DashResult<T> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(make(reply)).map_err(|_| DashError::Closed)?;
        rx.await.map_err(|_| DashError::Closed)
    }

    /// Launch a run and return its id without waiting for the process to finish.
    ///
    /// Fails with [`DashError::Conflict`] while another run is live.
    pub async fn start(&self, params: RunParams) -> DashResult<String> {
        self.request(|reply| Command::Start { params, reply }).await?
    }

    /// Ask the live process to terminate. Finalization still happens through the monitor.
    pub async fn stop(&self) -> DashResult<StopOutcome> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn status(&self) -> DashResult<StatusSnapshot> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Follow the log of the live run (or of the next run, when idle).
    ///
    /// Every line of the run is delivered in order, starting from its first line, followed
    /// by a single [`LogEvent::Done`] once the run is finalized.
    pub async fn subscribe(&self) -> DashResult<LogSubscription> {
        self.request(|reply| Command::Subscribe { reply }).await
    }
}

/// Independent read cursor over a run's log.
#[derive(Debug)]
pub struct LogSubscription {
    rx: mpsc::UnboundedReceiver<LogEvent>,
}

impl LogSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<LogEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` after [`LogEvent::Done`] has been delivered.
    pub async fn next_event(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }
}

impl futures::Stream for LogSubscription {
    type Item = LogEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<LogEvent>> {
        self.rx.poll_recv(cx)
    }
}
