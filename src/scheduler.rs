//! Scheduler loop.
//!
//! Runs an [`Ingestor`] cycle immediately, then again every `interval`
//! measured from the end of the previous cycle. A failed cycle is logged and
//! the loop carries on.
//!
//! ```text
//!        ┌──────────── interval elapsed ────────────┐
//!        ▼                                          │
//!   RunningCycle ──── cycle finished ────▶ Idle ────┘
//!                                           │
//!                                    shutdown resolved
//!                                           ▼
//!                                         return
//! ```
//!
//! The shutdown future is only polled while idle, so a cycle in flight is
//! always allowed to finish.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::ingest::{self, CycleReport, Ingestor};
use crate::pidfile::PidFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RunningCycle,
}

pub struct Scheduler {
    ingestor: Ingestor,
    interval: Duration,
    state: SchedulerState,
    cycles: u64,
}

impl Scheduler {
    pub fn new(ingestor: Ingestor, interval: Duration) -> Self {
        Self {
            ingestor,
            interval,
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle and return to `Idle`.
    pub async fn tick(&mut self) -> CycleReport {
        self.state = SchedulerState::RunningCycle;
        let cycle = self.cycles + 1;
        debug!(cycle, "cycle started");

        let report = self.ingestor.run_cycle().await;

        self.cycles = cycle;
        self.state = SchedulerState::Idle;
        if report.is_ok() {
            info!(cycle, written = report.rows_written(), "cycle finished");
        } else {
            warn!(
                cycle,
                written = report.rows_written(),
                "cycle finished with errors"
            );
        }
        report
    }

    /// Loop until `shutdown` resolves.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        loop {
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!(cycles = self.cycles, "shutdown requested, scheduler stopped");
                    return;
                }
            }
        }
    }
}

/// Run the daemon command: hold the pid file and poll until Ctrl-C or SIGTERM.
pub async fn run_daemon(config: &Config) -> anyhow::Result<()> {
    let pid_file = PidFile::acquire(&config.pid_path())?;
    info!(pid = std::process::id(), path = %pid_file.path().display(), "daemon starting");

    // Must exist before the first cycle; signals arriving during it are buffered.
    let shutdown = ShutdownSignal::install()?;

    let ingestor = ingest::open(config).await?;
    let mut scheduler = Scheduler::new(ingestor, Duration::from_secs(config.schedule.interval_secs));
    scheduler.run_until(shutdown.recv()).await;

    Ok(())
}

/// Ctrl-C / SIGTERM listeners, registered with the runtime on construction.
///
/// Signals delivered between [`install`](Self::install) and
/// [`recv`](Self::recv) are buffered, not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn install() -> anyhow::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
        })
    }

    #[cfg(windows)]
    pub fn install() -> anyhow::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c().context("Failed to install Ctrl-C handler")?,
        })
    }

    /// Resolve on the first shutdown signal.
    pub async fn recv(mut self) {
        #[cfg(unix)]
        tokio::select! {
            _ = self.interrupt.recv() => info!("received Ctrl-C"),
            _ = self.terminate.recv() => info!("received SIGTERM"),
        }

        #[cfg(windows)]
        {
            self.ctrl_c.recv().await;
            info!("received Ctrl-C");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector_github::{events_location, repos_location};
    use crate::http_cache::testing::{status_only, ScriptedTransport};
    use crate::ingest::IngestSettings;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    const API: &str = "https://api.github.com";

    fn scheduler(transport: &ScriptedTransport, interval: Duration) -> Scheduler {
        let settings = IngestSettings {
            api_url: API.to_string(),
            username: "octo".to_string(),
            per_page: 100,
            max_pages: 1,
            max_repos: None,
        };
        let ingestor = Ingestor::new(
            Box::new(transport.clone()),
            Arc::new(InMemoryStore::new()),
            settings,
        );
        Scheduler::new(ingestor, interval)
    }

    #[tokio::test]
    async fn test_ready_shutdown_runs_exactly_one_cycle() {
        let transport = ScriptedTransport::new();
        transport.push_json(&repos_location(API, "octo", 100, 1), serde_json::json!([]), None, None);
        transport.push_json(&events_location(API, "octo"), serde_json::json!([]), None, None);
        let mut scheduler = scheduler(&transport, Duration::from_secs(600));

        scheduler.run_until(async {}).await;

        assert_eq!(scheduler.cycles_completed(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_failing_cycles_do_not_stop_the_loop() {
        let transport = ScriptedTransport::new();
        transport.push(&repos_location(API, "octo", 100, 1), status_only(500, "Internal Server Error"));
        transport.push(&events_location(API, "octo"), status_only(500, "Internal Server Error"));
        let mut scheduler = scheduler(&transport, Duration::from_millis(5));

        scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await;

        assert!(scheduler.cycles_completed() >= 2);
        assert!(transport.calls_to(&events_location(API, "octo")) >= 2);
    }

    #[tokio::test]
    async fn test_tick_returns_report() {
        let transport = ScriptedTransport::new();
        transport.push(&repos_location(API, "octo", 100, 1), status_only(401, "Unauthorized"));
        transport.push_json(&events_location(API, "octo"), serde_json::json!([]), None, None);
        let mut scheduler = scheduler(&transport, Duration::from_secs(600));

        let report = scheduler.tick().await;

        assert!(report.repositories.is_err());
        assert!(report.commits.is_ok());
        assert_eq!(scheduler.cycles_completed(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_before_loop_starts_stops_after_first_cycle() {
        let transport = ScriptedTransport::new();
        transport.push_json(&repos_location(API, "octo", 100, 1), serde_json::json!([]), None, None);
        transport.push_json(&events_location(API, "octo"), serde_json::json!([]), None, None);
        let mut scheduler = scheduler(&transport, Duration::from_secs(600));

        let shutdown = ShutdownSignal::install().unwrap();
        // Arrives before the loop ever polls the shutdown future.
        unsafe {
            libc::kill(std::process::id() as i32, libc::SIGTERM);
        }

        tokio::time::timeout(Duration::from_secs(5), scheduler.run_until(shutdown.recv()))
            .await
            .expect("scheduler should stop on the buffered signal");

        assert_eq!(scheduler.cycles_completed(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
