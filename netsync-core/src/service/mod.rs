//! Composition root.
//!
//! - `scheduler` - fixed-delay periodic runner
//!
//! `SyncService` owns the engine and the scheduler driving it.

pub mod scheduler;

pub use scheduler::*;

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::agent::{AgentConnector, AgentRegistry};
use crate::config::{ScheduleConfig, SyncConfig};
use crate::controller::{ControllerApi, MutationGateway};
use crate::platform::PlatformInventory;
use crate::reconcile::{PassReport, ReconcileEngine, SyncError};

type SharedEngine<P, C, A> = Arc<Mutex<ReconcileEngine<P, C, A>>>;

pub struct SyncService<P, C, A: AgentConnector + Clone> {
    engine: SharedEngine<P, C, A>,
    last_report: Arc<Mutex<Option<PassReport>>>,
    schedule: ScheduleConfig,
    scheduler: Option<Scheduler>,
}

impl<P, C, A> SyncService<P, C, A>
where
    P: PlatformInventory + Send + 'static,
    C: ControllerApi + Send + 'static,
    A: AgentConnector + Clone + Send + 'static,
    A::Session: Send,
{
    pub fn new(engine: ReconcileEngine<P, C, A>, schedule: ScheduleConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            last_report: Arc::new(Mutex::new(None)),
            schedule,
            scheduler: None,
        }
    }

    /// Wire an engine from configuration and the three external seams.
    pub fn from_config(config: &SyncConfig, inventory: P, controller: C, connector: A) -> Self {
        let gateway = MutationGateway::new(
            controller,
            config.controller.project.clone(),
            &config.controller.ipam,
        );
        let engine = ReconcileEngine::new(
            inventory,
            gateway,
            AgentRegistry::new(connector),
            config.reserved_names(),
            &config.agent.name_prefix,
        );
        Self::new(engine, config.schedule.clone())
    }

    /// Run one pass on the calling thread.
    ///
    /// Waits for a scheduled pass in progress to finish first.
    pub fn run_once(&self) -> Result<PassReport, SyncError> {
        run_pass(&self.engine, &self.last_report)
    }

    pub fn last_report(&self) -> Option<PassReport> {
        self.last_report.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    /// Start periodic passes. Does nothing if already started.
    pub fn start(&mut self) -> io::Result<()> {
        if self.scheduler.is_some() {
            return Ok(());
        }
        let engine = Arc::clone(&self.engine);
        let last_report = Arc::clone(&self.last_report);
        let scheduler = Scheduler::start(
            "netsync-reconcile",
            self.schedule.initial_delay(),
            self.schedule.delay(),
            move || {
                // Failures are logged in run_pass; the next pass retries.
                let _ = run_pass(&engine, &last_report);
            },
        )?;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Stop scheduling and wait, bounded by the configured timeout, for an
    /// in-flight pass. Returns whether it finished in time.
    pub fn shutdown(&mut self) -> bool {
        match self.scheduler.take() {
            Some(mut scheduler) => scheduler.stop(self.schedule.shutdown_timeout()),
            None => true,
        }
    }
}

fn run_pass<P, C, A>(
    engine: &SharedEngine<P, C, A>,
    last_report: &Mutex<Option<PassReport>>,
) -> Result<PassReport, SyncError>
where
    P: PlatformInventory,
    C: ControllerApi,
    A: AgentConnector + Clone,
{
    let result = engine.lock().run_pass();
    match &result {
        Ok(report) => *last_report.lock() = Some(report.clone()),
        Err(e) => log::error!("PASS_FAILED error={}", e),
    }
    result
}
