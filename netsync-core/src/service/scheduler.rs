//! Fixed-delay periodic runner.
//!
//! The delay is measured from the end of one run to the start of the next,
//! so runs never overlap. A panicking run is logged and the schedule goes on.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct State {
    stopping: bool,
    finished: bool,
    in_flight: bool,
    runs: u64,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    changed: Condvar,
}

pub struct Scheduler {
    name: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Run `task` on a dedicated thread after `initial_delay`, then again
    /// `delay` after each run completes, until stopped.
    pub fn start<F>(name: &str, initial_delay: Duration, delay: Duration, task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(&thread_name, &worker, initial_delay, delay, task))?;

        log::info!(
            "SCHEDULER_STARTED name={} delay_ms={} initial_delay_ms={}",
            name,
            delay.as_millis(),
            initial_delay.as_millis()
        );
        Ok(Self {
            name: name.to_string(),
            shared,
            handle: Some(handle),
        })
    }

    /// Completed runs, panicked ones included.
    pub fn runs(&self) -> u64 {
        self.shared.state.lock().runs
    }

    pub fn is_in_flight(&self) -> bool {
        self.shared.state.lock().in_flight
    }

    /// Block until at least `runs` runs have completed or `timeout` passes.
    pub fn wait_for_runs(&self, runs: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.runs < runs {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.runs >= runs
    }

    /// Stop scheduling and wait up to `timeout` for an in-flight run.
    ///
    /// Returns `false` if the run was still going when the wait gave up; the
    /// thread is then left to finish on its own.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return true,
        };

        let deadline = Instant::now() + timeout;
        let finished = {
            let mut state = self.shared.state.lock();
            state.stopping = true;
            self.shared.changed.notify_all();
            while !state.finished {
                if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            state.finished
        };

        if finished {
            if handle.join().is_err() {
                log::error!("SCHEDULER_THREAD_PANICKED name={}", self.name);
            }
            log::info!("SCHEDULER_STOPPED name={}", self.name);
        } else {
            log::warn!(
                "SCHEDULER_STOP_TIMEOUT name={} timeout_ms={}",
                self.name,
                timeout.as_millis()
            );
        }
        finished
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop(Duration::ZERO);
        }
    }
}

fn run_loop<F: FnMut()>(name: &str, shared: &Shared, initial_delay: Duration, delay: Duration, mut task: F) {
    let mut wait = initial_delay;
    loop {
        {
            let deadline = Instant::now() + wait;
            let mut state = shared.state.lock();
            while !state.stopping {
                if shared.changed.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            if state.stopping {
                break;
            }
            state.in_flight = true;
        }

        if panic::catch_unwind(AssertUnwindSafe(&mut task)).is_err() {
            log::error!("SCHEDULED_RUN_PANICKED name={}", name);
        }

        let mut state = shared.state.lock();
        state.in_flight = false;
        state.runs += 1;
        shared.changed.notify_all();
        wait = delay;
    }

    let mut state = shared.state.lock();
    state.finished = true;
    shared.changed.notify_all();
}
