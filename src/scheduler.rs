//! Background execution for the receive loop and the heartbeat.
//!
//! The connection never spawns threads on its own; it is handed a
//! [`Scheduler`] by its owner, which also decides about the shutdown.

use crate::Error;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub type Task = Box<dyn FnOnce(CancelToken) + Send + 'static>;
pub type PeriodicTask = Box<dyn FnMut(&CancelToken) + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Runs `task` once in the background.
    fn submit(&self, task: Task) -> Result<(), Error>;

    /// Runs `task` after `initial_delay` and then again `delay` after each run
    /// finished, until shutdown.
    fn schedule_with_fixed_delay(
        &self,
        initial_delay: Duration,
        delay: Duration,
        task: PeriodicTask,
    ) -> Result<(), Error>;

    /// Stops accepting tasks and ends periodic tasks. Running tasks are not
    /// interrupted but their token sleeps wake up.
    fn shutdown(&self);

    /// Waits up to `timeout` for all tasks to finish, returns whether they did.
    fn await_termination(&self, timeout: Duration) -> bool;

    /// Cancels all tasks; they observe it through [`CancelToken::is_cancelled`].
    fn shutdown_now(&self);

    fn is_shutdown(&self) -> bool;

    fn is_terminated(&self) -> bool;
}

#[derive(Debug, Default)]
struct State {
    shutdown: bool,
    cancelled: bool,
    running: usize,
}

/// Shutdown bookkeeping shared by the scheduler and its tasks.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    state: Mutex<State>,
    changed: Condvar,
}

impl Lifecycle {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn begin_task(&self) -> Result<(), Error> {
        let mut state = self.lock();
        if state.shutdown {
            return Err(Error::SchedulerShutdown);
        }
        state.running += 1;
        Ok(())
    }

    pub(crate) fn end_task(&self) {
        let mut state = self.lock();
        state.running = state.running.saturating_sub(1);
        self.changed.notify_all();
    }

    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.changed.notify_all();
    }

    pub(crate) fn shutdown_now(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        state.cancelled = true;
        self.changed.notify_all();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    pub(crate) fn is_terminated(&self) -> bool {
        let state = self.lock();
        state.shutdown && state.running == 0
    }

    pub(crate) fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.running > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Ends the task in the lifecycle, also when the task panics or is aborted.
pub(crate) struct TaskGuard(pub(crate) Arc<Lifecycle>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.end_task();
    }
}

/// Handed to every task to observe cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    lifecycle: Arc<Lifecycle>,
}

impl CancelToken {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    /// A token that is never cancelled, for running tasks inline.
    pub fn detached() -> Self {
        Self::new(Arc::default())
    }

    pub fn is_cancelled(&self) -> bool {
        self.lifecycle.lock().cancelled
    }

    pub fn is_shutdown(&self) -> bool {
        self.lifecycle.is_shutdown()
    }

    /// Sleeps for `duration` unless the scheduler shuts down first.
    ///
    /// Returns `false` if woken up by a shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.lifecycle.lock();
        loop {
            if state.shutdown {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = self
                .lifecycle
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Runs every task on its own named thread.
#[derive(Debug, Default)]
pub struct ThreadScheduler {
    lifecycle: Arc<Lifecycle>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(&self, name: &str, body: impl FnOnce() + Send + 'static) -> Result<(), Error> {
        self.lifecycle.begin_task()?;
        let guard = TaskGuard(self.lifecycle.clone());
        // On a spawn error the closure is dropped, and the guard with it
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = guard;
                body();
            })?;
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads.retain(|t| !t.is_finished());
        threads.push(handle);
        Ok(())
    }
}

impl Scheduler for ThreadScheduler {
    fn submit(&self, task: Task) -> Result<(), Error> {
        let token = CancelToken::new(self.lifecycle.clone());
        self.spawn("vallox-task", move || task(token))
    }

    fn schedule_with_fixed_delay(
        &self,
        initial_delay: Duration,
        delay: Duration,
        mut task: PeriodicTask,
    ) -> Result<(), Error> {
        let token = CancelToken::new(self.lifecycle.clone());
        self.spawn("vallox-periodic", move || {
            let mut wait = initial_delay;
            while token.sleep(wait) {
                task(&token);
                wait = delay;
            }
        })
    }

    fn shutdown(&self) {
        self.lifecycle.shutdown();
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let terminated = self.lifecycle.await_termination(timeout);
        if terminated {
            let threads = std::mem::take(
                &mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner),
            );
            for thread in threads {
                if thread.join().is_err() {
                    log::error!("Scheduler thread panicked");
                }
            }
        }
        terminated
    }

    fn shutdown_now(&self) {
        self.lifecycle.shutdown_now();
    }

    fn is_shutdown(&self) -> bool {
        self.lifecycle.is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        self.lifecycle.is_terminated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn submitted_task_runs() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = std::sync::mpsc::channel();
        scheduler
            .submit(Box::new(move |_| tx.send(42).unwrap()))
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        scheduler.shutdown();
        assert!(scheduler.await_termination(Duration::from_secs(5)));
        assert!(scheduler.is_terminated());
    }

    #[test]
    fn periodic_task_stops_on_shutdown() {
        let scheduler = ThreadScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        scheduler
            .schedule_with_fixed_delay(
                Duration::ZERO,
                Duration::from_millis(10),
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        let started = Instant::now();
        while runs.load(Ordering::SeqCst) < 3 && started.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(runs.load(Ordering::SeqCst) >= 3);

        scheduler.shutdown();
        assert!(scheduler.await_termination(Duration::from_secs(5)));
        let after = runs.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::SeqCst), after);
    }

    #[test]
    fn shutdown_wakes_long_sleep() {
        let scheduler = ThreadScheduler::new();
        scheduler
            .schedule_with_fixed_delay(
                Duration::from_secs(3600),
                Duration::from_secs(3600),
                Box::new(|_| {}),
            )
            .unwrap();
        scheduler.shutdown();
        assert!(scheduler.await_termination(Duration::from_secs(1)));
    }

    #[test]
    fn forced_cancellation() {
        let scheduler = ThreadScheduler::new();
        scheduler
            .submit(Box::new(|token| {
                // ignores the graceful shutdown, only stops when cancelled
                while !token.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
            }))
            .unwrap();
        scheduler.shutdown();
        assert!(!scheduler.await_termination(Duration::from_millis(50)));
        assert!(!scheduler.is_terminated());
        scheduler.shutdown_now();
        assert!(scheduler.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn panicking_task_still_terminates() {
        let scheduler = ThreadScheduler::new();
        scheduler
            .submit(Box::new(|_| panic!("listener failed")))
            .unwrap();
        scheduler
            .schedule_with_fixed_delay(
                Duration::ZERO,
                Duration::from_millis(10),
                Box::new(|_| panic!("heartbeat failed")),
            )
            .unwrap();
        scheduler.shutdown();
        assert!(scheduler.await_termination(Duration::from_secs(5)));
        assert!(scheduler.is_terminated());
    }

    #[test]
    fn rejects_tasks_after_shutdown() {
        let scheduler = ThreadScheduler::new();
        scheduler.shutdown();
        assert!(matches!(
            scheduler.submit(Box::new(|_| {})),
            Err(Error::SchedulerShutdown)
        ));
    }

    #[test]
    fn detached_token_sleeps() {
        let token = CancelToken::detached();
        assert!(token.sleep(Duration::from_millis(1)));
        assert!(!token.is_cancelled());
    }
}
