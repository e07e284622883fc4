//! [`Scheduler`] backed by a Tokio runtime.
//!
//! Tasks are blocking I/O, so they run on the runtime's blocking pool. The
//! fixed-delay loops are async tasks which are aborted by
//! [`Scheduler::shutdown_now`].
//!
//! [`Scheduler::await_termination`] blocks the calling thread and must not be
//! called from within the runtime.

use crate::scheduler::{CancelToken, Lifecycle, PeriodicTask, Scheduler, Task, TaskGuard};
use crate::Error;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct TokioScheduler {
    handle: Handle,
    lifecycle: Arc<Lifecycle>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            handle,
            lifecycle: Arc::default(),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

impl Scheduler for TokioScheduler {
    fn submit(&self, task: Task) -> Result<(), Error> {
        self.lifecycle.begin_task()?;
        let guard = TaskGuard(self.lifecycle.clone());
        let token = CancelToken::new(self.lifecycle.clone());
        let handle = self.handle.spawn_blocking(move || {
            let _guard = guard;
            task(token);
        });
        self.track(handle);
        Ok(())
    }

    fn schedule_with_fixed_delay(
        &self,
        initial_delay: Duration,
        delay: Duration,
        task: PeriodicTask,
    ) -> Result<(), Error> {
        self.lifecycle.begin_task()?;
        let guard = TaskGuard(self.lifecycle.clone());
        let token = CancelToken::new(self.lifecycle.clone());
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let task = Arc::new(Mutex::new(task));

        let handle = self.handle.spawn(async move {
            let _guard = guard;
            let mut wait = initial_delay;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown_rx.wait_for(|down| *down) => break,
                }
                let task = task.clone();
                let token = token.clone();
                let run = tokio::task::spawn_blocking(move || {
                    let mut task = task.lock().unwrap_or_else(PoisonError::into_inner);
                    task(&token);
                });
                if let Err(err) = run.await {
                    log::error!("Periodic task failed: {err}");
                }
                wait = delay;
            }
        });
        self.track(handle);
        Ok(())
    }

    fn shutdown(&self) {
        self.lifecycle.shutdown();
        self.shutdown_tx.send_replace(true);
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        self.lifecycle.await_termination(timeout)
    }

    fn shutdown_now(&self) {
        self.lifecycle.shutdown_now();
        self.shutdown_tx.send_replace(true);
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
    }

    fn is_shutdown(&self) -> bool {
        self.lifecycle.is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        self.lifecycle.is_terminated()
    }
}
