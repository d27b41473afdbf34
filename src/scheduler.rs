use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;

#[derive(Clone, Copy, Debug)]
pub struct Schedule {
    pub interval: Duration,
    /// Invoke the callback once before the first interval starts ticking.
    pub launch_initially: bool,
}

/// Periodic executor with strictly sequential callback invocations.
///
/// The next wait only starts once the previous invocation has returned, so a
/// slow callback delays subsequent ticks rather than letting them pile up,
/// and no two invocations ever overlap. Cancelling the token passed to
/// [`Scheduler::schedule`] ends the schedule with the same finality as
/// [`Scheduler::stop`]; `stop` itself may be called any number of times.
#[derive(Debug, Default)]
pub struct Scheduler {
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F, Fut>(
        &self,
        shutdown: CancellationToken,
        settings: Schedule,
        mut callback: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if settings.interval.is_zero() {
            return Err(SchedulerError::ZeroInterval(settings.interval));
        }
        let Ok(mut slot) = self.task.lock() else {
            return Err(SchedulerError::AlreadyScheduled);
        };
        if slot.is_some() {
            return Err(SchedulerError::AlreadyScheduled);
        }

        let stop = self.stop.clone();
        let handle = tokio::spawn(async move {
            if stop.is_cancelled() || shutdown.is_cancelled() {
                return;
            }
            if settings.launch_initially {
                callback().await;
            }

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => return,
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(settings.interval) => {}
                }
                callback().await;
            }
        });
        *slot = Some(handle);

        Ok(())
    }

    /// Stop firing. Idempotent; an in-flight invocation runs to completion.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Wait until the schedule task has fully wound down.
    pub async fn join(&self) {
        let handle = match self.task.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
