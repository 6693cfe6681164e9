use std::time::Duration;

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a started timer. Dropping it leaves the timer running.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// One-shot timers. A zero delay is how deferred work (e.g. a permission prompt) is queued.
pub trait Timers: Send + Sync {
    fn start(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Timers backed by the tokio runtime the desktop shell already runs on.
#[derive(Clone)]
pub struct TokioTimers {
    runtime: tokio::runtime::Handle,
}

impl TokioTimers {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }
}

impl Timers for TokioTimers {
    fn start(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let task = self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            callback();
        });
        let abort = task.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}
