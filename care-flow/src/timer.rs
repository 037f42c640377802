use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{Instant, interval_at};
use tracing::debug;

use crate::workflow::Tick;

const MIN_PERIOD: Duration = Duration::from_millis(1);
/// Roughly thirty years; keeps `Instant` arithmetic in range.
const MAX_PERIOD: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A spawned task whose lifetime is bound to this handle.
///
/// Dropping the handle or calling [`ScopedTask::cancel`] aborts the task.
/// Cancelling more than once is a no-op.
#[derive(Debug)]
pub struct ScopedTask {
    abort: AbortHandle,
}

impl ScopedTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        Self {
            abort: handle.abort_handle(),
        }
    }

    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Call `on_tick` once per `period`, starting one period from now, until it
/// returns [`Tick::Done`].
pub fn start_countdown<F>(period: Duration, mut on_tick: F) -> ScopedTask
where
    F: FnMut() -> Tick + Send + 'static,
{
    let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
    ScopedTask::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if on_tick() == Tick::Done {
                debug!("countdown finished");
                break;
            }
        }
    })
}
