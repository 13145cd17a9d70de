//! Cosmetic progress counters.
//!
//! Neither ticker reflects real work: the elapsed counter is wall-clock
//! seconds and the progress counter is a random "items analysed" figure.

use std::sync::Weak;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::session::SearchSession;

/// The ticker tasks of one session.  Stopping aborts every task once;
/// dropping the set stops it.
#[derive(Default)]
pub struct TickerSet {
    handles: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl TickerSet {
    pub fn push(&mut self, handle: JoinHandle<()>) {
        if self.stopped {
            handle.abort();
        } else {
            self.handles.push(handle);
        }
    }

    /// Returns `false` when the set was already stopped.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        true
    }
}

impl Drop for TickerSet {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TickerSettings {
    pub elapsed_every: Duration,
    pub progress_every: Duration,
    /// Half-open `min..max` range of the progress increment.
    pub progress_step: (u64, u64),
}

/// Spawn the elapsed and progress tickers for `session`.
///
/// The tasks only hold a weak reference and exit on their own once the
/// session is gone or no longer running.
pub fn spawn_tickers(session: Weak<Mutex<SearchSession>>, settings: TickerSettings) -> TickerSet {
    let (step_min, step_max) = settings.progress_step;

    let mut tickers = TickerSet::default();
    tickers.push(spawn_ticker(session.clone(), settings.elapsed_every, |session| {
        session.elapsed_seconds += 1;
    }));
    tickers.push(spawn_ticker(session, settings.progress_every, move |session| {
        // A collapsed or inverted range is a fixed step.
        let step = if step_min < step_max {
            rand::rng().random_range(step_min..step_max)
        } else {
            step_min
        };
        session.progress_count = session.progress_count.saturating_add(step);
    }));
    tickers
}

fn spawn_ticker<F>(
    session: Weak<Mutex<SearchSession>>,
    every: Duration,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut(&mut SearchSession) + Send + 'static,
{
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let Some(session) = session.upgrade() else {
                break;
            };
            let mut session = session.lock().await;
            if !session.is_running() {
                break;
            }
            on_tick(&mut *session);
            session.emit_progress();
        }
    })
}
