//! Liveness service: owns the feed subscription, the periodic tick worker and
//! the single [`LivenessMonitor`], and forwards what happens to a sink.
//!
//! Feed callbacks and ticks both go through one `parking_lot::Mutex`, so the
//! sink never observes a half-applied update. `start`/`stop` acquire and
//! release the subscription and the tick worker together; `reset` is
//! `stop` + fresh monitor + `start`, which is what an identity change needs.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, select};
use parking_lot::Mutex;

use super::sink::{Lifecycle, LivenessEvent, LivenessSink};
use crate::core::config::LivenessPolicy;
use crate::core::errors::{GuardError, Result};
use crate::feed::{Feed, FeedCallback, FeedEvent, Subscription, normalize_path};
use crate::monitor::{Clock, Evaluation, LivenessMonitor, LivenessState, Reading};

/// State shared between the owner, feed callbacks and the tick worker.
struct Core {
    monitor: LivenessMonitor,
    sink: Box<dyn LivenessSink>,
}

impl Core {
    fn on_feed_event(&mut self, event: &FeedEvent, now: DateTime<Utc>) {
        let Some(mut observation) = Reading::from_feed(&event.value) else {
            self.sink.emit(&LivenessEvent::FeedError {
                path: event.path.clone(),
                details: format!("expected a reading object, got {}", event.value),
                at: now,
            });
            return;
        };
        // Transport metadata beats a stamp embedded in the payload.
        if event.server_timestamp.is_some() {
            observation.server_timestamp = event.server_timestamp;
        }

        let outcome = self.monitor.ingest(&observation, now);
        self.sink.emit(&LivenessEvent::Reading {
            reading: observation.value,
            changed: outcome.changed,
            online: outcome.online,
            evidence: outcome.evidence,
            at: now,
        });
        if let Some(transition) = outcome.transition {
            self.sink.emit(&LivenessEvent::Transition {
                online: transition.online,
                at: transition.at,
            });
        }
    }

    fn on_tick(&mut self, now: DateTime<Utc>) -> Evaluation {
        let evaluation = self.monitor.evaluate(now);
        if let Some(transition) = evaluation.transition {
            self.sink.emit(&LivenessEvent::Transition {
                online: transition.online,
                at: transition.at,
            });
        }
        evaluation
    }

    fn lifecycle(&mut self, phase: Lifecycle, at: DateTime<Utc>) {
        self.sink.emit(&LivenessEvent::Lifecycle { phase, at });
    }
}

struct TickWorker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl TickWorker {
    fn spawn<C: Clock + 'static>(
        core: Arc<Mutex<Core>>,
        clock: Arc<C>,
        interval: Duration,
    ) -> Result<Self> {
        let (stop, stopped) = crossbeam_channel::bounded::<()>(1);
        let ticker = crossbeam_channel::tick(interval);
        let handle = thread::Builder::new()
            .name("sawahguard-tick".to_string())
            .spawn(move || {
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let now = clock.now();
                            core.lock().on_tick(now);
                        }
                        recv(stopped) -> _ => break,
                    }
                }
            })
            .map_err(|err| GuardError::Runtime {
                details: format!("failed to spawn tick worker: {err}"),
            })?;
        Ok(Self { stop, handle })
    }

    fn shutdown(self) -> Result<()> {
        // Either a message or the disconnect wakes the worker.
        let _ = self.stop.send(());
        drop(self.stop);
        self.handle.join().map_err(|_| GuardError::Runtime {
            details: "tick worker panicked".to_string(),
        })
    }
}

/// Online/offline monitor for the device node at one feed path.
pub struct LivenessService<F: Feed, C: Clock + 'static> {
    feed: F,
    clock: Arc<C>,
    path: String,
    core: Arc<Mutex<Core>>,
    subscription: Option<Subscription>,
    ticker: Option<TickWorker>,
}

impl<F: Feed, C: Clock + 'static> LivenessService<F, C> {
    pub fn new(
        feed: F,
        clock: C,
        path: &str,
        policy: LivenessPolicy,
        sink: impl LivenessSink + 'static,
    ) -> Self {
        Self {
            feed,
            clock: Arc::new(clock),
            path: normalize_path(path),
            core: Arc::new(Mutex::new(Core {
                monitor: LivenessMonitor::new(policy),
                sink: Box::new(sink),
            })),
            subscription: None,
            ticker: None,
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to the feed and start ticking. No-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let now = self.clock.now();
        self.core.lock().lifecycle(Lifecycle::Started, now);

        let core = Arc::clone(&self.core);
        let clock = Arc::clone(&self.clock);
        let callback: FeedCallback = Arc::new(move |event: &FeedEvent| {
            let now = clock.now();
            core.lock().on_feed_event(event, now);
        });
        let subscription = self.feed.subscribe(&self.path, callback)?;

        let tick = self.core.lock().monitor.policy().tick;
        let ticker = TickWorker::spawn(Arc::clone(&self.core), Arc::clone(&self.clock), tick)?;

        self.subscription = Some(subscription);
        self.ticker = Some(ticker);
        Ok(())
    }

    /// Unsubscribe and stop the tick worker. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        let Some(subscription) = self.subscription.take() else {
            return Ok(());
        };
        subscription.unsubscribe();
        let joined = self.ticker.take().map_or(Ok(()), TickWorker::shutdown);
        let now = self.clock.now();
        self.core.lock().lifecycle(Lifecycle::Stopped, now);
        joined
    }

    /// Forget all liveness evidence, e.g. after the user identity changed.
    ///
    /// A running service is re-attached, so the feed replays its current value
    /// and that replay is treated as a baseline rather than proof of life.
    pub fn reset(&mut self) -> Result<()> {
        let was_running = self.is_running();
        self.stop()?;
        {
            let now = self.clock.now();
            let mut core = self.core.lock();
            let was_online = core.monitor.is_online();
            core.monitor.reset();
            core.lifecycle(Lifecycle::Reset, now);
            if was_online {
                core.sink.emit(&LivenessEvent::Transition { online: false, at: now });
            }
        }
        if was_running {
            self.start()?;
        }
        Ok(())
    }

    /// Run one evaluation right now, outside the tick schedule.
    pub fn evaluate_now(&self) -> Evaluation {
        let now = self.clock.now();
        self.core.lock().on_tick(now)
    }

    #[must_use]
    pub fn snapshot(&self) -> LivenessState {
        self.core.lock().monitor.state().clone()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.core.lock().monitor.is_online()
    }
}

impl<F: Feed, C: Clock + 'static> Drop for LivenessService<F, C> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
