// ── Supervised polling loops ──
//
// Each loop runs its cycle, then sleeps. A failing cycle is logged and the
// loop carries on; enough failures in a row buy one doubled sleep. The
// watchdog restarts loops that stop with capped exponential backoff and
// gives up, loudly and once, after `max_restarts`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::CycleReport;
use crate::config::PollingConfig;
use crate::error::CoreError;
use crate::notify::Escalator;

// ── LoopKind / TaskStatus ────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, IntoStaticStr, EnumIter,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoopKind {
    Badges,
    Presence,
    Groups,
}

/// Observable lifecycle of one supervised loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Starting,
    Running,
    BackingOff,
    Stopped,
    Failed,
}

pub type StatusSender = Arc<watch::Sender<TaskStatus>>;

/// Builds the future for one run of a loop.
pub type LoopSpawner =
    Arc<dyn Fn(LoopKind, StatusSender, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

// ── Loop body ────────────────────────────────────────────────────

/// Run `cycle` every interval until cancelled.
pub(crate) async fn run_loop<F, Fut>(
    polling: PollingConfig,
    kind: LoopKind,
    status: StatusSender,
    cancel: CancellationToken,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CycleReport, CoreError>>,
{
    let interval = match kind {
        LoopKind::Groups => polling.group_interval(),
        LoopKind::Badges | LoopKind::Presence => polling.base_interval,
    };
    let threshold = polling.failure_threshold.max(1);
    let mut consecutive_failures = 0_u32;

    status.send_replace(TaskStatus::Running);
    info!(%kind, interval_secs = interval.as_secs(), "polling loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = AssertUnwindSafe(cycle())
            .catch_unwind()
            .await;
        let succeeded = match outcome {
            Ok(Ok(report)) => {
                debug!(%kind, ?report, "cycle finished");
                true
            }
            Ok(Err(e)) => {
                warn!(%kind, error = %e, "cycle failed");
                false
            }
            Err(panic) => {
                error!(%kind, panic = panic_message(panic.as_ref()), "cycle panicked");
                false
            }
        };

        consecutive_failures = if succeeded { 0 } else { consecutive_failures + 1 };

        let wait = if consecutive_failures >= threshold {
            warn!(
                %kind,
                consecutive_failures,
                "too many failed cycles, backing off"
            );
            consecutive_failures = 0;
            status.send_replace(TaskStatus::BackingOff);
            interval.saturating_mul(2)
        } else {
            interval
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }
        status.send_if_modified(|s| {
            let changed = *s != TaskStatus::Running;
            *s = TaskStatus::Running;
            changed
        });
    }

    status.send_replace(TaskStatus::Stopped);
    info!(%kind, "polling loop stopped");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// ── Watchdog ─────────────────────────────────────────────────────

struct SupervisedTask {
    kind: LoopKind,
    handle: JoinHandle<()>,
    status: StatusSender,
    restarts: u32,
    gave_up: bool,
}

impl SupervisedTask {
    fn is_dead(&self) -> bool {
        self.handle.is_finished()
            || matches!(
                *self.status.borrow(),
                TaskStatus::Stopped | TaskStatus::Failed
            )
    }
}

/// Keeps the polling loops alive.
pub struct Watchdog {
    polling: PollingConfig,
    spawner: LoopSpawner,
    escalator: Arc<Escalator>,
    cancel: CancellationToken,
    tasks: Vec<SupervisedTask>,
}

impl Watchdog {
    pub fn new(
        polling: PollingConfig,
        spawner: LoopSpawner,
        escalator: Arc<Escalator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            polling,
            spawner,
            escalator,
            cancel,
            tasks: Vec::new(),
        }
    }

    /// Start `kind` now and watch it from then on.
    pub fn supervise(&mut self, kind: LoopKind, status: StatusSender) {
        status.send_replace(TaskStatus::Starting);
        let handle = tokio::spawn((self.spawner)(kind, status.clone(), self.cancel.clone()));
        self.tasks.push(SupervisedTask {
            kind,
            handle,
            status,
            restarts: 0,
            gave_up: false,
        });
    }

    /// Tick until cancelled, then wait for the loops to stop.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.polling.watchdog_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = tick.tick() => self.check().await,
            }
        }

        for task in self.tasks.drain(..) {
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    warn!(kind = %task.kind, error = %e, "loop ended abnormally during shutdown");
                }
            }
        }
        debug!("watchdog stopped");
    }

    /// One pass over all supervised loops.
    pub async fn check(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }

        for task in &mut self.tasks {
            if task.gave_up || !task.is_dead() {
                continue;
            }

            if task.restarts >= self.polling.max_restarts {
                task.gave_up = true;
                task.status.send_replace(TaskStatus::Failed);
                let message = format!(
                    "The {} loop died {} times and will not be restarted again.",
                    task.kind,
                    task.restarts + 1
                );
                self.escalator
                    .escalate("Polling loop gave up", &message)
                    .await;
                continue;
            }

            let delay = self.polling.restart_delay(task.restarts);
            task.restarts += 1;
            warn!(
                kind = %task.kind,
                restart = task.restarts,
                delay_secs = delay.as_secs(),
                "loop is not running, restarting"
            );

            task.status.send_replace(TaskStatus::Starting);
            task.handle.abort();
            task.handle = spawn_delayed(
                delay,
                (self.spawner)(task.kind, task.status.clone(), self.cancel.clone()),
                self.cancel.clone(),
            );
        }
    }
}

fn spawn_delayed(
    delay: Duration,
    run: BoxFuture<'static, ()>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(delay) => run.await,
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use async_trait::async_trait;

    use super::*;
    use crate::config::EscalationConfig;
    use crate::model::{ChangeEvent, ChannelId};
    use crate::notify::{NotificationSink, SinkError};

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<ChangeEvent>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, _: ChannelId, event: &ChangeEvent) -> Result<(), SinkError> {
            self.sent.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn verify_destination(&self, _: ChannelId) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn polling(max_restarts: u32) -> PollingConfig {
        PollingConfig {
            watchdog_interval: Duration::from_secs(60),
            max_restarts,
            restart_backoff: Duration::from_secs(1),
            restart_backoff_cap: Duration::from_secs(4),
            ..PollingConfig::default()
        }
    }

    fn escalator(sink: Arc<RecordingSink>) -> Arc<Escalator> {
        Arc::new(Escalator::new(
            sink,
            &EscalationConfig {
                channel: Some(1),
                cooldown: Duration::from_secs(300),
            },
        ))
    }

    /// A loop body that exits immediately, counting its starts.
    fn dying_spawner(starts: Arc<AtomicU32>) -> LoopSpawner {
        Arc::new(move |_: LoopKind, _: StatusSender, _: CancellationToken| {
            starts.fetch_add(1, Ordering::SeqCst);
            async {}.boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn dead_loop_is_restarted_then_abandoned_once() {
        let starts = Arc::new(AtomicU32::new(0));
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let status = Arc::new(watch::channel(TaskStatus::Starting).0);

        let mut watchdog = Watchdog::new(
            polling(2),
            dying_spawner(starts.clone()),
            escalator(sink.clone()),
            cancel.clone(),
        );
        watchdog.supervise(LoopKind::Badges, status.clone());
        let handle = tokio::spawn(watchdog.run());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        // First tick at 60s notices the dead loop; restart after 1s.
        tokio::time::sleep(Duration::from_secs(32)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 3);
        assert_eq!(*status.borrow(), TaskStatus::Failed);

        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], ChangeEvent::CriticalAlert(_)));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn live_loop_is_left_alone() {
        let starts = Arc::new(AtomicU32::new(0));
        let counter = starts.clone();
        let spawner: LoopSpawner = Arc::new(
            move |_: LoopKind, status: StatusSender, cancel: CancellationToken| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    status.send_replace(TaskStatus::Running);
                    cancel.cancelled().await;
                    status.send_replace(TaskStatus::Stopped);
                }
                .boxed()
            },
        );

        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let status = Arc::new(watch::channel(TaskStatus::Starting).0);
        let mut watchdog =
            Watchdog::new(polling(2), spawner, escalator(sink.clone()), cancel.clone());
        watchdog.supervise(LoopKind::Presence, status.clone());
        let handle = tokio::spawn(watchdog.run());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(*status.borrow(), TaskStatus::Running);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(*status.borrow(), TaskStatus::Stopped);
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    fn loop_polling() -> PollingConfig {
        PollingConfig {
            base_interval: Duration::from_secs(10),
            failure_threshold: 3,
            ..PollingConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_buy_one_doubled_sleep() {
        let start = Instant::now();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let status = Arc::new(watch::channel(TaskStatus::Starting).0);
        let cancel = CancellationToken::new();

        let recorded = calls.clone();
        let handle = tokio::spawn(run_loop(
            loop_polling(),
            LoopKind::Badges,
            status.clone(),
            cancel.clone(),
            move || {
                recorded.lock().unwrap().push(start.elapsed().as_secs());
                async {
                    Err(CoreError::Api {
                        message: "upstream down".into(),
                        status: Some(503),
                    })
                }
            },
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert_eq!(*status.borrow(), TaskStatus::BackingOff);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.lock().unwrap().len(), 4);
        assert_eq!(*status.borrow(), TaskStatus::Running);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(*calls.lock().unwrap(), vec![0, 10, 20, 40, 50, 60, 80]);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(*status.borrow(), TaskStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_cycle_does_not_stop_the_loop() {
        let calls = Arc::new(AtomicU32::new(0));
        let status = Arc::new(watch::channel(TaskStatus::Starting).0);
        let cancel = CancellationToken::new();

        let counter = calls.clone();
        let handle = tokio::spawn(run_loop(
            loop_polling(),
            LoopKind::Presence,
            status.clone(),
            cancel.clone(),
            move || {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert!(call > 0, "first cycle blows up");
                    Ok(CycleReport::default())
                }
            },
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*status.borrow(), TaskStatus::Running);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*status.borrow(), TaskStatus::Running);
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
