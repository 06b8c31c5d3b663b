// src/watch/debounce.rs

//! Trailing-edge debouncer.
//!
//! Every [`DebounceTrigger::trigger`] call (re)arms a single timer. When the
//! quiet window elapses without another trigger, one fire is delivered on the
//! output queue. The queue holds at most one pending fire, so a storm of
//! triggers can never queue up several restarts.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Quiet window used by the reload loop unless configured otherwise.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_secs(2);

/// Cheap, cloneable handle for arming the debouncer from any context.
///
/// `trigger` never blocks and is safe to call from synchronous callbacks.
#[derive(Debug, Clone)]
pub struct DebounceTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl DebounceTrigger {
    pub fn trigger(&self) {
        // Fails only once the debouncer is gone, at which point nobody is
        // waiting for a fire anyway.
        let _ = self.tx.send(());
    }
}

/// Owns the timer task and the fire queue.
///
/// Dropping the debouncer stops its timer task.
#[derive(Debug)]
pub struct Debouncer {
    trigger: DebounceTrigger,
    fire_rx: mpsc::Receiver<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the timer task. Must be called inside a Tokio runtime.
    pub fn new(window: Duration) -> Self {
        let (tx, trigger_rx) = mpsc::unbounded_channel::<()>();
        let (fire_tx, fire_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(run_timer(window, trigger_rx, fire_tx));

        Self {
            trigger: DebounceTrigger { tx },
            fire_rx,
            task,
        }
    }

    pub fn trigger(&self) {
        self.trigger.trigger();
    }

    pub fn handle(&self) -> DebounceTrigger {
        self.trigger.clone()
    }

    /// Wait for the next fire. Cancel-safe, so it can sit in a `select!`.
    pub async fn fired(&mut self) -> Option<()> {
        self.fire_rx.recv().await
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_timer(
    window: Duration,
    mut trigger_rx: mpsc::UnboundedReceiver<()>,
    fire_tx: mpsc::Sender<()>,
) {
    // Idle: wait for the first trigger of a burst.
    while trigger_rx.recv().await.is_some() {
        trace!("debounce armed");
        let timer = sleep(window);
        tokio::pin!(timer);

        // Armed: every further trigger pushes the deadline out.
        loop {
            tokio::select! {
                msg = trigger_rx.recv() => match msg {
                    Some(()) => timer.as_mut().reset(Instant::now() + window),
                    None => return,
                },
                () = &mut timer => {
                    trace!("debounce fired");
                    // A full queue already holds an unconsumed fire.
                    let _ = fire_tx.try_send(());
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const WINDOW: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_fire() {
        let mut deb = Debouncer::new(WINDOW);
        for _ in 0..25 {
            deb.trigger();
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        assert_eq!(timeout(WINDOW * 3, deb.fired()).await, Ok(Some(())));
        assert!(timeout(WINDOW * 5, deb.fired()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn separated_bursts_fire_twice() {
        let mut deb = Debouncer::new(WINDOW);

        deb.trigger();
        assert_eq!(timeout(WINDOW * 2, deb.fired()).await, Ok(Some(())));

        tokio::time::sleep(WINDOW * 2).await;
        deb.handle().trigger();
        assert_eq!(timeout(WINDOW * 2, deb.fired()).await, Ok(Some(())));
    }

    #[tokio::test(start_paused = true)]
    async fn unconsumed_fires_do_not_queue() {
        let mut deb = Debouncer::new(WINDOW);

        deb.trigger();
        tokio::time::sleep(WINDOW * 2).await;
        deb.trigger();
        tokio::time::sleep(WINDOW * 2).await;

        assert_eq!(timeout(WINDOW, deb.fired()).await, Ok(Some(())));
        assert!(timeout(WINDOW * 3, deb.fired()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn no_trigger_no_fire() {
        let mut deb = Debouncer::new(WINDOW);
        assert!(timeout(WINDOW * 10, deb.fired()).await.is_err());
    }
}
