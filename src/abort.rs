//! Cancellation shared by operation polling and resource waits

use std::future::Future;
use tokio::sync::watch;

/// Cancels in-flight polls and waits when its sender publishes `true`
#[derive(Clone, Default)]
pub struct AbortSignal(Option<watch::Receiver<bool>>);

impl AbortSignal {
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self(Some(rx)))
    }

    /// A signal that never fires
    pub fn never() -> Self {
        Self(None)
    }

    pub fn is_aborted(&self) -> bool {
        self.0.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    pub(crate) async fn aborted(&mut self) {
        if let Some(rx) = self.0.as_mut() {
            if rx.wait_for(|aborted| *aborted).await.is_ok() {
                return;
            }
        }
        // a dropped sender can no longer abort
        std::future::pending::<()>().await
    }

    /// Run `work` unless the signal fires first; `None` means aborted.
    /// An already-fired signal wins over a ready future.
    pub(crate) async fn race<F: Future>(&self, work: F) -> Option<F::Output> {
        let mut abort = self.clone();
        tokio::select! {
            biased;
            _ = abort.aborted() => None,
            output = work => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_dropped_sender_never_aborts() {
        let (tx, signal) = AbortSignal::new();
        drop(tx);
        assert!(!signal.is_aborted());
    }

    #[tokio::test]
    async fn test_fired_signal_wins_race() {
        let (tx, signal) = AbortSignal::new();
        tx.send(true).unwrap();
        assert_eq!(signal.race(async { 1 }).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_interrupts_sleep() {
        let (tx, signal) = AbortSignal::new();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(true);
        });

        let start = tokio::time::Instant::now();
        let outcome = signal.race(tokio::time::sleep(Duration::from_secs(3600))).await;
        assert_eq!(outcome, None);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_never_lets_work_finish() {
        assert_eq!(AbortSignal::never().race(async { "done" }).await, Some("done"));
    }
}
