use crate::core::channel::{Channel, HandlerContext};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// The negotiation deadline of one connection
///
/// The sleep runs on its own task; expiry is handed to the channel's
/// context so it never interleaves with handler callbacks. Cancellation
/// clears the slot, which the queued expiry callback checks before acting.
#[derive(Default)]
pub(crate) struct NegotiationTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl NegotiationTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn arm<F>(&self, channel: Channel, after: Duration, on_expiry: F)
    where
        F: FnOnce(&mut HandlerContext<'_>) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if channel.execute(on_expiry).is_err() {
                trace!("{} gone before negotiation timer fired", channel);
            }
        });
        if let Some(previous) = self.pending.lock().replace(task) {
            previous.abort();
        }
    }

    /// Make the timer inert; returns whether it was still armed
    pub(crate) fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(task) => {
                // An expiry already queued on the channel sees the empty slot
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Claim an expiry; false if the timer was cancelled meanwhile
    pub(crate) fn claim_expiry(&self) -> bool {
        self.pending.lock().take().is_some()
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::pipeline::Pipeline;
    use crate::core::promise::Promise;
    use crate::traits::{NetconfError, TransportStream};
    use std::sync::Arc;
    use tokio::io::DuplexStream;
    use tokio::sync::mpsc;

    fn first_failure() -> NetconfError {
        NetconfError::Transport("connection reset".into())
    }

    fn idle_channel() -> (Channel, DuplexStream) {
        let (local, remote) = tokio::io::duplex(1024);
        let channel = Channel::spawn(TransportStream::new(local, "timer-peer"), Pipeline::new());
        (channel, remote)
    }

    /// Arm `timer` so every expiry reports whether it won the claim
    fn arm_reporting(
        timer: &Arc<NegotiationTimer>,
        channel: &Channel,
        after: Duration,
    ) -> mpsc::UnboundedReceiver<bool> {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::clone(timer);
        timer.arm(channel.clone(), after, move |_ctx| {
            let _ = tx.send(shared.claim_expiry());
        });
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_claimed_once() {
        let (channel, _remote) = idle_channel();
        let timer = Arc::new(NegotiationTimer::new());
        let mut expiries = arm_reporting(&timer, &channel, Duration::from_secs(1));
        assert!(timer.is_armed());

        assert_eq!(expiries.recv().await, Some(true));
        assert!(!timer.is_armed());
        assert!(!timer.cancel());
        assert!(!timer.claim_expiry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_expiry_stops_timer() {
        let (channel, _remote) = idle_channel();
        let timer = Arc::new(NegotiationTimer::new());
        let mut expiries = arm_reporting(&timer, &channel, Duration::from_secs(1));

        assert!(timer.cancel());
        assert!(!timer.cancel());
        tokio::time::sleep(Duration::from_secs(5)).await;
        // The aborted task dropped its sender without reporting
        assert_eq!(expiries.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_replaces_pending_expiry() {
        let (channel, _remote) = idle_channel();
        let timer = Arc::new(NegotiationTimer::new());
        let mut first = arm_reporting(&timer, &channel, Duration::from_secs(1));
        let mut second = arm_reporting(&timer, &channel, Duration::from_secs(2));

        assert_eq!(second.recv().await, Some(true));
        assert_eq!(first.recv().await, None);
    }

    #[tokio::test]
    async fn test_expiry_queued_behind_failure_does_nothing() {
        let (channel, _remote) = idle_channel();
        let timer = Arc::new(NegotiationTimer::new());
        let promise: Promise<()> = Promise::new();
        timer.arm(channel.clone(), Duration::from_secs(60), |_ctx| {});

        // The failure runs on the context first and cancels the timer
        let (timer_a, promise_a) = (Arc::clone(&timer), promise.clone());
        channel
            .execute(move |_ctx| {
                assert!(timer_a.cancel());
                promise_a.try_failure(first_failure());
            })
            .unwrap();

        // The expiry was already queued when the timer was cancelled
        let (claimed_tx, claimed_rx) = tokio::sync::oneshot::channel();
        let (timer_b, promise_b) = (Arc::clone(&timer), promise.clone());
        channel
            .execute(move |_ctx| {
                let claimed = timer_b.claim_expiry();
                if claimed {
                    promise_b.try_failure(NetconfError::NegotiationTimeout(Duration::from_secs(60)));
                }
                let _ = claimed_tx.send(claimed);
            })
            .unwrap();

        assert!(!claimed_rx.await.unwrap());
        assert!(!timer.is_armed());
        assert_eq!(promise.result(), Some(Err(first_failure())));
    }
}
