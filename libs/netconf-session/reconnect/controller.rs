//! Reconnect controller
//!
//! Drives connect + negotiate attempts against one peer. Between failed
//! attempts it sleeps for whatever the [`BackoffCalculator`] decides; after
//! a session is established it waits for that session's channel to close
//! and starts over. Only one attempt or backoff computation is ever in
//! flight per controller.

use super::backoff::{connect_timeout, BackoffCalculator, BackoffDecision, BackoffState};
use crate::core::config::ReconnectConfig;
use crate::core::dispatcher::ClientDispatcher;
use crate::core::promise::Promise;
use crate::core::session::Session;
use crate::traits::{NetconfError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct ControllerInner {
    dispatcher: ClientDispatcher,
    config: ReconnectConfig,
    first_session: Promise<Session>,
    reconnect: Promise<()>,
    attempts: AtomicU64,
    cancelled: watch::Sender<bool>,
    in_flight: Mutex<Option<Promise<Session>>>,
    session: Mutex<Option<Session>>,
}

/// Handle to a running reconnect loop
#[derive(Clone)]
pub struct ReconnectController {
    inner: Arc<ControllerInner>,
}

impl ReconnectController {
    /// Validate `config` and start connecting in the background
    pub fn start(dispatcher: ClientDispatcher, config: ReconnectConfig) -> Result<Self> {
        let calculator = BackoffCalculator::from_config(&config, Instant::now())?;
        let (cancelled, _) = watch::channel(false);
        let inner = Arc::new(ControllerInner {
            dispatcher,
            config,
            first_session: Promise::new(),
            reconnect: Promise::new(),
            attempts: AtomicU64::new(0),
            cancelled,
            in_flight: Mutex::new(None),
            session: Mutex::new(None),
        });

        info!("[Reconnect] Starting reconnect loop to {}", inner.dispatcher.peer());
        tokio::spawn(Arc::clone(&inner).run(calculator));
        Ok(Self { inner })
    }

    /// Resolves with the first session established, at most once
    pub fn first_session(&self) -> Promise<Session> {
        self.inner.first_session.clone()
    }

    /// Fails once the controller gives up or is cancelled; never succeeds
    pub fn reconnect_future(&self) -> Promise<()> {
        self.inner.reconnect.clone()
    }

    /// Retries computed since the last successful session
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::Acquire)
    }

    /// The currently established session, if any
    pub fn current_session(&self) -> Option<Session> {
        self.inner.session.lock().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.borrow()
    }

    /// Stop reconnecting
    ///
    /// Cancels the attempt in flight and the first-session handle, and
    /// closes the established session. Terminal.
    pub fn cancel(&self) {
        if self.inner.cancelled.send_replace(true) {
            return;
        }
        info!("[Reconnect] Cancelling reconnect loop to {}", self.inner.dispatcher.peer());

        let attempt = self.inner.in_flight.lock().take();
        if let Some(attempt) = attempt {
            attempt.cancel();
        }
        self.inner.first_session.cancel();
        self.inner.reconnect.cancel();
        let session = self.inner.session.lock().take();
        if let Some(session) = session {
            session.close();
        }
    }
}

impl ControllerInner {
    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the controller is cancelled
    async fn cancellation(&self) {
        let mut rx = self.cancelled.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    async fn run(self: Arc<Self>, mut calculator: BackoffCalculator) {
        let peer = self.dispatcher.peer();
        let mut backoff = BackoffState::new();

        loop {
            if self.is_cancelled() {
                break;
            }

            let timeout = match connect_timeout(
                self.config.connect_timeout,
                calculator.deadline(),
                Instant::now(),
            ) {
                Ok(timeout) => timeout,
                Err(cause) => {
                    self.give_up(cause);
                    break;
                }
            };

            debug!("[Reconnect] Connecting to {} (timeout {:?})", peer, timeout);
            let attempt = self.dispatcher.create_client(timeout);
            *self.in_flight.lock() = Some(attempt.clone());
            // cancel() may have run before the attempt was published
            if self.is_cancelled() {
                attempt.cancel();
            }
            let outcome = attempt.future().await;
            self.in_flight.lock().take();

            match outcome {
                Ok(session) => {
                    backoff.reset();
                    self.attempts.store(0, Ordering::Release);
                    info!("[Reconnect] Established {} with {}", session, peer);

                    if !self.hold(session).await {
                        break;
                    }
                    info!("[Reconnect] Session to {} went down, reconnecting", peer);
                    calculator.restart(Instant::now());
                }
                Err(cause) => {
                    if self.is_cancelled() {
                        break;
                    }
                    debug!("[Reconnect] Attempt to {} failed: {}", peer, cause);
                }
            }

            match calculator.next_delay(&mut backoff, Instant::now()) {
                BackoffDecision::Retry(delay) => {
                    self.attempts.store(backoff.attempts(), Ordering::Release);
                    info!(
                        "[Reconnect] Attempt {} to {} in {:?}",
                        backoff.attempts(),
                        peer,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancellation() => break,
                    }
                }
                BackoffDecision::GiveUp(cause) => {
                    self.give_up(cause);
                    break;
                }
            }
        }

        debug!("[Reconnect] Reconnect loop to {} finished", peer);
    }

    /// Keep the session until its channel closes; false if cancelled
    async fn hold(&self, session: Session) -> bool {
        *self.session.lock() = Some(session.clone());
        self.first_session.try_success(session.clone());

        if self.is_cancelled() {
            session.close();
            return false;
        }

        tokio::select! {
            _ = session.channel().closed() => {}
            _ = self.cancellation() => {}
        }
        self.session.lock().take();

        if self.is_cancelled() {
            session.close();
            return false;
        }
        true
    }

    fn give_up(&self, cause: NetconfError) {
        warn!("[Reconnect] Giving up on {}: {}", self.dispatcher.peer(), cause);
        self.first_session.try_failure(cause.clone());
        self.reconnect.try_failure(cause);
    }
}
