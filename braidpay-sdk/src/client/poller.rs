//! Payment status poller.
//!
//! Reconciles the browser session with a payment that is confirmed out of
//! band (provider webhook → host backend).  After [`register_payment`] the
//! poller repeatedly asks the host verification endpoint whether the payment
//! for `(paymentLinkID, email)` has completed, and publishes every answer
//! through a [`StatusWatcher`].
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──register_payment(valid)──► Polling ──success && !isPending──► Resolved
//!   │                                  │
//!   └─register_payment(invalid)─► Failed ◄──network / http / parse error
//! ```
//!
//! Each polling session is one spawned task holding its own interval timer.
//! Ticks are serialized: the next request is only sent after the previous
//! one returned.  Status lives in a `watch` channel tagged with the session
//! generation, and a task may only publish while its generation is current,
//! so nothing from a cancelled session can land after [`cancel`] returns.
//!
//! [`register_payment`]: PaymentPoller::register_payment
//! [`cancel`]: PaymentPoller::cancel

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::status::{StatusClient, StatusSource};
use super::ClientError;
use crate::email::is_valid_email;
use crate::objects::{PaymentStatus, StatusCheckRequest, StatusCheckResponse};

/// Default delay between two status checks.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(5000);

/// Default path of the host verification endpoint.
pub const DEFAULT_VERIFICATION_ENDPOINT: &str = "/api/check-payment-status";

/// Callback fired once when a session observes a completed payment.
pub type CompletionHook = Arc<dyn Fn(&PaymentStatus) + Send + Sync>;

/// Errors returned by [`PaymentPoller`] operations.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("Invalid email format")]
    InvalidEmailFormat,
    #[error("no active polling session")]
    NotPolling,
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Logical state of the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollerState {
    /// No registration.
    Idle,
    /// Registered and waiting for a terminal status.
    Polling,
    /// A completed payment was observed; polling stopped.
    Resolved,
    /// Registration was rejected or a check failed; polling stopped.
    Failed,
}

/// Options for a [`PaymentPoller`].
#[derive(Clone)]
pub struct PollerOptions {
    pub payment_link_id: String,
    pub polling_interval: Duration,
    /// Send a `{"action": "register"}` call before polling starts.
    pub registration_call: bool,
    pub on_payment_complete: Option<CompletionHook>,
}

impl PollerOptions {
    pub fn new(payment_link_id: impl Into<String>) -> Self {
        Self {
            payment_link_id: payment_link_id.into(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            registration_call: false,
            on_payment_complete: None,
        }
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn with_registration_call(mut self, enabled: bool) -> Self {
        self.registration_call = enabled;
        self
    }

    pub fn on_payment_complete(
        mut self,
        hook: impl Fn(&PaymentStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_payment_complete = Some(Arc::new(hook));
        self
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    generation: u64,
    state: PollerState,
    status: PaymentStatus,
}

/// Receives status updates published by a [`PaymentPoller`].
pub struct StatusWatcher {
    rx: watch::Receiver<Snapshot>,
}

impl StatusWatcher {
    /// Wait until a new status is published.
    ///
    /// Returns `Err` once the poller has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// Wait until the poller reaches `state`, returning the status at that
    /// point.
    pub async fn wait_for_state(
        &mut self,
        state: PollerState,
    ) -> Result<PaymentStatus, watch::error::RecvError> {
        let snapshot = self.rx.wait_for(|s| s.state == state).await?;
        Ok(snapshot.status.clone())
    }

    pub fn status(&self) -> PaymentStatus {
        self.rx.borrow().status.clone()
    }

    pub fn state(&self) -> PollerState {
        self.rx.borrow().state
    }
}

enum Publish {
    Continue,
    Stop(PaymentStatus),
    Stale,
}

/// Everything one polling session needs, detached from the poller so it
/// can move into the spawned task.
struct Session<S> {
    source: Arc<S>,
    request: StatusCheckRequest,
    generation: u64,
    interval: Duration,
    status_tx: Arc<watch::Sender<Snapshot>>,
    on_complete: Option<CompletionHook>,
}

impl<S: StatusSource> Session<S> {
    /// Publish the outcome of one check if this session is still current.
    fn publish(&self, outcome: Result<StatusCheckResponse, ClientError>) -> Publish {
        let (status, next_state) = match outcome {
            Ok(response) => {
                let status = PaymentStatus::from_response(response);
                let next = if status.is_complete() {
                    PollerState::Resolved
                } else {
                    PollerState::Polling
                };
                (status, next)
            }
            Err(e) => {
                warn!(
                    payment_link_id = %self.request.payment_link_id,
                    error = %e,
                    "Payment status check failed, polling stopped"
                );
                (PaymentStatus::failed(e.to_string()), PollerState::Failed)
            }
        };

        let generation = self.generation;
        let published = self.status_tx.send_if_modified(|snapshot| {
            if snapshot.generation != generation || snapshot.state != PollerState::Polling {
                return false;
            }
            snapshot.status = status.clone();
            snapshot.state = next_state;
            true
        });

        if !published {
            debug!(generation, "Discarding status from a stale polling session");
            return Publish::Stale;
        }

        match next_state {
            PollerState::Polling => Publish::Continue,
            PollerState::Resolved => {
                info!(
                    payment_link_id = %self.request.payment_link_id,
                    "Payment completed"
                );
                if let Some(hook) = &self.on_complete {
                    hook(&status);
                }
                Publish::Stop(status)
            }
            _ => Publish::Stop(status),
        }
    }

    async fn check_once(&self) -> Publish {
        let outcome = self.source.check(&self.request).await;
        self.publish(outcome)
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            match self.check_once().await {
                Publish::Continue => continue,
                Publish::Stop(_) | Publish::Stale => break,
            }
        }

        debug!(generation = self.generation, "Polling session finished");
    }
}

struct Registration {
    request: StatusCheckRequest,
    handle: JoinHandle<()>,
}

/// Polls a host verification endpoint until a registered payment completes.
///
/// Dropping the poller tears down any active session.
pub struct PaymentPoller<S> {
    source: Arc<S>,
    options: PollerOptions,
    status_tx: Arc<watch::Sender<Snapshot>>,
    generation: u64,
    registration: Option<Registration>,
}

impl PaymentPoller<StatusClient> {
    /// Poller backed by the HTTP [`StatusClient`].
    pub fn http(client: StatusClient, options: PollerOptions) -> Self {
        Self::new(Arc::new(client), options)
    }
}

impl<S: StatusSource> PaymentPoller<S> {
    pub fn new(source: Arc<S>, options: PollerOptions) -> Self {
        let (status_tx, _) = watch::channel(Snapshot {
            generation: 0,
            state: PollerState::Idle,
            status: PaymentStatus::default(),
        });
        Self {
            source,
            options,
            status_tx: Arc::new(status_tx),
            generation: 0,
            registration: None,
        }
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> StatusWatcher {
        StatusWatcher {
            rx: self.status_tx.subscribe(),
        }
    }

    pub fn status(&self) -> PaymentStatus {
        self.status_tx.borrow().status.clone()
    }

    pub fn state(&self) -> PollerState {
        self.status_tx.borrow().state
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollerState::Polling
    }

    /// Email being polled for. `None` once the session resolved, failed or
    /// was cancelled.
    pub fn email(&self) -> Option<&str> {
        if !self.is_polling() {
            return None;
        }
        self.registration.as_ref().map(|r| r.request.email.as_str())
    }

    /// Register a payment attempt for `email` and start polling.
    ///
    /// An invalid email publishes `"Invalid email format"` and leaves the
    /// poller in [`PollerState::Failed`] without starting a timer.  Any
    /// previous session is cancelled first.
    pub async fn register_payment(&mut self, email: &str) -> Result<(), PollerError> {
        self.teardown();

        if !is_valid_email(email) {
            warn!("Rejected payment registration with invalid email");
            self.set_snapshot(
                PollerState::Failed,
                PaymentStatus::failed(PollerError::InvalidEmailFormat.to_string()),
            );
            return Err(PollerError::InvalidEmailFormat);
        }

        if self.options.registration_call {
            let request = StatusCheckRequest::register(&self.options.payment_link_id, email);
            if let Err(e) = self.source.check(&request).await {
                warn!(error = %e, "Payment registration call failed");
                self.set_snapshot(PollerState::Failed, PaymentStatus::failed(e.to_string()));
                return Err(e.into());
            }
        }

        let request = StatusCheckRequest::query(&self.options.payment_link_id, email);
        self.set_snapshot(PollerState::Polling, PaymentStatus::awaiting());

        let session = self.session(request.clone());
        let handle = tokio::spawn(session.run());
        self.registration = Some(Registration { request, handle });

        info!(
            payment_link_id = %self.options.payment_link_id,
            interval_ms = self.options.polling_interval.as_millis() as u64,
            "Payment registered, polling started"
        );
        Ok(())
    }

    /// Run one status check immediately, outside the timer.
    ///
    /// Follows the same publication and termination rules as a timer tick.
    pub async fn check_payment_status(&self) -> Result<PaymentStatus, PollerError> {
        let Some(registration) = &self.registration else {
            return Err(PollerError::NotPolling);
        };
        if self.state() != PollerState::Polling {
            return Err(PollerError::NotPolling);
        }

        let session = self.session(registration.request.clone());
        match session.check_once().await {
            Publish::Continue => Ok(self.status()),
            Publish::Stop(status) => {
                registration.handle.abort();
                Ok(status)
            }
            Publish::Stale => Err(PollerError::NotPolling),
        }
    }

    /// Stop polling and discard the registration.
    ///
    /// The last published status is kept; a resolved or failed state is left
    /// as is, an active session goes back to [`PollerState::Idle`].
    pub fn cancel(&mut self) {
        if self.registration.is_some() {
            info!(
                payment_link_id = %self.options.payment_link_id,
                "Polling cancelled"
            );
        }
        self.teardown();
    }

    fn session(&self, request: StatusCheckRequest) -> Session<S> {
        Session {
            source: Arc::clone(&self.source),
            request,
            generation: self.generation,
            interval: self.options.polling_interval,
            status_tx: Arc::clone(&self.status_tx),
            on_complete: self.options.on_payment_complete.clone(),
        }
    }

    fn set_snapshot(&self, state: PollerState, status: PaymentStatus) {
        let generation = self.generation;
        self.status_tx.send_modify(|snapshot| {
            snapshot.generation = generation;
            snapshot.state = state;
            snapshot.status = status;
        });
    }
}

impl<S> PaymentPoller<S> {
    /// Abort the running task and invalidate its generation.
    fn teardown(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.handle.abort();
        }
        self.generation += 1;
        let generation = self.generation;
        self.status_tx.send_if_modified(|snapshot| {
            snapshot.generation = generation;
            if snapshot.state == PollerState::Polling {
                snapshot.state = PollerState::Idle;
                return true;
            }
            false
        });
    }
}

impl<S> Drop for PaymentPoller<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
