//! Single-flight refresh coordination for authorization failures.
//!
//! [`RefreshCoordinator`] turns any number of concurrent, refresh-eligible 401s into exactly
//! one call to the refresh endpoint. The first caller to reach an idle coordinator becomes the
//! owner of the flight and drives the refresh; every caller arriving while the flight is in
//! the air is queued behind it. When the refresh settles the credentials are updated (or
//! cleared) first, and only then is the queue drained in arrival order, so no replay can race
//! the refresh call. Tokens from a refresh that settles after the session was logged out or
//! replaced are never written back.

pub(crate) mod exchange;

mod stats;

pub use stats::RefreshMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	error::RefreshError,
	session::{CompareAndSwapOutcome, CredentialStore},
};

type RefreshOutcome = Result<TokenSecret, RefreshError>;

#[derive(Debug)]
enum RefreshState {
	Idle,
	Refreshing { waiters: VecDeque<oneshot::Sender<Handoff>> },
}

/// Message delivered to a queued caller.
#[derive(Debug)]
enum Handoff {
	/// The flight settled with this outcome.
	Settled(RefreshOutcome),
	/// The owner went away; the receiver now drives the flight.
	Drive,
}

enum Ticket {
	Replay(TokenSecret),
	Owner,
	Waiter(oneshot::Receiver<Handoff>),
}

/// Owns the `Idle`/`Refreshing` state machine and its waiter queue.
///
/// The state sits behind a synchronous mutex that is never held across an `.await`; the
/// critical sections are "join or start a flight", "hand the flight on", and "drain the queue
/// and go idle".
///
/// Cancelling the caller that drives a flight does not fail the others: the oldest live waiter
/// takes the flight over and refreshes with its own refresh call.
pub struct RefreshCoordinator {
	state: Mutex<RefreshState>,
	credentials: Arc<CredentialStore>,
	timeout: Duration,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator updating `credentials` and bounding each refresh by `timeout`.
	pub fn new(credentials: Arc<CredentialStore>, timeout: Duration) -> Self {
		Self {
			state: Mutex::new(RefreshState::Idle),
			credentials,
			timeout,
			metrics: Default::default(),
		}
	}

	/// Returns `true` while a refresh is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(*self.state.lock(), RefreshState::Refreshing { .. })
	}

	/// Number of callers queued behind the in-flight refresh, its owner excluded.
	pub fn pending_waiters(&self) -> usize {
		match &*self.state.lock() {
			RefreshState::Idle => 0,
			RefreshState::Refreshing { waiters } => waiters.len(),
		}
	}

	/// Counters describing refresh activity so far.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Waits for a usable access token after an authorization failure.
	///
	/// `stale` is the access token the failed attempt carried. `refresh` performs the actual
	/// refresh call and only runs when this caller ends up driving the flight; waiters share
	/// the owner's outcome. Callers are resolved in arrival order.
	pub async fn acquire<F, Fut>(
		&self,
		stale: Option<&TokenSecret>,
		refresh: F,
	) -> Result<TokenSecret, RefreshError>
	where
		F: FnOnce(TokenSecret) -> Fut,
		Fut: Future<Output = Result<TokenPair, RefreshError>>,
	{
		match self.enqueue(stale) {
			Ticket::Replay(token) => {
				tracing::debug!("access token already rotated; replaying without refresh");

				self.metrics.record_replay();

				Ok(token)
			},
			Ticket::Owner => self.drive(refresh).await,
			Ticket::Waiter(rx) => {
				tracing::debug!("refresh in flight; queued behind it");

				self.metrics.record_queued();

				let mut slot = Slot { coordinator: self, rx };

				match (&mut slot.rx).await {
					Ok(Handoff::Settled(outcome)) => outcome,
					Ok(Handoff::Drive) => {
						tracing::debug!("took over the refresh from a departed owner");

						self.drive(refresh).await
					},
					Err(_) => Err(RefreshError::Abandoned),
				}
			},
		}
	}

	fn enqueue(&self, stale: Option<&TokenSecret>) -> Ticket {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing { waiters } = &mut *state {
			let (tx, rx) = oneshot::channel();

			waiters.push_back(tx);

			return Ticket::Waiter(rx);
		}
		// Credentials only change before the queue drains, so under the state lock an idle
		// coordinator sees the result of every completed refresh.
		if let Some(current) = self.credentials.access_token()
			&& Some(&current) != stale
		{
			return Ticket::Replay(current);
		}

		*state = RefreshState::Refreshing { waiters: VecDeque::new() };

		Ticket::Owner
	}

	async fn drive<F, Fut>(&self, refresh: F) -> RefreshOutcome
	where
		F: FnOnce(TokenSecret) -> Fut,
		Fut: Future<Output = Result<TokenPair, RefreshError>>,
	{
		let flight = Flight { coordinator: self, settled: false };

		tracing::info!("access token rejected; refreshing session");

		self.metrics.record_attempt();

		let outcome = match self.credentials.get().refresh_token {
			Some(used) => self.refresh_with(used, refresh).await,
			None => {
				self.metrics.record_failure();

				if let Err(e) = self.credentials.clear().await {
					tracing::warn!(error = %e, "credential removal could not be persisted");
				}

				Err(RefreshError::MissingRefreshToken)
			},
		};

		flight.settle(outcome.clone());

		outcome
	}

	async fn refresh_with<F, Fut>(&self, used: TokenSecret, refresh: F) -> RefreshOutcome
	where
		F: FnOnce(TokenSecret) -> Fut,
		Fut: Future<Output = Result<TokenPair, RefreshError>>,
	{
		let result = match tokio::time::timeout(self.timeout, refresh(used.clone())).await {
			Ok(result) => result,
			Err(_) => Err(RefreshError::TimedOut { after: self.timeout }),
		};

		match result {
			Ok(pair) => {
				let access = pair.access_token.clone();

				match self.credentials.compare_and_swap_refresh(&used, pair).await {
					Ok(CompareAndSwapOutcome::Updated) => {},
					Ok(CompareAndSwapOutcome::RefreshMismatch) => {
						self.metrics.record_failure();

						return self.superseded();
					},
					Err(e) => {
						tracing::warn!(error = %e, "refreshed tokens could not be persisted");
					},
				}

				self.metrics.record_success();

				Ok(access)
			},
			Err(e) => {
				tracing::warn!(error = %e, "session refresh failed; ending session");

				self.metrics.record_failure();

				if let Err(store_err) = self.credentials.clear_if_refresh(&used).await {
					tracing::warn!(error = %store_err, "credential removal could not be persisted");
				}

				Err(e)
			},
		}
	}

	/// Outcome for a successful refresh whose session was logged out or replaced meanwhile.
	fn superseded(&self) -> RefreshOutcome {
		match self.credentials.access_token() {
			Some(current) => {
				tracing::info!("session replaced during refresh; discarding refreshed tokens");

				Ok(current)
			},
			None => {
				tracing::info!("session ended during refresh; discarding refreshed tokens");

				Err(RefreshError::SessionEnded)
			},
		}
	}

	fn settle(&self, outcome: RefreshOutcome) {
		let waiters = match std::mem::replace(&mut *self.state.lock(), RefreshState::Idle) {
			RefreshState::Refreshing { waiters } => waiters,
			RefreshState::Idle => VecDeque::new(),
		};

		tracing::debug!(waiters = waiters.len(), success = outcome.is_ok(), "refresh settled");

		for tx in waiters {
			// A receiver is only gone when its caller was dropped; nothing to resume.
			let _ = tx.send(Handoff::Settled(outcome.clone()));
		}
	}

	/// Passes the flight to the oldest waiter still listening, or goes idle if none is left.
	fn hand_off(&self) {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing { waiters } = &mut *state {
			while let Some(tx) = waiters.pop_front() {
				if tx.send(Handoff::Drive).is_ok() {
					tracing::warn!("refresh owner dropped; next waiter takes over");

					return;
				}
			}
		}

		tracing::warn!("refresh owner dropped with no waiters left");

		*state = RefreshState::Idle;
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &self.is_refreshing())
			.field("pending_waiters", &self.pending_waiters())
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Hands the flight on if the owner is dropped before the refresh settles.
struct Flight<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl Flight<'_> {
	fn settle(mut self, outcome: RefreshOutcome) {
		self.settled = true;
		self.coordinator.settle(outcome);
	}
}
impl Drop for Flight<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.hand_off();
		}
	}
}

/// A queued caller's receiver. A takeover delivered after the caller was dropped is passed on.
struct Slot<'a> {
	coordinator: &'a RefreshCoordinator,
	rx: oneshot::Receiver<Handoff>,
}
impl Drop for Slot<'_> {
	fn drop(&mut self) {
		if let Ok(Handoff::Drive) = self.rx.try_recv() {
			self.coordinator.hand_off();
		}
	}
}
