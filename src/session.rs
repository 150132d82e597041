//! Credential store: the session's tokens in memory, mirrored to persistent storage.

pub mod events;

pub use events::{SessionEvents, SubscriptionId};

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenPair, TokenSecret},
	store::{ACCESS_TOKEN_KEY, MemoryStore, REFRESH_TOKEN_KEY, StoreError, TokenStorage},
};

/// Result of [`CredentialStore::compare_and_swap_refresh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareAndSwapOutcome {
	/// The refresh token matched and both tokens were replaced.
	Updated,
	/// The session no longer holds the expected refresh token; nothing was written.
	RefreshMismatch,
}

/// Owns the current [`Credentials`] and the only code paths that mutate them.
///
/// Reads are served from memory. Mutations update memory first and then storage, serialized by
/// an async guard so a concurrent [`set`](CredentialStore::set) and
/// [`clear`](CredentialStore::clear) cannot leave the two disagreeing.
pub struct CredentialStore {
	current: RwLock<Credentials>,
	storage: Arc<dyn TokenStorage>,
	events: SessionEvents,
	write_guard: AsyncMutex<()>,
}
impl CredentialStore {
	/// Restores credentials persisted in `storage`.
	///
	/// Empty stored values are treated as absent.
	pub async fn load(storage: Arc<dyn TokenStorage>) -> Result<Self, StoreError> {
		let access_token = storage.get(ACCESS_TOKEN_KEY).await?;
		let refresh_token = storage.get(REFRESH_TOKEN_KEY).await?;
		let credentials = Credentials {
			access_token: access_token.filter(|v| !v.is_empty()).map(TokenSecret::new),
			refresh_token: refresh_token.filter(|v| !v.is_empty()).map(TokenSecret::new),
		};

		tracing::debug!(
			has_access_token = credentials.access_token.is_some(),
			has_refresh_token = credentials.refresh_token.is_some(),
			"restored session credentials"
		);

		Ok(Self::with_storage(storage, credentials))
	}

	/// Empty store backed by a fresh [`MemoryStore`].
	pub fn ephemeral() -> Self {
		Self::with_storage(Arc::new(MemoryStore::default()), Credentials::default())
	}

	fn with_storage(storage: Arc<dyn TokenStorage>, credentials: Credentials) -> Self {
		Self {
			current: RwLock::new(credentials),
			storage,
			events: SessionEvents::default(),
			write_guard: AsyncMutex::new(()),
		}
	}

	/// Snapshot of the current credentials.
	pub fn get(&self) -> Credentials {
		self.current.read().clone()
	}

	/// Current access token, if any.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.current.read().access_token.clone()
	}

	/// Returns `true` when a refresh token is available.
	pub fn has_refresh_token(&self) -> bool {
		self.current.read().has_refresh_token()
	}

	/// Observer registry for the logout notification.
	pub fn events(&self) -> &SessionEvents {
		&self.events
	}

	/// Replaces both tokens and persists them.
	///
	/// The in-memory value is updated even when persistence fails; the error is still returned so
	/// callers can decide whether a non-durable session is acceptable.
	pub async fn set(&self, pair: TokenPair) -> Result<(), StoreError> {
		let _guard = self.write_guard.lock().await;

		self.replace_locked(pair).await
	}

	/// Replaces both tokens only if the session still holds `expected` as its refresh token.
	///
	/// A session that was cleared or replaced after `expected` was read is left untouched.
	pub async fn compare_and_swap_refresh(
		&self,
		expected: &TokenSecret,
		pair: TokenPair,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		let _guard = self.write_guard.lock().await;

		if !self.holds_refresh_token(expected) {
			return Ok(CompareAndSwapOutcome::RefreshMismatch);
		}

		self.replace_locked(pair).await?;

		Ok(CompareAndSwapOutcome::Updated)
	}

	/// Clears both tokens and removes them from storage.
	///
	/// Idempotent. Returns `true` when this call ended a session, in which case every
	/// registered observer has been notified exactly once.
	pub async fn clear(&self) -> Result<bool, StoreError> {
		let guard = self.write_guard.lock().await;

		self.clear_locked(guard).await
	}

	/// Clears the session only if it still holds `expected` as its refresh token.
	///
	/// Returns `true` when this call ended a session.
	pub async fn clear_if_refresh(&self, expected: &TokenSecret) -> Result<bool, StoreError> {
		let guard = self.write_guard.lock().await;

		if !self.holds_refresh_token(expected) {
			return Ok(false);
		}

		self.clear_locked(guard).await
	}

	fn holds_refresh_token(&self, expected: &TokenSecret) -> bool {
		self.current.read().refresh_token.as_ref() == Some(expected)
	}

	async fn replace_locked(&self, pair: TokenPair) -> Result<(), StoreError> {
		let access = pair.access_token.expose().to_owned();
		let refresh = pair.refresh_token.expose().to_owned();

		*self.current.write() = pair.into();

		// Refresh token first: a partial write must never leave a spent refresh token on disk.
		self.persist(REFRESH_TOKEN_KEY, refresh).await?;
		self.persist(ACCESS_TOKEN_KEY, access).await
	}

	async fn persist(&self, key: &'static str, value: String) -> Result<(), StoreError> {
		self.storage.set(key, value).await.inspect_err(|e| {
			tracing::warn!(key, error = %e, "credential could not be persisted");
		})
	}

	async fn clear_locked(&self, guard: AsyncMutexGuard<'_, ()>) -> Result<bool, StoreError> {
		let ended = {
			let mut current = self.current.write();
			let ended = !current.is_empty();

			*current = Credentials::default();

			ended
		};
		let access = self.storage.remove(ACCESS_TOKEN_KEY).await;
		let refresh = self.storage.remove(REFRESH_TOKEN_KEY).await;

		drop(guard);

		if ended {
			tracing::info!("session ended; credentials cleared");

			self.events.emit_session_ended();
		}

		access.and(refresh).map(|_| ended)
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore")
			.field("current", &*self.current.read())
			.field("events", &self.events)
			.finish()
	}
}
