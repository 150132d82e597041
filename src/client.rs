//! Authenticated API client with transparent 401 recovery.

pub mod classify;

pub(crate) mod pipeline;

pub use classify::{Eligibility, classify};

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenPair, TokenSecret},
	config::ClientConfig,
	obs::{self, CallKind, CallOutcome, CallSpan},
	refresh::{RefreshCoordinator, RefreshMetrics, exchange},
	request::ApiRequest,
	session::{CredentialStore, SubscriptionId},
	transport::{ApiResponse, ApiTransport},
};
#[cfg(feature = "reqwest")]
use crate::{store::TokenStorage, transport::ReqwestTransport};

/// API client that attaches the session's bearer token to every call and recovers from
/// expired access tokens on its own.
///
/// A call answered with 401 is classified; if it is eligible, the client waits on the shared
/// [`RefreshCoordinator`] and replays the call exactly once with the new token. Callers see
/// either the replay's outcome or the refresh failure, never the intermediate 401.
///
/// Clones share the transport, credentials, and refresh state.
pub struct ApiClient<T = DefaultTransport>
where
	T: ?Sized + ApiTransport,
{
	config: Arc<ClientConfig>,
	transport: Arc<T>,
	credentials: Arc<CredentialStore>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client over a caller-provided transport and credential store.
	pub fn with_transport(
		config: ClientConfig,
		credentials: Arc<CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let coordinator =
			Arc::new(RefreshCoordinator::new(credentials.clone(), config.refresh_timeout));

		Self { config: Arc::new(config), transport: transport.into(), credentials, coordinator }
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Snapshot of the current credentials.
	pub fn credentials(&self) -> Credentials {
		self.credentials.get()
	}

	/// Shared credential store.
	pub fn credential_store(&self) -> &Arc<CredentialStore> {
		&self.credentials
	}

	/// Shared refresh coordinator.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.coordinator.metrics()
	}

	/// Registers a callback fired once each time the session ends.
	pub fn on_session_ended<F>(&self, callback: F) -> SubscriptionId
	where
		F: 'static + Fn() + Send + Sync,
	{
		self.credentials.events().subscribe(callback)
	}

	/// Removes a callback registered with [`ApiClient::on_session_ended`].
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.credentials.events().unsubscribe(id)
	}

	/// Stores the token pair obtained from an explicit login.
	pub async fn login(
		&self,
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Result<()> {
		self.credentials.set(TokenPair::new(access_token, refresh_token)).await?;

		Ok(())
	}

	/// Ends the session. Returns `true` if there was a session to end.
	pub async fn logout(&self) -> Result<bool> {
		Ok(self.credentials.clear().await?)
	}

	/// `GET target`.
	pub async fn get(&self, target: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::get(target)).await
	}

	/// `POST target` with a JSON body.
	pub async fn post_json<B>(&self, target: impl Into<String>, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::post(target).json(body)?).await
	}

	/// `PUT target` with a JSON body.
	pub async fn put_json<B>(&self, target: impl Into<String>, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::put(target).json(body)?).await
	}

	/// `DELETE target`.
	pub async fn delete(&self, target: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::delete(target)).await
	}

	/// Sends `request`, refreshing the session and replaying once on an eligible 401.
	///
	/// Non-2xx responses surface as [`Error::Status`]. Ineligible failures, including a 401 on
	/// the replay itself, are returned exactly as the transport produced them.
	pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		let token = self.credentials.access_token();
		let error = match self.attempt(CallKind::Request, &request, token.as_ref()).await {
			Ok(response) => return Ok(response),
			Err(e) => e,
		};
		let eligibility = classify(&error, &request, self.credentials.has_refresh_token());

		if !eligibility.is_eligible() {
			if error.is_unauthorized() {
				tracing::debug!(
					reason = eligibility.as_str(),
					"authorization failure returned without refresh"
				);
			}

			return Err(error);
		}

		let fresh = self
			.coordinator
			.acquire(token.as_ref(), |refresh_token| {
				exchange::exchange(&*self.transport, &self.config, refresh_token)
			})
			.await?;

		request.mark_retried();

		self.attempt(CallKind::Retry, &request, Some(&fresh)).await
	}

	async fn attempt(
		&self,
		kind: CallKind,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let span = CallSpan::new(kind, "attempt");

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let outbound = pipeline::prepare(&self.config, request, token)?;
				let response = self.transport.execute(outbound).await?;

				Ok(response.into_result()?)
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Restores the session from `storage` and builds a reqwest-backed client.
	pub async fn connect(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Self> {
		let credentials = Arc::new(CredentialStore::load(storage).await?);

		Ok(Self::with_transport(config, credentials, ReqwestTransport::build()?))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			credentials: self.credentials.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("credentials", &self.credentials.get())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

#[cfg(feature = "reqwest")]
/// Transport used when none is named.
pub type DefaultTransport = ReqwestTransport;
#[cfg(not(feature = "reqwest"))]
/// Transport used when none is named.
pub type DefaultTransport = dyn ApiTransport;
