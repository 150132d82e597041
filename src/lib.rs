//! Authenticated API client for the pledge crowdfunding service: bearer tokens on every call,
//! single-flight session refresh, and transparent replay of requests rejected with 401.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod obs;
pub mod refresh;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
	// self
	use crate::{
		auth::Credentials,
		client::ApiClient,
		config::ClientConfig,
		error::TransportError,
		session::CredentialStore,
		store::{ACCESS_TOKEN_KEY, MemoryStore, REFRESH_TOKEN_KEY},
		transport::{ApiResponse, ApiTransport, OutboundRequest, TransportFuture},
	};

	/// Base URL used by [`test_config`].
	pub const TEST_BASE_URL: &str = "https://api.pledge.test/";

	/// Canned outcome produced by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct Reply {
		delay: Duration,
		outcome: Result<ApiResponse, String>,
	}
	impl Reply {
		/// Wraps a prepared response.
		pub fn new(response: ApiResponse) -> Self {
			Self { delay: Duration::ZERO, outcome: Ok(response) }
		}

		/// Empty-bodied response with the given status.
		pub fn status(status: u16) -> Self {
			Self::new(ApiResponse::new(Self::status_code(status), Vec::new()))
		}

		/// JSON response with the given status.
		pub fn json(status: u16, body: serde_json::Value) -> Self {
			let mut response = ApiResponse::new(Self::status_code(status), body.to_string());

			response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

			Self::new(response)
		}

		/// Transport failure with no response.
		pub fn network_error(message: impl Into<String>) -> Self {
			Self { delay: Duration::ZERO, outcome: Err(message.into()) }
		}

		/// Delays the outcome.
		pub fn after(mut self, delay: Duration) -> Self {
			self.delay = delay;

			self
		}

		fn status_code(status: u16) -> StatusCode {
			StatusCode::from_u16(status).expect("Test fixtures should use valid status codes.")
		}
	}

	type ReplyFn = dyn Fn(&OutboundRequest) -> Reply + Send + Sync;

	/// In-process [`ApiTransport`] answering from a closure and recording every request.
	pub struct ScriptedTransport {
		handler: Box<ReplyFn>,
		calls: Mutex<Vec<OutboundRequest>>,
	}
	impl ScriptedTransport {
		/// Builds a transport that answers each request with `handler(request)`.
		pub fn new<F>(handler: F) -> Self
		where
			F: 'static + Fn(&OutboundRequest) -> Reply + Send + Sync,
		{
			Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()) }
		}

		/// Every request received so far, in arrival order.
		pub fn calls(&self) -> Vec<OutboundRequest> {
			self.calls.lock().clone()
		}
	}
	impl ApiTransport for ScriptedTransport {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
			let reply = (self.handler)(&request);

			self.calls.lock().push(request);

			Box::pin(async move {
				if !reply.delay.is_zero() {
					tokio::time::sleep(reply.delay).await;
				}

				reply.outcome.map_err(|message| TransportError::Io(std::io::Error::other(message)))
			})
		}
	}

	/// Configuration pointing at [`TEST_BASE_URL`] with default refresh settings.
	pub fn test_config() -> ClientConfig {
		ClientConfig::builder(TEST_BASE_URL).build().expect("Test configuration should build.")
	}

	/// Builds a client over `transport`, seeding a [`MemoryStore`] with `credentials`.
	pub async fn build_scripted_client(
		transport: ScriptedTransport,
		credentials: Credentials,
	) -> (ApiClient<ScriptedTransport>, Arc<ScriptedTransport>, Arc<MemoryStore>) {
		let mut entries = Vec::new();

		if let Some(token) = &credentials.access_token {
			entries.push((ACCESS_TOKEN_KEY, token.expose().to_owned()));
		}
		if let Some(token) = &credentials.refresh_token {
			entries.push((REFRESH_TOKEN_KEY, token.expose().to_owned()));
		}

		let storage = Arc::new(MemoryStore::with_entries(entries));
		let store = CredentialStore::load(storage.clone())
			.await
			.expect("Memory-backed credentials should load.");
		let transport = Arc::new(transport);
		let client = ApiClient::with_transport(test_config(), Arc::new(store), transport.clone());

		(client, transport, storage)
	}
}

mod _prelude {
	pub use std::{
		borrow::Cow,
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use {http, url};
#[cfg(test)] use {color_eyre as _, httpmock as _};
