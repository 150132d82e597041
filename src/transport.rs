//! Transport primitives for API calls.
//!
//! The client's only dependency on an HTTP stack is [`ApiTransport`]. The outbound pipeline
//! hands it fully prepared [`OutboundRequest`]s (URL resolved, headers applied, token attached)
//! and receives an [`ApiResponse`] for every response the server produced, whatever its
//! status. Status interpretation happens above the transport so custom transports (test
//! doubles, proxies, retry layers) only have to move bytes.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use http::{HeaderMap, Method, StatusCode, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{StatusError, TransportError},
};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing prepared API requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// clone of the client, and must return `Ok` for any response the server produced, including
/// 4xx/5xx. `Err` is reserved for failures where no response exists.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and collects the full response.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// A request as it goes on the wire.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Fully resolved URL, query included.
	pub url: Url,
	/// Final header set.
	pub headers: HeaderMap,
	/// Raw body.
	pub body: Option<Vec<u8>>,
}
impl OutboundRequest {
	/// Token carried in the `Authorization: Bearer` header, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
	}
}

/// Fully buffered API response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Builds a response with the provided status and body and no headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Lossy UTF-8 view of the body.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::Decode { source })
	}

	/// Splits non-2xx responses off as [`StatusError`]s.
	pub(crate) fn into_result(self) -> Result<Self, StatusError> {
		if self.is_success() {
			Ok(self)
		} else {
			Err(StatusError { status: self.status, headers: self.headers, body: self.body })
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a transport from reqwest's default client configuration.
	pub fn build() -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let OutboundRequest { method, url, headers, body } = request;
			let mut builder = self.0.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::HeaderValue;
	// self
	use super::*;

	#[test]
	fn non_success_responses_split_into_status_errors() {
		let ok = ApiResponse::new(StatusCode::OK, "{}").into_result();

		assert!(ok.is_ok());

		let err = ApiResponse::new(StatusCode::UNAUTHORIZED, "expired")
			.into_result()
			.expect_err("401 should become a status error.");

		assert_eq!(err.status, StatusCode::UNAUTHORIZED);
		assert_eq!(err.body_text(), "expired");
	}

	#[test]
	fn json_decode_reports_path() {
		#[derive(Debug, Deserialize)]
		struct Campaign {
			#[allow(dead_code)]
			goal: u64,
		}

		let response = ApiResponse::new(StatusCode::OK, r#"{"goal":"lots"}"#);
		let err = response.json::<Campaign>().expect_err("String goal should fail to decode.");

		match err {
			Error::Decode { source } => assert_eq!(source.path().to_string(), "goal"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn bearer_token_reads_authorization_header() {
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer T1"));

		let request = OutboundRequest {
			method: Method::GET,
			url: Url::parse("https://api.example.org/me").expect("Fixture URL should parse."),
			headers,
			body: None,
		};

		assert_eq!(request.bearer_token(), Some("T1"));
	}
}
