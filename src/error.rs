//! Client-level error types shared across the pipeline, the refresh coordinator, and stores.

// crates.io
use http::{HeaderMap, StatusCode};
// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The API answered with a non-success status.
	#[error(transparent)]
	Status(#[from] StatusError),
	/// The session could not be refreshed after an authorization failure.
	#[error(transparent)]
	Refresh(#[from] RefreshError),

	/// Response body did not match the expected JSON shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded.")]
	Encode {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
}
impl Error {
	/// HTTP status carried by a [`Error::Status`] failure.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Status(e) => Some(e.status),
			_ => None,
		}
	}

	/// Returns `true` for a `401 Unauthorized` response.
	pub fn is_unauthorized(&self) -> bool {
		self.status() == Some(StatusCode::UNAUTHORIZED)
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http or https.
	#[error("Base URL scheme `{scheme}` is not supported.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Base URL cannot have paths joined onto it (e.g. `mailto:`).
	#[error("Base URL cannot be used as a base for request targets.")]
	CannotBeABase,
	/// Request target cannot be resolved against the base URL.
	#[error("Request target `{target}` is invalid.")]
	InvalidTarget {
		/// Target as supplied by the caller.
		target: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},

	/// Access token contains characters that cannot be sent in a header.
	#[error("Access token cannot be encoded as an Authorization header.")]
	InvalidAccessToken,
	/// Refresh timeout must be positive.
	#[error("Refresh timeout must be greater than zero.")]
	ZeroRefreshTimeout,
	/// Required environment variable is not set.
	#[error("Environment variable `{key}` is not set.")]
	MissingEnv {
		/// Variable name.
		key: &'static str,
	},
	/// Environment variable holds a value that cannot be parsed.
	#[error("Environment variable `{key}` holds an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		key: &'static str,
		/// Raw value.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Non-success HTTP response, returned to callers unchanged.
#[derive(Clone, Debug, ThisError)]
#[error("API responded with status {status}.")]
pub struct StatusError {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl StatusError {
	/// Lossy UTF-8 view of the body, for error messages.
	pub fn body_text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}
}

/// Outcome shared by every request waiting on a failed refresh.
///
/// Cloned once per waiter, so sources are reference counted.
#[derive(Clone, Debug, ThisError)]
pub enum RefreshError {
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the session with status {status}.")]
	Rejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
	},
	/// Refresh endpoint answered 2xx with an unusable body.
	#[error("Refresh endpoint returned a malformed body: {message}.")]
	Malformed {
		/// Parser or validation message.
		message: String,
	},
	/// Refresh call failed before a response arrived.
	#[error("Network error occurred while calling the refresh endpoint.")]
	Transport {
		/// Transport failure.
		#[source]
		source: Arc<TransportError>,
	},
	/// Refresh call did not settle in time.
	#[error("Refresh call did not settle within {after:?}.")]
	TimedOut {
		/// Configured timeout.
		after: Duration,
	},
	/// Session has nothing to refresh with.
	#[error("Session has no refresh token.")]
	MissingRefreshToken,
	/// The session was logged out while the refresh was in flight; its tokens were discarded.
	#[error("Session ended while the refresh was in flight.")]
	SessionEnded,
	/// The flight went away without delivering an outcome.
	#[error("Refresh was abandoned before it settled.")]
	Abandoned,
}
impl From<TransportError> for RefreshError {
	fn from(e: TransportError) -> Self {
		Self::Transport { source: Arc::new(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_helpers_expose_unauthorized() {
		let err = Error::from(StatusError {
			status: StatusCode::UNAUTHORIZED,
			headers: HeaderMap::new(),
			body: b"expired".to_vec(),
		});

		assert!(err.is_unauthorized());
		assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

		let err = Error::from(RefreshError::MissingRefreshToken);

		assert!(!err.is_unauthorized());
		assert_eq!(err.status(), None);
	}
}
