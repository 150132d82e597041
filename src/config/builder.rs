//! Validating builder for [`ClientConfig`].

// crates.io
use http::{
	HeaderMap, HeaderValue,
	header::{ACCEPT, HeaderName},
};
// self
use crate::{_prelude::*, config::ClientConfig, error::ConfigError};

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Raw base URL, validated in [`ClientConfigBuilder::build`].
	pub base_url: String,
	/// Refresh endpoint path relative to the base URL.
	pub refresh_path: String,
	/// Upper bound on a single refresh call.
	pub refresh_timeout: Duration,
	/// Headers applied to every request.
	pub default_headers: HeaderMap,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the provided base URL.
	pub fn new(base_url: impl Into<String>) -> Self {
		let mut default_headers = HeaderMap::new();

		default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		Self {
			base_url: base_url.into(),
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
			default_headers,
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the refresh timeout.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Adds (or replaces) a default header.
	pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.default_headers.insert(name, value);

		self
	}

	/// Validates the builder and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut base_url = Url::parse(self.base_url.trim())
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { scheme: base_url.scheme().to_owned() });
		}
		if base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase);
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}
		if self.refresh_timeout.is_zero() {
			return Err(ConfigError::ZeroRefreshTimeout);
		}

		let refresh_target = self.refresh_path.trim_start_matches('/');
		let refresh_url = base_url.join(refresh_target).map_err(|source| {
			ConfigError::InvalidTarget { target: self.refresh_path.clone(), source }
		})?;

		Ok(ClientConfig {
			base_url,
			refresh_url,
			refresh_timeout: self.refresh_timeout,
			default_headers: self.default_headers,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn build_rejects_bad_base_urls() {
		let err = ClientConfig::builder("not a url").build().expect_err("Garbage should fail.");

		assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

		let err = ClientConfig::builder("ftp://files.example.org")
			.build()
			.expect_err("Non-HTTP schemes should fail.");

		assert!(matches!(err, ConfigError::UnsupportedScheme { ref scheme } if scheme == "ftp"));
	}

	#[test]
	fn build_rejects_zero_timeout() {
		let err = ClientConfig::builder("https://api.example.org")
			.refresh_timeout(Duration::ZERO)
			.build()
			.expect_err("Zero timeouts should fail.");

		assert!(matches!(err, ConfigError::ZeroRefreshTimeout));
	}

	#[test]
	fn build_normalizes_trailing_slash_and_defaults() {
		let config = ClientConfig::builder("https://api.example.org/v2")
			.build()
			.expect("Config fixture should build.");

		assert_eq!(config.base_url.as_str(), "https://api.example.org/v2/");
		assert_eq!(config.refresh_timeout, ClientConfig::DEFAULT_REFRESH_TIMEOUT);
		assert_eq!(
			config.default_headers.get(ACCEPT).and_then(|v| v.to_str().ok()),
			Some("application/json")
		);
	}
}
