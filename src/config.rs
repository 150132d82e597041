//! Client configuration: API base URL, refresh endpoint, and refresh timeout.

pub mod builder;

pub use builder::ClientConfigBuilder;

// crates.io
use http::HeaderMap;
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable holding the API base URL.
pub const ENV_BASE_URL: &str = "PLEDGE_API_BASE_URL";
/// Environment variable overriding the refresh endpoint path.
pub const ENV_REFRESH_PATH: &str = "PLEDGE_API_REFRESH_PATH";
/// Environment variable overriding the refresh timeout, in milliseconds.
pub const ENV_REFRESH_TIMEOUT_MS: &str = "PLEDGE_API_REFRESH_TIMEOUT_MS";

/// Validated client configuration.
///
/// Build one with [`ClientConfig::builder`] or [`ClientConfig::from_env`]. The base URL always
/// ends with `/` so relative request targets resolve beneath it.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// API root every relative request target is resolved against.
	pub base_url: Url,
	/// Fully resolved refresh endpoint.
	pub refresh_url: Url,
	/// Upper bound on a single refresh call.
	pub refresh_timeout: Duration,
	/// Headers applied to every request before its own headers.
	pub default_headers: HeaderMap,
}
impl ClientConfig {
	/// Refresh endpoint path used when none is configured.
	pub const DEFAULT_REFRESH_PATH: &'static str = "auth/refresh";
	/// Refresh timeout used when none is configured.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

	/// Starts a builder for the provided base URL.
	pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Reads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads configuration through an arbitrary key lookup (used by [`ClientConfig::from_env`]).
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let base_url = lookup(ENV_BASE_URL).ok_or(ConfigError::MissingEnv { key: ENV_BASE_URL })?;
		let mut builder = Self::builder(base_url);

		if let Some(path) = lookup(ENV_REFRESH_PATH) {
			builder = builder.refresh_path(path);
		}
		if let Some(raw) = lookup(ENV_REFRESH_TIMEOUT_MS) {
			let millis = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
				key: ENV_REFRESH_TIMEOUT_MS,
				value: raw.clone(),
			})?;

			builder = builder.refresh_timeout(Duration::from_millis(millis));
		}

		builder.build()
	}

	/// Resolves a request target against the base URL.
	///
	/// Absolute `http(s)` URLs pass through untouched; anything else is treated as a path below
	/// the base URL, with leading slashes ignored.
	pub fn resolve(&self, target: &str) -> Result<Url, ConfigError> {
		if let Ok(url) = Url::parse(target)
			&& matches!(url.scheme(), "http" | "https")
		{
			return Ok(url);
		}

		self.base_url.join(target.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidTarget { target: target.to_owned(), source }
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
		move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_owned())
	}

	#[test]
	fn resolve_joins_relative_targets_below_base_path() {
		let config = ClientConfig::builder("https://api.example.org/v1")
			.build()
			.expect("Config fixture should build.");

		assert_eq!(
			config.resolve("/campaigns/42").expect("Target should resolve.").as_str(),
			"https://api.example.org/v1/campaigns/42"
		);
		assert_eq!(
			config.resolve("https://cdn.example.org/a.png").expect("Target should resolve.").as_str(),
			"https://cdn.example.org/a.png"
		);
		assert_eq!(config.refresh_url.as_str(), "https://api.example.org/v1/auth/refresh");
	}

	#[test]
	fn from_lookup_reads_overrides() {
		let config = ClientConfig::from_lookup(lookup(&[
			(ENV_BASE_URL, "http://localhost:3000/"),
			(ENV_REFRESH_PATH, "/session/refresh"),
			(ENV_REFRESH_TIMEOUT_MS, "2500"),
		]))
		.expect("Environment fixture should produce a config.");

		assert_eq!(config.refresh_url.as_str(), "http://localhost:3000/session/refresh");
		assert_eq!(config.refresh_timeout, Duration::from_millis(2500));
	}

	#[test]
	fn from_lookup_rejects_missing_or_bad_values() {
		let err = ClientConfig::from_lookup(lookup(&[]))
			.expect_err("Missing base URL should be rejected.");

		assert!(matches!(err, ConfigError::MissingEnv { key: ENV_BASE_URL }));

		let err = ClientConfig::from_lookup(lookup(&[
			(ENV_BASE_URL, "http://localhost:3000"),
			(ENV_REFRESH_TIMEOUT_MS, "soon"),
		]))
		.expect_err("Non-numeric timeouts should be rejected.");

		assert!(matches!(err, ConfigError::InvalidEnv { key: ENV_REFRESH_TIMEOUT_MS, .. }));
	}
}
