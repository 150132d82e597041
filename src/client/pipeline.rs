//! Outbound pipeline: turns a descriptor into a wire request and attaches the bearer token.

// crates.io
use http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	error::ConfigError,
	request::ApiRequest,
	transport::OutboundRequest,
};

/// Prepares one attempt of `request`.
///
/// Default headers are applied first and the descriptor's own headers override them. When a
/// token is supplied it replaces any `Authorization` header the caller set; without one the
/// request goes out unmodified.
pub(crate) fn prepare(
	config: &ClientConfig,
	request: &ApiRequest,
	token: Option<&TokenSecret>,
) -> Result<OutboundRequest, ConfigError> {
	let mut url = config.resolve(&request.target)?;

	if !request.query.is_empty() {
		url.query_pairs_mut().extend_pairs(request.query.iter());
	}

	let mut headers = config.default_headers.clone();

	headers.extend(request.headers.clone());

	if let Some(token) = token {
		headers.insert(AUTHORIZATION, bearer(token)?);
	}

	Ok(OutboundRequest { method: request.method.clone(), url, headers, body: request.body.clone() })
}

fn bearer(token: &TokenSecret) -> Result<HeaderValue, ConfigError> {
	let mut value = HeaderValue::try_from(format!("Bearer {}", token.expose()))
		.map_err(|_| ConfigError::InvalidAccessToken)?;

	value.set_sensitive(true);

	Ok(value)
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::header::{ACCEPT, HeaderName};
	// self
	use super::*;
	use crate::_preludet::test_config;

	#[test]
	fn attaches_bearer_token_over_caller_header() {
		let request = ApiRequest::get("/campaigns")
			.query("page", "2")
			.header(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
		let token = TokenSecret::new("T1");
		let outbound = prepare(&test_config(), &request, Some(&token))
			.expect("Descriptor fixture should prepare.");

		assert_eq!(outbound.url.as_str(), "https://api.pledge.test/campaigns?page=2");
		assert_eq!(outbound.bearer_token(), Some("T1"));
		assert!(outbound.headers.get(AUTHORIZATION).is_some_and(HeaderValue::is_sensitive));
	}

	#[test]
	fn forwards_unmodified_without_token() {
		let request = ApiRequest::get("campaigns")
			.header(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"))
			.header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"));
		let outbound =
			prepare(&test_config(), &request, None).expect("Descriptor fixture should prepare.");

		assert_eq!(
			outbound.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Basic Zm9v")
		);
		assert_eq!(outbound.headers.get("x-trace").and_then(|v| v.to_str().ok()), Some("abc"));
		assert_eq!(
			outbound.headers.get(ACCEPT).and_then(|v| v.to_str().ok()),
			Some("application/json")
		);
	}

	#[test]
	fn rejects_tokens_that_cannot_be_headers() {
		let token = TokenSecret::new("bad\ntoken");
		let err = prepare(&test_config(), &ApiRequest::get("me"), Some(&token))
			.expect_err("Control characters cannot be sent in a header.");

		assert!(matches!(err, ConfigError::InvalidAccessToken));
	}
}
