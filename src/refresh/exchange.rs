//! The `POST /auth/refresh` call.

// crates.io
use http::{HeaderValue, Method, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	config::ClientConfig,
	error::RefreshError,
	obs::{self, CallKind, CallOutcome, CallSpan},
	transport::{ApiTransport, OutboundRequest},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
	refresh_token: &'a str,
}

/// Exchanges `refresh_token` for a new pair at the configured refresh endpoint.
///
/// The call bypasses the outbound pipeline: it never carries an `Authorization` header and a
/// failure here is never itself refreshed. Anything but a 2xx carrying two non-empty tokens is
/// a [`RefreshError`].
pub(crate) async fn exchange<T>(
	transport: &T,
	config: &ClientConfig,
	refresh_token: TokenSecret,
) -> Result<TokenPair, RefreshError>
where
	T: ?Sized + ApiTransport,
{
	const KIND: CallKind = CallKind::Refresh;

	let span = CallSpan::new(KIND, "exchange");

	obs::record_call_outcome(KIND, CallOutcome::Attempt);

	let result = span
		.instrument(async move {
			let body = serde_json::to_vec(&RefreshBody { refresh_token: refresh_token.expose() })
				.map_err(|e| RefreshError::Malformed {
					message: format!("refresh request could not be encoded: {e}"),
				})?;
			let mut headers = config.default_headers.clone();

			headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

			let response = transport
				.execute(OutboundRequest {
					method: Method::POST,
					url: config.refresh_url.clone(),
					headers,
					body: Some(body),
				})
				.await?;

			if !response.is_success() {
				return Err(RefreshError::Rejected { status: response.status.as_u16() });
			}

			let mut deserializer = serde_json::Deserializer::from_slice(&response.body);
			let pair: TokenPair = serde_path_to_error::deserialize(&mut deserializer)
				.map_err(|e| RefreshError::Malformed { message: e.to_string() })?;

			if pair.access_token.is_blank() || pair.refresh_token.is_blank() {
				return Err(RefreshError::Malformed { message: "empty token in response".into() });
			}

			Ok(pair)
		})
		.await;

	match &result {
		Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
		Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
	}

	result
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::StatusCode;
	// self
	use super::*;
	use crate::{_preludet::*, transport::ApiResponse};

	async fn run(reply: Reply) -> (Result<TokenPair, RefreshError>, Vec<OutboundRequest>) {
		let transport = ScriptedTransport::new(move |_| reply.clone());
		let result = exchange(&transport, &test_config(), TokenSecret::new("R1")).await;

		(result, transport.calls())
	}

	#[tokio::test]
	async fn posts_refresh_token_without_authorization() {
		let (result, calls) = run(Reply::json(200, serde_json::json!({
			"accessToken": "T2",
			"refreshToken": "R2",
		})))
		.await;
		let pair = result.expect("Well-formed refresh response should succeed.");

		assert_eq!(pair, TokenPair::new("T2", "R2"));
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].method, Method::POST);
		assert_eq!(calls[0].url.path(), "/auth/refresh");
		assert_eq!(calls[0].bearer_token(), None);
		assert_eq!(calls[0].body.as_deref(), Some(&br#"{"refreshToken":"R1"}"#[..]));
	}

	#[tokio::test]
	async fn non_success_status_is_rejected() {
		let (result, _) = run(Reply::status(401)).await;

		assert!(matches!(result, Err(RefreshError::Rejected { status: 401 })));
	}

	#[tokio::test]
	async fn wrong_shape_is_malformed() {
		let (result, _) = run(Reply::json(200, serde_json::json!({ "token": "T2" }))).await;

		assert!(matches!(result, Err(RefreshError::Malformed { .. })));

		let (result, _) = run(Reply::json(200, serde_json::json!({
			"accessToken": "",
			"refreshToken": "R2",
		})))
		.await;

		assert!(matches!(result, Err(RefreshError::Malformed { .. })));

		let (result, _) = run(Reply::new(ApiResponse::new(StatusCode::OK, "<html>"))).await;

		assert!(matches!(result, Err(RefreshError::Malformed { .. })));
	}

	#[tokio::test]
	async fn network_failure_is_transport() {
		let (result, _) = run(Reply::network_error("connection reset")).await;

		assert!(matches!(result, Err(RefreshError::Transport { .. })));
	}
}
