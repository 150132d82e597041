//! Access/refresh token pairs held by the session.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Snapshot of the session's current tokens.
///
/// Either field may be absent: a fresh install has neither, and a session restored from
/// storage can legitimately carry only one of them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
	/// Short-lived token attached to outgoing requests.
	pub access_token: Option<TokenSecret>,
	/// Longer-lived token exchanged for a new pair at `/auth/refresh`.
	pub refresh_token: Option<TokenSecret>,
}
impl Credentials {
	/// Builds credentials carrying both tokens.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: Some(TokenSecret::new(access_token)),
			refresh_token: Some(TokenSecret::new(refresh_token)),
		}
	}

	/// Returns `true` when neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	/// Returns `true` when a refresh token is available.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.is_some()
	}
}
impl From<TokenPair> for Credentials {
	fn from(pair: TokenPair) -> Self {
		Self { access_token: Some(pair.access_token), refresh_token: Some(pair.refresh_token) }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Token pair issued by a login or a successful refresh.
///
/// Matches the refresh endpoint's response body (`accessToken`, `refreshToken`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token; the previous one must not be reused.
	pub refresh_token: TokenSecret,
}
impl TokenPair {
	/// Builds a pair from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenPair(<redacted>)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_pair_reads_camel_case_body() {
		let pair: TokenPair =
			serde_json::from_str("{\"accessToken\":\"T2\",\"refreshToken\":\"R2\"}")
				.expect("Refresh body fixture should deserialize.");
		let credentials = Credentials::from(pair);

		assert_eq!(credentials.access_token.as_ref().map(TokenSecret::expose), Some("T2"));
		assert_eq!(credentials.refresh_token.as_ref().map(TokenSecret::expose), Some("R2"));
	}

	#[test]
	fn debug_output_never_leaks_tokens() {
		let credentials = Credentials::new("access-secret", "refresh-secret");
		let rendered = format!("{credentials:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
		assert!(Credentials::default().is_empty());
		assert!(credentials.has_refresh_token());
	}
}
