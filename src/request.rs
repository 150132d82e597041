//! Request descriptors forwarded to the API.

// crates.io
use http::{
	HeaderMap, HeaderValue, Method,
	header::{CONTENT_TYPE, HeaderName},
};
// self
use crate::_prelude::*;

/// One logical API call: method, target, headers, and body.
///
/// The client treats the descriptor as opaque apart from the private `retried` flag, which
/// records whether the call has already been replayed after a token refresh. It flips to `true`
/// at most once and is never reset, so a call can never be replayed twice.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL, or an absolute `http(s)` URL.
	pub target: String,
	/// Query pairs appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Request headers. An `Authorization` header is overwritten when a token is attached.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	retried: bool,
}
impl ApiRequest {
	/// Creates a descriptor with no headers, query, or body.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self {
			method,
			target: target.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: None,
			retried: false,
		}
	}

	/// `GET` descriptor.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// `POST` descriptor.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// `PUT` descriptor.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// `DELETE` descriptor.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Appends a query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets (or replaces) a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, value: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value).map_err(|source| Error::Encode { source })?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(body);

		Ok(self)
	}

	/// Returns `true` once the descriptor has been replayed after a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Flags the descriptor as replayed.
	pub(crate) fn mark_retried(&mut self) {
		debug_assert!(!self.retried, "A descriptor is replayed at most once.");

		self.retried = true;
	}

	/// Test hook for building descriptors that already went through a replay.
	#[cfg(any(test, feature = "test"))]
	pub fn into_retried(mut self) -> Self {
		self.retried = true;

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retried_flag_flips_on_replay() {
		let mut request = ApiRequest::get("campaigns");

		assert!(!request.is_retried());

		request.mark_retried();

		assert!(request.is_retried());
		assert!(request.clone().is_retried());
	}

	#[test]
	#[should_panic(expected = "replayed at most once")]
	#[cfg(debug_assertions)]
	fn second_replay_is_a_bug() {
		let mut request = ApiRequest::get("campaigns").into_retried();

		request.mark_retried();
	}

	#[test]
	fn json_body_sets_content_type() {
		let request = ApiRequest::post("donations")
			.json(&serde_json::json!({ "amount": 25 }))
			.expect("JSON fixture should encode.");

		assert_eq!(request.body.as_deref(), Some(&br#"{"amount":25}"#[..]));
		assert_eq!(
			request.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some("application/json")
		);
	}
}
