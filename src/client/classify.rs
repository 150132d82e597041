//! Failure classifier deciding which errors enter refresh coordination.

// self
use crate::{_prelude::*, request::ApiRequest};

/// Verdict on a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Eligibility {
	/// 401 on a first attempt with a refresh token available.
	Eligible,
	/// Anything other than a 401 response.
	NotUnauthorized,
	/// The descriptor was already replayed once.
	AlreadyRetried,
	/// There is no refresh token to refresh with.
	NoRefreshToken,
}
impl Eligibility {
	/// Returns `true` for [`Eligibility::Eligible`].
	pub const fn is_eligible(self) -> bool {
		matches!(self, Self::Eligible)
	}

	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Eligible => "eligible",
			Self::NotUnauthorized => "not_unauthorized",
			Self::AlreadyRetried => "already_retried",
			Self::NoRefreshToken => "no_refresh_token",
		}
	}
}
impl Display for Eligibility {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Classifies a failed attempt of `request`.
pub fn classify(error: &Error, request: &ApiRequest, has_refresh_token: bool) -> Eligibility {
	if !error.is_unauthorized() {
		Eligibility::NotUnauthorized
	} else if request.is_retried() {
		Eligibility::AlreadyRetried
	} else if !has_refresh_token {
		Eligibility::NoRefreshToken
	} else {
		Eligibility::Eligible
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::{HeaderMap, StatusCode};
	// self
	use super::*;
	use crate::error::{StatusError, TransportError};

	fn status(code: StatusCode) -> Error {
		StatusError { status: code, headers: HeaderMap::new(), body: Vec::new() }.into()
	}

	#[test]
	fn only_first_attempt_401_with_refresh_token_is_eligible() {
		let fresh = ApiRequest::get("me");
		let replayed = ApiRequest::get("me").into_retried();
		let unauthorized = status(StatusCode::UNAUTHORIZED);

		assert_eq!(classify(&unauthorized, &fresh, true), Eligibility::Eligible);
		assert_eq!(classify(&unauthorized, &replayed, true), Eligibility::AlreadyRetried);
		assert_eq!(classify(&unauthorized, &fresh, false), Eligibility::NoRefreshToken);
	}

	#[test]
	fn other_failures_are_never_eligible() {
		let request = ApiRequest::get("me");
		let network = Error::from(TransportError::Io(std::io::Error::other("reset")));

		assert_eq!(
			classify(&status(StatusCode::FORBIDDEN), &request, true),
			Eligibility::NotUnauthorized
		);
		assert_eq!(
			classify(&status(StatusCode::INTERNAL_SERVER_ERROR), &request, true),
			Eligibility::NotUnauthorized
		);
		assert_eq!(classify(&network, &request, true), Eligibility::NotUnauthorized);
	}
}
