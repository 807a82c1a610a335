//! Immutable credential record, validity helpers, and the exchange response model.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Lifetime assumed when the exchange endpoint omits `expiresIn`.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::hours(1);

/// Lifecycle status of a credential relative to the refresh margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Remaining lifetime exceeds the refresh margin.
	Valid,
	/// Not yet expired but inside the refresh margin; must not be used for new requests.
	StaleSoon,
	/// Past the expiry instant.
	Expired,
}

/// Bearer credential obtained from the exchange endpoint.
///
/// Records are never mutated in place; a refresh produces a new value that replaces the
/// old one wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
	/// Bearer token attached to backend requests.
	pub token: TokenSecret,
	/// Absolute expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Instant the exchange completed.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Identity token this credential was exchanged for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub identity_token: Option<TokenSecret>,
	/// Public identifier returned by the exchange, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub public_id: Option<String>,
	/// Whether the backend already holds a profile for this identity, if reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub has_profile: Option<bool>,
}
impl Credential {
	/// Creates a credential with no provenance data.
	pub fn new(
		token: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			token: TokenSecret::new(token),
			expires_at,
			issued_at,
			identity_token: None,
			public_id: None,
			has_profile: None,
		}
	}

	/// Attaches the identity token the credential was exchanged for.
	pub fn with_identity_token(mut self, identity_token: impl Into<String>) -> Self {
		self.identity_token = Some(TokenSecret::new(identity_token));

		self
	}

	/// Builds a credential from an exchange response received at `issued_at`.
	pub fn from_exchange(
		response: ExchangeResponse,
		identity_token: &str,
		issued_at: OffsetDateTime,
	) -> Result<Self, ClassifiedError> {
		let token = response
			.token
			.filter(|token| !token.trim().is_empty())
			.ok_or_else(|| ClassifiedError::authentication("Exchange response is missing a token."))?;
		let expires_in = match response.expires_in {
			Some(secs) if secs > 0 => Duration::seconds(secs),
			Some(_) =>
				return Err(ClassifiedError::authentication(
					"Exchange response carried a non-positive expiresIn.",
				)),
			None => DEFAULT_EXPIRES_IN,
		};

		Ok(Self {
			token: TokenSecret::new(token),
			expires_at: issued_at + expires_in,
			issued_at,
			identity_token: Some(TokenSecret::new(identity_token)),
			public_id: response.public_id,
			has_profile: response.has_profile,
		})
	}

	/// Computes the status at `now` for the provided refresh margin.
	pub fn status_at(&self, now: OffsetDateTime, margin: Duration) -> CredentialStatus {
		if now >= self.expires_at {
			return CredentialStatus::Expired;
		}
		if now + margin < self.expires_at {
			return CredentialStatus::Valid;
		}

		CredentialStatus::StaleSoon
	}

	/// Returns `true` when `now + margin` is strictly before the expiry instant.
	pub fn is_valid_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		matches!(self.status_at(now, margin), CredentialStatus::Valid)
	}

	/// Remaining lifetime at `now` (negative once expired).
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("issued_at", &self.issued_at)
			.field("identity_token", &self.identity_token.as_ref().map(|_| "<redacted>"))
			.field("public_id", &self.public_id)
			.field("has_profile", &self.has_profile)
			.finish()
	}
}

/// Body returned by the exchange endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
	/// Bearer token; absence is an authentication failure.
	#[serde(default)]
	pub token: Option<String>,
	/// Lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Public identifier for the session's user.
	#[serde(default)]
	pub public_id: Option<String>,
	/// Whether a profile already exists.
	#[serde(default)]
	pub has_profile: Option<bool>,
}
