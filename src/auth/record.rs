//! Stored credential model and its refresh lifecycle helpers.

// self
use crate::{
	_prelude::*,
	auth::{id::PrincipalId, secret::TokenSecret},
};

/// Offline OAuth credential persisted per principal.
///
/// Mutated only through [`CredentialRecord::refreshed`], which preserves the refresh
/// token across refreshes unless the provider response explicitly rotates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Principal the credential was issued to.
	pub principal: PrincipalId,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Long-lived refresh token secret.
	pub refresh_token: TokenSecret,
	/// Expiry instant of the access token.
	pub expires_at: OffsetDateTime,
}
impl CredentialRecord {
	/// Builds a record from its raw parts.
	pub fn new(
		principal: PrincipalId,
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			principal,
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			expires_at,
		}
	}

	/// Returns `true` if the access token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` if the access token expires within `margin` of the provided instant.
	pub fn expires_within(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		instant + margin >= self.expires_at
	}

	/// Produces the record that results from a successful token refresh.
	///
	/// The refresh token carries over unchanged unless the provider rotated it.
	pub fn refreshed(
		&self,
		access_token: impl Into<String>,
		expires_at: OffsetDateTime,
		rotated_refresh: Option<String>,
	) -> Self {
		Self {
			principal: self.principal.clone(),
			access_token: TokenSecret::new(access_token),
			refresh_token: rotated_refresh
				.map(TokenSecret::new)
				.unwrap_or_else(|| self.refresh_token.clone()),
			expires_at,
		}
	}
}
