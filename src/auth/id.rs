//! Strongly typed principal identifier used to key stored credentials.

// std
use std::{borrow::Borrow, ops::Deref, str::FromStr};
// self
use crate::_prelude::*;

const PRINCIPAL_MAX_LEN: usize = 128;

/// Error returned when principal validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum PrincipalIdError {
	/// The identifier was empty.
	#[error("Principal identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Principal identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Principal identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Identity on whose behalf the offline credential is held.
///
/// The same value doubles as the OAuth client identifier when the courier refreshes
/// tokens, so it is validated once at the boundary and trusted everywhere else.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);
impl PrincipalId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, PrincipalIdError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for PrincipalId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for PrincipalId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for PrincipalId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<PrincipalId> for String {
	fn from(value: PrincipalId) -> Self {
		value.0
	}
}
impl TryFrom<String> for PrincipalId {
	type Error = PrincipalIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for PrincipalId {
	type Err = PrincipalIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for PrincipalId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Principal({})", self.0)
	}
}
impl Display for PrincipalId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate_view(view: &str) -> Result<(), PrincipalIdError> {
	if view.is_empty() {
		return Err(PrincipalIdError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(PrincipalIdError::ContainsWhitespace);
	}
	if view.len() > PRINCIPAL_MAX_LEN {
		return Err(PrincipalIdError::TooLong { max: PRINCIPAL_MAX_LEN });
	}

	Ok(())
}
