//! Courier-level error types shared across the credential, admission, and batch layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical courier error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential-store failure.
	#[error(transparent)]
	Storage(#[from] crate::store::StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token refresh failed; the triggering call fails and no re-authentication is attempted.
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	/// Batch execution failed at the transport or service level.
	#[error(transparent)]
	Network(#[from] NetworkError),

	/// A single admission request asked for calls the window can never admit.
	///
	/// Raised immediately without blocking; asking for capacity the window can never
	/// free up is a programming error, not a transient condition.
	#[error("Admission request for {requested} calls cannot fit under the configured quota of {quota}.")]
	QuotaExceeded {
		/// Number of calls the caller asked to admit.
		requested: u64,
		/// Configured window quota.
		quota: u64,
	},
}

/// Configuration failures raised while wiring the courier. Fatal; never retried.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required environment variable is absent.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Name of the missing variable.
		name: &'static str,
	},
	/// An environment variable is present but unparseable.
	#[error("Environment variable `{name}` is invalid: {message}.")]
	InvalidEnv {
		/// Name of the offending variable.
		name: &'static str,
		/// Human-readable parse failure.
		message: String,
	},
	/// The store holds no credential for the configured principal.
	///
	/// The courier runs unattended, so there is no interactive consent fallback; a
	/// credential must be provisioned out of band before startup.
	#[error("No stored credential was found for principal `{principal}`.")]
	NoStoredCredential {
		/// Principal the lookup was performed for.
		principal: String,
	},
	/// An endpoint URL could not be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The principal identifier failed validation.
	#[error("Principal identifier is invalid.")]
	InvalidPrincipal(#[from] crate::auth::PrincipalIdError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Token refresh failures surfaced by the credential manager.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The token endpoint rejected the refresh grant.
	#[error("Token endpoint rejected the refresh (status {status}): {reason}.")]
	Rejected {
		/// HTTP status code returned by the endpoint.
		status: u16,
		/// Provider-supplied reason string, when one was given.
		reason: String,
	},
	/// The refresh request never produced a usable response.
	#[error("Network error occurred while calling the token endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The token endpoint responded with JSON the courier could not parse.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl RefreshError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}

/// Batch execution failures propagated synchronously from `drain()`.
#[derive(Debug, ThisError)]
pub enum NetworkError {
	/// The underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the batch endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The batch endpoint answered with a non-success status.
	#[error("Batch endpoint returned HTTP status {status}.")]
	Status {
		/// HTTP status code returned by the endpoint.
		status: u16,
	},
	/// The batch reply body could not be parsed.
	#[error("Batch endpoint returned a malformed reply body.")]
	MalformedReply {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The service returned a different number of sub-replies than sub-requests sent.
	#[error("Batch reply count {received} does not match the {expected} requests sent.")]
	ReplyCountMismatch {
		/// Number of sub-requests in the chunk.
		expected: usize,
		/// Number of sub-replies received.
		received: usize,
	},
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}
impl From<reqwest::Error> for NetworkError {
	fn from(e: reqwest::Error) -> Self {
		Self::transport(e)
	}
}
