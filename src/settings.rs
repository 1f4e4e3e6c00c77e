//! Environment-driven settings for the courier's principal, endpoints, and quotas.

// std
use std::{env, path::PathBuf, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, TokenSecret},
	batch::DEFAULT_MAX_CHUNK_SIZE,
	error::ConfigError,
	limit::DEFAULT_POLL_INTERVAL,
};

/// Environment variable naming the principal (doubles as the OAuth client id).
pub const ENV_PRINCIPAL: &str = "SHEETS_COURIER_PRINCIPAL";
/// Environment variable holding the OAuth client secret.
pub const ENV_SECRET: &str = "SHEETS_COURIER_SECRET";
/// Environment variable pointing at the credential store snapshot.
pub const ENV_STORE: &str = "SHEETS_COURIER_STORE";
/// Environment variable overriding the token endpoint URL.
pub const ENV_TOKEN_ENDPOINT: &str = "SHEETS_COURIER_TOKEN_ENDPOINT";
/// Environment variable overriding the batch endpoint URL.
pub const ENV_BATCH_ENDPOINT: &str = "SHEETS_COURIER_BATCH_ENDPOINT";
/// Environment variable overriding the window quota.
pub const ENV_QUOTA: &str = "SHEETS_COURIER_QUOTA";
/// Environment variable overriding the window length, in seconds.
pub const ENV_WINDOW_SECS: &str = "SHEETS_COURIER_WINDOW_SECS";

/// The service allows 1500 sub-requests per 100 seconds by default, and sub-requests
/// inside a batch each count individually.
pub const DEFAULT_QUOTA: u64 = 1_500;
/// Window length matching [`DEFAULT_QUOTA`].
pub const DEFAULT_WINDOW: StdDuration = StdDuration::from_secs(100);
/// Generous per-call timeout; batches can be large and slow to assemble server-side.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(15 * 60);

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_BATCH_ENDPOINT: &str = "https://sheets.googleapis.com/batch";

/// Everything the courier needs to wire itself: identity, endpoints, and quotas.
#[derive(Clone, Debug)]
pub struct Settings {
	/// Principal the stored credential belongs to; also the OAuth client id.
	pub principal: PrincipalId,
	/// OAuth client secret used for token refreshes.
	pub client_secret: TokenSecret,
	/// Path of the credential store snapshot.
	pub store_path: PathBuf,
	/// Token endpoint refreshes are POSTed to.
	pub token_endpoint: Url,
	/// Batch endpoint sub-requests are bundled against.
	pub batch_endpoint: Url,
	/// Sub-requests permitted per trailing window.
	pub quota: u64,
	/// Trailing window length.
	pub window: StdDuration,
	/// Maximum sub-requests bundled into one network batch.
	pub max_chunk_size: usize,
	/// Connect timeout applied per batch call, not per sub-request.
	pub connect_timeout: StdDuration,
	/// Read timeout applied per batch call, not per sub-request.
	pub read_timeout: StdDuration,
	/// Sleep interval used while an admission is blocked.
	pub poll_interval: StdDuration,
}
impl Settings {
	/// Builds settings with documented defaults for everything but the identity triple.
	pub fn new(
		principal: PrincipalId,
		client_secret: impl Into<String>,
		store_path: impl Into<PathBuf>,
	) -> Self {
		Self {
			principal,
			client_secret: TokenSecret::new(client_secret),
			store_path: store_path.into(),
			token_endpoint: Url::parse(DEFAULT_TOKEN_ENDPOINT)
				.expect("Default token endpoint is a valid URL."),
			batch_endpoint: Url::parse(DEFAULT_BATCH_ENDPOINT)
				.expect("Default batch endpoint is a valid URL."),
			quota: DEFAULT_QUOTA,
			window: DEFAULT_WINDOW,
			max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
			connect_timeout: DEFAULT_TIMEOUT,
			read_timeout: DEFAULT_TIMEOUT,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	/// Reads settings from the process environment.
	///
	/// `SHEETS_COURIER_PRINCIPAL`, `SHEETS_COURIER_SECRET`, and `SHEETS_COURIER_STORE`
	/// are required; the quota and window accept optional overrides.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Reads settings through an arbitrary lookup, primarily for tests.
	pub fn from_lookup(
		lookup: impl Fn(&'static str) -> Option<String>,
	) -> Result<Self, ConfigError> {
		let principal = PrincipalId::new(require(&lookup, ENV_PRINCIPAL)?)?;
		let secret = require(&lookup, ENV_SECRET)?;
		let store_path = require(&lookup, ENV_STORE)?;
		let mut settings = Self::new(principal, secret, store_path);

		if let Some(raw) = lookup(ENV_TOKEN_ENDPOINT) {
			settings.token_endpoint =
				Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { source })?;
		}
		if let Some(raw) = lookup(ENV_BATCH_ENDPOINT) {
			settings.batch_endpoint =
				Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { source })?;
		}
		if let Some(raw) = lookup(ENV_QUOTA) {
			settings.quota = raw.parse().map_err(|e| ConfigError::InvalidEnv {
				name: ENV_QUOTA,
				message: format!("{e}"),
			})?;
		}
		if let Some(raw) = lookup(ENV_WINDOW_SECS) {
			let secs: u64 = raw.parse().map_err(|e| ConfigError::InvalidEnv {
				name: ENV_WINDOW_SECS,
				message: format!("{e}"),
			})?;

			settings.window = StdDuration::from_secs(secs);
		}

		Ok(settings)
	}

	/// Overrides the token endpoint.
	pub fn with_token_endpoint(mut self, endpoint: Url) -> Self {
		self.token_endpoint = endpoint;

		self
	}

	/// Overrides the batch endpoint.
	pub fn with_batch_endpoint(mut self, endpoint: Url) -> Self {
		self.batch_endpoint = endpoint;

		self
	}

	/// Overrides the window quota.
	pub fn with_quota(mut self, quota: u64) -> Self {
		self.quota = quota;

		self
	}

	/// Overrides the window length.
	pub fn with_window(mut self, window: StdDuration) -> Self {
		self.window = window;

		self
	}

	/// Overrides the maximum chunk size.
	pub fn with_max_chunk_size(mut self, size: usize) -> Self {
		self.max_chunk_size = size;

		self
	}

	/// Overrides both per-call timeouts at once.
	pub fn with_timeouts(mut self, connect: StdDuration, read: StdDuration) -> Self {
		self.connect_timeout = connect;
		self.read_timeout = read;

		self
	}

	/// Overrides the admission poll interval.
	pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
		self.poll_interval = interval;

		self
	}
}

fn require(
	lookup: &impl Fn(&'static str) -> Option<String>,
	name: &'static str,
) -> Result<String, ConfigError> {
	lookup(name).filter(|value| !value.is_empty()).ok_or(ConfigError::MissingEnv { name })
}
