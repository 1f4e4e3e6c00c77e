//! HTTP batch transport and the composition-root facade.
//!
//! [`Courier`] is pure wiring: one reqwest client and JSON codec per process, the
//! credential obtained once at startup, one [`RateLimiter`] shared by every
//! dispatcher it hands out. [`HttpBatchClient`] is the concrete [`BatchTransport`]
//! bound to that credential, speaking the service's batch envelope:
//! `{"requests": [...]}` out, `{"replies": [...]}` back, one reply per request in
//! request order.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	batch::{BatchDispatcher, BatchTransport, SubError, SubReply, TransportFuture},
	credential::CredentialManager,
	error::{ConfigError, NetworkError},
	limit::RateLimiter,
	settings::Settings,
	store::CredentialStore,
};

#[derive(Serialize)]
struct BatchEnvelope<'a> {
	requests: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct BatchReplies {
	replies: Vec<ReplyEnvelope>,
}

/// One sub-reply as the service encodes it: a body, or an error object.
#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
	#[serde(default)]
	body: Option<Value>,
	#[serde(default)]
	error: Option<SubError>,
}
impl ReplyEnvelope {
	fn into_reply(self) -> SubReply {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.body.unwrap_or(Value::Null)),
		}
	}
}

/// Batch-endpoint client bound to the process credential and admission gate.
#[derive(Clone, Debug)]
pub struct HttpBatchClient {
	http: ReqwestClient,
	endpoint: Url,
	credentials: Arc<CredentialManager>,
	limiter: Arc<RateLimiter>,
}
impl HttpBatchClient {
	fn new(
		http: ReqwestClient,
		endpoint: Url,
		credentials: Arc<CredentialManager>,
		limiter: Arc<RateLimiter>,
	) -> Self {
		Self { http, endpoint, credentials, limiter }
	}

	async fn execute_batch(&self, payloads: Vec<Value>) -> Result<Vec<SubReply>> {
		let token = self.credentials.bearer_token().await?;
		let response = self
			.http
			.post(self.endpoint.clone())
			.bearer_auth(token.expose())
			.json(&BatchEnvelope { requests: &payloads })
			.send()
			.await
			.map_err(NetworkError::from)?;
		let status = response.status();

		if status.as_u16() == 429 {
			// Server-side throttle: surfaced to the log, never folded into local accounting.
			self.limiter.throttle_observed();
		}
		if !status.is_success() {
			return Err(NetworkError::Status { status: status.as_u16() }.into());
		}

		let bytes = response.bytes().await.map_err(NetworkError::from)?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let parsed: BatchReplies = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| NetworkError::MalformedReply { source })?;

		Ok(parsed.replies.into_iter().map(ReplyEnvelope::into_reply).collect())
	}
}
impl BatchTransport for HttpBatchClient {
	fn execute(&self, payloads: Vec<Value>) -> TransportFuture<'_> {
		Box::pin(self.execute_batch(payloads))
	}
}

/// Composition root owning the transport, codec, credential, and admission gate.
#[derive(Debug)]
pub struct Courier {
	settings: Settings,
	http: ReqwestClient,
	credentials: Arc<CredentialManager>,
	limiter: Arc<RateLimiter>,
}
impl Courier {
	/// Wires a courier from settings and a credential store.
	///
	/// Builds the process-wide HTTP client with the configured per-call timeouts and
	/// obtains the stored credential once, failing fast when none exists.
	pub async fn new(settings: Settings, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let http = build_http_client(settings.connect_timeout, settings.read_timeout)?;

		Self::with_http_client(settings, store, http).await
	}

	/// Wires a courier around a caller-provided HTTP client.
	///
	/// The caller is responsible for configuring timeouts on the provided client.
	pub async fn with_http_client(
		settings: Settings,
		store: Arc<dyn CredentialStore>,
		http: ReqwestClient,
	) -> Result<Self> {
		let credentials =
			Arc::new(CredentialManager::obtain(&settings, store, http.clone()).await?);
		let limiter = Arc::new(
			RateLimiter::new(settings.quota, settings.window)
				.with_poll_interval(settings.poll_interval),
		);

		Ok(Self { settings, http, credentials, limiter })
	}

	/// Constructs a batch-endpoint client bound to the process credential.
	pub fn batch_client(&self) -> HttpBatchClient {
		HttpBatchClient::new(
			self.http.clone(),
			self.settings.batch_endpoint.clone(),
			self.credentials.clone(),
			self.limiter.clone(),
		)
	}

	/// Constructs a new dispatcher bound to the given client and the shared gate.
	pub fn dispatcher(&self, client: HttpBatchClient) -> BatchDispatcher {
		BatchDispatcher::new(Arc::new(client), self.limiter.clone(), self.settings.max_chunk_size)
	}

	/// Diagnostic hook for collaborators that observed a server-side throttle response.
	pub fn rate_limit_hit(&self) {
		self.limiter.throttle_observed();
	}

	/// Shared admission gate, for dispatchers built outside the facade.
	pub fn limiter(&self) -> Arc<RateLimiter> {
		self.limiter.clone()
	}

	/// Credential custody for the configured principal.
	pub fn credentials(&self) -> Arc<CredentialManager> {
		self.credentials.clone()
	}

	/// Settings the courier was wired with.
	pub fn settings(&self) -> &Settings {
		&self.settings
	}
}

fn build_http_client(
	connect_timeout: StdDuration,
	read_timeout: StdDuration,
) -> Result<ReqwestClient, ConfigError> {
	ReqwestClient::builder()
		.connect_timeout(connect_timeout)
		.timeout(read_timeout)
		.build()
		.map_err(ConfigError::http_client_build)
}
