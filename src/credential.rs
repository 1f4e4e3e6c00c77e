//! Offline credential custody: load at startup, refresh on demand, persist before use.
//!
//! The manager owns one [`CredentialRecord`] for the life of the process. Callers ask
//! for a bearer token; when the access token is expired (or inside a small preemptive
//! margin) the manager performs a `grant_type=refresh_token` exchange and writes the
//! result back to the store via refresh-token compare-and-swap BEFORE handing the new
//! token out. A CAS mismatch means another process rotated first, in which case the
//! stored record is adopted instead of clobbered.

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, PrincipalId, TokenSecret},
	error::{ConfigError, RefreshError},
	settings::Settings,
	store::{CompareAndSwapOutcome, CredentialStore},
};

/// Handler invoked synchronously after a successful refresh has been persisted.
pub type RefreshHandler = Box<dyn Fn(&CredentialRecord) + Send + Sync>;
/// Handler invoked synchronously when a refresh attempt fails.
pub type RefreshErrorHandler = Box<dyn Fn(&RefreshError) + Send + Sync>;

/// How early before expiry a token is refreshed, so a batch never starts with a token
/// about to lapse mid-call.
const PREEMPTIVE_MARGIN: Duration = Duration::seconds(60);

/// Shape of a successful token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	expires_in: i64,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// Loads, refreshes, and persists the offline credential for one configured principal.
///
/// Token custody only; retry policy for the calls that use the token belongs to the
/// transport layer.
pub struct CredentialManager {
	principal: PrincipalId,
	client_secret: TokenSecret,
	token_endpoint: Url,
	store: Arc<dyn CredentialStore>,
	http: ReqwestClient,
	// Per-principal critical section: refresh check, exchange, and write-back are
	// serialized so concurrent callers cannot interleave rotations.
	current: AsyncMutex<CredentialRecord>,
	on_refresh: Option<RefreshHandler>,
	on_refresh_error: Option<RefreshErrorHandler>,
}
impl CredentialManager {
	/// Loads the stored credential for the configured principal.
	///
	/// Fails fast with [`ConfigError::NoStoredCredential`] when the store holds
	/// nothing; the courier runs unattended and has no interactive fallback.
	pub async fn obtain(
		settings: &Settings,
		store: Arc<dyn CredentialStore>,
		http: ReqwestClient,
	) -> Result<Self> {
		let stored = store.fetch(&settings.principal).await?.ok_or_else(|| {
			ConfigError::NoStoredCredential { principal: settings.principal.to_string() }
		})?;

		Ok(Self {
			principal: settings.principal.clone(),
			client_secret: settings.client_secret.clone(),
			token_endpoint: settings.token_endpoint.clone(),
			store,
			http,
			current: AsyncMutex::new(stored),
			on_refresh: None,
			on_refresh_error: None,
		})
	}

	/// Registers a handler called after each persisted refresh.
	pub fn on_refresh(mut self, handler: impl Fn(&CredentialRecord) + Send + Sync + 'static) -> Self {
		self.on_refresh = Some(Box::new(handler));

		self
	}

	/// Registers a handler called when a refresh attempt fails.
	pub fn on_refresh_error(
		mut self,
		handler: impl Fn(&RefreshError) + Send + Sync + 'static,
	) -> Self {
		self.on_refresh_error = Some(Box::new(handler));

		self
	}

	/// Principal the managed credential belongs to.
	pub fn principal(&self) -> &PrincipalId {
		&self.principal
	}

	/// Returns an access token valid for at least the preemptive margin, refreshing first
	/// when needed.
	pub async fn bearer_token(&self) -> Result<TokenSecret> {
		let mut current = self.current.lock().await;

		if current.expires_within(OffsetDateTime::now_utc(), PREEMPTIVE_MARGIN) {
			self.refresh_locked(&mut current).await?;
		}

		Ok(current.access_token.clone())
	}

	/// Refreshes the held credential while the per-principal lock is held.
	async fn refresh_locked(&self, current: &mut CredentialRecord) -> Result<()> {
		let response = match self.request_refresh(current).await {
			Ok(response) => response,
			Err(err) => {
				tracing::error!(error = %err, "oauth token refresh failed");

				if let Some(handler) = &self.on_refresh_error {
					handler(&err);
				}

				return Err(err.into());
			},
		};
		let expires_at = OffsetDateTime::now_utc() + Duration::seconds(response.expires_in);
		let updated =
			current.refreshed(response.access_token, expires_at, response.refresh_token);
		let expected_refresh = current.refresh_token.expose().to_owned();
		let outcome = self
			.store
			.compare_and_swap_refresh(&self.principal, &expected_refresh, updated.clone())
			.await?;

		*current = match outcome {
			CompareAndSwapOutcome::Updated => updated,
			CompareAndSwapOutcome::Missing => {
				self.store.save(updated.clone()).await?;

				updated
			},
			CompareAndSwapOutcome::RefreshMismatch =>
				match self.store.fetch(&self.principal).await? {
					// Another process rotated the refresh token first; its record wins.
					Some(existing) => existing,
					None => {
						self.store.save(updated.clone()).await?;

						updated
					},
				},
		};

		tracing::info!("oauth token was refreshed");

		if let Some(handler) = &self.on_refresh {
			handler(current);
		}

		Ok(())
	}

	/// Performs the `refresh_token` grant against the token endpoint.
	async fn request_refresh(
		&self,
		current: &CredentialRecord,
	) -> Result<TokenEndpointResponse, RefreshError> {
		let form = [
			("grant_type", "refresh_token"),
			("refresh_token", current.refresh_token.expose()),
			("client_id", self.principal.as_ref()),
			("client_secret", self.client_secret.expose()),
		];
		let response = self
			.http
			.post(self.token_endpoint.clone())
			.form(&form)
			.send()
			.await
			.map_err(RefreshError::transport)?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(RefreshError::transport)?;

		if !status.is_success() {
			return Err(RefreshError::Rejected {
				status: status.as_u16(),
				reason: rejection_reason(&bytes),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| RefreshError::MalformedResponse { source })
	}
}
impl Debug for CredentialManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("principal", &self.principal)
			.field("token_endpoint", &self.token_endpoint.as_str())
			.finish()
	}
}

/// Pulls the `error`/`error_description` pair out of an OAuth error body, falling back
/// to the raw payload when it is not the standard shape.
fn rejection_reason(bytes: &[u8]) -> String {
	#[derive(Deserialize)]
	struct OauthErrorBody {
		error: String,
		#[serde(default)]
		error_description: Option<String>,
	}

	match serde_json::from_slice::<OauthErrorBody>(bytes) {
		Ok(body) => match body.error_description {
			Some(description) => format!("{}: {description}", body.error),
			None => body.error,
		},
		Err(_) => String::from_utf8_lossy(bytes).into_owned(),
	}
}
