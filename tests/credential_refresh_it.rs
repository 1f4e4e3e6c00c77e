mod common;

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use common::{seeded_memory_store, test_principal};
use sheets_courier::{
	auth::{CredentialRecord, PrincipalId},
	credential::CredentialManager,
	error::{Error, RefreshError},
	reqwest::Client as ReqwestClient,
	settings::Settings,
	store::{CredentialStore, MemoryStore},
	url::Url,
};

const CLIENT_SECRET: &str = "secret-refresh";

fn build_settings(server: &MockServer) -> Settings {
	Settings::new(test_principal(), CLIENT_SECRET, "/tmp/unused-credentials.json")
		.with_token_endpoint(
			Url::parse(&server.url("/token")).expect("Mock token endpoint should parse."),
		)
}

async fn build_manager(
	server: &MockServer,
	expires_at: OffsetDateTime,
) -> (CredentialManager, Arc<MemoryStore>) {
	let (backend, _) = seeded_memory_store(expires_at);
	let store: Arc<dyn CredentialStore> = backend.clone();
	let manager = CredentialManager::obtain(&build_settings(server), store, ReqwestClient::new())
		.await
		.expect("Obtaining a seeded credential should succeed.");

	(manager, backend)
}

#[tokio::test]
async fn obtain_fails_fast_without_a_stored_credential() {
	let server = MockServer::start_async().await;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let result = CredentialManager::obtain(&build_settings(&server), store, ReqwestClient::new())
		.await;

	assert!(
		result.is_err(),
		"An empty store must fail fast; this courier has no interactive consent fallback."
	);
}

#[tokio::test]
async fn fresh_credential_skips_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let (manager, _) = build_manager(&server, OffsetDateTime::now_utc() + Duration::hours(1)).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200);
		})
		.await;
	let token = manager.bearer_token().await.expect("Fresh credential should be returned as-is.");

	assert_eq!(token.expose(), "access-seed");

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn refresh_persists_to_the_store_before_the_token_is_handed_out() {
	let server = MockServer::start_async().await;
	let (manager, backend) =
		build_manager(&server, OffsetDateTime::now_utc() - Duration::minutes(5)).await;
	let refreshes = Arc::new(AtomicUsize::new(0));
	let manager = {
		let refreshes = refreshes.clone();

		manager.on_refresh(move |_| {
			refreshes.fetch_add(1, Ordering::SeqCst);
		})
	};
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-seed")
				.form_urlencoded_tuple("client_id", "export-robot")
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-new\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let token = manager.bearer_token().await.expect("Expired credential should refresh.");

	mock.assert_async().await;

	assert_eq!(token.expose(), "access-new");
	assert_eq!(refreshes.load(Ordering::SeqCst), 1);

	let stored = backend
		.fetch(&test_principal())
		.await
		.expect("Store fetch should succeed after refresh.")
		.expect("The refreshed credential should be present in the store.");

	assert_eq!(stored.access_token.expose(), "access-new");
	assert_eq!(
		stored.refresh_token.expose(),
		"refresh-seed",
		"The refresh token must survive a refresh that does not rotate it."
	);
	assert!(stored.expires_at > OffsetDateTime::now_utc() + Duration::minutes(30));
}

#[tokio::test]
async fn refresh_adopts_a_rotated_refresh_token() {
	let server = MockServer::start_async().await;
	let (manager, backend) =
		build_manager(&server, OffsetDateTime::now_utc() - Duration::minutes(5)).await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-new\",\"refresh_token\":\"refresh-rotated\",\"token_type\":\"bearer\",\"expires_in\":3600}",
				);
		})
		.await;

	manager.bearer_token().await.expect("Rotating refresh should succeed.");

	let stored = backend
		.fetch(&test_principal())
		.await
		.expect("Store fetch should succeed after rotation.")
		.expect("The rotated credential should be present in the store.");

	assert_eq!(stored.refresh_token.expose(), "refresh-rotated");
}

#[tokio::test]
async fn rejected_refresh_surfaces_and_fires_the_error_handler() {
	let server = MockServer::start_async().await;
	let (manager, backend) =
		build_manager(&server, OffsetDateTime::now_utc() - Duration::minutes(5)).await;
	let failures = Arc::new(AtomicUsize::new(0));
	let manager = {
		let failures = failures.clone();

		manager.on_refresh_error(move |error| {
			assert!(matches!(error, RefreshError::Rejected { status: 400, .. }));
			failures.fetch_add(1, Ordering::SeqCst);
		})
	};
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"expired\"}");
		})
		.await;
	let result = manager.bearer_token().await;

	assert!(matches!(result, Err(Error::Refresh(RefreshError::Rejected { status: 400, .. }))));
	assert_eq!(failures.load(Ordering::SeqCst), 1);

	let stored = backend
		.fetch(&test_principal())
		.await
		.expect("Store fetch should succeed after a rejected refresh.")
		.expect("The original credential should remain in the store.");

	assert_eq!(
		stored.access_token.expose(),
		"access-seed",
		"A failed refresh must not touch the stored credential."
	);
}

#[tokio::test]
async fn concurrent_rotation_by_another_process_wins() {
	let server = MockServer::start_async().await;
	let (manager, backend) =
		build_manager(&server, OffsetDateTime::now_utc() - Duration::minutes(5)).await;

	// Simulate another process rotating the stored credential after this manager
	// loaded its copy: the refresh token on disk no longer matches.
	let foreign = CredentialRecord::new(
		test_principal(),
		"access-foreign",
		"refresh-foreign",
		OffsetDateTime::now_utc() + Duration::hours(1),
	);

	backend.seed(foreign.clone());

	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-stale\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let token = manager.bearer_token().await.expect("Mismatched refresh should still succeed.");

	assert_eq!(
		token.expose(),
		"access-foreign",
		"On a refresh-token mismatch the stored record wins over the stale refresh."
	);

	let stored = backend
		.fetch(&test_principal())
		.await
		.expect("Store fetch should succeed after the mismatch.")
		.expect("The foreign credential should remain in the store.");

	assert_eq!(stored, foreign, "The foreign rotation must not be clobbered.");
}

#[tokio::test]
async fn obtain_reports_the_missing_principal_by_name() {
	let server = MockServer::start_async().await;
	let principal = PrincipalId::new("other-robot").expect("Principal fixture should be valid.");
	let settings = Settings::new(principal, CLIENT_SECRET, "/tmp/unused-credentials.json")
		.with_token_endpoint(
			Url::parse(&server.url("/token")).expect("Mock token endpoint should parse."),
		);
	let (backend, _) = seeded_memory_store(OffsetDateTime::now_utc() + Duration::hours(1));
	let store: Arc<dyn CredentialStore> = backend;
	let error = CredentialManager::obtain(&settings, store, ReqwestClient::new())
		.await
		.expect_err("A store seeded for a different principal must not satisfy obtain.");

	assert!(error.to_string().contains("other-robot"));
}
