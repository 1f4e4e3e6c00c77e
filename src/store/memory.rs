//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, PrincipalId},
	store::{CompareAndSwapOutcome, CredentialStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<PrincipalId, CredentialRecord>>>;

/// Thread-safe storage backend that keeps credentials in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Inserts a credential synchronously; intended for test fixtures.
	pub fn seed(&self, record: CredentialRecord) {
		self.0.write().insert(record.principal.clone(), record);
	}

	fn cas_now(
		map: &StoreMap,
		principal: &PrincipalId,
		expected_refresh: &str,
		replacement: CredentialRecord,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();
		let outcome = match guard.get(principal) {
			Some(existing) if existing.refresh_token.expose() == expected_refresh =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.insert(principal.clone(), replacement);
		}

		outcome
	}
}
impl CredentialStore for MemoryStore {
	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.write().insert(record.principal.clone(), record);

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, principal: &'a PrincipalId) -> StoreFuture<'a, Option<CredentialRecord>> {
		Box::pin(async move { Ok(self.0.read().get(principal).cloned()) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		principal: &'a PrincipalId,
		expected_refresh: &'a str,
		replacement: CredentialRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move { Ok(Self::cas_now(&self.0, principal, expected_refresh, replacement)) })
	}
}
