//! Fixtures shared by the integration tests.

// std
use std::sync::Arc;
// crates.io
use time::OffsetDateTime;
// self
use sheets_courier::{
	auth::{CredentialRecord, PrincipalId},
	store::MemoryStore,
};

/// Principal identifier shared by all fixtures.
pub fn test_principal() -> PrincipalId {
	PrincipalId::new("export-robot").expect("Test principal should be valid.")
}

/// Credential record expiring at the provided instant.
pub fn test_credential(expires_at: OffsetDateTime) -> CredentialRecord {
	CredentialRecord::new(test_principal(), "access-seed", "refresh-seed", expires_at)
}

/// [`MemoryStore`] preseeded with a credential for [`test_principal`].
pub fn seeded_memory_store(expires_at: OffsetDateTime) -> (Arc<MemoryStore>, CredentialRecord) {
	let record = test_credential(expires_at);
	let backend = Arc::new(MemoryStore::default());

	backend.seed(record.clone());

	(backend, record)
}
