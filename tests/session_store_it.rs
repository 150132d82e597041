// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// self
use pledge_client::{
	auth::{Credentials, TokenPair},
	session::CredentialStore,
	store::{ACCESS_TOKEN_KEY, MemoryStore, REFRESH_TOKEN_KEY, TokenStorage},
};

#[tokio::test]
async fn set_persists_and_load_restores() {
	let backend = Arc::new(MemoryStore::default());
	let store = CredentialStore::load(backend.clone())
		.await
		.expect("Loading from an empty memory store should succeed.");

	assert!(store.get().is_empty());

	store
		.set(TokenPair::new("access-1", "refresh-1"))
		.await
		.expect("Saving the token pair should succeed.");

	assert_eq!(backend.snapshot(ACCESS_TOKEN_KEY).as_deref(), Some("access-1"));
	assert_eq!(backend.snapshot(REFRESH_TOKEN_KEY).as_deref(), Some("refresh-1"));

	let restored = CredentialStore::load(backend)
		.await
		.expect("Reloading from the populated memory store should succeed.");

	assert_eq!(restored.get(), Credentials::new("access-1", "refresh-1"));
}

#[tokio::test]
async fn clear_removes_tokens_and_notifies_once() {
	let backend = Arc::new(MemoryStore::with_entries([
		(ACCESS_TOKEN_KEY, "access-1"),
		(REFRESH_TOKEN_KEY, "refresh-1"),
	]));
	let store = CredentialStore::load(backend.clone())
		.await
		.expect("Loading seeded credentials should succeed.");
	let hits = Arc::new(AtomicUsize::new(0));
	let observed = hits.clone();
	let id = store.events().subscribe(move || {
		observed.fetch_add(1, Ordering::SeqCst);
	});

	assert!(store.clear().await.expect("Clearing credentials should succeed."));
	assert!(!store.clear().await.expect("Clearing an empty session should succeed."));
	assert_eq!(hits.load(Ordering::SeqCst), 1);
	assert!(backend.is_empty());
	assert!(
		backend
			.get(ACCESS_TOKEN_KEY)
			.await
			.expect("Reading a removed key should succeed.")
			.is_none()
	);
	assert!(store.events().unsubscribe(id));
}

#[tokio::test]
async fn blank_stored_values_are_treated_as_absent() {
	let backend =
		Arc::new(MemoryStore::with_entries([(ACCESS_TOKEN_KEY, ""), (REFRESH_TOKEN_KEY, "refresh-1")]));
	let store = CredentialStore::load(backend)
		.await
		.expect("Loading partially blank credentials should succeed.");

	assert!(store.access_token().is_none());
	assert!(store.has_refresh_token());
}
