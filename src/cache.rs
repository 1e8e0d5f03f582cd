//! Endpoint-to-object-URL cache with in-flight coalescing.
//!
//! A hit returns the cached URL without touching the network. A miss joins the endpoint's
//! in-flight group; the first member fetches and every member receives that single outcome,
//! whether a URL, `None`, or an error. `204 No Content` resolves to `None` and is not cached;
//! failures are not cached either. The group dissolves with its last member, so the next
//! call after it goes back to the network.
//!
//! With a capacity bound the least recently used entry is evicted and its object URL
//! revoked. Without one, entries live as long as the cache.

// std
use std::num::NonZeroUsize;
// crates.io
use async_lock::OnceCell;
use lru::LruCache;
// self
use crate::{
	_prelude::*,
	blob::{Blob, ObjectUrl, ObjectUrlRegistry},
	fetch::AuthenticatedFetch,
	http::HttpTransport,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

type SharedOutcome = Arc<OnceCell<Result<Option<ObjectUrl>>>>;
type InflightMap = Mutex<HashMap<String, SharedOutcome>>;

/// Shared blob cache keyed by the full endpoint string.
pub struct BlobCache<T>
where
	T: ?Sized + HttpTransport,
{
	fetch: Arc<AuthenticatedFetch<T>>,
	registry: Arc<ObjectUrlRegistry>,
	entries: Mutex<LruCache<String, ObjectUrl>>,
	inflight: InflightMap,
}
impl<T> BlobCache<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a cache; `capacity` of `None` keeps every entry.
	pub fn new(
		fetch: Arc<AuthenticatedFetch<T>>,
		registry: Arc<ObjectUrlRegistry>,
		capacity: Option<NonZeroUsize>,
	) -> Self {
		let entries = match capacity {
			Some(capacity) => LruCache::new(capacity),
			None => LruCache::unbounded(),
		};

		Self { fetch, registry, entries: Mutex::new(entries), inflight: Mutex::new(HashMap::new()) }
	}

	/// Registry the cached URLs live in.
	pub fn registry(&self) -> &Arc<ObjectUrlRegistry> {
		&self.registry
	}

	/// Request function used on misses.
	pub fn fetch(&self) -> &Arc<AuthenticatedFetch<T>> {
		&self.fetch
	}

	/// Cached URL for `endpoint`, without fetching.
	pub fn get(&self, endpoint: &str) -> Option<ObjectUrl> {
		self.entries.lock().get(endpoint).cloned()
	}

	/// Cached blob for `endpoint`, without fetching.
	pub fn blob(&self, endpoint: &str) -> Option<Blob> {
		self.get(endpoint).and_then(|url| self.registry.get(&url))
	}

	/// Returns `true` when `endpoint` is cached.
	pub fn contains(&self, endpoint: &str) -> bool {
		self.entries.lock().contains(endpoint)
	}

	/// Number of cached entries.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Drops every entry and revokes its object URL.
	pub fn clear(&self) {
		let mut entries = self.entries.lock();

		while let Some((_, url)) = entries.pop_lru() {
			self.registry.revoke(&url);
		}
	}

	/// Resolves `endpoint`, logging failures and yielding `None` for them.
	pub async fn resolve(&self, endpoint: &str) -> Option<ObjectUrl> {
		match self.try_resolve(endpoint).await {
			Ok(url) => url,
			Err(err) => {
				obs::log_fail_soft(OpKind::BlobResolve, endpoint, &err);

				None
			},
		}
	}

	/// Resolves `endpoint` to an object URL; `Ok(None)` means the server had no content.
	pub async fn try_resolve(&self, endpoint: &str) -> Result<Option<ObjectUrl>> {
		const KIND: OpKind = OpKind::BlobResolve;

		if let Some(url) = self.get(endpoint) {
			obs::record_cache_lookup(true);

			return Ok(Some(url));
		}

		obs::record_cache_lookup(false);
		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let span = OpSpan::new(KIND, "try_resolve");
		let result = span
			.instrument(async {
				let slot = InflightSlot::acquire(&self.inflight, endpoint);

				slot.outcome
					.get_or_init(|| async {
						match self.get(endpoint) {
							Some(url) => Ok(Some(url)),
							None => self.fetch_and_store(endpoint).await,
						}
					})
					.await
					.clone()
			})
			.await;

		obs::record_op_outcome(
			KIND,
			if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure },
		);

		result
	}

	async fn fetch_and_store(&self, endpoint: &str) -> Result<Option<ObjectUrl>> {
		let response = self.fetch.get(endpoint).await?;

		if response.is_no_content() {
			return Ok(None);
		}

		let blob = response.error_for_status()?.into_blob();
		let url = self.registry.create_object_url(blob);

		Ok(Some(self.store(endpoint, url)))
	}

	fn store(&self, endpoint: &str, url: ObjectUrl) -> ObjectUrl {
		let mut entries = self.entries.lock();

		if let Some(existing) = entries.get(endpoint) {
			// Lost a race with another insert for the same endpoint.
			self.registry.revoke(&url);

			return existing.clone();
		}
		if let Some((evicted_endpoint, evicted)) = entries.push(endpoint.to_owned(), url.clone()) {
			self.registry.revoke(&evicted);
			obs::log_eviction(&evicted_endpoint);
		}

		url
	}
}
impl<T> Drop for BlobCache<T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		self.clear();
	}
}
impl<T> Debug for BlobCache<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BlobCache")
			.field("entries", &self.len())
			.field("inflight", &self.inflight.lock().len())
			.finish()
	}
}

/// Membership in an endpoint's in-flight group; the map entry goes with the last member.
struct InflightSlot<'a> {
	map: &'a InflightMap,
	endpoint: &'a str,
	outcome: SharedOutcome,
}
impl<'a> InflightSlot<'a> {
	fn acquire(map: &'a InflightMap, endpoint: &'a str) -> Self {
		let outcome = map
			.lock()
			.entry(endpoint.to_owned())
			.or_insert_with(|| Arc::new(OnceCell::new()))
			.clone();

		Self { map, endpoint, outcome }
	}
}
impl Drop for InflightSlot<'_> {
	fn drop(&mut self) {
		let mut map = self.map.lock();

		// One reference in the map plus ours.
		if Arc::strong_count(&self.outcome) == 2
			&& map.get(self.endpoint).is_some_and(|outcome| Arc::ptr_eq(outcome, &self.outcome))
		{
			map.remove(self.endpoint);
		}
	}
}
