//! Consumer-side binding from an endpoint to its current object URL.
//!
//! A [`BlobUrlBinding`] belongs to one consumer (a view, a thumbnail cell). Every
//! [`set_endpoint`](BlobUrlBinding::set_endpoint) starts a new generation and returns the
//! future that resolves it; the UI runtime drives that future. When it settles, the result
//! is applied only if the binding is still active and no newer endpoint was set, so a
//! consumer that went away or moved on never observes a stale update. The fetch itself
//! always runs to completion and populates the shared cache.

// self
use crate::{
	_prelude::*,
	blob::ObjectUrl,
	cache::BlobCache,
	http::HttpTransport,
	obs::{self, OpKind},
};

/// Future returned by [`BlobUrlBinding::set_endpoint`].
pub type BindingFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

type Listener = Arc<dyn Fn(&BindingState) + Send + Sync>;

/// Observable state of a binding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BindingState {
	/// No endpoint set yet.
	#[default]
	Idle,
	/// Waiting for the endpoint to resolve.
	Resolving {
		/// Endpoint being resolved.
		endpoint: String,
	},
	/// Resolution settled; `url` is `None` when the server had no content.
	Resolved {
		/// Endpoint that was resolved.
		endpoint: String,
		/// Object URL of the payload.
		url: Option<ObjectUrl>,
	},
	/// Resolution failed; the failure was logged.
	Failed {
		/// Endpoint that failed.
		endpoint: String,
	},
}
impl BindingState {
	/// Endpoint the state refers to.
	pub fn endpoint(&self) -> Option<&str> {
		match self {
			Self::Idle => None,
			Self::Resolving { endpoint }
			| Self::Resolved { endpoint, .. }
			| Self::Failed { endpoint } => Some(endpoint),
		}
	}

	/// Object URL to display, if one is available.
	pub fn url(&self) -> Option<&ObjectUrl> {
		match self {
			Self::Resolved { url, .. } => url.as_ref(),
			_ => None,
		}
	}
}

struct Shared {
	state: BindingState,
	generation: u64,
	active: bool,
}

/// Reactive endpoint-to-URL binding for one consumer.
pub struct BlobUrlBinding<T>
where
	T: ?Sized + HttpTransport,
{
	cache: Arc<BlobCache<T>>,
	shared: Arc<RwLock<Shared>>,
	listener: Option<Listener>,
}
impl<T> BlobUrlBinding<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an idle binding over `cache`.
	pub fn new(cache: Arc<BlobCache<T>>) -> Self {
		Self {
			cache,
			shared: Arc::new(RwLock::new(Shared {
				state: BindingState::Idle,
				generation: 0,
				active: true,
			})),
			listener: None,
		}
	}

	/// Registers a callback invoked with every applied state.
	///
	/// The callback runs while the binding's state lock is held; it must not call back into
	/// the binding.
	pub fn with_listener<F>(mut self, listener: F) -> Self
	where
		F: 'static + Fn(&BindingState) + Send + Sync,
	{
		self.listener = Some(Arc::new(listener));

		self
	}

	/// Current object URL; `None` while loading, after a failure, for empty content, or once
	/// the cache has revoked the URL (eviction or [`clear`](BlobCache::clear)).
	pub fn url(&self) -> Option<ObjectUrl> {
		let url = self.shared.read().state.url().cloned()?;

		self.cache.registry().get(&url).is_some().then_some(url)
	}

	/// Current state.
	pub fn state(&self) -> BindingState {
		self.shared.read().state.clone()
	}

	/// Returns `false` once torn down.
	pub fn is_active(&self) -> bool {
		self.shared.read().active
	}

	/// Points the binding at `endpoint` and returns the future resolving it.
	///
	/// Setting the current endpoint again, or any endpoint after teardown, is a no-op and
	/// returns a future that completes immediately. The exception is a current endpoint whose
	/// URL was revoked by the cache; it is resolved again.
	pub fn set_endpoint(&self, endpoint: impl Into<String>) -> BindingFuture {
		let endpoint = endpoint.into();
		let Some(generation) = self.begin(&endpoint) else {
			return Box::pin(async {});
		};
		let cache = Arc::clone(&self.cache);
		let shared = Arc::clone(&self.shared);
		let listener = self.listener.clone();

		Box::pin(async move {
			let resolved = cache.try_resolve(&endpoint).await;
			let next = match resolved {
				Ok(url) => BindingState::Resolved { endpoint, url },
				Err(err) => {
					obs::log_fail_soft(OpKind::BlobResolve, &endpoint, &err);

					BindingState::Failed { endpoint }
				},
			};

			apply(&shared, listener.as_ref(), generation, next);
		})
	}

	/// Stops observing; pending resolutions settle without touching this binding.
	pub fn teardown(&self) {
		let mut shared = self.shared.write();

		shared.active = false;
		shared.generation = shared.generation.wrapping_add(1);
	}

	fn begin(&self, endpoint: &str) -> Option<u64> {
		let mut shared = self.shared.write();

		if !shared.active
			|| (shared.state.endpoint() == Some(endpoint) && !self.is_revoked(&shared.state))
		{
			return None;
		}

		shared.generation = shared.generation.wrapping_add(1);
		shared.state = BindingState::Resolving { endpoint: endpoint.to_owned() };

		if let Some(listener) = &self.listener {
			listener(&shared.state);
		}

		Some(shared.generation)
	}

	fn is_revoked(&self, state: &BindingState) -> bool {
		state.url().is_some_and(|url| self.cache.registry().get(url).is_none())
	}
}
impl<T> Drop for BlobUrlBinding<T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		self.teardown();
	}
}
impl<T> Debug for BlobUrlBinding<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let shared = self.shared.read();

		f.debug_struct("BlobUrlBinding")
			.field("state", &shared.state)
			.field("generation", &shared.generation)
			.field("active", &shared.active)
			.finish()
	}
}

/// Applies `next` when the binding is active and still on `generation`.
fn apply(
	shared: &RwLock<Shared>,
	listener: Option<&Listener>,
	generation: u64,
	next: BindingState,
) {
	let mut shared = shared.write();

	if !shared.active || shared.generation != generation {
		return;
	}

	shared.state = next;

	if let Some(listener) = listener {
		listener(&shared.state);
	}
}
