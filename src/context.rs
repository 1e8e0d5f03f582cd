//! Application context wiring the token provider, fetch layer, and blob cache together.
//!
//! The viewer builds one [`FetchContext`] at startup and hands out references to it;
//! there are no process-wide singletons. Dropping the context (and every binding created
//! from it) releases the cache and revokes its object URLs.

// self
use crate::{
	_prelude::*,
	binding::BlobUrlBinding,
	blob::{ObjectUrl, ObjectUrlRegistry},
	cache::BlobCache,
	config::ClientConfig,
	error::ConfigError,
	fetch::{AuthenticatedFetch, RawResponse, RequestOptions},
	http::HttpTransport,
	identity::{IdentityClient, KeycloakClient},
	provider::TokenProvider,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Shared services of one viewer session.
pub struct FetchContext<T>
where
	T: ?Sized + HttpTransport,
{
	config: ClientConfig,
	tokens: Arc<TokenProvider>,
	fetch: Arc<AuthenticatedFetch<T>>,
	cache: Arc<BlobCache<T>>,
}
impl<T> FetchContext<T>
where
	T: ?Sized + HttpTransport,
{
	/// Wires the services over an existing identity client and transport.
	pub fn with_transport(
		config: ClientConfig,
		identity: Arc<dyn IdentityClient>,
		transport: Arc<T>,
	) -> Self {
		let tokens = Arc::new(
			TokenProvider::new(identity).with_refresh_threshold(config.refresh_threshold),
		);
		let fetch = Arc::new(AuthenticatedFetch::from_config(&config, transport, tokens.clone()));
		let registry = Arc::new(ObjectUrlRegistry::new(&config.api_base));
		let cache = Arc::new(BlobCache::new(fetch.clone(), registry, config.cache_capacity));

		Self { config, tokens, fetch, cache }
	}

	/// Wires the services around a [`KeycloakClient`] for the configured realm.
	pub fn with_keycloak(config: ClientConfig, transport: Arc<T>) -> Result<Self> {
		let identity_config = config
			.identity
			.clone()
			.ok_or(ConfigError::MissingIdentityField { field: "identity" })?;
		let identity = Arc::new(KeycloakClient::new(identity_config, transport.clone())?);

		Ok(Self::with_transport(config, identity, transport))
	}

	/// Settings the context was built from.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Token provider.
	pub fn tokens(&self) -> &Arc<TokenProvider> {
		&self.tokens
	}

	/// Authenticated request function.
	pub fn fetch(&self) -> &Arc<AuthenticatedFetch<T>> {
		&self.fetch
	}

	/// Shared blob cache.
	pub fn cache(&self) -> &Arc<BlobCache<T>> {
		&self.cache
	}

	/// Object URL registry backing the cache.
	pub fn registry(&self) -> &Arc<ObjectUrlRegistry> {
		self.cache.registry()
	}

	/// New binding for one consumer.
	pub fn bind(&self) -> BlobUrlBinding<T> {
		BlobUrlBinding::new(self.cache.clone())
	}

	/// Resolves `endpoint` through the cache, yielding `None` on failure or empty content.
	pub async fn resolve_blob_url(&self, endpoint: &str) -> Option<ObjectUrl> {
		self.cache.resolve(endpoint).await
	}

	/// Sends an authenticated request, bypassing the cache.
	pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<RawResponse> {
		self.fetch.request(endpoint, options).await
	}

	/// Background refresher using the configured interval; runs until dropped.
	pub async fn run_refresh_loop(&self) {
		self.tokens.run_refresh_loop(self.config.refresh_interval).await;
	}
}
#[cfg(feature = "reqwest")]
impl FetchContext<ReqwestHttpClient> {
	/// Wires the services over a default reqwest client.
	pub fn new(config: ClientConfig, identity: Arc<dyn IdentityClient>) -> Self {
		Self::with_transport(config, identity, Arc::new(ReqwestHttpClient::default()))
	}

	/// Wires the services over a default reqwest client and the configured Keycloak realm.
	pub fn keycloak(config: ClientConfig) -> Result<Self> {
		Self::with_keycloak(config, Arc::new(ReqwestHttpClient::default()))
	}
}
impl<T> Debug for FetchContext<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FetchContext")
			.field("config", &self.config)
			.field("tokens", &self.tokens)
			.field("cache", &self.cache)
			.finish()
	}
}
