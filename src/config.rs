//! Validated client configuration (API base, identity realm, timing, cache bounds).
//!
//! Values are assembled through [`ClientConfigBuilder`], which enforces HTTPS for
//! remote endpoints (loopback hosts may use plain HTTP for local stacks and tests),
//! strictly positive durations, and a retry policy allowing at least one attempt.
//! [`ClientConfig::from_json_slice`] feeds a JSON document through the same builder.

// std
use std::num::NonZeroUsize;
// self
use crate::{_prelude::*, error::ConfigError};

/// Bounded exponential backoff applied to transport failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubles for each further attempt.
	pub base_delay: Duration,
	/// Upper bound for any single delay.
	pub max_delay: Duration,
}
impl RetryPolicy {
	/// Single attempt, no retries.
	pub const fn none() -> Self {
		Self { max_attempts: 1, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
	}

	/// Delay to wait after `failed_attempt` (1-based) before trying again.
	pub fn delay_after(&self, failed_attempt: u32) -> Duration {
		let exponent = failed_attempt.saturating_sub(1).min(16);
		let factor = 1_i32 << exponent;

		self.base_delay.checked_mul(factor).unwrap_or(self.max_delay).min(self.max_delay)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::milliseconds(200),
			max_delay: Duration::seconds(2),
		}
	}
}

/// Keycloak realm and client used to renew bearer tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityConfig {
	/// Keycloak server root, e.g. `https://sso.example.com/`.
	pub url: Url,
	/// Realm name.
	pub realm: String,
	/// Public or confidential client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	pub client_secret: Option<String>,
}
impl IdentityConfig {
	/// Creates a public-client configuration.
	pub fn new(url: Url, realm: impl Into<String>, client_id: impl Into<String>) -> Self {
		Self { url, realm: realm.into(), client_id: client_id.into(), client_secret: None }
	}

	/// Attaches a client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// OpenID Connect token endpoint of the realm.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		self.realm_endpoint("token")
	}

	/// OpenID Connect authorization endpoint of the realm.
	pub fn authorization_endpoint(&self) -> Result<Url, ConfigError> {
		self.realm_endpoint("auth")
	}

	fn realm_endpoint(&self, leaf: &str) -> Result<Url, ConfigError> {
		let mut url = self.url.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidUrl { field: "identity", url: self.url.to_string() })?
			.pop_if_empty()
			.extend(["realms", self.realm.as_str(), "protocol", "openid-connect", leaf]);

		Ok(url)
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		if self.realm.trim().is_empty() {
			return Err(ConfigError::MissingIdentityField { field: "realm" });
		}
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingIdentityField { field: "client_id" });
		}

		validate_endpoint("identity", &self.url)
	}
}
impl Debug for IdentityConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityConfig")
			.field("url", &self.url.as_str())
			.field("realm", &self.realm)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.finish()
	}
}

/// Settings for one application context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Base URL relative endpoints are joined onto.
	pub api_base: Url,
	/// Identity realm; `None` when the caller supplies its own identity client.
	pub identity: Option<IdentityConfig>,
	/// Minimum validity a token must have when handed to a request.
	pub refresh_threshold: Duration,
	/// Period of the background refresh loop.
	pub refresh_interval: Duration,
	/// Per-attempt timeout; `None` waits indefinitely.
	pub request_timeout: Option<Duration>,
	/// Backoff policy for transport failures.
	pub retry: RetryPolicy,
	/// Maximum cached object URLs; `None` keeps every entry for the context's lifetime.
	///
	/// Evicted URLs are revoked even if a consumer still displays them; bindings then report
	/// no URL until their endpoint is set again.
	pub cache_capacity: Option<NonZeroUsize>,
}
impl ClientConfig {
	/// Default refresh threshold (30 seconds).
	pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::seconds(30);
	/// Default background refresh period (30 seconds).
	pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::seconds(30);
	/// Default per-attempt timeout (30 seconds).
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);

	/// Returns a builder for the given API base.
	pub fn builder(api_base: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(api_base)
	}

	/// Parses and validates a JSON configuration document.
	///
	/// ```json
	/// {
	///   "api_base": "https://viewer.example.com/",
	///   "identity": { "url": "https://sso.example.com/", "realm": "histo", "client_id": "viewer" },
	///   "refresh_threshold_secs": 30,
	///   "request_timeout_secs": 20,
	///   "retry": { "max_attempts": 3, "base_delay_ms": 200, "max_delay_ms": 2000 },
	///   "cache_capacity": 512
	/// }
	/// ```
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let file: ClientConfigFile = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source: Arc::new(source) })?;

		file.into_builder()?.build()
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	api_base: Url,
	identity: Option<IdentityConfig>,
	refresh_threshold: Duration,
	refresh_interval: Duration,
	request_timeout: Option<Duration>,
	retry: RetryPolicy,
	cache_capacity: Option<NonZeroUsize>,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(api_base: Url) -> Self {
		Self {
			api_base,
			identity: None,
			refresh_threshold: ClientConfig::DEFAULT_REFRESH_THRESHOLD,
			refresh_interval: ClientConfig::DEFAULT_REFRESH_INTERVAL,
			request_timeout: Some(ClientConfig::DEFAULT_REQUEST_TIMEOUT),
			retry: RetryPolicy::default(),
			cache_capacity: None,
		}
	}

	/// Sets the Keycloak realm used for refreshes.
	pub fn identity(mut self, identity: IdentityConfig) -> Self {
		self.identity = Some(identity);

		self
	}

	/// Overrides the refresh threshold.
	pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold = threshold;

		self
	}

	/// Overrides the background refresh period.
	pub fn refresh_interval(mut self, interval: Duration) -> Self {
		self.refresh_interval = interval;

		self
	}

	/// Overrides the per-attempt timeout; `None` disables it.
	pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the retry policy.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Bounds the blob cache; `None` keeps it unbounded.
	pub fn cache_capacity(mut self, capacity: Option<NonZeroUsize>) -> Self {
		self.cache_capacity = capacity;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			api_base: self.api_base,
			identity: self.identity,
			refresh_threshold: self.refresh_threshold,
			refresh_interval: self.refresh_interval,
			request_timeout: self.request_timeout,
			retry: self.retry,
			cache_capacity: self.cache_capacity,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if self.api_base.cannot_be_a_base() {
			return Err(ConfigError::InvalidUrl {
				field: "api_base",
				url: self.api_base.to_string(),
			});
		}

		validate_endpoint("api_base", &self.api_base)?;

		if let Some(identity) = &self.identity {
			identity.validate()?;
		}
		if !self.refresh_threshold.is_positive() {
			return Err(ConfigError::NonPositiveDuration { field: "refresh_threshold" });
		}
		if !self.refresh_interval.is_positive() {
			return Err(ConfigError::NonPositiveDuration { field: "refresh_interval" });
		}
		if self.request_timeout.is_some_and(|timeout| !timeout.is_positive()) {
			return Err(ConfigError::NonPositiveDuration { field: "request_timeout" });
		}
		if self.retry.max_attempts == 0 {
			return Err(ConfigError::ZeroAttempts);
		}
		if self.retry.base_delay.is_negative() || self.retry.max_delay.is_negative() {
			return Err(ConfigError::NonPositiveDuration { field: "retry" });
		}

		Ok(())
	}
}

fn validate_endpoint(field: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { field, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientConfigFile {
	api_base: String,
	#[serde(default)]
	identity: Option<IdentityFile>,
	#[serde(default)]
	refresh_threshold_secs: Option<i64>,
	#[serde(default)]
	refresh_interval_secs: Option<i64>,
	#[serde(default)]
	request_timeout_secs: Option<i64>,
	#[serde(default)]
	retry: Option<RetryFile>,
	#[serde(default)]
	cache_capacity: Option<NonZeroUsize>,
}
impl ClientConfigFile {
	fn into_builder(self) -> Result<ClientConfigBuilder, ConfigError> {
		let api_base = parse_url("api_base", &self.api_base)?;
		let mut builder = ClientConfigBuilder::new(api_base).cache_capacity(self.cache_capacity);

		if let Some(identity) = self.identity {
			let mut config = IdentityConfig::new(
				parse_url("identity", &identity.url)?,
				identity.realm,
				identity.client_id,
			);

			config.client_secret = identity.client_secret;
			builder = builder.identity(config);
		}
		if let Some(secs) = self.refresh_threshold_secs {
			builder = builder.refresh_threshold(Duration::seconds(secs));
		}
		if let Some(secs) = self.refresh_interval_secs {
			builder = builder.refresh_interval(Duration::seconds(secs));
		}
		if let Some(secs) = self.request_timeout_secs {
			builder = builder.request_timeout(Some(Duration::seconds(secs)));
		}
		if let Some(retry) = self.retry {
			builder = builder.retry(RetryPolicy {
				max_attempts: retry.max_attempts,
				base_delay: Duration::milliseconds(retry.base_delay_ms),
				max_delay: Duration::milliseconds(retry.max_delay_ms),
			});
		}

		Ok(builder)
	}
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IdentityFile {
	url: String,
	realm: String,
	client_id: String,
	#[serde(default)]
	client_secret: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryFile {
	max_attempts: u32,
	base_delay_ms: i64,
	max_delay_ms: i64,
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|_| ConfigError::InvalidUrl { field, url: raw.to_owned() })
}
