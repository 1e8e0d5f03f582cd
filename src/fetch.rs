//! Authenticated requests against the viewer API.
//!
//! [`AuthenticatedFetch::request`] joins the endpoint onto the API base, obtains a valid
//! bearer token for every attempt, and dispatches through the configured
//! [`HttpTransport`]. Responses are returned whatever their status; only transport
//! failures are retried, with the backoff described by [`RetryPolicy`]. Each attempt is
//! bounded by the optional request timeout.

pub use oauth2::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

// crates.io
use oauth2::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	blob::Blob,
	config::{ClientConfig, RetryPolicy},
	error::{ConfigError, DecodeError},
	http::{HttpRequest, HttpResponse, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
	provider::TokenProvider,
};

const APPLICATION_JSON: &str = "application/json";

/// Method, headers, and body of one request.
#[derive(Clone, Debug)]
pub struct RequestOptions {
	method: Method,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl RequestOptions {
	/// Empty request using `method`.
	pub fn new(method: Method) -> Self {
		Self { method, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Plain `GET`.
	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	/// Plain `DELETE`.
	pub fn delete() -> Self {
		Self::new(Method::DELETE)
	}

	/// Request carrying `body` serialized as JSON.
	pub fn json<B>(method: Method, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		let payload = serde_json::to_vec(body)?;

		Ok(Self::new(method)
			.header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))
			.header(ACCEPT, HeaderValue::from_static(APPLICATION_JSON))
			.body(payload))
	}

	/// Sets a header, replacing earlier values of the same name.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Replaces the body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Request method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Caller-supplied headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	fn to_http_request(&self, url: &Url, token: &TokenSecret) -> Result<HttpRequest> {
		let mut request = oauth2::http::Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.body(self.body.clone())
			.map_err(ConfigError::from)?;
		let bearer = token
			.bearer_header()
			.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		*request.headers_mut() = self.headers.clone();
		request.headers_mut().insert(AUTHORIZATION, bearer);

		Ok(request)
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self::get()
	}
}

/// Response passed through from the API, whatever its status.
#[derive(Clone, Debug)]
pub struct RawResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl RawResponse {
	/// HTTP status.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Returns `true` for any 2xx status.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` for `204 No Content`.
	pub fn is_no_content(&self) -> bool {
		self.status == StatusCode::NO_CONTENT
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// `Content-Type` header, when present and printable.
	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
	}

	/// Buffered body.
	pub fn bytes(&self) -> &[u8] {
		&self.body
	}

	/// Consumes the response, returning its body.
	pub fn into_body(self) -> Vec<u8> {
		self.body
	}

	/// Deserializes the body; `204` and empty bodies yield `None`.
	pub fn json<T>(&self) -> Result<Option<T>, DecodeError>
	where
		T: DeserializeOwned,
	{
		if self.is_no_content() || self.body.is_empty() {
			return Ok(None);
		}

		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map(Some)
			.map_err(|source| DecodeError::Json { source: Arc::new(source) })
	}

	/// Turns non-2xx statuses into [`Error::Http`].
	pub fn error_for_status(self) -> Result<Self> {
		if self.is_success() { Ok(self) } else { Err(Error::Http { status: self.status.as_u16() }) }
	}

	/// Converts the body into a [`Blob`] tagged with the response media type.
	pub fn into_blob(self) -> Blob {
		let content_type = self.content_type().map(str::to_owned);

		Blob::new(self.body, content_type)
	}
}
impl From<HttpResponse> for RawResponse {
	fn from(response: HttpResponse) -> Self {
		let (parts, body) = response.into_parts();

		Self { status: parts.status, headers: parts.headers, body }
	}
}

/// Request function attaching the current bearer token.
pub struct AuthenticatedFetch<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	tokens: Arc<TokenProvider>,
	api_base: Url,
	timeout: Option<Duration>,
	retry: RetryPolicy,
}
impl<T> AuthenticatedFetch<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a fetcher with the default timeout and retry policy.
	pub fn new(transport: Arc<T>, tokens: Arc<TokenProvider>, api_base: Url) -> Self {
		Self {
			transport,
			tokens,
			api_base,
			timeout: Some(ClientConfig::DEFAULT_REQUEST_TIMEOUT),
			retry: RetryPolicy::default(),
		}
	}

	/// Creates a fetcher using the base URL, timeout, and retry policy of `config`.
	pub fn from_config(
		config: &ClientConfig,
		transport: Arc<T>,
		tokens: Arc<TokenProvider>,
	) -> Self {
		Self::new(transport, tokens, config.api_base.clone())
			.with_timeout(config.request_timeout)
			.with_retry(config.retry)
	}

	/// Overrides the per-attempt timeout; `None` waits indefinitely.
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Base URL endpoints are joined onto.
	pub fn api_base(&self) -> &Url {
		&self.api_base
	}

	/// Token provider consulted before every attempt.
	pub fn tokens(&self) -> &Arc<TokenProvider> {
		&self.tokens
	}

	/// Resolves `endpoint` against the API base.
	pub fn resolve_url(&self, endpoint: &str) -> Result<Url, ConfigError> {
		self.api_base
			.join(endpoint)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: endpoint.to_owned(), source })
	}

	/// `GET` shorthand for [`request`](Self::request).
	pub async fn get(&self, endpoint: &str) -> Result<RawResponse> {
		self.request(endpoint, RequestOptions::get()).await
	}

	/// Sends `options` to `endpoint` with `Authorization: Bearer <token>` attached.
	///
	/// A caller-supplied `Authorization` header is rejected before any token or network
	/// work. Non-2xx responses are returned unmodified.
	pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<RawResponse> {
		const KIND: OpKind = OpKind::Request;

		if options.headers.contains_key(AUTHORIZATION) {
			return Err(ConfigError::ConflictingAuthorization.into());
		}

		let url = self.resolve_url(endpoint)?;
		let span = OpSpan::new(KIND, "request");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let mut attempt = 1;

				loop {
					match self.attempt(&url, &options).await {
						Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
							let delay = self.retry.delay_after(attempt);

							obs::log_retry(endpoint, attempt, delay, &err);
							tokio::time::sleep(delay.unsigned_abs()).await;

							attempt += 1;
						},
						outcome => return outcome,
					}
				}
			})
			.await;

		obs::record_op_outcome(
			KIND,
			if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure },
		);

		result
	}

	async fn attempt(&self, url: &Url, options: &RequestOptions) -> Result<RawResponse> {
		let token = self.tokens.get_valid_token().await?;
		let request = options.to_http_request(url, &token)?;
		let pending = self.transport.execute(request);
		let response = match self.timeout {
			Some(after) => tokio::time::timeout(after.unsigned_abs(), pending)
				.await
				.map_err(|_| Error::Timeout { after })??,
			None => pending.await?,
		};

		Ok(response.into())
	}
}
impl<T> Debug for AuthenticatedFetch<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedFetch")
			.field("api_base", &self.api_base.as_str())
			.field("timeout", &self.timeout)
			.field("retry", &self.retry)
			.finish()
	}
}
