//! Transport primitives shared by resource fetches and identity-provider calls.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Every outbound
//! request (image fetches through [`AuthenticatedFetch`](crate::fetch::AuthenticatedFetch)
//! and refresh grants through [`KeycloakClient`](crate::identity::KeycloakClient)) goes
//! through one implementation, so tests can swap the network for a scripted fake and
//! production code can bring its own client. [`OAuthHandle`] adapts any transport to the
//! `oauth2` crate's [`AsyncHttpClient`] contract.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
// self
use crate::{_prelude::*, error::TransportError};

pub use oauth2::{HttpRequest, HttpResponse};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute a fully-formed request.
///
/// Implementations must return every response, whatever its status, and reserve
/// [`TransportError`] for failures where no response was obtained or its body could
/// not be read. They are shared behind `Arc` across the token provider, fetch layer,
/// and cache, so they must be `Send + Sync + 'static`.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Dispatches `request` and buffers the full response body.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// [`AsyncHttpClient`] adapter handing `oauth2` requests to an [`HttpTransport`].
pub struct OAuthHandle<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
}
impl<T> OAuthHandle<T>
where
	T: ?Sized + HttpTransport,
{
	/// Wraps a shared transport.
	pub fn new(transport: Arc<T>) -> Self {
		Self { transport }
	}
}
impl<'c, T> AsyncHttpClient<'c> for OAuthHandle<T>
where
	T: ?Sized + HttpTransport,
{
	type Error = HttpClientError<TransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let transport = Arc::clone(&self.transport);

		Box::pin(async move {
			transport.execute(request).await.map_err(|e| HttpClientError::Reqwest(Box::new(e)))
		})
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are followed with reqwest's default policy; image endpoints answer
/// directly, and the token endpoint never redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with a connect timeout, leaving per-request timeouts to the fetch layer.
	pub fn with_connect_timeout(timeout: Duration) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().connect_timeout(timeout.unsigned_abs()).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request =
				reqwest::Request::try_from(request).map_err(TransportError::invalid_request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(TransportError::body)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{Method, StatusCode};
	// self
	use super::*;

	struct EchoTransport;
	impl HttpTransport for EchoTransport {
		fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let mut response = HttpResponse::new(request.uri().to_string().into_bytes());

				*response.status_mut() = StatusCode::ACCEPTED;

				Ok(response)
			})
		}
	}

	struct BrokenTransport;
	impl HttpTransport for BrokenTransport {
		fn execute(&self, _request: HttpRequest) -> TransportFuture<'_> {
			Box::pin(async move { Err(TransportError::from(std::io::Error::other("refused"))) })
		}
	}

	fn request(uri: &str) -> HttpRequest {
		oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(uri)
			.body(Vec::new())
			.expect("Request fixture should build.")
	}

	#[tokio::test]
	async fn oauth_handle_forwards_to_transport() {
		let handle = OAuthHandle::new(Arc::new(EchoTransport));
		let response = handle
			.call(request("https://idp.example.com/token"))
			.await
			.expect("Echo transport should answer.");

		assert_eq!(response.status(), StatusCode::ACCEPTED);
		assert_eq!(response.body().as_slice(), b"https://idp.example.com/token");
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn unconvertible_requests_are_not_retried() {
		let err = ReqwestHttpClient::default()
			.execute(request("/realms/histo/token"))
			.await
			.expect_err("A relative URI cannot be sent.");

		assert!(matches!(err, TransportError::InvalidRequest { .. }));

		let err = Error::from(err);

		assert!(matches!(err, Error::Config(crate::error::ConfigError::InvalidRequest { .. })));
		assert!(!err.is_retryable());
	}

	#[tokio::test]
	async fn oauth_handle_wraps_transport_errors() {
		let handle = OAuthHandle::new(Arc::new(BrokenTransport));
		let err = handle
			.call(request("https://idp.example.com/token"))
			.await
			.expect_err("Broken transport should fail.");

		assert!(matches!(
			err,
			HttpClientError::Reqwest(inner) if matches!(*inner, TransportError::Io(_))
		));
	}
}
