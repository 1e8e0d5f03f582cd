//! Internal OAuth client facade for the refresh-token grant.

pub use oauth2;

// crates.io
use oauth2::{
	AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	config::IdentityConfig,
	error::{AuthError, ConfigError, TransportError},
	http::{HttpTransport, OAuthHandle},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Tokens returned by a successful refresh grant.
pub(crate) struct RefreshedTokens {
	pub(crate) access_token: String,
	pub(crate) refresh_token: Option<String>,
}

pub(crate) struct RefreshFacade<T>
where
	T: ?Sized + HttpTransport,
{
	oauth_client: ConfiguredBasicClient,
	handle: OAuthHandle<T>,
}
impl<T> RefreshFacade<T>
where
	T: ?Sized + HttpTransport,
{
	pub(crate) fn from_config(config: &IdentityConfig, transport: Arc<T>) -> Result<Self> {
		let auth_url = AuthUrl::new(config.authorization_endpoint()?.to_string()).map_err(|_| {
			ConfigError::InvalidUrl { field: "identity", url: config.url.to_string() }
		})?;
		let token_url = TokenUrl::new(config.token_endpoint()?.to_string()).map_err(|_| {
			ConfigError::InvalidUrl { field: "identity", url: config.url.to_string() }
		})?;
		let mut oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if let Some(secret) = &config.client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.clone()));
		}

		Ok(Self { oauth_client, handle: OAuthHandle::new(transport) })
	}

	pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
		let secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&secret)
			.request_async(&self.handle)
			.await
			.map_err(map_request_error)?;

		Ok(RefreshedTokens {
			access_token: response.access_token().secret().to_owned(),
			refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
		})
	}
}

fn map_request_error(err: BasicRequestTokenError<HttpClientError<TransportError>>) -> AuthError {
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response),
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) => AuthError::identity(*inner),
		RequestTokenError::Request(HttpClientError::Io(inner)) =>
			AuthError::identity(TransportError::from(inner)),
		RequestTokenError::Request(other) => AuthError::identity(other),
		RequestTokenError::Parse(source, _body) =>
			AuthError::MalformedResponse { source: Arc::new(source) },
		RequestTokenError::Other(message) =>
			AuthError::identity(std::io::Error::other(format!(
				"Token endpoint returned an unexpected response: {message}."
			))),
	}
}

fn map_server_response_error(response: BasicErrorResponse) -> AuthError {
	let reason = match response.error_description() {
		Some(description) => description.clone(),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidGrant
		| BasicErrorResponseType::InvalidClient
		| BasicErrorResponseType::UnauthorizedClient => AuthError::RefreshRejected { reason },
		_ => AuthError::identity(std::io::Error::other(format!(
			"Token endpoint returned an OAuth error: {reason}."
		))),
	}
}
