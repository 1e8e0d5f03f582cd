//! Identity collaborator contract (a Keycloak-style session client) and its implementations.

pub mod keycloak;

pub use keycloak::KeycloakClient;

// self
use crate::{
	_prelude::*,
	auth::{TokenClaims, TokenSecret},
	error::AuthError,
};

/// Boxed future returned by [`IdentityClient`] operations.
pub type IdentityFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + 'a + Send>>;

/// Session client issuing and renewing bearer tokens.
///
/// Mirrors the surface the viewer needs from its identity provider: initialize a
/// session, renew it when its remaining validity drops under a threshold, and expose
/// the current raw token together with its parsed claims. Implementations keep their
/// own token state; the [`TokenProvider`](crate::provider::TokenProvider) reads it after
/// every renewal and never caches a copy across a suspension point.
pub trait IdentityClient
where
	Self: Send + Sync,
{
	/// Establishes a session; resolves to `true` when the user is authenticated.
	fn init(&self, options: InitOptions) -> IdentityFuture<'_, bool>;

	/// Renews the token when less than `min_validity` remains.
	///
	/// Resolves to `true` when a new token was installed and `false` when the current
	/// one was still valid long enough.
	fn update_token(&self, min_validity: Duration) -> IdentityFuture<'_, bool>;

	/// Current raw access token, if a session exists.
	fn token(&self) -> Option<TokenSecret>;

	/// Claims parsed from the current access token, if a session exists.
	fn token_parsed(&self) -> Option<TokenClaims>;

	/// Ends the local session.
	fn logout(&self) -> IdentityFuture<'_, ()>;
}

/// Tokens a session can be initialized from (typically handed over by the login redirect).
#[derive(Clone, Default)]
pub struct InitOptions {
	/// Previously issued access token.
	pub token: Option<TokenSecret>,
	/// Previously issued refresh token.
	pub refresh_token: Option<TokenSecret>,
}
impl InitOptions {
	/// Starts from an access token.
	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(TokenSecret::new(token));

		self
	}

	/// Starts from a refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}
}
impl Debug for InitOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InitOptions")
			.field("token_set", &self.token.is_some())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.finish()
	}
}
