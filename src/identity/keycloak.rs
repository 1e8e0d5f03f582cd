//! Keycloak session client renewing tokens through the realm's token endpoint.
//!
//! The client keeps the access token, the refresh token, and the decoded claims in one
//! snapshot. [`IdentityClient::update_token`] compares the remaining validity against the
//! caller's threshold and, when it is too short, performs a `grant_type=refresh_token`
//! exchange at `<url>/realms/<realm>/protocol/openid-connect/token`.

// self
use crate::{
	_prelude::*,
	auth::{TokenClaims, TokenSecret},
	config::IdentityConfig,
	error::AuthError,
	http::HttpTransport,
	identity::{IdentityClient, IdentityFuture, InitOptions},
	oauth::RefreshFacade,
};

#[derive(Clone)]
struct KeycloakState {
	access: TokenSecret,
	refresh: Option<TokenSecret>,
	claims: TokenClaims,
}

/// [`IdentityClient`] backed by a Keycloak realm.
pub struct KeycloakClient<T>
where
	T: ?Sized + HttpTransport,
{
	config: IdentityConfig,
	facade: RefreshFacade<T>,
	state: RwLock<Option<KeycloakState>>,
}
impl<T> KeycloakClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Validates `config` and prepares a client without a session.
	pub fn new(config: IdentityConfig, transport: Arc<T>) -> Result<Self> {
		config.validate()?;

		let facade = RefreshFacade::from_config(&config, transport)?;

		Ok(Self { config, facade, state: RwLock::new(None) })
	}

	/// Realm settings the client was built with.
	pub fn config(&self) -> &IdentityConfig {
		&self.config
	}

	/// Returns `true` while a session is installed.
	pub fn is_authenticated(&self) -> bool {
		self.state.read().is_some()
	}

	async fn exchange(&self, refresh: &TokenSecret) -> Result<KeycloakState, AuthError> {
		let tokens = self.facade.refresh(refresh.expose()).await?;
		let claims = TokenClaims::from_jwt(&tokens.access_token)?;
		// Keycloak may keep the refresh token unchanged and omit it from the response.
		let refresh =
			tokens.refresh_token.map(TokenSecret::new).unwrap_or_else(|| refresh.clone());

		Ok(KeycloakState {
			access: TokenSecret::new(tokens.access_token),
			refresh: Some(refresh),
			claims,
		})
	}

	fn install(&self, state: KeycloakState) {
		*self.state.write() = Some(state);
	}
}
impl<T> IdentityClient for KeycloakClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn init(&self, options: InitOptions) -> IdentityFuture<'_, bool> {
		Box::pin(async move {
			let InitOptions { token, refresh_token } = options;
			let state = match (token, refresh_token) {
				(Some(access), refresh) => {
					let claims = TokenClaims::from_jwt(access.expose())?;
					let expired = claims.expires_at()? <= OffsetDateTime::now_utc();

					match refresh {
						Some(refresh) if expired => self.exchange(&refresh).await?,
						refresh => KeycloakState { access, refresh, claims },
					}
				},
				(None, Some(refresh)) => self.exchange(&refresh).await?,
				(None, None) => {
					*self.state.write() = None;

					return Ok(false);
				},
			};

			self.install(state);

			Ok(true)
		})
	}

	fn update_token(&self, min_validity: Duration) -> IdentityFuture<'_, bool> {
		Box::pin(async move {
			let current = self.state.read().clone().ok_or(AuthError::NotAuthenticated)?;
			let remaining = current.claims.expires_at()? - OffsetDateTime::now_utc();

			if remaining >= min_validity {
				return Ok(false);
			}

			let Some(refresh) = current.refresh else {
				return Err(AuthError::RefreshRejected {
					reason: "no refresh token is held for this session".into(),
				});
			};
			let renewed = self.exchange(&refresh).await?;

			self.install(renewed);

			Ok(true)
		})
	}

	fn token(&self) -> Option<TokenSecret> {
		self.state.read().as_ref().map(|state| state.access.clone())
	}

	fn token_parsed(&self) -> Option<TokenClaims> {
		self.state.read().as_ref().map(|state| state.claims.clone())
	}

	fn logout(&self) -> IdentityFuture<'_, ()> {
		Box::pin(async move {
			*self.state.write() = None;

			Ok(())
		})
	}
}
impl<T> Debug for KeycloakClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeycloakClient")
			.field("config", &self.config)
			.field("authenticated", &self.is_authenticated())
			.finish()
	}
}
