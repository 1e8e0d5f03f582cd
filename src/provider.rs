//! Bearer token provider with collapsed refreshes.
//!
//! [`TokenProvider`] owns the current [`Session`] and hands out tokens that keep at least
//! the refresh threshold of validity. When the cached session is inside the threshold the
//! provider takes a single refresh guard, re-checks the session (another caller may have
//! renewed it meanwhile), and only then asks the [`IdentityClient`] to renew. Every caller
//! waiting on the guard observes the renewed session, so N concurrent requests trigger one
//! renewal. Callers that queued behind a renewal receive its outcome, success or failure,
//! instead of starting another one. A failed renewal still yields the current token while
//! it is unexpired.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::time::{self as tokio_time, MissedTickBehavior};
// self
use crate::{
	_prelude::*,
	auth::{Session, TokenClaims, TokenSecret},
	config::ClientConfig,
	error::AuthError,
	identity::{IdentityClient, InitOptions},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Outcome of the most recent renewal, tagged with the epoch it completed.
#[derive(Default)]
struct RefreshSlot {
	epoch: u64,
	outcome: Option<Result<bool, AuthError>>,
}

/// Shared source of valid bearer tokens.
pub struct TokenProvider {
	identity: Arc<dyn IdentityClient>,
	session: RwLock<Option<Session>>,
	refresh_guard: AsyncMutex<RefreshSlot>,
	refresh_epoch: AtomicU64,
	threshold: Duration,
	metrics: RefreshMetrics,
}
impl TokenProvider {
	/// Wraps an identity client using the default 30 second refresh threshold.
	pub fn new(identity: Arc<dyn IdentityClient>) -> Self {
		Self {
			identity,
			session: RwLock::new(None),
			refresh_guard: AsyncMutex::new(RefreshSlot::default()),
			refresh_epoch: AtomicU64::new(0),
			threshold: ClientConfig::DEFAULT_REFRESH_THRESHOLD,
			metrics: RefreshMetrics::default(),
		}
	}

	/// Overrides the minimum validity a handed-out token must keep.
	pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
		self.threshold = threshold;

		self
	}

	/// Minimum validity a handed-out token keeps.
	pub fn refresh_threshold(&self) -> Duration {
		self.threshold
	}

	/// Identity client the provider renews through.
	pub fn identity(&self) -> &Arc<dyn IdentityClient> {
		&self.identity
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Snapshot of the current session.
	pub fn session(&self) -> Option<Session> {
		self.session.read().clone()
	}

	/// Claims of the current session (the logged-in user).
	pub fn claims(&self) -> Option<TokenClaims> {
		self.session.read().as_ref().map(|session| session.claims.clone())
	}

	/// Returns `true` while a session is installed.
	pub fn is_authenticated(&self) -> bool {
		self.session.read().is_some()
	}

	/// Initializes the identity session and installs its token.
	pub async fn init(&self, options: InitOptions) -> Result<bool, AuthError> {
		let authenticated = self.identity.init(options).await?;

		if authenticated {
			self.sync_session()?;
		} else {
			*self.session.write() = None;
		}

		Ok(authenticated)
	}

	/// Returns a token with at least the refresh threshold of validity left.
	///
	/// Renews first when needed. If renewal fails the current token is still returned as
	/// long as it has not expired; otherwise the renewal error is propagated.
	pub async fn get_valid_token(&self) -> Result<TokenSecret, AuthError> {
		if let Some(token) = self.fresh_token(OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		let span = OpSpan::new(OpKind::TokenRefresh, "get_valid_token");

		span.instrument(async move {
			let outcome = self.refresh_guarded().await;

			match (outcome, self.unexpired_token(OffsetDateTime::now_utc())) {
				(Ok(_), Some(token)) => Ok(token),
				(Err(_), Some(token)) => {
					self.metrics.record_stale_served();

					Ok(token)
				},
				(Ok(_), None) => Err(self.missing_token_error()),
				(Err(err), None) => Err(err),
			}
		})
		.await
	}

	/// Renews the session when it is inside the refresh threshold.
	///
	/// Resolves to `true` when the identity client installed a new token.
	pub async fn refresh_if_needed(&self) -> Result<bool, AuthError> {
		self.refresh_guarded().await
	}

	/// Ends the session locally and at the identity client.
	pub async fn logout(&self) -> Result<(), AuthError> {
		let result = self.identity.logout().await;

		*self.session.write() = None;

		result
	}

	/// Periodically renews the session while one exists.
	///
	/// Runs until the returned future is dropped; outcomes are logged, never propagated.
	pub async fn run_refresh_loop(&self, interval: Duration) {
		let period = interval.unsigned_abs().max(std::time::Duration::from_millis(1));
		let mut ticker = tokio_time::interval_at(tokio_time::Instant::now() + period, period);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			ticker.tick().await;

			if self.identity.token().is_none() {
				continue;
			}

			let _ = self.refresh_guarded().await;
		}
	}

	async fn refresh_guarded(&self) -> Result<bool, AuthError> {
		const KIND: OpKind = OpKind::TokenRefresh;

		let observed = self.refresh_epoch.load(Ordering::Acquire);
		let mut slot = self.refresh_guard.lock().await;

		// A renewal finished while this caller waited; share its outcome.
		if let Some(outcome) = slot.outcome.as_ref().filter(|_| slot.epoch != observed) {
			return outcome.clone();
		}
		if self.fresh_token(OffsetDateTime::now_utc()).is_some() {
			return Ok(false);
		}

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let result = match self.identity.update_token(self.threshold).await {
			Ok(refreshed) => self.sync_session().map(|_| refreshed),
			Err(err) => Err(err),
		};

		self.metrics.record_outcome(&result);
		obs::record_op_outcome(
			KIND,
			if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure },
		);
		obs::log_refresh(&result);

		slot.epoch = slot.epoch.wrapping_add(1);
		slot.outcome = Some(result.clone());
		self.refresh_epoch.store(slot.epoch, Ordering::Release);

		result
	}

	fn sync_session(&self) -> Result<(), AuthError> {
		let session = match (self.identity.token(), self.identity.token_parsed()) {
			(Some(token), Some(claims)) => Some(Session::with_claims(token, claims)?),
			(Some(token), None) => Some(Session::from_jwt(token.expose())?),
			(None, _) => None,
		};

		*self.session.write() = session;

		Ok(())
	}

	fn fresh_token(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		self.session
			.read()
			.as_ref()
			.filter(|session| !session.needs_refresh_at(now, self.threshold))
			.map(|session| session.token.clone())
	}

	fn unexpired_token(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		self.session
			.read()
			.as_ref()
			.filter(|session| !session.is_expired_at(now))
			.map(|session| session.token.clone())
	}

	fn missing_token_error(&self) -> AuthError {
		if self.is_authenticated() { AuthError::Expired } else { AuthError::NotAuthenticated }
	}
}
impl Debug for TokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProvider")
			.field("session", &*self.session.read())
			.field("threshold", &self.threshold)
			.field("metrics", &self.metrics)
			.finish()
	}
}
