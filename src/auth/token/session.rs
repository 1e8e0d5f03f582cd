//! Session snapshot held by the token provider and its freshness rules.

// self
use crate::{
	_prelude::*,
	auth::{ClaimsError, TokenClaims, TokenSecret},
};

/// Freshness of a session relative to a refresh threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
	/// At least the refresh threshold of validity remains.
	Fresh,
	/// Still valid, but inside the refresh threshold.
	Stale,
	/// Expiry instant has passed.
	Expired,
}

/// Current bearer token with its parsed expiry.
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
	/// Raw bearer token; callers must avoid logging it.
	pub token: TokenSecret,
	/// Claims decoded from the token payload.
	pub claims: TokenClaims,
	/// Expiry instant taken from the `exp` claim.
	pub expires_at: OffsetDateTime,
	/// Instant the provider last installed this token.
	pub installed_at: OffsetDateTime,
}
impl Session {
	/// Builds a session from a compact JWT, reading the expiry from its claims.
	pub fn from_jwt(token: impl Into<String>) -> Result<Self, ClaimsError> {
		let token = TokenSecret::new(token);
		let claims = TokenClaims::from_jwt(token.expose())?;

		Self::with_claims(token, claims)
	}

	/// Builds a session from an already-decoded claims set.
	pub fn with_claims(token: TokenSecret, claims: TokenClaims) -> Result<Self, ClaimsError> {
		let expires_at = claims.expires_at()?;

		Ok(Self { token, claims, expires_at, installed_at: OffsetDateTime::now_utc() })
	}

	/// Validity left at `now`; negative once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}

	/// Classifies the session against `threshold` at `now`.
	pub fn status_at(&self, now: OffsetDateTime, threshold: Duration) -> SessionStatus {
		let remaining = self.remaining_at(now);

		if remaining <= Duration::ZERO {
			SessionStatus::Expired
		} else if remaining < threshold {
			SessionStatus::Stale
		} else {
			SessionStatus::Fresh
		}
	}

	/// Returns `true` when a refresh must be attempted before handing the token out.
	pub fn needs_refresh_at(&self, now: OffsetDateTime, threshold: Duration) -> bool {
		!matches!(self.status_at(now, threshold), SessionStatus::Fresh)
	}

	/// Returns `true` once the expiry instant has passed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		matches!(self.status_at(now, Duration::ZERO), SessionStatus::Expired)
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("token", &"<redacted>")
			.field("subject", &self.claims.sub)
			.field("expires_at", &self.expires_at)
			.field("installed_at", &self.installed_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn session(expires_at: OffsetDateTime) -> Session {
		let claims = TokenClaims {
			exp: expires_at.unix_timestamp(),
			iat: None,
			sub: Some("user-1".into()),
			preferred_username: None,
			email: None,
			name: None,
			extra: Default::default(),
		};

		Session::with_claims(TokenSecret::new("s3cr3t-bearer"), claims)
			.expect("Session fixture should build from in-range claims.")
	}

	#[test]
	fn status_transitions_follow_threshold() {
		let session = session(macros::datetime!(2026-03-01 12:00 UTC));
		let threshold = Duration::seconds(30);

		assert_eq!(
			session.status_at(macros::datetime!(2026-03-01 11:59:00 UTC), threshold),
			SessionStatus::Fresh
		);
		assert_eq!(
			session.status_at(macros::datetime!(2026-03-01 11:59:30 UTC), threshold),
			SessionStatus::Fresh
		);
		assert_eq!(
			session.status_at(macros::datetime!(2026-03-01 11:59:31 UTC), threshold),
			SessionStatus::Stale
		);
		assert_eq!(
			session.status_at(macros::datetime!(2026-03-01 12:00 UTC), threshold),
			SessionStatus::Expired
		);
		assert!(session.needs_refresh_at(macros::datetime!(2026-03-01 11:59:45 UTC), threshold));
		assert!(!session.is_expired_at(macros::datetime!(2026-03-01 11:59:45 UTC)));
	}

	#[test]
	fn debug_redacts_token() {
		let rendered = format!("{:?}", session(macros::datetime!(2026-03-01 12:00 UTC)));

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("s3cr3t-bearer"));
	}
}
