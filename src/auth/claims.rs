//! Access-token claims decoded from the JWT payload.
//!
//! The identity provider signs its tokens; this crate only reads the payload to learn the
//! expiry and the current user, so signatures are never checked here.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Errors emitted while decoding token claims.
#[derive(Clone, Debug, ThisError)]
pub enum ClaimsError {
	/// Token does not have the `header.payload.signature` shape.
	#[error("Access token is not a compact JWT.")]
	Malformed,
	/// Payload segment is not base64url.
	#[error("Access token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// Payload segment is not the expected JSON object.
	#[error("Access token payload is not a valid claims object.")]
	Json {
		/// Structured parsing failure with the offending path.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// The `exp` claim cannot be represented as a timestamp.
	#[error("The exp claim {exp} is out of range.")]
	ExpiryOutOfRange {
		/// Raw `exp` value.
		exp: i64,
	},
}

/// Claims the viewer reads from an access token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Expiry as seconds since the Unix epoch.
	pub exp: i64,
	/// Issued-at as seconds since the Unix epoch.
	#[serde(default)]
	pub iat: Option<i64>,
	/// Subject identifier.
	#[serde(default)]
	pub sub: Option<String>,
	/// Login name of the current user.
	#[serde(default)]
	pub preferred_username: Option<String>,
	/// E-mail address of the current user.
	#[serde(default)]
	pub email: Option<String>,
	/// Display name of the current user.
	#[serde(default)]
	pub name: Option<String>,
	/// Every other claim, kept verbatim.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}
impl TokenClaims {
	/// Decodes the payload segment of a compact JWT.
	pub fn from_jwt(token: &str) -> Result<Self, ClaimsError> {
		let mut segments = token.split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
			_ => return Err(ClaimsError::Malformed),
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ClaimsError::Json { source: Arc::new(source) })
	}

	/// Expiry instant derived from `exp`.
	pub fn expires_at(&self) -> Result<OffsetDateTime, ClaimsError> {
		OffsetDateTime::from_unix_timestamp(self.exp)
			.map_err(|_| ClaimsError::ExpiryOutOfRange { exp: self.exp })
	}

	/// Best label for the current user, preferring the login name.
	pub fn username(&self) -> Option<&str> {
		self.preferred_username.as_deref().or(self.sub.as_deref())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn encode(payload: &str) -> String {
		format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
	}

	#[test]
	fn decodes_keycloak_payload() {
		let token = encode(
			r#"{"exp":1767225600,"iat":1767225300,"sub":"f3a1","preferred_username":"pathologist","realm_access":{"roles":["viewer"]}}"#,
		);
		let claims = TokenClaims::from_jwt(&token).expect("Claims fixture should decode.");

		assert_eq!(claims.username(), Some("pathologist"));
		assert_eq!(claims.iat, Some(1_767_225_300));
		assert!(claims.extra.contains_key("realm_access"));
		assert_eq!(
			claims.expires_at().expect("Expiry should be in range."),
			time::macros::datetime!(2026-01-01 00:00 UTC)
		);
	}

	#[test]
	fn rejects_non_jwt_shapes() {
		assert!(matches!(TokenClaims::from_jwt("opaque-token"), Err(ClaimsError::Malformed)));
		assert!(matches!(TokenClaims::from_jwt("a..c"), Err(ClaimsError::Malformed)));
		assert!(matches!(TokenClaims::from_jwt("a.b.c.d"), Err(ClaimsError::Malformed)));
		assert!(matches!(TokenClaims::from_jwt("a.!!!.c"), Err(ClaimsError::Base64(_))));
	}

	#[test]
	fn missing_exp_reports_the_path() {
		let err = TokenClaims::from_jwt(&encode(r#"{"sub":"f3a1"}"#))
			.expect_err("Claims without exp must be rejected.");

		assert!(matches!(err, ClaimsError::Json { .. }));
	}
}
