//! Crate-level error types shared by the token, fetch, and cache layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every variant is cheap to clone, so one outcome can be handed to all callers that
/// waited on the same refresh or fetch.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Bearer token could not be obtained or refreshed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Transport failure (DNS, TCP, TLS); the only retryable kind.
	#[error(transparent)]
	Transport(TransportError),
	/// Response body could not be read or decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Endpoint answered with a non-success status.
	#[error("Endpoint responded with HTTP status {status}.")]
	Http {
		/// HTTP status code returned by the endpoint.
		status: u16,
	},
	/// A single request attempt exceeded the configured timeout.
	#[error("Request did not complete within {after}.")]
	Timeout {
		/// Timeout that elapsed.
		after: Duration,
	},
}
impl Error {
	/// Returns `true` for failures worth retrying with backoff.
	///
	/// Only transport-level failures qualify; HTTP statuses are answers, not accidents.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transport(_))
	}
}
impl From<TransportError> for Error {
	fn from(e: TransportError) -> Self {
		match e {
			TransportError::Body { source } => Self::Decode(DecodeError::Body { source }),
			TransportError::InvalidRequest { source } =>
				Self::Config(ConfigError::InvalidRequest { source }),
			other => Self::Transport(other),
		}
	}
}

/// Token acquisition failures raised by the identity layer.
#[derive(Clone, Debug, ThisError)]
pub enum AuthError {
	/// No session exists (never initialized, or logged out).
	#[error("No authenticated session is available.")]
	NotAuthenticated,
	/// Session exists but its token expired and could not be renewed.
	#[error("Access token expired and could not be refreshed.")]
	Expired,
	/// Identity provider rejected the refresh grant.
	#[error("Identity provider rejected the token refresh: {reason}.")]
	RefreshRejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Identity provider could not be reached or answered unexpectedly.
	#[error("Identity provider request failed.")]
	Identity {
		/// Underlying transport or protocol failure.
		#[source]
		source: SharedError,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Identity provider returned a malformed token response.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// Access token claims could not be parsed.
	#[error(transparent)]
	Claims(#[from] crate::auth::ClaimsError),
}
impl AuthError {
	/// Wraps an identity-provider failure.
	pub fn identity(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Identity { source: Arc::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Response arrived but its body could not be read.
	#[error("Response body could not be read.")]
	Body {
		/// Transport-specific read error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the endpoint.")]
	Io(#[source] Arc<std::io::Error>),
	/// Request could not be converted for the underlying client; never retried.
	#[error("Request could not be prepared for the HTTP client.")]
	InvalidRequest {
		/// Client-specific conversion failure.
		#[source]
		source: SharedError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// Wraps a failure that happened while streaming the response body.
	pub fn body(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Body { source: Arc::new(src) }
	}

	/// Wraps a request the client refused to send.
	pub fn invalid_request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::InvalidRequest { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_body() || e.is_decode() { Self::body(e) } else { Self::network(e) }
	}
}

/// Failures reading a response as binary or JSON.
#[derive(Clone, Debug, ThisError)]
pub enum DecodeError {
	/// Body stream broke off or could not be buffered.
	#[error("Response body could not be read as binary.")]
	Body {
		/// Underlying read failure.
		#[source]
		source: SharedError,
	},
	/// Body is not the JSON shape the caller asked for.
	#[error("Response body is not valid JSON for the requested type.")]
	Json {
		/// Structured parsing failure with the offending path.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(Arc<oauth2::http::Error>),
	/// HTTP client refused the assembled request.
	#[error("Request could not be prepared for the HTTP client.")]
	InvalidRequest {
		/// Client-specific conversion failure.
		#[source]
		source: SharedError,
	},
	/// Endpoint cannot be joined onto the API base URL.
	#[error("Endpoint `{endpoint}` is not a valid URL reference.")]
	InvalidEndpoint {
		/// Endpoint as supplied by the caller.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured URL cannot be parsed or is not a base URL.
	#[error("The {field} URL is invalid: {url}.")]
	InvalidUrl {
		/// Which configuration field failed validation.
		field: &'static str,
		/// Offending URL.
		url: String,
	},
	/// Remote endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {field} URL must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which configuration field failed validation.
		field: &'static str,
		/// Offending URL.
		url: String,
	},
	/// Durations must be strictly positive.
	#[error("The {field} duration must be positive.")]
	NonPositiveDuration {
		/// Which configuration field failed validation.
		field: &'static str,
	},
	/// Retry policy must allow at least one attempt.
	#[error("Retry policy must allow at least one attempt.")]
	ZeroAttempts,
	/// Required identity settings are missing or empty.
	#[error("Identity setting `{field}` cannot be empty.")]
	MissingIdentityField {
		/// Which identity field was empty.
		field: &'static str,
	},
	/// Configuration file could not be parsed.
	#[error("Configuration file is malformed.")]
	Parse {
		/// Structured parsing failure with the offending path.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// Caller supplied its own `Authorization` header.
	#[error("Requests must not carry an explicit Authorization header; the bearer token is injected.")]
	ConflictingAuthorization,
	/// Caller supplied a header value that is not valid HTTP.
	#[error("Header value for `{name}` is invalid.")]
	InvalidHeader {
		/// Header name.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized to JSON.")]
	Serialize(#[source] Arc<serde_json::Error>),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest(Arc::new(e))
	}
}
impl From<serde_json::Error> for ConfigError {
	fn from(e: serde_json::Error) -> Self {
		Self::Serialize(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn only_transport_errors_are_retryable() {
		let network: Error = TransportError::from(std::io::Error::other("reset")).into();

		assert!(network.is_retryable());
		assert!(!Error::Http { status: 503 }.is_retryable());
		assert!(!Error::Timeout { after: Duration::seconds(5) }.is_retryable());
		assert!(!Error::from(AuthError::NotAuthenticated).is_retryable());
	}

	#[test]
	fn body_failures_become_decode_errors() {
		let err: Error = TransportError::body(std::io::Error::other("truncated")).into();

		assert!(matches!(err, Error::Decode(DecodeError::Body { .. })));
		assert!(StdError::source(&err).is_some());
	}

	#[test]
	fn refused_requests_are_configuration_errors() {
		let err: Error =
			TransportError::invalid_request(std::io::Error::other("relative URI")).into();

		assert!(matches!(err, Error::Config(ConfigError::InvalidRequest { .. })));
		assert!(!err.is_retryable());
	}

	#[test]
	fn clones_share_their_source() {
		let err: Error = TransportError::from(std::io::Error::other("reset")).into();
		let copy = err.clone();

		assert!(copy.is_retryable());
		assert_eq!(copy.to_string(), err.to_string());
		assert!(StdError::source(&copy).is_some());
	}

	#[test]
	fn http_error_reports_status() {
		assert_eq!(
			Error::Http { status: 404 }.to_string(),
			"Endpoint responded with HTTP status 404."
		);
	}
}
