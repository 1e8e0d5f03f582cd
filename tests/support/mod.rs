//! Scripted identity and transport fakes shared by the integration suites.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	num::NonZeroUsize,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::{Mutex, RwLock};
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use url::Url;
// self
use histoviewer_fetch::{
	auth::{TokenClaims, TokenSecret},
	config::{ClientConfig, RetryPolicy},
	context::FetchContext,
	error::{AuthError, TransportError},
	fetch::{HeaderValue, StatusCode},
	http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	identity::{IdentityClient, IdentityFuture, InitOptions},
	oauth2::http::header::{AUTHORIZATION, CONTENT_TYPE},
};

pub const API_BASE: &str = "https://viewer.example.com/";

/// Unsigned compact JWT expiring `validity` from now.
pub fn mint_token(validity: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + validity).unix_timestamp();
	let nonce = NONCE.fetch_add(1, Ordering::Relaxed);
	let payload =
		format!(r#"{{"exp":{exp},"sub":"u-1","preferred_username":"pathologist","jti":"{nonce}"}}"#);

	format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
}

static NONCE: AtomicUsize = AtomicUsize::new(0);

/// Identity client whose renewals are counted and optionally delayed or rejected.
pub struct ScriptedIdentity {
	token: RwLock<Option<TokenSecret>>,
	calls: AtomicUsize,
	refreshes: AtomicUsize,
	reject: AtomicBool,
	delay: std::time::Duration,
}
impl ScriptedIdentity {
	/// Session whose token stays valid for `validity`.
	pub fn with_validity(validity: Duration) -> Self {
		Self {
			token: RwLock::new(Some(TokenSecret::new(mint_token(validity)))),
			calls: AtomicUsize::new(0),
			refreshes: AtomicUsize::new(0),
			reject: AtomicBool::new(false),
			delay: std::time::Duration::ZERO,
		}
	}

	/// Suspends every renewal for `delay` so concurrent callers pile up.
	pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
		self.delay = delay;

		self
	}

	/// Makes every renewal fail with `invalid_grant`.
	pub fn rejecting(self) -> Self {
		self.set_rejecting(true);

		self
	}

	pub fn set_rejecting(&self, reject: bool) {
		self.reject.store(reject, Ordering::SeqCst);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn refreshes(&self) -> usize {
		self.refreshes.load(Ordering::SeqCst)
	}

	pub fn current(&self) -> Option<String> {
		self.token.read().as_ref().map(|token| token.expose().to_owned())
	}
}
impl IdentityClient for ScriptedIdentity {
	fn init(&self, _options: InitOptions) -> IdentityFuture<'_, bool> {
		Box::pin(async move { Ok(self.token.read().is_some()) })
	}

	fn update_token(&self, min_validity: Duration) -> IdentityFuture<'_, bool> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.reject.load(Ordering::SeqCst) {
				return Err(AuthError::RefreshRejected { reason: "invalid_grant".into() });
			}

			let claims = self.token_parsed().ok_or(AuthError::NotAuthenticated)?;
			let remaining = claims.expires_at()? - OffsetDateTime::now_utc();

			if remaining >= min_validity {
				return Ok(false);
			}

			*self.token.write() = Some(TokenSecret::new(mint_token(Duration::minutes(5))));
			self.refreshes.fetch_add(1, Ordering::SeqCst);

			Ok(true)
		})
	}

	fn token(&self) -> Option<TokenSecret> {
		self.token.read().clone()
	}

	fn token_parsed(&self) -> Option<TokenClaims> {
		self.token.read().as_ref().and_then(|token| TokenClaims::from_jwt(token.expose()).ok())
	}

	fn logout(&self) -> IdentityFuture<'_, ()> {
		Box::pin(async move {
			*self.token.write() = None;

			Ok(())
		})
	}
}

/// Canned outcome for one request.
#[derive(Clone, Debug)]
pub enum Scripted {
	/// Answer with a status, body, and optional media type.
	Respond { status: u16, body: Vec<u8>, content_type: Option<&'static str> },
	/// Fail before any response arrives.
	Fail,
	/// Never answer.
	Hang,
}
impl Scripted {
	pub fn image(body: &[u8]) -> Self {
		Self::Respond {
			status: 200,
			body: body.to_vec(),
			content_type: Some("application/octet-stream"),
		}
	}

	pub fn status(status: u16) -> Self {
		Self::Respond { status, body: Vec::new(), content_type: None }
	}
}

/// Request observed by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct Seen {
	pub path_and_query: String,
	pub authorization: Option<String>,
}

/// Transport answering from per-endpoint queues; unscripted endpoints get `404`.
pub struct ScriptedTransport {
	routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
	seen: Mutex<Vec<Seen>>,
	gate: watch::Sender<bool>,
}
impl ScriptedTransport {
	pub fn new() -> Self {
		Self {
			routes: Mutex::new(HashMap::new()),
			seen: Mutex::new(Vec::new()),
			gate: watch::Sender::new(true),
		}
	}

	/// Holds every response until [`open`](Self::open) is called.
	pub fn gated() -> Self {
		let transport = Self::new();

		transport.gate.send_replace(false);

		transport
	}

	pub fn open(&self) {
		self.gate.send_replace(true);
	}

	/// Queues `outcomes` for `path_and_query`, answered in order.
	pub fn route(self, path_and_query: &str, outcomes: impl IntoIterator<Item = Scripted>) -> Self {
		self.routes.lock().entry(path_and_query.to_owned()).or_default().extend(outcomes);

		self
	}

	pub fn calls(&self) -> usize {
		self.seen.lock().len()
	}

	pub fn calls_to(&self, path_and_query: &str) -> usize {
		self.seen.lock().iter().filter(|seen| seen.path_and_query == path_and_query).count()
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let path_and_query = request
				.uri()
				.path_and_query()
				.map(|value| value.as_str().to_owned())
				.unwrap_or_default();
			let authorization = request
				.headers()
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);

			self.seen.lock().push(Seen { path_and_query: path_and_query.clone(), authorization });

			let mut gate = self.gate.subscribe();
			let _ = gate.wait_for(|open| *open).await;
			let outcome = self
				.routes
				.lock()
				.get_mut(&path_and_query)
				.and_then(VecDeque::pop_front)
				.unwrap_or(Scripted::status(404));

			match outcome {
				Scripted::Respond { status, body, content_type } => {
					let mut response = HttpResponse::new(body);

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					if let Some(content_type) = content_type {
						response
							.headers_mut()
							.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
					}

					Ok(response)
				},
				Scripted::Fail =>
					Err(TransportError::from(std::io::Error::other("connection reset by peer"))),
				Scripted::Hang => std::future::pending().await,
			}
		})
	}
}

/// Fast retry policy so backoff does not slow the suites down.
pub fn quick_retry() -> RetryPolicy {
	RetryPolicy {
		max_attempts: 3,
		base_delay: Duration::milliseconds(1),
		max_delay: Duration::milliseconds(5),
	}
}

pub fn config(capacity: Option<usize>) -> ClientConfig {
	ClientConfig::builder(Url::parse(API_BASE).expect("API base fixture should parse."))
		.retry(quick_retry())
		.request_timeout(Some(Duration::milliseconds(200)))
		.cache_capacity(capacity.and_then(NonZeroUsize::new))
		.build()
		.expect("Client configuration fixture should validate.")
}

/// Context over scripted collaborators, with the session already initialized.
pub async fn context(
	transport: Arc<ScriptedTransport>,
	identity: Arc<ScriptedIdentity>,
	capacity: Option<usize>,
) -> FetchContext<ScriptedTransport> {
	let context = FetchContext::with_transport(config(capacity), identity, transport);

	context
		.tokens()
		.init(InitOptions::default())
		.await
		.expect("Scripted identity should initialize.");

	context
}
