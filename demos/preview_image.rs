//! Resolves a slide preview into an object URL against a local mock of the viewer API and
//! its Keycloak realm, renewing an expired session on the way.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::{Result, eyre::eyre};
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use histoviewer_fetch::{
	config::{ClientConfig, IdentityConfig},
	context::FetchContext,
	endpoint::ImageEndpoint,
	identity::InitOptions,
};

fn jwt(validity: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + validity).unix_timestamp();
	let payload = format!(r#"{{"exp":{exp},"preferred_username":"demo-pathologist"}}"#);

	format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let renewed = jwt(Duration::minutes(5));
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/realms/histo/protocol/openid-connect/token");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"access_token\":\"{renewed}\",\"refresh_token\":\"demo-refresh-2\",\"token_type\":\"bearer\",\"expires_in\":300}}"
			));
		})
		.await;
	let image_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/previewImage")
				.query_param("imageUid", "1042")
				.header("authorization", format!("Bearer {renewed}"));
			then.status(200).header("content-type", "image/jpeg").body([0xFF, 0xD8, 0xFF, 0xE0]);
		})
		.await;
	let base = Url::parse(&server.url("/"))?;
	let config = ClientConfig::builder(base.clone())
		.identity(IdentityConfig::new(base, "histo", "histoviewer"))
		.build()?;
	let context = FetchContext::keycloak(config)?;

	context
		.tokens()
		.init(
			InitOptions::default()
				.with_token(jwt(Duration::seconds(-60)))
				.with_refresh_token("demo-refresh-1"),
		)
		.await?;

	let endpoint = ImageEndpoint::preview("1042");
	let url = context
		.resolve_blob_url(endpoint.as_str())
		.await
		.ok_or_else(|| eyre!("Preview {endpoint} did not resolve."))?;
	let blob = context.registry().get(&url).ok_or_else(|| eyre!("Object URL {url} was revoked."))?;

	println!("Preview {endpoint} is available at {url} ({} bytes).", blob.len());

	token_mock.assert_async().await;
	image_mock.assert_async().await;

	Ok(())
}
