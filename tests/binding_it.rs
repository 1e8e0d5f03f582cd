mod support;

// std
use std::sync::Arc;
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use histoviewer_fetch::{
	binding::{BindingState, BlobUrlBinding},
	endpoint::ImageEndpoint,
};
use support::{Scripted, ScriptedIdentity, ScriptedTransport};

fn identity() -> Arc<ScriptedIdentity> {
	Arc::new(ScriptedIdentity::with_validity(Duration::hours(1)))
}

fn recording<T>(binding: BlobUrlBinding<T>) -> (BlobUrlBinding<T>, Arc<Mutex<Vec<BindingState>>>)
where
	T: ?Sized + histoviewer_fetch::http::HttpTransport,
{
	let states = Arc::new(Mutex::new(Vec::new()));
	let sink = states.clone();

	(binding.with_listener(move |state| sink.lock().push(state.clone())), states)
}

#[tokio::test]
async fn binding_moves_from_resolving_to_resolved() {
	let endpoint = ImageEndpoint::preview("42");
	let transport =
		Arc::new(ScriptedTransport::new().route(endpoint.as_str(), [Scripted::image(&[0xFF])]));
	let context = support::context(transport, identity(), None).await;
	let (binding, states) = recording(context.bind());

	assert_eq!(binding.state(), BindingState::Idle);
	assert!(binding.url().is_none());

	binding.set_endpoint(endpoint.as_str()).await;

	let url = binding.url().expect("Resolved binding should expose an object URL.");

	assert_eq!(context.cache().get(endpoint.as_str()), Some(url.clone()));
	assert_eq!(*states.lock(), vec![
		BindingState::Resolving { endpoint: endpoint.to_string() },
		BindingState::Resolved { endpoint: endpoint.to_string(), url: Some(url) },
	]);
}

#[tokio::test]
async fn teardown_before_settlement_still_populates_the_cache() {
	let endpoint = ImageEndpoint::detail("9", "pathologist");
	let transport = Arc::new(
		ScriptedTransport::gated().route(endpoint.as_str(), [Scripted::image(&[9, 9])]),
	);
	let context = support::context(transport.clone(), identity(), None).await;
	let (binding, states) = recording(context.bind());
	let pending = tokio::spawn(binding.set_endpoint(endpoint.as_str()));

	tokio::task::yield_now().await;
	binding.teardown();
	transport.open();
	pending.await.expect("Resolution task should not panic.");

	assert!(!binding.is_active());
	assert_eq!(binding.state(), BindingState::Resolving { endpoint: endpoint.to_string() });
	assert_eq!(states.lock().len(), 1);
	assert!(context.cache().contains(endpoint.as_str()));

	let url = context.cache().get(endpoint.as_str()).expect("Cache should hold the payload.");

	assert!(context.registry().get(&url).is_some());
}

#[tokio::test]
async fn dropped_binding_does_not_cancel_the_fetch() {
	let endpoint = ImageEndpoint::preview("11");
	let transport =
		Arc::new(ScriptedTransport::new().route(endpoint.as_str(), [Scripted::image(&[11])]));
	let context = support::context(transport.clone(), identity(), None).await;
	let binding = context.bind();
	let pending = binding.set_endpoint(endpoint.as_str());

	drop(binding);
	pending.await;

	assert!(context.cache().contains(endpoint.as_str()));
	assert_eq!(transport.calls_to(endpoint.as_str()), 1);
}

#[tokio::test]
async fn newer_endpoint_supersedes_pending_resolution() {
	let first = ImageEndpoint::preview("1");
	let second = ImageEndpoint::preview("2");
	let transport = Arc::new(
		ScriptedTransport::new()
			.route(first.as_str(), [Scripted::image(&[1])])
			.route(second.as_str(), [Scripted::image(&[2])]),
	);
	let context = support::context(transport, identity(), None).await;
	let binding = context.bind();
	let superseded = binding.set_endpoint(first.as_str());
	let current = binding.set_endpoint(second.as_str());

	superseded.await;

	assert_eq!(binding.state(), BindingState::Resolving { endpoint: second.to_string() });
	assert!(context.cache().contains(first.as_str()));

	current.await;

	let url = binding.url().expect("Current endpoint should resolve.");

	assert_eq!(binding.state().endpoint(), Some(second.as_str()));
	assert_eq!(context.cache().get(second.as_str()), Some(url));
}

#[tokio::test]
async fn failed_resolution_exposes_no_url() {
	let endpoint = ImageEndpoint::preview("13");
	let transport =
		Arc::new(ScriptedTransport::new().route(endpoint.as_str(), [Scripted::status(500)]));
	let context = support::context(transport, identity(), None).await;
	let binding = context.bind();

	binding.set_endpoint(endpoint.as_str()).await;

	assert_eq!(binding.state(), BindingState::Failed { endpoint: endpoint.to_string() });
	assert!(binding.url().is_none());
	assert!(!context.cache().contains(endpoint.as_str()));
}

#[tokio::test]
async fn empty_content_resolves_without_url() {
	let endpoint = ImageEndpoint::preview("99");
	let transport =
		Arc::new(ScriptedTransport::new().route(endpoint.as_str(), [Scripted::status(204)]));
	let context = support::context(transport, identity(), None).await;
	let binding = context.bind();

	binding.set_endpoint(endpoint.as_str()).await;

	assert_eq!(binding.state(), BindingState::Resolved {
		endpoint: endpoint.to_string(),
		url: None
	});
	assert!(binding.url().is_none());
}

#[tokio::test]
async fn repeating_the_current_endpoint_is_a_no_op() {
	let endpoint = ImageEndpoint::preview("5");
	let transport =
		Arc::new(ScriptedTransport::new().route(endpoint.as_str(), [Scripted::image(&[5])]));
	let context = support::context(transport.clone(), identity(), None).await;
	let (binding, states) = recording(context.bind());

	binding.set_endpoint(endpoint.as_str()).await;
	binding.set_endpoint(endpoint.as_str()).await;

	assert_eq!(states.lock().len(), 2);
	assert_eq!(transport.calls_to(endpoint.as_str()), 1);

	binding.teardown();
	binding.set_endpoint(ImageEndpoint::preview("6").as_str()).await;

	assert_eq!(binding.state().endpoint(), Some(endpoint.as_str()));
	assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn evicted_url_is_withdrawn_and_resolved_again() {
	let shown = ImageEndpoint::preview("21");
	let other = ImageEndpoint::preview("22");
	let transport = Arc::new(
		ScriptedTransport::new()
			.route(shown.as_str(), [Scripted::image(&[21]), Scripted::image(&[21])])
			.route(other.as_str(), [Scripted::image(&[22])]),
	);
	let context = support::context(transport.clone(), identity(), Some(1)).await;
	let binding = context.bind();

	binding.set_endpoint(shown.as_str()).await;

	let evicted = binding.url().expect("Binding should expose the first object URL.");

	context
		.resolve_blob_url(other.as_str())
		.await
		.expect("Second endpoint should resolve and evict the first.");

	assert!(context.registry().get(&evicted).is_none());
	assert!(binding.url().is_none());

	binding.set_endpoint(shown.as_str()).await;

	let renewed = binding.url().expect("Revoked endpoint should resolve again.");

	assert_ne!(renewed, evicted);
	assert!(context.registry().get(&renewed).is_some());
	assert_eq!(transport.calls_to(shown.as_str()), 2);
}
