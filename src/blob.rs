//! Binary payloads and the registry that hands out `blob:` object URLs for them.
//!
//! An [`ObjectUrl`] stays dereferenceable through [`ObjectUrlRegistry::get`] until it is
//! revoked. The blob cache owns every URL it creates and revokes it on eviction, on
//! `clear`, and when it is dropped.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

const OBJECT_ID_LEN: usize = 32;

/// Immutable binary payload with its media type.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
	bytes: Arc<[u8]>,
	content_type: Option<String>,
}
impl Blob {
	/// Wraps `bytes` tagged with an optional media type.
	pub fn new(bytes: impl Into<Arc<[u8]>>, content_type: Option<String>) -> Self {
		Self { bytes: bytes.into(), content_type }
	}

	/// Raw payload.
	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Media type reported by the server, if any.
	pub fn content_type(&self) -> Option<&str> {
		self.content_type.as_deref()
	}

	/// Payload size in bytes.
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	/// Returns `true` for an empty payload.
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}
impl Debug for Blob {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Blob")
			.field("len", &self.bytes.len())
			.field("content_type", &self.content_type)
			.finish()
	}
}

/// Locally dereferenceable `blob:<origin>/<id>` URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectUrl(String);
impl ObjectUrl {
	/// Borrowed URL string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for ObjectUrl {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Display for ObjectUrl {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Runtime table mapping object URLs to their blobs.
pub struct ObjectUrlRegistry {
	origin: String,
	blobs: RwLock<HashMap<ObjectUrl, Blob>>,
}
impl ObjectUrlRegistry {
	/// Creates a registry minting URLs under the origin of `base`.
	pub fn new(base: &Url) -> Self {
		Self { origin: base.origin().ascii_serialization(), blobs: RwLock::new(HashMap::new()) }
	}

	/// Origin embedded in every minted URL (`null` for opaque bases).
	pub fn origin(&self) -> &str {
		&self.origin
	}

	/// Registers `blob` and returns a fresh URL for it.
	pub fn create_object_url(&self, blob: Blob) -> ObjectUrl {
		let mut blobs = self.blobs.write();

		loop {
			let id: String =
				rand::rng().sample_iter(Alphanumeric).take(OBJECT_ID_LEN).map(char::from).collect();
			let url = ObjectUrl(format!("blob:{}/{id}", self.origin));

			if let std::collections::hash_map::Entry::Vacant(slot) = blobs.entry(url.clone()) {
				slot.insert(blob);

				return url;
			}
		}
	}

	/// Dereferences `url`; `None` once revoked.
	pub fn get(&self, url: &ObjectUrl) -> Option<Blob> {
		self.blobs.read().get(url).cloned()
	}

	/// Releases `url`; returns `false` when it was not registered.
	pub fn revoke(&self, url: &ObjectUrl) -> bool {
		self.blobs.write().remove(url).is_some()
	}

	/// Number of live URLs.
	pub fn len(&self) -> usize {
		self.blobs.read().len()
	}

	/// Returns `true` when no URL is live.
	pub fn is_empty(&self) -> bool {
		self.blobs.read().is_empty()
	}
}
impl Debug for ObjectUrlRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ObjectUrlRegistry")
			.field("origin", &self.origin)
			.field("live", &self.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn registry() -> ObjectUrlRegistry {
		ObjectUrlRegistry::new(
			&Url::parse("https://viewer.example.com/api/").expect("Failed to parse base URL."),
		)
	}

	#[test]
	fn object_urls_are_unique_and_dereferenceable() {
		let registry = registry();
		let blob = Blob::new(vec![0xFF, 0xD8], Some("image/jpeg".into()));
		let first = registry.create_object_url(blob.clone());
		let second = registry.create_object_url(blob.clone());

		assert_ne!(first, second);
		assert!(first.as_str().starts_with("blob:https://viewer.example.com/"));
		assert_eq!(registry.get(&first), Some(blob));
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn revoked_urls_no_longer_resolve() {
		let registry = registry();
		let url = registry.create_object_url(Blob::new(vec![1_u8], None));

		assert!(registry.revoke(&url));
		assert!(!registry.revoke(&url));
		assert!(registry.get(&url).is_none());
		assert!(registry.is_empty());
	}
}
