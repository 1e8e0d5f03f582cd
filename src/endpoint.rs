//! Image endpoints served by the viewer backend.
//!
//! The endpoint string doubles as the blob cache key, so every query parameter that changes
//! the returned image (the image UID and, for detail views, the user) is part of it.

// crates.io
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Relative path plus query of an image resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageEndpoint(String);
impl ImageEndpoint {
	/// Path of the thumbnail endpoint.
	pub const PREVIEW_PATH: &'static str = "/api/previewImage";
	/// Path of the full-resolution endpoint.
	pub const DETAIL_PATH: &'static str = "/api/detailViewImage";

	/// Thumbnail of one image, e.g. `/api/previewImage?imageUid=42`.
	pub fn preview(image_uid: impl AsRef<str>) -> Self {
		Self::build(Self::PREVIEW_PATH, &[("imageUid", image_uid.as_ref())])
	}

	/// Full-resolution image as rendered for `username`.
	pub fn detail(image_uid: impl AsRef<str>, username: impl AsRef<str>) -> Self {
		Self::build(
			Self::DETAIL_PATH,
			&[("imageUid", image_uid.as_ref()), ("username", username.as_ref())],
		)
	}

	/// Wraps an endpoint string that was built elsewhere.
	pub fn raw(endpoint: impl Into<String>) -> Self {
		Self(endpoint.into())
	}

	/// Endpoint as sent to [`AuthenticatedFetch`](crate::fetch::AuthenticatedFetch).
	pub fn as_str(&self) -> &str {
		&self.0
	}

	fn build(path: &str, params: &[(&str, &str)]) -> Self {
		let query = form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();

		Self(format!("{path}?{query}"))
	}
}
impl AsRef<str> for ImageEndpoint {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Display for ImageEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl From<ImageEndpoint> for String {
	fn from(endpoint: ImageEndpoint) -> Self {
		endpoint.0
	}
}
