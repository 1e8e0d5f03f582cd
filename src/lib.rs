//! Authenticated blob fetching for the histology viewer: bearer tokens that refresh
//! themselves, image payloads fetched once per endpoint, and object URLs that outlive the
//! consumers that asked for them.
//!
//! [`FetchContext`](context::FetchContext) wires the pieces together:
//! [`TokenProvider`](provider::TokenProvider) keeps a valid token,
//! [`AuthenticatedFetch`](fetch::AuthenticatedFetch) attaches it to every request,
//! [`BlobCache`](cache::BlobCache) turns endpoints into `blob:` URLs exactly once, and
//! [`BlobUrlBinding`](binding::BlobUrlBinding) exposes the result to one consumer.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod binding;
pub mod blob;
pub mod cache;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod http;
pub mod identity;
pub mod obs;
pub mod provider;

mod oauth;

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth::oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
