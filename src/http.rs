//! Transport primitives for the exchange endpoint and business calls.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. The token manager
//! and the request client hand it fully prepared [`ApiRequest`] values and receive
//! buffered [`ApiResponse`] values back; transport implementations report failures that
//! happen before any response arrives as [`TransportError`] so the taxonomy can tag them
//! as network failures.

// std
use std::borrow::Cow;
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use ::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{CONTENT_TYPE, RETRY_AFTER},
};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing buffered requests.
///
/// Implementations must not follow redirects silently into a different origin with the
/// bearer header attached and must return non-2xx responses as `Ok`; only failures
/// where no response was received belong in the error channel.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the request and buffers the response.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Buffered outbound request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `body` as JSON and sets the JSON content type.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self, ClassifiedError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(|e| {
			ClassifiedError::new(ErrorKind::Client, "Request body could not be serialized.")
				.with_cause(e)
		})?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}
}

/// Buffered inbound response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with no headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T, ClassifiedError>
	where
		T: DeserializeOwned,
	{
		let de = &mut serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(de).map_err(|e| {
			ClassifiedError::new(ErrorKind::Unknown, "Response body could not be decoded.")
				.with_status(self.status.as_u16())
				.with_cause(e)
		})
	}

	/// `Retry-After` hint expressed as a duration relative to `now`.
	pub fn retry_after(&self, now: OffsetDateTime) -> Option<Duration> {
		parse_retry_after(&self.headers, now)
	}
}

/// Thin wrapper around [`ReqwestClient`] implementing [`HttpTransport`].
///
/// The constructors here disable redirects so a bearer header never follows a `Location`
/// to another origin; clients passed to [`ReqwestTransport::with_client`] are used as-is.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client without redirects or a timeout.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().redirect(Policy::none()).build()?))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client without redirects and with a per-request timeout.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().redirect(Policy::none()).timeout(timeout).build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let ApiRequest { method, url, headers, body } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(i64::from(secs)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
