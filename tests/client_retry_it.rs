mod common;

// std
use std::time::Duration as StdDuration;
// crates.io
use session_gate::{
	client::RetryPolicy,
	error::{ErrorKind, TransportError},
	http::ApiResponse,
	http_types::StatusCode,
};
use time::Duration;
use tokio::time::Instant;
// self
use common::{Backend, Harness};

#[tokio::test(start_paused = true)]
async fn server_errors_exhaust_the_retry_bound() {
	let policy = RetryPolicy::new(3, Duration::seconds(1));
	let harness = Harness::new(
		common::config(policy),
		Backend::new(|_, _| Ok(ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom"))),
	);
	let started = Instant::now();
	let err = harness.client.get("feed").await.expect_err("Persistent 500 should surface.");

	assert_eq!(err.kind, ErrorKind::Server);
	assert_eq!(err.status, Some(500));
	assert_eq!(harness.backend.calls(), 4);
	assert_eq!(harness.client.metrics().retries(), 3);
	// 1s + 2s + 4s of backoff.
	assert!(started.elapsed() >= StdDuration::from_secs(7));
	assert!(started.elapsed() < StdDuration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn not_found_fails_after_a_single_attempt() {
	let harness = Harness::new(
		common::config(RetryPolicy::default()),
		Backend::new(|_, _| {
			Ok(ApiResponse::new(StatusCode::NOT_FOUND, "{\"error\":\"No such post\"}"))
		}),
	);
	let started = Instant::now();
	let err = harness.client.get("posts/9").await.expect_err("404 should surface.");

	assert_eq!(err.kind, ErrorKind::Client);
	assert_eq!(err.message, "No such post");
	assert_eq!(harness.backend.calls(), 1);
	assert_eq!(started.elapsed(), StdDuration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_within_the_bound() {
	let harness = Harness::new(
		common::config(RetryPolicy::default()),
		Backend::new(|n, _| match n {
			0 => Err(TransportError::Io(std::io::Error::other("connection reset"))),
			1 => Ok(ApiResponse::new(StatusCode::BAD_GATEWAY, "")),
			_ => Ok(ApiResponse::new(StatusCode::OK, "{}")),
		}),
	);
	let response = harness.client.get("feed").await.expect("Third attempt should succeed.");

	assert!(response.is_success());
	assert_eq!(harness.backend.calls(), 3);
	assert_eq!(harness.client.metrics().retries(), 2);
}

#[tokio::test(start_paused = true)]
async fn network_errors_are_classified_before_retrying() {
	let harness = Harness::new(
		common::config(RetryPolicy::none()),
		Backend::new(|_, _| Err(TransportError::Io(std::io::Error::other("offline")))),
	);
	let err = harness.client.get("feed").await.expect_err("Offline request should fail.");

	assert_eq!(err.kind, ErrorKind::Network);
	assert_eq!(err.status, None);
	assert!(err.is_retryable());
	assert_eq!(harness.backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_delay_is_capped_by_max_delay() {
	let policy = RetryPolicy::new(1, Duration::seconds(1)).with_max_delay(Duration::seconds(10));
	let harness = Harness::new(
		common::config(policy),
		Backend::new(|n, _| {
			if n == 0 {
				let mut response = ApiResponse::new(StatusCode::TOO_MANY_REQUESTS, "");

				response.headers.insert(
					session_gate::http_types::header::RETRY_AFTER,
					session_gate::http_types::HeaderValue::from_static("120"),
				);

				Ok(response)
			} else {
				Ok(ApiResponse::new(StatusCode::OK, ""))
			}
		}),
	);
	let started = Instant::now();

	harness.client.get("feed").await.expect("Retry after throttling should succeed.");

	assert!(started.elapsed() >= StdDuration::from_secs(10));
	assert!(started.elapsed() < StdDuration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn failed_acquisition_is_retried_as_authentication() {
	let harness =
		Harness::new(common::config(RetryPolicy::new(2, Duration::seconds(1))), Backend::ok());

	harness.backend.fail_exchanges(true);

	let err = harness.client.get("feed").await.expect_err("Exchange outage should surface.");

	assert_eq!(err.kind, ErrorKind::Authentication);
	assert_eq!(harness.backend.exchanges(), 3);
	assert_eq!(harness.backend.calls(), 0);
}
