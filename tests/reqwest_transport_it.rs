#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use session_gate::{
	client::{ResilientApiClient, RetryPolicy},
	config::ClientConfig,
	error::ErrorKind,
	http::ReqwestTransport,
	identity::{FnIdentityProvider, IdentityError},
	store::{FileSecretStore, SecretStore},
};
use url::Url;

fn build_client(server: &MockServer, secrets: FileSecretStore) -> ResilientApiClient {
	let config = ClientConfig::builder(
		Url::parse(&server.url("/v1/")).expect("Mock base URL should parse successfully."),
	)
	.retry(RetryPolicy::none())
	.freshness_interval(None)
	.build()
	.expect("Client configuration should build successfully.");
	let transport = ReqwestTransport::with_timeout(std::time::Duration::from_secs(5))
		.expect("Reqwest transport should build successfully.");
	let identity =
		FnIdentityProvider::new(|| async { Ok::<_, IdentityError>("platform-identity".to_owned()) });

	ResilientApiClient::new(config, Arc::new(identity), Arc::new(transport), Arc::new(secrets))
}

fn temp_store(name: &str) -> FileSecretStore {
	let path = std::env::temp_dir()
		.join(format!("session-gate-{}-{name}", std::process::id()))
		.join("credential.json");

	FileSecretStore::open(path).expect("File store should open in the temp directory.")
}

#[tokio::test]
async fn exchange_and_bearer_request_round_trip_over_http() {
	let server = MockServer::start_async().await;
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/auth/token")
				.header("authorization", "Bearer platform-identity");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"live-token\",\"expiresIn\":7200,\"publicId\":\"u-42\"}");
		})
		.await;
	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/me").header("authorization", "Bearer live-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"nickname\":\"ada\"}");
		})
		.await;
	let secrets = temp_store("round-trip");
	let client = build_client(&server, secrets.clone());
	let body: serde_json::Value = client
		.request_json(session_gate::http::ApiRequest::new(
			session_gate::http_types::Method::GET,
			client.config().resolve("/me").expect("Profile path should resolve."),
		))
		.await
		.expect("Authenticated request should succeed.");

	exchange.assert_async().await;
	profile.assert_async().await;

	assert_eq!(body, serde_json::json!({ "nickname": "ada" }));

	let stored = secrets
		.read()
		.await
		.expect("File store read should succeed.")
		.expect("Credential should be persisted after the exchange.");

	assert!(stored.contains("\"live-token\""));
	assert!(stored.contains("\"publicId\":\"u-42\""));

	client.logout().await.expect("Logout should succeed.");

	assert_eq!(secrets.read().await.expect("File store read should succeed."), None);
}

#[tokio::test]
async fn http_failures_are_classified() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/auth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"live-token\",\"expiresIn\":7200}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(DELETE).path("/v1/posts/7");
			then.status(404)
				.header("content-type", "application/json")
				.body("{\"error\":{\"message\":\"Post not found\"}}");
		})
		.await;

	let client = build_client(&server, temp_store("classified"));
	let err = client.delete("posts/7").await.expect_err("Missing post should surface.");

	assert_eq!(err.kind, ErrorKind::Client);
	assert_eq!(err.status, Some(404));
	assert_eq!(err.message, "Post not found");
	assert_eq!(err.user_message(), "Post not found");

	client.logout().await.expect("Logout should succeed.");
}

#[tokio::test]
async fn redirects_are_not_followed_with_the_bearer_attached() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/auth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"live-token\",\"expiresIn\":7200}");
		})
		.await;

	let moved = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/feed");
			then.status(302).header("location", "https://elsewhere.example.com/feed");
		})
		.await;
	let client = build_client(&server, temp_store("redirect"));
	let err = client.get("feed").await.expect_err("Redirect should not be followed.");

	moved.assert_async().await;

	assert_eq!(err.kind, ErrorKind::Unknown);
	assert_eq!(err.status, Some(302));
	assert!(!err.is_retryable());

	client.logout().await.expect("Logout should succeed.");
}
