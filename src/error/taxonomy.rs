//! Pure failure classification: status codes, response bodies, and transport failures
//! map onto exactly one [`ClassifiedError`].

// self
use crate::{_prelude::*, error::TransportError};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Classifies a failed request.
///
/// A transport failure always wins, because it means no response was received. Otherwise
/// the status code selects the kind and the body supplies the message. Without either, the
/// failure is [`ErrorKind::Unknown`].
pub fn classify(
	status: Option<u16>,
	body: Option<&str>,
	transport: Option<TransportError>,
) -> ClassifiedError {
	if let Some(err) = transport {
		return classify_transport(err);
	}

	match status {
		Some(status) => classify_status(status, body.unwrap_or_default()),
		None => ClassifiedError::new(ErrorKind::Unknown, "Request failed without a response."),
	}
}

/// Classifies a transport failure as [`ErrorKind::Network`].
pub fn classify_transport(err: TransportError) -> ClassifiedError {
	let message = ErrorKind::Network
		.user_message()
		.unwrap_or("Unable to reach the server. Please check your connection and try again.");

	ClassifiedError::new(ErrorKind::Network, message).with_cause(err)
}

/// Classifies a received non-success response.
pub fn classify_status(status: u16, body: &str) -> ClassifiedError {
	ClassifiedError::new(kind_for_status(status), message_from_body(status, body))
		.with_status(status)
}

/// Whether the classified failure may succeed when attempted again.
pub fn is_retryable(error: &ClassifiedError) -> bool {
	error.kind.is_retryable()
}

/// Selects the failure kind for an HTTP status code.
pub fn kind_for_status(status: u16) -> ErrorKind {
	match status {
		401 => ErrorKind::Authentication,
		429 => ErrorKind::RateLimit,
		500..=599 => ErrorKind::Server,
		400..=499 => ErrorKind::Client,
		_ => ErrorKind::Unknown,
	}
}

fn message_from_body(status: u16, body: &str) -> String {
	if let Some(message) = structured_message(body) {
		return message;
	}

	let trimmed = body.trim();

	if trimmed.is_empty() {
		return format!("HTTP {status}");
	}

	preview(trimmed)
}

fn structured_message(body: &str) -> Option<String> {
	let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
	let object = value.as_object()?;
	let pick = |value: &serde_json::Value| {
		value.as_str().map(str::trim).filter(|text| !text.is_empty()).map(preview)
	};

	if let Some(error) = object.get("error") {
		if let Some(text) = pick(error) {
			return Some(text);
		}
		if let Some(text) = error.get("message").and_then(pick) {
			return Some(text);
		}
	}

	object.get("message").and_then(pick)
}

fn preview(text: &str) -> String {
	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return text.to_owned();
	}

	let mut clipped: String = text.chars().take(BODY_PREVIEW_LIMIT).collect();

	clipped.push('…');

	clipped
}
