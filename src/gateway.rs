//! Contracts for the external services the pipeline talks to.
//!
//! The pipeline only ever sees the [`TextGenerator`] and [`ImageSynthesizer`] traits. The
//! out-of-the-box implementations are [`OpenAiTextGenerator`](openai::OpenAiTextGenerator) for
//! text and vision attachment, and [`FalImageSynthesizer`](fal::FalImageSynthesizer) for images.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ChatTurn, Dimensions, GatewayError};

pub mod fal;
pub mod openai;

/// Sampling parameters of a single text generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
	/// Maximum number of tokens the service may respond with.
	pub max_tokens: u32,
	pub temperature: f32,
	/// Number of candidates requested. The pipeline always asks for one.
	pub candidates: u8,
}

/// Opaque handle to an image registered with the text service.
///
/// It is only meaningful inside later conversation turns of the same service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionRef(pub String);

impl VisionRef {
	/// Renders the reference as the content of a conversation turn.
	pub fn as_turn_content(&self) -> String {
		format!("<image: {}>", self.0)
	}
}

impl AsRef<str> for VisionRef {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// A single image synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
	pub prompt: String,
	pub dimensions: Dimensions,
	pub inference_steps: u32,
}

/// Chat-style text generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
	/// Name of the underlying model, used for logging.
	fn name(&self) -> &str;

	/// Prompts the service with the ordered `turns`.
	///
	/// Returns `Ok(None)` when the service replied with zero candidates or a candidate without
	/// content.
	async fn generate(
		&self,
		turns: Vec<ChatTurn>,
		params: &TextParams,
	) -> Result<Option<String>, GatewayError>;

	/// Registers the image behind `image_url` so it can be referenced in a later turn.
	async fn attach_image(&self, image_url: &str) -> Result<VisionRef, GatewayError>;
}

/// Text-to-image synthesis service.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
	/// Name of the underlying model, used for logging.
	fn name(&self) -> &str;

	/// Generates images for `request` and returns their dereferenceable URLs in the order the
	/// service produced them.
	async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<String>, GatewayError>;
}

/// Upper bound of a single HTTP request made through [`HTTP_CLIENT`].
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

lazy_static::lazy_static! {
	/// Shared HTTP client for talking to providers that are not wrapped by a dedicated SDK.
	pub(crate) static ref HTTP_CLIENT: reqwest::Client =
		reqwest::Client::builder().timeout(HTTP_TIMEOUT).build().unwrap_or_default();
}

/// Maximum number of characters of an error body kept in [`GatewayError::Status`].
const ERROR_BODY_LIMIT: usize = 512;

/// Turns a non success response into [`GatewayError::Status`].
pub(crate) async fn ensure_success(
	response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response)
	}

	let body = response.text().await.unwrap_or_default();
	Err(GatewayError::Status(status.as_u16(), body.chars().take(ERROR_BODY_LIMIT).collect()))
}

/// Reads the environment variable `key`, ignoring it when blank.
pub(crate) fn non_empty_env(key: &str) -> Option<String> {
	std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
