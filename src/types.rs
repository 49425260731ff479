use std::{fmt::Display, str::FromStr};

use async_openai::error::OpenAIError;
use clap::{builder::PossibleValue, ValueEnum};
use serde::{Deserialize, Serialize};

pub const SYSTEM_ROLE: &str = "system";
pub const ASSISTANT_ROLE: &str = "assistant";
pub const USER_ROLE: &str = "user";

/// Author of a single [`ChatTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
	System,
	User,
	Assistant,
}

impl From<TurnRole> for String {
	fn from(role: TurnRole) -> Self {
		match role {
			TurnRole::System => SYSTEM_ROLE.to_string(),
			TurnRole::User => USER_ROLE.to_string(),
			TurnRole::Assistant => ASSISTANT_ROLE.to_string(),
		}
	}
}

impl Display for TurnRole {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", String::from(*self))
	}
}

/// A single role tagged message sent to a [`crate::TextGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
	pub role: TurnRole,
	pub content: String,
}

impl ChatTurn {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: TurnRole::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: TurnRole::User, content: content.into() }
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: TurnRole::Assistant, content: content.into() }
	}
}

/// Width and height in pixels handed to the image synthesis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
	pub width: u32,
	pub height: u32,
}

/// Named target aspect/resolution class of the generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProfile {
	/// Wide strip placed at the top of a document.
	Banner,
	/// Full HD image placed inside the document body.
	Inline,
}

impl ImageProfile {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Banner => "banner",
			Self::Inline => "inline",
		}
	}

	/// Fixed pixel dimensions of the profile.
	pub fn dimensions(&self) -> Dimensions {
		match self {
			Self::Banner => Dimensions { width: 2_000, height: 300 },
			Self::Inline => Dimensions { width: 1_920, height: 1_080 },
		}
	}
}

impl Display for ImageProfile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.name())
	}
}

impl FromStr for ImageProfile {
	type Err = ProfileParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"banner" => Ok(Self::Banner),
			"inline" => Ok(Self::Inline),
			_ => Err(ProfileParseError(s.to_string())),
		}
	}
}

/// Clap value enum implementation for argument parsing.
impl ValueEnum for ImageProfile {
	fn value_variants<'a>() -> &'a [Self] {
		&[Self::Banner, Self::Inline]
	}

	fn to_possible_value(&self) -> Option<PossibleValue> {
		Some(PossibleValue::new(self.name()))
	}
}

/// Raised when a profile name does not map onto an [`ImageProfile`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ProfileParseError(pub String);

impl Display for ProfileParseError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Unknown image profile: {} \n Valid profiles: banner | inline", self.0)
	}
}

/// The step of the pipeline an event or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
	Description,
	PromptExpansion,
	Synthesis,
	VisionAttachment,
	RevisedPrompt,
}

impl Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Description => write!(f, "image description"),
			Self::PromptExpansion => write!(f, "image prompt"),
			Self::Synthesis => write!(f, "image"),
			Self::VisionAttachment => write!(f, "image upload"),
			Self::RevisedPrompt => write!(f, "revised image prompt"),
		}
	}
}

/// Terminal failure of a pipeline run.
///
/// None of these are retried, the run is aborted and no partial result is returned.
#[derive(Debug, thiserror::Error)]
pub enum IllustratorError {
	/// The text service replied without a usable candidate.
	EmptyResponse(Stage),
	/// Transport or provider failure from the text service.
	ServiceError(Stage, #[source] GatewayError),
	/// The image service returned no image.
	SynthesisError(Option<GatewayError>),
	/// Registering an image for vision critique failed.
	UploadError(#[source] GatewayError),
}

impl IllustratorError {
	/// Stage the failure happened in.
	pub fn stage(&self) -> Stage {
		match self {
			Self::EmptyResponse(stage) | Self::ServiceError(stage, _) => *stage,
			Self::SynthesisError(_) => Stage::Synthesis,
			Self::UploadError(_) => Stage::VisionAttachment,
		}
	}
}

impl Display for IllustratorError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::EmptyResponse(stage) => write!(f, "No {} generated", stage),
			Self::ServiceError(stage, e) => write!(f, "Failed generating {}: {}", stage, e),
			Self::SynthesisError(Some(e)) => write!(f, "Failed generating image: {}", e),
			Self::SynthesisError(None) => write!(f, "Image service returned no image"),
			Self::UploadError(e) => write!(f, "Failed uploading image for review: {}", e),
		}
	}
}

/// Failure reported by a model gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
	OpenAI(#[from] OpenAIError),
	Http(#[from] reqwest::Error),
	/// Non success HTTP status along with the (truncated) body.
	Status(u16, String),
	/// The provider answered with a payload we could not interpret.
	Malformed(String),
	/// Required credentials are not present in the environment.
	MissingCredentials(&'static str),
	/// The provider did not finish the request in time.
	TimedOut(std::time::Duration),
}

impl Display for GatewayError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::OpenAI(e) => write!(f, "OpenAI error: {}", e),
			Self::Http(e) => write!(f, "HTTP error: {}", e),
			Self::Status(code, body) => write!(f, "Unexpected status {}: {}", code, body),
			Self::Malformed(msg) => write!(f, "Malformed response: {}", msg),
			Self::MissingCredentials(var) => write!(f, "{} not set", var),
			Self::TimedOut(after) => write!(f, "Timed out after {:.1}s", after.as_secs_f64()),
		}
	}
}
