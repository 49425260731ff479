//! Illustrate text documents by chaining LLM and image generation calls.
//!
//! Given a document and some optional context from its author, LLM Illustrator:
//!
//! 1. asks a text model to describe an image that would fit the document,
//! 2. asks the text model again to expand that description into a detailed image generation
//!    prompt,
//! 3. hands the prompt to an image model sized for the requested [`ImageProfile`],
//! 4. and optionally shows the generated image back to the text model so it can critique it and
//!    produce a revised prompt for one more image.
//!
//! Central to the crate is the [`Illustrator`] struct which drives the pipeline. The external
//! services are reached through the [`TextGenerator`] and [`ImageSynthesizer`] traits, the
//! concrete implementations of which are selected by implementing the [`Config`] trait.
//!
//! For immediate use of this library with [`DefaultConfig`] you must set the following
//! environment variables:
//!
//! - `OPENAI_API_KEY`
//! - `FAL_KEY` (or `FAL_API_KEY`)
//!
//! # Example
//!
//! ```ignore
//! use llm_illustrator::{
//! 	gateway::{fal::FalImageSynthesizer, openai::OpenAiTextGenerator},
//! 	models::{ImageModels, TextModels},
//! 	DefaultConfig, Document, ImageProfile, Illustrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! 	let illustrator = Illustrator::<DefaultConfig>::new(
//! 		OpenAiTextGenerator::from_env(TextModels::Gpt4o)?,
//! 		FalImageSynthesizer::from_env(ImageModels::FluxSchnell)?,
//! 	);
//!
//! 	let document = Document::new("Trail Guide", "A 12km alpine loop...");
//! 	let result = illustrator.generate("", &document, ImageProfile::Banner).await?;
//!
//! 	// Show the image to the model once more and let it try again.
//! 	let revised = illustrator
//! 		.revise_last(&result.description, &result.prompt, &result.image_ref)
//! 		.await?;
//!
//! 	println!("{} -> {}", result.image_ref, revised.image_ref);
//! 	Ok(())
//! }
//! ```
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

pub mod architecture;
pub mod gateway;
mod illustrator;
pub mod instructions;
pub mod progress;
pub mod types;

#[cfg(test)]
mod mock;

pub use gateway::{ImageSynthesizer, SynthesisRequest, TextGenerator, TextParams, VisionRef};
pub use illustrator::{Illustrator, REVISION_PROFILE};
pub use instructions::Instructions;
pub use progress::{ProgressEvent, ProgressSink, ProgressStatus, TracingProgress};
pub use types::{Dimensions, GatewayError, IllustratorError, ImageProfile, Stage};

pub type Result<T> = std::result::Result<T, IllustratorError>;

/// A trait consisting of the main configuration parameters for [`Illustrator`].
pub trait Config: Debug + Sized + Send + Sync + 'static {
	/// The sampling temperature used for every text generation call.
	///
	/// Defaults to `0.7`
	const TEMPERATURE: f32 = 0.7;
	/// Maximum number of tokens the text model may respond with.
	///
	/// Defaults to `2000`
	const MAX_RESPONSE_TOKENS: u32 = 2_000;
	/// Number of inference steps of every image synthesis call.
	///
	/// This is a fixed quality/latency tradeoff and is not exposed per request.
	///
	/// Defaults to `12`
	const INFERENCE_STEPS: u32 = 12;
	/// Number of characters of an artifact shown in [`ProgressStatus::Finished`].
	///
	/// Defaults to `100`
	const PREVIEW_CHARS: usize = 100;

	/// Text generation service used for descriptions, prompts and revisions.
	type TextModel: TextGenerator;
	/// Image synthesis service.
	type ImageModel: ImageSynthesizer;
}

/// [`Config`] wiring OpenAI for text and fal.ai for images.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConfig;

impl Config for DefaultConfig {
	type TextModel = gateway::openai::OpenAiTextGenerator;
	type ImageModel = gateway::fal::FalImageSynthesizer;
}

/// The document to illustrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
	pub title: String,
	pub body: String,
}

impl Document {
	pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
		Self { title: title.into(), body: body.into() }
	}
}

/// Everything a pipeline run needs to know. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
	document_title: String,
	document_body: String,
	user_context: String,
	image_profile: ImageProfile,
}

impl GenerationRequest {
	pub fn new(
		document_title: impl Into<String>,
		document_body: impl Into<String>,
		user_context: impl Into<String>,
		image_profile: ImageProfile,
	) -> Self {
		Self {
			document_title: document_title.into(),
			document_body: document_body.into(),
			user_context: user_context.into(),
			image_profile,
		}
	}

	pub fn from_document(context: &str, document: &Document, image_profile: ImageProfile) -> Self {
		Self::new(document.title.clone(), document.body.clone(), context, image_profile)
	}

	pub fn document_title(&self) -> &str {
		&self.document_title
	}

	pub fn document_body(&self) -> &str {
		&self.document_body
	}

	pub fn user_context(&self) -> &str {
		&self.user_context
	}

	pub fn image_profile(&self) -> ImageProfile {
		self.image_profile
	}
}

/// Artifacts accumulated while a pipeline run progresses.
///
/// Every field is written once, in stage order: description, then prompt, then image.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineArtifact {
	description: Option<String>,
	prompt: Option<String>,
	image_ref: Option<String>,
}

impl PipelineArtifact {
	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	pub fn prompt(&self) -> Option<&str> {
		self.prompt.as_deref()
	}

	pub fn image_ref(&self) -> Option<&str> {
		self.image_ref.as_deref()
	}

	pub(crate) fn record_description(&mut self, description: String) -> &str {
		debug_assert!(self.description.is_none());
		self.description.insert(description)
	}

	pub(crate) fn record_prompt(&mut self, prompt: String) -> &str {
		debug_assert!(self.description.is_some() && self.prompt.is_none());
		self.prompt.insert(prompt)
	}

	pub(crate) fn record_image_ref(&mut self, image_ref: String) -> &str {
		debug_assert!(self.prompt.is_some() && self.image_ref.is_none());
		self.image_ref.insert(image_ref)
	}

	/// Snapshot of a complete run, `None` while any field is missing.
	pub fn finish(self) -> Option<GenerationResult> {
		Some(GenerationResult {
			image_ref: self.image_ref?,
			description: self.description?,
			prompt: self.prompt?,
		})
	}
}

/// Terminal result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
	/// Dereferenceable URL of the generated image.
	pub image_ref: String,
	pub description: String,
	pub prompt: String,
}

pub mod models {
	use clap::{builder::PossibleValue, ValueEnum};

	/// The text generation models that are available to use.
	#[derive(PartialEq, Eq, Clone, Debug, Copy, Default)]
	pub enum TextModels {
		#[default]
		Gpt4o,
		Gpt4oMini,
	}

	/// Clap value enum implementation for argument parsing.
	impl ValueEnum for TextModels {
		fn value_variants<'a>() -> &'a [Self] {
			&[Self::Gpt4o, Self::Gpt4oMini]
		}

		fn to_possible_value(&self) -> Option<PossibleValue> {
			Some(PossibleValue::new(self.name()))
		}
	}

	impl TextModels {
		/// Get the model name.
		pub fn name(&self) -> &'static str {
			match self {
				Self::Gpt4o => "gpt-4o",
				Self::Gpt4oMini => "gpt-4o-mini",
			}
		}
	}

	/// The image generation models that are available to use.
	#[derive(PartialEq, Eq, Clone, Debug, Copy, Default)]
	pub enum ImageModels {
		#[default]
		FluxSchnell,
		FluxDev,
	}

	/// Clap value enum implementation for argument parsing.
	impl ValueEnum for ImageModels {
		fn value_variants<'a>() -> &'a [Self] {
			&[Self::FluxSchnell, Self::FluxDev]
		}

		fn to_possible_value(&self) -> Option<PossibleValue> {
			Some(PossibleValue::new(self.alias()))
		}
	}

	impl ImageModels {
		/// Get the fal.ai application id of the model.
		pub fn name(&self) -> &'static str {
			match self {
				Self::FluxSchnell => "fal-ai/flux/schnell",
				Self::FluxDev => "fal-ai/flux/dev",
			}
		}

		/// Short name used on the command line.
		pub fn alias(&self) -> &'static str {
			match self {
				Self::FluxSchnell => "flux-schnell",
				Self::FluxDev => "flux-dev",
			}
		}
	}
}
