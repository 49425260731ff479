use tracing::{error, trace};

use super::Illustrator;
use crate::{
	gateway::{ImageSynthesizer, SynthesisRequest, TextGenerator},
	instructions::description_input,
	types::{ChatTurn, ImageProfile, Stage},
	Config, IllustratorError, Result,
};

impl<T: Config> Illustrator<T> {
	/// Describe an image that would fit the document.
	///
	/// The text model sees the user context first, then the document title as a heading and
	/// finally the whole document body, so the document is framed by what the user intends.
	pub async fn derive_description(
		&self,
		document_title: &str,
		document_body: &str,
		user_context: &str,
	) -> Result<String> {
		let input = description_input(document_title, document_body, user_context);

		self.prompt_text(
			Stage::Description,
			vec![ChatTurn::system(&self.instructions.description), ChatTurn::user(input)],
		)
		.await
	}

	/// Expand a terse image `description` into a detailed image generation prompt.
	pub async fn expand_to_prompt(&self, description: &str) -> Result<String> {
		self.prompt_text(
			Stage::PromptExpansion,
			vec![ChatTurn::system(&self.instructions.expansion), ChatTurn::user(description)],
		)
		.await
	}

	/// Generate an image for `prompt` sized for `profile` and return its URL.
	///
	/// Only the first image returned by the service is used.
	pub async fn synthesize_image(&self, prompt: &str, profile: ImageProfile) -> Result<String> {
		let request = SynthesisRequest {
			prompt: prompt.to_string(),
			dimensions: profile.dimensions(),
			inference_steps: T::INFERENCE_STEPS,
		};

		trace!("Synthesizing {:?} image with {}", request.dimensions, self.image_model.name());

		let images = self.image_model.synthesize(&request).await.map_err(|e| {
			error!("Failed to synthesize image: {}", e);
			IllustratorError::SynthesisError(Some(e))
		})?;

		images.into_iter().next().ok_or_else(|| {
			error!("Image service returned no image");
			IllustratorError::SynthesisError(None)
		})
	}

	/// Single attempt text generation returning the trimmed content of the only candidate.
	pub(super) async fn prompt_text(&self, stage: Stage, turns: Vec<ChatTurn>) -> Result<String> {
		trace!("Prompting {} for {} with {} turns", self.text_model.name(), stage, turns.len());

		let content =
			self.text_model.generate(turns, &self.text_params()).await.map_err(|e| {
				error!("Failed to prompt text model: {}", e);
				IllustratorError::ServiceError(stage, e)
			})?;

		content
			.map(|content| content.trim().to_string())
			.filter(|content| !content.is_empty())
			.ok_or_else(|| {
				error!("Text model returned no content for {}", stage);
				IllustratorError::EmptyResponse(stage)
			})
	}
}
