use tracing::{error, instrument};
use uuid::Uuid;

use super::Illustrator;
use crate::{
	gateway::{TextGenerator, VisionRef},
	instructions::Instructions,
	types::{ChatTurn, GatewayError, ImageProfile, Stage},
	Config, GenerationResult, IllustratorError, PipelineArtifact, Result,
};

/// Profile of every revised image, whatever profile the original run used.
pub const REVISION_PROFILE: ImageProfile = ImageProfile::Banner;

impl<T: Config> Illustrator<T> {
	/// Shows the previously generated image to the text model and generates one more image.
	///
	/// The model is asked whether the image fits what it tried to generate and, if not, for an
	/// updated prompt. Its reply is used as the new prompt in either case, so a satisfied model is
	/// expected to repeat an equivalent prompt. The `description` is carried over unchanged.
	pub(crate) async fn revise(
		&self,
		description: &str,
		previous_prompt: &str,
		previous_image_ref: &str,
	) -> Result<GenerationResult> {
		self.revise_in(Uuid::new_v4(), description, previous_prompt, previous_image_ref).await
	}

	#[instrument(skip(self, description, previous_prompt))]
	pub(super) async fn revise_in(
		&self,
		run_id: Uuid,
		description: &str,
		previous_prompt: &str,
		previous_image_ref: &str,
	) -> Result<GenerationResult> {
		let mut artifact = PipelineArtifact::default();
		let description = artifact.record_description(description.to_string());

		let vision_ref = self
			.checkpoint(run_id, Stage::VisionAttachment, self.attach_image(previous_image_ref))
			.await?;

		let turns = revision_turns(&self.instructions, description, previous_prompt, &vision_ref);
		let prompt = self
			.checkpoint(run_id, Stage::RevisedPrompt, self.prompt_text(Stage::RevisedPrompt, turns))
			.await?;
		let prompt = artifact.record_prompt(prompt);

		let image_ref = self
			.checkpoint(run_id, Stage::Synthesis, self.synthesize_image(prompt, REVISION_PROFILE))
			.await?;
		artifact.record_image_ref(image_ref);

		artifact.finish().ok_or(IllustratorError::SynthesisError(None))
	}

	async fn attach_image(&self, image_ref: &str) -> Result<VisionRef> {
		if image_ref.trim().is_empty() {
			error!("No previous image to attach for revision");
			return Err(IllustratorError::UploadError(GatewayError::Malformed(
				"empty image reference".to_string(),
			)))
		}

		self.text_model.attach_image(image_ref).await.map_err(|e| {
			error!("Failed to attach image for revision: {}", e);
			IllustratorError::UploadError(e)
		})
	}
}

/// Conversation in which the model looks at its own previous output.
fn revision_turns(
	instructions: &Instructions,
	description: &str,
	previous_prompt: &str,
	vision_ref: &VisionRef,
) -> Vec<ChatTurn> {
	vec![
		ChatTurn::system(&instructions.expansion),
		ChatTurn::user(description),
		ChatTurn::assistant(previous_prompt),
		ChatTurn::assistant(vision_ref.as_turn_content()),
		ChatTurn::user(&instructions.revision_question),
	]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::TurnRole;

	#[test]
	fn revision_conversation_has_five_ordered_turns() {
		let turns = revision_turns(
			&Instructions::default(),
			"a lighthouse",
			"Ultra High Resolution Photo of a lighthouse",
			&VisionRef("file-123".to_string()),
		);

		let roles: Vec<_> = turns.iter().map(|turn| turn.role).collect();
		assert_eq!(
			roles,
			vec![
				TurnRole::System,
				TurnRole::User,
				TurnRole::Assistant,
				TurnRole::Assistant,
				TurnRole::User
			]
		);
		assert_eq!(turns[1].content, "a lighthouse");
		assert_eq!(turns[2].content, "Ultra High Resolution Photo of a lighthouse");
		assert_eq!(turns[3].content, "<image: file-123>");
		assert_eq!(turns[4].content, crate::instructions::REVISION_QUESTION);
	}
}
