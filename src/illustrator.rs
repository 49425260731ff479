use std::{future::Future, marker::PhantomData};

use tracing::{debug, instrument, trace};
use uuid::Uuid;

use crate::{
	gateway::TextParams,
	instructions::Instructions,
	progress::{preview, ProgressEvent, ProgressSink, ProgressStatus, TracingProgress},
	types::{ImageProfile, Stage},
	Config, Document, GenerationRequest, GenerationResult, IllustratorError, PipelineArtifact,
	Result,
};

mod revision;
mod stages;

pub use revision::REVISION_PROFILE;

/// The machine that drives the illustration pipeline.
///
/// A run goes through the description, prompt expansion and synthesis stages strictly one
/// after the other, each awaiting its external call before the next one starts. The first
/// failing stage aborts the run and its error is returned as is, without any partial result.
///
/// This is implemented over the [`Config`] trait.
pub struct Illustrator<T: Config> {
	text_model: T::TextModel,
	image_model: T::ImageModel,
	instructions: Instructions,
	progress: Box<dyn ProgressSink>,
	_phantom: PhantomData<T>,
}

impl<T: Config> Illustrator<T> {
	/// Creates a new instance of `Illustrator` logging its progress through [`TracingProgress`].
	pub fn new(text_model: T::TextModel, image_model: T::ImageModel) -> Self {
		Self {
			text_model,
			image_model,
			instructions: Instructions::default(),
			progress: Box::new(TracingProgress),
			_phantom: PhantomData,
		}
	}

	/// Replaces the sink receiving [`ProgressEvent`]s.
	pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
		self.progress = Box::new(progress);
		self
	}

	/// Replaces the system instructions sent to the text model.
	pub fn with_instructions(mut self, instructions: Instructions) -> Self {
		self.instructions = instructions;
		self
	}

	pub fn text_model(&self) -> &T::TextModel {
		&self.text_model
	}

	pub fn image_model(&self) -> &T::ImageModel {
		&self.image_model
	}

	pub fn instructions(&self) -> &Instructions {
		&self.instructions
	}

	/// Illustrate `document` for the given `profile`.
	///
	/// `context` is free text from the author about the purpose of the document and may be
	/// empty.
	pub async fn generate(
		&self,
		context: &str,
		document: &Document,
		profile: ImageProfile,
	) -> Result<GenerationResult> {
		self.run(&GenerationRequest::from_document(context, document, profile)).await
	}

	/// Run the revision pass over the parts of a previously returned [`GenerationResult`].
	///
	/// Fails with [`IllustratorError::UploadError`] before contacting any service when
	/// `image_ref` is blank.
	pub async fn revise_last(
		&self,
		description: &str,
		prompt: &str,
		image_ref: &str,
	) -> Result<GenerationResult> {
		self.revise(description, prompt, image_ref).await
	}

	/// Runs the description, prompt expansion and synthesis stages for `request`.
	pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult> {
		self.run_in(Uuid::new_v4(), request).await
	}

	/// Runs the pipeline for `request` followed by exactly one revision pass.
	///
	/// Returns the initial result and the revised result, the caller decides which to keep.
	pub async fn run_with_revision(
		&self,
		request: &GenerationRequest,
	) -> Result<(GenerationResult, GenerationResult)> {
		let run_id = Uuid::new_v4();

		let initial = self.run_in(run_id, request).await?;
		let revised = self
			.revise_in(run_id, &initial.description, &initial.prompt, &initial.image_ref)
			.await?;

		Ok((initial, revised))
	}

	#[instrument(
		skip(self, request),
		fields(title = request.document_title(), profile = %request.image_profile())
	)]
	async fn run_in(&self, run_id: Uuid, request: &GenerationRequest) -> Result<GenerationResult> {
		let mut artifact = PipelineArtifact::default();

		trace!("Deriving description from {} bytes of document", request.document_body().len());

		let description = self
			.checkpoint(
				run_id,
				Stage::Description,
				self.derive_description(
					request.document_title(),
					request.document_body(),
					request.user_context(),
				),
			)
			.await?;
		let description = artifact.record_description(description);

		let prompt = self
			.checkpoint(run_id, Stage::PromptExpansion, self.expand_to_prompt(description))
			.await?;
		let prompt = artifact.record_prompt(prompt);

		let image_ref = self
			.checkpoint(
				run_id,
				Stage::Synthesis,
				self.synthesize_image(prompt, request.image_profile()),
			)
			.await?;
		artifact.record_image_ref(image_ref);

		debug!("Pipeline run complete: {:?}", artifact);

		artifact.finish().ok_or(IllustratorError::SynthesisError(None))
	}

	/// Brackets a stage with progress notifications.
	async fn checkpoint<R, F>(&self, run_id: Uuid, stage: Stage, stage_fut: F) -> Result<R>
	where
		R: AsRef<str>,
		F: Future<Output = Result<R>>,
	{
		self.notify(run_id, stage, ProgressStatus::Started);

		match stage_fut.await {
			Ok(output) => {
				let preview = preview(output.as_ref(), T::PREVIEW_CHARS);
				self.notify(run_id, stage, ProgressStatus::Finished { preview });
				Ok(output)
			},
			Err(e) => {
				self.notify(run_id, stage, ProgressStatus::Failed { reason: e.to_string() });
				Err(e)
			},
		}
	}

	fn notify(&self, run_id: Uuid, stage: Stage, status: ProgressStatus) {
		self.progress.notify(&ProgressEvent::new(run_id, stage, status));
	}

	fn text_params(&self) -> TextParams {
		TextParams {
			max_tokens: T::MAX_RESPONSE_TOKENS,
			temperature: T::TEMPERATURE,
			candidates: 1,
		}
	}
}
