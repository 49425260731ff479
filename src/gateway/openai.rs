use async_openai::{
	config::OpenAIConfig,
	types::{
		ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
		ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
		CreateChatCompletionRequestArgs, CreateFileRequestArgs, FileInput, FilePurpose,
	},
	Client,
};
use async_trait::async_trait;
use tracing::{debug, error, instrument, trace};

use super::{ensure_success, non_empty_env, TextGenerator, TextParams, VisionRef, HTTP_CLIENT};
use crate::{
	models::TextModels,
	types::{ChatTurn, GatewayError, TurnRole},
};

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// File name used for uploads when none can be derived from the image URL.
const FALLBACK_FILE_NAME: &str = "image.png";

/// [`TextGenerator`] backed by the OpenAI chat completions and files APIs.
#[derive(Debug, Clone)]
pub struct OpenAiTextGenerator {
	client: Client<OpenAIConfig>,
	model: TextModels,
}

impl OpenAiTextGenerator {
	pub fn new(api_key: impl Into<String>, model: TextModels) -> Self {
		let config = OpenAIConfig::new().with_api_key(api_key);
		Self { client: Client::with_config(config), model }
	}

	/// Builds the generator from the `OPENAI_API_KEY` environment variable.
	pub fn from_env(model: TextModels) -> Result<Self, GatewayError> {
		let api_key = non_empty_env(OPENAI_API_KEY_VAR)
			.ok_or(GatewayError::MissingCredentials(OPENAI_API_KEY_VAR))?;

		Ok(Self::new(api_key, model))
	}

	fn build_messages(
		turns: Vec<ChatTurn>,
	) -> Result<Vec<ChatCompletionRequestMessage>, GatewayError> {
		turns
			.into_iter()
			.map(|turn| {
				let msg: ChatCompletionRequestMessage = match turn.role {
					TurnRole::System => ChatCompletionRequestSystemMessageArgs::default()
						.content(turn.content)
						.build()?
						.into(),
					TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
						.content(turn.content)
						.build()?
						.into(),
					TurnRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
						.content(turn.content)
						.build()?
						.into(),
				};

				Ok(msg)
			})
			.collect()
	}

	async fn download(image_url: &str) -> Result<Vec<u8>, GatewayError> {
		let response = HTTP_CLIENT.get(image_url).send().await?;
		let bytes = ensure_success(response).await?.bytes().await?;

		Ok(bytes.to_vec())
	}
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
	fn name(&self) -> &str {
		self.model.name()
	}

	#[instrument(skip(self, turns), fields(model = self.model.name(), turns = turns.len()))]
	async fn generate(
		&self,
		turns: Vec<ChatTurn>,
		params: &TextParams,
	) -> Result<Option<String>, GatewayError> {
		let request = CreateChatCompletionRequestArgs::default()
			.model(self.model.name())
			.messages(Self::build_messages(turns)?)
			.max_tokens(params.max_tokens)
			.temperature(params.temperature)
			.n(params.candidates)
			.build()?;

		let response = self.client.chat().create(request).await.map_err(|e| {
			error!("Failed to prompt OpenAI: {}", e);
			GatewayError::from(e)
		})?;

		trace!("OpenAI returned {} choices", response.choices.len());

		Ok(response.choices.into_iter().next().and_then(|choice| choice.message.content))
	}

	#[instrument(skip(self))]
	async fn attach_image(&self, image_url: &str) -> Result<VisionRef, GatewayError> {
		let bytes = Self::download(image_url).await.map_err(|e| {
			error!("Failed to download image for upload: {}", e);
			e
		})?;

		debug!("Uploading {} bytes to OpenAI", bytes.len());

		let request = CreateFileRequestArgs::default()
			.file(FileInput::from_vec_u8(image_file_name(image_url), bytes))
			.purpose(FilePurpose::Vision)
			.build()?;

		let file = self.client.files().create(request).await.map_err(|e| {
			error!("Failed to upload image to OpenAI: {}", e);
			GatewayError::from(e)
		})?;

		Ok(VisionRef(file.id))
	}
}

/// Last path segment of `url`, without query string or fragment.
fn image_file_name(url: &str) -> String {
	url.split(['?', '#'])
		.next()
		.and_then(|path| path.rsplit('/').next())
		.map(str::trim)
		.filter(|name| !name.is_empty() && name.contains('.'))
		.map(str::to_string)
		.unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}
