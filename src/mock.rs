use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
	gateway::{ImageSynthesizer, SynthesisRequest, TextGenerator, TextParams, VisionRef},
	progress::{ProgressEvent, ProgressSink},
	types::{ChatTurn, GatewayError},
	Config,
};

/// Scripted text model recording every call it receives.
#[derive(Default)]
pub struct MockTextModel {
	replies: Mutex<VecDeque<Result<Option<String>, GatewayError>>>,
	attachment: Mutex<Option<Result<VisionRef, GatewayError>>>,
	pub calls: Mutex<Vec<(Vec<ChatTurn>, TextParams)>>,
	pub attachments: Mutex<Vec<String>>,
}

impl MockTextModel {
	pub fn replying(replies: Vec<Result<Option<String>, GatewayError>>) -> Self {
		Self { replies: Mutex::new(replies.into()), ..Default::default() }
	}

	pub fn with_attachment(self, attachment: Result<VisionRef, GatewayError>) -> Self {
		*self.attachment.lock().unwrap() = Some(attachment);
		self
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap().len()
	}

	pub fn turns(&self, call: usize) -> Vec<ChatTurn> {
		self.calls.lock().unwrap()[call].0.clone()
	}
}

#[async_trait]
impl TextGenerator for MockTextModel {
	fn name(&self) -> &str {
		"MockTextModel"
	}

	async fn generate(
		&self,
		turns: Vec<ChatTurn>,
		params: &TextParams,
	) -> Result<Option<String>, GatewayError> {
		self.calls.lock().unwrap().push((turns, *params));
		self.replies
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or_else(|| Err(GatewayError::Malformed("no scripted reply".to_string())))
	}

	async fn attach_image(&self, image_url: &str) -> Result<VisionRef, GatewayError> {
		self.attachments.lock().unwrap().push(image_url.to_string());
		self.attachment
			.lock()
			.unwrap()
			.take()
			.unwrap_or_else(|| Ok(VisionRef(format!("file-{}", image_url.len()))))
	}
}

/// Scripted image model recording every request it receives.
#[derive(Default)]
pub struct MockImageModel {
	replies: Mutex<VecDeque<Result<Vec<String>, GatewayError>>>,
	pub requests: Mutex<Vec<SynthesisRequest>>,
}

impl MockImageModel {
	pub fn replying(replies: Vec<Result<Vec<String>, GatewayError>>) -> Self {
		Self { replies: Mutex::new(replies.into()), ..Default::default() }
	}

	pub fn call_count(&self) -> usize {
		self.requests.lock().unwrap().len()
	}

	pub fn request(&self, call: usize) -> SynthesisRequest {
		self.requests.lock().unwrap()[call].clone()
	}
}

#[async_trait]
impl ImageSynthesizer for MockImageModel {
	fn name(&self) -> &str {
		"MockImageModel"
	}

	async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<String>, GatewayError> {
		self.requests.lock().unwrap().push(request.clone());
		self.replies
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or_else(|| Err(GatewayError::Malformed("no scripted image".to_string())))
	}
}

/// Progress sink keeping every event for later inspection.
#[derive(Default, Clone)]
pub struct RecordingProgress(pub Arc<Mutex<Vec<ProgressEvent>>>);

impl RecordingProgress {
	pub fn events(&self) -> Vec<ProgressEvent> {
		self.0.lock().unwrap().clone()
	}
}

impl ProgressSink for RecordingProgress {
	fn notify(&self, event: &ProgressEvent) {
		self.0.lock().unwrap().push(event.clone());
	}
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MockConfig;
impl Config for MockConfig {
	type TextModel = MockTextModel;
	type ImageModel = MockImageModel;
}

pub fn reply(content: &str) -> Result<Option<String>, GatewayError> {
	Ok(Some(content.to_string()))
}

pub fn image(url: &str) -> Result<Vec<String>, GatewayError> {
	Ok(vec![url.to_string()])
}
