//! Fixed system instructions sent to the text generation service.
//!
//! These are plain data. Swap them through [`Instructions`] without touching the pipeline.
use serde::{Deserialize, Serialize};

/// Header placed in front of the user supplied context in the description input.
pub const USER_CONTEXT_HEADER: &str = "ADDITIONAL DOCUMENT INFORMATION PROVIDED BY USER:";

pub const DESCRIPTION_INSTRUCTIONS: &str = "Determine what image would make an appealing yet \
appropriate banner for the provided markdown document, and then generate a highly accurate and \
detailed description of the image. Pay close attention to the context within the source material \
to ensure the description captures the item or scene's specific and intended purpose, appearance, \
and function. Avoid relying on common associations or stereotypes related to the terminology used \
and focus instead on the unique characteristics as described or depicted in the original source. \
If the item or scene has unconventional or non-standard features, emphasize these aspects to \
maintain fidelity to the original intent and description.";

pub const EXPANSION_INSTRUCTIONS: &str = "You are an AI that generates detailed image descriptions \
for an AI image generator. When provided with a brief description, expand it into a comprehensive \
and vivid prompt. Include specific details about the subject, environment, style, lighting, mood, \
and any additional elements to create a clear and precise image prompt. Ensure that the \
description is detailed enough to guide the image generator in producing a high-quality and \
accurate image. Here are some example image prompts:

1 /imagine prompt: Ultra High Resolution Photo of a 30-year-old male future soldier wearing a \
spacesuit inside an acceleration shell in a futuristic spaceship. The scene is lit with dim light \
casting in from control panels, a soft glow from holographic displays, and neon highlights with \
glowing gel. The photo is captured with a Canon EOS R5, paired with a 24mm Wide Angle lens, ISO \
800, shutter speed 1/125, and a shallow depth of field. The photo is edited with a natural yet \
slightly moody color style, influenced by the cinematic tones of Tim Walker's futuristic \
photography. award-winning, epic composition, ultra detailed
2 /imagine prompt: Ultra High Resolution Photo of a 30-year-old male soldier in a futuristic \
spacesuit, positioned inside an acceleration shell of a spaceship. The setting features dim \
lighting from control panels, accentuated by the soft glow of holographic displays and neon \
highlights, complemented by the eerie illumination of glowing gel. Captured with a Sony Alpha 7R \
IV, using a 35mm prime lens, ISO 640, shutter speed 1/200, and a medium depth of field. The image \
is stylized with a natural yet futuristic color palette, inspired by the work of Gregory \
Crewdson, emphasizing tension and atmosphere. award-winning, epic composition, ultra detailed
3 /imagine prompt: Ultra High Resolution Photo of a 30-year-old male future soldier encased in a \
spacesuit, situated within an acceleration shell aboard a cutting-edge spaceship. The environment \
is bathed in dim light from control panels, with soft holographic glows, neon highlights, and \
glowing gel creating a surreal ambiance. Captured using a Nikon Z7 II with a 50mm lens, ISO 500, \
shutter speed 1/100, and a deep depth of field. The image is processed with a vibrant yet dark \
color style, inspired by the cyberpunk aesthetic, adding a layer of intensity to the scene. \
award-winning, epic composition, ultra detailed

Make sure to include details regarding the camera settings etc. to make the image as accurate as \
possible.";

pub const REVISION_QUESTION: &str = "Does this image fit what you were trying to generate? If not, \
produce an updated image generation prompt.";

/// The set of instructions used by one [`crate::Illustrator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
	/// System instruction of the description stage.
	pub description: String,
	/// System instruction of the prompt expansion stage and of the revision conversation.
	pub expansion: String,
	/// Final user turn of the revision conversation.
	pub revision_question: String,
}

impl Default for Instructions {
	fn default() -> Self {
		Self {
			description: DESCRIPTION_INSTRUCTIONS.to_string(),
			expansion: EXPANSION_INSTRUCTIONS.to_string(),
			revision_question: REVISION_QUESTION.to_string(),
		}
	}
}

/// Combines the user context, document title and document body, in that order, into the input
/// of the description stage.
pub fn description_input(title: &str, body: &str, context: &str) -> String {
	format!("{} {}\n# {}\n{}", USER_CONTEXT_HEADER, context, title, body)
}
