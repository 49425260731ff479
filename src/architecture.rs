/// The following diagram shows a high level overview of the illustration pipeline and how an
/// application might use it.
///
/// Only the [`Illustrator`](crate::Illustrator) and [`Config`](crate::Config) are expanded to show
/// their main stages and associated types.
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// graph TB
///     subgraph Application
///         App
///         openai[OpenAI]
///         fal[fal.ai]
///     end
///     App-. impl .- Config
///     App-- generate / revise_last --> Illustrator
///     subgraph LLM Illustrator
///         text_generator>TextGenerator]
///         image_synthesizer>ImageSynthesizer]
///         progress_sink>ProgressSink]
///         subgraph Config
///             text_model[TextModel]
///             image_model[ImageModel]
///         end
///         subgraph Illustrator
///             describe[derive_description]-- description --> expand[expand_to_prompt]
///             expand-- prompt --> synthesize[synthesize_image]
///             synthesize-- image url --> revise
///             revise-- revised prompt --> synthesize
///         end
///         Illustrator-- checkpoints --> progress_sink
///         text_model -.- text_generator
///         image_model -.- image_synthesizer
///         describe --> text_model
///         expand --> text_model
///         revise-- attach image + critique --> text_model
///         synthesize --> image_model
///     end
///     text_generator -. default impl .- openai
///     image_synthesizer -. default impl .- fal
/// ```
///
/// The application picks the services through the [`Config`](crate::Config) trait. The crate
/// ships [`DefaultConfig`](crate::DefaultConfig) which uses OpenAI chat completions for text and
/// vision attachment, and the fal.ai queue API for images. Any other provider can be used by
/// implementing [`TextGenerator`](crate::TextGenerator) or
/// [`ImageSynthesizer`](crate::ImageSynthesizer).
///
/// The revision pass runs at most once per call and always renders a
/// [`REVISION_PROFILE`](crate::REVISION_PROFILE) image.
pub struct Diagram;
