use std::{error::Error, path::PathBuf};

use clap::{arg, Parser};
use llm_illustrator::{
	gateway::{fal::FalImageSynthesizer, openai::OpenAiTextGenerator},
	models::{ImageModels, TextModels},
	DefaultConfig, Document, GenerationRequest, Illustrator, ImageProfile,
};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::fmt;

#[derive(Parser, Debug)]
struct Args {
	/// Markdown document to illustrate. Its file stem is used as the title.
	document: PathBuf,
	/// Additional information about the purpose of the document.
	#[arg(long, default_value = "")]
	context: String,
	/// Target aspect/resolution of the image.
	#[arg(long, value_enum, default_value_t = ImageProfile::Banner)]
	profile: ImageProfile,
	/// Run one revision pass after the first image is generated.
	#[arg(long)]
	revise: bool,
	/// Text model to use.
	#[arg(long, value_enum, default_value_t = TextModels::Gpt4o)]
	text_model: TextModels,
	/// Image model to use.
	#[arg(long, value_enum, default_value_t = ImageModels::FluxSchnell)]
	image_model: ImageModels,
	/// Log level
	#[arg(long, default_value = "info")]
	log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let args = Args::parse();

	let subscriber = fmt::Subscriber::builder().with_max_level(args.log_level).finish();
	tracing::subscriber::set_global_default(subscriber)?;

	info!(task = "tracing_setup", result = "success", "tracing successfully set up");

	dotenvy::dotenv().ok();

	info!(task = "dotenv_setup", result = "success", "dotenv loaded successfully");

	let body = tokio::fs::read_to_string(&args.document).await?;
	let title = args
		.document
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_default();
	let document = Document::new(title, body);

	let illustrator = Illustrator::<DefaultConfig>::new(
		OpenAiTextGenerator::from_env(args.text_model)?,
		FalImageSynthesizer::from_env(args.image_model)?,
	);

	let output = if args.revise {
		let request = GenerationRequest::from_document(&args.context, &document, args.profile);
		let (initial, revised) = illustrator.run_with_revision(&request).await?;
		json!({ "initial": initial, "revised": revised })
	} else {
		json!(illustrator.generate(&args.context, &document, args.profile).await?)
	};

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}
