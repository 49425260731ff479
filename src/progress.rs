//! Observational progress notifications emitted by the [`crate::Illustrator`].
//!
//! Sinks are only ever called; nothing they do feeds back into the pipeline.
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::types::Stage;

/// What happened at a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
	Started,
	/// The stage produced an artifact. `preview` holds its first characters.
	Finished { preview: String },
	Failed { reason: String },
}

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
	/// Identifies the pipeline run the event belongs to.
	pub run_id: Uuid,
	pub stage: Stage,
	pub status: ProgressStatus,
	/// RFC 3339 UTC timestamp.
	pub timestamp: String,
}

impl ProgressEvent {
	pub fn new(run_id: Uuid, stage: Stage, status: ProgressStatus) -> Self {
		Self { run_id, stage, status, timestamp: chrono::Utc::now().to_rfc3339() }
	}
}

/// Capability receiving [`ProgressEvent`]s.
pub trait ProgressSink: Send + Sync {
	fn notify(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
	F: Fn(&ProgressEvent) + Send + Sync,
{
	fn notify(&self, event: &ProgressEvent) {
		self(event)
	}
}

/// Default sink, renders events as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
	fn notify(&self, event: &ProgressEvent) {
		match &event.status {
			ProgressStatus::Started => info!(run_id = %event.run_id, "Generating {}...", event.stage),
			ProgressStatus::Finished { preview } =>
				info!(run_id = %event.run_id, "Generated {}: {}...", event.stage, preview),
			ProgressStatus::Failed { reason } =>
				error!(run_id = %event.run_id, "Error generating {}: {}", event.stage, reason),
		}
	}
}

/// First `max_chars` characters of `content`.
pub fn preview(content: &str, max_chars: usize) -> String {
	content.chars().take(max_chars).collect()
}
