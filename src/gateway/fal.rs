use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace};

use super::{ensure_success, non_empty_env, ImageSynthesizer, SynthesisRequest, HTTP_CLIENT};
use crate::{models::ImageModels, types::GatewayError};

pub const FAL_KEY_VAR: &str = "FAL_KEY";
pub const FAL_API_KEY_VAR: &str = "FAL_API_KEY";
pub const FAL_QUEUE_BASE_VAR: &str = "FAL_QUEUE_BASE";

/// Default base URL of the fal.ai queue API.
pub const DEFAULT_QUEUE_BASE: &str = "https://queue.fal.run";

/// Delay between two queue status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long a request may stay queued or in progress before polling gives up.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// [`ImageSynthesizer`] backed by the fal.ai queue API.
///
/// A request is submitted to the queue, its status is polled until completion while queue logs
/// are forwarded to `tracing`, and finally the result payload is fetched.
#[derive(Debug, Clone)]
pub struct FalImageSynthesizer {
	api_key: String,
	queue_base: String,
	model: ImageModels,
	poll_interval: Duration,
	poll_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct QueueSubmission {
	request_id: String,
	status_url: String,
	response_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum QueueState {
	InQueue,
	InProgress,
	Completed,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
	status: QueueState,
	#[serde(default)]
	queue_position: Option<u64>,
	#[serde(default)]
	logs: Option<Vec<QueueLog>>,
}

#[derive(Debug, Deserialize)]
struct QueueLog {
	message: String,
}

#[derive(Debug, Deserialize)]
struct SynthesisOutput {
	#[serde(default)]
	images: Vec<OutputImage>,
}

#[derive(Debug, Deserialize)]
struct OutputImage {
	url: String,
}

impl FalImageSynthesizer {
	pub fn new(api_key: impl Into<String>, model: ImageModels) -> Self {
		Self {
			api_key: api_key.into(),
			queue_base: DEFAULT_QUEUE_BASE.to_string(),
			model,
			poll_interval: DEFAULT_POLL_INTERVAL,
			poll_timeout: DEFAULT_POLL_TIMEOUT,
		}
	}

	/// Builds the synthesizer from `FAL_KEY` (or `FAL_API_KEY`), honouring a `FAL_QUEUE_BASE`
	/// override.
	pub fn from_env(model: ImageModels) -> Result<Self, GatewayError> {
		let api_key = non_empty_env(FAL_KEY_VAR)
			.or_else(|| non_empty_env(FAL_API_KEY_VAR))
			.ok_or(GatewayError::MissingCredentials(FAL_KEY_VAR))?;

		let synthesizer = Self::new(api_key, model);

		Ok(match non_empty_env(FAL_QUEUE_BASE_VAR) {
			Some(base) => synthesizer.with_queue_base(base),
			None => synthesizer,
		})
	}

	pub fn with_queue_base(mut self, base: impl Into<String>) -> Self {
		self.queue_base = base.into().trim_end_matches('/').to_string();
		self
	}

	pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval;
		self
	}

	pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
		self.poll_timeout = poll_timeout;
		self
	}

	fn endpoint(&self) -> String {
		format!("{}/{}", self.queue_base, self.model.name())
	}

	fn authorization(&self) -> String {
		format!("Key {}", self.api_key)
	}

	async fn fetch_json<D: DeserializeOwned>(
		&self,
		request: RequestBuilder,
	) -> Result<D, GatewayError> {
		let response = request.header(AUTHORIZATION, self.authorization()).send().await?;
		let body = ensure_success(response).await?.text().await?;

		parse_payload(&body)
	}

	/// Polls the queue until the request completes, logging every new queue log line once.
	///
	/// Returns the queue log lines in the order they were logged.
	async fn wait_for_completion(&self, status_url: &str) -> Result<Vec<String>, GatewayError> {
		let started = Instant::now();
		let mut logged = Vec::new();

		loop {
			let status: QueueStatus =
				self.fetch_json(HTTP_CLIENT.get(status_url).query(&[("logs", "1")])).await?;

			match status.status {
				QueueState::InQueue => {
					trace!("Queued at position {:?}", status.queue_position);
				},
				QueueState::InProgress | QueueState::Completed => {
					for log in status.logs.unwrap_or_default().into_iter().skip(logged.len()) {
						info!(model = self.model.name(), "{}", log.message);
						logged.push(log.message);
					}
				},
			}

			if status.status == QueueState::Completed {
				return Ok(logged)
			}

			if started.elapsed() >= self.poll_timeout {
				error!("fal request still {:?} after {:?}", status.status, self.poll_timeout);
				return Err(GatewayError::TimedOut(self.poll_timeout))
			}

			tokio::time::sleep(self.poll_interval).await;
		}
	}
}

#[async_trait]
impl ImageSynthesizer for FalImageSynthesizer {
	fn name(&self) -> &str {
		self.model.name()
	}

	#[instrument(skip(self, request), fields(model = self.model.name()))]
	async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<String>, GatewayError> {
		let payload = json!({
			"prompt": request.prompt,
			"image_size": {
				"width": request.dimensions.width,
				"height": request.dimensions.height,
			},
			"num_inference_steps": request.inference_steps,
		});

		let response = HTTP_CLIENT
			.post(self.endpoint())
			.header(AUTHORIZATION, self.authorization())
			.json(&payload)
			.send()
			.await
			.map_err(|e| {
				error!("Failed to submit fal request: {}", e);
				GatewayError::from(e)
			})?;
		let body = ensure_success(response).await?.text().await?;
		let submission: QueueSubmission = parse_payload(&body)?;

		debug!("Submitted fal request {}", submission.request_id);

		let logs = self.wait_for_completion(&submission.status_url).await?;
		trace!("fal request {} completed with {} log lines", submission.request_id, logs.len());

		let output: SynthesisOutput =
			self.fetch_json(HTTP_CLIENT.get(&submission.response_url)).await?;

		Ok(output.images.into_iter().map(|image| image.url).collect())
	}
}

fn parse_payload<D: DeserializeOwned>(body: &str) -> Result<D, GatewayError> {
	serde_json::from_str(body).map_err(|e| {
		error!("Failed to parse fal payload: {}", e);
		GatewayError::Malformed(e.to_string())
	})
}

#[cfg(test)]
mod tests {
	use std::{
		collections::VecDeque,
		net::SocketAddr,
		sync::{Arc, Mutex},
	};

	use tokio::{
		io::{AsyncReadExt, AsyncWriteExt},
		net::{TcpListener, TcpStream},
	};

	use super::*;
	use crate::types::ImageProfile;

	/// Local HTTP server answering with scripted responses in order, repeating the last one once
	/// the script runs out.
	struct ScriptedServer {
		addr: SocketAddr,
		requests: Arc<Mutex<Vec<String>>>,
	}

	impl ScriptedServer {
		/// `script` receives the base URL of the server.
		async fn start(script: impl FnOnce(&str) -> Vec<(u16, String)>) -> Self {
			let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
			let addr = listener.local_addr().unwrap();
			let responses = script(&format!("http://{}", addr));
			let requests = Arc::new(Mutex::new(Vec::new()));

			let seen = Arc::clone(&requests);
			tokio::spawn(async move {
				let mut responses: VecDeque<_> = responses.into();
				let mut last = None;

				while let Ok((mut socket, _)) = listener.accept().await {
					let request = read_request(&mut socket).await;
					seen.lock().unwrap().push(request);

					let (code, body) = responses.pop_front().or_else(|| last.clone()).unwrap();
					let reply = format!(
						"HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
						code,
						body.len(),
						body
					);
					socket.write_all(reply.as_bytes()).await.unwrap();
					let _ = socket.shutdown().await;
					last = Some((code, body));
				}
			});

			Self { addr, requests }
		}

		fn url(&self, path: &str) -> String {
			format!("http://{}{}", self.addr, path)
		}

		fn synthesizer(&self) -> FalImageSynthesizer {
			FalImageSynthesizer::new("secret", ImageModels::FluxSchnell)
				.with_queue_base(self.url(""))
				.with_poll_interval(Duration::from_millis(10))
		}

		fn requests(&self) -> Vec<String> {
			self.requests.lock().unwrap().clone()
		}
	}

	/// Reads one request and returns its method and target.
	async fn read_request(socket: &mut TcpStream) -> String {
		let mut buf = Vec::new();
		let mut chunk = [0u8; 1024];

		let header_end = loop {
			let n = socket.read(&mut chunk).await.unwrap();
			if n == 0 {
				break buf.len()
			}
			buf.extend_from_slice(&chunk[..n]);
			if let Some(pos) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
				break pos + 4
			}
		};

		let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
		let body_len = head
			.lines()
			.filter_map(|line| line.split_once(':'))
			.find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
			.and_then(|(_, value)| value.trim().parse::<usize>().ok())
			.unwrap_or(0);

		while buf.len() < header_end + body_len {
			let n = socket.read(&mut chunk).await.unwrap();
			if n == 0 {
				break
			}
			buf.extend_from_slice(&chunk[..n]);
		}

		let request_line = head.lines().next().unwrap_or_default();
		request_line.rsplit_once(' ').map(|(target, _)| target.to_string()).unwrap_or_default()
	}

	fn submission(base: &str) -> (u16, String) {
		let body = json!({
			"request_id": "req-1",
			"status_url": format!("{}/requests/req-1/status", base),
			"response_url": format!("{}/requests/req-1", base),
		});
		(200, body.to_string())
	}

	fn status(state: &str, logs: &[&str]) -> (u16, String) {
		let logs: Vec<_> = logs.iter().map(|message| json!({ "message": message })).collect();
		(200, json!({ "status": state, "logs": logs }).to_string())
	}

	fn banner_request() -> SynthesisRequest {
		SynthesisRequest {
			prompt: "Ultra High Resolution Photo of a lighthouse".to_string(),
			dimensions: ImageProfile::Banner.dimensions(),
			inference_steps: 12,
		}
	}

	#[tokio::test]
	async fn synthesize_polls_queue_until_completed() {
		let server = ScriptedServer::start(|base| {
			vec![
				submission(base),
				(200, json!({ "status": "IN_QUEUE", "queue_position": 2 }).to_string()),
				status("IN_PROGRESS", &["step 1/12"]),
				status("COMPLETED", &["step 1/12", "step 12/12"]),
				(200, json!({ "images": [{ "url": "https://fal.media/a.jpg" }] }).to_string()),
			]
		})
		.await;

		let urls = server.synthesizer().synthesize(&banner_request()).await.unwrap();

		assert_eq!(urls, vec!["https://fal.media/a.jpg"]);
		assert_eq!(
			server.requests(),
			vec![
				"POST /fal-ai/flux/schnell",
				"GET /requests/req-1/status?logs=1",
				"GET /requests/req-1/status?logs=1",
				"GET /requests/req-1/status?logs=1",
				"GET /requests/req-1",
			]
		);
	}

	#[tokio::test]
	async fn queue_logs_are_reported_once() {
		let server = ScriptedServer::start(|_| {
			vec![
				status("IN_PROGRESS", &["loading model"]),
				status("IN_PROGRESS", &["loading model", "step 6/12"]),
				status("IN_PROGRESS", &["loading model", "step 6/12"]),
				status("COMPLETED", &["loading model", "step 6/12", "step 12/12"]),
			]
		})
		.await;

		let logs = server
			.synthesizer()
			.wait_for_completion(&server.url("/requests/req-1/status"))
			.await
			.unwrap();

		assert_eq!(logs, vec!["loading model", "step 6/12", "step 12/12"]);
		assert_eq!(server.requests().len(), 4);
	}

	#[tokio::test]
	async fn status_query_is_appended_to_existing_query() {
		let server = ScriptedServer::start(|_| vec![status("COMPLETED", &[])]).await;

		server
			.synthesizer()
			.wait_for_completion(&server.url("/requests/req-1/status?token=abc"))
			.await
			.unwrap();

		assert_eq!(server.requests(), vec!["GET /requests/req-1/status?token=abc&logs=1"]);
	}

	#[tokio::test]
	async fn failing_status_poll_is_a_status_error() {
		let server =
			ScriptedServer::start(|base| vec![submission(base), (500, "boom".to_string())]).await;

		let err = server.synthesizer().synthesize(&banner_request()).await.unwrap_err();

		assert!(matches!(err, GatewayError::Status(500, ref body) if body == "boom"));
	}

	#[tokio::test]
	async fn failing_response_fetch_is_a_status_error() {
		let server = ScriptedServer::start(|base| {
			vec![submission(base), status("COMPLETED", &[]), (404, "gone".to_string())]
		})
		.await;

		let err = server.synthesizer().synthesize(&banner_request()).await.unwrap_err();

		assert!(matches!(err, GatewayError::Status(404, _)));
		assert_eq!(server.requests().last().unwrap(), "GET /requests/req-1");
	}

	#[tokio::test]
	async fn stuck_request_times_out() {
		let server = ScriptedServer::start(|base| {
			vec![submission(base), (200, json!({ "status": "IN_QUEUE" }).to_string())]
		})
		.await;

		let synthesizer = server.synthesizer().with_poll_timeout(Duration::from_millis(50));
		let result = tokio::time::timeout(
			Duration::from_secs(5),
			synthesizer.synthesize(&banner_request()),
		)
		.await
		.expect("polling must stop on its own");

		assert!(matches!(
			result,
			Err(GatewayError::TimedOut(after)) if after == Duration::from_millis(50)
		));
		assert!(server.requests().len() > 2);
	}

	#[test]
	fn queue_status_parses_progress_logs() {
		let status: QueueStatus = parse_payload(
			r#"{"status":"IN_PROGRESS","logs":[{"message":"step 1/12","level":"INFO"}]}"#,
		)
		.unwrap();

		assert_eq!(status.status, QueueState::InProgress);
		assert_eq!(status.logs.unwrap()[0].message, "step 1/12");
	}

	#[test]
	fn queue_status_without_logs() {
		let status: QueueStatus =
			parse_payload(r#"{"status":"IN_QUEUE","queue_position":3}"#).unwrap();

		assert_eq!(status.status, QueueState::InQueue);
		assert_eq!(status.queue_position, Some(3));
		assert!(status.logs.is_none());
	}

	#[test]
	fn output_keeps_image_order() {
		let output: SynthesisOutput = parse_payload(
			r#"{"images":[{"url":"https://fal.media/a.jpg","width":2000},{"url":"https://fal.media/b.jpg"}],"seed":7}"#,
		)
		.unwrap();

		let urls: Vec<_> = output.images.into_iter().map(|image| image.url).collect();
		assert_eq!(urls, vec!["https://fal.media/a.jpg", "https://fal.media/b.jpg"]);
	}

	#[test]
	fn output_without_images_is_empty() {
		let output: SynthesisOutput = parse_payload(r#"{"seed":7}"#).unwrap();
		assert!(output.images.is_empty());
	}

	#[test]
	fn unknown_status_is_malformed() {
		let err = parse_payload::<QueueStatus>(r#"{"status":"EXPLODED"}"#).unwrap_err();
		assert!(matches!(err, GatewayError::Malformed(_)));
	}

	#[test]
	fn endpoint_joins_queue_base_and_model() {
		let synthesizer = FalImageSynthesizer::new("key", ImageModels::FluxSchnell)
			.with_queue_base("http://localhost:8080/");

		assert_eq!(synthesizer.endpoint(), "http://localhost:8080/fal-ai/flux/schnell");
		assert_eq!(synthesizer.authorization(), "Key key");
	}
}
