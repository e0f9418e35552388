//! Google Generative Language API adapter.
//!
//! - text: Gemini `models/{model}:generateContent`
//! - images: Imagen `models/{model}:predict` (base64 bytes inline)
//! - videos: Veo `models/{model}:predictLongRunning`, then polling the
//!   returned operation and downloading the generated samples

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{
    ImageResult, JobState, JobStatusResult, Media, MediaProvider, ProviderError, TextModel,
    TextRequest, VideoJobResult,
};
use crate::config::ProviderConfig;
use crate::sanitize::truncate_error_body;

const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_IMAGE_MIME: &str = "image/png";
const DEFAULT_VIDEO_MIME: &str = "video/mp4";

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    text_model: String,
}

impl GeminiClient {
    pub fn new(config: &ProviderConfig, api_key: SecretString) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            text_model: config.text_model.clone(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;
        read_json(response).await
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_error_body(&body),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

async fn read_json(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: truncate_error_body(&body),
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

#[async_trait]
impl TextModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &TextRequest) -> Result<String, ProviderError> {
        let mut generation_config = serde_json::Map::new();
        if let Some(t) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(max) = request.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max));
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        });
        if !request.system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }

        let url = self.model_url(&self.text_model, "generateContent");
        let payload = self.post_json(&url, &body).await?;
        extract_text(&payload)
    }
}

#[async_trait]
impl MediaProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_image(&self, prompt: &str, model: &str) -> Result<ImageResult, ProviderError> {
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 },
        });
        let payload = self.post_json(&self.model_url(model, "predict"), &body).await?;
        let media = extract_predictions(&payload)?;
        if media.is_empty() {
            let reason = payload
                .pointer("/predictions/0/raiFilteredReason")
                .and_then(Value::as_str)
                .unwrap_or("Provider returned no images");
            return Ok(ImageResult::failed(reason));
        }
        Ok(ImageResult::ok(media))
    }

    async fn generate_video(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<VideoJobResult, ProviderError> {
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "aspectRatio": "16:9" },
        });
        let payload = self
            .post_json(&self.model_url(model, "predictLongRunning"), &body)
            .await?;
        match payload.get("name").and_then(Value::as_str) {
            Some(name) => Ok(VideoJobResult::started(name)),
            None => Ok(VideoJobResult::failed("Provider did not return an operation name")),
        }
    }

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusResult, ProviderError> {
        if !is_operation_name(job_id) {
            return Err(ProviderError::Parse(format!("invalid operation name '{}'", job_id)));
        }
        let payload = self.get_json(&format!("{}/{}", self.base_url, job_id)).await?;

        match parse_operation(&payload) {
            OperationState::Running => Ok(JobStatusResult::in_progress(JobState::Running)),
            OperationState::Failed(message) => Ok(JobStatusResult::failed(message)),
            OperationState::Done(uris) => {
                let mut media = Vec::with_capacity(uris.len());
                for uri in uris {
                    let data = self.download(&uri).await?;
                    media.push(Media::Inline {
                        data,
                        content_type: DEFAULT_VIDEO_MIME.to_string(),
                    });
                }
                Ok(JobStatusResult::complete(media))
            }
        }
    }
}

/// Operation names look like `models/veo-2.0-generate-001/operations/abc123`.
fn is_operation_name(job_id: &str) -> bool {
    !job_id.is_empty()
        && !job_id.contains("..")
        && job_id.contains("operations/")
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
}

fn extract_text(payload: &Value) -> Result<String, ProviderError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Parse("missing candidates[0].content.parts".to_string()))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(ProviderError::Parse("empty completion".to_string()));
    }
    Ok(text)
}

fn extract_predictions(payload: &Value) -> Result<Vec<Media>, ProviderError> {
    let Some(predictions) = payload.get("predictions").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let mut media = Vec::new();
    for prediction in predictions {
        let Some(encoded) = prediction.get("bytesBase64Encoded").and_then(Value::as_str) else {
            continue;
        };
        let data = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| ProviderError::Parse(format!("image base64 decode failed: {}", e)))?;
        let content_type = prediction
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_IMAGE_MIME)
            .to_string();
        media.push(Media::Inline { data, content_type });
    }
    Ok(media)
}

#[derive(Debug, PartialEq, Eq)]
enum OperationState {
    Running,
    Failed(String),
    Done(Vec<String>),
}

fn parse_operation(payload: &Value) -> OperationState {
    if !payload.get("done").and_then(Value::as_bool).unwrap_or(false) {
        return OperationState::Running;
    }
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Video generation failed");
        return OperationState::Failed(message.to_string());
    }

    let response = payload.pointer("/response/generateVideoResponse");
    let uris: Vec<String> = response
        .and_then(|r| r.get("generatedSamples"))
        .and_then(Value::as_array)
        .map(|samples| {
            samples
                .iter()
                .filter_map(|s| s.pointer("/video/uri").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if uris.is_empty() {
        let reason = response
            .and_then(|r| r.pointer("/raiMediaFilteredReasons/0"))
            .and_then(Value::as_str)
            .unwrap_or("Provider returned no video samples");
        return OperationState::Failed(reason.to_string());
    }
    OperationState::Done(uris)
}
