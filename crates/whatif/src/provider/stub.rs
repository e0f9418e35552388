//! Deterministic offline provider.
//!
//! Produces SVG placeholders instead of calling a model, so the whole service
//! runs without network access or API keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{
    ImageResult, JobState, JobStatusResult, Media, MediaProvider, ProviderError, TextModel,
    TextRequest, TextTask, VideoJobResult,
};

const SVG_MIME: &str = "image/svg+xml";

/// Media stub. Images return immediately; videos complete after a fixed
/// number of polls.
pub struct StubProvider {
    polls_until_complete: u32,
    next_job: AtomicU64,
    jobs: Mutex<HashMap<String, (String, u32)>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::with_video_polls(2)
    }

    pub fn with_video_polls(polls_until_complete: u32) -> Self {
        Self {
            polls_until_complete,
            next_job: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Background colour derived from the prompt so equal prompts render equally.
fn palette(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    format!("#{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2])
}

fn escape_xml(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&apos;".to_string(),
            c => c.to_string(),
        })
        .collect()
}

fn caption(prompt: &str) -> String {
    escape_xml(&crate::text::generate_prompt_summary(prompt, 60))
}

fn placeholder_image(prompt: &str) -> Vec<u8> {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="1024" height="1024" viewBox="0 0 1024 1024"><rect width="1024" height="1024" fill="{}"/><text x="512" y="512" font-size="32" text-anchor="middle" fill="#ffffff">{}</text></svg>"##,
        palette(prompt),
        caption(prompt)
    )
    .into_bytes()
}

fn placeholder_clip(prompt: &str) -> Vec<u8> {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="1280" height="720" viewBox="0 0 1280 720"><rect width="1280" height="720" fill="{}"><animate attributeName="opacity" values="1;0.4;1" dur="4s" repeatCount="indefinite"/></rect><text x="640" y="360" font-size="32" text-anchor="middle" fill="#ffffff">{}</text></svg>"##,
        palette(prompt),
        caption(prompt)
    )
    .into_bytes()
}

#[async_trait]
impl MediaProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate_image(&self, prompt: &str, _model: &str) -> Result<ImageResult, ProviderError> {
        Ok(ImageResult::ok(vec![Media::Inline {
            data: placeholder_image(prompt),
            content_type: SVG_MIME.to_string(),
        }]))
    }

    async fn generate_video(
        &self,
        prompt: &str,
        _model: &str,
    ) -> Result<VideoJobResult, ProviderError> {
        let id = format!("stub-op-{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| ProviderError::Parse("stub job table poisoned".to_string()))?;
        jobs.insert(id.clone(), (prompt.to_string(), 0));
        Ok(VideoJobResult::started(id))
    }

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusResult, ProviderError> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| ProviderError::Parse("stub job table poisoned".to_string()))?;
        let Some((prompt, polls)) = jobs.get_mut(job_id) else {
            return Ok(JobStatusResult::failed(format!("Unknown job {}", job_id)));
        };

        *polls += 1;
        if *polls < self.polls_until_complete {
            let state = if *polls == 1 {
                JobState::Pending
            } else {
                JobState::Running
            };
            return Ok(JobStatusResult::in_progress(state));
        }

        let data = placeholder_clip(prompt);
        jobs.remove(job_id);
        Ok(JobStatusResult::complete(vec![Media::Inline {
            data,
            content_type: SVG_MIME.to_string(),
        }]))
    }
}

/// Text stub with canned answers per task.
#[derive(Debug, Default)]
pub struct StubTextModel;

impl StubTextModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextModel for StubTextModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &TextRequest) -> Result<String, ProviderError> {
        let subject = request.subject.trim();
        let reply = match request.task {
            TextTask::Enhance => format!(
                "{}, richly detailed, cinematic lighting, cohesive color palette",
                subject
            ),
            TextTask::Evaluate => "0.85".to_string(),
            TextTask::Suggest => {
                "- Name a specific art style\n- Describe the lighting\n- Add a focal subject"
                    .to_string()
            }
            TextTask::ApplySuggestions => format!("{}, in a distinct art style", subject),
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: TextTask, subject: &str) -> TextRequest {
        TextRequest {
            task,
            system: String::new(),
            prompt: subject.to_string(),
            subject: subject.to_string(),
            temperature: None,
            max_output_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_image_is_deterministic_svg() {
        let stub = StubProvider::new();
        let a = stub.generate_image("what if <cats> ruled", "m").await.unwrap();
        let b = stub.generate_image("what if <cats> ruled", "m").await.unwrap();
        assert!(a.success);
        assert_eq!(a, b);
        match &a.media[0] {
            Media::Inline { data, content_type } => {
                assert_eq!(content_type, SVG_MIME);
                let svg = String::from_utf8(data.clone()).unwrap();
                assert!(svg.starts_with("<svg"));
                assert!(svg.contains("&lt;cats&gt;"));
            }
            other => panic!("unexpected media {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_video_completes_after_polls() {
        let stub = StubProvider::with_video_polls(3);
        let job = stub.generate_video("a clip", "veo").await.unwrap();
        let id = job.job_id.unwrap();

        assert_eq!(stub.poll_job_status(&id).await.unwrap().status, JobState::Pending);
        assert_eq!(stub.poll_job_status(&id).await.unwrap().status, JobState::Running);
        let done = stub.poll_job_status(&id).await.unwrap();
        assert_eq!(done.status, JobState::Complete);
        assert_eq!(done.media.len(), 1);

        // Finished jobs are forgotten.
        let gone = stub.poll_job_status(&id).await.unwrap();
        assert_eq!(gone.status, JobState::Failed);
    }

    #[tokio::test]
    async fn test_distinct_job_ids() {
        let stub = StubProvider::new();
        let a = stub.generate_video("a", "veo").await.unwrap().job_id;
        let b = stub.generate_video("b", "veo").await.unwrap().job_id;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_text_model_answers_per_task() {
        let model = StubTextModel::new();
        let enhanced = model
            .complete(&request(TextTask::Enhance, "a floating city"))
            .await
            .unwrap();
        assert!(enhanced.starts_with("a floating city"));

        let score = model
            .complete(&request(TextTask::Evaluate, "x"))
            .await
            .unwrap();
        assert_eq!(score, "0.85");

        let suggestions = model
            .complete(&request(TextTask::Suggest, "x"))
            .await
            .unwrap();
        assert_eq!(suggestions.lines().count(), 3);
    }
}
