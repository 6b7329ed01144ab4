//! Gemini REST client implementing the AI collaborators.
//!
//! Audio goes through the Files API (resumable upload, then `file_data` parts
//! in `generateContent`), text prompts go straight to `generateContent`.
//! Model answers that should be JSON are handed to
//! [`recording_sync_core::parse::parse_structured`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use recording_sync_core::config::DEFAULT_AI_BASE_URL;
use recording_sync_core::contract::{
    AudioInsights, AudioProcessor, DatasetComparer, StructuredExtractor,
};
use recording_sync_core::error::CollaboratorError;
use recording_sync_core::parse::{parse_structured, ParseOutcome};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: usize = 30;

pub const TRANSCRIPTION_PROMPT: &str = "Transcribe the provided audio file accurately with timestamps. \
For each spoken segment, include the start time in [MM:SS] format at the beginning of the line. \
Example format:\n\
[00:00] Speaker: Hello, welcome to the meeting\n\
[00:05] Speaker: Today we'll discuss...\n\
Ensure accurate timing and capture all spoken words, including speaker changes if identifiable.";

pub const SUMMARY_PROMPT: &str = "Extract the following information from the provided conversation text:\n\
1. **Room Type**: the type of room being discussed (e.g., single, double, shared).\n\
2. **Cost**: the cost associated with the room or accommodation.\n\
3. **Location**: the geographical location of the accommodation.\n\
4. **Status of Inhabitant**: whether the tenant is a student or a working professional, with the company or institution if mentioned.\n\
5. **Required Amenities**: amenities the tenant requires (e.g., Wi-Fi, laundry, kitchen access).\n\
6. **Alternative Suggestions**: other hostels or accommodation suggested to the tenant during the conversation.\n\
7. **Short Summary**: a 2-3 sentence summary of the conversation.\n\
8. **Key Takeaways**: the most important insights or decisions, as bullet points.\n\
Keep the extraction accurate and concise, with a clear label for each piece of information.";

/// Prompt asking for a JSON object with exactly `fields`, dotted names nested.
pub fn extraction_prompt(text: &str, fields: &[String]) -> String {
    let nested: Vec<&str> = fields
        .iter()
        .filter(|f| f.contains('.'))
        .map(String::as_str)
        .collect();
    let mut prompt = format!(
        "Parse the following text into JSON containing ONLY these fields: {}.\n\
         For any field that is missing, return null.\n",
        Value::from(fields.to_vec())
    );
    if !nested.is_empty() {
        prompt.push_str(&format!(
            "Fields with a dot such as {} are nested: the part before the dot is an object holding the part after it.\n",
            nested.join(", ")
        ));
    }
    prompt.push_str("Return valid JSON only.\nText to parse:\n");
    prompt.push_str(text);
    prompt
}

/// Prompt asking the model to diff website data (A) against call insights (B).
pub fn comparison_prompt(website: &Value, call: &Value) -> String {
    format!(
        "You are comparing two datasets about the same accommodation.\n\
         Dataset A is the website listing, dataset B was extracted from a phone call.\n\
         For every attribute present in either dataset return an object with keys \
         \"A\", \"B\" and \"match\" (true, false or null when one side is missing).\n\
         Return valid JSON only, keyed by attribute name.\n\n\
         Dataset A:\n{}\n\nDataset B:\n{}\n",
        serde_json::to_string_pretty(website).unwrap_or_else(|_| website.to_string()),
        serde_json::to_string_pretty(call).unwrap_or_else(|_| call.to_string()),
    )
}

/// MIME type sent with an upload, from the file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// File handle returned by the Files API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: UploadedFile,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn upload_file(&self, path: &Path) -> Result<UploadedFile, CollaboratorError> {
        let bytes = tokio::fs::read(path).await?;
        let mime = mime_type_for(path);
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(path = %path.display(), size = bytes.len(), mime, "Starting resumable upload");

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .query(&[("key", &self.api_key)])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = ensure_success(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| {
                CollaboratorError::MalformedResponse(
                    "upload start response has no upload URL".into(),
                )
            })?;

        let finish = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let envelope: FileEnvelope = ensure_success(finish)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::MalformedResponse(e.to_string()))?;

        info!(name = %envelope.file.name, path = %path.display(), "Uploaded audio file");
        self.wait_until_active(envelope.file).await
    }

    async fn wait_until_active(
        &self,
        mut file: UploadedFile,
    ) -> Result<UploadedFile, CollaboratorError> {
        for attempt in 0..=MAX_POLLS {
            match file.state.as_deref() {
                Some("PROCESSING") if attempt == MAX_POLLS => break,
                Some("PROCESSING") => {
                    debug!(name = %file.name, "Uploaded file still processing");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    let response = self
                        .client
                        .get(format!("{}/v1beta/{}", self.base_url, file.name))
                        .query(&[("key", &self.api_key)])
                        .send()
                        .await?;
                    file = ensure_success(response)
                        .await?
                        .json()
                        .await
                        .map_err(|e| CollaboratorError::MalformedResponse(e.to_string()))?;
                }
                Some("FAILED") => {
                    return Err(CollaboratorError::MalformedResponse(format!(
                        "file {} failed processing",
                        file.name
                    )))
                }
                _ => return Ok(file),
            }
        }
        Err(CollaboratorError::Transport(format!(
            "file {} still processing after {MAX_POLLS} polls",
            file.name
        )))
    }

    /// Best effort: failures are logged only.
    pub async fn delete_file(&self, name: &str) {
        let result = self
            .client
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .query(&[("key", &self.api_key)])
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => debug!(name, "Deleted uploaded file"),
            Ok(r) => warn!(name, status = r.status().as_u16(), "Failed to delete uploaded file"),
            Err(e) => warn!(name, error = ?e, "Failed to delete uploaded file"),
        }
    }

    /// Run `generateContent` with `parts` and return the concatenated answer text.
    pub async fn generate(&self, parts: Vec<Value>) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", &self.api_key)])
            .json(&json!({ "contents": [{ "role": "user", "parts": parts }] }))
            .send()
            .await?;
        let payload: Value = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::MalformedResponse(e.to_string()))?;
        response_text(&payload)
    }

    async fn generate_text(&self, prompt: String) -> Result<String, CollaboratorError> {
        self.generate(vec![json!({ "text": prompt })]).await
    }
}

/// Text of the first candidate, parts joined in order.
pub fn response_text(payload: &Value) -> Result<String, CollaboratorError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            CollaboratorError::MalformedResponse("response has no candidate content".into())
        })?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(CollaboratorError::MalformedResponse("response candidate has no text".into()));
    }
    Ok(text)
}

async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(status = status.as_u16(), body = %body, "Gemini API returned error status");
    Err(CollaboratorError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl AudioProcessor for GeminiClient {
    async fn process_audio(&self, path: &Path) -> Result<AudioInsights, CollaboratorError> {
        let file = self.upload_file(path).await?;
        let mime = file
            .mime_type
            .clone()
            .unwrap_or_else(|| mime_type_for(path).to_string());

        let result = async {
            let transcription = self
                .generate(vec![
                    json!({ "text": TRANSCRIPTION_PROMPT }),
                    json!({ "file_data": { "mime_type": &mime, "file_uri": &file.uri } }),
                ])
                .await?;
            debug!(path = %path.display(), chars = transcription.len(), "Transcription received");
            let summary = self
                .generate_text(format!("{SUMMARY_PROMPT}\n\n{transcription}"))
                .await?;
            Ok::<_, CollaboratorError>(AudioInsights {
                transcription,
                summary,
            })
        }
        .await;

        self.delete_file(&file.name).await;
        result
    }
}

#[async_trait]
impl StructuredExtractor for GeminiClient {
    async fn extract_fields(
        &self,
        text: &str,
        fields: &[String],
    ) -> Result<ParseOutcome, CollaboratorError> {
        let answer = self.generate_text(extraction_prompt(text, fields)).await?;
        Ok(parse_structured(&answer))
    }
}

#[async_trait]
impl DatasetComparer for GeminiClient {
    async fn compare_datasets(
        &self,
        website: &Value,
        call: &Value,
    ) -> Result<ParseOutcome, CollaboratorError> {
        let answer = self.generate_text(comparison_prompt(website, call)).await?;
        Ok(parse_structured(&answer))
    }
}
