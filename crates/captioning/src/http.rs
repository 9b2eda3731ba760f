use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::domain::{ImagePayload, Locale};
use tracing::debug;
use url::Url;

use crate::{CaptionError, CaptionService};

pub const DEFAULT_CAPTION_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CAPTION_MODEL: &str = "gemini-2.5-flash";
const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpCaptionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Option<Duration>,
}

impl HttpCaptionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_CAPTION_ENDPOINT.to_string(),
            model: DEFAULT_CAPTION_MODEL.to_string(),
            api_key: api_key.into(),
            timeout: None,
        }
    }
}

pub fn caption_prompt(locale: &Locale) -> String {
    format!(
        "Write a short, playful caption for this instant photo in {}. \
         Describe what is happening in at most twelve words. \
         Reply with the caption only, without quotes.",
        locale.language_name()
    )
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum RequestPart<'a> {
    InlineData(InlineData<'a>),
    Text(String),
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn caption_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let joined = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>();
        let cleaned = joined
            .trim()
            .trim_matches(|c| matches!(c, '"' | '\u{201c}' | '\u{201d}'))
            .trim();
        (!cleaned.is_empty()).then(|| cleaned.to_string())
    }
}

/// Captioning over the `generateContent` REST call of a Gemini-style API.
pub struct HttpCaptionService {
    http: Client,
    generate_url: Url,
    model: String,
    api_key: String,
}

impl HttpCaptionService {
    pub fn new(config: HttpCaptionConfig) -> Result<Self, CaptionError> {
        let generate_url = build_generate_url(&config.endpoint, &config.model)?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            generate_url,
            model: config.model,
            api_key: config.api_key,
        })
    }

    pub fn generate_url(&self) -> &Url {
        &self.generate_url
    }
}

fn build_generate_url(endpoint: &str, model: &str) -> Result<Url, CaptionError> {
    let model = model.trim();
    if model.is_empty() || model.contains('/') {
        return Err(CaptionError::InvalidEndpoint(format!(
            "invalid model name '{model}'"
        )));
    }

    let mut base = Url::parse(endpoint.trim())
        .map_err(|err| CaptionError::InvalidEndpoint(format!("{endpoint}: {err}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(&format!("v1beta/models/{model}:generateContent"))
        .map_err(|err| CaptionError::InvalidEndpoint(format!("{endpoint}: {err}")))
}

#[async_trait]
impl CaptionService for HttpCaptionService {
    async fn caption(&self, image: &ImagePayload, locale: &Locale) -> Result<String, CaptionError> {
        debug!(
            model = %self.model,
            locale = %locale,
            bytes = image.len(),
            "captioning: sending generateContent request"
        );

        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData(InlineData {
                        mime_type: image.mime_type(),
                        data: image.to_base64(),
                    }),
                    RequestPart::Text(caption_prompt(locale)),
                ],
            }],
        };

        let res = self
            .http
            .post(self.generate_url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(CaptionError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body = res.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&body)
            .map_err(|err| CaptionError::Decode(err.to_string()))?;
        parsed.caption_text().ok_or(CaptionError::EmptyResponse)
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
