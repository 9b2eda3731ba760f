use async_trait::async_trait;
use shared::domain::{ImagePayload, Locale};
use thiserror::Error;

mod http;

pub use http::{
    caption_prompt, HttpCaptionConfig, HttpCaptionService, DEFAULT_CAPTION_ENDPOINT,
    DEFAULT_CAPTION_MODEL,
};

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("captioning service is unavailable: {0}")]
    Unavailable(String),
    #[error("invalid captioning endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("captioning request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("captioning service responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode captioning response: {0}")]
    Decode(String),
    #[error("captioning service returned no caption text")]
    EmptyResponse,
}

/// Derives a short descriptive caption from an image. One attempt per call.
#[async_trait]
pub trait CaptionService: Send + Sync {
    async fn caption(&self, image: &ImagePayload, locale: &Locale) -> Result<String, CaptionError>;
}

pub struct MissingCaptionService;

#[async_trait]
impl CaptionService for MissingCaptionService {
    async fn caption(
        &self,
        _image: &ImagePayload,
        _locale: &Locale,
    ) -> Result<String, CaptionError> {
        Err(CaptionError::Unavailable(
            "no captioning api key configured".to_string(),
        ))
    }
}
