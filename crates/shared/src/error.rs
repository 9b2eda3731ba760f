use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("image payload is not a data url")]
    MissingScheme,
    #[error("data url has no payload section")]
    MissingData,
    #[error("data url does not declare a mime type")]
    MissingMimeType,
    #[error("data url payload is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 image payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}
