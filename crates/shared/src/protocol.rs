use serde::{Deserialize, Serialize};

use crate::domain::{Locale, PhotoId, PhotoRecord};

/// Everything a presentation layer needs to draw the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoothSnapshot {
    pub photos: Vec<PhotoRecord>,
    pub top_z_index: u64,
    pub processing: bool,
    pub locale: Locale,
}

impl BoothSnapshot {
    pub fn summaries(&self) -> Vec<PhotoSummary> {
        self.photos.iter().map(PhotoSummary::from).collect()
    }
}

/// Photo record without the image bytes, for logs and terminal output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSummary {
    pub id: PhotoId,
    pub mime_type: String,
    pub size_bytes: usize,
    pub caption: String,
    pub timestamp: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub is_developed: bool,
    pub z_index: u64,
}

impl From<&PhotoRecord> for PhotoSummary {
    fn from(photo: &PhotoRecord) -> Self {
        Self {
            id: photo.id,
            mime_type: photo.image_data.mime_type().to_string(),
            size_bytes: photo.image_data.len(),
            caption: photo.caption.clone(),
            timestamp: photo.timestamp.clone(),
            x: photo.x,
            y: photo.y,
            rotation: photo.rotation,
            is_developed: photo.is_developed,
            z_index: photo.z_index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BoothEvent {
    PhotoAdded { photo: PhotoRecord },
    PhotoUpdated { photo: PhotoRecord },
    PhotoRemoved { id: PhotoId },
    ProcessingChanged { processing: bool },
    CaptionFailed { id: PhotoId, reason: String },
}

impl BoothEvent {
    pub fn photo_id(&self) -> Option<PhotoId> {
        match self {
            Self::PhotoAdded { photo } | Self::PhotoUpdated { photo } => Some(photo.id),
            Self::PhotoRemoved { id } | Self::CaptionFailed { id, .. } => Some(*id),
            Self::ProcessingChanged { .. } => None,
        }
    }
}
