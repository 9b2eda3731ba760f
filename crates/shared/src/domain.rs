use std::{fmt, str::FromStr, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PayloadError;

/// Viewports narrower than this are laid out as mobile.
pub const MOBILE_BREAKPOINT: f64 = 768.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub Uuid);

impl PhotoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PhotoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Encoded image bytes plus their MIME type. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ImagePayload {
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Parses `data:<mime>;base64,<payload>`.
    pub fn from_data_url(url: &str) -> Result<Self, PayloadError> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or(PayloadError::MissingScheme)?;
        let (header, data) = rest.split_once(',').ok_or(PayloadError::MissingData)?;

        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default().trim();
        if mime_type.is_empty() {
            return Err(PayloadError::MissingMimeType);
        }
        if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
            return Err(PayloadError::NotBase64);
        }

        let bytes = STANDARD.decode(data.trim())?;
        Ok(Self::new(mime_type, bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl From<ImagePayload> for String {
    fn from(value: ImagePayload) -> Self {
        value.to_data_url()
    }
}

impl TryFrom<String> for ImagePayload {
    type Error = PayloadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_data_url(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    MonthDayYear,
    YearMonthDay,
    DayMonthYear,
}

/// Language tag such as `en-US` or `zh-CN`; `_` separators are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    pub const DEFAULT_TAG: &'static str = "en-US";

    pub fn new(tag: impl AsRef<str>) -> Self {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return Self(Self::DEFAULT_TAG.to_string());
        }

        let normalized = tag
            .split(['-', '_'])
            .filter(|part| !part.is_empty())
            .enumerate()
            .map(|(index, part)| match index {
                0 => part.to_ascii_lowercase(),
                _ if part.len() == 2 => part.to_ascii_uppercase(),
                _ => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join("-");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    pub fn region(&self) -> Option<&str> {
        self.0
            .split('-')
            .skip(1)
            .find(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_uppercase()))
    }

    /// English name of the language, used to steer caption wording.
    pub fn language_name(&self) -> &str {
        match self.language() {
            "en" => "English",
            "zh" => "Chinese",
            "ja" => "Japanese",
            "ko" => "Korean",
            "fr" => "French",
            "de" => "German",
            "es" => "Spanish",
            "it" => "Italian",
            "pt" => "Portuguese",
            "ru" => "Russian",
            "nl" => "Dutch",
            _ => self.as_str(),
        }
    }

    pub fn date_order(&self) -> DateOrder {
        match (self.language(), self.region()) {
            ("zh" | "ja" | "ko", _) => DateOrder::YearMonthDay,
            ("en", None | Some("US")) => DateOrder::MonthDayYear,
            _ => DateOrder::DayMonthYear,
        }
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        match self.date_order() {
            DateOrder::MonthDayYear => {
                format!("{}/{}/{}", date.month(), date.day(), date.year())
            }
            DateOrder::YearMonthDay => {
                format!("{}/{}/{}", date.year(), date.month(), date.day())
            }
            DateOrder::DayMonthYear => {
                format!("{:02}/{:02}/{}", date.day(), date.month(), date.year())
            }
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self(Self::DEFAULT_TAG.to_string())
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Locale {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Locale> for String {
    fn from(value: Locale) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_mobile(&self) -> bool {
        self.width < MOBILE_BREAKPOINT
    }

    pub fn device_class(&self) -> DeviceClass {
        if self.is_mobile() {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub image_data: ImagePayload,
    /// Empty until a caption arrives, and again while one is regenerated.
    pub caption: String,
    pub timestamp: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub is_developed: bool,
    pub z_index: u64,
}

impl PhotoRecord {
    /// Field-level merge: every `Some` in the patch replaces the stored value.
    pub fn apply(&mut self, patch: &PhotoPatch) {
        if let Some(caption) = &patch.caption {
            self.caption.clone_from(caption);
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(is_developed) = patch.is_developed {
            self.is_developed = is_developed;
        }
    }

    pub fn has_caption(&self) -> bool {
        !self.caption.is_empty()
    }
}

/// Partial update of the mutable fields of a [`PhotoRecord`].
///
/// `z_index` is not patchable; stacking order only moves through the store's
/// front-bring operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_developed: Option<bool>,
}

impl PhotoPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn placement(x: f64, y: f64, rotation: f64) -> Self {
        Self {
            rotation: Some(rotation),
            ..Self::position(x, y)
        }
    }

    pub fn caption(text: impl Into<String>) -> Self {
        Self {
            caption: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn rotation(degrees: f64) -> Self {
        Self {
            rotation: Some(degrees),
            ..Self::default()
        }
    }

    pub fn developed(is_developed: bool) -> Self {
        Self {
            is_developed: Some(is_developed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.caption.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.rotation.is_none()
            && self.is_developed.is_none()
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
