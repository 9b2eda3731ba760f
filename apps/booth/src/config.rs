use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};
use captioning::{HttpCaptionConfig, DEFAULT_CAPTION_ENDPOINT, DEFAULT_CAPTION_MODEL};
use serde::Deserialize;
use shared::domain::{Locale, Viewport};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "booth.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub locale: String,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub development_delay_ms: u64,
    pub caption_endpoint: String,
    pub caption_model: String,
    pub caption_api_key: Option<String>,
    pub caption_timeout_seconds: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: Locale::DEFAULT_TAG.into(),
            viewport_width: 1280.0,
            viewport_height: 800.0,
            development_delay_ms: 100,
            caption_endpoint: DEFAULT_CAPTION_ENDPOINT.into(),
            caption_model: DEFAULT_CAPTION_MODEL.into(),
            caption_api_key: None,
            caption_timeout_seconds: None,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    locale: Option<String>,
    viewport_width: Option<f64>,
    viewport_height: Option<f64>,
    development_delay_ms: Option<u64>,
    caption_endpoint: Option<String>,
    caption_model: Option<String>,
    caption_api_key: Option<String>,
    caption_timeout_seconds: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then the TOML file, then environment variables.
///
/// A missing `booth.toml` in the working directory is fine; a missing file
/// passed explicitly is an error.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            settings.apply_file(file_cfg);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
    }

    settings.apply_env(|key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
}

fn parse_env<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value '{raw}' for {key}"))
}

impl Settings {
    fn apply_file(&mut self, file_cfg: FileSettings) {
        if let Some(v) = file_cfg.locale {
            self.locale = v;
        }
        if let Some(v) = file_cfg.viewport_width {
            self.viewport_width = v;
        }
        if let Some(v) = file_cfg.viewport_height {
            self.viewport_height = v;
        }
        if let Some(v) = file_cfg.development_delay_ms {
            self.development_delay_ms = v;
        }
        if let Some(v) = file_cfg.caption_endpoint {
            self.caption_endpoint = v;
        }
        if let Some(v) = file_cfg.caption_model {
            self.caption_model = v;
        }
        if let Some(v) = file_cfg.caption_api_key {
            self.caption_api_key = Some(v);
        }
        if let Some(v) = file_cfg.caption_timeout_seconds {
            self.caption_timeout_seconds = Some(v);
        }
        if let Some(v) = file_cfg.log_filter {
            self.log_filter = v;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("APP__LOCALE") {
            self.locale = v;
        }

        if let Some(v) = lookup("APP__VIEWPORT_WIDTH") {
            self.viewport_width = parse_env("APP__VIEWPORT_WIDTH", &v)?;
        }
        if let Some(v) = lookup("APP__VIEWPORT_HEIGHT") {
            self.viewport_height = parse_env("APP__VIEWPORT_HEIGHT", &v)?;
        }
        if let Some(v) = lookup("APP__DEVELOPMENT_DELAY_MS") {
            self.development_delay_ms = parse_env("APP__DEVELOPMENT_DELAY_MS", &v)?;
        }

        if let Some(v) = lookup("APP__CAPTION_ENDPOINT") {
            self.caption_endpoint = v;
        }
        if let Some(v) = lookup("APP__CAPTION_MODEL") {
            self.caption_model = v;
        }

        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.caption_api_key = Some(v);
        }
        if let Some(v) = lookup("APP__CAPTION_API_KEY") {
            self.caption_api_key = Some(v);
        }

        if let Some(v) = lookup("APP__CAPTION_TIMEOUT_SECONDS") {
            self.caption_timeout_seconds = Some(parse_env("APP__CAPTION_TIMEOUT_SECONDS", &v)?);
        }
        if let Some(v) = lookup("APP__LOG_FILTER") {
            self.log_filter = v;
        }

        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !(positive(self.viewport_width) && positive(self.viewport_height)) {
            bail!(
                "viewport must be finite and positive, got {}x{}",
                self.viewport_width,
                self.viewport_height
            );
        }
        Url::parse(&self.caption_endpoint)
            .with_context(|| format!("invalid caption endpoint '{}'", self.caption_endpoint))?;
        if self.caption_model.trim().is_empty() {
            bail!("caption model must not be empty");
        }
        Ok(())
    }

    pub fn locale(&self) -> Locale {
        Locale::new(&self.locale)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }

    pub fn development_delay(&self) -> Duration {
        Duration::from_millis(self.development_delay_ms)
    }

    /// `None` when no API key is configured; captions are then unavailable.
    pub fn caption_config(&self) -> Option<HttpCaptionConfig> {
        let api_key = self
            .caption_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())?;
        Some(HttpCaptionConfig {
            endpoint: self.caption_endpoint.clone(),
            model: self.caption_model.clone(),
            api_key: api_key.to_string(),
            timeout: self.caption_timeout_seconds.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
