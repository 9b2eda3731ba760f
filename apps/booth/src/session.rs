//! Line-oriented canvas: each stdin line is one gesture against the booth.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use booth_core::{BoothError, PhotoBooth, SharedViewport};
use serde::Serialize;
use shared::{
    domain::{ImagePayload, PhotoId},
    protocol::{BoothEvent, PhotoSummary},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::warn;

pub const HELP: &str = "\
commands:
  take <path>              capture an image file (or a file holding a data url)
  move <id> <x> <y>        drag a photo to a position
  rotate <id> <degrees>    set a photo's rotation
  front <id>               bring a photo to the front
  delete <id>              remove a photo
  regen <id>               ask for a new caption
  resize <width> <height>  change the viewport
  save <id> <path>         write a photo's image to disk
  list                     print every photo
  wait                     wait for pending scatter and caption work
  quit                     leave the session
ids may be shortened to any unique prefix";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Take(PathBuf),
    Move { id: String, x: f64, y: f64 },
    Rotate { id: String, degrees: f64 },
    Front(String),
    Delete(String),
    Regenerate(String),
    Resize { width: f64, height: f64 },
    Save { id: String, path: PathBuf },
    List,
    Wait,
    Help,
    Quit,
}

fn number(token: Option<&str>, name: &str) -> Result<f64, String> {
    let token = token.ok_or_else(|| format!("missing {name}"))?;
    token
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("{name} must be a number, got '{token}'"))
}

fn word(token: Option<&str>, name: &str) -> Result<String, String> {
    token
        .map(str::to_string)
        .ok_or_else(|| format!("missing {name}"))
}

impl SessionCommand {
    /// `Ok(None)` for blank lines and `#` comments.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut tokens = line.split_whitespace();
        let verb = tokens.next().unwrap_or_default().to_ascii_lowercase();
        let command = match verb.as_str() {
            "take" | "shoot" => {
                let rest = line[verb.len()..].trim();
                if rest.is_empty() {
                    return Err("missing image path".to_string());
                }
                return Ok(Some(Self::Take(PathBuf::from(rest))));
            }
            "move" => Self::Move {
                id: word(tokens.next(), "photo id")?,
                x: number(tokens.next(), "x")?,
                y: number(tokens.next(), "y")?,
            },
            "rotate" => Self::Rotate {
                id: word(tokens.next(), "photo id")?,
                degrees: number(tokens.next(), "degrees")?,
            },
            "front" => Self::Front(word(tokens.next(), "photo id")?),
            "delete" | "rm" => Self::Delete(word(tokens.next(), "photo id")?),
            "regen" | "regenerate" => Self::Regenerate(word(tokens.next(), "photo id")?),
            "resize" => Self::Resize {
                width: number(tokens.next(), "width")?,
                height: number(tokens.next(), "height")?,
            },
            "save" => Self::Save {
                id: word(tokens.next(), "photo id")?,
                path: PathBuf::from(word(tokens.next(), "output path")?),
            },
            "list" | "ls" => Self::List,
            "wait" => Self::Wait,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{other}'; try 'help'")),
        };

        if let Some(extra) = tokens.next() {
            return Err(format!("unexpected argument '{extra}'"));
        }
        Ok(Some(command))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventLine {
    PhotoAdded { photo: PhotoSummary },
    PhotoUpdated { photo: PhotoSummary },
    PhotoRemoved { id: PhotoId },
    ProcessingChanged { processing: bool },
    CaptionFailed { id: PhotoId, reason: String },
}

impl From<&BoothEvent> for EventLine {
    fn from(event: &BoothEvent) -> Self {
        match event {
            BoothEvent::PhotoAdded { photo } => Self::PhotoAdded {
                photo: photo.into(),
            },
            BoothEvent::PhotoUpdated { photo } => Self::PhotoUpdated {
                photo: photo.into(),
            },
            BoothEvent::PhotoRemoved { id } => Self::PhotoRemoved { id: *id },
            BoothEvent::ProcessingChanged { processing } => Self::ProcessingChanged {
                processing: *processing,
            },
            BoothEvent::CaptionFailed { id, reason } => Self::CaptionFailed {
                id: *id,
                reason: reason.clone(),
            },
        }
    }
}

/// Full id, or a prefix matching exactly one photo on the canvas.
pub fn resolve_id(token: &str, known: &[PhotoId]) -> Result<PhotoId> {
    if let Ok(id) = token.parse::<PhotoId>() {
        return Ok(id);
    }
    let token = token.to_ascii_lowercase();
    let mut matches = known
        .iter()
        .filter(|id| id.to_string().starts_with(&token));
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(*id),
        (None, _) => Err(anyhow!("no photo matches '{token}'")),
        (Some(_), Some(_)) => Err(anyhow!("'{token}' matches more than one photo")),
    }
}

pub async fn load_image(path: &std::path::Path) -> Result<ImagePayload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image '{}'", path.display()))?;
    if bytes.starts_with(b"data:") {
        let text = String::from_utf8(bytes)
            .with_context(|| format!("data url in '{}' is not utf-8", path.display()))?;
        return ImagePayload::from_data_url(&text)
            .with_context(|| format!("invalid data url in '{}'", path.display()));
    }

    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(ImagePayload::new(mime_type.essence_str(), bytes))
}

/// Captures `image`, waiting out any print still developing.
pub async fn take_when_ready(
    booth: &Arc<PhotoBooth>,
    image: ImagePayload,
    poll: Duration,
) -> Result<PhotoId> {
    loop {
        match booth.take_photo(image.clone()).await {
            Ok(id) => return Ok(id),
            Err(BoothError::CaptureInProgress) => tokio::time::sleep(poll).await,
            Err(err) => return Err(err.into()),
        }
    }
}

fn spawn_event_printer(booth: &Arc<PhotoBooth>) -> JoinHandle<()> {
    let mut events = booth.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&EventLine::from(&event)) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!("session: failed to render event: {err}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("session: event printer skipped {skipped} events")
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn known_ids(booth: &PhotoBooth) -> Vec<PhotoId> {
    booth
        .snapshot()
        .await
        .photos
        .iter()
        .map(|photo| photo.id)
        .collect()
}

async fn execute(
    booth: &Arc<PhotoBooth>,
    viewport: &SharedViewport,
    command: SessionCommand,
) -> Result<()> {
    match command {
        SessionCommand::Take(path) => {
            let image = load_image(&path).await?;
            let id = booth.take_photo(image).await?;
            println!("took {id}");
        }
        SessionCommand::Move { id, x, y } => {
            let id = resolve_id(&id, &known_ids(booth).await)?;
            booth.drag_start(id).await;
            booth.move_photo(id, x, y).await;
        }
        SessionCommand::Rotate { id, degrees } => {
            let id = resolve_id(&id, &known_ids(booth).await)?;
            booth.rotate_photo(id, degrees).await;
        }
        SessionCommand::Front(id) => {
            let id = resolve_id(&id, &known_ids(booth).await)?;
            booth.drag_start(id).await;
        }
        SessionCommand::Delete(id) => {
            let id = resolve_id(&id, &known_ids(booth).await)?;
            booth.delete_photo(id).await;
        }
        SessionCommand::Regenerate(id) => {
            let id = resolve_id(&id, &known_ids(booth).await)?;
            booth.regenerate_caption(id).await;
        }
        SessionCommand::Resize { width, height } => {
            if width <= 0.0 || height <= 0.0 {
                return Err(anyhow!("viewport must be positive"));
            }
            viewport.resize(width, height);
        }
        SessionCommand::Save { id, path } => {
            let id = resolve_id(&id, &known_ids(booth).await)?;
            let photo = booth
                .photo(id)
                .await
                .ok_or_else(|| anyhow!("photo {id} is gone"))?;
            tokio::fs::write(&path, photo.image_data.bytes())
                .await
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            println!("saved {id} to {}", path.display());
        }
        SessionCommand::List => {
            let snapshot = booth.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot.summaries())?);
        }
        SessionCommand::Wait => booth.wait_idle().await,
        SessionCommand::Help => println!("{HELP}"),
        SessionCommand::Quit => {}
    }
    Ok(())
}

pub async fn run(booth: Arc<PhotoBooth>, viewport: Arc<SharedViewport>) -> Result<()> {
    let printer = spawn_event_printer(&booth);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match SessionCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("error: {message}");
                continue;
            }
        };
        if command == SessionCommand::Quit {
            break;
        }
        if let Err(err) = execute(&booth, &viewport, command).await {
            eprintln!("error: {err:#}");
        }
    }

    booth.wait_idle().await;
    // Let the printer drain what the last tasks emitted.
    tokio::task::yield_now().await;
    printer.abort();
    Ok(())
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
