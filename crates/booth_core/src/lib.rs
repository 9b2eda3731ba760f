use std::{sync::Arc, time::Duration};

use captioning::CaptionService;
use chrono::Local;
use rand::{rngs::StdRng, SeedableRng};
use shared::{
    domain::{ImagePayload, Locale, PhotoId, PhotoPatch, PhotoRecord},
    protocol::{BoothEvent, BoothSnapshot},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod layout;
pub mod store;
pub mod viewport;

pub use store::PhotoStore;
pub use viewport::{FixedViewport, SharedViewport, ViewportSource};

/// Time a fresh print spends at the slot before it scatters.
pub const DEFAULT_DEVELOPMENT_DELAY: Duration = Duration::from_millis(100);
const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum BoothError {
    #[error("a photo is still being ejected; wait for it to settle")]
    CaptureInProgress,
    #[error("photo {0} is already on the canvas")]
    DuplicatePhoto(PhotoId),
}

#[derive(Debug, Clone)]
pub struct BoothOptions {
    pub locale: Locale,
    pub development_delay: Duration,
    /// Fixed seed for scatter placement; entropy-seeded when unset.
    pub seed: Option<u64>,
}

impl Default for BoothOptions {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            development_delay: DEFAULT_DEVELOPMENT_DELAY,
            seed: None,
        }
    }
}

struct BoothState {
    store: PhotoStore,
    processing: bool,
    rng: StdRng,
}

/// Photo lifecycle orchestration: capture, scatter, captioning, and the
/// handlers the canvas raises while photos are dragged around.
///
/// All record mutations go through one lock and are applied in the order they
/// resolve. Background work (scatter timer, caption requests) runs as spawned
/// tasks that never block handlers or further captures.
pub struct PhotoBooth {
    captioner: Arc<dyn CaptionService>,
    viewport: Arc<dyn ViewportSource>,
    locale: Locale,
    development_delay: Duration,
    inner: Mutex<BoothState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<BoothEvent>,
}

impl PhotoBooth {
    pub fn new(
        captioner: Arc<dyn CaptionService>,
        viewport: Arc<dyn ViewportSource>,
    ) -> Arc<Self> {
        Self::with_options(captioner, viewport, BoothOptions::default())
    }

    pub fn with_options(
        captioner: Arc<dyn CaptionService>,
        viewport: Arc<dyn ViewportSource>,
        options: BoothOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Arc::new(Self {
            captioner,
            viewport,
            locale: options.locale,
            development_delay: options.development_delay,
            inner: Mutex::new(BoothState {
                store: PhotoStore::new(),
                processing: false,
                rng,
            }),
            tasks: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoothEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> BoothSnapshot {
        let state = self.inner.lock().await;
        BoothSnapshot {
            photos: state.store.photos().to_vec(),
            top_z_index: state.store.top_z_index(),
            processing: state.processing,
            locale: self.locale.clone(),
        }
    }

    pub async fn photo(&self, id: PhotoId) -> Option<PhotoRecord> {
        self.inner.lock().await.store.get(id).cloned()
    }

    pub async fn is_processing(&self) -> bool {
        self.inner.lock().await.processing
    }

    /// Puts a new print on the canvas at the camera slot, then schedules its
    /// scatter and its caption request.
    pub async fn take_photo(self: &Arc<Self>, image: ImagePayload) -> Result<PhotoId, BoothError> {
        let viewport = self.viewport.current();
        let (x, y) = layout::ejection_position(viewport);

        let photo = {
            let mut state = self.inner.lock().await;
            if state.processing {
                return Err(BoothError::CaptureInProgress);
            }

            let mut photo = PhotoRecord {
                id: PhotoId::new(),
                image_data: image,
                caption: String::new(),
                timestamp: self.locale.format_date(Local::now().date_naive()),
                x,
                y,
                rotation: 0.0,
                is_developed: false,
                z_index: 0,
            };
            match state.store.add_on_top(photo.clone()) {
                Some(z_index) => photo.z_index = z_index,
                None => return Err(BoothError::DuplicatePhoto(photo.id)),
            }
            state.processing = true;
            photo
        };

        let id = photo.id;
        let image = photo.image_data.clone();
        info!(
            photo_id = %id,
            device = ?viewport.device_class(),
            x,
            y,
            z_index = photo.z_index,
            "booth: photo ejected"
        );
        self.emit(BoothEvent::PhotoAdded { photo });
        self.emit(BoothEvent::ProcessingChanged { processing: true });

        let scatter = self.spawn_scatter(id);
        let caption = self.spawn_caption(id, image);
        self.track(scatter).await;
        self.track(caption).await;
        Ok(id)
    }

    /// Merges `patch` into the photo. Unknown ids are ignored.
    pub async fn update_photo(&self, id: PhotoId, patch: PhotoPatch) -> bool {
        if patch.is_empty() {
            return self.inner.lock().await.store.contains(id);
        }
        let updated = self.inner.lock().await.store.update(id, &patch).cloned();
        match updated {
            Some(photo) => {
                self.emit(BoothEvent::PhotoUpdated { photo });
                true
            }
            None => {
                debug!(photo_id = %id, "booth: update for unknown photo ignored");
                false
            }
        }
    }

    pub async fn move_photo(&self, id: PhotoId, x: f64, y: f64) -> bool {
        self.update_photo(id, PhotoPatch::position(x, y)).await
    }

    pub async fn rotate_photo(&self, id: PhotoId, degrees: f64) -> bool {
        self.update_photo(id, PhotoPatch::rotation(degrees)).await
    }

    pub async fn set_developed(&self, id: PhotoId, is_developed: bool) -> bool {
        self.update_photo(id, PhotoPatch::developed(is_developed))
            .await
    }

    pub async fn delete_photo(&self, id: PhotoId) -> bool {
        let removed = self.inner.lock().await.store.remove(id);
        if removed.is_none() {
            debug!(photo_id = %id, "booth: delete for unknown photo ignored");
            return false;
        }
        info!(photo_id = %id, "booth: photo deleted");
        self.emit(BoothEvent::PhotoRemoved { id });
        true
    }

    /// Lifts the photo above every other one as a drag begins.
    pub async fn drag_start(&self, id: PhotoId) -> Option<u64> {
        let lifted = {
            let mut state = self.inner.lock().await;
            state
                .store
                .bring_to_front(id)
                .and_then(|_| state.store.get(id).cloned())
        };
        let photo = lifted?;
        let z_index = photo.z_index;
        debug!(photo_id = %id, z_index, "booth: brought to front");
        self.emit(BoothEvent::PhotoUpdated { photo });
        Some(z_index)
    }

    /// Clears the caption and asks for a new one. The old caption is not
    /// restored if the request fails.
    pub async fn regenerate_caption(self: &Arc<Self>, id: PhotoId) -> bool {
        let cleared = self
            .inner
            .lock()
            .await
            .store
            .update(id, &PhotoPatch::caption(String::new()))
            .cloned();
        let Some(photo) = cleared else {
            debug!(photo_id = %id, "booth: regenerate for unknown photo ignored");
            return false;
        };

        let image = photo.image_data.clone();
        info!(photo_id = %id, "booth: regenerating caption");
        self.emit(BoothEvent::PhotoUpdated { photo });
        let caption = self.spawn_caption(id, image);
        self.track(caption).await;
        true
    }

    /// Waits for every scatter and caption task issued so far.
    pub async fn wait_idle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.tasks.lock().await);
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(err) = task.await {
                    warn!("booth: background task ended abnormally: {err}");
                }
            }
        }
    }

    fn spawn_scatter(self: &Arc<Self>, id: PhotoId) -> JoinHandle<()> {
        let booth = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(booth.development_delay).await;
            let viewport = booth.viewport.current();

            let settled = {
                let mut guard = booth.inner.lock().await;
                let state = &mut *guard;
                state.processing = false;
                let placement = layout::scatter_placement(viewport, &mut state.rng);
                state.store.update(id, &placement.patch()).cloned()
            };

            match settled {
                Some(photo) => {
                    debug!(
                        photo_id = %id,
                        x = photo.x,
                        y = photo.y,
                        rotation = photo.rotation,
                        "booth: photo settled"
                    );
                    booth.emit(BoothEvent::PhotoUpdated { photo });
                }
                None => debug!(photo_id = %id, "booth: photo removed before it settled"),
            }
            booth.emit(BoothEvent::ProcessingChanged { processing: false });
        })
    }

    fn spawn_caption(self: &Arc<Self>, id: PhotoId, image: ImagePayload) -> JoinHandle<()> {
        let booth = Arc::clone(self);
        tokio::spawn(async move {
            match booth.captioner.caption(&image, &booth.locale).await {
                Ok(caption) => {
                    let updated = booth
                        .inner
                        .lock()
                        .await
                        .store
                        .update(id, &PhotoPatch::caption(caption))
                        .cloned();
                    match updated {
                        Some(photo) => {
                            info!(photo_id = %id, caption = %photo.caption, "booth: caption ready");
                            booth.emit(BoothEvent::PhotoUpdated { photo });
                        }
                        None => {
                            debug!(photo_id = %id, "booth: caption arrived for a deleted photo")
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        photo_id = %id,
                        locale = %booth.locale,
                        "booth: caption request failed: {err}"
                    );
                    booth.emit(BoothEvent::CaptionFailed {
                        id,
                        reason: err.to_string(),
                    });
                }
            }
        })
    }

    async fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    fn emit(&self, event: BoothEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
