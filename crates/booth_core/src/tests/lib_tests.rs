use std::collections::VecDeque;

use async_trait::async_trait;
use captioning::CaptionError;
use shared::domain::Viewport;
use tokio::sync::{broadcast::error::TryRecvError, oneshot};

use super::*;

type CaptionReply = Result<String, CaptionError>;

/// Replies in order; each reply can be held back until its gate is released.
struct ScriptedCaptioner {
    replies: Mutex<VecDeque<(Option<oneshot::Receiver<()>>, CaptionReply)>>,
    requests: Mutex<Vec<(usize, String)>>,
}

impl ScriptedCaptioner {
    fn new(replies: Vec<CaptionReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|reply| (None, reply)).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn gated(reply: CaptionReply) -> (Arc<Self>, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        let captioner = Arc::new(Self {
            replies: Mutex::new(VecDeque::from([(Some(gate), reply)])),
            requests: Mutex::new(Vec::new()),
        });
        (captioner, release)
    }
}

#[async_trait]
impl CaptionService for ScriptedCaptioner {
    async fn caption(&self, image: &ImagePayload, locale: &Locale) -> Result<String, CaptionError> {
        self.requests
            .lock()
            .await
            .push((image.len(), locale.to_string()));
        let next = self.replies.lock().await.pop_front();
        let Some((gate, reply)) = next else {
            return Err(CaptionError::Unavailable("script exhausted".to_string()));
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        reply
    }
}

fn failure() -> CaptionReply {
    Err(CaptionError::Status {
        status: 503,
        body: "overloaded".to_string(),
    })
}

fn booth_with(captioner: Arc<ScriptedCaptioner>, viewport: Viewport) -> Arc<PhotoBooth> {
    PhotoBooth::with_options(
        captioner,
        Arc::new(FixedViewport(viewport)),
        BoothOptions {
            locale: Locale::new("en-US"),
            seed: Some(5),
            ..BoothOptions::default()
        },
    )
}

fn image() -> ImagePayload {
    ImagePayload::new("image/jpeg", vec![1, 2, 3, 4])
}

#[tokio::test(start_paused = true)]
async fn mobile_capture_ejects_then_scatters_near_slot() {
    let captioner = ScriptedCaptioner::new(vec![Ok("smiles all round".to_string())]);
    let booth = booth_with(captioner.clone(), Viewport::new(400.0, 800.0));

    let id = booth.take_photo(image()).await.expect("capture");
    let ejected = booth.photo(id).await.expect("photo present");
    assert_eq!((ejected.x, ejected.y), (80.0, 420.0));
    assert_eq!(ejected.rotation, 0.0);
    assert!(!ejected.is_developed);
    assert_eq!(ejected.z_index, store::INITIAL_Z_INDEX);
    assert!(booth.is_processing().await);

    booth.wait_idle().await;

    let settled = booth.photo(id).await.expect("photo present");
    assert!((60.0..=100.0).contains(&settled.x), "{settled:?}");
    assert!((-10.0..=10.0).contains(&settled.rotation), "{settled:?}");
    assert_eq!(settled.caption, "smiles all round");
    assert!(!booth.is_processing().await);

    let requests = captioner.requests.lock().await;
    assert_eq!(requests.as_slice(), &[(4, "en-US".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn desktop_capture_scatters_inside_safe_region() {
    let captioner = ScriptedCaptioner::new(vec![Ok("desk".to_string())]);
    let booth = booth_with(captioner, Viewport::new(1400.0, 1000.0));

    let id = booth.take_photo(image()).await.expect("capture");
    let ejected = booth.photo(id).await.expect("photo present");
    assert_eq!((ejected.x, ejected.y), (220.0, 600.0));

    booth.wait_idle().await;
    let settled = booth.photo(id).await.expect("photo present");
    assert!((400.0..=1100.0).contains(&settled.x), "{settled:?}");
    assert!((100.0..=600.0).contains(&settled.y), "{settled:?}");
    assert!((-10.0..=10.0).contains(&settled.rotation), "{settled:?}");
}

#[tokio::test(start_paused = true)]
async fn capture_is_gated_while_photo_develops() {
    let captioner = ScriptedCaptioner::new(vec![Ok("one".to_string()), Ok("two".to_string())]);
    let booth = booth_with(captioner, Viewport::new(1400.0, 1000.0));

    booth.take_photo(image()).await.expect("first capture");
    let err = booth.take_photo(image()).await.expect_err("gated");
    assert!(matches!(err, BoothError::CaptureInProgress));

    tokio::time::sleep(DEFAULT_DEVELOPMENT_DELAY * 2).await;
    let second = booth.take_photo(image()).await.expect("second capture");
    booth.wait_idle().await;

    let snapshot = booth.snapshot().await;
    assert_eq!(snapshot.photos.len(), 2);
    assert_eq!(snapshot.photos[1].id, second);
    assert_eq!(snapshot.photos[1].z_index, snapshot.photos[0].z_index + 1);
    assert_eq!(snapshot.top_z_index, snapshot.photos[1].z_index + 1);
}

#[tokio::test(start_paused = true)]
async fn unbounded_viewport_still_reopens_the_gate() {
    let captioner = ScriptedCaptioner::new(vec![Ok("far".to_string()), Ok("away".to_string())]);
    let booth = booth_with(captioner, Viewport::new(f64::INFINITY, 800.0));

    let first = booth.take_photo(image()).await.expect("first capture");
    booth.wait_idle().await;
    assert!(!booth.is_processing().await);

    let settled = booth.photo(first).await.expect("photo present");
    assert_eq!(settled.x, 400.0);
    assert!((100.0..=400.0).contains(&settled.y), "{settled:?}");

    booth.take_photo(image()).await.expect("second capture");
    booth.wait_idle().await;
    assert_eq!(booth.snapshot().await.photos.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn caption_fetch_does_not_hold_the_capture_gate() {
    let (captioner, release) = ScriptedCaptioner::gated(Ok("late".to_string()));
    let booth = booth_with(captioner, Viewport::new(1400.0, 1000.0));

    let first = booth.take_photo(image()).await.expect("capture");
    tokio::time::sleep(DEFAULT_DEVELOPMENT_DELAY * 2).await;
    assert!(!booth.is_processing().await);
    booth.take_photo(image()).await.expect("capture while caption pending");

    release.send(()).expect("release");
    booth.wait_idle().await;
    assert_eq!(booth.photo(first).await.map(|p| p.caption), Some("late".into()));
}

#[tokio::test(start_paused = true)]
async fn failed_caption_leaves_photo_visible_and_uncaptioned() {
    let booth = booth_with(ScriptedCaptioner::new(vec![failure()]), Viewport::new(1400.0, 1000.0));
    let mut events = booth.subscribe_events();

    let id = booth.take_photo(image()).await.expect("capture");
    booth.wait_idle().await;

    let photo = booth.photo(id).await.expect("still on canvas");
    assert!(photo.caption.is_empty());

    let mut failures = Vec::new();
    loop {
        match events.try_recv() {
            Ok(BoothEvent::CaptionFailed { id: failed, reason }) => failures.push((failed, reason)),
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(other) => panic!("event stream broke: {other:?}"),
        }
    }
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, id);
    assert!(failures[0].1.contains("503"));
}

#[tokio::test(start_paused = true)]
async fn regenerate_clears_then_sets_new_caption() {
    let (captioner, release) = ScriptedCaptioner::gated(Ok("a sunny day".to_string()));
    let booth = booth_with(captioner, Viewport::new(1400.0, 1000.0));
    let id = seed_photo(&booth, "old caption").await;

    assert!(booth.regenerate_caption(id).await);
    assert_eq!(booth.photo(id).await.map(|p| p.caption), Some(String::new()));

    release.send(()).expect("release");
    booth.wait_idle().await;
    assert_eq!(
        booth.photo(id).await.map(|p| p.caption),
        Some("a sunny day".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn failed_regeneration_keeps_caption_empty() {
    let booth = booth_with(ScriptedCaptioner::new(vec![failure()]), Viewport::new(1400.0, 1000.0));
    let id = seed_photo(&booth, "old caption").await;

    assert!(booth.regenerate_caption(id).await);
    booth.wait_idle().await;
    assert_eq!(booth.photo(id).await.map(|p| p.caption), Some(String::new()));
}

#[tokio::test]
async fn regenerate_unknown_photo_issues_no_request() {
    let captioner = ScriptedCaptioner::new(vec![Ok("unused".to_string())]);
    let booth = booth_with(captioner.clone(), Viewport::new(1400.0, 1000.0));

    assert!(!booth.regenerate_caption(PhotoId::new()).await);
    booth.wait_idle().await;
    assert!(captioner.requests.lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn deleting_before_caption_resolves_is_harmless() {
    let (captioner, release) = ScriptedCaptioner::gated(Ok("too late".to_string()));
    let booth = booth_with(captioner, Viewport::new(1400.0, 1000.0));

    let id = booth.take_photo(image()).await.expect("capture");
    assert!(booth.delete_photo(id).await);
    let before = booth.snapshot().await;

    release.send(()).expect("release");
    booth.wait_idle().await;

    let after = booth.snapshot().await;
    assert!(after.photos.is_empty());
    assert_eq!(after.top_z_index, before.top_z_index);
    assert!(!after.processing);
}

#[tokio::test(start_paused = true)]
async fn delete_twice_matches_delete_once() {
    let booth = booth_with(ScriptedCaptioner::new(vec![]), Viewport::new(1400.0, 1000.0));
    let keep = seed_photo(&booth, "keep").await;
    let drop_id = seed_photo(&booth, "drop").await;

    assert!(booth.delete_photo(drop_id).await);
    let once = booth.snapshot().await;
    assert!(!booth.delete_photo(drop_id).await);
    let twice = booth.snapshot().await;

    assert_eq!(once.photos, twice.photos);
    assert_eq!(twice.photos.len(), 1);
    assert_eq!(twice.photos[0].id, keep);
}

#[tokio::test(start_paused = true)]
async fn drag_start_lifts_photo_above_the_rest() {
    let booth = booth_with(ScriptedCaptioner::new(vec![]), Viewport::new(1400.0, 1000.0));
    let first = seed_photo(&booth, "first").await;
    let second = seed_photo(&booth, "second").await;

    let lifted = booth.drag_start(first).await.expect("known photo");
    let again = booth.drag_start(second).await.expect("known photo");
    assert!(again > lifted);

    let snapshot = booth.snapshot().await;
    let max = snapshot.photos.iter().map(|p| p.z_index).max();
    assert_eq!(booth.photo(second).await.map(|p| p.z_index), max);
    assert_eq!(booth.drag_start(PhotoId::new()).await, None);
    assert_eq!(booth.snapshot().await.top_z_index, snapshot.top_z_index);
}

#[tokio::test(start_paused = true)]
async fn move_and_rotate_update_only_their_fields() {
    let booth = booth_with(ScriptedCaptioner::new(vec![]), Viewport::new(1400.0, 1000.0));
    let id = seed_photo(&booth, "steady").await;

    assert!(booth.move_photo(id, 12.0, 34.0).await);
    assert!(booth.rotate_photo(id, -4.0).await);
    assert!(booth.set_developed(id, true).await);
    let photo = booth.photo(id).await.expect("photo");
    assert_eq!((photo.x, photo.y, photo.rotation), (12.0, 34.0, -4.0));
    assert!(photo.is_developed);
    assert_eq!(photo.caption, "steady");

    assert!(!booth.move_photo(PhotoId::new(), 1.0, 1.0).await);
}

#[tokio::test(start_paused = true)]
async fn events_follow_capture_lifecycle() {
    let booth = booth_with(
        ScriptedCaptioner::new(vec![Ok("party".to_string())]),
        Viewport::new(1400.0, 1000.0),
    );
    let mut events = booth.subscribe_events();

    let id = booth.take_photo(image()).await.expect("capture");
    booth.wait_idle().await;

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert!(event.photo_id().is_none() || event.photo_id() == Some(id));
        kinds.push(match event {
            BoothEvent::PhotoAdded { .. } => "added",
            BoothEvent::PhotoUpdated { .. } => "updated",
            BoothEvent::PhotoRemoved { .. } => "removed",
            BoothEvent::ProcessingChanged { processing: true } => "processing",
            BoothEvent::ProcessingChanged { processing: false } => "idle",
            BoothEvent::CaptionFailed { .. } => "caption_failed",
        });
    }
    assert_eq!(&kinds[..2], &["added", "processing"]);
    assert!(kinds.contains(&"idle"));
    assert_eq!(kinds.iter().filter(|kind| **kind == "updated").count(), 2);
}

async fn seed_photo(booth: &Arc<PhotoBooth>, caption: &str) -> PhotoId {
    let id = PhotoId::new();
    let mut state = booth.inner.lock().await;
    let z_index = state.store.next_z_index();
    state.store.add(PhotoRecord {
        id,
        image_data: image(),
        caption: caption.to_string(),
        timestamp: "1/1/2025".to_string(),
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        is_developed: false,
        z_index,
    });
    id
}
