//! Pipeline orchestration against a fake identification backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use plantsnap_lib::presentation::{render, InfoPanel, FAILURE_NOTICE, LAYOUT_NOTE, LOADING_MESSAGE};
use plantsnap_lib::{
    IdentificationError, IdentificationResult, ImageOrigin, LineLayoutParser, Outcome, Pipeline,
    PlantIdentifier, RawImage,
};

/// Replies by upload file name. Names listed in `gated` wait for `gate`.
struct FakeIdentifier {
    replies: HashMap<String, Result<String, u16>>,
    gated: Vec<String>,
    gate: Notify,
    calls: AtomicUsize,
}

impl FakeIdentifier {
    fn new() -> Self {
        Self {
            replies: HashMap::new(),
            gated: Vec::new(),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn reply(mut self, file_name: &str, text: &str) -> Self {
        self.replies
            .insert(file_name.to_string(), Ok(text.to_string()));
        self
    }

    fn quota_error(mut self, file_name: &str) -> Self {
        self.replies.insert(file_name.to_string(), Err(429));
        self
    }

    fn gated(mut self, file_name: &str) -> Self {
        self.gated.push(file_name.to_string());
        self
    }
}

#[async_trait]
impl PlantIdentifier for FakeIdentifier {
    fn provider(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-vision"
    }

    async fn identify(&self, image: &RawImage) -> Result<IdentificationResult, IdentificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = match &image.origin {
            ImageOrigin::Upload { file_name } => file_name.clone(),
            ImageOrigin::Camera => "camera".to_string(),
        };
        if self.gated.contains(&name) {
            self.gate.notified().await;
        }
        match self.replies.get(&name) {
            Some(Ok(text)) => Ok(IdentificationResult {
                text: text.clone(),
                provider: "fake".to_string(),
                model: "fake-vision".to_string(),
                latency_ms: 0,
                usage: None,
            }),
            Some(Err(_)) => Err(IdentificationError::Quota {
                provider: "fake".to_string(),
                status: 429,
            }),
            None => Err(IdentificationError::MalformedResponse(format!(
                "no reply for {}",
                name
            ))),
        }
    }
}

fn upload(file_name: &str) -> RawImage {
    RawImage {
        bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
        mime_type: "image/jpeg".to_string(),
        origin: ImageOrigin::Upload {
            file_name: file_name.to_string(),
        },
    }
}

fn pipeline(fake: FakeIdentifier) -> (Arc<Pipeline>, Arc<FakeIdentifier>) {
    let fake = Arc::new(fake);
    let pipeline = Pipeline::new(fake.clone(), Arc::new(LineLayoutParser::new()));
    (Arc::new(pipeline), fake)
}

const ROSE: &str = "This is a Rose, also known as **Garden Rose**\n**Rosa**\nRoses are flowering shrubs.\nCountry: France\nMedicinal qualities: None";
const FERN: &str = "This is a Fern, also known as **Sword Fern**\n**Nephrolepis**\nA shade plant.\nCountry: Brazil\nMedicinal qualities: None";

#[tokio::test]
async fn only_the_latest_capture_is_rendered() {
    let (pipeline, fake) = pipeline(
        FakeIdentifier::new()
            .reply("rose.jpg", ROSE)
            .reply("fern.jpg", FERN)
            .gated("rose.jpg"),
    );

    let slow = upload("rose.jpg");
    let ticket = pipeline.begin(&slow);
    let first = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(ticket, slow).await })
    };

    let second = pipeline.submit(upload("fern.jpg")).await;
    assert!(matches!(&second, Outcome::Rendered(r) if r.name == "Fern"));

    // Let the older request finish after the newer one rendered.
    fake.gate.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first, Outcome::Superseded);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 2);

    let view = pipeline.view();
    assert!(!view.loading);
    match &view.info {
        InfoPanel::Record { record, layout_ok } => {
            assert_eq!(record.name, "Fern");
            assert!(layout_ok);
        }
        other => panic!("expected a record, got {:?}", other),
    }
    assert_eq!(view.preview.as_ref().map(|p| p.label.as_str()), Some("fern.jpg"));
    assert!(!render(&view).contains("Rose"));
}

#[tokio::test]
async fn stale_failure_does_not_replace_newer_result() {
    let (pipeline, fake) = pipeline(
        FakeIdentifier::new()
            .quota_error("broken.jpg")
            .reply("rose.jpg", ROSE)
            .gated("broken.jpg"),
    );

    let slow = upload("broken.jpg");
    let ticket = pipeline.begin(&slow);
    let first = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(ticket, slow).await })
    };
    pipeline.submit(upload("rose.jpg")).await;
    fake.gate.notify_one();

    assert_eq!(first.await.unwrap(), Outcome::Superseded);
    assert_eq!(pipeline.view().error, None);
}

#[tokio::test]
async fn failure_shows_message_and_fallback_notice() {
    let (pipeline, _) = pipeline(FakeIdentifier::new().quota_error("rose.jpg"));

    let outcome = pipeline.submit(upload("rose.jpg")).await;
    let message = match outcome {
        Outcome::Failed(message) => message,
        other => panic!("expected failure, got {:?}", other),
    };
    assert!(message.starts_with("Error: QuotaError - "));

    let view = pipeline.view();
    assert_eq!(view.info, InfoPanel::Failure);
    let text = render(&view);
    assert!(text.contains(&message));
    assert!(text.contains(FAILURE_NOTICE));
    assert!(!text.contains(LOADING_MESSAGE));
}

#[tokio::test]
async fn unexpected_layout_renders_partial_record_with_note() {
    let (pipeline, _) = pipeline(
        FakeIdentifier::new().reply("blurry.jpg", "Sorry, the photo is too blurry to tell."),
    );

    let outcome = pipeline.submit(upload("blurry.jpg")).await;
    assert!(matches!(outcome, Outcome::Rendered(_)));
    let text = render(&pipeline.view());
    assert!(text.contains(LAYOUT_NOTE));
}

#[tokio::test]
async fn opening_the_camera_supersedes_a_pending_request() {
    let (pipeline, fake) = pipeline(FakeIdentifier::new().reply("rose.jpg", ROSE).gated("rose.jpg"));

    let slow = upload("rose.jpg");
    let ticket = pipeline.begin(&slow);
    let pending = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(ticket, slow).await })
    };

    pipeline.camera_opened(plantsnap_lib::capture::CameraViewport {
        label: "test camera".to_string(),
        frames_seen: 0,
        last_frame_bytes: 0,
        active: true,
    });
    fake.gate.notify_one();

    assert_eq!(pending.await.unwrap(), Outcome::Superseded);
    let view = pipeline.view();
    assert_eq!(view.info, InfoPanel::Hidden);
    assert!(view.camera.is_some());
}
