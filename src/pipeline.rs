//! Capture-to-record pipeline.
//!
//! image → identify (LLM) → parse → view state.
//!
//! Every new capture takes a fresh generation number. A request that
//! finishes after a newer capture began is dropped without touching the
//! view. The superseded network call itself is not aborted.

use crate::capture::{CameraViewport, RawImage};
use crate::llm::PlantIdentifier;
use crate::parser::{PlantRecord, ResponseParser};
use crate::presentation::ViewState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of one pipeline run, as seen by the caller that started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rendered(PlantRecord),
    Failed(String),
    /// A newer capture started before this one finished.
    Superseded,
}

/// Stamp identifying one capture/request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

pub struct Pipeline {
    identifier: Arc<dyn PlantIdentifier>,
    parser: Arc<dyn ResponseParser>,
    generation: AtomicU64,
    view: Mutex<ViewState>,
}

impl Pipeline {
    pub fn new(identifier: Arc<dyn PlantIdentifier>, parser: Arc<dyn ResponseParser>) -> Self {
        Self {
            identifier,
            parser,
            generation: AtomicU64::new(0),
            view: Mutex::new(ViewState::default()),
        }
    }

    /// Snapshot of the current view.
    pub fn view(&self) -> ViewState {
        self.lock_view().clone()
    }

    fn lock_view(&self) -> MutexGuard<'_, ViewState> {
        // A panic while holding the lock leaves a plain data struct behind;
        // keep rendering it.
        self.view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_ticket(&self) -> Ticket {
        Ticket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Camera UI opened. Supersedes any pending request.
    pub fn camera_opened(&self, viewport: CameraViewport) -> Ticket {
        let ticket = self.next_ticket();
        self.lock_view().camera_opened(viewport);
        log::info!("[PIPELINE] Camera opened (generation {})", ticket.0);
        ticket
    }

    pub fn camera_updated(&self, viewport: CameraViewport) {
        self.lock_view().camera_updated(viewport);
    }

    pub fn camera_closed(&self) {
        self.lock_view().camera_closed();
    }

    /// Start a request for `image`: supersede older ones and show the
    /// preview with the loading banner.
    pub fn begin(&self, image: &RawImage) -> Ticket {
        let ticket = self.next_ticket();
        let preview = image.preview();
        log::info!(
            "[PIPELINE] Request {} started: {} ({} bytes)",
            ticket.0,
            preview.label,
            preview.byte_len
        );
        self.lock_view().begin_request(preview);
        ticket
    }

    /// Identify, parse and publish. The view only changes if `ticket` is
    /// still the latest when the response arrives.
    pub async fn run(&self, ticket: Ticket, image: RawImage) -> Outcome {
        let start = std::time::Instant::now();
        let result = self.identifier.identify(&image).await;
        drop(image);

        if !self.is_current(ticket) {
            log::info!(
                "[PIPELINE] Request {} superseded after {}ms - result dropped",
                ticket.0,
                start.elapsed().as_millis()
            );
            return Outcome::Superseded;
        }

        let outcome = match result {
            Ok(result) => {
                let parse_start = std::time::Instant::now();
                let record = self.parser.parse(&result.text);
                let layout_ok = match self.parser.check_layout(&result.text) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("[PARSE] Unexpected reply layout: {}", e);
                        log::debug!("[PARSE] Raw reply: {}", result.text);
                        false
                    }
                };
                log::info!(
                    "[PARSE] {} ({}) in {}us",
                    record.name,
                    record.scientific_name.as_deref().unwrap_or("-"),
                    parse_start.elapsed().as_micros()
                );
                Ok((record, layout_ok))
            }
            Err(e) => {
                log::error!("[PIPELINE] Identification failed: {}", e);
                Err(e.user_message())
            }
        };

        // Re-check under the lock so a capture that began while parsing wins.
        let mut view = self.lock_view();
        if !self.is_current(ticket) {
            log::info!("[PIPELINE] Request {} superseded while parsing", ticket.0);
            return Outcome::Superseded;
        }
        let outcome = match outcome {
            Ok((record, layout_ok)) => {
                view.complete(record.clone(), layout_ok);
                Outcome::Rendered(record)
            }
            Err(message) => {
                view.fail(message.clone());
                Outcome::Failed(message)
            }
        };
        log::info!(
            "[PIPELINE] Request {} done in {}ms",
            ticket.0,
            start.elapsed().as_millis()
        );
        outcome
    }

    /// `begin` + `run` in one call.
    pub async fn submit(&self, image: RawImage) -> Outcome {
        let ticket = self.begin(&image);
        self.run(ticket, image).await
    }
}
