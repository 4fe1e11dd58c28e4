//! Presentation layer: reactive view state and its terminal rendering.
//!
//! `ViewState` holds no logic of its own beyond state transitions; the
//! pipeline drives it and `render` draws whatever it currently says.

use crate::capture::{CameraViewport, ImagePreview};
use crate::parser::PlantRecord;
use serde::Serialize;
use std::fmt::Write;

pub const LOADING_MESSAGE: &str = "Identifying plant...";
pub const FAILURE_NOTICE: &str = "Error identifying plant. See error message for details.";
pub const LAYOUT_NOTE: &str =
    "Note: the reply did not follow the expected layout; some fields may be missing or misplaced.";

/// What the information panel below the preview shows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum InfoPanel {
    #[default]
    Hidden,
    Record {
        record: PlantRecord,
        layout_ok: bool,
    },
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub loading: bool,
    pub error: Option<String>,
    pub preview: Option<ImagePreview>,
    pub camera: Option<CameraViewport>,
    pub info: InfoPanel,
}

impl ViewState {
    /// Camera UI opened: drop the old preview and results.
    pub fn camera_opened(&mut self, viewport: CameraViewport) {
        self.loading = false;
        self.preview = None;
        self.error = None;
        self.info = InfoPanel::Hidden;
        self.camera = Some(viewport);
    }

    pub fn camera_updated(&mut self, viewport: CameraViewport) {
        if self.camera.is_some() {
            self.camera = Some(viewport);
        }
    }

    pub fn camera_closed(&mut self) {
        self.camera = None;
    }

    /// A new image was chosen or captured; a request is about to start.
    pub fn begin_request(&mut self, preview: ImagePreview) {
        self.loading = true;
        self.error = None;
        self.info = InfoPanel::Hidden;
        self.preview = Some(preview);
    }

    pub fn complete(&mut self, record: PlantRecord, layout_ok: bool) {
        self.loading = false;
        self.error = None;
        self.info = InfoPanel::Record { record, layout_ok };
    }

    pub fn fail(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
        self.info = InfoPanel::Failure;
    }
}

/// Draw the whole view as text.
pub fn render(view: &ViewState) -> String {
    let mut out = String::new();

    if let Some(camera) = &view.camera {
        let _ = writeln!(out, "{}", render_viewport(camera));
    }
    if let Some(preview) = &view.preview {
        let _ = writeln!(out, "{}", render_preview(preview));
    }
    if view.loading {
        let _ = writeln!(out, "{}", LOADING_MESSAGE);
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "{}", error);
    }

    match &view.info {
        InfoPanel::Hidden => {}
        InfoPanel::Failure => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Information");
            let _ = writeln!(out, "{}", FAILURE_NOTICE);
        }
        InfoPanel::Record { record, layout_ok } => {
            let _ = writeln!(out);
            out.push_str(&render_record(record));
            if !layout_ok {
                let _ = writeln!(out, "{}", LAYOUT_NOTE);
            }
        }
    }

    out
}

pub fn render_viewport(camera: &CameraViewport) -> String {
    let state = if camera.active { "live" } else { "closed" };
    format!(
        "[camera {}] {} - {} frames, last frame {} KB",
        state,
        camera.label,
        camera.frames_seen,
        camera.last_frame_bytes / 1024
    )
}

pub fn render_preview(preview: &ImagePreview) -> String {
    let size = match (preview.width, preview.height) {
        (Some(w), Some(h)) => format!("{}x{}, ", w, h),
        _ => String::new(),
    };
    format!(
        "[image] {} ({}{}, {} KB)",
        preview.label,
        size,
        preview.mime_type,
        preview.byte_len.div_ceil(1024)
    )
}

/// Field table. Name and description always show; empty optional fields
/// are omitted.
pub fn render_record(record: &PlantRecord) -> String {
    let rows: Vec<(&str, &str)> = [
        ("Name", Some(record.name.as_str())),
        ("Common Name", record.common_name.as_deref()),
        ("Scientific Name", record.scientific_name.as_deref()),
        ("Description", Some(record.description.as_str())),
        ("Country", record.country.as_deref()),
        ("Medicinal Qualities", record.medicinal_qualities.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| (label, v)))
    .collect();

    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut out = String::from("Information\n");
    for (label, value) in rows {
        let _ = writeln!(out, "  {:<width$}  {}", label, value, width = width);
    }
    out
}
