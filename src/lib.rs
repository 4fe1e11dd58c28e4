//! PlantSnap: identify a plant from a photo with a vision LLM.
//!
//! Domains, leaves first:
//!   - capture       - file upload and camera snapshot → RawImage
//!   - llm           - RawImage → free-text identification (Gemini / Anthropic)
//!   - parser        - free text → PlantRecord
//!   - presentation  - view state + terminal rendering
//!   - pipeline      - orchestration, latest-request-wins
//!   - settings      - provider resolution, API keys, saved preferences
//!
//! The binary (main.rs) wires these together; no business logic lives there.

pub mod capture;
pub mod llm;
pub mod parser;
pub mod pipeline;
pub mod presentation;
pub mod settings;

pub use capture::{ImageOrigin, RawImage};
pub use llm::{IdentificationError, IdentificationResult, PlantIdentifier};
pub use parser::{LineLayoutParser, PlantRecord, ResponseParser};
pub use pipeline::{Outcome, Pipeline};
pub use presentation::ViewState;
pub use settings::Settings;
