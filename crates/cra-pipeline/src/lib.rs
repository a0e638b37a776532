//! Review pipeline — the fixed stage catalog, decoded stage events and the
//! reducer that turns an ordered stream of events into progress state.

pub mod document;
pub mod state;
pub mod types;

pub use document::{document_text, DocumentPayload};
pub use state::{PipelineRunState, StageMark};
pub use types::*;
