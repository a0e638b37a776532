//! Review view state and its reducer.
//!
//! Every input (initial load result, stage event, stream lifecycle) is an
//! explicit value applied here in arrival order. Inputs tagged with a
//! generation other than the view's current one come from a superseded
//! session and are ignored before anything is touched.

use std::sync::Arc;

use cra_graph::{materialize, materialize_source, GraphCache, GraphSnapshot};
use cra_layout::{Frame, GraphEngine, TextMeasure};
use cra_pipeline::{document_text, PipelineRunState, StageEvent, StageStatus, KG_BUILD, OCR};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{ContractContent, ContractMain};
use crate::document::DocumentHandle;
use crate::stream::{SessionEvent, SessionMessage};

/// Which rendition the document pane shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocMode {
    #[default]
    Pdf,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Loading,
    Ready,
    Failed(String),
}

/// Results of the three initial fetches.
#[derive(Debug, Default)]
pub struct InitialLoad {
    pub contract: Option<ContractMain>,
    pub content: Option<ContractContent>,
    pub document: Option<DocumentHandle>,
}

pub struct ReviewView {
    contract_id: String,
    generation: u64,
    load: LoadState,
    contract: Option<ContractMain>,
    pipeline: PipelineRunState,
    connected: bool,
    document_text: String,
    doc_mode: DocMode,
    document: Option<DocumentHandle>,
    snapshot: Option<Arc<GraphSnapshot>>,
    engine: GraphEngine,
    cache: Arc<GraphCache>,
}

impl ReviewView {
    pub fn new(contract_id: &str, generation: u64, cache: Arc<GraphCache>, engine: GraphEngine) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            generation,
            load: LoadState::Loading,
            contract: None,
            pipeline: PipelineRunState::new(),
            connected: false,
            document_text: String::new(),
            doc_mode: DocMode::Pdf,
            document: None,
            snapshot: None,
            engine,
            cache,
        }
    }

    /// Switch to another contract. Everything tied to the old one is dropped.
    pub fn reset(&mut self, contract_id: &str, generation: u64) {
        self.contract_id = contract_id.to_string();
        self.generation = generation;
        self.load = LoadState::Loading;
        self.contract = None;
        self.pipeline = PipelineRunState::new();
        self.connected = false;
        self.document_text.clear();
        self.doc_mode = DocMode::Pdf;
        self.replace_document(None);
        self.set_snapshot(None);
    }

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation {
            debug!(
                "Ignoring input from generation {} (current {})",
                generation, self.generation
            );
            return false;
        }
        true
    }

    /// Apply the initial fetch results. Content-endpoint graph data wins over the cache.
    pub fn apply_initial_load(&mut self, generation: u64, load: InitialLoad) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        let InitialLoad {
            contract,
            content,
            document,
        } = load;

        self.contract = contract;
        if let Some(content) = content {
            self.document_text = content.text();
            match content.graph {
                Some(source) => {
                    if let Some(snapshot) = materialize_source(source) {
                        self.set_snapshot(Some(snapshot));
                    }
                }
                None => {
                    debug!("No graph on content response, checking cache");
                    if let Some(snapshot) = self.cache.load(&self.contract_id) {
                        self.set_snapshot(Some(snapshot));
                    }
                }
            }
        }
        self.replace_document(document);
        self.load = LoadState::Ready;
        true
    }

    /// Record a failed initial load. Handles fetched alongside are still released.
    pub fn apply_load_error(&mut self, generation: u64, message: String, document: Option<DocumentHandle>) -> bool {
        if let Some(handle) = document {
            handle.revoke();
        }
        if !self.is_current(generation) {
            return false;
        }
        warn!("Failed to load contract {}: {}", self.contract_id, message);
        self.load = LoadState::Failed(message);
        true
    }

    pub fn apply_session(&mut self, message: SessionMessage) -> bool {
        if !self.is_current(message.generation) {
            return false;
        }
        match message.event {
            SessionEvent::Opened => {
                self.connected = true;
                true
            }
            SessionEvent::Closed => {
                self.connected = false;
                true
            }
            SessionEvent::Stage(event) => self.apply_stage(message.generation, &event),
        }
    }

    /// Feed one stage event through the state machine and its side effects.
    pub fn apply_stage(&mut self, generation: u64, event: &StageEvent) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.pipeline = self.pipeline.apply(event);
        debug!("Stage {} -> {}", event.step, event.status);

        if event.is(OCR, &StageStatus::Completed) && event.has_data() {
            match document_text(&event.data) {
                Some(text) => {
                    self.document_text = text;
                    self.doc_mode = DocMode::Markdown;
                }
                None => warn!("OCR result carried no document text"),
            }
        }

        if event.is(KG_BUILD, &StageStatus::Completed) && event.has_data() {
            if let Some(snapshot) = materialize(&event.data) {
                info!(
                    "Knowledge graph for contract {}: {} nodes, {} links",
                    self.contract_id,
                    snapshot.nodes.len(),
                    snapshot.links.len()
                );
                self.cache.save(&self.contract_id, &snapshot);
                self.set_snapshot(Some(snapshot));
            }
        }
        true
    }

    fn set_snapshot(&mut self, snapshot: Option<GraphSnapshot>) {
        let snapshot = snapshot.map(Arc::new);
        self.engine.set_snapshot(snapshot.clone());
        self.snapshot = snapshot;
    }

    fn replace_document(&mut self, document: Option<DocumentHandle>) {
        if let Some(old) = std::mem::replace(&mut self.document, document) {
            old.revoke();
        }
    }

    pub fn tick(&mut self) -> bool {
        self.engine.tick()
    }

    pub fn frame(&self, measure: &dyn TextMeasure) -> Frame {
        self.engine.render(measure)
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn contract(&self) -> Option<&ContractMain> {
        self.contract.as_ref()
    }

    pub fn pipeline(&self) -> &PipelineRunState {
        &self.pipeline
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn document_text(&self) -> &str {
        &self.document_text
    }

    pub fn doc_mode(&self) -> DocMode {
        self.doc_mode
    }

    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref()
    }

    pub fn snapshot(&self) -> Option<&Arc<GraphSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn engine(&self) -> &GraphEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut GraphEngine {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cra_graph::GraphSource;
    use cra_layout::ApproxTextMeasure;
    use serde_json::json;

    fn view(dir: &std::path::Path) -> ReviewView {
        ReviewView::new(
            "42",
            1,
            Arc::new(GraphCache::new(dir)),
            GraphEngine::new(800.0, 600.0),
        )
    }

    fn ev(step: &str, status: StageStatus) -> StageEvent {
        StageEvent::new(step, status)
    }

    #[test]
    fn test_ocr_completion_switches_to_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());
        assert_eq!(view.doc_mode(), DocMode::Pdf);

        view.apply_stage(1, &ev(OCR, StageStatus::Completed).with_data(json!({"plainTextContent": "plain"})));
        assert_eq!(view.document_text(), "plain");
        assert_eq!(view.doc_mode(), DocMode::Markdown);
    }

    #[test]
    fn test_graph_completion_replaces_snapshot_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());
        assert!(view.frame(&ApproxTextMeasure).is_placeholder());

        let payload = json!({"edges": [["A", "B", {"relationship": "party_to"}]]});
        view.apply_stage(1, &ev(KG_BUILD, StageStatus::Completed).with_data(payload));
        let first = view.snapshot().unwrap().clone();
        assert_eq!(first.nodes.len(), 2);
        assert!(!view.frame(&ApproxTextMeasure).is_placeholder());
        assert_eq!(GraphCache::new(dir.path()).load("42").as_ref(), Some(first.as_ref()));

        // A malformed payload keeps the previous graph.
        view.apply_stage(1, &ev(KG_BUILD, StageStatus::Completed).with_data(json!({"edges": 3})));
        assert!(Arc::ptr_eq(view.snapshot().unwrap(), &first));
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());
        view.reset("43", 2);

        let before = view.pipeline().clone();
        assert!(!view.apply_stage(1, &ev(OCR, StageStatus::Processing)));
        assert!(!view.apply_session(SessionMessage {
            generation: 1,
            event: SessionEvent::Opened
        }));
        assert_eq!(view.pipeline(), &before);
        assert!(!view.is_connected());
        assert!(view.apply_session(SessionMessage {
            generation: 2,
            event: SessionEvent::Opened
        }));
        assert!(view.is_connected());
    }

    #[test]
    fn test_initial_load_prefers_content_graph_over_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cached = materialize(&json!({"edges": [["X", "Y", {}]]})).unwrap();
        GraphCache::new(dir.path()).save("42", &cached);

        let mut view = view(dir.path());
        let content = ContractContent {
            content: Some("# Body".into()),
            graph: Some(GraphSource::Parsed(json!({"edges": [["A", "B", {}]]}))),
            ..ContractContent::default()
        };
        view.apply_initial_load(
            1,
            InitialLoad {
                content: Some(content),
                ..InitialLoad::default()
            },
        );
        assert_eq!(view.load_state(), &LoadState::Ready);
        assert_eq!(view.document_text(), "# Body");
        assert!(view.snapshot().unwrap().node("A").is_some());

        let mut fallback = ReviewView::new(
            "42",
            1,
            Arc::new(GraphCache::new(dir.path())),
            GraphEngine::new(800.0, 600.0),
        );
        fallback.apply_initial_load(
            1,
            InitialLoad {
                content: Some(ContractContent::default()),
                ..InitialLoad::default()
            },
        );
        assert_eq!(fallback.snapshot().map(|s| s.as_ref()), Some(&cached));
    }

    #[test]
    fn test_document_handle_released_on_replace_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());

        let first = DocumentHandle::create(b"one", None).unwrap();
        let first_path = first.path().unwrap().to_path_buf();
        view.apply_initial_load(1, InitialLoad { document: Some(first), ..InitialLoad::default() });
        assert!(first_path.exists());

        let second = DocumentHandle::create(b"two", None).unwrap();
        let second_path = second.path().unwrap().to_path_buf();
        view.apply_initial_load(1, InitialLoad { document: Some(second), ..InitialLoad::default() });
        assert!(!first_path.exists());
        assert!(second_path.exists());

        view.reset("43", 2);
        assert!(!second_path.exists());
        assert!(view.document().is_none());
    }

    #[test]
    fn test_load_error_releases_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());
        let handle = DocumentHandle::create(b"pdf", None).unwrap();
        let path = handle.path().unwrap().to_path_buf();

        assert!(view.apply_load_error(1, "Get contract failed".into(), Some(handle)));
        assert_eq!(view.load_state(), &LoadState::Failed("Get contract failed".into()));
        assert!(!path.exists());
    }
}
