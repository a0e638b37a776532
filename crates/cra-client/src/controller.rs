//! Drives one review view: initial load, the stream session and the
//! simulation ticks, interleaved on a single task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cra_graph::GraphCache;
use cra_layout::GraphEngine;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ContractClient;
use crate::context::{ClientContext, NoticeLevel};
use crate::stream::{SessionEvent, SessionMessage, StreamSession};
use crate::view::{InitialLoad, ReviewView};

const DEFAULT_CANVAS: (f64, f64) = (800.0, 600.0);
/// Roughly one animation frame.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Why `run_until` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Completed,
    Disconnected,
    Shutdown,
}

pub struct ReviewController {
    api: ContractClient,
    cache: Arc<GraphCache>,
    view: ReviewView,
    session: Option<StreamSession>,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionMessage>,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
}

impl ReviewController {
    pub fn new(ctx: Arc<ClientContext>) -> Self {
        let cache = Arc::new(GraphCache::new(&ctx.config.cache_dir));
        let engine = GraphEngine::new(DEFAULT_CANVAS.0, DEFAULT_CANVAS.1);
        Self::with_parts(ContractClient::new(ctx), cache, engine)
    }

    pub fn with_parts(api: ContractClient, cache: Arc<GraphCache>, engine: GraphEngine) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            view: ReviewView::new("", 0, cache.clone(), engine),
            api,
            cache,
            session: None,
            generation: 0,
            tx,
            rx,
        }
    }

    fn context(&self) -> &Arc<ClientContext> {
        self.api.context()
    }

    /// View a contract: tear down the previous session and connect a new one.
    pub fn open(&mut self, contract_id: &str) {
        self.close();
        self.generation += 1;
        self.view.reset(contract_id, self.generation);

        let url = self.context().config.stream_url_for(contract_id);
        info!("Opening review stream {} (generation {})", url, self.generation);
        self.session = Some(StreamSession::connect(url, self.generation, self.tx.clone()));
    }

    /// Close the active session, if any. Late messages from it are ignored.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    /// Fetch metadata, content and file concurrently and apply the result.
    ///
    /// A failure of any fetch puts the view in its error state; the others
    /// still complete and a fetched file handle is still released.
    pub async fn load(&mut self) -> bool {
        let contract_id = self.view.contract_id().to_string();
        let generation = self.generation;

        let (contract, content, document) = tokio::join!(
            self.api.get_contract(&contract_id),
            self.api.get_full_content(&contract_id),
            self.api.fetch_document(&contract_id),
        );

        match (contract, content) {
            (Ok(contract), Ok(content)) => {
                debug!("Loaded contract {}", contract.display_name());
                self.view.apply_initial_load(
                    generation,
                    InitialLoad {
                        contract: Some(contract),
                        content,
                        document,
                    },
                );
                true
            }
            (Err(e), _) | (_, Err(e)) => {
                self.view.apply_load_error(generation, e.to_string(), document);
                false
            }
        }
    }

    /// Ask the service to start a review. Failures become notices.
    pub async fn start_review(&self) -> bool {
        if !self.view.pipeline().can_start_review() {
            self.context()
                .notify(NoticeLevel::Warning, "A review is already in progress");
            return false;
        }
        let Some(contract) = self.view.contract() else {
            self.context()
                .notify(NoticeLevel::Warning, "Contract details are not loaded");
            return false;
        };
        match self.api.start_review(contract).await {
            Ok(_) => {
                self.context().notify(
                    NoticeLevel::Info,
                    &format!("Review started for {}", contract.display_name()),
                );
                true
            }
            Err(e) => {
                self.context()
                    .notify(NoticeLevel::Error, &format!("Failed to start review: {}", e));
                false
            }
        }
    }

    /// Wait for the next session message and apply it.
    pub async fn step(&mut self) -> Option<SessionMessage> {
        let message = self.rx.recv().await?;
        self.view.apply_session(message.clone());
        Some(message)
    }

    /// Apply session messages and advance the layout until the pipeline
    /// completes, the current session disconnects, or `shutdown` resolves.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RunExit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => return RunExit::Shutdown,
                message = self.rx.recv() => {
                    let Some(message) = message else {
                        return RunExit::Disconnected;
                    };
                    let closed = message.generation == self.generation
                        && message.event == SessionEvent::Closed;
                    self.view.apply_session(message);
                    if self.view.pipeline().is_complete {
                        return RunExit::Completed;
                    }
                    if closed {
                        warn!("Review stream for {} closed", self.view.contract_id());
                        return RunExit::Disconnected;
                    }
                }
                _ = ticker.tick(), if self.view.engine().is_animating() => {
                    self.view.tick();
                }
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    pub fn cache(&self) -> &Arc<GraphCache> {
        &self.cache
    }

    pub fn view(&self) -> &ReviewView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ReviewView {
        &mut self.view
    }
}

impl Drop for ReviewController {
    fn drop(&mut self) {
        self.close();
    }
}
