//! Injected collaborators: configuration, HTTP client, auth session, notifier.

use std::sync::Arc;

use cra_core::{ClientConfig, Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{error, info, warn};

/// Bearer token for the contract service; replaceable at runtime.
#[derive(Debug, Default)]
pub struct AuthSession {
    token: RwLock<Option<String>>,
}

impl AuthSession {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// User-facing notifications (toasts in a GUI shell).
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Writes notices to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => info!("{}", message),
            NoticeLevel::Warning => warn!("{}", message),
            NoticeLevel::Error => error!("{}", message),
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push(Notice {
            level,
            message: message.to_string(),
        });
    }
}

/// Everything the client needs from its surroundings, passed explicitly.
pub struct ClientContext {
    pub config: ClientConfig,
    pub http: reqwest::Client,
    pub auth: AuthSession,
    pub notifier: Arc<dyn Notifier>,
}

impl ClientContext {
    pub fn new(config: ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            auth: AuthSession::new(config.token.clone()),
            config,
            http,
            notifier,
        })
    }

    /// Context that reports notices through the log.
    pub fn with_tracing(config: ClientConfig) -> Result<Self> {
        Self::new(config, Arc::new(TracingNotifier))
    }

    pub fn notify(&self, level: NoticeLevel, message: &str) {
        self.notifier.notify(level, message);
    }
}
