//! CRA Client — the live review-pipeline client for one contract view.
//!
//! A `ReviewController` performs the initial load against the contract
//! service, keeps one review-stream session per viewed contract, and feeds
//! everything it receives into the `ReviewView` reducer, which owns the
//! pipeline progress, the document pane and the knowledge-graph engine.

pub mod api;
pub mod context;
pub mod controller;
pub mod document;
pub mod stream;
pub mod view;

pub use api::{ContractClient, ContractContent, ContractMain};
pub use context::{AuthSession, ClientContext, MemoryNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use controller::{ReviewController, RunExit};
pub use document::DocumentHandle;
pub use stream::{SessionEvent, SessionMessage, SocketState, StreamSession};
pub use view::{DocMode, InitialLoad, LoadState, ReviewView};
