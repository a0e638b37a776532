//! CRA Graph — turns backend knowledge-graph payloads into deduplicated
//! node/link snapshots and keeps the last snapshot per contract on disk.

pub mod cache;
pub mod index;
pub mod materialize;
pub mod payload;
pub mod types;

pub use cache::GraphCache;
pub use index::{GraphIndex, GraphStats};
pub use materialize::{materialize, materialize_source};
pub use payload::{GraphSource, RawGraphPayload};
pub use types::*;
