//! Persistent store for the smart-context index (§4.1).
//!
//! Owns every row of project state: files, chunks, embeddings, symbols,
//! dependency edges, the transaction log, evidence packs, and summaries.
//! All other crates hold only borrowed views or per-call snapshots.

mod conn;
mod model;
mod schema;
mod store;

pub use conn::AsyncConnection;
pub use conn::OptionalExt;
pub use model::*;
pub use store::Direction;
pub use store::Store;
