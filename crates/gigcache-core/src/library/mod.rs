//! Saved and hidden event state.
//!
//! `EventLibrary` is the local source of truth. Changes are persisted to the
//! key-value store at once and mirrored best-effort to a per-user remote
//! document through a `MirrorQueue`.

pub mod mirror;
pub mod remote;
pub mod saved;

pub use mirror::MirrorQueue;
pub use remote::{HttpDocumentStore, RemoteDocument, RemoteDocumentStore};
pub use saved::EventLibrary;
