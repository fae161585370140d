//! Local session store.
//!
//! This module provides the `SessionStore` for saving session strings to
//! disk, one JSON file per session, and finding them again by session name
//! or file name.

pub mod manager;
pub mod record;

pub use manager::{file_stem, SessionStore, StoreError, DEFAULT_SESSIONS_DIR, SESSION_SUFFIX};
pub use record::{SessionRecord, StoredSession};
