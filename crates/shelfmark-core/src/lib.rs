//! shelfmark-core - Core library for Shelfmark
//!
//! This crate contains the shared models, database layer, sync engine, and
//! snapshot tooling used by all Shelfmark interfaces.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod snapshot;
pub mod sync;
pub mod util;

pub use config::{SyncSettings, SyncType};
pub use error::{Error, Result};
pub use models::{Correlation, Folder, Link, LinkDraft, Panel, Tag};
