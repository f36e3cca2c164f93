pub mod add;
pub mod common;
pub mod completions;
pub mod config;
pub mod folder;
pub mod link;
pub mod list;
pub mod panel;
pub mod queue;
pub mod snapshot;
pub mod sync;
pub mod tag;
