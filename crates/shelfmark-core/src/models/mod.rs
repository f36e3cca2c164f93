//! Data models for Shelfmark

mod correlation;
mod folder;
mod link;
mod panel;
mod tag;

pub use correlation::Correlation;
pub use folder::Folder;
pub use link::{Link, LinkDraft, MediaType};
pub use panel::{Panel, PanelFolder};
pub use tag::{LinkTag, Tag};
