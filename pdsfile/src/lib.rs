//! Path-aware catalog of the PDS holdings tree.
//!
//! An [`Archive`] maps any absolute path, logical path or loose URL-ish
//! string under one or more `holdings` roots to a canonical [`PdsFile`]
//! node. Nodes are cached by both keys. Per-dataset rule tables drive
//! descriptions, sort order, neighbor navigation and associations, and
//! precomputed metadata is served from SQLite shelves.

pub mod archive;
pub mod cache;
pub mod common;
pub mod file;
pub mod iter;
pub mod rules;
pub mod shelf;
pub mod utils;

pub use archive::{Archive, ArchiveConfig, OpenError, PreloadSummary, ResolveError};
pub use common::category::{Category, Voltype};
pub use common::version::{version_info, VersionInfo};
pub use file::{Depth, PdsFile};
pub use iter::{FileFilter, Step};
