//! Applying cached artifacts to the library.
//!
//! - [`folder_icon`] -- custom folder icons for show directories.
//! - [`embed`] -- cover thumbnails attached to movie files.

pub mod embed;
pub mod folder_icon;

pub use embed::ThumbnailEmbedder;
pub use folder_icon::{DesktopIniMarker, FolderIconApplier, FolderMarker};
