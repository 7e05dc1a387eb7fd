//! # mg-av
//!
//! External tool plumbing for mediaglyph.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the path to ffmpeg.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- attach a
//!   thumbnail to a video container, probe for one, extract one.
//! - **Workspace management** ([`SiblingWorkspace`]) -- sibling temp output,
//!   backup and rename-based swap for in-place rewrites.

pub mod command;
pub mod tools;
pub mod transcoder;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use tools::{ToolInfo, ToolRegistry};
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use workspace::SiblingWorkspace;
