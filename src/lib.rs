//! Mediaglyph - folder icons and embedded thumbnails for media libraries
//!
//! This library crate exposes the core functionality for integration testing.

pub mod apply;
pub mod batch;
pub mod cache;
pub mod images;
pub mod metadata;
pub mod processor;
pub mod scanner;
