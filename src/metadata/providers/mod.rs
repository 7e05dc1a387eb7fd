//! Concrete lookup provider implementations.

pub mod anilist;
pub mod tmdb;

pub use anilist::AniListProvider;
pub use tmdb::TmdbProvider;
