//! Title lookups against external metadata services.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and shared data types.
//! - [`providers`] -- TMDB and AniList implementations.
//! - [`registry`] -- Flavor-keyed provider routing and poster resolution.
//! - [`oracle`] -- Memoized anime classification.

pub mod oracle;
pub mod provider;
pub mod providers;
pub mod registry;

pub use oracle::{AnimeOracle, ExpiryPolicy, MaxAge, NeverExpire};
pub use provider::{Candidate, LookupProvider, LookupQuery};
pub use registry::ProviderRegistry;
