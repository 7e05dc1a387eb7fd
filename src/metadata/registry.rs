//! Provider registry routing lookups by media flavor.
//!
//! Movies and TV shows resolve through TMDB, anime through AniList. The
//! registry answers one question for the apply layer: which poster URL, if
//! any, belongs to this title.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mg_core::config::MetadataConfig;
use mg_core::MediaFlavor;
use tracing::debug;

use super::provider::{Candidate, LookupProvider, LookupQuery};
use super::providers::{AniListProvider, TmdbProvider};

/// Flavor-keyed set of [`LookupProvider`]s.
///
/// # Examples
///
/// ```rust,ignore
/// let registry = ProviderRegistry::from_config(&config.metadata)?;
/// let url = registry.resolve_image("Heat", Some(1995), MediaFlavor::Movie).await?;
/// ```
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<MediaFlavor, Arc<dyn LookupProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// TMDB for movies and TV, AniList for anime.
    pub fn from_config(config: &MetadataConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let tmdb: Arc<dyn LookupProvider> = Arc::new(TmdbProvider::new(
            config.tmdb_api_key.clone().unwrap_or_default(),
            config.language.clone(),
            timeout,
        )?);
        let anilist: Arc<dyn LookupProvider> = Arc::new(AniListProvider::new(timeout)?);

        let mut registry = Self::new();
        registry.register(MediaFlavor::Movie, tmdb.clone());
        registry.register(MediaFlavor::Tv, tmdb);
        registry.register(MediaFlavor::Anime, anilist);
        Ok(registry)
    }

    /// Register (or replace) the provider for a flavor.
    pub fn register(&mut self, flavor: MediaFlavor, provider: Arc<dyn LookupProvider>) {
        self.providers.insert(flavor, provider);
    }

    pub fn get(&self, flavor: MediaFlavor) -> Option<Arc<dyn LookupProvider>> {
        self.providers.get(&flavor).cloned()
    }

    /// Best candidate for the title, or `None` when no provider is registered
    /// or available for the flavor.
    pub async fn lookup(
        &self,
        title: &str,
        year: Option<u16>,
        flavor: MediaFlavor,
    ) -> Result<Option<Candidate>> {
        let Some(provider) = self.providers.get(&flavor) else {
            debug!(?flavor, "No provider registered");
            return Ok(None);
        };
        if !provider.is_available() {
            debug!(provider = provider.name(), "Provider not available");
            return Ok(None);
        }
        provider
            .search(&LookupQuery::new(title, year, flavor))
            .await
    }

    /// Poster URL of the best candidate, if it has one.
    pub async fn resolve_image(
        &self,
        title: &str,
        year: Option<u16>,
        flavor: MediaFlavor,
    ) -> Result<Option<String>> {
        Ok(self
            .lookup(title, year, flavor)
            .await?
            .and_then(|c| c.image_url))
    }
}
