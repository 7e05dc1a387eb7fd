//! Trait definition and types for metadata lookup providers.
//!
//! The core only needs two things from a provider: the best candidate for a
//! title (or none), and that candidate's known title variants and poster URL.

use async_trait::async_trait;
use mg_core::MediaFlavor;
use serde::{Deserialize, Serialize};

/// A title search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub title: String,
    pub year: Option<u16>,
    pub flavor: MediaFlavor,
}

impl LookupQuery {
    pub fn new(title: impl Into<String>, year: Option<u16>, flavor: MediaFlavor) -> Self {
        Self {
            title: title.into(),
            year,
            flavor,
        }
    }
}

/// Best match returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider-specific identifier (e.g. TMDB numeric ID).
    pub id: String,
    /// Known titles: localized, original, romanized, native. Never empty
    /// strings.
    pub title_variants: Vec<String>,
    /// Full URL of the poster / cover image, if the provider has one.
    pub image_url: Option<String>,
    pub year: Option<u16>,
}

impl Candidate {
    /// First title variant, for logging.
    pub fn display_title(&self) -> &str {
        self.title_variants
            .first()
            .map(String::as_str)
            .unwrap_or("<untitled>")
    }
}

/// A metadata lookup service.
///
/// Implementations make a single bounded-time attempt per call. Retrying is
/// the caller's business.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Short, lowercase identifier (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Whether the provider is configured well enough to be queried.
    fn is_available(&self) -> bool;

    /// Best candidate for `query`, or `None` if nothing matched.
    ///
    /// # Errors
    ///
    /// Transport, HTTP-status and decode failures.
    async fn search(&self, query: &LookupQuery) -> anyhow::Result<Option<Candidate>>;
}

/// Collect non-empty, de-duplicated title variants in order.
pub(crate) fn collect_variants<I>(titles: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut out: Vec<String> = Vec::new();
    for title in titles.into_iter().flatten() {
        let title = title.trim();
        if !title.is_empty() && !out.iter().any(|t| t == title) {
            out.push(title.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_skip_empty_and_duplicates() {
        let v = collect_variants([
            Some("Shingeki no Kyojin".to_string()),
            Some("Attack on Titan".to_string()),
            None,
            Some("  ".to_string()),
            Some("Attack on Titan".to_string()),
        ]);
        assert_eq!(v, vec!["Shingeki no Kyojin", "Attack on Titan"]);
    }

    #[test]
    fn display_title_falls_back() {
        let c = Candidate {
            id: "1".into(),
            title_variants: vec![],
            image_url: None,
            year: None,
        };
        assert_eq!(c.display_title(), "<untitled>");
    }
}
