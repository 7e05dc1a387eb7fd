//! Anime classification with a memoized verdict map.
//!
//! [`AnimeOracle`] decides whether a show title is anime by asking a lookup
//! provider and fuzzy-matching the candidate's title variants. Verdicts are
//! cached per lowercase title; failed lookups are cached as negative, so a
//! transient outage during the first scan yields "not anime" until the
//! verdict expires. With the default [`NeverExpire`] policy that is the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mg_core::{MediaFlavor, MediaItem};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::provider::{Candidate, LookupProvider, LookupQuery};

/// Share of query tokens (in tenths) that must be found in a variant.
const MATCH_THRESHOLD_TENTHS: usize = 7;

/// Why a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    /// A candidate variant matched the title.
    Matched,
    /// The provider had no candidate, or none of its variants matched.
    NoMatch,
    /// The lookup failed; recorded as negative.
    LookupFailed,
}

/// Cached outcome of one classification.
#[derive(Debug, Clone)]
pub struct ClassificationVerdict {
    pub title_key: String,
    pub is_anime: bool,
    pub source: VerdictSource,
    /// Poster of the matched candidate, reused when the folder icon is built.
    pub image_url: Option<String>,
    pub decided_at: Instant,
}

/// Decides whether a cached verdict may still be used.
pub trait ExpiryPolicy: Send + Sync {
    fn is_fresh(&self, verdict: &ClassificationVerdict, now: Instant) -> bool;
}

/// Verdicts never expire.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpire;

impl ExpiryPolicy for NeverExpire {
    fn is_fresh(&self, _verdict: &ClassificationVerdict, _now: Instant) -> bool {
        true
    }
}

/// Verdicts expire after a fixed age.
#[derive(Debug, Clone, Copy)]
pub struct MaxAge(pub Duration);

impl ExpiryPolicy for MaxAge {
    fn is_fresh(&self, verdict: &ClassificationVerdict, now: Instant) -> bool {
        now.saturating_duration_since(verdict.decided_at) < self.0
    }
}

/// Memoized anime classifier.
pub struct AnimeOracle {
    provider: Arc<dyn LookupProvider>,
    verdicts: Mutex<HashMap<String, ClassificationVerdict>>,
    expiry: Box<dyn ExpiryPolicy>,
}

impl AnimeOracle {
    pub fn new(provider: Arc<dyn LookupProvider>) -> Self {
        Self {
            provider,
            verdicts: Mutex::new(HashMap::new()),
            expiry: Box::new(NeverExpire),
        }
    }

    pub fn with_expiry(mut self, policy: impl ExpiryPolicy + 'static) -> Self {
        self.expiry = Box::new(policy);
        self
    }

    /// Whether `title` is anime. Consults the provider at most once per
    /// lowercase title while the cached verdict is fresh, and never fails.
    pub async fn classify(&self, title: &str) -> bool {
        let key = title_key(title);
        if let Some(is_anime) = self.fresh_verdict(&key) {
            return is_anime;
        }

        let query = LookupQuery::new(title.trim(), None, MediaFlavor::Anime);
        let (is_anime, source, image_url) = match self.provider.search(&query).await {
            Ok(Some(candidate)) if candidate_matches(title, &candidate) => {
                debug!(title, matched = candidate.display_title(), "Classified as anime");
                (true, VerdictSource::Matched, candidate.image_url)
            }
            Ok(_) => (false, VerdictSource::NoMatch, None),
            Err(e) => {
                warn!(title, provider = self.provider.name(), "Anime lookup failed: {e:#}");
                (false, VerdictSource::LookupFailed, None)
            }
        };

        self.verdicts.lock().insert(
            key.clone(),
            ClassificationVerdict {
                title_key: key,
                is_anime,
                source,
                image_url,
                decided_at: Instant::now(),
            },
        );
        is_anime
    }

    /// Split show folders into `(tv, anime)`, preserving order.
    pub async fn partition(&self, shows: Vec<MediaItem>) -> (Vec<MediaItem>, Vec<MediaItem>) {
        let mut tv = Vec::new();
        let mut anime = Vec::new();
        for show in shows {
            if self.classify(&show.title).await {
                anime.push(show);
            } else {
                tv.push(show);
            }
        }
        info!(tv = tv.len(), anime = anime.len(), "Classified show folders");
        (tv, anime)
    }

    /// The cached verdict for `title`, if any (fresh or not).
    pub fn cached_verdict(&self, title: &str) -> Option<ClassificationVerdict> {
        self.verdicts.lock().get(&title_key(title)).cloned()
    }

    /// Poster URL of the candidate that made `title` anime, while that
    /// verdict is fresh.
    pub fn matched_image(&self, title: &str) -> Option<String> {
        let verdicts = self.verdicts.lock();
        let verdict = verdicts.get(&title_key(title))?;
        if !verdict.is_anime || !self.expiry.is_fresh(verdict, Instant::now()) {
            return None;
        }
        verdict.image_url.clone()
    }

    pub fn len(&self) -> usize {
        self.verdicts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.lock().is_empty()
    }

    fn fresh_verdict(&self, key: &str) -> Option<bool> {
        let verdicts = self.verdicts.lock();
        let verdict = verdicts.get(key)?;
        self.expiry
            .is_fresh(verdict, Instant::now())
            .then_some(verdict.is_anime)
    }
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// True if any of the candidate's title variants fuzzy-matches `query`.
pub fn candidate_matches(query: &str, candidate: &Candidate) -> bool {
    candidate
        .title_variants
        .iter()
        .any(|variant| fuzzy_matches(query, variant))
}

/// At least 70% of the query's whitespace tokens must each occur as a
/// substring of some token of `variant` (case-insensitive). An empty query
/// never matches.
pub fn fuzzy_matches(query: &str, variant: &str) -> bool {
    let query = query.to_lowercase();
    let variant = variant.to_lowercase();
    let query_tokens: Vec<&str> = query.split_whitespace().collect();
    if query_tokens.is_empty() {
        return false;
    }
    let variant_tokens: Vec<&str> = variant.split_whitespace().collect();

    let matched = query_tokens
        .iter()
        .filter(|q| variant_tokens.iter().any(|v| v.contains(*q)))
        .count();

    matched * 10 >= query_tokens.len() * MATCH_THRESHOLD_TENTHS
}
