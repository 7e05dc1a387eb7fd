//! TMDB (The Movie Database) lookup provider.
//!
//! Implements [`LookupProvider`] over the TMDB v3 REST API for movies and TV
//! shows.
//!
//! Features:
//! - Token-bucket rate limiting at 4 requests / second via [`governor`].
//! - One attempt per search with a bounded request timeout.
//! - Confidence scoring based on title similarity and year proximity; the
//!   highest-scoring result is returned.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use mg_core::MediaFlavor;
use serde::Deserialize;
use tracing::debug;

use crate::metadata::provider::{collect_variants, Candidate, LookupProvider, LookupQuery};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(4) {
    Some(n) => n,
    None => panic!("rate must be non-zero"),
};

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB lookup provider.
///
/// # Examples
///
/// ```no_run
/// use mediaglyph::metadata::providers::TmdbProvider;
/// use std::time::Duration;
///
/// let provider = TmdbProvider::new("your-api-key".into(), "en-US".into(), Duration::from_secs(30))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
    image_base: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbProvider {
    /// Create a new TMDB provider with the given API key and language.
    ///
    /// The `language` parameter should be a tag such as `"en-US"`.
    pub fn new(api_key: String, language: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            language,
            base_url: TMDB_BASE_URL.to_string(),
            image_base: TMDB_IMAGE_BASE.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND)),
        })
    }

    /// Point the provider at a different API and image host.
    pub fn with_base_urls(mut self, api: impl Into<String>, images: impl Into<String>) -> Self {
        self.base_url = api.into();
        self.image_base = images.into();
        self
    }

    /// Rate-limited single GET that fails on non-success status.
    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        self.client
            .get(url)
            .send()
            .await
            .context("TMDB request failed")?
            .error_for_status()
            .context("TMDB request returned error")
    }

    /// Build a full API URL with the API key and language query parameters.
    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}&language={}",
            self.base_url,
            urlencoded(&self.api_key),
            urlencoded(&self.language)
        );
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    fn image_url(&self, path: &str) -> String {
        format!("{}{path}", self.image_base)
    }

    /// Compute confidence score for a search result based on title similarity
    /// and year proximity.
    fn confidence(
        query_title: &str,
        result_titles: &[String],
        query_year: Option<u16>,
        result_year: Option<u16>,
    ) -> f64 {
        let base = result_titles
            .iter()
            .map(|result_title| {
                if query_title == result_title {
                    0.5
                } else if query_title.eq_ignore_ascii_case(result_title) {
                    0.4
                } else if result_title
                    .to_lowercase()
                    .contains(&query_title.to_lowercase())
                {
                    0.2
                } else {
                    0.1
                }
            })
            .fold(0.0_f64, f64::max);

        let year_bonus = match (query_year, result_year) {
            (Some(q), Some(r)) if q == r => 0.3,
            (Some(q), Some(r)) if q.abs_diff(r) <= 1 => 0.15,
            _ => 0.0,
        };

        base + year_bonus
    }

    async fn search_movie(&self, query: &LookupQuery) -> anyhow::Result<Vec<(f64, Candidate)>> {
        let year_str = query.year.map(|y| y.to_string());
        let mut params = vec![("query", query.title.as_str())];
        if let Some(ref y) = year_str {
            params.push(("year", y.as_str()));
        }

        let url = self.url("/search/movie", &params);
        debug!(title = %query.title, year = ?query.year, "TMDB search movie");

        let body: TmdbSearchResponse<TmdbMovieSearchResult> = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse TMDB movie search response")?;

        Ok(body
            .results
            .into_iter()
            .map(|r| {
                let year = parse_year(&r.release_date);
                let variants = collect_variants([r.title, r.original_title]);
                let score = Self::confidence(&query.title, &variants, query.year, year);
                let candidate = Candidate {
                    id: r.id.to_string(),
                    title_variants: variants,
                    image_url: r.poster_path.map(|p| self.image_url(&p)),
                    year,
                };
                (score, candidate)
            })
            .collect())
    }

    async fn search_tv(&self, query: &LookupQuery) -> anyhow::Result<Vec<(f64, Candidate)>> {
        let year_str = query.year.map(|y| y.to_string());
        let mut params = vec![("query", query.title.as_str())];
        if let Some(ref y) = year_str {
            params.push(("first_air_date_year", y.as_str()));
        }

        let url = self.url("/search/tv", &params);
        debug!(title = %query.title, year = ?query.year, "TMDB search TV");

        let body: TmdbSearchResponse<TmdbTvSearchResult> = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse TMDB TV search response")?;

        Ok(body
            .results
            .into_iter()
            .map(|r| {
                let year = parse_year(&r.first_air_date);
                let variants = collect_variants([r.name, r.original_name]);
                let score = Self::confidence(&query.title, &variants, query.year, year);
                let candidate = Candidate {
                    id: r.id.to_string(),
                    title_variants: variants,
                    image_url: r.poster_path.map(|p| self.image_url(&p)),
                    year,
                };
                (score, candidate)
            })
            .collect())
    }
}

/// Minimal percent-encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Extract a four-digit year from a date string like `"2023-04-15"`.
fn parse_year(date: &Option<String>) -> Option<u16> {
    date.as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<u16>().ok())
}

/// Highest-scoring candidate; earlier results win ties.
fn best(scored: Vec<(f64, Candidate)>) -> Option<Candidate> {
    scored
        .into_iter()
        .rev()
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, c)| c)
}

#[async_trait]
impl LookupProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, query: &LookupQuery) -> anyhow::Result<Option<Candidate>> {
        if !self.is_available() {
            debug!("TMDB API key not configured; skipping lookup");
            return Ok(None);
        }

        let scored = match query.flavor {
            MediaFlavor::Movie => self.search_movie(query).await?,
            MediaFlavor::Tv | MediaFlavor::Anime => self.search_tv(query).await?,
        };
        Ok(best(scored))
    }
}
