//! AniList lookup provider (anime).
//!
//! Queries the AniList GraphQL API for a single `Media` of type `ANIME`.
//! AniList answers a miss with HTTP 404 and a "Not Found" error, which maps
//! to `Ok(None)`; any other GraphQL error is a lookup failure.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metadata::provider::{collect_variants, Candidate, LookupProvider, LookupQuery};

const ANILIST_URL: &str = "https://graphql.anilist.co";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUESTS_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(90) {
    Some(n) => n,
    None => panic!("rate must be non-zero"),
};

const SEARCH_QUERY: &str = r#"
query ($search: String, $seasonYear: Int) {
    Media (search: $search, type: ANIME, seasonYear: $seasonYear) {
        id
        title { romaji english native }
        seasonYear
        coverImage { extraLarge large medium }
    }
}
"#;

// ---------------------------------------------------------------------------
// GraphQL wire types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: SearchVariables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchVariables<'a> {
    search: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    season_year: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<SearchData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    status: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "Media")]
    media: Option<AniListMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AniListMedia {
    id: u64,
    title: AniListTitle,
    season_year: Option<u16>,
    cover_image: Option<AniListCover>,
}

#[derive(Debug, Deserialize)]
struct AniListTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AniListCover {
    extra_large: Option<String>,
    large: Option<String>,
    medium: Option<String>,
}

impl From<AniListMedia> for Candidate {
    fn from(media: AniListMedia) -> Self {
        let image_url = media
            .cover_image
            .and_then(|c| c.extra_large.or(c.large).or(c.medium));
        Candidate {
            id: media.id.to_string(),
            title_variants: collect_variants([
                media.title.english,
                media.title.romaji,
                media.title.native,
            ]),
            image_url,
            year: media.season_year,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// AniList lookup provider. Needs no credentials.
pub struct AniListProvider {
    client: reqwest::Client,
    endpoint: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl AniListProvider {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mediaglyph/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: ANILIST_URL.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_minute(REQUESTS_PER_MINUTE)),
        })
    }

    /// Point the provider at a different GraphQL endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl LookupProvider for AniListProvider {
    fn name(&self) -> &'static str {
        "anilist"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &LookupQuery) -> anyhow::Result<Option<Candidate>> {
        self.rate_limiter.until_ready().await;
        debug!(title = %query.title, year = ?query.year, "AniList search");

        let request = GraphQlRequest {
            query: SEARCH_QUERY,
            variables: SearchVariables {
                search: &query.title,
                season_year: query.year,
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("AniList request failed")?;
        let status = resp.status();

        let body: GraphQlResponse = resp
            .json()
            .await
            .with_context(|| format!("failed to parse AniList response (HTTP {status})"))?;

        if let Some(media) = body.data.and_then(|d| d.media) {
            return Ok(Some(media.into()));
        }

        let not_found = status == StatusCode::NOT_FOUND
            || body.errors.iter().any(|e| e.status == Some(404));
        if not_found {
            return Ok(None);
        }

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            bail!("AniList returned errors: {}", messages.join("; "));
        }
        if !status.is_success() {
            bail!("AniList returned HTTP {status}");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_core::MediaFlavor;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> AniListProvider {
        AniListProvider::new(Duration::from_secs(5))
            .unwrap()
            .with_endpoint(server.uri())
    }

    #[tokio::test]
    async fn found_media_becomes_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "variables": {"search": "Attack on Titan"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"Media": {
                    "id": 16498,
                    "title": {"romaji": "Shingeki no Kyojin", "english": "Attack on Titan", "native": "進撃の巨人"},
                    "seasonYear": 2013,
                    "coverImage": {"extraLarge": null, "large": "https://img.test/large.jpg", "medium": "https://img.test/medium.jpg"}
                }}
            })))
            .mount(&server)
            .await;

        let q = LookupQuery::new("Attack on Titan", None, MediaFlavor::Anime);
        let c = provider(&server).search(&q).await.unwrap().unwrap();
        assert_eq!(c.id, "16498");
        assert_eq!(
            c.title_variants,
            vec!["Attack on Titan", "Shingeki no Kyojin", "進撃の巨人"]
        );
        assert_eq!(c.image_url.as_deref(), Some("https://img.test/large.jpg"));
        assert_eq!(c.year, Some(2013));
    }

    #[tokio::test]
    async fn season_year_is_sent_when_known() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "variables": {"search": "Akira", "seasonYear": 1988}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"Media": {"id": 47, "title": {"romaji": "Akira"}, "seasonYear": 1988, "coverImage": null}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let q = LookupQuery::new("Akira", Some(1988), MediaFlavor::Anime);
        let c = provider(&server).search(&q).await.unwrap().unwrap();
        assert!(c.image_url.is_none());
    }

    #[tokio::test]
    async fn not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errors": [{"message": "Not Found.", "status": 404}],
                "data": {"Media": null}
            })))
            .mount(&server)
            .await;

        let q = LookupQuery::new("Random Cooking Show", None, MediaFlavor::Anime);
        assert!(provider(&server).search(&q).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn other_errors_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "errors": [{"message": "Internal Server Error", "status": 500}],
                "data": null
            })))
            .mount(&server)
            .await;

        let q = LookupQuery::new("Anything", None, MediaFlavor::Anime);
        let err = provider(&server).search(&q).await.unwrap_err();
        assert!(err.to_string().contains("Internal Server Error"));
    }

    #[tokio::test]
    async fn non_json_body_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let q = LookupQuery::new("Anything", None, MediaFlavor::Anime);
        assert!(provider(&server).search(&q).await.is_err());
    }
}
