//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a [`MediaProcessor`] to scripted
//! lookup providers, a fake transcoder and a wiremock poster server, plus
//! helpers for building a throwaway media library on disk.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use mediaglyph::apply::ThumbnailEmbedder;
use mediaglyph::cache::ArtifactCache;
use mediaglyph::images::AssetPipeline;
use mediaglyph::metadata::{AnimeOracle, Candidate, LookupProvider, LookupQuery, ProviderRegistry};
use mediaglyph::processor::MediaProcessor;
use mg_av::Transcoder;
use mg_core::config::Config;
use mg_core::MediaFlavor;
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Provider answering from a fixed title table. Counts calls.
pub struct ScriptedProvider {
    name: &'static str,
    entries: Vec<(String, Candidate)>,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer `title` with a candidate whose variants are `variants` and
    /// whose poster is `image_url`.
    pub fn with(mut self, title: &str, variants: &[&str], image_url: Option<String>) -> Self {
        self.entries.push((
            title.to_lowercase(),
            Candidate {
                id: format!("{}", self.entries.len() + 1),
                title_variants: variants.iter().map(|v| v.to_string()).collect(),
                image_url,
                year: None,
            },
        ));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &LookupQuery) -> anyhow::Result<Option<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let wanted = query.title.to_lowercase();
        Ok(self
            .entries
            .iter()
            .find(|(title, _)| *title == wanted)
            .map(|(_, c)| c.clone()))
    }
}

/// Transcoder that appends the image bytes to the video. Files ending in
/// `EMBEDDED` probe as already done; videos named `*broken*` fail.
#[derive(Default)]
pub struct FakeTranscoder {
    pub embeds: AtomicUsize,
}

pub const EMBED_MARKER: &[u8] = b"EMBEDDED";

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn name(&self) -> &str {
        "fake"
    }

    async fn embed(&self, video: &Path, image: &Path, output: &Path) -> mg_core::Result<()> {
        self.embeds.fetch_add(1, Ordering::SeqCst);
        let name = video
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("broken") {
            std::fs::write(output, b"half-written")?;
            return Err(mg_core::Error::tool("fake", "exited with status 1"));
        }
        let mut data = std::fs::read(video)?;
        data.extend(std::fs::read(image)?);
        data.extend_from_slice(EMBED_MARKER);
        std::fs::write(output, data)?;
        Ok(())
    }

    async fn probe(&self, video: &Path) -> mg_core::Result<bool> {
        Ok(std::fs::read(video)?.ends_with(EMBED_MARKER))
    }

    async fn extract(&self, _video: &Path, output: &Path) -> mg_core::Result<()> {
        std::fs::write(output, b"cover")?;
        Ok(())
    }
}

/// A PNG poster with a transparent right half.
pub fn poster_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([20, 60, 200, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode poster");
    buf.into_inner()
}

/// Serve a poster PNG for any `/posters/*` path.
pub async fn poster_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/posters/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(poster_png(300, 450)))
        .mount(&server)
        .await;
    server
}

/// Create `root/rel` (and parents) with `contents`.
pub fn touch(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, contents).expect("write");
    path
}

/// A small library: two movies, one TV show, one anime show, and noise.
/// Season folders hold no video so every video file is a real movie.
pub fn sample_library(root: &Path) {
    touch(root, "Heat (1995).mkv", b"HEAT");
    touch(root, "Alien.1979.1080p.BluRay.x264.mp4", b"ALIEN");
    touch(root, "notes.txt", b"not media");
    touch(root, "The Wire/Season 1/episodes.nfo", b"");
    touch(root, "Attack on Titan/Season 01/episodes.nfo", b"");
    touch(root, "Extras/readme.nfo", b"");
}

pub struct TestHarness {
    pub dir: TempDir,
    pub library: PathBuf,
    pub tmdb: Arc<ScriptedProvider>,
    pub anilist: Arc<ScriptedProvider>,
    pub transcoder: Arc<FakeTranscoder>,
    pub processor: MediaProcessor,
}

impl TestHarness {
    /// Providers that know every title in [`sample_library`], posters served
    /// by `server`.
    pub fn new(server: &MockServer) -> Self {
        Self::with_config(server, Config::default())
    }

    pub fn with_config(server: &MockServer, mut config: Config) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("library");
        std::fs::create_dir_all(&library).expect("library dir");
        config.media_directory = Some(library.clone());
        config.cache.dir = dir.path().join("cache");

        let poster = |name: &str| Some(format!("{}/posters/{name}.png", server.uri()));
        let tmdb = Arc::new(
            ScriptedProvider::new("tmdb")
                .with("Heat", &["Heat"], poster("heat"))
                .with("Alien", &["Alien"], poster("alien"))
                .with("Broken Movie", &["Broken Movie"], poster("broken"))
                .with("The Wire", &["The Wire"], poster("wire"))
                .with("Attack on Titan", &["Attack on Titan"], poster("aot-tmdb")),
        );
        let anilist = Arc::new(ScriptedProvider::new("anilist").with(
            "Attack on Titan",
            &["Shingeki no Kyojin", "Attack on Titan", "進撃の巨人"],
            poster("aot"),
        ));

        let mut registry = ProviderRegistry::new();
        registry.register(MediaFlavor::Movie, tmdb.clone());
        registry.register(MediaFlavor::Tv, tmdb.clone());
        registry.register(MediaFlavor::Anime, anilist.clone());
        let registry = Arc::new(registry);

        let cache = Arc::new(ArtifactCache::open(&config.cache.dir).expect("cache"));
        let pipeline =
            Arc::new(AssetPipeline::new(cache, Duration::from_secs(5)).expect("pipeline"));
        let oracle = Arc::new(AnimeOracle::new(anilist.clone()));
        let transcoder = Arc::new(FakeTranscoder::default());
        let embedder = Arc::new(
            ThumbnailEmbedder::new(
                Some(transcoder.clone() as Arc<dyn Transcoder>),
                pipeline.clone(),
                registry.clone(),
            )
            .with_backup(config.embed.backup),
        );

        let processor = MediaProcessor::new(config, registry, oracle, pipeline, embedder);
        Self {
            dir,
            library,
            tmdb,
            anilist,
            transcoder,
            processor,
        }
    }
}
