//! Poster download and artifact generation.
//!
//! Every artifact is derived from a cached source poster, so building both
//! an icon and a thumbnail for the same title downloads the image once.
//! Encoding runs on the blocking pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, Rgb, RgbImage, Rgba};
use mg_core::{ArtifactKind, CacheKey, MediaFlavor};
use tracing::debug;

use crate::cache::ArtifactCache;

/// Square sizes packed into every icon.
pub const ICON_SIZES: [u32; 6] = [16, 32, 48, 64, 128, 256];
/// Bounding box for embedded thumbnails.
pub const THUMBNAIL_BOX: (u32, u32) = (400, 600);
pub const POSTER_JPEG_QUALITY: u8 = 90;
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Cache key for a title of the given flavor.
pub fn artifact_key(flavor: MediaFlavor, title: &str) -> CacheKey {
    CacheKey::new(flavor, &mg_parser::safe_cache_key(title))
}

/// Downloads posters and turns them into cached icons and thumbnails.
pub struct AssetPipeline {
    cache: Arc<ArtifactCache>,
    client: reqwest::Client,
}

impl AssetPipeline {
    pub fn new(cache: Arc<ArtifactCache>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { cache, client })
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// The poster for `key`, downloaded from `url` on a miss and stored as
    /// JPEG with transparency flattened onto white.
    pub async fn source_image(&self, key: &CacheKey, url: &str) -> Result<PathBuf> {
        self.cache
            .get_or_create(key, ArtifactKind::SourceImage, move || async move {
                let data = self.download(url).await?;
                blocking(move || {
                    let img = decode(&data)?;
                    encode_jpeg(&flatten_onto_white(&img), POSTER_JPEG_QUALITY)
                })
                .await
            })
            .await
    }

    /// Multi-resolution `.ico` built from the poster.
    pub async fn build_icon(&self, key: &CacheKey, url: &str) -> Result<PathBuf> {
        self.cache
            .get_or_create(key, ArtifactKind::Icon, move || async move {
                let poster = self.poster_bytes(key, url).await?;
                blocking(move || encode_icon(&decode(&poster)?)).await
            })
            .await
    }

    /// JPEG thumbnail fitted inside [`THUMBNAIL_BOX`].
    pub async fn build_thumbnail(&self, key: &CacheKey, url: &str) -> Result<PathBuf> {
        self.cache
            .get_or_create(key, ArtifactKind::Thumbnail, move || async move {
                let poster = self.poster_bytes(key, url).await?;
                blocking(move || {
                    let img = fit_within(decode(&poster)?, THUMBNAIL_BOX.0, THUMBNAIL_BOX.1);
                    encode_jpeg(&flatten_onto_white(&img), THUMBNAIL_JPEG_QUALITY)
                })
                .await
            })
            .await
    }

    async fn poster_bytes(&self, key: &CacheKey, url: &str) -> Result<Vec<u8>> {
        let path = self.source_image(key, url).await?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read cached poster {}", path.display()))
    }

    /// Single bounded-time GET. Empty bodies are errors.
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "Downloading image");
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download image from {url}"))?
            .error_for_status()
            .with_context(|| format!("HTTP error downloading image from {url}"))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read image bytes from {url}"))?;

        if bytes.is_empty() {
            bail!("empty response from {url}");
        }
        Ok(bytes.to_vec())
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("image task panicked")?
}

fn decode(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data).context("Failed to decode image data")
}

/// Composite over an opaque white background.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Shrink to fit inside `max_w` x `max_h`, keeping aspect ratio. Smaller
/// images are returned unchanged.
pub fn fit_within(img: DynamicImage, max_w: u32, max_h: u32) -> DynamicImage {
    if img.width() <= max_w && img.height() <= max_h {
        return img;
    }
    img.resize(max_w, max_h, FilterType::Lanczos3)
}

pub fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .context("Failed to encode JPEG")?;
    Ok(buf)
}

/// One PNG frame per entry of [`ICON_SIZES`], each center-cropped to square.
pub fn encode_icon(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut frames = Vec::with_capacity(ICON_SIZES.len());
    for size in ICON_SIZES {
        let square = img.resize_to_fill(size, size, FilterType::Lanczos3).to_rgba8();
        // as_png takes raw RGBA pixels and does the PNG encoding itself.
        let frame = IcoFrame::as_png(square.as_raw(), size, size, ExtendedColorType::Rgba8)
            .with_context(|| format!("Failed to build {size}px icon frame"))?;
        frames.push(frame);
    }

    let mut buf = Vec::new();
    IcoEncoder::new(&mut buf)
        .encode_images(&frames)
        .context("Failed to encode icon")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, RgbaImage};
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    async fn pipeline(dir: &std::path::Path) -> AssetPipeline {
        let cache = Arc::new(ArtifactCache::open(dir).unwrap());
        AssetPipeline::new(cache, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(*flatten_onto_white(&img).get_pixel(0, 0), Rgb([255, 255, 255]));

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255])));
        assert_eq!(*flatten_onto_white(&opaque).get_pixel(0, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn fit_within_never_upscales() {
        let small = DynamicImage::new_rgb8(100, 150);
        assert_eq!(fit_within(small, 400, 600).dimensions(), (100, 150));

        let large = DynamicImage::new_rgb8(1000, 1500);
        assert_eq!(fit_within(large, 400, 600).dimensions(), (400, 600));

        let wide = DynamicImage::new_rgb8(1600, 900);
        let fitted = fit_within(wide, 400, 600);
        assert_eq!(fitted.width(), 400);
        assert!(fitted.height() <= 600);
    }

    #[test]
    fn icon_contains_all_sizes() {
        let img = DynamicImage::new_rgba8(300, 450);
        let ico = encode_icon(&img).unwrap();
        // ICONDIR: reserved 0, type 1, image count.
        assert_eq!(&ico[0..4], &[0, 0, 1, 0]);
        assert_eq!(u16::from_le_bytes([ico[4], ico[5]]) as usize, ICON_SIZES.len());
        assert!(image::load_from_memory_with_format(&ico, ImageFormat::Ico).is_ok());
    }

    #[test]
    fn icon_frames_decode_at_every_size() {
        let ico = encode_icon(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            120,
            80,
            Rgba([10, 200, 10, 255]),
        )))
        .unwrap();

        let count = u16::from_le_bytes([ico[4], ico[5]]) as usize;
        let widths: Vec<u32> = (0..count)
            .map(|i| match ico[6 + i * 16] {
                0 => 256,
                w => w as u32,
            })
            .collect();
        assert_eq!(widths, ICON_SIZES.to_vec());

        // The decoder picks the largest frame.
        let decoded = image::load_from_memory_with_format(&ico, ImageFormat::Ico).unwrap();
        assert_eq!(decoded.dimensions(), (256, 256));
    }

    #[tokio::test]
    async fn icon_and_thumbnail_share_one_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/poster.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(800, 1200)))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let key = artifact_key(MediaFlavor::Movie, "Heat");
        let url = format!("{}/poster.png", server.uri());

        let icon = pipeline.build_icon(&key, &url).await.unwrap();
        assert!(icon.ends_with("icons/movie_Heat.ico"));

        let thumb = pipeline.build_thumbnail(&key, &url).await.unwrap();
        let decoded = image::open(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (400, 600));

        // Cache hit on the second call.
        assert_eq!(pipeline.build_icon(&key, &url).await.unwrap(), icon);
    }

    #[tokio::test]
    async fn http_error_yields_no_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let key = artifact_key(MediaFlavor::Tv, "Missing");
        let result = pipeline
            .build_icon(&key, &format!("{}/nope.jpg", server.uri()))
            .await;

        assert!(result.is_err());
        assert!(pipeline.cache().lookup(&key, ArtifactKind::Icon).is_none());
        assert!(pipeline.cache().lookup(&key, ArtifactKind::SourceImage).is_none());
    }

    #[tokio::test]
    async fn empty_or_garbage_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not an image".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let key = artifact_key(MediaFlavor::Movie, "X");

        let empty = pipeline
            .build_thumbnail(&key, &format!("{}/empty", server.uri()))
            .await;
        assert!(empty.unwrap_err().to_string().contains("empty response"));

        let garbage = pipeline
            .build_thumbnail(&key, &format!("{}/garbage", server.uri()))
            .await;
        assert!(garbage.is_err());
    }

    #[test]
    fn artifact_keys_are_prefixed_and_safe() {
        assert_eq!(
            artifact_key(MediaFlavor::Anime, "Attack on Titan").as_str(),
            "anime_Attack_on_Titan"
        );
        assert_eq!(artifact_key(MediaFlavor::Tv, "Who?").as_str(), "tv_Who");
    }
}
