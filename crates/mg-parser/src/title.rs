//! Movie title and release-year extraction.

use std::sync::LazyLock;

use regex::Regex;

use crate::video::is_video_extension;

/// Years outside this range are treated as part of the title.
pub const YEAR_RANGE: std::ops::RangeInclusive<u16> = 1900..=2030;

/// Year patterns, tried in order. Capture group 1 is the year; the whole
/// match is the span removed from the title.
static YEAR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\((\d{4})\)",
        r"\[(\d{4})\]",
        r"\.(\d{4})\.",
        r"\s(\d{4})\s",
        r"[\s._](\d{4})$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid year pattern"))
    .collect()
});

static BRACKET_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\(\[][^\)\]]*[\)\]]").expect("valid bracket pattern"));

/// Quality, source, codec, edition and release-group tokens. A codec or
/// source token may carry a `-GROUP` suffix, which is removed with it.
static QUALITY_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    let vocabulary = [
        // resolution
        "2160p", "1080p", "1080i", "720p", "576p", "480p", "4k", "uhd",
        // source
        "blu-ray", "bluray", "bdrip", "brrip", "bdremux", "remux", "dvdrip", "dvdscr", "dvd",
        "web-dl", "webdl", "webrip", "web", "hdtv", "hdrip", "hdcam", "amzn",
        // codec
        "x264", "x265", "h264", "h265", "h 264", "h 265", "hevc", "avc", "xvid", "divx",
        "10bit", "8bit", "hdr10", "hdr",
        // audio
        "truehd", "atmos", "dts-hd", "dts", "ddp5 1", "dd5 1", "aac", "ac3", "eac3", "flac",
        "5 1", "7 1",
        // edition
        "extended", "unrated", "remastered", "directors cut", "director's cut", "theatrical",
        "imax", "proper", "repack",
        // release groups
        "yify", "yts", "rarbg", "sparks", "fgt", "ettv", "eztv", "qxr", "tigole",
    ];
    let alternation = vocabulary
        .iter()
        .map(|t| regex::escape(t).replace(' ', r"[\s._-]"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})(?:-[A-Za-z0-9]+)?\b"))
        .expect("valid quality pattern")
});

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[._-]+").expect("valid separator pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// A normalized title and optional release year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<u16>,
}

/// Extract a clean title and release year from a movie file or folder name.
///
/// A trailing extension is only stripped when it is a known video extension,
/// so the last word of a folder name such as `"Mr. Robot"` is kept. If every
/// token is stripped the input is returned unchanged as the title.
///
/// ```
/// let parsed = mg_parser::parse_movie("The.Matrix.1999.1080p.BluRay.x264.mkv");
/// assert_eq!(parsed.title, "The Matrix");
/// assert_eq!(parsed.year, Some(1999));
/// ```
pub fn parse_movie(filename: &str) -> ParsedTitle {
    // Underscores are word characters to the regex engine; treat them as
    // spaces up front so token boundaries match.
    let stem = strip_video_extension(filename.trim()).replace('_', " ");
    let (year, without_year) = extract_year(&stem);

    let without_groups = BRACKET_GROUP.replace_all(&without_year, " ");
    let without_quality = QUALITY_TOKENS.replace_all(&without_groups, " ");
    let spaced = SEPARATORS.replace_all(&without_quality, " ");
    let title = WHITESPACE.replace_all(spaced.trim(), " ").into_owned();

    let title = if title.is_empty() {
        filename.to_string()
    } else {
        title
    };

    ParsedTitle { title, year }
}

/// Drop a trailing `.ext` when `ext` is a video extension.
fn strip_video_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_video_extension(ext) => stem,
        _ => name,
    }
}

/// Find the first in-range year and return it with the year span replaced by
/// a space.
fn extract_year(name: &str) -> (Option<u16>, String) {
    for pattern in YEAR_PATTERNS.iter() {
        for caps in pattern.captures_iter(name) {
            let Some(year) = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok()) else {
                continue;
            };
            if !YEAR_RANGE.contains(&year) {
                continue;
            }
            let Some(span) = caps.get(0) else { continue };
            let mut rest = String::with_capacity(name.len());
            rest.push_str(&name[..span.start()]);
            rest.push(' ');
            rest.push_str(&name[span.end()..]);
            return (Some(year), rest);
        }
    }
    (None, name.to_string())
}
