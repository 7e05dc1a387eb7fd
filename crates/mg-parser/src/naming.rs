//! Folder-name predicates and cache-key sanitizing.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum length, in characters, of a sanitized key.
pub const MAX_KEY_LEN: usize = 100;

/// Returned by [`safe_cache_key`] when nothing usable is left.
pub const EMPTY_KEY: &str = "untitled";

static SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)season\s*\d+").expect("valid season pattern"));

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid unsafe-char pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// True iff `name` contains "season" followed by a number, in any case.
pub fn is_season_folder(name: &str) -> bool {
    SEASON.is_match(name)
}

/// Turn a title into a string usable as a file name on every platform.
///
/// Unsafe characters become `_`, whitespace runs become a single `_`,
/// leading and trailing `.`/`_` are trimmed and the result is capped at
/// [`MAX_KEY_LEN`] characters. The function is idempotent. Distinct titles
/// can map to the same key; the cache treats that as an overwrite.
pub fn safe_cache_key(title: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(title, "_");
    let collapsed = WHITESPACE.replace_all(&replaced, "_");
    let truncated: String = trim_separators(&collapsed).chars().take(MAX_KEY_LEN).collect();
    let key = trim_separators(&truncated);

    if key.is_empty() {
        EMPTY_KEY.to_string()
    } else {
        key.to_string()
    }
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == '_')
}
