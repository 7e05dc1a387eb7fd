//! CLI end-to-end tests
//!
//! Tests for the mediaglyph command-line interface. Nothing here needs
//! network access or ffmpeg.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

#[allow(deprecated)]
fn mediaglyph_cmd() -> Command {
    Command::cargo_bin("mediaglyph").unwrap()
}

/// Write a config that keeps the cache inside `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.json");
    let cache = dir.join("cache");
    let json = serde_json::json!({
        "cache": { "dir": cache },
        "features": { "anime": false },
    });
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"data").unwrap();
}

#[test]
fn test_cli_no_args_shows_help() {
    mediaglyph_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    mediaglyph_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediaglyph"))
        .stdout(predicate::str::contains("remove-icon"));
}

#[test]
fn test_cli_version_command() {
    mediaglyph_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("mediaglyph "));
}

#[test]
fn test_cli_scan_json() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let library = dir.path().join("library");
    touch(&library, "Heat (1995).mkv");
    touch(&library, "Alien.1979.1080p.BluRay.x264.mp4");
    touch(&library, "The Wire/Season 1/notes.nfo");
    touch(&library, "Extras/readme.txt");

    let output = mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .args(["scan", "--json", "--no-anime"])
        .arg(&library)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let mut movies: Vec<&str> = json["movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap())
        .collect();
    movies.sort();
    assert_eq!(movies, vec!["Alien", "Heat"]);

    let shows = json["tv_shows"].as_array().unwrap();
    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0]["title"], "The Wire");
    assert!(json["anime"].as_array().unwrap().is_empty());
}

#[test]
fn test_cli_quick_scan_counts() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let library = dir.path().join("library");
    touch(&library, "Heat (1995).mkv");
    touch(&library, "Heat (1995).backup.mkv");
    touch(&library, "The Wire/Season 1/episode.mkv");

    let output = mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .args(["scan", "--quick", "--json"])
        .arg(&library)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["video_files"], 2);
    assert_eq!(json["show_folders"], 1);
    assert_eq!(json["total_folders"], 2);
}

#[test]
fn test_cli_scan_missing_dir_fails() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .args(["scan", "--no-anime"])
        .arg(dir.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_init_config_then_validate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mediaglyph.json");

    mediaglyph_cmd()
        .args(["init-config", "--output"])
        .arg(&path)
        .assert()
        .success();
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(written.get("features").is_some());

    mediaglyph_cmd()
        .args(["init-config", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    mediaglyph_cmd()
        .args(["init-config", "--force", "--output"])
        .arg(&path)
        .assert()
        .success();

    mediaglyph_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("media_directory is not set"));
}

#[test]
fn test_cli_validate_rejects_bad_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();

    mediaglyph_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn test_cli_remove_icon() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("The Wire");
    fs::create_dir_all(&folder).unwrap();

    mediaglyph_cmd()
        .arg("remove-icon")
        .arg(&folder)
        .assert()
        .success()
        .stdout(predicate::str::contains("No custom icon"));

    fs::write(
        folder.join("desktop.ini"),
        "[.ShellClassInfo]\nIconResource=C:\\cache\\tv_The_Wire.ico,0\n",
    )
    .unwrap();
    mediaglyph_cmd()
        .arg("remove-icon")
        .arg(&folder)
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed custom icon"));
    assert!(!folder.join("desktop.ini").exists());
}

#[test]
fn test_cli_cache_stats_json() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    let output = mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache-stats", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["icons"]["files"], 0);
    assert!(dir.path().join("cache").join("icons").is_dir());
}

#[test]
fn test_cli_clean_cache_on_empty_cache() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .args(["clean-cache", "--max-age-days", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 cached files"));
}

#[test]
fn test_cli_clean_cache_with_huge_age_keeps_files() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    touch(&dir.path().join("cache"), "icons/tv_Show.ico");

    mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .args(["clean-cache", "--max-age-days", &u64::MAX.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 cached files"));
    assert!(dir.path().join("cache/icons/tv_Show.ico").exists());
}

#[test]
fn test_cli_check_tools_command() {
    mediaglyph_cmd()
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"));
}

#[test]
fn test_cli_embed_missing_file_fails() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .arg("embed")
        .arg(dir.path().join("missing.mkv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_malformed_config_is_fatal() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("typo.json");
    fs::write(&config, r#"{"features": {"movies": false,}}"#).unwrap();
    let library = dir.path().join("library");
    touch(&library, "Heat (1995).mkv");

    mediaglyph_cmd()
        .arg("--config")
        .arg(&config)
        .args(["run", "--dir"])
        .arg(&library)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse error"));
    assert_eq!(fs::read(library.join("Heat (1995).mkv")).unwrap(), b"data");
}
