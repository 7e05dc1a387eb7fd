//! mg-parser: pure functions that turn file and folder names into titles.
//!
//! # Quick start
//!
//! ```
//! use mg_parser::{is_season_folder, parse_movie, safe_cache_key};
//!
//! let parsed = parse_movie("Inception (2010) [1080p].mkv");
//! assert_eq!(parsed.title, "Inception");
//! assert_eq!(parsed.year, Some(2010));
//!
//! assert!(is_season_folder("Season 02"));
//! assert_eq!(safe_cache_key("Mission: Impossible"), "Mission__Impossible");
//! ```

pub mod naming;
pub mod title;
pub mod video;

pub use naming::{is_season_folder, safe_cache_key};
pub use title::{parse_movie, ParsedTitle, YEAR_RANGE};
pub use video::{is_video_extension, is_video_file, VIDEO_EXTENSIONS};
