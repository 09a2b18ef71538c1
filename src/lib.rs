//! WEBTOON CORPUS BUILDER
//! Downloads every episode of a title, OCRs the pages and glues the text into one corpus file
//! per title, grouped by study label.
//!
//! Resuming is done purely through the filesystem: every stage skips its output if a non-empty
//! file is already there.

pub mod cli;
pub mod config;
pub mod episode;
mod error;
pub mod extract;
pub mod header;
mod macros;
pub mod ocr;
mod parse;
pub mod process;
pub mod request;
pub mod store;

pub use error::{Error, Result};

/// Every image of an episode lives inside this container on the viewer page.
const VIEWER_IMAGE_SELECTOR: &str = "div.wt_viewer img";
/// Query parameter carrying the episode number.
pub const EPISODE_PARAM: &str = "no";
const CORPUS_INDEX_WIDTH: usize = 3;
pub const DEFAULT_PROCESSES: usize = 4;
pub const DEFAULT_OCR_LANG: &str = "kor";
