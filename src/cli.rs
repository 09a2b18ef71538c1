use std::path::PathBuf;

use clap::Parser;

use crate::config::Layout;
use crate::ocr::Tesseract;
use crate::{DEFAULT_OCR_LANG, DEFAULT_PROCESSES};

/// Builds per-title OCR text corpora out of webtoon episodes.
///
/// Header arguments are raw request headers as copied from the browser: the first line (the
/// request line) is ignored, every other line is `Key: Value`.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Raw headers sent with episode page requests.
    pub page_headers: String,

    /// Raw headers sent with image requests.
    pub image_headers: String,

    /// TOML file with the curated `[[group]]` title lists.
    #[arg(long, default_value = "webtoons.toml")]
    pub titles: PathBuf,

    /// Number of episodes processed concurrently per title.
    #[arg(long, default_value_t = DEFAULT_PROCESSES)]
    pub processes: usize,

    #[arg(long, default_value = "imgs")]
    pub img_root: PathBuf,

    #[arg(long, default_value = "text")]
    pub text_root: PathBuf,

    #[arg(long, default_value = "dataset")]
    pub dataset_root: PathBuf,

    /// Tesseract language code.
    #[arg(long, default_value = DEFAULT_OCR_LANG)]
    pub lang: String,

    /// Tesseract executable.
    #[arg(long, default_value = "tesseract")]
    pub tesseract: PathBuf,
}

impl Cli {
    pub fn layout(&self) -> Layout {
        Layout {
            img_root: self.img_root.clone(),
            text_root: self.text_root.clone(),
            dataset_root: self.dataset_root.clone(),
        }
    }

    pub fn ocr(&self) -> Tesseract {
        Tesseract::new(self.tesseract.clone(), self.lang.clone())
    }
}
